use anyhow::{Context, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use ttf_parser::Permissions;

use super::afm;
use super::sfnt::Sfnt;
use super::winansi;
use crate::font::{
    BuiltinFont, Embedding, FaceData, FontBackend, FontFileRequest, FontLoadError,
    RegisteredFont, SystemFonts,
};
use crate::model::FontStyle;

const FLAG_FIXED_PITCH: i64 = 1;
const FLAG_SYMBOLIC: i64 = 1 << 2;
const FLAG_ITALIC: i64 = 1 << 6;
const DEFAULT_STEM_V: i64 = 80;
const ITALIC_ANGLE: f32 = -12.0;
const BFCHAR_CHUNK: usize = 100;

/// One of the standard-14 Type 1 fonts every PDF viewer ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardFont {
    pub family: BuiltinFont,
    pub style: FontStyle,
}

impl StandardFont {
    pub fn base_font(&self) -> &'static str {
        match (self.family, self.style) {
            (BuiltinFont::SansSerif, FontStyle::Normal) => "Helvetica",
            (BuiltinFont::SansSerif, FontStyle::Bold) => "Helvetica-Bold",
            (BuiltinFont::SansSerif, FontStyle::Italic) => "Helvetica-Oblique",
            (BuiltinFont::SansSerif, FontStyle::BoldItalic) => "Helvetica-BoldOblique",
            (BuiltinFont::Serif, FontStyle::Normal) => "Times-Roman",
            (BuiltinFont::Serif, FontStyle::Bold) => "Times-Bold",
            (BuiltinFont::Serif, FontStyle::Italic) => "Times-Italic",
            (BuiltinFont::Serif, FontStyle::BoldItalic) => "Times-BoldItalic",
            (BuiltinFont::Monospace, FontStyle::Normal) => "Courier",
            (BuiltinFont::Monospace, FontStyle::Bold) => "Courier-Bold",
            (BuiltinFont::Monospace, FontStyle::Italic) => "Courier-Oblique",
            (BuiltinFont::Monospace, FontStyle::BoldItalic) => "Courier-BoldOblique",
        }
    }
}

/// Text prepared for one font: the `Tj` operand bytes, the glyphs they draw
/// and the characters the font could not map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedText {
    pub bytes: Vec<u8>,
    glyphs: BTreeMap<u16, char>,
    pub missing: Vec<char>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outlines {
    TrueType,
    Cff,
}

/// A TrueType/OpenType face written as a Type0 font with `Identity-H`
/// encoding, so any character the face maps can be shown.
#[derive(Debug)]
pub struct EmbeddableFont {
    face: FaceData,
    embedding: Embedding,
    post_script_name: String,
    outlines: Outlines,
    synthetic: FontStyle,
}

impl EmbeddableFont {
    /// Two-byte big-endian glyph ids; unmapped characters draw `.notdef`.
    fn encode(&self, text: &str) -> EncodedText {
        let face = self.face.face();
        let mut encoded = EncodedText::default();
        for ch in text.chars() {
            let ch = match ch {
                '\n' | '\r' => continue,
                '\t' => ' ',
                other => other,
            };
            let glyph = face
                .as_ref()
                .and_then(|face| face.glyph_index(ch))
                .map(|glyph| glyph.0);
            match glyph {
                Some(id) => {
                    encoded.glyphs.entry(id).or_insert(ch);
                    encoded.bytes.extend_from_slice(&id.to_be_bytes());
                }
                None => {
                    encoded.missing.push(ch);
                    encoded.bytes.extend_from_slice(&0u16.to_be_bytes());
                }
            }
        }
        encoded
    }

    /// Advance of one glyph in 1/1000 em.
    fn glyph_width(&self, id: u16) -> i64 {
        let units = i64::from(self.face.glyph_advance(id));
        units * 1000 / i64::from(self.face.units_per_em())
    }

    fn base_font_name(&self, encoded: &[u8]) -> String {
        match self.embedding {
            Embedding::Subset => {
                format!("{}+{}", subset_tag(&self.post_script_name, encoded), self.post_script_name)
            }
            Embedding::Full | Embedding::None => self.post_script_name.clone(),
        }
    }

    fn program(&self, text: &EncodedText) -> Result<Vec<u8>, FontLoadError> {
        let mut sfnt = Sfnt::parse(self.face.data(), self.face.index())?;
        if self.embedding == Embedding::Subset {
            let used: BTreeSet<u16> = text.glyphs.keys().copied().collect();
            sfnt.subset_glyphs(&used)?;
        }
        Ok(sfnt.to_bytes())
    }

    fn descriptor(&self, font_name: &str) -> Dictionary {
        let mut flags = FLAG_SYMBOLIC;
        let mut italic_angle = 0.0;
        let mut bbox: Vec<Object> = [0, 0, 1000, 1000].into_iter().map(Object::Integer).collect();
        let (mut ascent, mut descent, mut cap_height) = (800i64, -200i64, 700i64);
        if let Some(face) = self.face.face() {
            let scale = |value: i16| i64::from(value) * 1000 / i64::from(self.face.units_per_em());
            if face.is_monospaced() {
                flags |= FLAG_FIXED_PITCH;
            }
            if face.is_italic() || face.is_oblique() {
                flags |= FLAG_ITALIC;
                italic_angle = ITALIC_ANGLE;
            }
            let rect = face.global_bounding_box();
            bbox = [rect.x_min, rect.y_min, rect.x_max, rect.y_max]
                .into_iter()
                .map(|v| Object::Integer(scale(v)))
                .collect();
            ascent = scale(face.ascender());
            descent = scale(face.descender());
            cap_height = face.capital_height().map(scale).unwrap_or(ascent);
        }
        dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => Object::Name(font_name.as_bytes().to_vec()),
            "Flags" => Object::Integer(flags),
            "FontBBox" => Object::Array(bbox),
            "ItalicAngle" => Object::Real(italic_angle),
            "Ascent" => Object::Integer(ascent),
            "Descent" => Object::Integer(descent),
            "CapHeight" => Object::Integer(cap_height),
            "StemV" => Object::Integer(DEFAULT_STEM_V),
        }
    }

    /// Writes the font program, descriptor, CID font, ToUnicode CMap and the
    /// Type0 font that ties them together; returns the Type0 font id.
    fn write_to(&self, doc: &mut Document, text: &EncodedText) -> Result<ObjectId> {
        let font_name = self.base_font_name(&text.bytes);
        let mut descriptor = self.descriptor(&font_name);
        if self.embedding != Embedding::None {
            let program = self
                .program(text)
                .with_context(|| format!("failed to prepare font program {}", font_name))?;
            let (key, stream) = match self.outlines {
                Outlines::TrueType => (
                    "FontFile2",
                    Stream::new(
                        dictionary! { "Length1" => Object::Integer(program.len() as i64) },
                        program,
                    ),
                ),
                Outlines::Cff => (
                    "FontFile3",
                    Stream::new(dictionary! { "Subtype" => "OpenType" }, program),
                ),
            };
            let program_id = doc.add_object(stream);
            descriptor.set(key, program_id);
        }
        let descriptor_id = doc.add_object(descriptor);

        let widths: Vec<Object> = text
            .glyphs
            .keys()
            .flat_map(|id| {
                [
                    Object::Integer(i64::from(*id)),
                    Object::Array(vec![Object::Integer(self.glyph_width(*id))]),
                ]
            })
            .collect();
        let subtype = match self.outlines {
            Outlines::TrueType => "CIDFontType2",
            Outlines::Cff => "CIDFontType0",
        };
        let mut cid_font = dictionary! {
            "Type" => "Font",
            "Subtype" => subtype,
            "BaseFont" => Object::Name(font_name.clone().into_bytes()),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => Object::Integer(0),
            },
            "FontDescriptor" => descriptor_id,
            "DW" => Object::Integer(self.glyph_width(0)),
            "W" => Object::Array(widths),
        };
        if self.outlines == Outlines::TrueType {
            cid_font.set("CIDToGIDMap", "Identity");
        }
        let cid_font_id = doc.add_object(cid_font);
        let to_unicode_id = doc.add_object(Stream::new(
            dictionary! {},
            to_unicode_cmap(&text.glyphs).into_bytes(),
        ));

        Ok(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => Object::Name(font_name.into_bytes()),
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(cid_font_id)],
            "ToUnicode" => to_unicode_id,
        }))
    }
}

/// Six uppercase letters derived from the font and the glyphs it carries.
fn subset_tag(post_script_name: &str, encoded: &[u8]) -> String {
    let mut input = post_script_name.as_bytes().to_vec();
    input.extend_from_slice(encoded);
    let digest = md5::compute(&input);
    digest.0[..6]
        .iter()
        .map(|byte| char::from(b'A' + byte % 26))
        .collect()
}

/// A `ToUnicode` CMap mapping each glyph id back to the character it was
/// chosen for, so viewers can copy and search the stamped text.
fn to_unicode_cmap(glyphs: &BTreeMap<u16, char>) -> String {
    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n");
    out.push_str("12 dict begin\n");
    out.push_str("begincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n");
    out.push_str("/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    let entries: Vec<(&u16, &char)> = glyphs.iter().collect();
    for chunk in entries.chunks(BFCHAR_CHUNK) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (id, ch) in chunk {
            let mut units = [0u16; 2];
            let utf16: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{:04X}", unit))
                .collect();
            out.push_str(&format!("<{:04X}> <{}>\n", id, utf16));
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\n");
    out.push_str("CMapName currentdict /CMap defineresource pop\n");
    out.push_str("end\nend\n");
    out
}

/// Font handle understood by the PDF renderer.
#[derive(Debug, Clone)]
pub enum PdfFont {
    Standard(StandardFont),
    Embedded(Arc<EmbeddableFont>),
}

impl PdfFont {
    /// WinAnsi bytes for the standard fonts, glyph ids for embedded faces.
    pub fn encode(&self, text: &str) -> EncodedText {
        match self {
            PdfFont::Standard(_) => EncodedText {
                bytes: winansi::encode(text),
                glyphs: BTreeMap::new(),
                missing: text
                    .chars()
                    .filter(|ch| !matches!(ch, '\n' | '\r' | '\t'))
                    .filter(|ch| winansi::encode_char(*ch).is_none())
                    .collect(),
            },
            PdfFont::Embedded(font) => font.encode(text),
        }
    }

    /// Width of encoded text in text-space units at `font_size`.
    pub fn text_width(&self, encoded: &EncodedText, font_size: f32) -> f32 {
        match self {
            PdfFont::Standard(font) => {
                afm::text_width(font.family, font.style, &encoded.bytes, font_size)
            }
            PdfFont::Embedded(font) => {
                let units: i64 = encoded
                    .bytes
                    .chunks_exact(2)
                    .map(|pair| font.glyph_width(u16::from_be_bytes([pair[0], pair[1]])))
                    .sum();
                units as f32 * font_size / 1000.0
            }
        }
    }

    /// The `Tj` operand: a literal string for single-byte text, hex for glyph ids.
    pub fn text_operand(&self, encoded: &EncodedText) -> Object {
        let format = match self {
            PdfFont::Standard(_) => StringFormat::Literal,
            PdfFont::Embedded(_) => StringFormat::Hexadecimal,
        };
        Object::String(encoded.bytes.clone(), format)
    }

    /// Styling the face lacks and the renderer has to imitate.
    pub fn synthetic_style(&self) -> FontStyle {
        match self {
            PdfFont::Standard(_) => FontStyle::Normal,
            PdfFont::Embedded(font) => font.synthetic,
        }
    }

    /// Adds the font dictionary (and descriptor and program, if any) to `doc`.
    pub fn write_to(&self, doc: &mut Document, encoded: &EncodedText) -> Result<ObjectId> {
        match self {
            PdfFont::Standard(font) => Ok(doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            })),
            PdfFont::Embedded(font) => font.write_to(doc, encoded),
        }
    }
}

/// Full embedding is refused only for restricted-licence faces; preview and
/// print faces may be embedded for a read-only document.
fn full_embedding_allowed(permissions: Option<Permissions>) -> bool {
    permissions != Some(Permissions::Restricted)
}

/// Licence and format checks for one embedding strategy.
fn check_embedding(face: &FaceData, embedding: Embedding) -> Result<Outlines, FontLoadError> {
    let parsed = face
        .face()
        .ok_or_else(|| FontLoadError::Malformed("face no longer parses".to_string()))?;
    let outlines = if parsed.tables().glyf.is_some() {
        Outlines::TrueType
    } else if parsed.tables().cff.is_some() {
        Outlines::Cff
    } else {
        return Err(FontLoadError::Rejected("no glyph outlines".to_string()));
    };
    let permissions = parsed.permissions();
    match embedding {
        Embedding::Full => {
            if !full_embedding_allowed(permissions) {
                return Err(FontLoadError::EmbeddingRestricted(format!(
                    "fsType {:?}",
                    permissions
                )));
            }
        }
        Embedding::None => {
            if face.post_script_name().is_none() {
                return Err(FontLoadError::Rejected(
                    "unembedded fonts need a PostScript name".to_string(),
                ));
            }
        }
        Embedding::Subset => {
            if permissions == Some(Permissions::Restricted) || !parsed.is_subsetting_allowed() {
                return Err(FontLoadError::EmbeddingRestricted(
                    "subsetting not permitted".to_string(),
                ));
            }
            if outlines != Outlines::TrueType {
                return Err(FontLoadError::Rejected(
                    "subsetting needs TrueType outlines".to_string(),
                ));
            }
        }
    }
    Ok(outlines)
}

fn fallback_post_script_name(face: &FaceData) -> String {
    face.post_script_name()
        .or(face.family())
        .unwrap_or("EmbeddedFont")
        .chars()
        .filter(|ch| ch.is_ascii_graphic() && !"[](){}<>/%#".contains(*ch))
        .collect()
}

/// The part of `requested` the face does not carry itself.
fn synthetic_style(face: &FaceData, requested: FontStyle) -> FontStyle {
    let (bold, italic) = face
        .face()
        .map(|parsed| (parsed.is_bold(), parsed.is_italic() || parsed.is_oblique()))
        .unwrap_or((false, false));
    FontStyle::from_flags(
        requested.is_bold() && !bold,
        requested.is_italic() && !italic,
    )
}

fn embeddable(
    face: FaceData,
    embedding: Embedding,
    style: FontStyle,
) -> Result<PdfFont, FontLoadError> {
    let outlines = check_embedding(&face, embedding)?;
    let post_script_name = fallback_post_script_name(&face);
    let synthetic = synthetic_style(&face, style);
    Ok(PdfFont::Embedded(Arc::new(EmbeddableFont {
        face,
        embedding,
        post_script_name,
        outlines,
        synthetic,
    })))
}

/// Produces [`PdfFont`] handles: standard-14 fonts for built-ins, embedded
/// or referenced TrueType/OpenType faces otherwise.
pub struct PdfFontBackend {
    system: SystemFonts,
}

impl PdfFontBackend {
    pub fn new(extra_dirs: Vec<PathBuf>) -> Self {
        Self {
            system: SystemFonts::new(extra_dirs),
        }
    }
}

impl FontBackend for PdfFontBackend {
    type Handle = PdfFont;

    fn name(&self) -> &'static str {
        "pdf"
    }

    fn builtin(&self, font: BuiltinFont, style: FontStyle) -> PdfFont {
        PdfFont::Standard(StandardFont {
            family: font,
            style,
        })
    }

    fn scan_system_fonts(&self) -> Vec<RegisteredFont> {
        self.system.registered()
    }

    fn instantiate(
        &self,
        font: &RegisteredFont,
        style: FontStyle,
    ) -> Result<PdfFont, FontLoadError> {
        let (data, index) = self
            .system
            .face_data(font.id)
            .ok_or_else(|| FontLoadError::NotRegistered(font.family.clone()))?;
        let face = FaceData::parse(data, index)?;
        let mut last_error = None;
        for embedding in [Embedding::Full, Embedding::None, Embedding::Subset] {
            match embeddable(face.clone(), embedding, style) {
                Ok(handle) => return Ok(handle),
                Err(err) => last_error = Some(err),
            }
        }
        Err(last_error.unwrap_or_else(|| FontLoadError::Rejected(font.family.clone())))
    }

    fn load_file(&self, request: FontFileRequest<'_>) -> Result<PdfFont, FontLoadError> {
        let data = Arc::new(std::fs::read(request.path)?);
        let face = FaceData::parse(data, request.index.unwrap_or(0))?;
        embeddable(face, request.embedding, request.style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::pdf::sfnt::tests::mapped_font;

    #[test]
    fn standard_names_follow_style() {
        let font = StandardFont {
            family: BuiltinFont::SansSerif,
            style: FontStyle::BoldItalic,
        };
        assert_eq!(font.base_font(), "Helvetica-BoldOblique");
        let font = StandardFont {
            family: BuiltinFont::Serif,
            style: FontStyle::Normal,
        };
        assert_eq!(font.base_font(), "Times-Roman");
    }

    #[test]
    fn builtin_handles_need_no_scan() {
        let backend = PdfFontBackend::new(Vec::new());
        let handle = backend.builtin(BuiltinFont::Monospace, FontStyle::Italic);
        assert!(matches!(
            handle,
            PdfFont::Standard(StandardFont {
                family: BuiltinFont::Monospace,
                style: FontStyle::Italic
            })
        ));
        assert!(!backend.system.is_loaded());
    }

    #[test]
    fn standard_font_dictionary_uses_winansi() {
        let mut doc = Document::with_version("1.7");
        let font = PdfFont::Standard(StandardFont {
            family: BuiltinFont::Serif,
            style: FontStyle::Bold,
        });
        let encoded = font.encode("Hi");
        let id = font.write_to(&mut doc, &encoded).expect("write font");
        let dict = doc.get_dictionary(id).expect("font dict");
        assert_eq!(
            dict.get(b"BaseFont").and_then(Object::as_name).expect("name"),
            b"Times-Bold"
        );
        assert_eq!(
            dict.get(b"Encoding").and_then(Object::as_name).expect("enc"),
            b"WinAnsiEncoding"
        );
    }

    #[test]
    fn subset_tags_are_six_uppercase_letters_and_stable() {
        let tag = subset_tag("AcmeSans-Regular", b"Hello");
        assert_eq!(tag.len(), 6);
        assert!(tag.chars().all(|ch| ch.is_ascii_uppercase()));
        assert_eq!(tag, subset_tag("AcmeSans-Regular", b"Hello"));
        assert_ne!(tag, subset_tag("AcmeSans-Regular", b"World"));
    }

    #[test]
    fn missing_font_file_is_an_io_error() {
        let backend = PdfFontBackend::new(Vec::new());
        let err = backend
            .load_file(FontFileRequest {
                path: std::path::Path::new("/definitely/missing/font.ttf"),
                index: None,
                embedding: Embedding::Full,
                style: FontStyle::Normal,
            })
            .expect_err("missing file");
        assert!(matches!(err, FontLoadError::Io(_)));
    }

    fn load_mapped(dir: &std::path::Path, text: &str, style: FontStyle) -> PdfFont {
        let chars: Vec<char> = text.chars().collect();
        let path = dir.join("mapped.ttf");
        std::fs::write(&path, mapped_font(&chars)).expect("write font");
        PdfFontBackend::new(Vec::new())
            .load_file(FontFileRequest {
                path: &path,
                index: None,
                embedding: Embedding::Full,
                style,
            })
            .expect("load mapped font")
    }

    #[test]
    fn embedded_faces_show_text_beyond_cp1252() {
        let dir = tempfile::tempdir().expect("tempdir");
        let font = load_mapped(dir.path(), "Иван Łukasz", FontStyle::Normal);
        let encoded = font.encode("Иван Łukasz");
        assert!(encoded.missing.is_empty());
        assert_eq!(encoded.bytes.len(), 22);
        // Sorted mapping: space=1 a=2 k=3 s=4 u=5 z=6 Ł=7 И=8 а=9 в=10 н=11.
        assert_eq!(&encoded.bytes[..10], &[0, 8, 0, 10, 0, 9, 0, 11, 0, 1]);
        assert!((font.text_width(&encoded, 10.0) - 77.0).abs() < 1e-3);
        assert!(matches!(
            font.text_operand(&encoded),
            Object::String(_, StringFormat::Hexadecimal)
        ));

        let mut doc = Document::with_version("1.7");
        let id = font.write_to(&mut doc, &encoded).expect("write font");
        let type0 = doc.get_dictionary(id).expect("type0");
        assert_eq!(type0.get(b"Subtype").and_then(Object::as_name).expect("subtype"), b"Type0");
        assert_eq!(
            type0.get(b"Encoding").and_then(Object::as_name).expect("encoding"),
            b"Identity-H"
        );

        let descendant_id = type0
            .get(b"DescendantFonts")
            .and_then(Object::as_array)
            .expect("descendants")[0]
            .as_reference()
            .expect("descendant ref");
        let cid_font = doc.get_dictionary(descendant_id).expect("cid font");
        assert_eq!(
            cid_font.get(b"Subtype").and_then(Object::as_name).expect("subtype"),
            b"CIDFontType2"
        );
        assert_eq!(
            cid_font.get(b"CIDToGIDMap").and_then(Object::as_name).expect("map"),
            b"Identity"
        );
        let widths = cid_font.get(b"W").and_then(Object::as_array).expect("widths");
        assert_eq!(widths.len(), 22);
        assert_eq!(widths[14].as_i64().expect("gid"), 8);
        assert_eq!(widths[15].as_array().expect("width")[0].as_i64().expect("w"), 800);
        let descriptor_id = cid_font
            .get(b"FontDescriptor")
            .and_then(Object::as_reference)
            .expect("descriptor");
        assert!(
            doc.get_dictionary(descriptor_id)
                .expect("descriptor")
                .has(b"FontFile2")
        );

        let cmap_id = type0
            .get(b"ToUnicode")
            .and_then(Object::as_reference)
            .expect("to unicode");
        let cmap = doc
            .get_object(cmap_id)
            .and_then(Object::as_stream)
            .expect("cmap stream");
        let cmap = String::from_utf8_lossy(&cmap.content);
        assert!(cmap.contains("11 beginbfchar"));
        assert!(cmap.contains("<0008> <0418>"));
        assert!(cmap.contains("<0007> <0141>"));
    }

    #[test]
    fn unmapped_characters_draw_notdef_and_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let font = load_mapped(dir.path(), "a", FontStyle::Normal);
        let encoded = font.encode("a日\n");
        assert_eq!(encoded.bytes, vec![0, 1, 0, 0]);
        assert_eq!(encoded.missing, vec!['日']);

        let standard = PdfFont::Standard(StandardFont {
            family: BuiltinFont::Serif,
            style: FontStyle::Normal,
        });
        let encoded = standard.encode("Ana日");
        assert_eq!(encoded.bytes, b"Ana?".to_vec());
        assert_eq!(encoded.missing, vec!['日']);
    }

    #[test]
    fn to_unicode_cmap_maps_glyphs_and_surrogates() {
        let glyphs = BTreeMap::from([(3u16, 'A'), (4u16, '\u{1F600}')]);
        let cmap = to_unicode_cmap(&glyphs);
        assert!(cmap.starts_with("/CIDInit /ProcSet findresource begin\n"));
        assert!(cmap.contains("2 beginbfchar\n<0003> <0041>\n<0004> <D83DDE00>\nendbfchar"));
        assert!(cmap.ends_with("end\nend\n"));
    }

    #[test]
    fn bfchar_blocks_hold_at_most_one_hundred_entries() {
        let glyphs: BTreeMap<u16, char> = (1..=150u16)
            .map(|id| (id, char::from_u32(0x400 + u32::from(id)).expect("char")))
            .collect();
        let cmap = to_unicode_cmap(&glyphs);
        assert!(cmap.contains("100 beginbfchar"));
        assert!(cmap.contains("50 beginbfchar"));
    }

    #[test]
    fn file_fonts_synthesize_the_style_they_lack() {
        let dir = tempfile::tempdir().expect("tempdir");
        let font = load_mapped(dir.path(), "a", FontStyle::BoldItalic);
        assert_eq!(font.synthetic_style(), FontStyle::BoldItalic);
        let plain = load_mapped(dir.path(), "a", FontStyle::Normal);
        assert_eq!(plain.synthetic_style(), FontStyle::Normal);
    }

    #[test]
    fn only_restricted_faces_block_full_embedding() {
        assert!(full_embedding_allowed(None));
        assert!(full_embedding_allowed(Some(Permissions::Installable)));
        assert!(full_embedding_allowed(Some(Permissions::Editable)));
        assert!(full_embedding_allowed(Some(Permissions::PreviewAndPrint)));
        assert!(!full_embedding_allowed(Some(Permissions::Restricted)));
    }
}
