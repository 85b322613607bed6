mod afm;
pub mod font;
pub mod sfnt;
pub mod winansi;

use anyhow::{Context, Result, anyhow};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::font::FontResolver;
use crate::model::{RenderJob, StyleConfig};
use crate::render::Renderer;
pub use font::{EncodedText, PdfFont, PdfFontBackend, StandardFont};

/// US Letter, used when a page carries no MediaBox anywhere in its tree.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
const FONT_KEY_PREFIX: &str = "FStamp";
/// Stroke width, as a fraction of the font size, that fakes a bold face.
const SYNTHETIC_BOLD_STROKE: f32 = 0.03;
/// Horizontal shear (about tan 12°) that fakes an italic face.
const SYNTHETIC_SKEW: f32 = 0.21;

/// Stamps job text onto the first page of a PDF template.
pub struct PdfRenderer {
    fonts: Arc<FontResolver<PdfFontBackend>>,
}

impl PdfRenderer {
    pub fn new(fonts: Arc<FontResolver<PdfFontBackend>>) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontResolver<PdfFontBackend> {
        &self.fonts
    }
}

impl Renderer for PdfRenderer {
    fn render(&self, job: &RenderJob) -> Result<()> {
        let mut doc = Document::load(&job.template_path).with_context(|| {
            format!("failed to load PDF template: {}", job.template_path.display())
        })?;
        let font = self
            .fonts
            .resolve(job.style.font_name.as_deref(), job.style.font_style);
        stamp_text(&mut doc, &job.text, &job.style, &font)?;
        doc.save(&job.output_path)
            .with_context(|| format!("failed to write PDF: {}", job.output_path.display()))?;
        debug!("wrote {}", job.output_path.display());
        Ok(())
    }
}

/// Draws `text` on page 1 of `doc`. Coordinates in `style` are measured from
/// the top-left corner of the page in points.
pub fn stamp_text(doc: &mut Document, text: &str, style: &StyleConfig, font: &PdfFont) -> Result<()> {
    let page_id = doc
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| anyhow!("PDF template has no pages"))?;
    let media_box = media_box(doc, page_id);

    let encoded = font.encode(text);
    if !encoded.missing.is_empty() {
        let missing: String = encoded.missing.iter().collect();
        warn!("font has no glyphs for {:?} in {:?}", missing, text);
    }
    let width = font.text_width(&encoded, style.font_size);
    let x = media_box[0] + style.x + style.alignment.offset(width);
    let y = media_box[3] - style.y;

    let font_id = font.write_to(doc, &encoded)?;
    let font_key = attach_font(doc, page_id, font_id)?;

    let [r, g, b] = style.color.unit_components();
    let synthetic = font.synthetic_style();
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font_key.into_bytes()), style.font_size.into()],
        ),
        Operation::new("rg", vec![r.into(), g.into(), b.into()]),
    ];
    if synthetic.is_bold() {
        operations.push(Operation::new("RG", vec![r.into(), g.into(), b.into()]));
        operations.push(Operation::new(
            "w",
            vec![(style.font_size * SYNTHETIC_BOLD_STROKE).into()],
        ));
        operations.push(Operation::new("Tr", vec![Object::Integer(2)]));
    }
    if synthetic.is_italic() {
        operations.push(Operation::new(
            "Tm",
            vec![
                1.0f32.into(),
                0.0f32.into(),
                SYNTHETIC_SKEW.into(),
                1.0f32.into(),
                x.into(),
                y.into(),
            ],
        ));
    } else {
        operations.push(Operation::new("Td", vec![x.into(), y.into()]));
    }
    operations.push(Operation::new("Tj", vec![font.text_operand(&encoded)]));
    operations.push(Operation::new("ET", vec![]));
    wrap_contents(doc, page_id, operations)
}

fn as_number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Looks `key` up on the page, then on each ancestor in the page tree.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok();
    let mut depth = 0;
    while let Some(dict) = current {
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        depth += 1;
        if depth > 32 {
            break;
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|parent| parent.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let parsed = inherited(doc, page_id, b"MediaBox")
        .and_then(|object| object.as_array().ok())
        .and_then(|values| {
            let numbers: Vec<f32> = values
                .iter()
                .filter_map(|value| resolve(doc, value).and_then(as_number))
                .collect();
            <[f32; 4]>::try_from(numbers).ok()
        });
    match parsed {
        Some([x0, y0, x1, y1]) => [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)],
        None => {
            warn!("page has no usable MediaBox; assuming US Letter");
            DEFAULT_MEDIA_BOX
        }
    }
}

/// Gives the page its own resource dictionary containing the stamp font and
/// returns the key the font is registered under.
fn attach_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<String> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|object| object.as_dict().ok())
        .cloned()
        .unwrap_or_default();
    let mut fonts: Dictionary = resources
        .get(b"Font")
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let mut key = FONT_KEY_PREFIX.to_string();
    let mut suffix = 1;
    while fonts.has(key.as_bytes()) {
        key = format!("{}{}", FONT_KEY_PREFIX, suffix);
        suffix += 1;
    }
    fonts.set(key.as_bytes(), font_id);
    resources.set("Font", Object::Dictionary(fonts));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| anyhow!("page object is not a dictionary: {}", err))?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(key)
}

/// Brackets the existing page content in `q`/`Q` so its graphics state cannot
/// leak into the stamp, then appends the stamp stream.
fn wrap_contents(doc: &mut Document, page_id: ObjectId, stamp: Vec<Operation>) -> Result<()> {
    let existing: Vec<Object> = match doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Contents").ok())
    {
        Some(Object::Array(items)) => items.clone(),
        Some(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    let mut operations = Vec::with_capacity(stamp.len() + 1);
    if !existing.is_empty() {
        let save = Content {
            operations: vec![Operation::new("q", vec![])],
        };
        let save_id = doc.add_object(Stream::new(dictionary! {}, encode_content(save)?));
        contents.push(Object::Reference(save_id));
        contents.extend(existing);
        operations.push(Operation::new("Q", vec![]));
    }
    operations.extend(stamp);
    let stamp_id = doc.add_object(Stream::new(
        dictionary! {},
        encode_content(Content { operations })?,
    ));
    contents.push(Object::Reference(stamp_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| anyhow!("page object is not a dictionary: {}", err))?;
    page.set("Contents", Object::Array(contents));
    Ok(())
}

fn encode_content(content: Content) -> Result<Vec<u8>> {
    content
        .encode()
        .map_err(|err| anyhow!("failed to encode content stream: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{BuiltinFont, Embedding, FontBackend, FontFileRequest};
    use crate::model::{Alignment, FontStyle, Rgb};
    use crate::render::pdf::sfnt::tests::mapped_font;
    use crate::test_util::blank_pdf;
    use lopdf::StringFormat;

    fn helvetica() -> PdfFont {
        PdfFont::Standard(StandardFont {
            family: BuiltinFont::SansSerif,
            style: FontStyle::Normal,
        })
    }

    fn page_operations(doc: &Document) -> Vec<Operation> {
        let page_id = *doc.get_pages().get(&1).expect("page 1");
        let bytes = doc.get_page_content(page_id).expect("content");
        Content::decode(&bytes).expect("decode").operations
    }

    fn operands(ops: &[Operation], operator: &str) -> Vec<f32> {
        ops.iter()
            .rfind(|op| op.operator == operator)
            .expect("operator present")
            .operands
            .iter()
            .filter_map(as_number)
            .collect()
    }

    fn close(actual: &[f32], expected: &[f32]) -> bool {
        actual.len() == expected.len()
            && actual.iter().zip(expected).all(|(a, b)| (a - b).abs() < 0.01)
    }

    #[test]
    fn stamps_text_with_flipped_y() {
        let mut doc = blank_pdf(200.0, 100.0);
        let mut style = StyleConfig::at(10.0, 30.0);
        style.font_size = 10.0;
        stamp_text(&mut doc, "Hello", &style, &helvetica()).expect("stamp");
        let ops = page_operations(&doc);
        let td = operands(&ops, "Td");
        assert!(close(&td, &[10.0, 70.0]), "{td:?}");
        let tj = ops.iter().rfind(|op| op.operator == "Tj").expect("Tj");
        assert_eq!(
            tj.operands[0].as_str().expect("string"),
            b"Hello".as_slice()
        );
        assert_eq!(ops.first().map(|op| op.operator.as_str()), Some("q"));
        let restore = ops.iter().position(|op| op.operator == "Q").expect("Q");
        let stamp = ops.iter().rposition(|op| op.operator == "BT").expect("BT");
        assert!(restore < stamp);
    }

    #[test]
    fn alignment_shifts_by_measured_width() {
        let mut doc = blank_pdf(200.0, 100.0);
        let mut style = StyleConfig::at(100.0, 50.0);
        style.font_size = 10.0;
        style.alignment = Alignment::Right;
        style.color = Rgb::parse_hex("#ff0000").expect("color");
        // "Hello" in Helvetica is 22.78pt wide at 10pt.
        stamp_text(&mut doc, "Hello", &style, &helvetica()).expect("stamp");
        let ops = page_operations(&doc);
        let td = operands(&ops, "Td");
        assert!(close(&td, &[77.22, 50.0]), "{td:?}");
        let rg = operands(&ops, "rg");
        assert!(close(&rg, &[1.0, 0.0, 0.0]), "{rg:?}");
    }

    #[test]
    fn font_is_registered_in_page_resources() {
        let mut doc = blank_pdf(200.0, 100.0);
        stamp_text(&mut doc, "Hi", &StyleConfig::at(0.0, 0.0), &helvetica()).expect("stamp");
        let page_id = *doc.get_pages().get(&1).expect("page");
        let page = doc.get_dictionary(page_id).expect("page dict");
        let resources = page
            .get(b"Resources")
            .and_then(Object::as_dict)
            .expect("inline resources");
        let fonts = resources
            .get(b"Font")
            .and_then(Object::as_dict)
            .expect("font dict");
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(FONT_KEY_PREFIX.as_bytes()));
    }

    #[test]
    fn missing_media_box_defaults_to_letter() {
        let mut doc = blank_pdf(200.0, 100.0);
        let page_id = *doc.get_pages().get(&1).expect("page");
        doc.get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .expect("page dict")
            .remove(b"MediaBox");
        assert_eq!(media_box(&doc, page_id), DEFAULT_MEDIA_BOX);
    }

    #[test]
    fn saved_output_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.pdf");
        let mut doc = blank_pdf(300.0, 300.0);
        stamp_text(&mut doc, "Grüße", &StyleConfig::at(20.0, 20.0), &helvetica()).expect("stamp");
        doc.save(&path).expect("save");
        let reloaded = Document::load(&path).expect("reload");
        assert_eq!(reloaded.get_pages().len(), 1);
    }

    fn mapped(dir: &std::path::Path, text: &str, style: FontStyle) -> PdfFont {
        let chars: Vec<char> = text.chars().collect();
        let path = dir.join("names.ttf");
        std::fs::write(&path, mapped_font(&chars)).expect("write font");
        PdfFontBackend::new(Vec::new())
            .load_file(FontFileRequest {
                path: &path,
                index: None,
                embedding: Embedding::Subset,
                style,
            })
            .expect("load font")
    }

    #[test]
    fn non_latin_names_survive_an_embedded_face() {
        let dir = tempfile::tempdir().expect("tempdir");
        let font = mapped(dir.path(), "Иван Łukasz", FontStyle::Normal);
        let path = dir.path().join("out.pdf");
        let mut doc = blank_pdf(300.0, 100.0);
        stamp_text(&mut doc, "Иван Łukasz", &StyleConfig::at(10.0, 40.0), &font).expect("stamp");
        doc.save(&path).expect("save");

        let reloaded = Document::load(&path).expect("reload");
        let ops = page_operations(&reloaded);
        let tj = ops.iter().rfind(|op| op.operator == "Tj").expect("Tj");
        let Object::String(bytes, _) = &tj.operands[0] else {
            panic!("Tj operand is not a string");
        };
        assert_eq!(bytes.len(), 22);
        assert!(!bytes.chunks_exact(2).any(|pair| pair == [0, 0]), "no .notdef");
        assert!(!bytes.contains(&b'?'));
        assert!(ops.iter().any(|op| op.operator == "Td"));
        assert!(!ops.iter().any(|op| op.operator == "Tr"));
    }

    #[test]
    fn embedded_text_is_written_as_hex_glyph_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let font = mapped(dir.path(), "Zoë", FontStyle::Normal);
        let mut doc = blank_pdf(200.0, 100.0);
        stamp_text(&mut doc, "Zoë", &StyleConfig::at(0.0, 10.0), &font).expect("stamp");
        let ops = page_operations(&doc);
        let tj = ops.iter().rfind(|op| op.operator == "Tj").expect("Tj");
        // Sorted mapping: Z=1 o=2 ë=3.
        assert_eq!(
            tj.operands[0],
            Object::String(vec![0, 1, 0, 2, 0, 3], StringFormat::Hexadecimal)
        );
    }

    #[test]
    fn missing_bold_and_italic_are_synthesized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let font = mapped(dir.path(), "Ada", FontStyle::BoldItalic);
        let mut doc = blank_pdf(200.0, 100.0);
        let mut style = StyleConfig::at(10.0, 30.0);
        style.font_size = 20.0;
        stamp_text(&mut doc, "Ada", &style, &font).expect("stamp");
        let ops = page_operations(&doc);
        assert!(close(&operands(&ops, "Tr"), &[2.0]));
        assert!(close(&operands(&ops, "w"), &[0.6]));
        assert!(close(&operands(&ops, "Tm"), &[1.0, 0.0, 0.21, 1.0, 10.0, 70.0]));
        assert!(!ops.iter().skip_while(|op| op.operator != "BT").any(|op| op.operator == "Td"));
    }
}
