use std::path::PathBuf;
use std::sync::Arc;
use usvg::fontdb;

use crate::font::{
    BuiltinFont, FaceData, FontBackend, FontFileRequest, FontLoadError, RegisteredFont,
    SystemFonts,
};
use crate::model::FontStyle;

#[cfg(target_os = "macos")]
fn builtin_families(font: BuiltinFont) -> &'static [&'static str] {
    match font {
        BuiltinFont::Serif => &["Times New Roman", "Times", "serif"],
        BuiltinFont::SansSerif => &["Helvetica", "Arial", "sans-serif"],
        BuiltinFont::Monospace => &["Courier", "Menlo", "monospace"],
    }
}

#[cfg(target_os = "windows")]
fn builtin_families(font: BuiltinFont) -> &'static [&'static str] {
    match font {
        BuiltinFont::Serif => &["Times New Roman", "serif"],
        BuiltinFont::SansSerif => &["Arial", "Segoe UI", "sans-serif"],
        BuiltinFont::Monospace => &["Courier New", "Consolas", "monospace"],
    }
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn builtin_families(font: BuiltinFont) -> &'static [&'static str] {
    match font {
        BuiltinFont::Serif => &["Liberation Serif", "DejaVu Serif", "Noto Serif", "serif"],
        BuiltinFont::SansSerif => &["Liberation Sans", "DejaVu Sans", "Noto Sans", "sans-serif"],
        BuiltinFont::Monospace => &[
            "Liberation Mono",
            "DejaVu Sans Mono",
            "Noto Sans Mono",
            "monospace",
        ],
    }
}

/// Font handle understood by the raster renderer: a CSS family list plus,
/// for fonts loaded from a file, a font database that also holds that file.
#[derive(Debug, Clone)]
pub struct RasterFont {
    pub families: Vec<String>,
    pub database: Option<Arc<fontdb::Database>>,
    pub bold: bool,
    pub italic: bool,
}

impl RasterFont {
    /// The `font-family` attribute value; generic keywords stay unquoted.
    pub fn css_family(&self) -> String {
        self.families
            .iter()
            .map(|family| match family.as_str() {
                "serif" | "sans-serif" | "monospace" | "cursive" | "fantasy" => family.clone(),
                _ => format!("'{}'", family.replace('\'', "")),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub struct RasterFontBackend {
    system: SystemFonts,
}

impl RasterFontBackend {
    pub fn new(extra_dirs: Vec<PathBuf>) -> Self {
        Self {
            system: SystemFonts::new(extra_dirs),
        }
    }

    /// The shared system font database; loads it on first call.
    pub fn database(&self) -> Arc<fontdb::Database> {
        self.system.database()
    }
}

impl FontBackend for RasterFontBackend {
    type Handle = RasterFont;

    fn name(&self) -> &'static str {
        "raster"
    }

    fn builtin(&self, font: BuiltinFont, style: FontStyle) -> RasterFont {
        RasterFont {
            families: builtin_families(font)
                .iter()
                .map(|family| family.to_string())
                .collect(),
            database: None,
            bold: style.is_bold(),
            italic: style.is_italic(),
        }
    }

    fn scan_system_fonts(&self) -> Vec<RegisteredFont> {
        self.system.registered()
    }

    fn instantiate(
        &self,
        font: &RegisteredFont,
        style: FontStyle,
    ) -> Result<RasterFont, FontLoadError> {
        Ok(RasterFont {
            families: vec![font.family.clone()],
            database: None,
            bold: style.is_bold(),
            italic: style.is_italic(),
        })
    }

    fn load_file(&self, request: FontFileRequest<'_>) -> Result<RasterFont, FontLoadError> {
        let data = Arc::new(std::fs::read(request.path)?);
        let face = FaceData::parse(data, request.index.unwrap_or(0))?;
        let family = face
            .family()
            .map(str::to_string)
            .ok_or_else(|| FontLoadError::Malformed("face has no family name".to_string()))?;
        // Built once per resolved handle; the resolver caches the handle.
        let mut database = (*self.system.database()).clone();
        database.load_font_source(fontdb::Source::Binary(face.shared_data()));
        Ok(RasterFont {
            families: vec![family],
            database: Some(Arc::new(database)),
            bold: request.style.is_bold(),
            italic: request.style.is_italic(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::Embedding;
    use crate::render::pdf::sfnt::tests::mapped_font;

    #[test]
    fn builtin_ends_with_generic_family() {
        let backend = RasterFontBackend::new(Vec::new());
        let font = backend.builtin(BuiltinFont::Monospace, FontStyle::Bold);
        assert_eq!(font.families.last().map(String::as_str), Some("monospace"));
        assert!(font.bold && !font.italic);
        assert!(font.database.is_none());
    }

    #[test]
    fn css_family_quotes_named_families() {
        let font = RasterFont {
            families: vec!["Noto Sans".to_string(), "O'Neil".to_string(), "serif".to_string()],
            database: None,
            bold: false,
            italic: false,
        };
        assert_eq!(font.css_family(), "'Noto Sans', 'ONeil', serif");
    }

    #[test]
    fn file_fonts_keep_style_and_carry_their_own_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mapped.ttf");
        std::fs::write(&path, mapped_font(&['A', 'b'])).expect("write font");
        let backend = RasterFontBackend::new(Vec::new());
        let font = backend
            .load_file(FontFileRequest {
                path: &path,
                index: None,
                embedding: Embedding::Full,
                style: FontStyle::BoldItalic,
            })
            .expect("load font");
        assert_eq!(font.families, vec!["Mapped Test".to_string()]);
        assert!(font.bold && font.italic);

        let database = font.database.expect("file database");
        assert_eq!(database.len(), backend.database().len() + 1);
        assert!(
            database
                .faces()
                .any(|face| face.families.iter().any(|(name, _)| name == "Mapped Test"))
        );
    }
}
