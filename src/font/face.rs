use std::sync::Arc;
use ttf_parser::{Face, GlyphId, name_id};

use super::backend::FontLoadError;

/// Parsed metadata for one face of a font file, with the raw bytes retained
/// so renderers can measure, embed or rasterize it later.
#[derive(Clone)]
pub struct FaceData {
    data: Arc<Vec<u8>>,
    index: u32,
    family: Option<String>,
    post_script_name: Option<String>,
    units_per_em: u16,
    space_advance: u16,
}

impl std::fmt::Debug for FaceData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceData")
            .field("index", &self.index)
            .field("family", &self.family)
            .field("post_script_name", &self.post_script_name)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl FaceData {
    /// Parses face `index` of `data`. Indices past the end of a collection
    /// report [`FontLoadError::IndexOutOfRange`].
    pub fn parse(data: Arc<Vec<u8>>, index: u32) -> Result<Self, FontLoadError> {
        let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        if index >= count {
            return Err(FontLoadError::IndexOutOfRange { index, count });
        }
        let face =
            Face::parse(&data, index).map_err(|err| FontLoadError::Malformed(err.to_string()))?;
        let family = extract_family_name(&face);
        let post_script_name = extract_name(&face, name_id::POST_SCRIPT_NAME);
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        Ok(Self {
            data,
            index,
            family,
            post_script_name,
            units_per_em,
            space_advance,
        })
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn shared_data(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.data)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn post_script_name(&self) -> Option<&str> {
        self.post_script_name.as_deref()
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// Re-borrows the parsed face.
    pub fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.index).ok()
    }

    /// Horizontal advance of glyph `id` in font units; glyphs without metrics
    /// take the width of a space.
    pub fn glyph_advance(&self, id: u16) -> u16 {
        self.face()
            .and_then(|face| face.glyph_hor_advance(GlyphId(id)))
            .unwrap_or(self.space_advance)
    }
}

pub(crate) fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

fn extract_name(face: &Face<'_>, id: u16) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == id)
        .find_map(|name| name.to_string())
        .filter(|value| !value.trim().is_empty())
}
