use std::path::{Path, PathBuf};
use thiserror::Error;
use usvg::fontdb;

use crate::model::FontStyle;

/// Fonts every backend can produce without touching the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFont {
    Serif,
    SansSerif,
    Monospace,
}

impl BuiltinFont {
    pub const ALL: [BuiltinFont; 3] = [
        BuiltinFont::SansSerif,
        BuiltinFont::Monospace,
        BuiltinFont::Serif,
    ];

    /// Name shown when listing fonts.
    pub fn display_name(self) -> &'static str {
        match self {
            BuiltinFont::Serif => "Times New Roman",
            BuiltinFont::SansSerif => "Helvetica",
            BuiltinFont::Monospace => "Courier",
        }
    }
}

/// How a discovered font program ends up in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Embedding {
    Full,
    None,
    Subset,
}

#[derive(Debug, Error)]
pub enum FontLoadError {
    #[error("font licence does not permit this embedding: {0}")]
    EmbeddingRestricted(String),
    #[error("backend rejected the font: {0}")]
    Rejected(String),
    #[error("face index {index} is out of range (collection holds {count})")]
    IndexOutOfRange { index: u32, count: u32 },
    #[error("malformed font data: {0}")]
    Malformed(String),
    #[error("font is not registered: {0}")]
    NotRegistered(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A face found by the system font scan.
#[derive(Debug, Clone)]
pub struct RegisteredFont {
    pub family: String,
    pub post_script_name: String,
    pub bold: bool,
    pub italic: bool,
    pub id: fontdb::ID,
}

impl RegisteredFont {
    pub(crate) fn style_distance(&self, style: FontStyle) -> u8 {
        u8::from(self.bold != style.is_bold()) + u8::from(self.italic != style.is_italic())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FontFileRequest<'a> {
    pub path: &'a Path,
    pub index: Option<u32>,
    pub embedding: Embedding,
    /// Style the caller asked for; a file holds one face, so backends imitate
    /// whatever the face itself lacks.
    pub style: FontStyle,
}

/// The capability surface the resolver needs from an output format.
pub trait FontBackend: Send + Sync {
    type Handle: Clone + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    /// Must not fail and must not touch the filesystem.
    fn builtin(&self, font: BuiltinFont, style: FontStyle) -> Self::Handle;

    /// Enumerates installed faces. Expensive; the resolver calls it at most once.
    fn scan_system_fonts(&self) -> Vec<RegisteredFont>;

    fn instantiate(
        &self,
        font: &RegisteredFont,
        style: FontStyle,
    ) -> Result<Self::Handle, FontLoadError>;

    fn load_file(&self, request: FontFileRequest<'_>) -> Result<Self::Handle, FontLoadError>;
}

/// Where a resolved handle came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    Builtin(BuiltinFont),
    Registry {
        family: String,
    },
    File {
        path: PathBuf,
        index: Option<u32>,
        embedding: Embedding,
    },
    Fallback,
}
