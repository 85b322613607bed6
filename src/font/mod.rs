pub mod backend;
pub mod catalog;
pub mod face;
pub mod system;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{OnceLock, RwLock};
use tracing::{debug, info, warn};

pub use backend::{
    BuiltinFont, Embedding, FontBackend, FontFileRequest, FontLoadError, FontSource,
    RegisteredFont,
};
pub use catalog::{FontCatalog, SystemFontCatalog};
pub use face::FaceData;
pub use system::SystemFonts;

use crate::model::FontStyle;
use catalog::{find_candidates, is_collection, normalize_for_file_match};

/// Upper bound on faces probed inside one collection file.
pub const MAX_COLLECTION_PROBE: u32 = 10;

const BUILTIN_ALIASES: &[(&str, BuiltinFont)] = &[
    ("helvetica", BuiltinFont::SansSerif),
    ("sans-serif", BuiltinFont::SansSerif),
    ("sansserif", BuiltinFont::SansSerif),
    ("times", BuiltinFont::Serif),
    ("times new roman", BuiltinFont::Serif),
    ("times-roman", BuiltinFont::Serif),
    ("serif", BuiltinFont::Serif),
    ("courier", BuiltinFont::Monospace),
    ("monospace", BuiltinFont::Monospace),
    ("monospaced", BuiltinFont::Monospace),
];

fn builtin_alias(normalized: &str) -> Option<BuiltinFont> {
    BUILTIN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, font)| *font)
}

#[derive(Debug, Clone)]
pub struct ResolvedFont<H> {
    pub handle: H,
    pub source: FontSource,
}

enum Step<H> {
    Found(ResolvedFont<H>),
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FontCategory {
    BuiltIn,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FontInfo {
    pub name: String,
    pub category: FontCategory,
}

/// Faces registered by the system scan, ordered by family.
#[derive(Debug, Default)]
pub struct Registry {
    fonts: Vec<RegisteredFont>,
}

impl Registry {
    fn new(mut fonts: Vec<RegisteredFont>) -> Self {
        fonts.sort_by(|a, b| {
            a.family
                .to_lowercase()
                .cmp(&b.family.to_lowercase())
                .then_with(|| a.post_script_name.cmp(&b.post_script_name))
        });
        Self { fonts }
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn families(&self) -> Vec<String> {
        let mut families: Vec<String> = Vec::new();
        for font in &self.fonts {
            let known = families
                .last()
                .map(|last| last.eq_ignore_ascii_case(&font.family))
                .unwrap_or(false);
            if !known {
                families.push(font.family.clone());
            }
        }
        families
    }

    fn contains_family(&self, normalized: &str) -> bool {
        self.fonts
            .iter()
            .any(|font| font.family.to_lowercase() == normalized)
    }

    /// Exact family match first, then the first family that contains the
    /// name or is contained by it.
    fn matching_family(&self, normalized: &str) -> Option<&str> {
        if normalized.is_empty() {
            return None;
        }
        if let Some(font) = self
            .fonts
            .iter()
            .find(|font| font.family.to_lowercase() == normalized)
        {
            return Some(font.family.as_str());
        }
        self.fonts
            .iter()
            .find(|font| {
                let family = font.family.to_lowercase();
                !family.is_empty()
                    && (family.contains(normalized) || normalized.contains(family.as_str()))
            })
            .map(|font| font.family.as_str())
    }

    fn best_face(&self, family: &str, style: FontStyle) -> Option<&RegisteredFont> {
        self.fonts
            .iter()
            .filter(|font| font.family == family)
            .min_by_key(|font| font.style_distance(style))
    }
}

/// Turns a requested font name into a backend handle through four ordered
/// tiers: built-in aliases, registered system faces, font files on disk and
/// finally the built-in serif.
pub struct FontResolver<B: FontBackend> {
    backend: B,
    catalog: Box<dyn FontCatalog>,
    registry: OnceLock<Registry>,
    cache: RwLock<HashMap<(String, FontStyle), ResolvedFont<B::Handle>>>,
}

impl<B: FontBackend> FontResolver<B> {
    pub fn new(backend: B) -> Self {
        Self::with_catalog(backend, SystemFontCatalog::default())
    }

    pub fn with_catalog(backend: B, catalog: impl FontCatalog + 'static) -> Self {
        Self {
            backend,
            catalog: Box::new(catalog),
            registry: OnceLock::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The system registry, scanned on first use.
    pub fn registry(&self) -> &Registry {
        self.registry.get_or_init(|| {
            debug!(backend = self.backend.name(), "scanning system fonts");
            let registry = Registry::new(self.backend.scan_system_fonts());
            info!(
                backend = self.backend.name(),
                "font registry holds {} faces",
                registry.len()
            );
            registry
        })
    }

    pub fn resolve(&self, name: Option<&str>, style: FontStyle) -> B::Handle {
        self.resolve_detailed(name, style).handle
    }

    pub fn resolve_detailed(&self, name: Option<&str>, style: FontStyle) -> ResolvedFont<B::Handle> {
        let normalized = name.map(|n| n.trim().to_lowercase()).unwrap_or_default();
        if normalized.is_empty() {
            return self.fallback(style);
        }
        let key = (normalized, style);
        if let Some(hit) = self.read_cache(&key) {
            return hit;
        }
        let resolved = self.resolve_uncached(&key.0, style);
        debug!(
            font = %key.0,
            ?style,
            source = ?resolved.source,
            "resolved font"
        );
        let mut cache = self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.entry(key).or_insert(resolved).clone()
    }

    /// True when `name` is a built-in alias or a registered family.
    pub fn is_registered(&self, name: &str) -> bool {
        let normalized = name.trim().to_lowercase();
        if normalized.is_empty() {
            return false;
        }
        builtin_alias(&normalized).is_some() || self.registry().contains_family(&normalized)
    }

    pub fn available_fonts(&self) -> Vec<FontInfo> {
        let mut fonts: Vec<FontInfo> = BuiltinFont::ALL
            .iter()
            .map(|font| FontInfo {
                name: font.display_name().to_string(),
                category: FontCategory::BuiltIn,
            })
            .collect();
        let mut system = self.registry().families();
        system.sort_by_key(|family| family.to_lowercase());
        system.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        fonts.extend(
            system
                .into_iter()
                .filter(|family| {
                    !BuiltinFont::ALL
                        .iter()
                        .any(|font| font.display_name().eq_ignore_ascii_case(family))
                })
                .map(|name| FontInfo {
                    name,
                    category: FontCategory::System,
                }),
        );
        fonts
    }

    fn read_cache(&self, key: &(String, FontStyle)) -> Option<ResolvedFont<B::Handle>> {
        let cache = self
            .cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.get(key).cloned()
    }

    fn resolve_uncached(&self, normalized: &str, style: FontStyle) -> ResolvedFont<B::Handle> {
        let tiers: [&dyn Fn() -> Step<B::Handle>; 3] = [
            &|| self.try_builtin(normalized, style),
            &|| self.try_registry(normalized, style),
            &|| self.try_filesystem(normalized, style),
        ];
        for tier in tiers {
            if let Step::Found(resolved) = tier() {
                return resolved;
            }
        }
        warn!(
            "font '{}' not found; falling back to {}",
            normalized,
            BuiltinFont::Serif.display_name()
        );
        self.fallback(style)
    }

    fn try_builtin(&self, normalized: &str, style: FontStyle) -> Step<B::Handle> {
        match builtin_alias(normalized) {
            Some(font) => Step::Found(ResolvedFont {
                handle: self.backend.builtin(font, style),
                source: FontSource::Builtin(font),
            }),
            None => Step::Next,
        }
    }

    fn try_registry(&self, normalized: &str, style: FontStyle) -> Step<B::Handle> {
        let registry = self.registry();
        let Some(family) = registry.matching_family(normalized) else {
            return Step::Next;
        };
        let Some(face) = registry.best_face(family, style) else {
            return Step::Next;
        };
        match self.backend.instantiate(face, style) {
            Ok(handle) => Step::Found(ResolvedFont {
                handle,
                source: FontSource::Registry {
                    family: face.family.clone(),
                },
            }),
            Err(err) => {
                debug!("registered font {} unusable: {}", face.post_script_name, err);
                Step::Next
            }
        }
    }

    fn try_filesystem(&self, normalized: &str, style: FontStyle) -> Step<B::Handle> {
        let file_name = normalize_for_file_match(normalized);
        if file_name.is_empty() {
            return Step::Next;
        }
        for dir in self.catalog.directories() {
            for path in find_candidates(&dir, &file_name) {
                if let Step::Found(resolved) = self.try_file(&path, style) {
                    return Step::Found(resolved);
                }
            }
        }
        Step::Next
    }

    fn try_file(&self, path: &Path, style: FontStyle) -> Step<B::Handle> {
        if !is_collection(path) {
            return match self.load_with_fallbacks(path, None, style) {
                Ok(resolved) => Step::Found(resolved),
                Err(err) => {
                    debug!("skipping font file {}: {}", path.display(), err);
                    Step::Next
                }
            };
        }
        for index in 0..MAX_COLLECTION_PROBE {
            match self.load_with_fallbacks(path, Some(index), style) {
                Ok(resolved) => return Step::Found(resolved),
                Err(FontLoadError::IndexOutOfRange { .. }) => break,
                Err(err) => {
                    debug!(
                        "skipping face {} of collection {}: {}",
                        index,
                        path.display(),
                        err
                    );
                }
            }
        }
        Step::Next
    }

    /// Full embedding, then no embedding when the licence refuses, then a
    /// subset when the backend rejects an unembedded font.
    fn load_with_fallbacks(
        &self,
        path: &Path,
        index: Option<u32>,
        style: FontStyle,
    ) -> Result<ResolvedFont<B::Handle>, FontLoadError> {
        let mut embedding = Embedding::Full;
        loop {
            let request = FontFileRequest {
                path,
                index,
                embedding,
                style,
            };
            match self.backend.load_file(request) {
                Ok(handle) => {
                    return Ok(ResolvedFont {
                        handle,
                        source: FontSource::File {
                            path: path.to_path_buf(),
                            index,
                            embedding,
                        },
                    });
                }
                Err(FontLoadError::EmbeddingRestricted(reason)) if embedding == Embedding::Full => {
                    debug!("{}: {}; retrying unembedded", path.display(), reason);
                    embedding = Embedding::None;
                }
                Err(FontLoadError::Rejected(reason)) if embedding == Embedding::None => {
                    debug!("{}: {}; retrying as subset", path.display(), reason);
                    embedding = Embedding::Subset;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn fallback(&self, style: FontStyle) -> ResolvedFont<B::Handle> {
        ResolvedFont {
            handle: self.backend.builtin(BuiltinFont::Serif, style),
            source: FontSource::Fallback,
        }
    }
}
