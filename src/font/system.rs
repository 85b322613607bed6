use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::info;
use usvg::fontdb;

use super::backend::RegisteredFont;

struct Loaded {
    database: Arc<fontdb::Database>,
    registered: Vec<RegisteredFont>,
}

/// Installed fonts plus any configured extra directories, loaded into a
/// `fontdb` database on first use and shared afterwards.
pub struct SystemFonts {
    extra_dirs: Vec<PathBuf>,
    loaded: OnceLock<Loaded>,
}

impl SystemFonts {
    pub fn new(extra_dirs: Vec<PathBuf>) -> Self {
        Self {
            extra_dirs,
            loaded: OnceLock::new(),
        }
    }

    fn loaded(&self) -> &Loaded {
        self.loaded.get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            for dir in &self.extra_dirs {
                db.load_fonts_dir(dir);
            }
            let registered = registered_faces(&db);
            info!(
                "loaded {} font faces ({} families)",
                registered.len(),
                count_families(&registered)
            );
            Loaded {
                database: Arc::new(db),
                registered,
            }
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    pub fn database(&self) -> Arc<fontdb::Database> {
        Arc::clone(&self.loaded().database)
    }

    pub fn registered(&self) -> Vec<RegisteredFont> {
        self.loaded().registered.clone()
    }

    /// Raw bytes of the file holding face `id`, with the face's index inside it.
    pub fn face_data(&self, id: fontdb::ID) -> Option<(Arc<Vec<u8>>, u32)> {
        self.loaded()
            .database
            .with_face_data(id, |data, index| (Arc::new(data.to_vec()), index))
    }
}

pub(crate) fn registered_faces(db: &fontdb::Database) -> Vec<RegisteredFont> {
    db.faces()
        .filter_map(|face| {
            let family = face.families.first()?.0.clone();
            Some(RegisteredFont {
                family,
                post_script_name: face.post_script_name.clone(),
                bold: face.weight.0 >= fontdb::Weight::SEMIBOLD.0,
                italic: face.style != fontdb::Style::Normal,
                id: face.id,
            })
        })
        .collect()
}

fn count_families(fonts: &[RegisteredFont]) -> usize {
    let mut families: Vec<String> = fonts.iter().map(|f| f.family.to_lowercase()).collect();
    families.sort();
    families.dedup();
    families.len()
}
