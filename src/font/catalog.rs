use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Maximum directory depth walked below each font root. Vendors commonly nest
/// fonts one or two levels deep (`Supplemental/`, `truetype/dejavu/`).
pub const MAX_WALK_DEPTH: usize = 3;

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc", "otc"];
const COLLECTION_EXTENSIONS: &[&str] = &["ttc", "otc"];

/// Supplies the directories searched during filesystem discovery.
pub trait FontCatalog: Send + Sync {
    fn directories(&self) -> Vec<PathBuf>;
}

#[derive(Debug, Clone, Default)]
pub struct SystemFontCatalog {
    extra: Vec<PathBuf>,
}

impl SystemFontCatalog {
    pub fn new(extra: Vec<PathBuf>) -> Self {
        Self { extra }
    }
}

impl FontCatalog for SystemFontCatalog {
    fn directories(&self) -> Vec<PathBuf> {
        let mut dirs = self.extra.clone();
        dirs.extend(platform_font_dirs());
        dirs.retain(|dir| dir.is_dir());
        dirs.dedup();
        dirs
    }
}

#[cfg(target_os = "macos")]
fn platform_font_dirs() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join("Library/Fonts"));
    }
    roots.push(PathBuf::from("/Library/Fonts"));
    roots.push(PathBuf::from("/System/Library/Fonts"));
    roots
}

#[cfg(target_os = "windows")]
fn platform_font_dirs() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(windir) = std::env::var_os("WINDIR") {
        roots.push(PathBuf::from(windir).join("Fonts"));
    }
    if let Some(local) = dirs::data_local_dir() {
        roots.push(local.join("Microsoft/Windows/Fonts"));
    }
    roots
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_font_dirs() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".fonts"));
        roots.push(home.join(".local/share/fonts"));
    }
    roots.push(PathBuf::from("/usr/share/fonts"));
    roots.push(PathBuf::from("/usr/local/share/fonts"));
    roots
}

/// Lowercase and strip everything that is not an ASCII letter or digit.
pub fn normalize_for_file_match(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

pub fn is_collection(path: &Path) -> bool {
    has_extension(path, COLLECTION_EXTENSIONS)
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed.iter().any(|item| ext.eq_ignore_ascii_case(item)))
        .unwrap_or(false)
}

/// Font files under `root` whose normalized stem contains the normalized name
/// or is contained by it.
pub fn find_candidates(root: &Path, normalized_name: &str) -> Vec<PathBuf> {
    if normalized_name.is_empty() {
        return Vec::new();
    }
    let mut files = Vec::new();
    walk(root, 0, &mut files);
    files.sort();
    files.retain(|path| {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(normalize_for_file_match)
            .unwrap_or_default();
        !stem.is_empty() && (stem.contains(normalized_name) || normalized_name.contains(&stem))
    });
    files
}

fn walk(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("cannot read font directory {}: {}", dir.display(), err);
            return;
        }
    };
    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() || (file_type.is_symlink() && path.is_dir()) {
            if depth + 1 < MAX_WALK_DEPTH {
                walk(&path, depth + 1, out);
            }
        } else if has_extension(&path, FONT_EXTENSIONS) {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn normalizes_names_for_matching() {
        assert_eq!(normalize_for_file_match("Fira Code-Bold!"), "firacodebold");
        assert_eq!(normalize_for_file_match("---"), "");
    }

    #[test]
    fn finds_fonts_in_nested_vendor_folders() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("truetype").join("acme");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(nested.join("Acme-Sans.ttf"), b"x").expect("write");
        fs::write(dir.path().join("AcmeSans.txt"), b"x").expect("write");
        fs::write(dir.path().join("Other.otf"), b"x").expect("write");
        let too_deep = dir.path().join("a").join("b").join("c");
        fs::create_dir_all(&too_deep).expect("mkdir");
        fs::write(too_deep.join("AcmeSans.ttf"), b"x").expect("write");

        let found = find_candidates(dir.path(), "acmesans");
        assert_eq!(found, vec![nested.join("Acme-Sans.ttf")]);
    }

    #[test]
    fn matches_in_either_direction() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("Georgia.ttf"), b"x").expect("write");
        fs::write(dir.path().join("GeorgiaBoldItalic.TTF"), b"x").expect("write");
        // Name contains file stem.
        let found = find_candidates(dir.path(), "georgiapro");
        assert_eq!(found, vec![dir.path().join("Georgia.ttf")]);
        // File stem contains name.
        assert_eq!(find_candidates(dir.path(), "georgia").len(), 2);
        assert!(find_candidates(dir.path(), "").is_empty());
    }

    #[test]
    fn collection_extensions_are_detected() {
        assert!(is_collection(Path::new("/fonts/Helvetica.ttc")));
        assert!(is_collection(Path::new("/fonts/Noto.OTC")));
        assert!(!is_collection(Path::new("/fonts/Arial.ttf")));
    }

    #[test]
    fn catalog_skips_missing_directories() {
        let dir = tempdir().expect("tempdir");
        let catalog = SystemFontCatalog::new(vec![
            dir.path().to_path_buf(),
            dir.path().join("missing"),
        ]);
        let dirs = catalog.directories();
        assert_eq!(dirs.first(), Some(&dir.path().to_path_buf()));
        assert!(!dirs.contains(&dir.path().join("missing")));
    }
}
