use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::executor::{DEFAULT_BATCH_TIMEOUT, DEFAULT_SEQUENTIAL_THRESHOLD};
use crate::model::{DEFAULT_FONT, DEFAULT_FONT_SIZE};

pub const SETTINGS_FILE: &str = "bulk-render.toml";
pub const LOCAL_SETTINGS_FILE: &str = "bulk-render.local.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub font: String,
    pub font_size: f32,
    pub color: String,
    pub threads: usize,
    pub sequential_threshold: usize,
    pub timeout_secs: u64,
    pub font_directories: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font: DEFAULT_FONT.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            color: "#000000".to_string(),
            threads: num_cpus::get().max(1),
            sequential_threshold: DEFAULT_SEQUENTIAL_THRESHOLD,
            timeout_secs: DEFAULT_BATCH_TIMEOUT.as_secs(),
            font_directories: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    render: Option<RenderSettings>,
    fonts: Option<FontSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RenderSettings {
    font: Option<String>,
    font_size: Option<f32>,
    color: Option<String>,
    threads: Option<usize>,
    sequential_threshold: Option<usize>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FontSettings {
    directories: Option<Vec<PathBuf>>,
}

/// Loads settings from the working directory plus an optional explicit file.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    load_settings_in(Path::new("."), extra_path)
}

/// Merges `bulk-render.toml`, then `bulk-render.local.toml` from `base`, then
/// `extra_path` (which must exist). Later files win key by key.
pub fn load_settings_in(base: &Path, extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    let mut ordered_paths = vec![base.join(SETTINGS_FILE), base.join(LOCAL_SETTINGS_FILE)];
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            let relative_to = path.parent().unwrap_or(base).to_path_buf();
            settings.merge(parsed, &relative_to);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile, relative_to: &Path) {
        if let Some(render) = incoming.render {
            if let Some(font) = render.font {
                if !font.trim().is_empty() {
                    self.font = font;
                }
            }
            if let Some(size) = render.font_size {
                if size.is_finite() && size > 0.0 {
                    self.font_size = size;
                }
            }
            if let Some(color) = render.color {
                if !color.trim().is_empty() {
                    self.color = color;
                }
            }
            if let Some(threads) = render.threads {
                if threads > 0 {
                    self.threads = threads;
                }
            }
            if let Some(threshold) = render.sequential_threshold {
                self.sequential_threshold = threshold;
            }
            if let Some(timeout) = render.timeout_secs {
                if timeout > 0 {
                    self.timeout_secs = timeout;
                }
            }
        }
        if let Some(fonts) = incoming.fonts {
            if let Some(directories) = fonts.directories {
                // Relative directories are resolved against the file naming them.
                self.font_directories = directories
                    .into_iter()
                    .map(|dir| {
                        if dir.is_relative() {
                            relative_to.join(dir)
                        } else {
                            dir
                        }
                    })
                    .collect();
            }
        }
    }
}
