use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_FONT: &str = "Times New Roman";
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    /// Start offset of a run of `width` anchored at the requested position.
    pub fn offset(self, width: f32) -> f32 {
        match self {
            Alignment::Left => 0.0,
            Alignment::Center => -width / 2.0,
            Alignment::Right => -width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontStyle {
    #[default]
    Normal,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (true, true) => FontStyle::BoldItalic,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (false, false) => FontStyle::Normal,
        }
    }

    pub fn is_bold(self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalic)
    }

    pub fn is_italic(self) -> bool {
        matches!(self, FontStyle::Italic | FontStyle::BoldItalic)
    }
}

/// Coordinate unit accepted on the command line. Millimetres are converted at
/// 72 points per inch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MeasurementUnit {
    #[default]
    Px,
    Mm,
}

impl MeasurementUnit {
    pub fn pixel_multiplier(self) -> f32 {
        match self {
            MeasurementUnit::Px => 1.0,
            MeasurementUnit::Mm => 2.835,
        }
    }

    pub fn to_pixels(self, value: f32) -> f32 {
        value * self.pixel_multiplier()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    /// Parses `#RGB` or `#RRGGBB`, with or without the leading `#`. An empty
    /// string yields black.
    pub fn parse_hex(value: &str) -> Result<Self, StyleError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(Rgb::BLACK);
        }
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        let expanded: String = if hex.len() == 3 {
            hex.chars().flat_map(|ch| [ch, ch]).collect()
        } else {
            hex.to_string()
        };
        if expanded.len() != 6 || !expanded.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(StyleError::InvalidColor(value.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&expanded[range], 16)
                .map_err(|_| StyleError::InvalidColor(value.to_string()))
        };
        Ok(Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Components scaled to the 0.0..=1.0 range used by PDF colour operators.
    pub fn unit_components(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StyleError {
    #[error("invalid hex color '{0}': expected #RRGGBB or #RGB")]
    InvalidColor(String),
    #[error("font size must be a positive number (got {0})")]
    InvalidFontSize(f32),
    #[error("text position must be finite (got {x}, {y})")]
    InvalidPosition { x: f32, y: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    pub x: f32,
    pub y: f32,
    pub alignment: Alignment,
    pub font_name: Option<String>,
    pub font_size: f32,
    pub color: Rgb,
    pub font_style: FontStyle,
}

impl StyleConfig {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            alignment: Alignment::Left,
            font_name: Some(DEFAULT_FONT.to_string()),
            font_size: DEFAULT_FONT_SIZE,
            color: Rgb::BLACK,
            font_style: FontStyle::Normal,
        }
    }

    pub fn validate(&self) -> Result<(), StyleError> {
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(StyleError::InvalidFontSize(self.font_size));
        }
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(StyleError::InvalidPosition {
                x: self.x,
                y: self.y,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RenderJob {
    pub text: String,
    pub style: StyleConfig,
    pub template_path: PathBuf,
    pub output_path: PathBuf,
}

/// One CSV record: `name[,prefix[,postfix]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvEntry {
    pub name: String,
    pub prefix: Option<String>,
    pub postfix: Option<String>,
}

impl CsvEntry {
    pub fn display_text(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(prefix) = self.prefix.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            parts.push(prefix);
        }
        parts.push(self.name.trim());
        if let Some(postfix) = self
            .postfix
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            parts.push(postfix);
        }
        parts.join(" ")
    }
}
