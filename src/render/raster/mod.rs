pub mod font;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use tracing::debug;
use usvg::{Options, Tree, fontdb};

use crate::font::FontResolver;
use crate::model::{Alignment, RenderJob, StyleConfig};
use crate::render::Renderer;
pub use font::{RasterFont, RasterFontBackend};

/// Stamps job text onto a PNG or JPEG template by composing an SVG over the
/// image and rasterizing it.
pub struct RasterRenderer {
    fonts: Arc<FontResolver<RasterFontBackend>>,
}

impl RasterRenderer {
    pub fn new(fonts: Arc<FontResolver<RasterFontBackend>>) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontResolver<RasterFontBackend> {
        &self.fonts
    }
}

impl Renderer for RasterRenderer {
    fn render(&self, job: &RenderJob) -> Result<()> {
        let template = std::fs::read(&job.template_path).with_context(|| {
            format!("failed to read image template: {}", job.template_path.display())
        })?;
        let input_format = image::guess_format(&template).with_context(|| {
            format!("unrecognized image template: {}", job.template_path.display())
        })?;
        let (width, height) = image::ImageReader::with_format(Cursor::new(&template), input_format)
            .into_dimensions()
            .with_context(|| "failed to read template dimensions")?;
        let output_format = image::ImageFormat::from_path(&job.output_path)
            .with_context(|| format!("unsupported output: {}", job.output_path.display()))?;

        let font = self
            .fonts
            .resolve(job.style.font_name.as_deref(), job.style.font_style);
        let svg = compose_svg(
            &template,
            input_format.to_mime_type(),
            width,
            height,
            &job.text,
            &job.style,
            &font,
        );
        let database = match &font.database {
            Some(database) => Arc::clone(database),
            None => self.fonts.backend().database(),
        };
        let bytes = render_svg_bytes(&svg, output_format, database)?;
        std::fs::write(&job.output_path, bytes)
            .with_context(|| format!("failed to write image: {}", job.output_path.display()))?;
        debug!("wrote {}", job.output_path.display());
        Ok(())
    }
}

fn text_anchor(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left => "start",
        Alignment::Center => "middle",
        Alignment::Right => "end",
    }
}

/// The template as a full-size background image with one `<text>` element on
/// top. `y` is the text baseline.
pub fn compose_svg(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    text: &str,
    style: &StyleConfig,
    font: &RasterFont,
) -> String {
    let encoded = BASE64.encode(image_bytes);
    let data_uri = format!("data:{};base64,{}", image_mime, encoded);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}" font-family="{family}" font-weight="{weight}" font-style="{slant}" text-anchor="{anchor}" xml:space="preserve">{text}</text>"#,
        x = style.x,
        y = style.y,
        size = style.font_size,
        color = style.color.to_hex(),
        family = escape_xml(&font.css_family()),
        weight = if font.bold { "bold" } else { "normal" },
        slant = if font.italic { "italic" } else { "normal" },
        anchor = text_anchor(style.alignment),
        text = escape_xml(text)
    ));
    svg.push_str("</svg>");
    svg
}

/// Rasterizes `svg` against `database` and encodes it as `format`.
pub fn render_svg_bytes(
    svg: &str,
    format: image::ImageFormat,
    database: Arc<fontdb::Database>,
) -> Result<Vec<u8>> {
    let options = Options {
        fontdb: database,
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.take())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let output = match format {
        image::ImageFormat::Jpeg => image::DynamicImage::ImageRgb8(flatten_on_white(&image)),
        _ => image::DynamicImage::ImageRgba8(image),
    };
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    output
        .write_to(&mut cursor, format)
        .with_context(|| format!("failed to encode {:?} image", format))?;
    Ok(bytes)
}

/// Composites premultiplied RGBA pixels over an opaque white background.
fn flatten_on_white(image: &image::RgbaImage) -> image::RgbImage {
    image::RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let blank = 255 - a;
        image::Rgb([
            r.saturating_add(blank),
            g.saturating_add(blank),
            b.saturating_add(blank),
        ])
    })
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
