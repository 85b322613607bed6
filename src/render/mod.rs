pub mod pdf;
pub mod raster;

use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::font::{FontInfo, FontResolver, SystemFontCatalog};
use crate::model::RenderJob;

/// Renders one job. Implementations must be safe to call from many threads
/// at once; the executor catches errors and panics per job.
pub trait Renderer: Send + Sync {
    fn render(&self, job: &RenderJob) -> Result<()>;
}

impl<F> Renderer for F
where
    F: Fn(&RenderJob) -> Result<()> + Send + Sync,
{
    fn render(&self, job: &RenderJob) -> Result<()> {
        self(job)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Pdf,
    Png,
    Jpeg,
}

impl TemplateFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(TemplateFormat::Pdf),
            "png" => Ok(TemplateFormat::Png),
            "jpg" | "jpeg" => Ok(TemplateFormat::Jpeg),
            _ => Err(anyhow!(
                "unsupported template format '{}': expected pdf, png, jpg or jpeg",
                path.display()
            )),
        }
    }
}

/// A renderer for one template format together with its font resolver, so
/// callers can list fonts through the same backend that renders them.
#[derive(Clone)]
pub enum TemplateRenderer {
    Pdf(Arc<pdf::PdfRenderer>),
    Raster(Arc<raster::RasterRenderer>),
}

impl TemplateRenderer {
    pub fn for_format(format: TemplateFormat, font_dirs: &[PathBuf]) -> Self {
        let catalog = SystemFontCatalog::new(font_dirs.to_vec());
        match format {
            TemplateFormat::Pdf => {
                let backend = pdf::PdfFontBackend::new(font_dirs.to_vec());
                let fonts = Arc::new(FontResolver::with_catalog(backend, catalog));
                TemplateRenderer::Pdf(Arc::new(pdf::PdfRenderer::new(fonts)))
            }
            TemplateFormat::Png | TemplateFormat::Jpeg => {
                let backend = raster::RasterFontBackend::new(font_dirs.to_vec());
                let fonts = Arc::new(FontResolver::with_catalog(backend, catalog));
                TemplateRenderer::Raster(Arc::new(raster::RasterRenderer::new(fonts)))
            }
        }
    }

    pub fn renderer(&self) -> Arc<dyn Renderer> {
        match self {
            TemplateRenderer::Pdf(renderer) => Arc::clone(renderer) as Arc<dyn Renderer>,
            TemplateRenderer::Raster(renderer) => Arc::clone(renderer) as Arc<dyn Renderer>,
        }
    }

    pub fn available_fonts(&self) -> Vec<FontInfo> {
        match self {
            TemplateRenderer::Pdf(renderer) => renderer.fonts().available_fonts(),
            TemplateRenderer::Raster(renderer) => renderer.fonts().available_fonts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_format_follows_extension() {
        assert_eq!(
            TemplateFormat::from_path(Path::new("a/b/Card.PDF")).expect("pdf"),
            TemplateFormat::Pdf
        );
        assert_eq!(
            TemplateFormat::from_path(Path::new("card.jpeg")).expect("jpeg"),
            TemplateFormat::Jpeg
        );
        assert_eq!(
            TemplateFormat::from_path(Path::new("card.jpg")).expect("jpg"),
            TemplateFormat::Jpeg
        );
        assert!(TemplateFormat::from_path(Path::new("card.gif")).is_err());
        assert!(TemplateFormat::from_path(Path::new("card")).is_err());
    }

    #[test]
    fn closures_are_renderers() {
        let renderer = |job: &RenderJob| -> Result<()> {
            if job.text.is_empty() {
                Err(anyhow!("empty"))
            } else {
                Ok(())
            }
        };
        let mut job = RenderJob {
            text: "x".to_string(),
            style: crate::model::StyleConfig::at(0.0, 0.0),
            template_path: PathBuf::from("t.pdf"),
            output_path: PathBuf::from("o.pdf"),
        };
        assert!(Renderer::render(&renderer, &job).is_ok());
        job.text.clear();
        assert!(Renderer::render(&renderer, &job).is_err());
    }
}
