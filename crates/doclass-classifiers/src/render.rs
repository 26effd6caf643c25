//! First-page rasterization via pdfium.

use doclass_core::{Error, Result};
use image::{DynamicImage, Rgb, RgbImage};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// PDF points per inch
const POINTS_PER_INCH: f32 = 72.0;

/// Trait for page rendering backends
pub trait PageRenderer: Send + Sync {
    /// Render the first page of the document at the given resolution
    fn render_first_page(&self, path: &Path, dpi: u32) -> Result<DynamicImage>;
}

/// Renderer backed by the pdfium library
///
/// The library is bound per call; a `Pdfium` handle is not shared across
/// threads.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRenderer {
    /// Bind to the system pdfium library
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to the pdfium library in `dir`
    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: Some(dir.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium> {
        let bindings = match &self.library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_system_library(),
        };

        bindings
            .map(Pdfium::new)
            .map_err(|e| Error::extraction(format!("Failed to bind to pdfium library: {:?}", e)))
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_first_page(&self, path: &Path, dpi: u32) -> Result<DynamicImage> {
        let pdfium = self.bind()?;

        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| Error::extraction(format!("Failed to open {}: {:?}", path.display(), e)))?;

        let page = document
            .pages()
            .get(0)
            .map_err(|e| Error::extraction(format!("Failed to load first page: {:?}", e)))?;

        let render_config =
            PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / POINTS_PER_INCH);

        let image = page
            .render_with_config(&render_config)
            .map_err(|e| Error::extraction(format!("Failed to render first page: {:?}", e)))?
            .as_image();

        debug!(
            "Rendered first page of {} at {} DPI → {}x{} px",
            path.display(),
            dpi,
            image.width(),
            image.height()
        );

        Ok(image)
    }
}

/// Uniform white RGB image used when a page cannot be rendered
pub fn blank_page(size: u32) -> RgbImage {
    RgbImage::from_pixel(size, size, Rgb([255, 255, 255]))
}

/// Rendered first page plus whether it is the placeholder
#[derive(Debug, Clone)]
pub struct PageImage {
    pub image: RgbImage,
    pub placeholder: bool,
}

/// Converts a document's first page into an RGB raster
///
/// Rendering failures are absorbed: the result is then a blank white square
/// of `placeholder_size` pixels.
#[derive(Clone)]
pub struct PageRasterizer {
    renderer: Arc<dyn PageRenderer>,
    dpi: u32,
    placeholder_size: u32,
}

impl PageRasterizer {
    /// Create a rasterizer over the given renderer
    pub fn new(renderer: Arc<dyn PageRenderer>, dpi: u32, placeholder_size: u32) -> Self {
        Self {
            renderer,
            dpi,
            placeholder_size,
        }
    }

    /// Render page one, or the placeholder on failure
    pub fn rasterize(&self, path: &Path) -> RgbImage {
        self.rasterize_with_status(path).image
    }

    /// Render page one and report whether the placeholder was substituted
    pub fn rasterize_with_status(&self, path: &Path) -> PageImage {
        match self.renderer.render_first_page(path, self.dpi) {
            Ok(image) => PageImage {
                image: image.to_rgb8(),
                placeholder: false,
            },
            Err(e) => {
                warn!("Failed to convert {} to image: {}", path.display(), e);
                PageImage {
                    image: blank_page(self.placeholder_size),
                    placeholder: true,
                }
            }
        }
    }
}
