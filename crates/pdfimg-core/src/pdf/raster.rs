//! Page rasterization through PDFium.

#[cfg(feature = "render")]
mod imp {
    use std::path::Path;
    use std::sync::OnceLock;

    use image::DynamicImage;
    use pdfium_render::prelude::*;
    use tracing::{debug, warn};

    use crate::error::PdfError;
    use crate::pdf::Result;

    /// PDF user space units per inch.
    const POINTS_PER_INCH: f32 = 72.0;

    /// Bound once per process; binding failures are remembered.
    static PDFIUM: OnceLock<std::result::Result<Pdfium, String>> = OnceLock::new();

    fn pdfium() -> Result<&'static Pdfium> {
        PDFIUM
            .get_or_init(|| {
                let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(|e| format!("failed to bind to PDFium library: {e}"))?;
                debug!("Bound to PDFium");
                Ok(Pdfium::new(bindings))
            })
            .as_ref()
            .map_err(|e| PdfError::RenderUnavailable(e.clone()))
    }

    pub fn available() -> bool {
        match pdfium() {
            Ok(_) => true,
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }

    /// A document loaded into PDFium for rendering.
    pub struct PageRasterizer {
        document: PdfDocument<'static>,
    }

    impl PageRasterizer {
        pub fn open(path: &Path) -> Result<Self> {
            let document = pdfium()?
                .load_pdf_from_file(path, None)
                .map_err(|e| PdfError::Parse(e.to_string()))?;
            Ok(Self { document })
        }

        pub fn render(&self, index: u32, dpi: u32) -> Result<DynamicImage> {
            let page_index =
                PdfPageIndex::try_from(index).map_err(|_| PdfError::InvalidPage(index))?;
            let page = self
                .document
                .pages()
                .get(page_index)
                .map_err(|e| PdfError::Render(e.to_string()))?;

            let config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / POINTS_PER_INCH);
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| PdfError::Render(e.to_string()))?;

            Ok(bitmap.as_image())
        }
    }
}

#[cfg(not(feature = "render"))]
mod imp {
    use std::path::Path;

    use image::DynamicImage;

    use crate::error::PdfError;
    use crate::pdf::Result;

    const DISABLED: &str = "pdfimg-core was built without the `render` feature";

    pub fn available() -> bool {
        false
    }

    pub struct PageRasterizer;

    impl PageRasterizer {
        pub fn open(_path: &Path) -> Result<Self> {
            Err(PdfError::RenderUnavailable(DISABLED.to_string()))
        }

        pub fn render(&self, _index: u32, _dpi: u32) -> Result<DynamicImage> {
            Err(PdfError::RenderUnavailable(DISABLED.to_string()))
        }
    }
}

pub(crate) use imp::{PageRasterizer, available};
