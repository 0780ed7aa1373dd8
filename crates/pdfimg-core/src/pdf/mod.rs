//! PDF backend abstraction.
//!
//! The extractor never parses PDF structure itself; it drives a
//! [`PdfBackend`] that opens documents and a [`PdfDocument`] that lists,
//! extracts, and renders.

mod document;
mod raster;
mod samples;

pub use document::{LopdfBackend, LopdfDocument};

use std::fmt;
use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Identity of an embedded image: the document-internal indirect object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageRef {
    /// Object number.
    pub object: u32,
    /// Generation number.
    pub generation: u16,
}

impl ImageRef {
    pub fn new(object: u32, generation: u16) -> Self {
        Self { object, generation }
    }
}

impl From<(u32, u16)> for ImageRef {
    fn from((object, generation): (u32, u16)) -> Self {
        Self::new(object, generation)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.object, self.generation)
    }
}

/// A page that was successfully fetched from a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle {
    /// Zero-based page index.
    pub index: u32,
}

impl PageHandle {
    /// 1-based page number, as used in file names and reports.
    pub fn number(&self) -> u32 {
        self.index + 1
    }
}

/// Original encoded bytes of an embedded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub bytes: Vec<u8>,
    /// File extension without the dot (`jpg`, `jpx`, `png`, ...).
    pub extension: String,
}

impl EmbeddedImage {
    pub fn new(bytes: Vec<u8>, extension: impl Into<String>) -> Self {
        Self {
            bytes,
            extension: extension.into(),
        }
    }
}

/// Opens documents.
pub trait PdfBackend: Send + Sync {
    /// Open a document. Fails on missing, invalid, or corrupt input.
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>>;
}

/// An open document.
pub trait PdfDocument {
    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Fetch a page by zero-based index.
    fn page(&self, index: u32) -> Result<PageHandle>;

    /// Images drawn by a page, in resource order, without duplicates.
    fn list_images(&self, page: &PageHandle) -> Result<Vec<ImageRef>>;

    /// Original bytes of an embedded image.
    fn extract_image(&self, image: ImageRef) -> Result<EmbeddedImage>;

    /// Rasterize a page at the given resolution.
    fn render_page(&self, page: &PageHandle, dpi: u32) -> Result<DynamicImage>;
}

/// Whether page rendering can be used in this process.
pub fn render_available() -> bool {
    raster::available()
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory backend for tests.

    use std::collections::{HashMap, HashSet};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use image::{DynamicImage, RgbImage};

    use super::{EmbeddedImage, ImageRef, PageHandle, PdfBackend, PdfDocument, Result};
    use crate::error::PdfError;

    #[derive(Debug, Clone, Default)]
    pub struct FakeDocument {
        pub pages: Vec<Vec<ImageRef>>,
        pub images: HashMap<ImageRef, EmbeddedImage>,
        pub broken_pages: HashSet<u32>,
        pub unlistable_pages: HashSet<u32>,
        pub broken_images: HashSet<ImageRef>,
        pub unrenderable_pages: HashSet<u32>,
    }

    impl FakeDocument {
        /// `pages[i]` lists the image object numbers drawn on page `i`.
        pub fn with_pages(pages: &[&[u32]]) -> Self {
            let mut doc = Self::default();
            for refs in pages {
                let refs: Vec<ImageRef> = refs.iter().map(|&n| ImageRef::new(n, 0)).collect();
                for r in &refs {
                    doc.images.insert(
                        *r,
                        EmbeddedImage::new(format!("image-{}", r.object).into_bytes(), "jpg"),
                    );
                }
                doc.pages.push(refs);
            }
            doc
        }
    }

    impl PdfDocument for FakeDocument {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn page(&self, index: u32) -> Result<PageHandle> {
            if index as usize >= self.pages.len() || self.broken_pages.contains(&index) {
                return Err(PdfError::InvalidPage(index));
            }
            Ok(PageHandle { index })
        }

        fn list_images(&self, page: &PageHandle) -> Result<Vec<ImageRef>> {
            if self.unlistable_pages.contains(&page.index) {
                return Err(PdfError::ImageListing("broken resources".to_string()));
            }
            Ok(self.pages[page.index as usize].clone())
        }

        fn extract_image(&self, image: ImageRef) -> Result<EmbeddedImage> {
            if self.broken_images.contains(&image) {
                return Err(PdfError::ImageExtraction {
                    reference: image,
                    reason: "corrupt stream".to_string(),
                });
            }
            self.images
                .get(&image)
                .cloned()
                .ok_or_else(|| PdfError::ImageExtraction {
                    reference: image,
                    reason: "missing object".to_string(),
                })
        }

        fn render_page(&self, page: &PageHandle, dpi: u32) -> Result<DynamicImage> {
            if self.unrenderable_pages.contains(&page.index) {
                return Err(PdfError::Render("rasterizer crashed".to_string()));
            }
            Ok(DynamicImage::ImageRgb8(RgbImage::new(dpi / 10, dpi / 10)))
        }
    }

    /// Backend serving fake documents by file name. Unknown names fail to open.
    #[derive(Debug, Clone, Default)]
    pub struct FakeBackend {
        documents: HashMap<String, FakeDocument>,
        opened: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl FakeBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_document(mut self, file_name: &str, document: FakeDocument) -> Self {
            self.documents.insert(file_name.to_string(), document);
            self
        }

        pub fn opened(&self) -> Vec<PathBuf> {
            self.opened.lock().unwrap().clone()
        }
    }

    impl PdfBackend for FakeBackend {
        fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>> {
            self.opened.lock().unwrap().push(path.to_path_buf());
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.documents
                .get(&name)
                .cloned()
                .map(|doc| Box::new(doc) as Box<dyn PdfDocument>)
                .ok_or_else(|| PdfError::Parse(format!("not a PDF: {name}")))
        }
    }
}
