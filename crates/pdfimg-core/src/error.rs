//! Error types for the pdfimg-core library.

use std::path::PathBuf;

use thiserror::Error;

use crate::pdf::ImageRef;

/// Main error type for the pdfimg library.
#[derive(Error, Debug)]
pub enum PdfimgError {
    /// PDF backend error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Document-level extraction failure.
    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Malformed page selector.
    #[error("page selector error: {0}")]
    Selector(#[from] SelectorError),

    /// Background worker error.
    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by a PDF backend.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted with a non-empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// Invalid page index requested (zero-based).
    #[error("invalid page index: {0}")]
    InvalidPage(u32),

    /// Failed to enumerate the images of a page.
    #[error("failed to list images: {0}")]
    ImageListing(String),

    /// Failed to read one embedded image.
    #[error("failed to extract image {reference}: {reason}")]
    ImageExtraction { reference: ImageRef, reason: String },

    /// The image stream uses an encoding that cannot be saved as a file.
    #[error("unsupported image encoding for {reference}: {reason}")]
    UnsupportedImage { reference: ImageRef, reason: String },

    /// Page rasterization failed.
    #[error("failed to render page: {0}")]
    Render(String),

    /// No rasterizer could be bound.
    #[error("page rendering is unavailable: {0}")]
    RenderUnavailable(String),

    /// Image encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors in a page selector expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// A single-page token is not a number.
    #[error("invalid page number {token:?}")]
    InvalidNumber { token: String },

    /// A `start-end` token has a non-numeric bound.
    #[error("invalid page range {token:?}")]
    InvalidRange { token: String },
}

/// Document-level failures. The document is skipped and the failure is
/// recorded as a global error in the run report.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The output folder could not be created.
    #[error("failed to create output folder {}: {source}", .path.display())]
    OutputFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document could not be opened at all.
    #[error("failed to open PDF {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: PdfError,
    },
}

/// Errors related to the background worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Only one run may be active at a time.
    #[error("an extraction run is already active")]
    AlreadyRunning,

    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Result type for the pdfimg library.
pub type Result<T> = std::result::Result<T, PdfimgError>;
