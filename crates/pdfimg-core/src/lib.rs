//! Core library for pdfimg.
//!
//! This crate provides:
//! - Page selector parsing ("1,3-5,10" style, 1-based)
//! - Filesystem-safe output naming with deterministic collision handling
//! - Embedded image extraction (original bytes, deduplicated per document)
//! - Optional page rendering to PNG
//! - Batch extraction over a folder of PDFs
//! - A structured JSON run report
//! - A single background worker that streams progress and log events

pub mod error;
pub mod extract;
pub mod models;
pub mod naming;
pub mod pdf;
pub mod selector;
pub mod worker;

pub use error::{ExtractError, PdfError, PdfimgError, Result, SelectorError, WorkerError};
pub use extract::{
    CancelFlag, ExtractOptions, ExtractionObserver, LogLevel, LogLine, discover_documents,
    extract_batch, extract_document,
};
pub use models::config::Preferences;
pub use models::report::{FileResult, PageError, ReportDocument, ReportSummary, RunReport};
pub use naming::{resolve_output_path, sanitize};
pub use pdf::{EmbeddedImage, ImageRef, LopdfBackend, PageHandle, PdfBackend, PdfDocument};
pub use selector::{PageSelector, parse_page_range};
pub use worker::{RunConfig, RunHandle, RunMode, Worker, WorkerEvent};
