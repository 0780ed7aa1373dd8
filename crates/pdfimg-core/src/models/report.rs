//! Run report: per-document results and the persisted JSON summary.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// File name of the persisted report inside the output folder.
pub const REPORT_FILE_NAME: &str = "extraction_report.json";

/// A recoverable failure attributed to one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    /// 1-based page number.
    pub page: u32,
    pub error: String,
}

/// An embedded image written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    /// 1-based page on which the image was first encountered.
    pub page: u32,
    /// 1-based position in that page's image list.
    pub position: usize,
    pub path: PathBuf,
    pub extension: String,
}

/// A page render written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRender {
    /// 1-based page number.
    pub page: u32,
    pub dpi: u32,
    pub path: PathBuf,
}

/// Outcome of processing one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    /// Input document path.
    pub input: String,
    /// Page count of the whole document.
    pub total_pages: u32,
    /// 1-based pages that were iterated to completion, ascending.
    pub pages_processed: Vec<u32>,
    /// Unique embedded images written.
    pub images_extracted: usize,
    /// Page renders written.
    pub page_pngs: usize,
    /// Page-level errors in the order they occurred.
    pub errors: Vec<PageError>,

    #[serde(skip)]
    pub images: Vec<ExtractedImage>,
    #[serde(skip)]
    pub renders: Vec<PageRender>,
}

impl FileResult {
    pub fn new(input: impl Into<String>, total_pages: u32) -> Self {
        Self {
            input: input.into(),
            total_pages,
            ..Self::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Summary block, always recomputed from the file results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_images: usize,
    pub total_pages_exported: usize,
    pub files_with_errors: usize,
}

/// Serialized form of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub batch_mode: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub file_count: usize,
    pub files: Vec<FileResult>,
    pub global_errors: Vec<String>,
    pub summary: ReportSummary,
}

/// Accumulates results over a run. The worker is the only writer.
#[derive(Debug, Clone)]
pub struct RunReport {
    batch_mode: bool,
    started_at: DateTime<Utc>,
    files: Vec<FileResult>,
    global_errors: Vec<String>,
}

impl RunReport {
    pub fn new(batch_mode: bool) -> Self {
        Self {
            batch_mode,
            started_at: Utc::now(),
            files: Vec::new(),
            global_errors: Vec::new(),
        }
    }

    pub fn add_file_result(&mut self, result: FileResult) {
        self.files.push(result);
    }

    pub fn add_global_error(&mut self, message: impl Into<String>) {
        self.global_errors.push(message.into());
    }

    pub fn batch_mode(&self) -> bool {
        self.batch_mode
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn files(&self) -> &[FileResult] {
        &self.files
    }

    pub fn global_errors(&self) -> &[String] {
        &self.global_errors
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            total_images: self.files.iter().map(|f| f.images_extracted).sum(),
            total_pages_exported: self.files.iter().map(|f| f.page_pngs).sum(),
            files_with_errors: self.files.iter().filter(|f| f.has_errors()).count(),
        }
    }

    /// Whether any page-level or global error was recorded.
    pub fn has_errors(&self) -> bool {
        !self.global_errors.is_empty() || self.files.iter().any(FileResult::has_errors)
    }

    /// Snapshot of the current state; `finished_at` is taken now.
    pub fn serialize(&self) -> ReportDocument {
        ReportDocument {
            batch_mode: self.batch_mode,
            started_at: self.started_at,
            finished_at: Utc::now(),
            file_count: self.files.len(),
            files: self.files.clone(),
            global_errors: self.global_errors.clone(),
            summary: self.summary(),
        }
    }

    /// Write `extraction_report.json` into `output_folder`.
    ///
    /// Failures are logged and otherwise ignored; the intended path is
    /// returned either way.
    pub fn write_json(&self, output_folder: &Path) -> PathBuf {
        let path = output_folder.join(REPORT_FILE_NAME);
        if let Err(e) = self.try_write_json(output_folder, &path) {
            warn!("Failed to write report {}: {}", path.display(), e);
        } else {
            debug!("Wrote report to {}", path.display());
        }
        path
    }

    fn try_write_json(&self, output_folder: &Path, path: &Path) -> std::io::Result<()> {
        fs::create_dir_all(output_folder)?;
        let content = serde_json::to_string_pretty(&self.serialize())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        fs::write(path, content)
    }
}
