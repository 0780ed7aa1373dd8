//! Extraction pipeline: one document at a time, or a whole folder.

mod batch;
mod document;

pub use batch::{discover_documents, extract_batch};
pub(crate) use batch::document_failure;
pub use document::extract_document;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::selector::PageSelector;

/// Options shared by every document in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Also rasterize each selected page to PNG.
    pub export_pages: bool,
    /// Render resolution. Validated by the caller.
    pub dpi: u32,
    /// Pages to process; resolved per document.
    pub pages: PageSelector,
    /// Replace existing files instead of picking a suffixed name.
    pub overwrite: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            export_pages: false,
            dpi: 200,
            pages: PageSelector::all(),
            overwrite: false,
        }
    }
}

/// Cooperative cancellation signal, polled between pages and documents.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Severity of a user-visible log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    /// Warnings and errors count towards "completed with warnings".
    pub fn is_problem(self) -> bool {
        matches!(self, LogLevel::Warning | LogLevel::Error)
    }
}

/// One line of the live run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Receives log lines and progress ticks from the pipeline.
pub trait ExtractionObserver {
    fn log(&mut self, line: LogLine);

    /// Pages visited so far out of the pages selected in the current document.
    fn page_progress(&mut self, done: usize, total: usize);

    /// Documents completed so far out of the documents in a batch.
    fn file_progress(&mut self, done: usize, total: usize);

    fn info(&mut self, message: String) {
        info!("{message}");
        self.log(LogLine::new(LogLevel::Info, message));
    }

    fn success(&mut self, message: String) {
        info!("{message}");
        self.log(LogLine::new(LogLevel::Success, message));
    }

    fn warning(&mut self, message: String) {
        warn!("{message}");
        self.log(LogLine::new(LogLevel::Warning, message));
    }

    fn error(&mut self, message: String) {
        error!("{message}");
        self.log(LogLine::new(LogLevel::Error, message));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{ExtractionObserver, LogLevel, LogLine};
    use crate::extract::CancelFlag;

    /// Records everything it is told.
    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        pub lines: Vec<LogLine>,
        pub pages: Vec<(usize, usize)>,
        pub files: Vec<(usize, usize)>,
        /// Cancel this flag once `files` reaches the given count.
        pub cancel_after_files: Option<(usize, CancelFlag)>,
        /// Cancel this flag once `pages` reports the given visited count.
        pub cancel_after_pages: Option<(usize, CancelFlag)>,
    }

    impl RecordingObserver {
        pub fn problems(&self) -> usize {
            self.lines.iter().filter(|l| l.level.is_problem()).count()
        }

        pub fn messages(&self, level: LogLevel) -> Vec<&str> {
            self.lines
                .iter()
                .filter(|l| l.level == level)
                .map(|l| l.message.as_str())
                .collect()
        }
    }

    impl ExtractionObserver for RecordingObserver {
        fn log(&mut self, line: LogLine) {
            self.lines.push(line);
        }

        fn page_progress(&mut self, done: usize, total: usize) {
            self.pages.push((done, total));
            if let Some((after, flag)) = &self.cancel_after_pages {
                if done == *after {
                    flag.cancel();
                }
            }
        }

        fn file_progress(&mut self, done: usize, total: usize) {
            self.files.push((done, total));
            if let Some((after, flag)) = &self.cancel_after_files {
                if done == *after {
                    flag.cancel();
                }
            }
        }
    }
}
