//! Background worker that runs one extraction at a time and streams
//! progress and log events to a single consumer.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::error::WorkerError;
use crate::extract::{
    CancelFlag, ExtractOptions, ExtractionObserver, LogLine, document_failure, extract_batch,
    extract_document,
};
use crate::models::report::RunReport;
use crate::pdf::PdfBackend;

/// How often a consumer should drain events while a run is active.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a run processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// One document, written directly into the output folder.
    Single { pdf: PathBuf },
    /// Every PDF in a folder, each into `<output>/<stem>/`.
    Batch { input_folder: PathBuf },
}

impl RunMode {
    pub fn is_batch(&self) -> bool {
        matches!(self, RunMode::Batch { .. })
    }
}

/// Everything a run needs, fixed when the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub mode: RunMode,
    pub output_folder: PathBuf,
    pub options: ExtractOptions,
}

impl RunConfig {
    pub fn single(pdf: impl Into<PathBuf>, output_folder: impl Into<PathBuf>, options: ExtractOptions) -> Self {
        Self {
            mode: RunMode::Single { pdf: pdf.into() },
            output_folder: output_folder.into(),
            options,
        }
    }

    pub fn batch(
        input_folder: impl Into<PathBuf>,
        output_folder: impl Into<PathBuf>,
        options: ExtractOptions,
    ) -> Self {
        Self {
            mode: RunMode::Batch {
                input_folder: input_folder.into(),
            },
            output_folder: output_folder.into(),
            options,
        }
    }
}

/// Events emitted by a run, in order. `Completed` is always the last one.
#[derive(Debug)]
pub enum WorkerEvent {
    PageProgress { done: usize, total: usize },
    FileProgress { done: usize, total: usize },
    Log(LogLine),
    Completed {
        /// Warning and error lines emitted during the run.
        error_count: usize,
        report: RunReport,
        report_path: PathBuf,
    },
}

/// Run to completion on the calling thread and return the report.
///
/// A single document that cannot be opened is recorded as a global error.
pub fn run(
    backend: &dyn PdfBackend,
    config: &RunConfig,
    observer: &mut dyn ExtractionObserver,
    cancel: &CancelFlag,
) -> RunReport {
    let mut report = RunReport::new(config.mode.is_batch());

    match &config.mode {
        RunMode::Single { pdf } => {
            match extract_document(backend, pdf, &config.output_folder, &config.options, observer, cancel) {
                Ok(result) => report.add_file_result(result),
                Err(e) => {
                    let message = document_failure(pdf, &e);
                    observer.error(message.clone());
                    report.add_global_error(message);
                }
            }
        }
        RunMode::Batch { input_folder } => extract_batch(
            backend,
            input_folder,
            &config.output_folder,
            &config.options,
            &mut report,
            observer,
            cancel,
        ),
    }

    report
}

/// Forwards everything to the channel and counts problem lines.
struct ChannelObserver {
    sender: UnboundedSender<WorkerEvent>,
    problems: usize,
}

impl ChannelObserver {
    fn send(&self, event: WorkerEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.sender.send(event);
    }
}

impl ExtractionObserver for ChannelObserver {
    fn log(&mut self, line: LogLine) {
        if line.level.is_problem() {
            self.problems += 1;
        }
        self.send(WorkerEvent::Log(line));
    }

    fn page_progress(&mut self, done: usize, total: usize) {
        self.send(WorkerEvent::PageProgress { done, total });
    }

    fn file_progress(&mut self, done: usize, total: usize) {
        self.send(WorkerEvent::FileProgress { done, total });
    }
}

/// Clears the active flag when dropped, including on panic.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Starts runs on a dedicated thread, at most one at a time.
#[derive(Clone)]
pub struct Worker {
    backend: Arc<dyn PdfBackend>,
    active: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(backend: Arc<dyn PdfBackend>) -> Self {
        Self {
            backend,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a run. Fails with [`WorkerError::AlreadyRunning`] while another
    /// run started from this worker has not completed.
    ///
    /// The report is written to the output folder whatever the outcome,
    /// then `Completed` is sent. The worker accepts a new run as soon as
    /// `Completed` is observable.
    pub fn start(&self, config: RunConfig) -> Result<RunHandle, WorkerError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WorkerError::AlreadyRunning);
        }
        let guard = ActiveGuard(Arc::clone(&self.active));

        let (sender, events) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();
        let backend = Arc::clone(&self.backend);
        let thread_cancel = cancel.clone();

        let thread = thread::Builder::new()
            .name("pdfimg-worker".to_string())
            .spawn(move || {
                let mut observer = ChannelObserver {
                    sender,
                    problems: 0,
                };

                let report = run(backend.as_ref(), &config, &mut observer, &thread_cancel);
                let report_path = report.write_json(&config.output_folder);
                observer.success(format!("Wrote report -> {}", report_path.display()));
                debug!(
                    "Run finished: {} file(s), {} problem line(s)",
                    report.files().len(),
                    observer.problems
                );

                drop(guard);
                observer.send(WorkerEvent::Completed {
                    error_count: observer.problems,
                    report,
                    report_path,
                });
            })
            .map_err(WorkerError::Spawn)?;

        Ok(RunHandle {
            events,
            cancel,
            thread: Some(thread),
        })
    }
}

/// Consumer side of one run.
pub struct RunHandle {
    events: UnboundedReceiver<WorkerEvent>,
    cancel: CancelFlag,
    thread: Option<JoinHandle<()>>,
}

impl RunHandle {
    /// Ask the run to stop at the next page or document boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Next pending event without waiting.
    pub fn try_next(&mut self) -> Option<WorkerEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the next event. `None` once the run has ended and every
    /// event was received.
    pub async fn next(&mut self) -> Option<WorkerEvent> {
        self.events.recv().await
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel and block until the worker thread exits or `timeout` elapses.
    /// Returns whether the thread exited.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        self.cancel();
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            let now = Instant::now();
            if now >= deadline {
                debug!("Worker thread still running after {:?}", timeout);
                return false;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        true
    }
}
