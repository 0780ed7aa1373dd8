//! Drives a worker run: progress bars, live log, Ctrl-C, final summary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use pdfimg_core::worker::POLL_INTERVAL;
use pdfimg_core::{LogLevel, LogLine, LopdfBackend, RunConfig, RunReport, Worker, WorkerEvent};

/// How long to wait for the worker thread after `Completed`.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a cancelled run may take to finish the page in flight.
const CANCEL_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit status after a second Ctrl-C, as for SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What a finished run handed back.
pub struct RunOutcome {
    pub report: RunReport,
    pub error_count: usize,
    pub report_path: PathBuf,
}

fn bar_style(unit: &str) -> anyhow::Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit}"
        ))?
        .progress_chars("=>-"))
}

/// Starts a clock when cancellation is first seen.
#[derive(Debug)]
struct CancelWatch {
    timeout: Duration,
    since: Option<Instant>,
}

impl CancelWatch {
    fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            since: None,
        }
    }

    /// True once the run has stayed cancelled for at least `timeout`.
    fn expired(&mut self, cancelled: bool, now: Instant) -> bool {
        if !cancelled {
            return false;
        }
        let since = *self.since.get_or_insert(now);
        now.saturating_duration_since(since) >= self.timeout
    }
}

fn print_line(line: &LogLine) {
    let marker = match line.level {
        LogLevel::Info => style("ℹ").blue(),
        LogLevel::Success => style("✓").green(),
        LogLevel::Warning => style("⚠").yellow(),
        LogLevel::Error => style("✗").red(),
    };
    println!("{} {}", marker, line.message);
}

/// Run `config` on the background worker and render its events until it
/// completes. Ctrl-C requests cancellation and the run still writes its
/// report. A second Ctrl-C exits at once, and a cancelled run that does not
/// finish within [`CANCEL_TIMEOUT`] is abandoned.
pub async fn execute(config: RunConfig) -> anyhow::Result<RunOutcome> {
    let batch = config.mode.is_batch();
    let worker = Worker::new(Arc::new(LopdfBackend::new()));
    let mut handle = worker.start(config)?;

    let cancel = handle.cancel_flag();
    let signalled = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        signalled.cancel();
        warn!("Cancelling after the current page; press Ctrl-C again to quit immediately");
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
    let mut cancel_watch = CancelWatch::new(CANCEL_TIMEOUT);

    let multi = MultiProgress::new();
    let files_bar = if batch {
        let bar = multi.add(ProgressBar::new(0));
        bar.set_style(bar_style("files")?);
        Some(bar)
    } else {
        None
    };
    let pages_bar = multi.add(ProgressBar::new(0));
    pages_bar.set_style(bar_style("pages")?);

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let outcome = loop {
        ticker.tick().await;

        // Sampled before draining so events sent just before exit are seen.
        let finished = handle.is_finished();

        let mut completed = None;
        while let Some(event) = handle.try_next() {
            match event {
                WorkerEvent::PageProgress { done, total } => {
                    pages_bar.set_length(total as u64);
                    pages_bar.set_position(done as u64);
                }
                WorkerEvent::FileProgress { done, total } => {
                    if let Some(bar) = &files_bar {
                        bar.set_length(total as u64);
                        bar.set_position(done as u64);
                    }
                }
                WorkerEvent::Log(line) => multi.suspend(|| print_line(&line)),
                WorkerEvent::Completed {
                    error_count,
                    report,
                    report_path,
                } => {
                    completed = Some(RunOutcome {
                        report,
                        error_count,
                        report_path,
                    });
                }
            }
        }

        if let Some(outcome) = completed {
            break outcome;
        }
        if finished {
            ctrl_c.abort();
            anyhow::bail!("Extraction worker stopped without completing");
        }
        if cancel_watch.expired(cancel.is_cancelled(), Instant::now()) {
            ctrl_c.abort();
            pages_bar.abandon();
            if let Some(bar) = &files_bar {
                bar.abandon();
            }
            handle.shutdown(POLL_INTERVAL);
            anyhow::bail!(
                "Extraction did not stop within {:?} of cancellation; no report was written",
                CANCEL_TIMEOUT
            );
        }
    };

    ctrl_c.abort();
    pages_bar.finish_and_clear();
    if let Some(bar) = files_bar {
        bar.finish_and_clear();
    }
    if !handle.shutdown(SHUTDOWN_TIMEOUT) {
        debug!("Worker thread did not exit within {:?}", SHUTDOWN_TIMEOUT);
    }

    Ok(outcome)
}

/// Final lines after a run.
pub fn print_summary(outcome: &RunOutcome) {
    let summary = outcome.report.summary();

    println!();
    println!(
        "Extracted {} image(s), exported {} page PNG(s) from {} file(s)",
        summary.total_images,
        summary.total_pages_exported,
        outcome.report.files().len()
    );

    if outcome.error_count > 0 || outcome.report.has_errors() {
        println!(
            "{} Completed with {} warning(s)/error(s). See report: {}",
            style("⚠").yellow(),
            outcome.error_count,
            outcome.report_path.display()
        );
    } else {
        println!(
            "{} Completed successfully. Report: {}",
            style("✓").green(),
            outcome.report_path.display()
        );
    }
}
