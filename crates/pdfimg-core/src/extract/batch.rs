//! Folder mode: every PDF in a folder, each into its own subfolder.

use std::io;
use std::path::{Path, PathBuf};

use glob::{GlobError, Pattern, glob};
use tracing::debug;

use super::{CancelFlag, ExtractOptions, ExtractionObserver, extract_document};
use crate::error::ExtractError;
use crate::models::report::RunReport;
use crate::pdf::PdfBackend;

/// Regular files directly inside `folder` whose name ends in `.pdf`
/// (case-sensitive), sorted by path. Subfolders are not searched.
pub fn discover_documents(folder: &Path) -> io::Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a folder", folder.display()),
        ));
    }

    let pattern = format!("{}/*.pdf", Pattern::escape(&folder.to_string_lossy()));
    let entries =
        glob(&pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    let mut documents = Vec::new();
    for entry in entries {
        let path = entry.map_err(GlobError::into_error)?;
        if path.is_file() {
            documents.push(path);
        }
    }
    documents.sort();
    debug!("Discovered {} PDF(s) in {}", documents.len(), folder.display());
    Ok(documents)
}

/// Global error text for a document that was skipped.
pub(crate) fn document_failure(pdf_path: &Path, error: &ExtractError) -> String {
    match error {
        ExtractError::Open { source, .. } => {
            format!("Failed to open PDF: {} - {}", pdf_path.display(), source)
        }
        ExtractError::OutputFolder { .. } => error.to_string(),
    }
}

/// Process every document in `input_folder`, writing each into
/// `output_folder/<file stem>/`.
///
/// Documents that cannot be processed at all are recorded as global errors
/// and skipped. Cancellation is checked before each document and, inside
/// the document, before each page; the document in flight keeps what it
/// already wrote.
pub fn extract_batch(
    backend: &dyn PdfBackend,
    input_folder: &Path,
    output_folder: &Path,
    options: &ExtractOptions,
    report: &mut RunReport,
    observer: &mut dyn ExtractionObserver,
    cancel: &CancelFlag,
) {
    let documents = match discover_documents(input_folder) {
        Ok(documents) => documents,
        Err(e) => {
            let message = format!("Failed to read input folder {}: {}", input_folder.display(), e);
            observer.error(message.clone());
            report.add_global_error(message);
            return;
        }
    };

    if documents.is_empty() {
        observer.info("No PDF files found in the input folder.".to_string());
        return;
    }

    let total = documents.len();
    observer.file_progress(0, total);
    observer.info(format!(
        "Batch mode: found {} PDF(s) in {}",
        total,
        input_folder.display()
    ));

    for (done, pdf) in (1..).zip(documents.iter()) {
        if cancel.is_cancelled() {
            observer.info("Batch extraction cancelled".to_string());
            break;
        }

        let name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        observer.info(format!("Processing [{done}/{total}]: {name}"));

        match extract_document(backend, pdf, &output_folder.join(stem), options, observer, cancel) {
            Ok(result) => report.add_file_result(result),
            Err(e) => {
                let message = document_failure(pdf, &e);
                observer.error(message.clone());
                report.add_global_error(message);
            }
        }

        observer.file_progress(done, total);
    }
}
