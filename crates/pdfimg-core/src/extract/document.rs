//! Single-document extraction.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use image::ImageFormat;
use tracing::debug;

use super::{CancelFlag, ExtractOptions, ExtractionObserver};
use crate::error::ExtractError;
use crate::models::report::{ExtractedImage, FileResult, PageError, PageRender};
use crate::naming::{image_file_name, page_render_file_name, resolve_output_path};
use crate::pdf::{ImageRef, PageHandle, PdfBackend, PdfDocument};

/// Extract one document into `output_folder`.
///
/// Every selected page is visited in ascending order. Each embedded image is
/// written once per document, on the first page that draws it. Page-level
/// failures are collected in the returned [`FileResult`]; only failing to
/// create the output folder or to open the document is an `Err`.
///
/// Cancellation is checked before each page; pages already written are kept.
pub fn extract_document(
    backend: &dyn PdfBackend,
    pdf_path: &Path,
    output_folder: &Path,
    options: &ExtractOptions,
    observer: &mut dyn ExtractionObserver,
    cancel: &CancelFlag,
) -> Result<FileResult, ExtractError> {
    fs::create_dir_all(output_folder).map_err(|source| ExtractError::OutputFolder {
        path: output_folder.to_path_buf(),
        source,
    })?;

    let document = backend.open(pdf_path).map_err(|source| ExtractError::Open {
        path: pdf_path.to_path_buf(),
        source,
    })?;

    let page_count = document.page_count();
    let pages = options.pages.resolve(page_count);
    let total = pages.len();

    observer.page_progress(0, total);
    observer.info(format!(
        "Opened: {}  pages={}  processing={} page(s)",
        pdf_path.display(),
        page_count,
        total
    ));

    let mut run = DocumentRun {
        document: document.as_ref(),
        output_folder,
        options,
        seen: HashSet::new(),
        result: FileResult::new(pdf_path.display().to_string(), page_count),
    };

    for (visited, &index) in (1..).zip(pages.iter()) {
        if cancel.is_cancelled() {
            observer.info(format!("Extraction cancelled: {}", pdf_path.display()));
            break;
        }

        let page = match run.document.page(index) {
            Ok(page) => page,
            Err(e) => {
                run.page_error(observer, index + 1, format!("Failed to read page {}: {}", index + 1, e));
                observer.page_progress(visited, total);
                continue;
            }
        };

        run.extract_images(&page, observer);
        if options.export_pages {
            run.render(&page, observer);
        }

        run.result.pages_processed.push(page.number());
        observer.page_progress(visited, total);
    }

    let result = run.result;
    drop(document);

    debug!(
        "Finished {}: {} image(s), {} page PNG(s), {} error(s)",
        pdf_path.display(),
        result.images_extracted,
        result.page_pngs,
        result.errors.len()
    );
    Ok(result)
}

struct DocumentRun<'a> {
    document: &'a dyn PdfDocument,
    output_folder: &'a Path,
    options: &'a ExtractOptions,
    /// Image references already handled in this document.
    seen: HashSet<ImageRef>,
    result: FileResult,
}

impl DocumentRun<'_> {
    fn page_error(&mut self, observer: &mut dyn ExtractionObserver, page: u32, message: String) {
        observer.warning(message.clone());
        self.result.errors.push(PageError {
            page,
            error: message,
        });
    }

    fn extract_images(&mut self, page: &PageHandle, observer: &mut dyn ExtractionObserver) {
        let prefix = format!("page-{:03}", page.number());

        let images = match self.document.list_images(page) {
            Ok(images) => images,
            Err(e) => {
                self.page_error(observer, page.number(), format!("{prefix}: failed to list images: {e}"));
                Vec::new()
            }
        };

        let mut count_here = 0;
        for (position, reference) in (1..).zip(images) {
            // Marked before extraction so a broken image is reported once.
            if !self.seen.insert(reference) {
                debug!("{prefix}: image {reference} already extracted, skipping");
                continue;
            }

            match self.save_image(page, position, reference) {
                Ok(saved) => {
                    count_here += 1;
                    self.result.images_extracted += 1;
                    self.result.images.push(saved);
                }
                Err(e) => {
                    self.page_error(
                        observer,
                        page.number(),
                        format!("{prefix}: failed to save image {position}: {e}"),
                    );
                }
            }
        }

        if count_here > 0 {
            observer.success(format!("{prefix}: extracted {count_here} image(s)"));
        } else {
            observer.info(format!("{prefix}: no embedded images"));
        }
    }

    fn save_image(
        &self,
        page: &PageHandle,
        position: usize,
        reference: ImageRef,
    ) -> crate::Result<ExtractedImage> {
        let image = self.document.extract_image(reference)?;
        let file_name = image_file_name(page.number(), position, &image.extension);
        let path = resolve_output_path(self.output_folder, &file_name, self.options.overwrite);

        fs::write(&path, &image.bytes)?;
        debug!("Wrote {} ({} bytes)", path.display(), image.bytes.len());

        Ok(ExtractedImage {
            page: page.number(),
            position,
            path,
            extension: image.extension,
        })
    }

    fn render(&mut self, page: &PageHandle, observer: &mut dyn ExtractionObserver) {
        let prefix = format!("page-{:03}", page.number());
        let dpi = self.options.dpi;

        let rendered = self.document.render_page(page, dpi).and_then(|image| {
            let path = resolve_output_path(
                self.output_folder,
                &page_render_file_name(page.number()),
                self.options.overwrite,
            );
            image.save_with_format(&path, ImageFormat::Png)?;
            Ok(path)
        });

        match rendered {
            Ok(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                observer.success(format!("{prefix}: exported PNG -> {name}"));
                self.result.page_pngs += 1;
                self.result.renders.push(PageRender {
                    page: page.number(),
                    dpi,
                    path,
                });
            }
            Err(e) => {
                self.page_error(observer, page.number(), format!("{prefix}: failed to render PNG: {e}"));
            }
        }
    }
}
