//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod extract;
mod run;

use std::path::{Path, PathBuf};

use clap::Args;

use pdfimg_core::models::config::{DEFAULT_DPI, MAX_DPI, MIN_DPI};
use pdfimg_core::pdf::render_available;
use pdfimg_core::{ExtractOptions, PageSelector, Preferences};

/// Options shared by `extract` and `batch`.
#[derive(Args, Debug)]
pub struct OptionsArgs {
    /// Also render each selected page to PNG
    #[arg(long)]
    export_pages: bool,

    /// Render resolution for --export-pages [default: last used, or 200]
    #[arg(long, value_parser = clap::value_parser!(u32).range(MIN_DPI as i64..=MAX_DPI as i64))]
    dpi: Option<u32>,

    /// Pages to process, e.g. "1,3-5,10" (1-based, default: all pages)
    #[arg(short, long)]
    pages: Option<String>,

    /// Replace existing files instead of writing name-2.ext
    #[arg(long)]
    overwrite: bool,
}

impl OptionsArgs {
    /// Validate the flags and build the options for a run.
    pub fn resolve(&self, prefs: &Preferences) -> anyhow::Result<ExtractOptions> {
        let pages = match self.pages.as_deref() {
            Some(text) => PageSelector::parse(text)
                .map_err(|e| anyhow::anyhow!("Invalid page selector {:?}: {}", text, e))?,
            None => PageSelector::all(),
        };

        let dpi = match self.dpi {
            Some(dpi) => dpi,
            None if Preferences::dpi_in_range(prefs.dpi) => prefs.dpi,
            None => DEFAULT_DPI,
        };

        if self.export_pages && !render_available() {
            anyhow::bail!(
                "Page export requested but the PDFium library could not be loaded (missing required dependency)"
            );
        }

        Ok(ExtractOptions {
            export_pages: self.export_pages,
            dpi,
            pages,
            overwrite: self.overwrite,
        })
    }
}

/// Preferences file: the `--config` override, or the per-user default.
pub fn preferences_path(override_path: Option<&Path>) -> PathBuf {
    match override_path {
        Some(path) => path.to_path_buf(),
        None => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pdfimg")
            .join("config.json"),
    }
}
