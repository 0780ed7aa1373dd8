//! Extract command - one PDF into one output folder.

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::warn;

use pdfimg_core::{Preferences, RunConfig};

use super::run::{execute, print_summary};
use super::{OptionsArgs, preferences_path};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// PDF file to extract from
    pdf: PathBuf,

    /// Output folder (created if missing)
    output: PathBuf,

    #[command(flatten)]
    options: OptionsArgs,
}

pub async fn run(args: ExtractArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    if !args.pdf.is_file() {
        anyhow::bail!("Input PDF not found: {}", args.pdf.display());
    }
    let is_pdf = args
        .pdf
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        anyhow::bail!("Input is not a PDF file: {}", args.pdf.display());
    }

    let prefs_path = preferences_path(config_path);
    let mut prefs = Preferences::load_or_default(&prefs_path);
    let options = args.options.resolve(&prefs)?;

    prefs.last_pdf = Some(args.pdf.clone());
    prefs.output_folder = Some(args.output.clone());
    prefs.dpi = options.dpi;
    if let Err(e) = prefs.save(&prefs_path) {
        warn!("Could not save preferences to {}: {}", prefs_path.display(), e);
    }

    let outcome = execute(RunConfig::single(&args.pdf, &args.output, options)).await?;
    print_summary(&outcome);

    // The report is already on disk; a document that never opened still fails the command.
    if let Some(error) = outcome.report.global_errors().first() {
        anyhow::bail!("{error}");
    }
    Ok(())
}
