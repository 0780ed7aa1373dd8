//! Batch command - every PDF in a folder, each into its own subfolder.

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::warn;

use pdfimg_core::{Preferences, RunConfig};

use super::run::{execute, print_summary};
use super::{OptionsArgs, preferences_path};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Folder containing *.pdf files (not searched recursively)
    input_folder: PathBuf,

    /// Output folder; each PDF gets a subfolder named after its file stem
    output: PathBuf,

    #[command(flatten)]
    options: OptionsArgs,
}

pub async fn run(args: BatchArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    if !args.input_folder.is_dir() {
        anyhow::bail!("Input folder not found: {}", args.input_folder.display());
    }

    let prefs_path = preferences_path(config_path);
    let mut prefs = Preferences::load_or_default(&prefs_path);
    let options = args.options.resolve(&prefs)?;

    prefs.input_folder = Some(args.input_folder.clone());
    prefs.output_folder = Some(args.output.clone());
    prefs.dpi = options.dpi;
    if let Err(e) = prefs.save(&prefs_path) {
        warn!("Could not save preferences to {}: {}", prefs_path.display(), e);
    }

    let outcome = execute(RunConfig::batch(&args.input_folder, &args.output, options)).await?;
    print_summary(&outcome);
    Ok(())
}
