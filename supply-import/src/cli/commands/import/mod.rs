//! `import` command

mod handler;

pub use handler::handle_import_command;

use clap::Args;
use std::path::PathBuf;

use super::DocumentArgs;

#[derive(Args, Debug, Clone)]
pub struct ImportCommand {
    /// Spreadsheet to import (.xlsx or .csv)
    pub sheet: PathBuf,

    #[command(flatten)]
    pub documents: DocumentArgs,

    /// Run against an in-memory store instead of the backend
    #[arg(long)]
    pub dry_run: bool,

    /// Write the per-group report to this file (.csv or .xlsx)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Only export failed groups to the report
    #[arg(long, requires = "report")]
    pub failed_only: bool,
}
