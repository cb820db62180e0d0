//! `inspect` command

mod handler;

pub use handler::handle_inspect_command;

use clap::Args;
use std::path::PathBuf;

use super::DocumentArgs;

#[derive(Args, Debug, Clone)]
pub struct InspectCommand {
    /// Spreadsheet to inspect (.xlsx or .csv)
    pub sheet: PathBuf,

    #[command(flatten)]
    pub documents: DocumentArgs,

    /// Also list the line items of every group
    #[arg(long)]
    pub items: bool,
}
