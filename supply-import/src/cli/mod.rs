//! Command-line interface

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::import::ImportCommand;
use commands::inspect::InspectCommand;

#[derive(Parser)]
#[command(name = "supply-import")]
#[command(about = "Import school supply lists into the content store")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a spreadsheet of supply lists
    Import(ImportCommand),
    /// Show how a spreadsheet would be grouped and matched, without importing
    Inspect(InspectCommand),
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Import(args) => {
                commands::import::handle_import_command(args, self.config.as_deref()).await
            }
            Commands::Inspect(args) => commands::inspect::handle_inspect_command(args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_arguments() {
        let cli = Cli::parse_from([
            "supply-import",
            "import",
            "listas.xlsx",
            "--pdf",
            "a.pdf",
            "--pdf",
            "b.pdf",
            "--dry-run",
            "--report",
            "out.csv",
            "--failed-only",
            "-v",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.sheet, PathBuf::from("listas.xlsx"));
                assert_eq!(args.documents.pdf.len(), 2);
                assert!(args.dry_run);
                assert!(args.failed_only);
                assert_eq!(args.report, Some(PathBuf::from("out.csv")));
                assert_eq!(args.documents.archive, None);
            }
            Commands::Inspect(_) => panic!("expected import"),
        }
    }

    #[test]
    fn test_parse_inspect_with_global_config() {
        let cli = Cli::parse_from([
            "supply-import",
            "inspect",
            "listas.csv",
            "--archive",
            "pdfs.zip",
            "--config",
            "custom.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Inspect(args) => {
                assert_eq!(args.documents.archive, Some(PathBuf::from("pdfs.zip")));
            }
            Commands::Import(_) => panic!("expected inspect"),
        }
    }
}
