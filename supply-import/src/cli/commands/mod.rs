pub mod import;
pub mod inspect;

use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::import::archive::read_archive_documents;
use crate::import::excel::{SheetFormat, read_manifest, read_workbook_manifest};
use crate::services::matching::{DocumentCandidate, DocumentSource, MatchingMode};

/// Document inputs shared by `import` and `inspect`
#[derive(Args, Debug, Clone, Default)]
pub struct DocumentArgs {
    /// ZIP archive of PDF lists
    #[arg(long)]
    pub archive: Option<PathBuf>,

    /// Manifest mapping course labels to document names (CSV or XLSX)
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Individual PDF file; may be repeated
    #[arg(long = "pdf")]
    pub pdf: Vec<PathBuf>,
}

impl DocumentArgs {
    /// Manual files first, then archive entries
    pub fn load_candidates(&self) -> Result<Vec<DocumentCandidate>> {
        let mut candidates = Vec::new();
        for path in &self.pdf {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read document: {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            candidates.push(DocumentCandidate::new(name, bytes, DocumentSource::Manual));
        }
        if let Some(archive) = &self.archive {
            candidates.extend(read_archive_documents(archive)?);
        }
        info!("{} document candidates loaded", candidates.len());
        Ok(candidates)
    }

    /// Manifest mode when a manifest is given explicitly or the workbook
    /// carries a manifest sheet
    pub fn matching_mode(&self, sheet: &Path) -> Result<MatchingMode> {
        let manifest = match &self.manifest {
            Some(path) => Some(read_manifest(path)?),
            None if SheetFormat::from_path(sheet)? == SheetFormat::Xlsx => {
                let bytes = std::fs::read(sheet)
                    .with_context(|| format!("Failed to read spreadsheet: {}", sheet.display()))?;
                read_workbook_manifest(&bytes)?
            }
            None => None,
        };

        match manifest {
            Some(manifest) if !manifest.is_empty() => {
                info!("Matching documents with a manifest of {} entries", manifest.entries.len());
                Ok(MatchingMode::Manifest(manifest))
            }
            Some(_) => {
                warn!("Manifest is empty, falling back to file name matching");
                Ok(MatchingMode::Heuristic)
            }
            None => Ok(MatchingMode::Heuristic),
        }
    }
}
