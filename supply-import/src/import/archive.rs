//! Zip archives of list documents

use anyhow::{Context, Result};
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

use crate::services::matching::{DocumentCandidate, DocumentSource};

/// One file stored in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn is_pdf(&self) -> bool {
        Path::new(self.file_name())
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
    }
}

/// Skips directories, macOS resource forks and hidden files
fn is_noise(name: &str) -> bool {
    name.ends_with('/')
        || name.starts_with("__MACOSX/")
        || name.split('/').any(|part| part.starts_with('.'))
}

/// Every regular file in the archive
pub fn list_entries(bytes: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("invalid zip archive")?;

    let mut entries = Vec::new();
    for idx in 0..archive.len() {
        let mut file = archive
            .by_index(idx)
            .with_context(|| format!("failed to read archive entry {}", idx))?;
        if file.is_dir() || is_noise(file.name()) {
            continue;
        }
        let name = file.name().to_string();
        let mut content = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut content)
            .with_context(|| format!("failed to extract {}", name))?;
        entries.push(ArchiveEntry {
            name,
            bytes: content,
        });
    }
    Ok(entries)
}

/// PDF entries of an archive file as document candidates
pub fn read_archive_documents(path: &Path) -> Result<Vec<DocumentCandidate>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read archive {}", path.display()))?;
    let entries = list_entries(&bytes)
        .with_context(|| format!("failed to open archive {}", path.display()))?;

    let total = entries.len();
    let documents: Vec<DocumentCandidate> = entries
        .into_iter()
        .filter(ArchiveEntry::is_pdf)
        .map(|entry| {
            let name = entry.file_name().to_string();
            DocumentCandidate::new(name, entry.bytes, DocumentSource::Archive)
        })
        .collect();
    log::info!(
        "Archive {}: {} PDF documents ({} entries)",
        path.display(),
        documents.len(),
        total
    );
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    fn archive(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.add_directory("listas/", FileOptions::default()).unwrap();
        for (name, content) in files {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_skips_directories_and_metadata() {
        let bytes = archive(&[
            ("listas/1-basico.pdf", b"%PDF-1"),
            ("__MACOSX/listas/._1-basico.pdf", b"junk"),
            ("listas/.DS_Store", b"junk"),
            ("listas/leeme.txt", b"hola"),
        ]);

        let entries = list_entries(&bytes).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();

        assert_eq!(names, vec!["listas/1-basico.pdf", "listas/leeme.txt"]);
        assert!(entries[0].is_pdf());
        assert!(!entries[1].is_pdf());
        assert_eq!(entries[0].file_name(), "1-basico.pdf");
    }

    #[test]
    fn test_rejects_non_zip_input() {
        assert!(list_entries(b"not a zip").is_err());
    }
}
