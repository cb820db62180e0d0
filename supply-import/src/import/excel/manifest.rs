//! Manifest sheets
//!
//! A manifest is either a sheet named "manifest"/"manifiesto" inside the
//! import workbook, or a separate `.xlsx`/`.csv` file. Required columns are
//! the course label and the document name; an RBD column is optional.

use anyhow::{Context, Result};
use calamine::Reader;
use std::path::Path;

use super::{Record, SheetFormat, csv::csv_records, open_xlsx, xlsx_records};
use crate::import::row::{fold_header, parse_int};
use crate::services::matching::{Manifest, ManifestEntry};

const COURSE_ALIASES: &[&str] = &["curso", "nombrecurso", "etiquetacurso", "course", "courselabel"];
const DOCUMENT_ALIASES: &[&str] = &[
    "documento",
    "archivo",
    "nombrearchivo",
    "pdf",
    "document",
    "documentname",
    "file",
    "filename",
];
const SCHOOL_CODE_ALIASES: &[&str] = &["rbd", "codigorbd", "schoolcode"];

pub fn is_manifest_sheet(name: &str) -> bool {
    matches!(fold_header(name).as_str(), "manifest" | "manifiesto")
}

/// Read a standalone manifest file
pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let format = SheetFormat::from_path(path)?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

    let records = match format {
        SheetFormat::Csv => csv_records(&bytes)?,
        SheetFormat::Xlsx => {
            let mut workbook = open_xlsx(&bytes)?;
            let names = workbook.sheet_names();
            let name = names
                .iter()
                .find(|n| is_manifest_sheet(n))
                .or_else(|| names.first())
                .context("Manifest workbook has no sheets")?
                .clone();
            xlsx_records(&mut workbook, &name)?
        }
    };
    parse_manifest(&records).with_context(|| format!("Invalid manifest: {}", path.display()))
}

/// Manifest sheet embedded in the import workbook, if there is one
pub fn read_workbook_manifest(bytes: &[u8]) -> Result<Option<Manifest>> {
    let mut workbook = open_xlsx(bytes)?;
    let Some(name) = workbook
        .sheet_names()
        .into_iter()
        .find(|n| is_manifest_sheet(n))
    else {
        return Ok(None);
    };
    let records = xlsx_records(&mut workbook, &name)?;
    parse_manifest(&records).map(Some)
}

fn column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.contains(&fold_header(h).as_str()))
}

pub fn parse_manifest(records: &[Record]) -> Result<Manifest> {
    let (header_pos, course_col, document_col) = records
        .iter()
        .enumerate()
        .find_map(|(pos, (_, cells))| {
            Some((pos, column(cells, COURSE_ALIASES)?, column(cells, DOCUMENT_ALIASES)?))
        })
        .context("No header row with course and document columns")?;
    let code_col = column(&records[header_pos].1, SCHOOL_CODE_ALIASES);

    let cell = |cells: &[String], col: usize| {
        cells
            .get(col)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    };

    let mut manifest = Manifest::default();
    for (line, cells) in records.iter().skip(header_pos + 1) {
        let (Some(course_label), Some(document_name)) =
            (cell(cells, course_col), cell(cells, document_col))
        else {
            log::debug!("Skipping manifest line {}: missing course or document", line);
            continue;
        };
        let school_code = code_col
            .and_then(|col| cell(cells, col))
            .and_then(|c| parse_int(&c))
            .and_then(|c| u64::try_from(c).ok());

        manifest.entries.push(ManifestEntry {
            course_label,
            document_name,
            school_code,
        });
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn record(line: usize, cells: &[&str]) -> Record {
        (line, cells.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn test_parses_entries_with_optional_code() {
        let records = vec![
            record(1, &["Curso", "Archivo", "RBD"]),
            record(2, &["1° Básico", "lista_1b.pdf", "12345"]),
            record(3, &["2° Básico", "", ""]),
            record(4, &["3° Básico", "lista_3b", ""]),
        ];

        let manifest = parse_manifest(&records).unwrap();

        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(manifest.entries[0].school_code, Some(12345));
        assert_eq!(manifest.entries[1].document_name, "lista_3b");
        assert_eq!(manifest.entries[1].school_code, None);
    }

    #[test]
    fn test_embedded_manifest_sheet() {
        let mut workbook = Workbook::new();
        workbook.add_worksheet().set_name("Listas").unwrap();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Manifiesto").unwrap();
        sheet.write_string(0, 0, "Curso").unwrap();
        sheet.write_string(0, 1, "Documento").unwrap();
        sheet.write_string(1, 0, "4° Medio").unwrap();
        sheet.write_string(1, 1, "4M.pdf").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let manifest = read_workbook_manifest(&bytes).unwrap().unwrap();

        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].course_label, "4° Medio");
    }
}
