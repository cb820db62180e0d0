//! Spreadsheet readers
//!
//! `.xlsx` workbooks go through calamine, `.csv` files through the csv
//! crate. Both produce plain text records that are resolved against the
//! column alias table into typed rows.

pub mod cells;
pub mod csv;
pub mod manifest;

use anyhow::{Context, Result, bail};
use calamine::{Reader, Xlsx};
use std::io::Cursor;
use std::path::Path;

use super::row::{ColumnMap, Row};
pub use cells::{cell_to_string, excel_serial_to_date};
pub use manifest::{read_manifest, read_workbook_manifest};

/// Header rows are searched for within this many leading records
const HEADER_SEARCH_DEPTH: usize = 10;

/// A text record with its 1-based spreadsheet line number
pub type Record = (usize, Vec<String>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Csv,
}

impl SheetFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" | "xlsm" => Ok(SheetFormat::Xlsx),
            "csv" | "txt" => Ok(SheetFormat::Csv),
            other => bail!(
                "Unsupported spreadsheet format '.{}' (expected .xlsx or .csv): {}",
                other,
                path.display()
            ),
        }
    }
}

/// Parsed import spreadsheet
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub columns: ColumnMap,
    pub rows: Vec<Row>,
}

pub fn read_sheet(path: &Path) -> Result<Sheet> {
    let format = SheetFormat::from_path(path)?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read spreadsheet: {}", path.display()))?;
    parse_sheet(&bytes, format)
        .with_context(|| format!("Failed to parse spreadsheet: {}", path.display()))
}

pub fn parse_sheet(bytes: &[u8], format: SheetFormat) -> Result<Sheet> {
    let (name, records) = match format {
        SheetFormat::Xlsx => {
            let mut workbook = open_xlsx(bytes)?;
            let name = workbook
                .sheet_names()
                .into_iter()
                .find(|n| !manifest::is_manifest_sheet(n))
                .context("Workbook has no data sheet")?;
            let records = xlsx_records(&mut workbook, &name)?;
            (name, records)
        }
        SheetFormat::Csv => ("csv".to_string(), csv::csv_records(bytes)?),
    };
    build_sheet(name, records)
}

pub(crate) fn open_xlsx(bytes: &[u8]) -> Result<Xlsx<Cursor<&[u8]>>> {
    Xlsx::new(Cursor::new(bytes)).context("Not a valid .xlsx workbook")
}

pub(crate) fn xlsx_records(
    workbook: &mut Xlsx<Cursor<&[u8]>>,
    sheet_name: &str,
) -> Result<Vec<Record>> {
    let range = workbook
        .worksheet_range(sheet_name)
        .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    Ok(range
        .rows()
        .enumerate()
        .map(|(idx, cells)| (first_row + idx + 1, cells.iter().map(cell_to_string).collect()))
        .collect())
}

fn build_sheet(name: String, records: Vec<Record>) -> Result<Sheet> {
    let header_pos = records
        .iter()
        .take(HEADER_SEARCH_DEPTH)
        .position(|(_, cells)| ColumnMap::resolve(cells).is_importable())
        .with_context(|| {
            format!(
                "Sheet '{}' has no header row with school, course, subject and item columns",
                name
            )
        })?;

    let columns = ColumnMap::resolve(&records[header_pos].1);
    if !columns.unknown_columns().is_empty() {
        log::debug!("Ignoring unknown columns: {}", columns.unknown_columns().join(", "));
    }

    let rows = records
        .iter()
        .skip(header_pos + 1)
        .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|(line, cells)| columns.row(*line, cells))
        .collect();

    Ok(Sheet {
        name,
        columns,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn workbook_bytes(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Listas").unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if let Ok(n) = value.parse::<f64>() {
                    sheet.write_number(r as u32, c as u16, n).unwrap();
                } else {
                    sheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_reads_xlsx_rows_with_aliases() {
        let bytes = workbook_bytes(&[
            &["Importación de listas"],
            &["RBD", "Colegio", "Curso", "Asignatura", "Producto", "Cantidad", "Extra"],
            &["12345", "Colegio Andino", "1º Básico", "Lenguaje", "Cuaderno", "2", "x"],
            &[],
            &["12345", "Colegio Andino", "1º Básico", "Matemática", "Regla", "1", ""],
        ]);

        let sheet = parse_sheet(&bytes, SheetFormat::Xlsx).unwrap();

        assert_eq!(sheet.name, "Listas");
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].line, 3);
        assert_eq!(sheet.rows[0].school_code.as_deref(), Some("12345"));
        assert_eq!(sheet.rows[0].quantity, Some(2));
        assert_eq!(sheet.rows[1].line, 5);
        assert_eq!(sheet.columns.unknown_columns(), ["Extra"]);
    }

    #[test]
    fn test_missing_header_is_an_error() {
        let bytes = workbook_bytes(&[&["Nombre", "Valor"], &["a", "b"]]);

        assert!(parse_sheet(&bytes, SheetFormat::Xlsx).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SheetFormat::from_path(Path::new("a/listas.XLSX")).unwrap(), SheetFormat::Xlsx);
        assert_eq!(SheetFormat::from_path(Path::new("listas.csv")).unwrap(), SheetFormat::Csv);
        assert!(SheetFormat::from_path(Path::new("listas.ods")).is_err());
    }
}
