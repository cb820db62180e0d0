//! Per-group outcomes and the job report
//!
//! The report can be exported as CSV or XLSX. The failed-only export keeps the
//! group key columns and source line numbers so the failing rows can be fixed
//! and re-submitted in a follow-up spreadsheet.

use anyhow::{Context, Result};
use csv::Writer;
use rust_xlsxwriter::{Format, Workbook};
use std::io::Write;
use std::path::Path;

use super::error::ImportStage;
use super::group::{GroupKey, SkippedRow};

/// Identifiers produced by a successful group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPayload {
    pub school_id: Option<String>,
    pub course_id: Option<String>,
    pub versions_appended: usize,
    pub line_items: usize,
}

/// Outcome of one group
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub group_key: GroupKey,
    /// Last stage reached: the failing one, or `List` on success
    pub stage: ImportStage,
    pub success: bool,
    pub message: String,
    pub lines: Vec<usize>,
    pub payload: Option<ResultPayload>,
}

impl ImportResult {
    pub fn succeeded(
        group_key: GroupKey,
        lines: Vec<usize>,
        message: impl Into<String>,
        payload: ResultPayload,
    ) -> Self {
        Self {
            group_key,
            stage: ImportStage::List,
            success: true,
            message: message.into(),
            lines,
            payload: Some(payload),
        }
    }

    pub fn failed(
        group_key: GroupKey,
        lines: Vec<usize>,
        stage: ImportStage,
        message: impl Into<String>,
    ) -> Self {
        Self {
            group_key,
            stage,
            success: false,
            message: message.into(),
            lines,
            payload: None,
        }
    }
}

/// Everything a finished (or stopped) job produced
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub results: Vec<ImportResult>,
    pub skipped_rows: Vec<SkippedRow>,
    pub total_groups: usize,
    /// The caller cancelled before every group was processed
    pub cancelled: bool,
    /// Reason the job stopped early on a backend-wide failure
    pub halted: Option<String>,
}

const COLUMNS: [&str; 8] = [
    "school", "course", "subject", "list", "stage", "status", "message", "rows",
];

impl ImportReport {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    /// Groups that never produced a result
    pub fn unprocessed_count(&self) -> usize {
        self.total_groups.saturating_sub(self.results.len())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ImportResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn versions_appended(&self) -> usize {
        self.results
            .iter()
            .filter_map(|r| r.payload.as_ref())
            .map(|p| p.versions_appended)
            .sum()
    }

    fn rows(&self, failed_only: bool) -> impl Iterator<Item = [String; 8]> + '_ {
        self.results
            .iter()
            .filter(move |r| !failed_only || !r.success)
            .map(|r| {
                [
                    r.group_key.school.clone(),
                    r.group_key.course.clone(),
                    r.group_key.subject.clone(),
                    r.group_key.list.clone(),
                    r.stage.to_string(),
                    if r.success { "ok" } else { "failed" }.to_string(),
                    r.message.clone(),
                    r.lines
                        .iter()
                        .map(|l| l.to_string())
                        .collect::<Vec<_>>()
                        .join(" "),
                ]
            })
    }

    /// Write the report, choosing the format from the file extension
    pub fn export(&self, path: &Path, failed_only: bool) -> Result<()> {
        let is_xlsx = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
        if is_xlsx {
            self.write_xlsx(path, failed_only)?;
        } else {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create report file: {}", path.display()))?;
            self.write_csv(file, failed_only)?;
        }
        log::info!("Report written to {}", path.display());
        Ok(())
    }

    pub fn write_csv<W: Write>(&self, out: W, failed_only: bool) -> Result<()> {
        let mut wtr = Writer::from_writer(out);
        wtr.write_record(COLUMNS)
            .context("Failed to write CSV header")?;
        for row in self.rows(failed_only) {
            wtr.write_record(&row)
                .context("Failed to write report row")?;
        }
        wtr.flush().context("Failed to flush CSV writer")?;
        Ok(())
    }

    pub fn write_xlsx(&self, path: &Path, failed_only: bool) -> Result<()> {
        let mut workbook = self.workbook(failed_only)?;
        workbook
            .save(path)
            .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;
        Ok(())
    }

    pub fn xlsx_bytes(&self, failed_only: bool) -> Result<Vec<u8>> {
        let mut workbook = self.workbook(failed_only)?;
        Ok(workbook.save_to_buffer()?)
    }

    fn workbook(&self, failed_only: bool) -> Result<Workbook> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();

        let sheet = workbook.add_worksheet();
        sheet.set_name("Results")?;
        for (col, name) in COLUMNS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *name, &bold)?;
        }
        for (idx, row) in self.rows(failed_only).enumerate() {
            for (col, value) in row.iter().enumerate() {
                sheet.write_string((idx + 1) as u32, col as u16, value)?;
            }
        }

        if !self.skipped_rows.is_empty() {
            let skipped = workbook.add_worksheet();
            skipped.set_name("Skipped rows")?;
            skipped.write_string_with_format(0, 0, "row", &bold)?;
            skipped.write_string_with_format(0, 1, "reason", &bold)?;
            for (idx, row) in self.skipped_rows.iter().enumerate() {
                skipped.write_number((idx + 1) as u32, 0, row.line as f64)?;
                skipped.write_string((idx + 1) as u32, 1, &row.reason)?;
            }
        }

        Ok(workbook)
    }
}
