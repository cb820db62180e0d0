//! Import command handler

use anyhow::{Context, Result, bail};
use colored::*;
use log::{info, warn};
use std::path::Path;

use super::ImportCommand;
use crate::api::{ContentStore, HttpContentStore, MemoryStore, ResilienceConfig};
use crate::config::Config;
use crate::import::excel::read_sheet;
use crate::import::{
    CancellationFlag, HttpFetcher, ImportError, ImportOptions, ImportOrchestrator, ImportPlan,
    ImportReport, ImportSession, SchoolIndex, group_rows,
};
use crate::services::matching::match_documents;

pub async fn handle_import_command(args: ImportCommand, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    let resilience = if args.dry_run {
        ResilienceConfig::immediate()
    } else {
        config.resilience()
    };

    let memory = args.dry_run.then(MemoryStore::new);
    let http;
    let store: &dyn ContentStore = match &memory {
        Some(memory) => {
            println!("{}", "Dry run: nothing will be written to the backend".yellow());
            memory
        }
        None => {
            http = HttpContentStore::new(&config.api)?;
            &http
        }
    };

    let mut session = match ImportSession::start(store, &resilience.timeouts).await {
        Ok(session) => session,
        Err(e) if e.is_fatal_config() => {
            return Err(e).context("Cannot reach the content store");
        }
        Err(e) => {
            warn!("Could not load existing schools, continuing without them: {}", e);
            ImportSession::new(SchoolIndex::new())
        }
    };

    let sheet = read_sheet(&args.sheet)?;
    if !sheet.columns.is_importable() {
        bail!(
            "Spreadsheet {} lacks the school, course, subject or item columns",
            args.sheet.display()
        );
    }
    for column in sheet.columns.unknown_columns() {
        info!("Ignoring unknown column '{}'", column);
    }

    let grouping = group_rows(&sheet.rows, Some(session.index()));
    println!(
        "Read {} rows from '{}': {} groups, {} line items, {} rows skipped",
        sheet.rows.len(),
        sheet.name,
        grouping.groups.len(),
        grouping.line_item_count(),
        grouping.skipped.len()
    );

    let candidates = args.documents.load_candidates()?;
    let mode = args.documents.matching_mode(&args.sheet)?;
    let matches = match_documents(&candidates, &grouping.groups, &mode);
    if !matches.unmatched.is_empty() {
        warn!("{} documents matched no group", matches.unmatched.len());
    }

    let options = ImportOptions {
        download_source_urls: config.import.download_source_urls && !args.dry_run,
    };
    let mut plan = ImportPlan::new(grouping, &candidates, &matches, &options);

    let fetcher = HttpFetcher::new(resilience.timeouts.upload)?;
    let cancel = CancellationFlag::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current group");
            interrupt.cancel();
        }
    });

    let report = ImportOrchestrator::new(store, resilience)
        .with_fetcher(&fetcher)
        .with_cancellation(cancel)
        .run(&mut session, &mut plan)
        .await;

    print_summary(&report);
    if let Some(memory) = &memory {
        print_dry_run(memory);
    }

    if let Some(path) = &args.report {
        report
            .export(path, args.failed_only)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        println!("Report saved to: {}", path.display().to_string().bright_green());
    }

    if let Some(reason) = &report.halted {
        bail!("Import halted: {}", reason);
    }
    if report.cancelled {
        return Err(ImportError::Cancelled.into());
    }
    Ok(())
}

/// What a real run would have created, as recorded by the in-memory store
fn print_dry_run(memory: &MemoryStore) {
    let schools = memory.schools();
    let courses = memory.courses();
    println!(
        "  {} {} schools, {} courses",
        "Dry run would create:".yellow(),
        schools.len(),
        courses.len()
    );
    for school in &schools {
        let count = courses.iter().filter(|c| c.school_id == school.id).count();
        println!("    {} ({} courses)", school.name, count);
    }
}

fn print_summary(report: &ImportReport) {
    println!();
    println!("{}", "Import summary".bold());
    println!(
        "  {} {}",
        "Succeeded:".green(),
        report.success_count().to_string().green().bold()
    );
    let failures = report.failure_count();
    if failures > 0 {
        println!("  {} {}", "Failed:".red(), failures.to_string().red().bold());
        for result in report.failed() {
            println!(
                "    {} [{}] {}",
                result.group_key.to_string().red(),
                result.stage,
                result.message.dimmed()
            );
        }
    } else {
        println!("  Failed: 0");
    }
    println!("  Versions appended: {}", report.versions_appended());
    if !report.skipped_rows.is_empty() {
        println!(
            "  {} {}",
            "Rows skipped:".yellow(),
            report.skipped_rows.len()
        );
    }
    if report.cancelled {
        println!(
            "  {} {} groups were not processed",
            "Cancelled:".yellow().bold(),
            report.unprocessed_count()
        );
    }
    if let Some(reason) = &report.halted {
        println!("  {} {}", "Halted:".red().bold(), reason);
    }
}
