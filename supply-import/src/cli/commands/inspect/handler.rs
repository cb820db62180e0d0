//! Inspect command handler: prints the import plan without touching the
//! backend

use anyhow::Result;
use colored::*;

use super::InspectCommand;
use crate::import::excel::read_sheet;
use crate::import::{Group, ImportOptions, ImportPlan, PendingDocument, group_rows};
use crate::services::matching::{DocumentCandidate, MatchingMode, MatchingResults, match_documents};

pub fn handle_inspect_command(args: InspectCommand) -> Result<()> {
    let sheet = read_sheet(&args.sheet)?;
    let grouping = group_rows(&sheet.rows, None);
    let candidates = args.documents.load_candidates()?;
    let mode = args.documents.matching_mode(&args.sheet)?;
    let matches = match_documents(&candidates, &grouping.groups, &mode);

    println!(
        "{} '{}': {} rows, {} groups, {} line items",
        "Sheet".bold(),
        sheet.name,
        sheet.rows.len(),
        grouping.groups.len(),
        grouping.line_item_count()
    );
    if !sheet.columns.unknown_columns().is_empty() {
        println!(
            "Ignored columns: {}",
            sheet.columns.unknown_columns().join(", ").dimmed()
        );
    }
    let mode_label = match &mode {
        MatchingMode::Heuristic => "file names".to_string(),
        MatchingMode::Manifest(manifest) => format!("manifest ({} entries)", manifest.entries.len()),
    };
    println!("Document matching by {}", mode_label);
    println!();

    let plan = ImportPlan::new(grouping, &candidates, &matches, &ImportOptions::default());
    print_plan(&plan, &matches, args.items);
    print_leftovers(&plan, &candidates, &matches);
    Ok(())
}

fn print_plan(plan: &ImportPlan, matches: &MatchingResults, show_items: bool) {
    let mut school = None;
    let mut course = None;

    for item in &plan.items {
        let group = &item.group;
        if school.as_ref() != Some(&group.key.school) {
            let status = match group.school.exists {
                Some(true) => "existing".green(),
                Some(false) => "new".yellow(),
                None => "unchecked".dimmed(),
            };
            println!("{} [{}]", group.school.label().bold(), status);
            school = Some(group.key.school.clone());
            course = None;
        }
        if course.as_ref() != Some(&group.key.course) {
            println!("  {}{}", group.course.name.cyan(), course_details(group));
            course = Some(group.key.course.clone());
        }

        let list = group
            .list
            .name
            .as_deref()
            .map(|name| format!(" / {}", name))
            .unwrap_or_default();
        println!(
            "    {}{} ({} items, rows {})",
            group.subject.name,
            list,
            group.items.len(),
            row_span(&group.lines)
        );
        if show_items {
            for line_item in &group.items {
                let quantity = line_item
                    .quantity
                    .map(|q| format!("{} x ", q))
                    .unwrap_or_default();
                println!("        - {}{}", quantity, line_item.name.dimmed());
            }
        }

        let match_types = matches
            .assignments
            .get(&group.key)
            .map(|info| info.matches.as_slice())
            .unwrap_or_default();
        if item.documents.is_empty() {
            println!("        {}", "no document".dimmed());
        }
        for (idx, document) in item.documents.iter().enumerate() {
            let how = match document {
                PendingDocument::Ready(_) => match_types
                    .get(idx)
                    .map(|m| m.match_type.label().to_string())
                    .unwrap_or_default(),
                PendingDocument::Remote { url } => format!("download {}", url),
            };
            println!("        {} {} {}", "+".green(), document.name(), how.dimmed());
        }
    }
}

fn print_leftovers(plan: &ImportPlan, candidates: &[DocumentCandidate], matches: &MatchingResults) {
    if !matches.unmatched.is_empty() {
        println!();
        println!("{}", "Unmatched documents".yellow().bold());
        for idx in &matches.unmatched {
            if let Some(candidate) = candidates.get(*idx) {
                println!("  {}", candidate.name);
            }
        }
    }
    if !matches.warnings.is_empty() {
        println!();
        println!("{}", "Manifest warnings".yellow().bold());
        for warning in &matches.warnings {
            println!("  {}", warning);
        }
    }
    if !plan.skipped_rows.is_empty() {
        println!();
        println!("{}", "Skipped rows".yellow().bold());
        for skipped in &plan.skipped_rows {
            println!("  row {}: {}", skipped.line, skipped.reason);
        }
    }
}

fn course_details(group: &Group) -> String {
    let components = &group.course.components;
    let mut parts = Vec::new();
    if let Some(level) = components.level {
        parts.push(level.label().to_string());
    }
    if let Some(grade) = components.grade {
        parts.push(format!("grade {}", grade));
    }
    if let Some(year) = components.year {
        parts.push(year.to_string());
    }
    if components.is_ambiguous() {
        parts.push("ambiguous grade".to_string());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", ")).dimmed().to_string()
    }
}

/// "4" or "4-9" for a group's spreadsheet rows
fn row_span(lines: &[usize]) -> String {
    match (lines.iter().min(), lines.iter().max()) {
        (Some(first), Some(last)) if first != last => format!("{}-{}", first, last),
        (Some(first), _) => first.to_string(),
        _ => "-".to_string(),
    }
}
