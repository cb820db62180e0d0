//! Document matching
//!
//! Assigns document candidates (manual files, archive entries) to import
//! groups, either from an explicit manifest or heuristically from file names.
//! Assignments only ever accumulate: a group may end up with several
//! documents, each becoming its own list version.

pub mod core;
pub mod manifest;
pub mod models;

pub use manifest::{Manifest, ManifestEntry};
pub use models::{DocumentCandidate, DocumentMatch, DocumentSource, MatchInfo, MatchScore, MatchType};

use std::collections::HashMap;

use crate::import::group::{Group, GroupKey};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum MatchingMode {
    #[default]
    Heuristic,
    Manifest(Manifest),
}

/// Complete matching results
#[derive(Debug, Clone, Default)]
pub struct MatchingResults {
    pub assignments: HashMap<GroupKey, MatchInfo>,
    /// Candidates no group accepted
    pub unmatched: Vec<usize>,
    pub warnings: Vec<String>,
}

impl MatchingResults {
    /// Candidate indices assigned to a group, in assignment order
    pub fn documents_for(&self, key: &GroupKey) -> Vec<usize> {
        self.assignments
            .get(key)
            .map(|info| info.documents().collect())
            .unwrap_or_default()
    }

    pub fn assigned_count(&self) -> usize {
        self.assignments.values().map(MatchInfo::count).sum()
    }
}

/// Match candidates to groups. In manifest mode, candidates the manifest
/// does not mention stay unmatched.
pub fn match_documents(
    candidates: &[DocumentCandidate],
    groups: &[Group],
    mode: &MatchingMode,
) -> MatchingResults {
    let mut results = MatchingResults::default();
    if candidates.is_empty() || groups.is_empty() {
        results.unmatched = (0..candidates.len()).collect();
        return results;
    }

    match mode {
        MatchingMode::Heuristic => {
            results.unmatched = core::match_heuristic(candidates, groups, &mut results.assignments);
        }
        MatchingMode::Manifest(manifest) => {
            results.warnings =
                manifest::match_manifest(manifest, candidates, groups, &mut results.assignments);
            results.unmatched = (0..candidates.len())
                .filter(|idx| !results.assignments.values().any(|m| m.has_document(*idx)))
                .collect();
        }
    }

    for warning in &results.warnings {
        log::warn!("{}", warning);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::group::group_rows;
    use crate::import::row::Row;

    fn row(line: usize, course: &str, subject: &str) -> Row {
        Row {
            line,
            school_code: Some("12345".to_string()),
            course_name: Some(course.to_string()),
            subject_name: Some(subject.to_string()),
            item_name: Some("Cuaderno".to_string()),
            ..Default::default()
        }
    }

    fn pdf(name: &str) -> DocumentCandidate {
        DocumentCandidate::new(name, b"%PDF-1.4".to_vec(), DocumentSource::Manual)
    }

    #[test]
    fn test_matching_grade_receives_document_alone() {
        let groups = group_rows(
            &[row(2, "5° Básico 2026", "Lenguaje"), row(3, "6° Básico 2026", "Lenguaje")],
            None,
        )
        .groups;
        let candidates = vec![pdf("5-basico-2026.pdf")];

        let results = match_documents(&candidates, &groups, &MatchingMode::Heuristic);

        let info = &results.assignments[&groups[0].key];
        assert!(info.matches[0].score.unwrap_or(0) >= 5);
        assert!(results.documents_for(&groups[1].key).is_empty());
    }

    #[test]
    fn test_documents_accumulate_per_group() {
        let groups = group_rows(&[row(2, "1° Medio", "Física")], None).groups;
        let candidates = vec![pdf("1 medio lista marzo.pdf"), pdf("1 medio lista julio.pdf")];

        let results = match_documents(&candidates, &groups, &MatchingMode::Heuristic);

        assert_eq!(results.documents_for(&groups[0].key), vec![0, 1]);
        assert!(results.unmatched.is_empty());
    }

    #[test]
    fn test_unrelated_document_is_unmatched() {
        let groups = group_rows(&[row(2, "3° Básico", "Arte")], None).groups;
        let candidates = vec![pdf("reglamento interno.pdf")];

        let results = match_documents(&candidates, &groups, &MatchingMode::Heuristic);

        assert_eq!(results.unmatched, vec![0]);
        assert_eq!(results.assigned_count(), 0);
    }

    #[test]
    fn test_manifest_mode_assigns_named_documents() {
        let groups = group_rows(
            &[row(2, "1° Básico", "Lenguaje"), row(3, "2° Básico", "Lenguaje")],
            None,
        )
        .groups;
        let candidates = vec![pdf("archivo_a.pdf"), pdf("archivo_b.pdf")];
        let manifest = Manifest {
            entries: vec![ManifestEntry {
                course_label: "Segundo Básico".into(),
                document_name: "ARCHIVO_B".into(),
                school_code: Some(12345),
            }],
        };

        let results = match_documents(&candidates, &groups, &MatchingMode::Manifest(manifest));

        assert_eq!(results.documents_for(&groups[1].key), vec![1]);
        assert!(results.documents_for(&groups[0].key).is_empty());
        assert_eq!(results.unmatched, vec![0]);
    }
}
