//! Manifest-driven matching
//!
//! A manifest row names a course and the document that belongs to it. The
//! document is looked up among the candidates by case-insensitive,
//! extension-agnostic name comparison, falling back to containment.

use std::collections::HashMap;

use super::models::{DocumentCandidate, MatchInfo, MatchType};
use crate::import::group::{Group, GroupKey};
use crate::import::normalize::{extract_components, normalize_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub course_label: String,
    pub document_name: String,
    /// Restricts the entry to one school when given
    pub school_code: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn fold_stem(name: &str) -> String {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    normalize_name(&stem.replace(['_', '-'], " "))
}

/// Index of the candidate named `name`: exact stem match first, then a stem
/// that contains (or is contained in) the wanted one
pub fn find_document(name: &str, candidates: &[DocumentCandidate]) -> Option<usize> {
    let wanted = fold_stem(name);
    if wanted.is_empty() {
        return None;
    }
    let stems: Vec<String> = candidates.iter().map(|c| fold_stem(&c.name)).collect();

    stems.iter().position(|s| *s == wanted).or_else(|| {
        stems
            .iter()
            .position(|s| !s.is_empty() && (s.contains(&wanted) || wanted.contains(s.as_str())))
    })
}

/// Whether a manifest course label designates the group's course
pub fn label_matches(label: &str, group: &Group) -> bool {
    if normalize_name(label) == normalize_name(&group.course.name) {
        return true;
    }
    let wanted = extract_components(label);
    let course = &group.course.components;
    wanted.grade.is_some()
        && wanted.grade == course.grade
        && wanted.level == course.level
        && (wanted.year.is_none() || course.year.is_none() || wanted.year == course.year)
}

/// Apply every manifest entry. Returns a warning per entry that found no
/// document or no group.
pub fn match_manifest(
    manifest: &Manifest,
    candidates: &[DocumentCandidate],
    groups: &[Group],
    assignments: &mut HashMap<GroupKey, MatchInfo>,
) -> Vec<String> {
    let mut warnings = Vec::new();

    for entry in &manifest.entries {
        let Some(doc_idx) = find_document(&entry.document_name, candidates) else {
            warnings.push(format!(
                "document '{}' for '{}' is not in the archive",
                entry.document_name, entry.course_label
            ));
            continue;
        };

        let targets: Vec<&Group> = groups
            .iter()
            .filter(|g| entry.school_code.is_none() || g.school.code == entry.school_code)
            .filter(|g| label_matches(&entry.course_label, g))
            .collect();
        if targets.is_empty() {
            warnings.push(format!(
                "no group matches course '{}' of document '{}'",
                entry.course_label, entry.document_name
            ));
            continue;
        }

        for group in targets {
            assignments
                .entry(group.key.clone())
                .or_default()
                .add(doc_idx, MatchType::Manifest, None);
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::matching::DocumentSource;

    fn candidate(name: &str) -> DocumentCandidate {
        DocumentCandidate::new(name, Vec::new(), DocumentSource::Archive)
    }

    #[test]
    fn test_lookup_ignores_case_and_extension() {
        let candidates = vec![candidate("listas/Lista_3B.PDF"), candidate("Lista 1A.pdf")];

        assert_eq!(find_document("lista 1a", &candidates), Some(1));
        assert_eq!(find_document("LISTA_3B.pdf", &candidates), Some(0));
    }

    #[test]
    fn test_lookup_falls_back_to_containment() {
        let candidates = vec![candidate("2026 lista 4 basico final.pdf")];

        assert_eq!(find_document("lista 4 basico", &candidates), Some(0));
        assert_eq!(find_document("lista 5 basico", &candidates), None);
    }
}
