//! Heuristic document scoring
//!
//! Each candidate file name goes through the course normalizer and is scored
//! against every group's course: +3 same grade, +2 same level, +1 same year,
//! +1 when either normalized text contains the other.

use std::collections::HashMap;

use super::models::{DocumentCandidate, MatchInfo, MatchScore, MatchType};
use crate::import::group::{Group, GroupKey};
use crate::import::normalize::{CourseComponents, extract_components};

/// Tied groups at or above this score do not share a document
pub const DECISIVE_SCORE: u8 = 5;

pub fn score(document: &CourseComponents, course: &CourseComponents) -> MatchScore {
    let (doc_text, course_text) = (&document.normalized_text, &course.normalized_text);

    MatchScore {
        grade: agree(document.grade, course.grade),
        level: agree(document.level, course.level),
        year: agree(document.year, course.year),
        containment: !doc_text.is_empty()
            && !course_text.is_empty()
            && (doc_text.contains(course_text.as_str()) || course_text.contains(doc_text.as_str())),
    }
}

fn agree<T: PartialEq>(a: Option<T>, b: Option<T>) -> bool {
    a.is_some() && a == b
}

/// Pick the groups that receive a document from their acceptable scores,
/// given as (group index, score) in group order
pub fn select_groups(scored: &[(usize, MatchScore)]) -> Vec<(usize, MatchType)> {
    let accepted: Vec<(usize, u8)> = scored
        .iter()
        .filter(|(_, s)| s.is_acceptable())
        .map(|(idx, s)| (*idx, s.total()))
        .collect();

    let Some(top) = accepted.iter().map(|(_, total)| *total).max() else {
        return Vec::new();
    };
    let tied: Vec<usize> = accepted
        .iter()
        .filter(|(_, total)| *total == top)
        .map(|(idx, _)| *idx)
        .collect();

    match tied.as_slice() {
        [only] => vec![(*only, MatchType::Heuristic)],
        [first, ..] if top >= DECISIVE_SCORE => vec![(*first, MatchType::Heuristic)],
        _ => tied.into_iter().map(|idx| (idx, MatchType::Tie)).collect(),
    }
}

/// Assign each candidate to its best groups. Assignments are appended to
/// `assignments`, so a group can collect several documents.
pub fn match_heuristic(
    candidates: &[DocumentCandidate],
    groups: &[Group],
    assignments: &mut HashMap<GroupKey, MatchInfo>,
) -> Vec<usize> {
    let mut unmatched = Vec::new();

    for (doc_idx, candidate) in candidates.iter().enumerate() {
        let components = extract_components(candidate.stem());
        let scored: Vec<(usize, MatchScore)> = groups
            .iter()
            .enumerate()
            .map(|(idx, group)| (idx, score(&components, &group.course.components)))
            .collect();

        let selected = select_groups(&scored);
        if selected.is_empty() {
            log::debug!("No group matches document '{}'", candidate.name);
            unmatched.push(doc_idx);
            continue;
        }

        for (group_idx, match_type) in selected {
            let total = scored[group_idx].1.total();
            log::debug!(
                "{} '{}' -> {} (score {})",
                match_type.label(),
                candidate.name,
                groups[group_idx].key,
                total
            );
            assignments
                .entry(groups[group_idx].key.clone())
                .or_default()
                .add(doc_idx, match_type, Some(total));
        }
    }

    unmatched
}
