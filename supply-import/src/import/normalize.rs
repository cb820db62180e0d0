//! Course label normalization
//!
//! Turns free-text course labels ("1º Básico", "Primero Basico",
//! "Lista 2026 - 5to Básico", "III Medio") into comparable components:
//! grade, level, year and a fully stripped text used for containment checks.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::api::Level;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_./,;:()\[\]]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static ORDINAL_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(primer[oa]?|segund[oa]|tercer[oa]?|cuart[oa]|quint[oa]|sext[oa]|(?:septim|setim)[oa]|octav[oa]|noven[oa]|decim[oa])\b",
    )
    .unwrap()
});
static DEGREE_MARKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*[°ºª]").unwrap());
static STRAY_MARKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[°ºª]").unwrap());
static ORDINAL_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d+)(?:ero|era|ro|ra|do|da|to|ta|mo|ma|vo|va|no|na|er|o|a)\b").unwrap()
});
static BASIC_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:basic[oa]s?|bas|primari[oa]s?|elementa(?:l|les))\b").unwrap()
});
static SECONDARY_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:medi[oa]s?|med|secundari[oa]s?)\b").unwrap());
static ROMAN_GRADE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(iv|i{1,3}|vi{0,3})\s+(basico|medio)\b").unwrap());
static DIGIT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static LEVEL_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(basico|medio)\b").unwrap());
static ATTACHED_BASIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+[a-z]*basic").unwrap());
static ATTACHED_SECONDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+[a-z]*medi").unwrap());

const BASIC_TOKEN: &str = "basico";
const SECONDARY_TOKEN: &str = "medio";

/// How the grade of a course was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GradeConfidence {
    /// Given in a dedicated spreadsheet column
    Declared,
    /// Exactly one grade-like number in the label
    Inferred,
    /// Several grade-like numbers; the first one was taken
    Ambiguous,
    /// No grade could be found
    #[default]
    Missing,
}

/// Comparable components of a course label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseComponents {
    /// 1-12 when present
    pub grade: Option<u8>,
    pub level: Option<Level>,
    /// Four-digit year in 2000-2100 when present
    pub year: Option<u16>,
    /// Letters and digits only, no spaces
    pub normalized_text: String,
    pub confidence: GradeConfidence,
}

impl CourseComponents {
    /// Override extracted values with values from dedicated columns
    pub fn with_declared(mut self, grade: Option<u8>, level: Option<Level>, year: Option<u16>) -> Self {
        if let Some(grade) = grade.filter(|g| (1..=12).contains(g)) {
            self.grade = Some(grade);
            self.confidence = GradeConfidence::Declared;
        }
        if level.is_some() {
            self.level = level;
        }
        if let Some(year) = year.filter(|y| (2000..=2100).contains(y)) {
            self.year = Some(year);
        }
        self
    }

    pub fn is_ambiguous(&self) -> bool {
        self.confidence == GradeConfidence::Ambiguous
    }
}

/// Lowercase, strip accents and collapse whitespace. Used as the comparison
/// key for school, course, subject and list names.
pub fn normalize_name(text: &str) -> String {
    let folded = strip_accents(&text.to_lowercase());
    WHITESPACE.replace_all(folded.trim(), " ").into_owned()
}

/// Remove combining marks after canonical decomposition
pub fn strip_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Canonical form of a course label: lowercase, unaccented, ordinals as
/// digits, level words folded to `basico` / `medio`
pub fn canonicalize(text: &str) -> String {
    let text = strip_accents(&text.to_lowercase());
    let text = PUNCTUATION.replace_all(&text, " ");
    let text = WHITESPACE.replace_all(text.trim(), " ");

    // Ordinal words go first: once degree marks are stripped, a trailing
    // "o" is no longer distinguishable from a mark.
    let text = ORDINAL_WORDS.replace_all(&text, |caps: &Captures| ordinal_value(&caps[1]).to_string());
    let text = DEGREE_MARKS.replace_all(&text, "${1} ");
    let text = STRAY_MARKS.replace_all(&text, " ");
    let text = ORDINAL_SUFFIX.replace_all(&text, "${1}");

    let text = BASIC_WORDS.replace_all(&text, BASIC_TOKEN);
    let text = SECONDARY_WORDS.replace_all(&text, SECONDARY_TOKEN);
    let text = ROMAN_GRADE.replace_all(&text, |caps: &Captures| {
        format!("{} {}", roman_value(&caps[1]), &caps[2])
    });

    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn ordinal_value(word: &str) -> u8 {
    match &word[..3] {
        "pri" => 1,
        "seg" => 2,
        "ter" => 3,
        "cua" => 4,
        "qui" => 5,
        "sex" => 6,
        "sep" | "set" => 7,
        "oct" => 8,
        "nov" => 9,
        _ => 10,
    }
}

fn roman_value(numeral: &str) -> u8 {
    match numeral {
        "i" => 1,
        "ii" => 2,
        "iii" => 3,
        "iv" => 4,
        "v" => 5,
        "vi" => 6,
        "vii" => 7,
        _ => 8,
    }
}

/// Extract grade, level and year from a free-text course label
pub fn extract_components(text: &str) -> CourseComponents {
    let canonical = canonicalize(text);

    let runs: Vec<&str> = DIGIT_RUNS.find_iter(&canonical).map(|m| m.as_str()).collect();

    let year_idx = runs.iter().position(|run| {
        run.len() == 4
            && run
                .parse::<u16>()
                .map(|y| (2000..=2100).contains(&y))
                .unwrap_or(false)
    });
    let year = year_idx.and_then(|idx| runs[idx].parse::<u16>().ok());

    let remaining: Vec<&str> = runs
        .iter()
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != year_idx)
        .map(|(_, run)| *run)
        .collect();

    let candidates: Vec<u8> = remaining
        .iter()
        .filter(|run| run.len() <= 2)
        .filter_map(|run| run.parse::<u8>().ok())
        .filter(|n| (1..=12).contains(n))
        .collect();

    let (grade, confidence) = match candidates.as_slice() {
        [] => {
            // Fall back to the first remaining run, e.g. a zero-padded "007"
            let fallback = remaining
                .first()
                .and_then(|run| run.parse::<u64>().ok())
                .filter(|n| (1..=12).contains(n))
                .map(|n| n as u8);
            match fallback {
                Some(grade) => (Some(grade), GradeConfidence::Inferred),
                None => (None, GradeConfidence::Missing),
            }
        }
        [only] => (Some(*only), GradeConfidence::Inferred),
        [first, ..] => (Some(*first), GradeConfidence::Ambiguous),
    };

    CourseComponents {
        grade,
        level: detect_level(&canonical),
        year,
        normalized_text: canonical.chars().filter(|c| c.is_alphanumeric()).collect(),
        confidence,
    }
}

/// Level of an already canonicalized label
fn detect_level(canonical: &str) -> Option<Level> {
    if let Some(found) = LEVEL_TOKEN.captures(canonical) {
        return match &found[1] {
            BASIC_TOKEN => Some(Level::Basic),
            _ => Some(Level::Secondary),
        };
    }

    let basic = ATTACHED_BASIC.find(canonical).map(|m| m.start());
    let secondary = ATTACHED_SECONDARY.find(canonical).map(|m| m.start());
    match (basic, secondary) {
        (Some(b), Some(s)) if s < b => Some(Level::Secondary),
        (Some(_), _) => Some(Level::Basic),
        (None, Some(_)) => Some(Level::Secondary),
        (None, None) => None,
    }
}

/// Parse a level given in a dedicated column ("Básico", "media", "EM", ...)
pub fn parse_level(text: &str) -> Option<Level> {
    let canonical = canonicalize(text);
    match canonical.as_str() {
        "b" | "eb" | "ensenanza basico" => return Some(Level::Basic),
        "m" | "em" | "ensenanza medio" => return Some(Level::Secondary),
        _ => {}
    }
    detect_level(&canonical)
}
