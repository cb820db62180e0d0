//! Wire models for the content storage API
//!
//! Schools, courses and the append-only list versions attached to a course.
//! Field names follow the backend's camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Education level of a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Educación básica (grades 1-8)
    #[serde(alias = "basico", alias = "básico")]
    Basic,
    /// Educación media (grades 1-4 of secondary)
    #[serde(alias = "medio")]
    Secondary,
}

impl Level {
    /// Label used when writing course names back to the backend
    pub fn label(&self) -> &'static str {
        match self {
            Level::Basic => "Básico",
            Level::Secondary => "Medio",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A school as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: String,
    /// RBD code, unique when present
    #[serde(default)]
    pub code: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub commune: Option<String>,
}

/// Fields needed to create a school
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSchool {
    pub code: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commune: Option<String>,
}

/// A course with its full version history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub school_id: String,
    pub name: String,
    #[serde(default)]
    pub level: Option<Level>,
    #[serde(default)]
    pub grade: Option<u8>,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub versions: Vec<ListVersion>,
}

/// Fields needed to create a course under a school
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// Reference to an uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub url: String,
}

/// One line of a supply list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// Immutable snapshot of a supply list attached to a course
///
/// Versions are only ever appended; an existing version is never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVersion {
    pub ordinal: u32,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentRef>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_deserializes_without_versions() {
        let json = r#"{"id":"c1","schoolId":"s1","name":"1° Básico","level":"basic","grade":1}"#;
        let course: Course = serde_json::from_str(json).unwrap();

        assert_eq!(course.level, Some(Level::Basic));
        assert_eq!(course.grade, Some(1));
        assert!(course.versions.is_empty());
    }

    #[test]
    fn test_level_accepts_spanish_aliases() {
        let level: Level = serde_json::from_str(r#""medio""#).unwrap();
        assert_eq!(level, Level::Secondary);
    }

    #[test]
    fn test_line_item_skips_empty_fields() {
        let item = LineItem {
            name: "Cuaderno".to_string(),
            quantity: Some(2),
            ..Default::default()
        };
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["quantity"], 2);
        assert!(json.get("isbn").is_none());
    }
}
