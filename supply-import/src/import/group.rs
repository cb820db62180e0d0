//! Folding flat rows into import groups
//!
//! A group is one (school, course, subject, list) combination. Rows sharing a
//! group key contribute line items to the same group and backfill list-level
//! data the earlier rows did not carry.

use log::debug;
use std::collections::HashMap;

use super::error::ImportError;
use super::index::SchoolIndex;
use super::normalize::{CourseComponents, extract_components, normalize_name, parse_level};
use super::row::Row;
use crate::api::LineItem;

/// Composite key identifying a group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    /// RBD code, or the normalized school name when no code was given
    pub school: String,
    pub course: String,
    pub subject: String,
    pub list: String,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} / {}", self.school, self.course, self.subject)?;
        if !self.list.is_empty() {
            write!(f, " / {}", self.list)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchoolRef {
    pub code: Option<u64>,
    pub name: Option<String>,
    pub commune: Option<String>,
    pub order: i64,
    /// Whether the school was found in the job's school snapshot. Display
    /// only; binding resolution happens in the resolver.
    pub exists: Option<bool>,
}

impl SchoolRef {
    pub fn identifier(&self) -> String {
        match (self.code, &self.name) {
            (Some(code), _) => code.to_string(),
            (None, Some(name)) => normalize_name(name),
            (None, None) => String::new(),
        }
    }

    pub fn label(&self) -> String {
        match (self.code, &self.name) {
            (Some(code), Some(name)) => format!("{} (RBD {})", name, code),
            (Some(code), None) => format!("RBD {}", code),
            (None, Some(name)) => name.clone(),
            (None, None) => "unknown school".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseRef {
    pub name: String,
    pub components: CourseComponents,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectRef {
    pub name: String,
    pub order: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRef {
    pub name: Option<String>,
    pub year: Option<u16>,
    pub updated_at: Option<String>,
    pub published_at: Option<String>,
    pub source_urls: Vec<String>,
    pub order: i64,
}

/// The unit of import
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: GroupKey,
    pub school: SchoolRef,
    pub course: CourseRef,
    pub subject: SubjectRef,
    pub list: ListRef,
    /// Sorted by declared order; undeclared orders last, input order kept
    pub items: Vec<LineItem>,
    /// Source lines that contributed to this group
    pub lines: Vec<usize>,
}

impl Group {
    /// Processing order: school, course, subject, list
    pub fn sort_key(&self) -> (i64, i64, i64, i64) {
        (
            self.school.order,
            self.course.order,
            self.subject.order,
            self.list.order,
        )
    }

    /// Name used for a version that carries no document
    pub fn version_name(&self) -> String {
        match &self.list.name {
            Some(list) => format!("{} - {} - {}", self.course.name, self.subject.name, list),
            None => format!("{} - {}", self.course.name, self.subject.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub line: usize,
    pub reason: String,
}

/// Groups in order of first appearance, plus the rows that were left out
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    pub groups: Vec<Group>,
    pub skipped: Vec<SkippedRow>,
}

impl Grouping {
    pub fn line_item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }
}

/// Fold rows into groups. Rows missing the minimum fields are skipped, not
/// treated as errors. `index` only feeds the `exists` label of each school.
pub fn group_rows(rows: &[Row], index: Option<&SchoolIndex>) -> Grouping {
    let mut grouping = Grouping::default();
    let mut positions: HashMap<GroupKey, usize> = HashMap::new();

    for row in rows {
        if let Err(ImportError::Validation { line, reason }) = row.validate() {
            debug!("Skipping row {}: {}", line, reason);
            grouping.skipped.push(SkippedRow { line, reason });
            continue;
        }

        let school = school_ref(row, index);
        let (Some(course_name), Some(subject_name), Some(item)) =
            (row.course_name.as_deref(), row.subject_name.as_deref(), line_item(row))
        else {
            continue;
        };

        let key = GroupKey {
            school: school.identifier(),
            course: normalize_name(course_name),
            subject: normalize_name(subject_name),
            list: row.list_name.as_deref().map(normalize_name).unwrap_or_default(),
        };

        match positions.get(&key) {
            Some(&pos) => merge_row(&mut grouping.groups[pos], row, school, item),
            None => {
                positions.insert(key.clone(), grouping.groups.len());
                grouping.groups.push(Group {
                    key,
                    school,
                    course: course_ref(row, course_name),
                    subject: SubjectRef {
                        name: subject_name.to_string(),
                        order: row.subject_order.unwrap_or(0),
                    },
                    list: ListRef {
                        name: row.list_name.clone(),
                        year: row.list_year,
                        updated_at: row.list_updated_at.clone(),
                        published_at: row.list_published_at.clone(),
                        source_urls: row.source_urls.clone(),
                        order: row.list_order.unwrap_or(0),
                    },
                    items: vec![item],
                    lines: vec![row.line],
                });
            }
        }
    }

    for group in &mut grouping.groups {
        group
            .items
            .sort_by_key(|item| (item.order.is_none(), item.order.unwrap_or(0)));
    }

    grouping
}

fn school_ref(row: &Row, index: Option<&SchoolIndex>) -> SchoolRef {
    let code = row.numeric_school_code();
    let exists = index.map(|idx| idx.find(code, row.school_name.as_deref()).is_some());
    SchoolRef {
        code,
        name: row.school_name.clone(),
        commune: row.commune.clone(),
        order: row.school_order.unwrap_or(0),
        exists,
    }
}

fn course_ref(row: &Row, name: &str) -> CourseRef {
    let mut components = extract_components(name).with_declared(
        row.grade,
        row.level.as_deref().and_then(parse_level),
        row.course_year,
    );
    if components.year.is_none() {
        components.year = row.list_year.filter(|y| (2000..=2100).contains(y));
    }
    CourseRef {
        name: name.to_string(),
        components,
        order: row.course_order.unwrap_or(0),
    }
}

fn line_item(row: &Row) -> Option<LineItem> {
    Some(LineItem {
        name: row.item_name.clone()?,
        code: row.item_code.clone(),
        isbn: row.isbn.clone(),
        author: row.author.clone(),
        publisher: row.publisher.clone(),
        quantity: row.quantity,
        notes: row.notes.clone(),
        usage_month: row.usage_month.clone(),
        order: row.item_order,
    })
}

/// Append a later row's item; first non-empty value wins for everything else
fn merge_row(group: &mut Group, row: &Row, school: SchoolRef, item: LineItem) {
    group.items.push(item);
    group.lines.push(row.line);

    if group.school.name.is_none() {
        group.school.name = school.name;
    }
    if group.school.commune.is_none() {
        group.school.commune = school.commune;
    }

    let list = &mut group.list;
    if list.source_urls.is_empty() {
        list.source_urls = row.source_urls.clone();
    }
    if list.updated_at.is_none() {
        list.updated_at = row.list_updated_at.clone();
    }
    if list.published_at.is_none() {
        list.published_at = row.list_published_at.clone();
    }
    if list.year.is_none() {
        list.year = row.list_year;
    }
}
