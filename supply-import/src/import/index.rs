//! Snapshot of existing backend schools
//!
//! Taken once when a job starts and extended as the job creates or discovers
//! schools. Lookups go by RBD code first, then by normalized name.

use std::collections::HashMap;

use super::normalize::normalize_name;
use crate::api::School;

#[derive(Debug, Clone, Default)]
pub struct SchoolIndex {
    by_code: HashMap<u64, School>,
    by_name: HashMap<String, School>,
}

impl SchoolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_schools(schools: impl IntoIterator<Item = School>) -> Self {
        let mut index = Self::new();
        for school in schools {
            index.insert(school);
        }
        index
    }

    /// Add a school. Earlier entries win on name collisions; a code always
    /// points at the latest record seen for it.
    pub fn insert(&mut self, school: School) {
        if let Some(code) = school.code {
            self.by_code.insert(code, school.clone());
        }
        self.by_name
            .entry(normalize_name(&school.name))
            .or_insert(school);
    }

    pub fn by_code(&self, code: u64) -> Option<&School> {
        self.by_code.get(&code)
    }

    pub fn by_name(&self, name: &str) -> Option<&School> {
        self.by_name.get(&normalize_name(name))
    }

    /// Code match first, then name match
    pub fn find(&self, code: Option<u64>, name: Option<&str>) -> Option<&School> {
        code.and_then(|c| self.by_code(c))
            .or_else(|| name.and_then(|n| self.by_name(n)))
    }

    pub fn len(&self) -> usize {
        self.by_name.len().max(self.by_code.len())
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty() && self.by_code.is_empty()
    }
}
