//! Run-scoped resolution state
//!
//! One `ImportSession` per job. It owns the school snapshot and the caches
//! that keep a job from creating the same school or course twice; nothing in
//! here is shared between jobs.

use log::info;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::index::SchoolIndex;
use super::normalize::{CourseComponents, normalize_name};
use crate::api::resilience::with_timeout;
use crate::api::{ContentStore, Level, School, StoreError, TimeoutConfig};

/// Identity of a course within one school
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseKey {
    pub school_id: String,
    pub name: String,
    pub level: Option<Level>,
    pub grade: Option<u8>,
    pub year: Option<u16>,
}

impl CourseKey {
    pub fn new(school_id: &str, name: &str, components: &CourseComponents) -> Self {
        Self {
            school_id: school_id.to_string(),
            name: normalize_name(name),
            level: components.level,
            grade: components.grade,
            year: components.year,
        }
    }
}

#[derive(Debug)]
pub struct ImportSession {
    pub id: Uuid,
    index: SchoolIndex,
    schools: HashMap<String, String>,
    created_schools: HashSet<String>,
    courses: HashMap<CourseKey, String>,
    course_locks: HashMap<String, Arc<Mutex<()>>>,
}

impl ImportSession {
    pub fn new(index: SchoolIndex) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            schools: HashMap::new(),
            created_schools: HashSet::new(),
            courses: HashMap::new(),
            course_locks: HashMap::new(),
        }
    }

    /// Open a session with a fresh snapshot of the backend's schools
    pub async fn start(
        store: &dyn ContentStore,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, StoreError> {
        let schools = with_timeout(timeouts.read, "list schools", store.list_schools()).await?;
        let session = Self::new(SchoolIndex::from_schools(schools));
        info!(
            "Import session {} started with {} known schools",
            session.id,
            session.index.len()
        );
        Ok(session)
    }

    pub fn index(&self) -> &SchoolIndex {
        &self.index
    }

    pub fn cached_school(&self, identifier: &str) -> Option<&str> {
        self.schools.get(identifier).map(String::as_str)
    }

    /// Remember a resolved school under the group's school identifier
    pub fn remember_school(&mut self, identifier: &str, school: School, created: bool) -> String {
        let id = school.id.clone();
        if created {
            self.created_schools.insert(id.clone());
        }
        self.index.insert(school);
        self.schools.insert(identifier.to_string(), id.clone());
        id
    }

    /// Whether this job created the school, so it cannot have courses yet
    pub fn created_school(&self, school_id: &str) -> bool {
        self.created_schools.contains(school_id)
    }

    pub fn cached_course(&self, key: &CourseKey) -> Option<&str> {
        self.courses.get(key).map(String::as_str)
    }

    pub fn remember_course(&mut self, key: CourseKey, course_id: &str) {
        self.courses.insert(key, course_id.to_string());
    }

    /// Lock serializing read-modify-write of one course's versions
    pub fn course_lock(&mut self, course_id: &str) -> Arc<Mutex<()>> {
        self.course_locks
            .entry(course_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn course_count(&self) -> usize {
        self.courses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryStore;
    use crate::import::normalize::extract_components;

    #[tokio::test]
    async fn test_start_loads_school_snapshot() {
        let store = MemoryStore::new().with_schools(vec![School {
            id: "s1".into(),
            code: Some(12345),
            name: "Colegio Andino".into(),
            commune: Some("Ñuñoa".into()),
        }]);

        let session = ImportSession::start(&store, &TimeoutConfig::default())
            .await
            .unwrap();

        assert_eq!(session.index().by_code(12345).map(|s| s.id.as_str()), Some("s1"));
    }

    #[tokio::test]
    async fn test_start_fails_when_store_unreachable() {
        let store = MemoryStore::new().unreachable();

        let err = ImportSession::start(&store, &TimeoutConfig::default())
            .await
            .unwrap_err();

        assert!(err.is_fatal_config());
    }

    #[test]
    fn test_course_key_folds_name_spelling() {
        let a = CourseKey::new("s1", "1º  Básico", &extract_components("1º Básico"));
        let b = CourseKey::new("s1", "1º básico", &extract_components("1 BASICO"));

        assert_eq!(a, b);
    }

    #[test]
    fn test_course_lock_is_shared_per_course() {
        let mut session = ImportSession::new(SchoolIndex::new());

        let first = session.course_lock("c1");
        let second = session.course_lock("c1");
        let other = session.course_lock("c2");

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }
}
