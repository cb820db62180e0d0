//! In-memory content store
//!
//! Backs `--dry-run` imports and the pipeline tests. Besides plain storage it
//! counts calls and can inject the failure modes the real backend exhibits:
//! freshly created courses that stay invisible for a few reads, transient read
//! and write failures, and a concurrent process winning a school creation race.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::error::StoreError;
use super::models::{Course, DocumentRef, ListVersion, NewCourse, NewSchool, School};
use super::store::ContentStore;
use crate::import::normalize::normalize_name;

/// Number of calls made against the store, by kind
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallCounts {
    pub school_lookups: u32,
    pub school_creates: u32,
    pub course_lists: u32,
    pub course_creates: u32,
    pub course_reads: u32,
    pub version_writes: u32,
    pub uploads: u32,
}

#[derive(Debug, Default)]
struct MemoryState {
    schools: Vec<School>,
    courses: Vec<Course>,
    uploads: Vec<DocumentRef>,
    calls: CallCounts,
    hide_new_courses_for: u32,
    invisible: HashMap<String, u32>,
    reads_before_failures: u32,
    failing_reads: u32,
    read_fault: Option<StoreError>,
    failing_writes: u32,
    write_fault: Option<StoreError>,
    racing_schools: HashMap<u64, School>,
    unreachable: bool,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed existing schools
    pub fn with_schools(self, schools: Vec<School>) -> Self {
        self.state().schools.extend(schools);
        self
    }

    /// Seed an existing course
    pub fn with_course(self, course: Course) -> Self {
        self.state().courses.push(course);
        self
    }

    /// Newly created courses answer `None` to the next `reads` lookups by id
    pub fn hide_new_courses_for(self, reads: u32) -> Self {
        self.state().hide_new_courses_for = reads;
        self
    }

    /// The next `count` course reads fail with a timeout
    pub fn fail_next_course_reads(self, count: u32) -> Self {
        self.fail_course_reads_after(0, count)
    }

    /// Let `successes` course reads through, then time out the next `count`
    pub fn fail_course_reads_after(self, successes: u32, count: u32) -> Self {
        {
            let mut state = self.state();
            state.reads_before_failures = successes;
            state.failing_reads = count;
        }
        self
    }

    /// The next `count` course reads are refused at the connection level
    pub fn refuse_next_course_reads(self, count: u32) -> Self {
        {
            let mut state = self.state();
            state.failing_reads = count;
            state.read_fault = Some(connection_refused());
        }
        self
    }

    /// The next `count` version writes fail with a server error
    pub fn fail_next_version_writes(self, count: u32) -> Self {
        self.state().failing_writes = count;
        self
    }

    /// The next `count` version writes are refused at the connection level
    pub fn refuse_next_version_writes(self, count: u32) -> Self {
        {
            let mut state = self.state();
            state.failing_writes = count;
            state.write_fault = Some(connection_refused());
        }
        self
    }

    /// Simulate another process creating `school` right before we do: the
    /// first creation attempt for its code fails with `DuplicateCode` and the
    /// school becomes visible.
    pub fn race_school_creation(self, school: School) -> Self {
        if let Some(code) = school.code {
            self.state().racing_schools.insert(code, school);
        }
        self
    }

    /// Every call fails as if the backend could not be reached
    pub fn unreachable(self) -> Self {
        self.state().unreachable = true;
        self
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls.clone()
    }

    pub fn schools(&self) -> Vec<School> {
        self.state().schools.clone()
    }

    /// Read a course bypassing visibility delays and fault injection
    pub fn course(&self, id: &str) -> Option<Course> {
        self.state().courses.iter().find(|c| c.id == id).cloned()
    }

    pub fn courses(&self) -> Vec<Course> {
        self.state().courses.clone()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_reachable(state: &MemoryState) -> Result<(), StoreError> {
        if state.unreachable {
            return Err(connection_refused());
        }
        Ok(())
    }
}

fn connection_refused() -> StoreError {
    StoreError::Unreachable {
        message: "connection refused".to_string(),
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn list_schools(&self) -> Result<Vec<School>, StoreError> {
        let state = self.state();
        Self::check_reachable(&state)?;
        Ok(state.schools.clone())
    }

    async fn find_school_by_code(&self, code: u64) -> Result<Option<School>, StoreError> {
        let mut state = self.state();
        Self::check_reachable(&state)?;
        state.calls.school_lookups += 1;
        Ok(state.schools.iter().find(|s| s.code == Some(code)).cloned())
    }

    async fn find_school_by_name(&self, name: &str) -> Result<Option<School>, StoreError> {
        let mut state = self.state();
        Self::check_reachable(&state)?;
        state.calls.school_lookups += 1;
        let wanted = normalize_name(name);
        Ok(state
            .schools
            .iter()
            .find(|s| normalize_name(&s.name) == wanted)
            .cloned())
    }

    async fn create_school(&self, school: &NewSchool) -> Result<String, StoreError> {
        let mut state = self.state();
        Self::check_reachable(&state)?;
        state.calls.school_creates += 1;

        if let Some(winner) = state.racing_schools.remove(&school.code) {
            state.schools.push(winner);
            return Err(StoreError::DuplicateCode { code: school.code });
        }
        if state.schools.iter().any(|s| s.code == Some(school.code)) {
            return Err(StoreError::DuplicateCode { code: school.code });
        }

        let id = Uuid::new_v4().to_string();
        state.schools.push(School {
            id: id.clone(),
            code: Some(school.code),
            name: school.name.clone(),
            commune: school.commune.clone(),
        });
        Ok(id)
    }

    async fn list_courses(&self, school_id: &str) -> Result<Vec<Course>, StoreError> {
        let mut state = self.state();
        Self::check_reachable(&state)?;
        state.calls.course_lists += 1;
        Ok(state
            .courses
            .iter()
            .filter(|c| c.school_id == school_id && !state.invisible.contains_key(&c.id))
            .cloned()
            .collect())
    }

    async fn create_course(
        &self,
        school_id: &str,
        course: &NewCourse,
    ) -> Result<String, StoreError> {
        let mut state = self.state();
        Self::check_reachable(&state)?;
        state.calls.course_creates += 1;

        let id = Uuid::new_v4().to_string();
        state.courses.push(Course {
            id: id.clone(),
            school_id: school_id.to_string(),
            name: course.name.clone(),
            level: course.level,
            grade: course.grade,
            year: course.year,
            order: course.order,
            versions: Vec::new(),
        });
        if state.hide_new_courses_for > 0 {
            let reads = state.hide_new_courses_for;
            state.invisible.insert(id.clone(), reads);
        }
        Ok(id)
    }

    async fn get_course(&self, id: &str) -> Result<Option<Course>, StoreError> {
        let mut state = self.state();
        Self::check_reachable(&state)?;
        state.calls.course_reads += 1;

        if state.failing_reads > 0 {
            if state.reads_before_failures > 0 {
                state.reads_before_failures -= 1;
            } else {
                state.failing_reads -= 1;
                return Err(state.read_fault.clone().unwrap_or_else(|| StoreError::Timeout {
                    operation: format!("get course {}", id),
                }));
            }
        }
        if let Some(remaining) = state.invisible.get_mut(id) {
            *remaining -= 1;
            if *remaining == 0 {
                state.invisible.remove(id);
            }
            return Ok(None);
        }
        Ok(state.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn update_course_versions(
        &self,
        id: &str,
        versions: &[ListVersion],
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        Self::check_reachable(&state)?;
        state.calls.version_writes += 1;

        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(state.write_fault.clone().unwrap_or_else(|| StoreError::Server {
                status: 503,
                message: "service unavailable".to_string(),
            }));
        }
        match state.courses.iter_mut().find(|c| c.id == id) {
            Some(course) => {
                course.versions = versions.to_vec();
                Ok(())
            }
            None => Err(StoreError::not_found(format!("course {}", id))),
        }
    }

    async fn upload_file(&self, bytes: &[u8], name: &str) -> Result<DocumentRef, StoreError> {
        let mut state = self.state();
        Self::check_reachable(&state)?;
        state.calls.uploads += 1;

        let id = Uuid::new_v4().to_string();
        let doc = DocumentRef {
            url: format!("memory://files/{}/{}?size={}", id, name, bytes.len()),
            id,
        };
        state.uploads.push(doc.clone());
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_course(name: &str) -> NewCourse {
        NewCourse {
            name: name.to_string(),
            level: None,
            grade: None,
            year: None,
            order: None,
        }
    }

    #[tokio::test]
    async fn test_hidden_course_becomes_visible() {
        let store = MemoryStore::new().hide_new_courses_for(2);
        let id = store.create_course("s1", &new_course("1° Básico")).await.unwrap();

        assert_eq!(store.get_course(&id).await.unwrap(), None);
        assert_eq!(store.get_course(&id).await.unwrap(), None);
        assert!(store.get_course(&id).await.unwrap().is_some());
        assert_eq!(store.calls().course_reads, 3);
    }

    #[tokio::test]
    async fn test_duplicate_code_is_rejected() {
        let store = MemoryStore::new();
        let school = NewSchool {
            code: 12345,
            name: "Colegio Los Andes".to_string(),
            commune: None,
        };

        store.create_school(&school).await.unwrap();
        let err = store.create_school(&school).await.unwrap_err();

        assert_eq!(err, StoreError::DuplicateCode { code: 12345 });
    }

    #[tokio::test]
    async fn test_race_makes_school_visible() {
        let winner = School {
            id: "other".to_string(),
            code: Some(999),
            name: "Colegio Rival".to_string(),
            commune: None,
        };
        let store = MemoryStore::new().race_school_creation(winner.clone());
        let err = store
            .create_school(&NewSchool {
                code: 999,
                name: "Colegio Rival".to_string(),
                commune: None,
            })
            .await
            .unwrap_err();

        assert!(err.is_duplicate());
        assert_eq!(store.find_school_by_code(999).await.unwrap(), Some(winner));
    }

    #[tokio::test]
    async fn test_find_school_by_name_ignores_accents() {
        let store = MemoryStore::new().with_schools(vec![School {
            id: "s1".to_string(),
            code: None,
            name: "Liceo Bicentenario Valparaíso".to_string(),
            commune: None,
        }]);

        let found = store
            .find_school_by_name("liceo  bicentenario valparaiso")
            .await
            .unwrap();
        assert_eq!(found.map(|s| s.id), Some("s1".to_string()));
    }
}
