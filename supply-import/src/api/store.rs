//! The content storage collaborator
//!
//! The import pipeline only talks to the backend through this trait, so the
//! HTTP client and the in-memory store are interchangeable.

use async_trait::async_trait;

use super::error::StoreError;
use super::models::{Course, DocumentRef, ListVersion, NewCourse, NewSchool, School};

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Snapshot of every school known to the backend
    async fn list_schools(&self) -> Result<Vec<School>, StoreError>;

    async fn find_school_by_code(&self, code: u64) -> Result<Option<School>, StoreError>;

    async fn find_school_by_name(&self, name: &str) -> Result<Option<School>, StoreError>;

    /// Create a school, returning its id. Fails with `DuplicateCode` when the
    /// RBD code is already taken.
    async fn create_school(&self, school: &NewSchool) -> Result<String, StoreError>;

    async fn list_courses(&self, school_id: &str) -> Result<Vec<Course>, StoreError>;

    async fn create_course(&self, school_id: &str, course: &NewCourse)
    -> Result<String, StoreError>;

    /// Read a course by id. A course created moments ago may still be `None`.
    async fn get_course(&self, id: &str) -> Result<Option<Course>, StoreError>;

    /// Replace the stored version list of a course
    async fn update_course_versions(
        &self,
        id: &str,
        versions: &[ListVersion],
    ) -> Result<(), StoreError>;

    async fn upload_file(&self, bytes: &[u8], name: &str) -> Result<DocumentRef, StoreError>;
}
