//! School and course resolution
//!
//! Find-or-create against the store, consulting the session caches first so a
//! job never creates the same entity twice. Lookups and creations are not
//! retried; each call only carries the read timeout.

use log::{debug, info, warn};

use super::error::{ImportError, ImportStage};
use super::group::{CourseRef, SchoolRef};
use super::normalize::normalize_name;
use super::session::{CourseKey, ImportSession};
use crate::api::resilience::with_timeout;
use crate::api::{ContentStore, Course, NewCourse, NewSchool, School, StoreError, TimeoutConfig};

pub struct Resolver<'a> {
    store: &'a dyn ContentStore,
    timeouts: &'a TimeoutConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn ContentStore, timeouts: &'a TimeoutConfig) -> Self {
        Self { store, timeouts }
    }

    /// Resolve a school to its backend id: session cache, snapshot by code,
    /// snapshot by name, point lookup by code (or by name when the row has no
    /// code), then creation.
    pub async fn resolve_or_create_school(
        &self,
        session: &mut ImportSession,
        school: &SchoolRef,
    ) -> Result<String, ImportError> {
        let identifier = school.identifier();
        if let Some(id) = session.cached_school(&identifier) {
            return Ok(id.to_string());
        }

        if let Some(existing) = session
            .index()
            .find(school.code, school.name.as_deref())
            .cloned()
        {
            debug!("School {} found in snapshot as {}", school.label(), existing.id);
            return Ok(session.remember_school(&identifier, existing, false));
        }

        let Some(code) = school.code else {
            if let Some(name) = school.name.as_deref() {
                if let Some(existing) = self.find_by_name(name).await? {
                    debug!("School '{}' appeared since the snapshot", name);
                    return Ok(session.remember_school(&identifier, existing, false));
                }
            }
            return Err(ImportError::Resolution {
                stage: ImportStage::School,
                message: format!(
                    "{} does not exist and cannot be created without an RBD code",
                    school.label()
                ),
            });
        };

        if let Some(existing) = self.find_by_code(code).await? {
            debug!("School RBD {} appeared since the snapshot", code);
            return Ok(session.remember_school(&identifier, existing, false));
        }

        let new_school = NewSchool {
            code,
            name: school.name.clone().unwrap_or_else(|| format!("RBD {}", code)),
            commune: school.commune.clone(),
        };
        let created = with_timeout(
            self.timeouts.read,
            "create school",
            self.store.create_school(&new_school),
        )
        .await;

        match created {
            Ok(id) => {
                info!("Created school {} ({})", new_school.name, id);
                let record = School {
                    id,
                    code: Some(code),
                    name: new_school.name,
                    commune: new_school.commune,
                };
                Ok(session.remember_school(&identifier, record, true))
            }
            Err(StoreError::DuplicateCode { .. }) => {
                warn!("School RBD {} was created concurrently, re-reading it", code);
                match self.find_by_code(code).await? {
                    Some(existing) => Ok(session.remember_school(&identifier, existing, false)),
                    None => Err(ImportError::Resolution {
                        stage: ImportStage::School,
                        message: format!(
                            "RBD {} is reported as taken but cannot be found",
                            code
                        ),
                    }),
                }
            }
            Err(e) => Err(ImportError::resolution(ImportStage::School, e)),
        }
    }

    /// Resolve a course within a school: session cache, the school's existing
    /// courses, then creation. The same key is created at most once per job.
    pub async fn resolve_or_create_course(
        &self,
        session: &mut ImportSession,
        school_id: &str,
        course: &CourseRef,
    ) -> Result<String, ImportError> {
        let key = CourseKey::new(school_id, &course.name, &course.components);
        if let Some(id) = session.cached_course(&key) {
            return Ok(id.to_string());
        }

        if !session.created_school(school_id) {
            let existing = with_timeout(
                self.timeouts.read,
                "list courses",
                self.store.list_courses(school_id),
            )
            .await
            .map_err(|e| ImportError::resolution(ImportStage::Course, e))?;

            if let Some(found) = existing.iter().find(|c| matches_key(c, &key)) {
                debug!("Reusing course {} ({})", found.name, found.id);
                session.remember_course(key, &found.id);
                return Ok(found.id.clone());
            }
        }

        let new_course = NewCourse {
            name: course.name.clone(),
            level: course.components.level,
            grade: course.components.grade,
            year: course.components.year,
            order: Some(course.order),
        };
        let id = with_timeout(
            self.timeouts.read,
            "create course",
            self.store.create_course(school_id, &new_course),
        )
        .await
        .map_err(|e| ImportError::resolution(ImportStage::Course, e))?;

        info!("Created course {} ({})", course.name, id);
        session.remember_course(key, &id);
        Ok(id)
    }

    async fn find_by_code(&self, code: u64) -> Result<Option<School>, ImportError> {
        with_timeout(
            self.timeouts.read,
            "find school",
            self.store.find_school_by_code(code),
        )
        .await
        .map_err(|e| ImportError::resolution(ImportStage::School, e))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<School>, ImportError> {
        with_timeout(
            self.timeouts.read,
            "find school",
            self.store.find_school_by_name(name),
        )
        .await
        .map_err(|e| ImportError::resolution(ImportStage::School, e))
    }
}

/// Backend fields left empty do not rule a course out
fn matches_key(course: &Course, key: &CourseKey) -> bool {
    normalize_name(&course.name) == key.name
        && course.level.is_none_or(|l| Some(l) == key.level)
        && course.grade.is_none_or(|g| Some(g) == key.grade)
        && course.year.is_none_or(|y| Some(y) == key.year)
}
