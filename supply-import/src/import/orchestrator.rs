//! Import pipeline driver
//!
//! Works through the groups one at a time in a stable order: resolve the
//! school, resolve the course, upload the group's documents, then append one
//! list version per document under a per-course lock. Every failure is caught
//! at the group boundary; only cancellation and backend-wide failures stop
//! the job early.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use super::cancel::CancellationFlag;
use super::download::{DocumentFetcher, file_name_from_url};
use super::error::{ImportError, ImportStage};
use super::group::{Group, Grouping, SkippedRow};
use super::progress::{LogProgress, ProgressSink, percent};
use super::report::{ImportReport, ImportResult, ResultPayload};
use super::resolver::Resolver;
use super::session::ImportSession;
use crate::api::resilience::with_timeout;
use crate::api::{
    ContentStore, Course, DocumentRef, ListVersion, ResilienceConfig, RetryError, StoreError,
};
use crate::services::matching::{DocumentCandidate, DocumentSource, MatchingResults};

/// A document waiting to be uploaded for a group
#[derive(Debug, Clone, PartialEq)]
pub enum PendingDocument {
    /// Already in memory (manual file or archive entry)
    Ready(DocumentCandidate),
    /// Source URL to download first
    Remote { url: String },
}

impl PendingDocument {
    pub fn name(&self) -> String {
        match self {
            PendingDocument::Ready(candidate) => candidate.name.clone(),
            PendingDocument::Remote { url } => file_name_from_url(url),
        }
    }
}

/// Where a group stands in the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupState {
    Pending,
    Resolved { school_id: String, course_id: String },
    Completed { course_id: String, versions: usize },
    Failed { stage: ImportStage },
}

#[derive(Debug, Clone)]
pub struct WorkItem {
    pub group: Group,
    pub documents: Vec<PendingDocument>,
    pub state: GroupState,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Download a group's source URLs when no document was matched to it
    pub download_source_urls: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            download_source_urls: true,
        }
    }
}

/// Ordered worklist of one job
#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    pub items: Vec<WorkItem>,
    pub skipped_rows: Vec<SkippedRow>,
}

impl ImportPlan {
    /// Attach matched documents (or source URLs) to each group and order the
    /// groups by school, course, subject and list order
    pub fn new(
        grouping: Grouping,
        candidates: &[DocumentCandidate],
        matches: &MatchingResults,
        options: &ImportOptions,
    ) -> Self {
        let mut items: Vec<WorkItem> = grouping
            .groups
            .into_iter()
            .map(|group| {
                let mut documents: Vec<PendingDocument> = matches
                    .documents_for(&group.key)
                    .into_iter()
                    .filter_map(|idx| candidates.get(idx).cloned())
                    .map(PendingDocument::Ready)
                    .collect();
                if documents.is_empty() && options.download_source_urls {
                    documents = group
                        .list
                        .source_urls
                        .iter()
                        .map(|url| PendingDocument::Remote { url: url.clone() })
                        .collect();
                }
                WorkItem {
                    group,
                    documents,
                    state: GroupState::Pending,
                }
            })
            .collect();
        items.sort_by_key(|item| item.group.sort_key());

        Self {
            items,
            skipped_rows: grouping.skipped,
        }
    }

    pub fn document_count(&self) -> usize {
        self.items.iter().map(|item| item.documents.len()).sum()
    }
}

#[derive(Debug, Clone)]
struct UploadedDocument {
    file_name: String,
    document: DocumentRef,
    source_url: Option<String>,
}

pub struct ImportOrchestrator<'a> {
    store: &'a dyn ContentStore,
    fetcher: Option<&'a dyn DocumentFetcher>,
    progress: &'a dyn ProgressSink,
    resilience: ResilienceConfig,
    cancel: CancellationFlag,
}

impl<'a> ImportOrchestrator<'a> {
    pub fn new(store: &'a dyn ContentStore, resilience: ResilienceConfig) -> Self {
        Self {
            store,
            fetcher: None,
            progress: &LogProgress,
            resilience,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: &'a dyn DocumentFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Import every group of the plan. Always returns a report; groups left
    /// out by cancellation have no result.
    pub async fn run(&self, session: &mut ImportSession, plan: &mut ImportPlan) -> ImportReport {
        let total = plan.items.len();
        let mut report = ImportReport {
            total_groups: total,
            skipped_rows: plan.skipped_rows.clone(),
            ..Default::default()
        };
        info!(
            "Import {}: {} groups, {} documents, {} rows skipped",
            session.id,
            total,
            plan.document_count(),
            report.skipped_rows.len()
        );

        for (idx, item) in plan.items.iter_mut().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Import cancelled with {} groups left", total - idx);
                report.cancelled = true;
                break;
            }

            let result = match &report.halted {
                Some(reason) => {
                    item.state = GroupState::Failed {
                        stage: ImportStage::School,
                    };
                    ImportResult::failed(
                        item.group.key.clone(),
                        item.group.lines.clone(),
                        ImportStage::School,
                        format!("not attempted: {}", reason),
                    )
                }
                None => match self.process(session, item).await {
                    Ok(result) => result,
                    Err((stage, error)) => {
                        if error.halts_job() {
                            warn!("Stopping import: {}", error);
                            report.halted = Some(error.to_string());
                        }
                        item.state = GroupState::Failed { stage };
                        ImportResult::failed(
                            item.group.key.clone(),
                            item.group.lines.clone(),
                            stage,
                            error.to_string(),
                        )
                    }
                },
            };

            self.progress.on_group_result(&result);
            report.results.push(result);
            self.progress.on_progress(percent(idx + 1, total));
        }

        info!(
            "Import {} finished: {} succeeded, {} failed",
            session.id,
            report.success_count(),
            report.failure_count()
        );
        report
    }

    async fn process(
        &self,
        session: &mut ImportSession,
        item: &mut WorkItem,
    ) -> Result<ImportResult, (ImportStage, ImportError)> {
        let WorkItem {
            group,
            documents,
            state,
        } = item;
        let resolver = Resolver::new(self.store, &self.resilience.timeouts);

        let school_id = resolver
            .resolve_or_create_school(session, &group.school)
            .await
            .map_err(|e| (ImportStage::School, e))?;
        let course_id = resolver
            .resolve_or_create_course(session, &school_id, &group.course)
            .await
            .map_err(|e| (ImportStage::Course, e))?;
        *state = GroupState::Resolved {
            school_id: school_id.clone(),
            course_id: course_id.clone(),
        };

        let (uploaded, upload_errors) = self.upload_documents(documents).await;
        if let Some(fatal) = upload_errors.iter().find(|e| e.halts_job()) {
            return Err((ImportStage::List, fatal.clone()));
        }

        let lock = session.course_lock(&course_id);
        let _guard = lock.lock().await;

        let current = self
            .fetch_versions(&course_id)
            .await
            .map_err(|e| (ImportStage::List, e))?;
        let course = self
            .verify_course(&course_id)
            .await
            .map_err(|e| (ImportStage::List, e))?;
        if course.id != course_id {
            debug!("Course {} resolves as {}", course_id, course.id);
        }
        if course.versions.len() != current.len() {
            debug!(
                "Course {} changed between reads ({} -> {} versions)",
                course.id,
                current.len(),
                course.versions.len()
            );
        }

        let new_versions = build_versions(group, &course.versions, &uploaded);
        let appended = new_versions.len();
        let mut versions = course.versions.clone();
        versions.extend(new_versions);
        self.persist_versions(&course.id, &versions)
            .await
            .map_err(|e| (ImportStage::List, e))?;

        *state = GroupState::Completed {
            course_id: course.id.clone(),
            versions: appended,
        };
        let message = success_message(group, &course, appended, uploaded.len(), &upload_errors);
        Ok(ImportResult::succeeded(
            group.key.clone(),
            group.lines.clone(),
            message,
            ResultPayload {
                school_id: Some(school_id),
                course_id: Some(course.id),
                versions_appended: appended,
                line_items: group.items.len(),
            },
        ))
    }

    /// Upload a group's documents with bounded concurrency. Results keep the
    /// order of `documents`.
    async fn upload_documents(
        &self,
        documents: &[PendingDocument],
    ) -> (Vec<UploadedDocument>, Vec<ImportError>) {
        let concurrency = self.resilience.concurrency.max_concurrent_uploads.max(1);
        let mut outcomes: Vec<(usize, Result<UploadedDocument, ImportError>)> =
            stream::iter(documents.iter().enumerate())
                .map(|(idx, doc)| async move { (idx, self.upload_one(doc).await) })
                .buffer_unordered(concurrency)
                .collect()
                .await;
        outcomes.sort_by_key(|(idx, _)| *idx);

        let mut uploaded = Vec::new();
        let mut errors = Vec::new();
        for (_, outcome) in outcomes {
            match outcome {
                Ok(doc) => uploaded.push(doc),
                Err(e) => {
                    warn!("{}", e);
                    errors.push(e);
                }
            }
        }
        (uploaded, errors)
    }

    async fn upload_one(&self, doc: &PendingDocument) -> Result<UploadedDocument, ImportError> {
        let limit = self.resilience.timeouts.upload;
        let (name, bytes, source_url): (String, Arc<[u8]>, Option<String>) = match doc {
            PendingDocument::Ready(candidate) => {
                let source_url = match &candidate.source {
                    DocumentSource::Remote { url } => Some(url.clone()),
                    DocumentSource::Manual | DocumentSource::Archive => None,
                };
                (candidate.name.clone(), candidate.bytes.clone(), source_url)
            }
            PendingDocument::Remote { url } => {
                let name = file_name_from_url(url);
                let Some(fetcher) = self.fetcher else {
                    return Err(ImportError::Upload {
                        file_name: name,
                        message: "no downloader available for source URLs".to_string(),
                    });
                };
                let bytes = with_timeout(limit, "download document", fetcher.fetch(url))
                    .await
                    .map_err(|e| ImportError::Upload {
                        file_name: name.clone(),
                        message: format!("download failed: {}", e),
                    })?;
                (name, Arc::from(bytes), Some(url.clone()))
            }
        };

        let document = with_timeout(limit, "upload document", self.store.upload_file(&bytes, &name))
            .await
            .map_err(|e| {
                if e.is_fatal_config() {
                    ImportError::Config {
                        message: e.to_string(),
                    }
                } else {
                    ImportError::Upload {
                        file_name: name.clone(),
                        message: e.to_string(),
                    }
                }
            })?;
        debug!("Uploaded {} as {}", name, document.id);

        Ok(UploadedDocument {
            file_name: name,
            document,
            source_url,
        })
    }

    /// Read-before-append: the course's current versions. "Not found" is
    /// retried since a fresh course may not be readable yet.
    async fn fetch_versions(&self, course_id: &str) -> Result<Vec<ListVersion>, ImportError> {
        let store = self.store;
        let limit = self.resilience.timeouts.read;
        self.resilience
            .retry
            .fetch_versions_policy()
            .execute_with("fetch course versions", retry_read, move || async move {
                read_course(store, limit, course_id).await.map(|c| c.versions)
            })
            .await
            .map_err(|e| read_failure(course_id, e))
    }

    /// Confirm the course resolves by id; the returned record is canonical
    async fn verify_course(&self, course_id: &str) -> Result<Course, ImportError> {
        let store = self.store;
        let limit = self.resilience.timeouts.read;
        self.resilience
            .retry
            .verify_policy()
            .execute_with("verify course", retry_read, move || async move {
                read_course(store, limit, course_id).await
            })
            .await
            .map_err(|e| read_failure(course_id, e))
    }

    async fn persist_versions(
        &self,
        course_id: &str,
        versions: &[ListVersion],
    ) -> Result<(), ImportError> {
        let store = self.store;
        let limit = self.resilience.timeouts.write;
        self.resilience
            .retry
            .persist_policy()
            .execute_with("persist course versions", retry_write, move || async move {
                with_timeout(
                    limit,
                    "update course versions",
                    store.update_course_versions(course_id, versions),
                )
                .await
            })
            .await
            .map_err(|e| {
                let attempts = e.attempts();
                let error = e.into_inner();
                if error.is_fatal_config() {
                    config_failure(&error, attempts)
                } else {
                    ImportError::Persist {
                        course_id: course_id.to_string(),
                        attempts,
                        message: error.to_string(),
                    }
                }
            })
    }
}

fn retry_read(error: &StoreError) -> bool {
    retry_write(error) || error.is_not_found()
}

/// A refused connection mid-job is retried like any transport failure; it
/// only halts the job once the step runs out of attempts
fn retry_write(error: &StoreError) -> bool {
    error.is_retryable() || error.is_connection_failure()
}

async fn read_course(
    store: &dyn ContentStore,
    limit: Duration,
    course_id: &str,
) -> Result<Course, StoreError> {
    with_timeout(limit, "read course", store.get_course(course_id))
        .await?
        .ok_or_else(|| StoreError::not_found(format!("course {}", course_id)))
}

fn read_failure(course_id: &str, error: RetryError<StoreError>) -> ImportError {
    let attempts = error.attempts();
    let error = error.into_inner();
    if error.is_fatal_config() {
        config_failure(&error, attempts)
    } else if error.is_not_found() || error.is_retryable() {
        ImportError::ConsistencyTimeout {
            course_id: course_id.to_string(),
            attempts,
        }
    } else {
        ImportError::Resolution {
            stage: ImportStage::List,
            message: error.to_string(),
        }
    }
}

fn config_failure(error: &StoreError, attempts: u32) -> ImportError {
    let message = if attempts > 1 {
        format!("{} (after {} attempts)", error, attempts)
    } else {
        error.to_string()
    };
    ImportError::Config { message }
}

/// One version per uploaded document, or a single line-items-only version
/// when no document made it. Ordinals continue after the highest existing.
fn build_versions(
    group: &Group,
    existing: &[ListVersion],
    uploaded: &[UploadedDocument],
) -> Vec<ListVersion> {
    let next = existing.iter().map(|v| v.ordinal).max().unwrap_or(0) + 1;
    let now = Utc::now();
    let updated_at = group
        .list
        .updated_at
        .clone()
        .unwrap_or_else(|| now.format("%Y-%m-%d").to_string());
    let first_url = group.list.source_urls.first().cloned();

    let version = |ordinal: u32,
                   file_name: String,
                   source_url: Option<String>,
                   document: Option<DocumentRef>| ListVersion {
        ordinal,
        file_name,
        subject: Some(group.subject.name.clone()),
        uploaded_at: now,
        updated_at: updated_at.clone(),
        published_at: group.list.published_at.clone(),
        source_url,
        document,
        line_items: group.items.clone(),
    };

    if uploaded.is_empty() {
        return vec![version(next, group.version_name(), first_url, None)];
    }
    uploaded
        .iter()
        .enumerate()
        .map(|(offset, doc)| {
            version(
                next + offset as u32,
                doc.file_name.clone(),
                doc.source_url.clone().or_else(|| first_url.clone()),
                Some(doc.document.clone()),
            )
        })
        .collect()
}

fn success_message(
    group: &Group,
    course: &Course,
    appended: usize,
    documents: usize,
    upload_errors: &[ImportError],
) -> String {
    let mut message = format!(
        "{} line items added to '{}' in {} version(s)",
        group.items.len(),
        course.name,
        appended
    );
    if documents == 0 {
        message.push_str(" without document");
    }
    if !upload_errors.is_empty() {
        let failures: Vec<String> = upload_errors.iter().map(|e| e.to_string()).collect();
        message.push_str(&format!("; {}", failures.join("; ")));
    }
    let components = &group.course.components;
    if components.is_ambiguous() {
        if let Some(grade) = components.grade {
            message.push_str(&format!(
                "; warning: '{}' has several grade-like numbers, grade {} assumed",
                group.course.name, grade
            ));
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Level, MemoryStore, School, TimeoutConfig};
    use crate::import::group::group_rows;
    use crate::import::row::Row;
    use crate::services::matching::{MatchingMode, match_documents};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubFetcher;

    #[async_trait]
    impl DocumentFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, StoreError> {
            if url.contains("missing") {
                return Err(StoreError::not_found(url.to_string()));
            }
            Ok(b"%PDF-1.4 stub".to_vec())
        }
    }

    struct CancelAfterFirst {
        flag: CancellationFlag,
        percents: Mutex<Vec<u8>>,
    }

    impl ProgressSink for CancelAfterFirst {
        fn on_progress(&self, percent: u8) {
            self.percents
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(percent);
        }

        fn on_group_result(&self, _result: &ImportResult) {
            self.flag.cancel();
        }
    }

    fn row(code: Option<&str>, course: &str, subject: &str, item: &str) -> Row {
        Row {
            line: 0,
            school_code: code.map(str::to_string),
            school_name: Some("Colegio Andino".to_string()),
            course_name: Some(course.to_string()),
            subject_name: Some(subject.to_string()),
            item_name: Some(item.to_string()),
            ..Default::default()
        }
    }

    fn numbered(mut rows: Vec<Row>) -> Vec<Row> {
        for (idx, row) in rows.iter_mut().enumerate() {
            row.line = idx + 2;
        }
        rows
    }

    async fn plan_for(store: &MemoryStore, rows: &[Row]) -> (ImportSession, ImportPlan) {
        let session = ImportSession::start(store, &TimeoutConfig::default())
            .await
            .unwrap();
        let grouping = group_rows(rows, Some(session.index()));
        let matches = match_documents(&[], &grouping.groups, &MatchingMode::Heuristic);
        let plan = ImportPlan::new(grouping, &[], &matches, &ImportOptions::default());
        (session, plan)
    }

    async fn import(store: &MemoryStore, rows: &[Row]) -> (ImportReport, ImportPlan) {
        let (mut session, mut plan) = plan_for(store, rows).await;
        let fetcher = StubFetcher;
        let report = ImportOrchestrator::new(store, ResilienceConfig::immediate())
            .with_fetcher(&fetcher)
            .run(&mut session, &mut plan)
            .await;
        (report, plan)
    }

    #[tokio::test]
    async fn test_end_to_end_two_subjects_one_course() {
        let store = MemoryStore::new();
        let mut lenguaje = row(Some("12345"), "1º Básico", "Lenguaje", "Cuaderno");
        lenguaje.source_urls = vec!["https://colegio.cl/listas/1-basico.pdf".to_string()];
        let mut matematica = row(Some("12345"), "1º Básico", "Matemática", "Regla");
        matematica.source_urls = vec!["https://colegio.cl/listas/1-basico.pdf".to_string()];
        let rows = numbered(vec![
            lenguaje,
            matematica,
            row(Some("12345"), "1º Básico", "Lenguaje", "Lápiz"),
            row(Some("12345"), "1º Básico", "Matemática", "Compás"),
        ]);

        let (report, plan) = import(&store, &rows).await;

        let calls = store.calls();
        assert_eq!(calls.school_creates, 1);
        assert_eq!(calls.course_creates, 1);
        assert_eq!(calls.uploads, 2);
        assert_eq!(report.results.len(), 2);
        assert!(report.results.iter().all(|r| r.success));
        assert_eq!(report.versions_appended(), 2);

        let course = &store.courses()[0];
        assert_eq!(course.level, Some(Level::Basic));
        assert_eq!(course.grade, Some(1));
        assert_eq!(course.versions.len(), 2);
        assert_eq!(course.versions[0].ordinal, 1);
        assert_eq!(course.versions[1].ordinal, 2);
        assert!(course.versions.iter().all(|v| v.document.is_some()));
        assert_eq!(course.versions[0].line_items.len(), 2);
        assert!(matches!(plan.items[0].state, GroupState::Completed { versions: 1, .. }));
    }

    #[tokio::test]
    async fn test_school_failure_does_not_stop_other_groups() {
        let store = MemoryStore::new();
        let mut orphan = row(None, "2° Básico", "Arte", "Témpera");
        orphan.school_name = Some("Colegio Desconocido".to_string());
        let rows = numbered(vec![orphan, row(Some("12345"), "2° Básico", "Arte", "Cola")]);

        let (report, plan) = import(&store, &rows).await;

        assert_eq!(report.results.len(), 2);
        let failed = &report.results[0];
        assert!(!failed.success);
        assert_eq!(failed.stage, ImportStage::School);
        assert_eq!(failed.lines, vec![2]);
        assert!(report.results[1].success);
        assert_eq!(store.calls().course_creates, 1);
        assert_eq!(
            plan.items[0].state,
            GroupState::Failed {
                stage: ImportStage::School
            }
        );
    }

    #[tokio::test]
    async fn test_waits_for_new_course_to_become_readable() {
        let store = MemoryStore::new().hide_new_courses_for(2);
        let rows = numbered(vec![row(Some("12345"), "3° Medio", "Química", "Bata")]);

        let (report, _) = import(&store, &rows).await;

        assert!(report.results[0].success, "{}", report.results[0].message);
        assert_eq!(store.calls().course_reads, 4);
        assert_eq!(store.courses()[0].versions.len(), 1);
    }

    #[tokio::test]
    async fn test_course_never_readable_fails_list_stage() {
        let store = MemoryStore::new().hide_new_courses_for(50);
        let rows = numbered(vec![row(Some("12345"), "3° Medio", "Química", "Bata")]);

        let (report, _) = import(&store, &rows).await;

        let result = &report.results[0];
        assert!(!result.success);
        assert_eq!(result.stage, ImportStage::List);
        assert!(result.message.contains("not readable"));
        assert_eq!(store.calls().course_reads, 3);
        assert_eq!(store.calls().version_writes, 0);
    }

    #[tokio::test]
    async fn test_appends_never_overwrite_existing_versions() {
        let existing = ListVersion {
            ordinal: 4,
            file_name: "lista-2025.pdf".to_string(),
            subject: Some("Lenguaje".to_string()),
            uploaded_at: Utc::now(),
            updated_at: "2025-03-01".to_string(),
            published_at: None,
            source_url: None,
            document: None,
            line_items: Vec::new(),
        };
        let store = MemoryStore::new()
            .with_schools(vec![School {
                id: "s1".to_string(),
                code: Some(12345),
                name: "Colegio Andino".to_string(),
                commune: None,
            }])
            .with_course(Course {
                id: "c1".to_string(),
                school_id: "s1".to_string(),
                name: "1º Básico".to_string(),
                level: Some(Level::Basic),
                grade: Some(1),
                year: None,
                order: None,
                versions: vec![existing.clone()],
            });
        let rows = numbered(vec![
            row(Some("12345"), "1º Básico", "Lenguaje", "Cuaderno"),
            row(Some("12345"), "1º Básico", "Historia", "Atlas"),
        ]);

        let (report, _) = import(&store, &rows).await;

        assert_eq!(report.success_count(), 2);
        let course = store.course("c1").unwrap();
        assert_eq!(course.versions.len(), 3);
        assert_eq!(course.versions[0], existing);
        assert_eq!(course.versions[1].ordinal, 5);
        assert_eq!(course.versions[2].ordinal, 6);
        assert_eq!(store.calls().school_creates, 0);
        assert_eq!(store.calls().course_creates, 0);
    }

    #[tokio::test]
    async fn test_persist_retries_transient_failures() {
        let store = MemoryStore::new().fail_next_version_writes(2);
        let rows = numbered(vec![row(Some("12345"), "4° Básico", "Música", "Flauta")]);

        let (report, _) = import(&store, &rows).await;

        assert!(report.results[0].success);
        assert_eq!(store.calls().version_writes, 3);
    }

    #[tokio::test]
    async fn test_persist_gives_up_after_bounded_attempts() {
        let store = MemoryStore::new().fail_next_version_writes(3);
        let rows = numbered(vec![row(Some("12345"), "4° Básico", "Música", "Flauta")]);

        let (report, _) = import(&store, &rows).await;

        let result = &report.results[0];
        assert!(!result.success);
        assert_eq!(result.stage, ImportStage::List);
        assert!(result.message.contains("after 3 attempts"));
    }

    #[tokio::test]
    async fn test_timed_out_course_reads_are_retried() {
        let store = MemoryStore::new().fail_next_course_reads(2);
        let rows = numbered(vec![row(Some("12345"), "7° Básico", "Ciencias", "Lupa")]);

        let (report, _) = import(&store, &rows).await;

        assert!(report.results[0].success, "{}", report.results[0].message);
        // Two timeouts and a successful read before appending, one to verify
        assert_eq!(store.calls().course_reads, 4);
        assert_eq!(store.courses()[0].versions.len(), 1);
    }

    #[tokio::test]
    async fn test_verify_retries_past_the_fetch_budget() {
        let store = MemoryStore::new().fail_course_reads_after(1, 4);
        let rows = numbered(vec![row(Some("12345"), "8° Básico", "Historia", "Atlas")]);

        let (report, _) = import(&store, &rows).await;

        assert!(report.results[0].success, "{}", report.results[0].message);
        assert_eq!(store.calls().course_reads, 6);
        assert_eq!(store.calls().version_writes, 1);
    }

    #[tokio::test]
    async fn test_verify_gives_up_after_five_attempts() {
        let store = MemoryStore::new().fail_course_reads_after(1, 5);
        let rows = numbered(vec![row(Some("12345"), "8° Básico", "Historia", "Atlas")]);

        let (report, _) = import(&store, &rows).await;

        let result = &report.results[0];
        assert!(!result.success);
        assert_eq!(result.stage, ImportStage::List);
        assert!(result.message.contains("not readable after 5 attempts"));
        assert_eq!(store.calls().course_reads, 6);
        assert_eq!(store.calls().version_writes, 0);
        assert!(report.halted.is_none());
    }

    #[tokio::test]
    async fn test_refused_connection_mid_job_is_retried() {
        let store = MemoryStore::new().refuse_next_course_reads(1);
        let rows = numbered(vec![
            row(Some("12345"), "1° Medio", "Física", "Calculadora"),
            row(Some("12345"), "2° Medio", "Física", "Calculadora"),
            row(Some("12345"), "3° Medio", "Física", "Calculadora"),
        ]);

        let (report, _) = import(&store, &rows).await;

        assert_eq!(report.success_count(), 3);
        assert!(report.halted.is_none());
    }

    #[tokio::test]
    async fn test_refused_version_write_is_retried() {
        let store = MemoryStore::new().refuse_next_version_writes(2);
        let rows = numbered(vec![row(Some("12345"), "4° Básico", "Música", "Flauta")]);

        let (report, _) = import(&store, &rows).await;

        assert!(report.results[0].success, "{}", report.results[0].message);
        assert_eq!(store.calls().version_writes, 3);
        assert!(report.halted.is_none());
    }

    #[tokio::test]
    async fn test_connection_refused_on_every_attempt_halts_job() {
        let store = MemoryStore::new().refuse_next_course_reads(3);
        let rows = numbered(vec![
            row(Some("12345"), "1° Medio", "Física", "Calculadora"),
            row(Some("12345"), "2° Medio", "Física", "Calculadora"),
        ]);

        let (report, _) = import(&store, &rows).await;

        assert!(report.halted.is_some());
        assert!(report.results[0].message.contains("unreachable"));
        assert!(report.results[0].message.contains("after 3 attempts"));
        assert!(report.results[1].message.starts_with("not attempted"));
        assert_eq!(store.calls().course_reads, 3);
    }

    #[tokio::test]
    async fn test_each_document_becomes_a_version() {
        let store = MemoryStore::new();
        let rows = numbered(vec![row(Some("12345"), "5° Básico 2026", "Lenguaje", "Libro")]);
        let (mut session, _) = plan_for(&store, &rows).await;
        let grouping = group_rows(&rows, Some(session.index()));
        let candidates = vec![
            DocumentCandidate::new("5-basico-2026 marzo.pdf", b"a".to_vec(), DocumentSource::Manual),
            DocumentCandidate::new("5-basico-2026 julio.pdf", b"b".to_vec(), DocumentSource::Manual),
        ];
        let matches = match_documents(&candidates, &grouping.groups, &MatchingMode::Heuristic);
        let mut plan = ImportPlan::new(grouping, &candidates, &matches, &ImportOptions::default());

        let report = ImportOrchestrator::new(&store, ResilienceConfig::immediate())
            .run(&mut session, &mut plan)
            .await;

        assert!(report.results[0].success);
        let versions = &store.courses()[0].versions;
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].file_name, "5-basico-2026 marzo.pdf");
        assert_eq!(versions[1].file_name, "5-basico-2026 julio.pdf");
        assert_eq!(versions[0].line_items, versions[1].line_items);
    }

    #[tokio::test]
    async fn test_failed_download_falls_back_to_line_items_only() {
        let store = MemoryStore::new();
        let mut only = row(Some("12345"), "6° Básico", "Inglés", "Diccionario");
        only.source_urls = vec!["https://colegio.cl/missing.pdf".to_string()];

        let (report, _) = import(&store, &numbered(vec![only])).await;

        let result = &report.results[0];
        assert!(result.success);
        assert!(result.message.contains("without document"));
        assert!(result.message.contains("missing.pdf"));
        let versions = &store.courses()[0].versions;
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].document, None);
        assert_eq!(versions[0].source_url.as_deref(), Some("https://colegio.cl/missing.pdf"));
    }

    #[tokio::test]
    async fn test_unreachable_store_halts_remaining_groups() {
        let store = MemoryStore::new().unreachable();
        let rows = numbered(vec![
            row(Some("1"), "1° Básico", "Arte", "Cola"),
            row(Some("2"), "1° Básico", "Arte", "Cola"),
            row(Some("3"), "1° Básico", "Arte", "Cola"),
        ]);
        let grouping = group_rows(&rows, None);
        let matches = match_documents(&[], &grouping.groups, &MatchingMode::Heuristic);
        let mut plan = ImportPlan::new(grouping, &[], &matches, &ImportOptions::default());
        let mut session = ImportSession::new(Default::default());

        let report = ImportOrchestrator::new(&store, ResilienceConfig::immediate())
            .run(&mut session, &mut plan)
            .await;

        assert!(report.halted.is_some());
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failure_count(), 3);
        assert!(report.results[2].message.starts_with("not attempted"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_groups() {
        let store = MemoryStore::new();
        let rows = numbered(vec![
            row(Some("12345"), "1° Básico", "Arte", "Cola"),
            row(Some("12345"), "2° Básico", "Arte", "Cola"),
            row(Some("12345"), "3° Básico", "Arte", "Cola"),
        ]);
        let (mut session, mut plan) = plan_for(&store, &rows).await;
        let flag = CancellationFlag::new();
        let sink = CancelAfterFirst {
            flag: flag.clone(),
            percents: Mutex::new(Vec::new()),
        };

        let report = ImportOrchestrator::new(&store, ResilienceConfig::immediate())
            .with_progress(&sink)
            .with_cancellation(flag)
            .run(&mut session, &mut plan)
            .await;

        assert!(report.cancelled);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.unprocessed_count(), 2);
        assert_eq!(*sink.percents.lock().unwrap(), vec![33]);
        assert_eq!(plan.items[1].state, GroupState::Pending);
    }

    #[tokio::test]
    async fn test_groups_run_in_declared_order() {
        let store = MemoryStore::new();
        let mut late = row(Some("12345"), "1° Básico", "Arte", "Cola");
        late.course_order = Some(2);
        let mut early = row(Some("12345"), "2° Básico", "Arte", "Cola");
        early.course_order = Some(1);

        let (report, _) = import(&store, &numbered(vec![late, early])).await;

        assert_eq!(report.results[0].group_key.course, "2° basico");
        assert_eq!(report.results[1].group_key.course, "1° basico");
    }

    #[tokio::test]
    async fn test_ambiguous_grade_is_flagged() {
        let store = MemoryStore::new();
        let rows = numbered(vec![row(Some("12345"), "Curso 3 sala 12", "Arte", "Cola")]);

        let (report, _) = import(&store, &rows).await;

        assert!(report.results[0].success);
        assert!(report.results[0].message.contains("grade 3 assumed"));
    }
}
