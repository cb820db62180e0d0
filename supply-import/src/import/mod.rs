//! Spreadsheet import pipeline
//!
//! Rows are read from a workbook or CSV, folded into groups, matched with
//! documents and finally written to the content store by the orchestrator.

pub mod archive;
pub mod cancel;
pub mod download;
pub mod error;
pub mod excel;
pub mod group;
pub mod index;
pub mod normalize;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod resolver;
pub mod row;
pub mod session;

pub use cancel::CancellationFlag;
pub use download::{DocumentFetcher, HttpFetcher};
pub use error::{ImportError, ImportStage};
pub use group::{Group, GroupKey, Grouping, SkippedRow, group_rows};
pub use index::SchoolIndex;
pub use orchestrator::{GroupState, ImportOptions, ImportOrchestrator, ImportPlan, PendingDocument};
pub use progress::{LogProgress, ProgressSink};
pub use report::{ImportReport, ImportResult};
pub use row::Row;
pub use session::ImportSession;
