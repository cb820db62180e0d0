//! Content storage API
//!
//! Models, the `ContentStore` collaborator trait and its HTTP and in-memory
//! implementations, plus the resilience layer used around every call.

pub mod client;
pub mod error;
pub mod memory;
pub mod models;
pub mod resilience;
pub mod store;

pub use client::HttpContentStore;
pub use error::StoreError;
pub use memory::{CallCounts, MemoryStore};
pub use models::{
    Course, DocumentRef, Level, LineItem, ListVersion, NewCourse, NewSchool, School,
};
pub use resilience::{
    ResilienceConfig, RetryConfig, RetryError, RetryPolicy, RetryableError, TimeoutConfig,
};
pub use store::ContentStore;
