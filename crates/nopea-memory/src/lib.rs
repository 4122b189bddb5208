//! The memory subsystem (spec.md §1, §4.2-§4.5): a content-addressed,
//! weighted knowledge graph owned by a single actor task, reached
//! through ingest/query messages, periodically decayed and snapshotted
//! to the cache.

pub mod ingestor;
pub mod query;
pub mod service;
pub mod snapshot;

pub use ingestor::{ingest, DeployOutcome, IngestError};
pub use query::{dependencies, failure_patterns, recommendations};
pub use service::{spawn, MemoryHandle};
