//! # graphmind-store
//!
//! Knowledge-graph storage for graphmind. One capability set —
//! `init`, `render`, `read`, `write`, `read_many`, `write_many` — is
//! polymorphic over three backends:
//!
//! - [`CypherStore`]: a labeled-property graph reached over bolt;
//! - [`MemoryStore`]: an in-memory directed multigraph whose queries are
//!   short scripts evaluated in a restricted context;
//! - [`SparqlStore`]: a subject-predicate-object triple store reached
//!   over two HTTP endpoints.
//!
//! Recoverable query errors (syntax, semantics) come back inside
//! [`QueryOutcome`] / [`WriteOutcome`] so the caller can route them to the
//! query-repair loop; connectivity errors bubble as [`StoreError`] and
//! abort the run.

pub mod cypher;
pub mod memory;
pub mod snapshot;
pub mod sparql;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use cypher::CypherStore;
pub use graphmind_core::Dialect;
pub use memory::MemoryStore;
pub use snapshot::SnapshotDir;
pub use sparql::SparqlStore;

/// Fatal storage errors. Anything repairable stays inside the outcome
/// types; these abort the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("graph backend unreachable: {0}")]
    Unreachable(String),

    #[error("snapshot I/O error: {0}")]
    Snapshot(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
}

/// Result of a read query.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Whether the query executed without error.
    pub success: bool,

    /// Rows / text returned by the backend; `Value::Null` on failure.
    pub payload: Value,

    /// Backend error text when `success` is false.
    pub error: Option<String>,
}

impl QueryOutcome {
    /// Successful outcome with a payload.
    pub fn ok(payload: Value) -> Self {
        Self {
            success: true,
            payload,
            error: None,
        }
    }

    /// Failed outcome carrying the backend error text.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Value::Null,
            error: Some(error.into()),
        }
    }

    /// True when the query succeeded but returned nothing usable.
    pub fn is_empty(&self) -> bool {
        graphmind_core::is_empty_solution(&self.payload)
    }
}

/// Result of a write query.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// Whether the write was applied (and snapshotted).
    pub success: bool,

    /// Backend error text when `success` is false.
    pub error: Option<String>,
}

impl WriteOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Uniform capability set over the graph backends.
///
/// One controller run owns its store exclusively; writes are sequential
/// and every successful write produces exactly one numbered snapshot.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// The query dialect this backend speaks, used to pick prompt
    /// template variants.
    fn dialect(&self) -> Dialect;

    /// Delete all graph content and rotate the snapshot directory to
    /// `<snapshot_parent>/snapshot_<run_index>`, resetting the counter.
    async fn init(
        &mut self,
        run_index: usize,
        snapshot_parent: &std::path::Path,
    ) -> Result<(), StoreError>;

    /// Render the current graph as text for oracle consumption.
    async fn render(&self) -> Result<String, StoreError>;

    /// Execute a read query.
    async fn read(&self, query: &str) -> Result<QueryOutcome, StoreError>;

    /// Execute a write query; on success the snapshot counter advances
    /// by exactly one.
    async fn write(&mut self, query: &str) -> Result<WriteOutcome, StoreError>;

    /// Execute several read queries sequentially.
    async fn read_many(&self, queries: &[String]) -> Result<Vec<QueryOutcome>, StoreError> {
        let mut outcomes = Vec::with_capacity(queries.len());
        for query in queries {
            outcomes.push(self.read(query).await?);
        }
        Ok(outcomes)
    }

    /// Execute several write queries sequentially, in order.
    async fn write_many(&mut self, queries: &[String]) -> Result<Vec<WriteOutcome>, StoreError> {
        let mut outcomes = Vec::with_capacity(queries.len());
        for query in queries {
            outcomes.push(self.write(query).await?);
        }
        Ok(outcomes)
    }
}
