//! # graphmind-controller
//!
//! The iterative reasoning controllers. A controller owns a graph
//! store, two oracles (planning and execution), the tool manager and
//! the dialect-resolved prompt library; each run clears the graph,
//! iterates vote → insert-branch until a retrieve majority (or the
//! budget runs out), then finalizes into a non-empty answer string.

pub mod config;
pub mod decisions;
pub mod direct_retrieve;
pub mod error;
pub mod query_retrieve;
mod shared;

use std::path::Path;

use async_trait::async_trait;

use graphmind_core::Problem;

pub use config::ControllerConfig;
pub use direct_retrieve::DirectRetrieveController;
pub use error::ControllerError;
pub use query_retrieve::QueryRetrieveController;

/// A controller run: problem in, answer and iteration count out.
///
/// Side effects: the graph is cleared and one snapshot is written per
/// successful write query under
/// `<snapshot_subdir>/<timestamp>/snapshot_<run_index>/`.
#[async_trait]
pub trait Controller: Send {
    async fn run(
        &mut self,
        problem: &Problem,
        run_index: usize,
        snapshot_subdir: &Path,
    ) -> Result<(String, u32), ControllerError>;
}
