//! The direct-retrieve controller.
//!
//! Shares the vote loop and the insert branch with the query-retrieve
//! controller, but its retrieve branch asks the oracle to answer
//! straight from the rendered graph view instead of generating read
//! queries, so there are no query-repair loops. Not supported over the
//! triple store (the rendered XML view is not suited to direct reading).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use graphmind_core::{Dialect, Problem};
use graphmind_store::GraphStore;
use graphmind_tools::ToolManager;
use llm::Oracle;

use crate::config::ControllerConfig;
use crate::decisions;
use crate::error::ControllerError;
use crate::shared::ControllerCore;
use crate::Controller;

/// Controller that answers directly from the rendered graph view.
pub struct DirectRetrieveController {
    core: ControllerCore,
}

impl DirectRetrieveController {
    pub fn new(
        store: Box<dyn GraphStore>,
        planning: Arc<Oracle>,
        execution: Arc<Oracle>,
        tools: ToolManager,
        config: ControllerConfig,
    ) -> Result<Self, ControllerError> {
        if store.dialect() == Dialect::Sparql {
            return Err(ControllerError::Config(
                "the direct-retrieve controller does not support the triple store".to_string(),
            ));
        }
        Ok(Self {
            core: ControllerCore::new(store, planning, execution, tools, config)?,
        })
    }

    /// One direct answer per retrieve vote, read off the graph view.
    async fn retrieve_branch(
        &mut self,
        problem: &str,
        graph_view: &str,
        candidates: usize,
    ) -> Result<Vec<Value>, ControllerError> {
        let mut solutions = Vec::with_capacity(candidates);
        for _ in 0..candidates {
            let answer = decisions::generate_forced_solution(
                &self.core.planning,
                &self.core.prompts,
                problem,
                graph_view,
            )
            .await?;
            solutions.push(Value::String(answer));
        }
        info!(count = solutions.len(), "Direct retrieve finished");
        Ok(solutions)
    }
}

#[async_trait]
impl Controller for DirectRetrieveController {
    async fn run(
        &mut self,
        problem: &Problem,
        run_index: usize,
        snapshot_subdir: &Path,
    ) -> Result<(String, u32), ControllerError> {
        let problem_text = self
            .core
            .begin_run(problem, run_index, snapshot_subdir)
            .await?;

        let mut graph_view = String::new();
        let mut tool_calls_made = Vec::new();
        let mut raw_solutions: Vec<Value> = Vec::new();
        let mut iterations_taken = 0;

        for iteration in 0..self.core.config.max_iterations {
            iterations_taken = iteration + 1;

            let tally = self
                .core
                .collect_votes(&problem_text, &graph_view, &tool_calls_made)
                .await?;

            if tally.takes_retrieve_branch() {
                let view = graph_view.clone();
                let solutions = self
                    .retrieve_branch(&problem_text, &view, tally.retrieve_content.len())
                    .await?;
                raw_solutions.extend(solutions);
                break;
            }

            let reason = self.core.reason_to_insert(&tally).await?;
            graph_view = self
                .core
                .insert_branch(&problem_text, &reason, &mut tool_calls_made, graph_view)
                .await?;
        }

        if iterations_taken == self.core.config.max_iterations && raw_solutions.is_empty() {
            info!("Iteration budget exhausted; reading answers off the graph view");
            let candidates = self.core.config.num_next_steps_decision as usize;
            let view = graph_view.clone();
            let solutions = self.retrieve_branch(&problem_text, &view, candidates).await?;
            raw_solutions.extend(solutions);
        }

        let solution = self
            .core
            .choose_final_solution(&problem_text, &graph_view, raw_solutions)
            .await?;

        Ok((solution, iterations_taken))
    }
}
