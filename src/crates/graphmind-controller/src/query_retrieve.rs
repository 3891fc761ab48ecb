//! The query-retrieve controller: the outer loop couples a
//! majority-vote next-step decider, the tool-driven insert branch and a
//! read-query retrieve branch with nested repair loops.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use graphmind_core::Problem;
use graphmind_store::GraphStore;
use graphmind_tools::ToolManager;
use llm::Oracle;

use crate::config::ControllerConfig;
use crate::decisions;
use crate::error::ControllerError;
use crate::shared::ControllerCore;
use crate::Controller;

/// Controller that answers by generating read queries over the graph.
pub struct QueryRetrieveController {
    core: ControllerCore,
}

impl QueryRetrieveController {
    pub fn new(
        store: Box<dyn GraphStore>,
        planning: Arc<Oracle>,
        execution: Arc<Oracle>,
        tools: ToolManager,
        config: ControllerConfig,
    ) -> Result<Self, ControllerError> {
        Ok(Self {
            core: ControllerCore::new(store, planning, execution, tools, config)?,
        })
    }

    /// Execute one retrieve candidate with the nested repair loops.
    ///
    /// The outer loop generates fresh queries after empty results, the
    /// inner loop repairs failing queries; both are bounded, so the
    /// total number of reads per candidate is at most
    /// `max_retrieve_query_retry * (max_query_fixing_retry + 1) + 1`.
    async fn retrieve_one(
        &mut self,
        problem: &str,
        graph_view: &str,
        initial_query: &str,
    ) -> Result<Value, ControllerError> {
        let core = &mut self.core;
        let mut query = initial_query.to_string();
        let mut outcome = core.store.read(&query).await?;
        info!(success = outcome.success, "Retrieve query executed");

        let mut retrieve_retry = 0;
        while (!outcome.success || outcome.is_empty())
            && retrieve_retry < core.config.max_retrieve_query_retry
        {
            retrieve_retry += 1;
            info!(
                retry = retrieve_retry,
                max = core.config.max_retrieve_query_retry,
                "Retrieve unsatisfied, starting another round"
            );

            // Repair while the query itself fails to execute.
            let mut fix_retry = 0;
            while !outcome.success && fix_retry < core.config.max_query_fixing_retry {
                fix_retry += 1;
                let error_log = outcome.error.clone().unwrap_or_default();
                info!(
                    retry = fix_retry,
                    max = core.config.max_query_fixing_retry,
                    error = error_log,
                    "Repairing failed retrieve query"
                );

                query = decisions::fix_query(
                    &core.planning,
                    &core.prompts,
                    &query,
                    &error_log,
                    graph_view,
                )
                .await?;
                outcome = core.store.read(&query).await?;
            }

            // Still failing or empty: ask for a fresh query, not a repair.
            if !outcome.success || outcome.is_empty() {
                info!("Generating a new retrieve query after empty result");
                query = decisions::define_retrieve_query(
                    &core.planning,
                    &core.prompts,
                    problem,
                    graph_view,
                    &query,
                )
                .await?;
                outcome = core.store.read(&query).await?;
            }
        }

        Ok(outcome.payload)
    }

    async fn retrieve_branch(
        &mut self,
        problem: &str,
        graph_view: &str,
        retrieve_queries: &[String],
    ) -> Result<Vec<Value>, ControllerError> {
        let mut solutions = Vec::with_capacity(retrieve_queries.len());
        for query in retrieve_queries {
            solutions.push(self.retrieve_one(problem, graph_view, query).await?);
        }
        info!(count = solutions.len(), "Retrieve branch finished");
        Ok(solutions)
    }
}

#[async_trait]
impl Controller for QueryRetrieveController {
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
                    .retrieve_branch(&problem_text, &view, &tally.retrieve_content)
                    .await?;
                raw_solutions.extend(solutions);
                break;
            }

            let reason = self.core.reason_to_insert(&tally).await?;
            info!(%reason, "Entering insert branch");

            graph_view = self
                .core
                .insert_branch(&problem_text, &reason, &mut tool_calls_made, graph_view)
                .await?;

            info!(iteration = iterations_taken, "Iteration complete");
        }

        if iterations_taken == self.core.config.max_iterations && raw_solutions.is_empty() {
            info!("Iteration budget exhausted; forcing retrieve queries");
            let forced = self
                .core
                .forced_retrieve_queries(&problem_text, &graph_view)
                .await?;
            let view = graph_view.clone();
            let solutions = self.retrieve_branch(&problem_text, &view, &forced).await?;
            raw_solutions.extend(solutions);
        }

        let solution = self
            .core
            .choose_final_solution(&problem_text, &graph_view, raw_solutions)
            .await?;
        info!(%solution, iterations = iterations_taken, "Run finished");

        Ok((solution, iterations_taken))
    }
}
