//! Controller configuration: iteration and retry budgets.

use serde::{Deserialize, Serialize};

use crate::error::ControllerError;

/// Budgets for the outer loop and every repair layer. All retry maxima
/// are finite so every controller path terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Maximum outer-loop iterations before retrieval is forced.
    pub max_iterations: u32,

    /// Votes per next-step decision.
    pub num_next_steps_decision: u32,

    /// Fresh-query attempts per retrieve candidate.
    pub max_retrieve_query_retry: u32,

    /// Repair attempts per failing query (read or write).
    pub max_query_fixing_retry: u32,

    /// Parse attempts per raw solution during finalization.
    pub max_final_solution_parsing: u32,

    /// Retry budget for tool invocation.
    pub max_tool_retries: u32,

    /// Retry budget for oracle invocation.
    pub max_llm_retries: u32,

    /// Use the strict benchmark-style final formatter.
    pub gaia_formatter: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 7,
            num_next_steps_decision: 5,
            max_retrieve_query_retry: 3,
            max_query_fixing_retry: 3,
            max_final_solution_parsing: 3,
            max_tool_retries: 6,
            max_llm_retries: 6,
            gaia_formatter: false,
        }
    }
}

impl ControllerConfig {
    /// Reject configurations that cannot produce an answer.
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.max_iterations < 1 {
            return Err(ControllerError::Config(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_max_iterations(mut self, value: u32) -> Self {
        self.max_iterations = value;
        self
    }

    pub fn with_num_next_steps_decision(mut self, value: u32) -> Self {
        self.num_next_steps_decision = value;
        self
    }

    pub fn with_max_retrieve_query_retry(mut self, value: u32) -> Self {
        self.max_retrieve_query_retry = value;
        self
    }

    pub fn with_max_query_fixing_retry(mut self, value: u32) -> Self {
        self.max_query_fixing_retry = value;
        self
    }

    pub fn with_max_final_solution_parsing(mut self, value: u32) -> Self {
        self.max_final_solution_parsing = value;
        self
    }

    pub fn with_gaia_formatter(mut self, value: bool) -> Self {
        self.gaia_formatter = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_budgets() {
        let config = ControllerConfig::default();
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.num_next_steps_decision, 5);
        assert_eq!(config.max_retrieve_query_retry, 3);
        assert_eq!(config.max_query_fixing_retry, 3);
        assert_eq!(config.max_final_solution_parsing, 3);
        assert_eq!(config.max_tool_retries, 6);
        assert_eq!(config.max_llm_retries, 6);
        assert!(!config.gaia_formatter);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let config = ControllerConfig::default().with_max_iterations(0);
        assert!(config.validate().is_err());
        assert!(ControllerConfig::default().validate().is_ok());
    }
}
