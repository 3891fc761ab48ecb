//! # graphmind-prompts
//!
//! The prompt catalog. Templates that mention query syntax exist in one
//! variant per backend dialect; the rest are shared. [`PromptLibrary`]
//! hands the controller the right variant for its store's dialect so no
//! backend vocabulary leaks upward.

pub mod cypher;
pub mod script;
pub mod shared;
pub mod sparql;
pub mod template;
pub mod tools;

use graphmind_core::Dialect;

pub use template::{PromptError, PromptTemplate};

/// Dialect-resolved view over the template catalog.
#[derive(Debug, Clone, Copy)]
pub struct PromptLibrary {
    dialect: Dialect,
}

impl PromptLibrary {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn dialect_template(
        &self,
        cypher: &'static str,
        script: &'static str,
        sparql: &'static str,
    ) -> PromptTemplate {
        match self.dialect {
            Dialect::Cypher => PromptTemplate::new(cypher),
            Dialect::GraphScript => {
                PromptTemplate::from_string(script::with_code_documentation(script))
            }
            Dialect::Sparql => PromptTemplate::new(sparql),
        }
    }

    /// Decide INSERT vs RETRIEVE given the problem, graph view and
    /// prior tool calls.
    pub fn next_step(&self) -> PromptTemplate {
        self.dialect_template(
            cypher::DEFINE_NEXT_STEP,
            script::DEFINE_NEXT_STEP,
            sparql::DEFINE_NEXT_STEP,
        )
    }

    /// Produce write queries integrating freshly gathered information.
    pub fn write_queries_from_new_info(&self) -> PromptTemplate {
        self.dialect_template(
            cypher::WRITE_QUERIES_FROM_NEW_INFO,
            script::WRITE_QUERIES_FROM_NEW_INFO,
            sparql::WRITE_QUERIES_FROM_NEW_INFO,
        )
    }

    /// Produce a fresh read query after a previous one came back empty.
    pub fn retrieve_query(&self) -> PromptTemplate {
        self.dialect_template(
            cypher::DEFINE_RETRIEVE_QUERY,
            script::DEFINE_RETRIEVE_QUERY,
            sparql::DEFINE_RETRIEVE_QUERY,
        )
    }

    /// Produce a read query once the iteration budget is exhausted.
    pub fn forced_retrieve(&self) -> PromptTemplate {
        self.dialect_template(
            cypher::FORCED_RETRIEVE_QUERY,
            script::FORCED_RETRIEVE_QUERY,
            sparql::FORCED_RETRIEVE_QUERY,
        )
    }

    /// Repair a failed query given the backend error text. The script
    /// variant additionally interpolates the rendered graph view.
    pub fn fix_query(&self) -> PromptTemplate {
        self.dialect_template(cypher::FIX_QUERY, script::FIX_QUERY, sparql::FIX_QUERY)
    }

    /// Fold multiple INSERT rationales into one paragraph.
    pub fn merge_reasons_to_insert(&self) -> PromptTemplate {
        PromptTemplate::new(shared::MERGE_REASONS_TO_INSERT)
    }

    /// Select the next tool calls, avoiding duplicates of prior calls.
    pub fn tool_calls(&self) -> PromptTemplate {
        PromptTemplate::new(shared::DEFINE_TOOL_CALLS)
    }

    /// Bind the oracle to the code executor for follow-up computation.
    pub fn math_tool_call(&self) -> PromptTemplate {
        PromptTemplate::new(shared::DEFINE_MATH_TOOL_CALL)
    }

    /// Does the partial solution still require computation?
    pub fn need_for_math(&self) -> PromptTemplate {
        PromptTemplate::new(shared::DEFINE_NEED_FOR_MATH)
    }

    /// Format a partial solution per the problem's style.
    pub fn parse_solution(&self, strict: bool) -> PromptTemplate {
        if strict {
            PromptTemplate::new(shared::PARSE_SOLUTION_STRICT)
        } else {
            PromptTemplate::new(shared::PARSE_SOLUTION)
        }
    }

    /// Pick the best of several formatted candidates.
    pub fn final_solution_vote(&self) -> PromptTemplate {
        PromptTemplate::new(shared::FINAL_SOLUTION_VOTE)
    }

    /// Produce a guess when retrieves are empty.
    pub fn forced_solution(&self) -> PromptTemplate {
        PromptTemplate::new(shared::FORCED_SOLUTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_DIALECTS: [Dialect; 3] = [Dialect::Cypher, Dialect::GraphScript, Dialect::Sparql];

    #[test]
    fn next_step_renders_in_every_dialect() {
        for dialect in ALL_DIALECTS {
            let library = PromptLibrary::new(dialect);
            let rendered = library
                .next_step()
                .render(&[
                    ("initial_query", "problem"),
                    ("existing_entities_and_relationships", "graph view"),
                    ("tool_calls_made", "none"),
                ])
                .unwrap();
            assert!(rendered.contains("problem"), "dialect {dialect}");
            assert!(rendered.contains("graph view"), "dialect {dialect}");
            assert!(rendered.contains("INSERT"), "dialect {dialect}");
            assert!(rendered.contains("RETRIEVE"), "dialect {dialect}");
        }
    }

    #[test]
    fn fix_query_script_variant_includes_graph_view() {
        let rendered = PromptLibrary::new(Dialect::GraphScript)
            .fix_query()
            .render(&[
                ("query_to_fix", "bad script"),
                ("error_log", "boom"),
                ("existing_entities_and_relationships", "THE VIEW"),
            ])
            .unwrap();
        assert!(rendered.contains("THE VIEW"));

        // The other dialect variants ignore the graph-view binding.
        let rendered = PromptLibrary::new(Dialect::Cypher)
            .fix_query()
            .render(&[
                ("query_to_fix", "bad cypher"),
                ("error_log", "boom"),
                ("existing_entities_and_relationships", "THE VIEW"),
            ])
            .unwrap();
        assert!(!rendered.contains("THE VIEW"));
    }

    #[test]
    fn script_templates_embed_the_code_documentation() {
        let library = PromptLibrary::new(Dialect::GraphScript);
        for template in [
            library.next_step(),
            library.write_queries_from_new_info(),
            library.retrieve_query(),
            library.forced_retrieve(),
            library.fix_query(),
        ] {
            assert!(template.pattern().contains("code_documentation"));
            assert!(template.pattern().contains("graph.add_node"));
        }
    }

    #[test]
    fn write_query_templates_render_with_standard_bindings() {
        for dialect in ALL_DIALECTS {
            let rendered = PromptLibrary::new(dialect)
                .write_queries_from_new_info()
                .render(&[
                    ("initial_query", "P"),
                    ("existing_entities_and_relationships", "G"),
                    ("new_information", "N"),
                    ("missing_information", "M"),
                ])
                .unwrap();
            assert!(rendered.contains('N'), "dialect {dialect}");
        }
    }

    #[test]
    fn strict_formatter_template_differs_from_default() {
        let library = PromptLibrary::new(Dialect::Cypher);
        assert_ne!(
            library.parse_solution(false).pattern(),
            library.parse_solution(true).pattern()
        );
        assert!(library
            .parse_solution(true)
            .pattern()
            .contains("comma separated list"));
    }
}
