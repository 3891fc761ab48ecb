//! Query-dialect tag carried by queries and prompt templates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The query language a graph backend speaks.
///
/// The controller never inspects backend-specific query text; it only
/// routes queries and prompt templates by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// Labeled-property graph queried with Cypher.
    Cypher,

    /// In-memory directed multigraph queried with short scripts that
    /// must bind a `result` variable.
    GraphScript,

    /// Subject-predicate-object triple store queried with SPARQL.
    Sparql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Cypher => "cypher",
            Dialect::GraphScript => "graph-script",
            Dialect::Sparql => "sparql",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_are_stable() {
        assert_eq!(Dialect::Cypher.to_string(), "cypher");
        assert_eq!(Dialect::GraphScript.to_string(), "graph-script");
        assert_eq!(Dialect::Sparql.to_string(), "sparql");
    }
}
