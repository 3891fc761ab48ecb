//! Labeled-property graph backend over bolt.
//!
//! Each write runs in a single transaction and, on success, the full
//! node and relationship set is exported client-side to a numbered JSON
//! snapshot (`{"nodes": [...], "relationships": [...]}`). The rendered
//! view groups nodes by label and relationships by type, each carrying
//! the numeric element id the queries can refer to.

use std::path::Path;

use async_trait::async_trait;
use neo4rs::{query, Graph};
use serde_json::{Map, Value};
use tracing::{info, warn};

use graphmind_core::{classify_message, Dialect, ErrorClass};

use crate::snapshot::SnapshotDir;
use crate::{GraphStore, QueryOutcome, StoreError, WriteOutcome};

const NODES_QUERY: &str = "MATCH (n) \
     RETURN labels(n) AS labels, properties(n) AS props, elementId(n) AS id";

const RELS_QUERY: &str = "MATCH (a)-[r]->(b) \
     RETURN type(r) AS rel, properties(r) AS props, \
            labels(a) AS source_labels, elementId(a) AS source_id, \
            labels(b) AS target_labels, elementId(b) AS target_id";

#[derive(Debug)]
struct NodeRow {
    labels: Vec<String>,
    props: Map<String, Value>,
    id: String,
}

impl NodeRow {
    fn from_row(row: &neo4rs::Row) -> Result<Self, neo4rs::DeError> {
        Ok(Self {
            labels: row.get("labels")?,
            props: row.get("props")?,
            id: row.get("id")?,
        })
    }
}

#[derive(Debug)]
struct RelRow {
    rel: String,
    props: Map<String, Value>,
    source_labels: Vec<String>,
    source_id: String,
    target_labels: Vec<String>,
    target_id: String,
}

impl RelRow {
    fn from_row(row: &neo4rs::Row) -> Result<Self, neo4rs::DeError> {
        Ok(Self {
            rel: row.get("rel")?,
            props: row.get("props")?,
            source_labels: row.get("source_labels")?,
            source_id: row.get("source_id")?,
            target_labels: row.get("target_labels")?,
            target_id: row.get("target_id")?,
        })
    }
}

/// Element ids come back as `<db>:<uuid>:<number>`; the rendered view
/// uses only the trailing number.
fn short_id(element_id: &str) -> &str {
    element_id.rsplit(':').next().unwrap_or(element_id)
}

/// Connection-class failures abort the run; everything else is a
/// repairable query error.
fn is_fatal(message: &str) -> bool {
    classify_message(message) == ErrorClass::Transient
}

/// Bolt-backed labeled-property graph store.
pub struct CypherStore {
    graph: Graph,
    snapshots: SnapshotDir,
}

impl CypherStore {
    /// Connect and verify the backend is reachable (`RETURN 1`).
    ///
    /// A connection failure here is fatal: the process is expected to
    /// exit with a clear message.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, StoreError> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        info!(uri, "Connected to labeled-property graph backend");

        Ok(Self {
            graph,
            snapshots: SnapshotDir::new(),
        })
    }

    async fn fetch_nodes(&self) -> Result<Vec<NodeRow>, StoreError> {
        let mut rows = Vec::new();
        let mut stream = self
            .graph
            .execute(query(NODES_QUERY))
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?
        {
            match NodeRow::from_row(&row) {
                Ok(node) => rows.push(node),
                Err(e) => warn!(error = %e, "Skipping unparsable node row"),
            }
        }
        Ok(rows)
    }

    async fn fetch_relationships(&self) -> Result<Vec<RelRow>, StoreError> {
        let mut rows = Vec::new();
        let mut stream = self
            .graph
            .execute(query(RELS_QUERY))
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?
        {
            match RelRow::from_row(&row) {
                Ok(rel) => rows.push(rel),
                Err(e) => warn!(error = %e, "Skipping unparsable relationship row"),
            }
        }
        Ok(rows)
    }

    /// Export the full graph to the next numbered snapshot file.
    async fn export_snapshot(&mut self) -> Result<(), StoreError> {
        let Some(path) = self.snapshots.next_file("json") else {
            return Ok(());
        };

        let nodes = self.fetch_nodes().await?;
        let relationships = self.fetch_relationships().await?;

        let document = serde_json::json!({
            "nodes": nodes
                .iter()
                .map(|n| serde_json::json!({
                    "id": n.id,
                    "labels": n.labels,
                    "properties": n.props,
                }))
                .collect::<Vec<_>>(),
            "relationships": relationships
                .iter()
                .map(|r| serde_json::json!({
                    "type": r.rel,
                    "properties": r.props,
                    "start": {"id": r.source_id, "labels": r.source_labels},
                    "end": {"id": r.target_id, "labels": r.target_labels},
                }))
                .collect::<Vec<_>>(),
        });

        std::fs::write(&path, serde_json::to_string_pretty(&document)?)?;
        info!(file = %path.display(), "Exported graph snapshot");
        Ok(())
    }
}

#[async_trait]
impl GraphStore for CypherStore {
    fn dialect(&self) -> Dialect {
        Dialect::Cypher
    }

    async fn init(&mut self, run_index: usize, snapshot_parent: &Path) -> Result<(), StoreError> {
        self.graph
            .run(query("MATCH (node) DETACH DELETE node"))
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        info!("Deleted all nodes");

        self.snapshots.rotate(run_index, snapshot_parent)?;
        Ok(())
    }

    async fn render(&self) -> Result<String, StoreError> {
        let nodes = self.fetch_nodes().await?;
        let relationships = self.fetch_relationships().await?;

        let mut output = String::from("This is the current state of the graph database.\n");

        output.push_str("Nodes:\n");
        let mut label_order: Vec<String> = Vec::new();
        for node in &nodes {
            let label = node.labels.first().cloned().unwrap_or_default();
            if !label_order.contains(&label) {
                label_order.push(label);
            }
        }
        for label in &label_order {
            output.push_str(&format!("  Label: {label}\n"));
            for node in &nodes {
                let node_label = node.labels.first().cloned().unwrap_or_default();
                if &node_label != label {
                    continue;
                }
                output.push_str(&format!(
                    "    {{element_id:{}, properties:{}}}\n",
                    short_id(&node.id),
                    Value::Object(node.props.clone())
                ));
            }
        }
        if nodes.is_empty() {
            output.push_str("  No nodes found\n");
        }

        output.push_str("Relationships:\n");
        let mut rel_order: Vec<String> = Vec::new();
        for rel in &relationships {
            if !rel_order.contains(&rel.rel) {
                rel_order.push(rel.rel.clone());
            }
        }
        for rel_type in &rel_order {
            output.push_str(&format!("  Label: {rel_type}\n"));
            for rel in &relationships {
                if &rel.rel != rel_type {
                    continue;
                }
                output.push_str(&format!(
                    "    {{source: {{element_id: {}, label: {}}}, target: {{element_id: {}, label: {}}}, properties: {}}}\n",
                    short_id(&rel.source_id),
                    rel.source_labels.first().cloned().unwrap_or_default(),
                    short_id(&rel.target_id),
                    rel.target_labels.first().cloned().unwrap_or_default(),
                    Value::Object(rel.props.clone())
                ));
            }
        }
        if relationships.is_empty() {
            output.push_str("  No relationships found\n");
        }

        Ok(output)
    }

    async fn read(&self, text: &str) -> Result<QueryOutcome, StoreError> {
        if text.trim().is_empty() {
            return Ok(QueryOutcome::failed("query to execute is empty"));
        }

        let mut stream = match self.graph.execute(query(text)).await {
            Ok(stream) => stream,
            Err(e) => {
                let message = e.to_string();
                if is_fatal(&message) {
                    return Err(StoreError::Unreachable(message));
                }
                warn!(error = %message, "Read query failed");
                return Ok(QueryOutcome::failed(message));
            }
        };

        let mut rows: Vec<Value> = Vec::new();
        loop {
            match stream.next().await {
                Ok(Some(row)) => match row.to::<Value>() {
                    Ok(value) => rows.push(value),
                    Err(e) => return Ok(QueryOutcome::failed(e.to_string())),
                },
                Ok(None) => break,
                Err(e) => {
                    let message = e.to_string();
                    if is_fatal(&message) {
                        return Err(StoreError::Unreachable(message));
                    }
                    return Ok(QueryOutcome::failed(message));
                }
            }
        }

        Ok(QueryOutcome::ok(Value::Array(rows)))
    }

    async fn write(&mut self, text: &str) -> Result<WriteOutcome, StoreError> {
        if text.trim().is_empty() {
            return Ok(WriteOutcome::failed("query to execute is empty"));
        }

        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        if let Err(e) = txn.run(query(text)).await {
            let message = e.to_string();
            if is_fatal(&message) {
                return Err(StoreError::Unreachable(message));
            }
            warn!(error = %message, "Write query failed");
            return Ok(WriteOutcome::failed(message));
        }

        if let Err(e) = txn.commit().await {
            let message = e.to_string();
            if is_fatal(&message) {
                return Err(StoreError::Unreachable(message));
            }
            return Ok(WriteOutcome::failed(message));
        }

        self.export_snapshot().await?;
        Ok(WriteOutcome::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_takes_trailing_segment() {
        assert_eq!(short_id("4:abcd-ef:17"), "17");
        assert_eq!(short_id("17"), "17");
    }

    #[test]
    fn fatal_classification_targets_connectivity() {
        assert!(is_fatal("connection reset by peer"));
        assert!(is_fatal("operation timed out"));
        assert!(!is_fatal("Invalid input 'MERG': expected ..."));
    }
}
