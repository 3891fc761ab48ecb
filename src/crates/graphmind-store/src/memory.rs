//! In-memory directed multigraph backend.
//!
//! Nodes and edges live in a `petgraph` stable directed graph. Queries
//! are short scripts evaluated in a restricted `rhai` context whose only
//! exposed binding is `graph`; a read script must leave a `result`
//! variable in scope or the read is reported failed. Writes run against a
//! deep copy of the graph: on success the copy is swapped in and a JSONL
//! snapshot written, on failure the previous graph is untouched.

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};

use petgraph::visit::IntoEdgeReferences;

use async_trait::async_trait;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rhai::serde::{from_dynamic, to_dynamic};
use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use graphmind_core::{canonical_json, Dialect};

use crate::snapshot::SnapshotDir;
use crate::{GraphStore, QueryOutcome, StoreError, WriteOutcome};

/// A typed node: string id, label and a property map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub label: String,
    pub properties: Map<String, Value>,
}

/// A typed edge: relationship label and a property map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub relationship: String,
    pub properties: Map<String, Value>,
}

/// The graph payload swapped wholesale on successful writes.
#[derive(Debug, Clone, Default)]
struct GraphData {
    graph: StableDiGraph<NodeRecord, EdgeRecord>,
    ids: HashMap<String, NodeIndex>,
}

impl GraphData {
    fn upsert_node(&mut self, id: &str, label: &str, properties: Map<String, Value>) {
        match self.ids.get(id) {
            Some(&index) => {
                let node = &mut self.graph[index];
                if !label.is_empty() {
                    node.label = label.to_string();
                }
                for (key, value) in properties {
                    node.properties.insert(key, value);
                }
            }
            None => {
                let index = self.graph.add_node(NodeRecord {
                    id: id.to_string(),
                    label: label.to_string(),
                    properties,
                });
                self.ids.insert(id.to_string(), index);
            }
        }
    }

    /// Node index for an id, creating an unlabeled node when absent.
    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&index) = self.ids.get(id) {
            return index;
        }
        let index = self.graph.add_node(NodeRecord {
            id: id.to_string(),
            ..Default::default()
        });
        self.ids.insert(id.to_string(), index);
        index
    }

    fn index_of(&self, id: &str) -> Result<NodeIndex, String> {
        self.ids
            .get(id)
            .copied()
            .ok_or_else(|| format!("node '{id}' does not exist"))
    }
}

/// Script-visible graph handle. Clones share the same underlying data so
/// mutations made inside the evaluation context survive it.
#[derive(Clone)]
struct ScriptGraph(Arc<Mutex<GraphData>>);

impl ScriptGraph {
    fn new(data: GraphData) -> Self {
        Self(Arc::new(Mutex::new(data)))
    }

    fn into_data(self) -> GraphData {
        // Scripts cannot stash handle clones beyond the evaluation, but a
        // plain lock-and-clone avoids relying on the refcount.
        let data = self.0.lock().expect("graph handle poisoned");
        data.clone()
    }
}

fn script_err(message: impl Into<String>) -> Box<EvalAltResult> {
    message.into().into()
}

fn props_from_map(map: rhai::Map) -> Result<Map<String, Value>, Box<EvalAltResult>> {
    let value: Value = from_dynamic(&Dynamic::from(map))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(script_err("properties must be a map")),
    }
}

fn edge_map(source: &str, target: &str, edge: &EdgeRecord) -> Result<Dynamic, Box<EvalAltResult>> {
    to_dynamic(serde_json::json!({
        "source": source,
        "target": target,
        "relationship": edge.relationship,
        "properties": edge.properties,
    }))
}

/// Build the evaluation engine: the graph type plus its accessors and
/// mutators, nothing else from the host.
fn build_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(1_000_000);
    engine.register_type_with_name::<ScriptGraph>("Graph");

    engine.register_fn(
        "add_node",
        |g: &mut ScriptGraph, id: &str, label: &str, props: rhai::Map| -> Result<(), Box<EvalAltResult>> {
            let props = props_from_map(props)?;
            g.0.lock().expect("graph handle poisoned").upsert_node(id, label, props);
            Ok(())
        },
    );
    engine.register_fn("add_node", |g: &mut ScriptGraph, id: &str, label: &str| {
        g.0.lock().expect("graph handle poisoned").upsert_node(id, label, Map::new());
    });

    engine.register_fn(
        "add_edge",
        |g: &mut ScriptGraph,
         source: &str,
         target: &str,
         relationship: &str,
         props: rhai::Map|
         -> Result<(), Box<EvalAltResult>> {
            let props = props_from_map(props)?;
            let mut data = g.0.lock().expect("graph handle poisoned");
            let a = data.ensure_node(source);
            let b = data.ensure_node(target);
            data.graph.add_edge(
                a,
                b,
                EdgeRecord {
                    relationship: relationship.to_string(),
                    properties: props,
                },
            );
            Ok(())
        },
    );
    engine.register_fn(
        "add_edge",
        |g: &mut ScriptGraph, source: &str, target: &str, relationship: &str| {
            let mut data = g.0.lock().expect("graph handle poisoned");
            let a = data.ensure_node(source);
            let b = data.ensure_node(target);
            data.graph.add_edge(
                a,
                b,
                EdgeRecord {
                    relationship: relationship.to_string(),
                    properties: Map::new(),
                },
            );
        },
    );

    engine.register_fn(
        "remove_node",
        |g: &mut ScriptGraph, id: &str| -> Result<(), Box<EvalAltResult>> {
            let mut data = g.0.lock().expect("graph handle poisoned");
            let index = data.index_of(id).map_err(script_err)?;
            data.graph.remove_node(index);
            data.ids.remove(id);
            Ok(())
        },
    );

    engine.register_fn(
        "remove_edge",
        |g: &mut ScriptGraph, source: &str, target: &str| -> Result<(), Box<EvalAltResult>> {
            let mut data = g.0.lock().expect("graph handle poisoned");
            let a = data.index_of(source).map_err(script_err)?;
            let b = data.index_of(target).map_err(script_err)?;
            let edges: Vec<_> = data
                .graph
                .edges_connecting(a, b)
                .map(|edge| edge.id())
                .collect();
            for id in edges {
                data.graph.remove_edge(id);
            }
            Ok(())
        },
    );

    engine.register_fn("has_node", |g: &mut ScriptGraph, id: &str| -> bool {
        g.0.lock().expect("graph handle poisoned").ids.contains_key(id)
    });

    engine.register_fn("node_ids", |g: &mut ScriptGraph| -> rhai::Array {
        let data = g.0.lock().expect("graph handle poisoned");
        data.graph
            .node_indices()
            .map(|index| Dynamic::from(data.graph[index].id.clone()))
            .collect()
    });

    engine.register_fn(
        "node_label",
        |g: &mut ScriptGraph, id: &str| -> Result<String, Box<EvalAltResult>> {
            let data = g.0.lock().expect("graph handle poisoned");
            let index = data.index_of(id).map_err(script_err)?;
            Ok(data.graph[index].label.clone())
        },
    );

    engine.register_fn(
        "nodes_with_label",
        |g: &mut ScriptGraph, label: &str| -> rhai::Array {
            let data = g.0.lock().expect("graph handle poisoned");
            data.graph
                .node_indices()
                .filter(|&index| data.graph[index].label == label)
                .map(|index| Dynamic::from(data.graph[index].id.clone()))
                .collect()
        },
    );

    engine.register_fn(
        "node_property",
        |g: &mut ScriptGraph, id: &str, key: &str| -> Result<Dynamic, Box<EvalAltResult>> {
            let data = g.0.lock().expect("graph handle poisoned");
            let index = data.index_of(id).map_err(script_err)?;
            match data.graph[index].properties.get(key) {
                Some(value) => to_dynamic(value),
                None => Ok(Dynamic::UNIT),
            }
        },
    );

    engine.register_fn(
        "node_properties",
        |g: &mut ScriptGraph, id: &str| -> Result<Dynamic, Box<EvalAltResult>> {
            let data = g.0.lock().expect("graph handle poisoned");
            let index = data.index_of(id).map_err(script_err)?;
            to_dynamic(Value::Object(data.graph[index].properties.clone()))
        },
    );

    engine.register_fn(
        "set_node_property",
        |g: &mut ScriptGraph, id: &str, key: &str, value: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let json: Value = from_dynamic(&value)?;
            let mut data = g.0.lock().expect("graph handle poisoned");
            let index = data.index_of(id).map_err(script_err)?;
            data.graph[index].properties.insert(key.to_string(), json);
            Ok(())
        },
    );

    engine.register_fn("edges", |g: &mut ScriptGraph| -> Result<rhai::Array, Box<EvalAltResult>> {
        let data = g.0.lock().expect("graph handle poisoned");
        data.graph
            .edge_references()
            .map(|edge| {
                edge_map(
                    &data.graph[edge.source()].id,
                    &data.graph[edge.target()].id,
                    edge.weight(),
                )
            })
            .collect()
    });

    // Adjacency walks yield newest-first; reverse so scripts see edges
    // in insertion order.
    engine.register_fn(
        "out_edges",
        |g: &mut ScriptGraph, id: &str| -> Result<rhai::Array, Box<EvalAltResult>> {
            let data = g.0.lock().expect("graph handle poisoned");
            let index = data.index_of(id).map_err(script_err)?;
            let mut edges: rhai::Array = data
                .graph
                .edges_directed(index, Direction::Outgoing)
                .map(|edge| {
                    edge_map(
                        &data.graph[edge.source()].id,
                        &data.graph[edge.target()].id,
                        edge.weight(),
                    )
                })
                .collect::<Result<_, _>>()?;
            edges.reverse();
            Ok(edges)
        },
    );

    engine.register_fn(
        "in_edges",
        |g: &mut ScriptGraph, id: &str| -> Result<rhai::Array, Box<EvalAltResult>> {
            let data = g.0.lock().expect("graph handle poisoned");
            let index = data.index_of(id).map_err(script_err)?;
            let mut edges: rhai::Array = data
                .graph
                .edges_directed(index, Direction::Incoming)
                .map(|edge| {
                    edge_map(
                        &data.graph[edge.source()].id,
                        &data.graph[edge.target()].id,
                        edge.weight(),
                    )
                })
                .collect::<Result<_, _>>()?;
            edges.reverse();
            Ok(edges)
        },
    );

    engine.register_fn(
        "neighbors",
        |g: &mut ScriptGraph, id: &str| -> Result<rhai::Array, Box<EvalAltResult>> {
            let data = g.0.lock().expect("graph handle poisoned");
            let index = data.index_of(id).map_err(script_err)?;
            let mut ids: rhai::Array = data
                .graph
                .neighbors_directed(index, Direction::Outgoing)
                .map(|n| Dynamic::from(data.graph[n].id.clone()))
                .collect();
            ids.reverse();
            Ok(ids)
        },
    );

    engine
}

/// In-memory graph store; no external service dependency.
pub struct MemoryStore {
    data: GraphData,
    snapshots: SnapshotDir,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: GraphData::default(),
            snapshots: SnapshotDir::new(),
        }
    }

    /// Evaluate a script against a copy of `data`, returning the scope
    /// and the mutated copy.
    fn eval(
        data: &GraphData,
        script: &str,
    ) -> Result<(GraphData, Option<Dynamic>), String> {
        let handle = ScriptGraph::new(data.clone());
        let engine = build_engine();
        let mut scope = Scope::new();
        scope.push("graph", handle.clone());

        engine
            .run_with_scope(&mut scope, script)
            .map_err(|e| e.to_string())?;

        let result = scope.get_value::<Dynamic>("result");
        drop(scope);
        Ok((handle.into_data(), result))
    }

    fn export_snapshot(&mut self) -> Result<(), StoreError> {
        let Some(path) = self.snapshots.next_file("jsonl") else {
            return Ok(());
        };

        let mut lines: Vec<Value> = Vec::new();
        let mut node_objects: HashMap<String, Value> = HashMap::new();

        for index in self.data.graph.node_indices() {
            let node = &self.data.graph[index];
            let object = serde_json::json!({
                "type": "node",
                "id": node.id,
                "labels": node.label,
                "properties": node.properties,
            });
            node_objects.insert(node.id.clone(), object.clone());
            lines.push(object);
        }

        for edge in self.data.graph.edge_references() {
            let source = &self.data.graph[edge.source()].id;
            let target = &self.data.graph[edge.target()].id;
            lines.push(serde_json::json!({
                "type": "relationship",
                "label": edge.weight().relationship,
                "properties": edge.weight().properties,
                "start": node_objects[source],
                "end": node_objects[target],
            }));
        }

        let mut file = fs::File::create(&path)?;
        for line in lines {
            let mut text = serde_json::to_string(&line)?;
            text.push('\n');
            file.write_all(text.as_bytes())?;
        }

        info!(file = %path.display(), "Exported graph snapshot");
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    fn dialect(&self) -> Dialect {
        Dialect::GraphScript
    }

    async fn init(&mut self, run_index: usize, snapshot_parent: &Path) -> Result<(), StoreError> {
        self.data = GraphData::default();
        self.snapshots.rotate(run_index, snapshot_parent)?;
        info!("Cleared in-memory graph");
        Ok(())
    }

    async fn render(&self) -> Result<String, StoreError> {
        let mut output = String::from("This is the current state of the in-memory directed graph.\n");

        // Nodes grouped by label, in insertion order.
        let mut label_order: Vec<String> = Vec::new();
        let mut by_label: HashMap<String, Vec<NodeIndex>> = HashMap::new();
        for index in self.data.graph.node_indices() {
            let label = self.data.graph[index].label.clone();
            if !by_label.contains_key(&label) {
                label_order.push(label.clone());
            }
            by_label.entry(label).or_default().push(index);
        }

        output.push_str("Existing Nodes:\n");
        for label in &label_order {
            output.push_str(&format!("\tLabel: {label}\n \t\t["));
            let rendered: Vec<String> = by_label[label]
                .iter()
                .map(|&index| {
                    let node = &self.data.graph[index];
                    format!(
                        "{{id:{}, properties:{}}}",
                        node.id,
                        canonical_json(&Value::Object(node.properties.clone()))
                    )
                })
                .collect();
            output.push_str(&rendered.join(", "));
            output.push_str("]\n");
        }
        if label_order.is_empty() {
            output.push_str("\tNo nodes found\n");
        }

        // Relationships grouped by type, in insertion order.
        let mut relation_order: Vec<String> = Vec::new();
        let mut by_relation: HashMap<String, Vec<String>> = HashMap::new();
        for edge in self.data.graph.edge_references() {
            let relation = edge.weight().relationship.clone();
            let entry = format!(
                "{{source: {{id: {}}}, target: {{id: {}}}, properties: {}}}",
                self.data.graph[edge.source()].id,
                self.data.graph[edge.target()].id,
                canonical_json(&Value::Object(edge.weight().properties.clone()))
            );
            if !by_relation.contains_key(&relation) {
                relation_order.push(relation.clone());
            }
            by_relation.entry(relation).or_default().push(entry);
        }

        output.push_str("Existing Relationships:\n");
        for relation in &relation_order {
            output.push_str(&format!("\tLabel: {relation}\n \t\t["));
            output.push_str(&by_relation[relation].join(", "));
            output.push_str("]\n");
        }
        if relation_order.is_empty() {
            output.push_str("\tNo relationships found\n");
        }

        Ok(output)
    }

    async fn read(&self, query: &str) -> Result<QueryOutcome, StoreError> {
        if query.trim().is_empty() {
            return Ok(QueryOutcome::failed("query to execute is empty"));
        }

        match Self::eval(&self.data, query) {
            Err(error) => {
                warn!(%error, "Read script failed");
                Ok(QueryOutcome::failed(error))
            }
            Ok((_, None)) => Ok(QueryOutcome::failed(
                "variable 'result' is not defined; the script must set `result`",
            )),
            Ok((_, Some(dynamic))) => {
                if dynamic.is_unit() {
                    return Ok(QueryOutcome::failed(
                        "variable 'result' is unit; the script must set `result` to a value",
                    ));
                }
                match from_dynamic::<Value>(&dynamic) {
                    Ok(payload) => {
                        debug!(?payload, "Read script result");
                        Ok(QueryOutcome::ok(payload))
                    }
                    Err(e) => Ok(QueryOutcome::failed(format!(
                        "result is not serializable: {e}"
                    ))),
                }
            }
        }
    }

    async fn write(&mut self, query: &str) -> Result<WriteOutcome, StoreError> {
        if query.trim().is_empty() {
            return Ok(WriteOutcome::failed("query to execute is empty"));
        }

        match Self::eval(&self.data, query) {
            Err(error) => {
                warn!(%error, "Write script failed, graph left unchanged");
                Ok(WriteOutcome::failed(error))
            }
            Ok((new_data, _)) => {
                self.data = new_data;
                self.export_snapshot()?;
                Ok(WriteOutcome::ok())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    async fn store_with_books() -> (MemoryStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let mut store = MemoryStore::new();
        store.init(0, dir.path()).await.unwrap();

        store
            .write(
                r#"
                graph.add_node("A1", "Author", #{name: "J.K. Rowling"});
                graph.add_node("B1", "Book", #{title: "Harry Potter and the Philosopher's Stone"});
                graph.add_node("B2", "Book", #{title: "Harry Potter and the Chamber of Secrets"});
                graph.add_edge("A1", "B1", "wrote");
                graph.add_edge("A1", "B2", "wrote");
                "#,
            )
            .await
            .unwrap();

        (store, dir)
    }

    #[tokio::test]
    async fn init_then_render_is_canonical_empty() {
        let dir = tempdir().unwrap();
        let mut store = MemoryStore::new();
        store.init(0, dir.path()).await.unwrap();

        let rendered = store.render().await.unwrap();
        assert!(rendered.contains("No nodes found"));
        assert!(rendered.contains("No relationships found"));

        // init after content restores the same canonical rendering
        store.write(r#"graph.add_node("X", "Thing");"#).await.unwrap();
        store.init(1, dir.path()).await.unwrap();
        let rendered_again = store.render().await.unwrap();
        assert_eq!(rendered, rendered_again);
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let (store, _dir) = store_with_books().await;

        let outcome = store
            .read(
                r#"
                let titles = [];
                for edge in graph.out_edges("A1") {
                    titles.push(graph.node_property(edge.target, "title"));
                }
                let result = titles;
                "#,
            )
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(
            outcome.payload,
            json!([
                "Harry Potter and the Philosopher's Stone",
                "Harry Potter and the Chamber of Secrets"
            ])
        );
    }

    #[tokio::test]
    async fn read_without_result_binding_fails() {
        let (store, _dir) = store_with_books().await;

        let outcome = store.read(r#"let x = graph.node_ids();"#).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("result"));
    }

    #[tokio::test]
    async fn failed_write_rolls_back() {
        let (mut store, _dir) = store_with_books().await;
        let before = store.render().await.unwrap();
        let count_before = store.snapshots.counter();

        let outcome = store
            .write(r#"graph.add_node("C1", "Category"); graph.remove_node("NOPE");"#)
            .await
            .unwrap();

        assert!(!outcome.success);
        // Byte-identical graph state and no extra snapshot.
        assert_eq!(store.render().await.unwrap(), before);
        assert_eq!(store.snapshots.counter(), count_before);
    }

    #[tokio::test]
    async fn snapshot_counter_advances_once_per_successful_write() {
        let (mut store, dir) = store_with_books().await;
        assert_eq!(store.snapshots.counter(), 1);

        store.write(r#"graph.add_node("A2", "Author");"#).await.unwrap();
        assert_eq!(store.snapshots.counter(), 2);

        let snapshot_1 = dir.path().join("snapshot_0/snapshot_1.jsonl");
        assert!(snapshot_1.exists());
        // Each line parses as JSON.
        let content = fs::read_to_string(snapshot_1).unwrap();
        for line in content.lines() {
            let _: Value = serde_json::from_str(line).unwrap();
        }
    }

    #[tokio::test]
    async fn render_groups_by_label_in_insertion_order() {
        let (store, _dir) = store_with_books().await;
        let rendered = store.render().await.unwrap();

        let author_at = rendered.find("Label: Author").unwrap();
        let book_at = rendered.find("Label: Book").unwrap();
        assert!(author_at < book_at);
        assert!(rendered.contains("Label: wrote"));
        assert!(rendered.contains(r#"{id:A1, properties:{"name":"J.K. Rowling"}}"#));
    }

    #[tokio::test]
    async fn script_errors_are_recoverable_not_fatal() {
        let (store, _dir) = store_with_books().await;
        let outcome = store.read("this is not a valid script ~~~").await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }
}
