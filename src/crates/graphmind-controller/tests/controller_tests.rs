//! End-to-end controller runs against the in-memory backend with
//! scripted oracles.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::tempdir;

use graphmind_controller::{
    Controller, ControllerConfig, DirectRetrieveController, QueryRetrieveController,
};
use graphmind_core::{Problem, UsageStatistics};
use graphmind_store::MemoryStore;
use graphmind_tools::{Tool, ToolError, ToolManager};
use llm::{ChatClient, MessageContent, MockChatClient, Oracle};

/// Stand-in for the code executor so math post-processing works
/// without the sandbox service.
struct FakeExecutor {
    output: &'static str,
}

#[async_trait]
impl Tool for FakeExecutor {
    fn name(&self) -> &str {
        "run_python_code"
    }

    fn description(&self) -> &str {
        "executes code"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {"code": {"type": "string"}}, "required": ["code"]})
    }

    async fn invoke(&self, _args: Value) -> Result<Value, ToolError> {
        Ok(json!({"output": self.output}))
    }
}

struct Rig {
    planning: MockChatClient,
    execution: MockChatClient,
    tool_model: MockChatClient,
    _stats_dir: tempfile::TempDir,
    snapshots: tempfile::TempDir,
    stats: UsageStatistics,
}

impl Rig {
    fn new() -> Self {
        let stats_dir = tempdir().unwrap();
        let stats = UsageStatistics::new(stats_dir.path().join("usage.jsonl")).unwrap();
        Self {
            planning: MockChatClient::new("plan-model"),
            execution: MockChatClient::new("exec-model"),
            tool_model: MockChatClient::new("tool-model"),
            _stats_dir: stats_dir,
            snapshots: tempdir().unwrap(),
            stats,
        }
    }

    fn tools(&self) -> ToolManager {
        let oracle = Arc::new(Oracle::new(self.tool_model.clone_box(), self.stats.clone(), 1));
        let mut manager = ToolManager::new(2);
        manager.register(Arc::new(graphmind_tools::LlmQueryTool::new(oracle)));
        manager
    }

    fn query_controller(&self, config: ControllerConfig, tools: ToolManager) -> QueryRetrieveController {
        QueryRetrieveController::new(
            Box::new(MemoryStore::new()),
            Arc::new(Oracle::new(self.planning.clone_box(), self.stats.clone(), 1)),
            Arc::new(Oracle::new(self.execution.clone_box(), self.stats.clone(), 1)),
            tools,
            config,
        )
        .unwrap()
    }
}

const INSERT_BOOKS_SCRIPT: &str = r#"
graph.add_node("A1", "Author", #{name: "J.K. Rowling"});
graph.add_node("B1", "Book", #{title: "Harry Potter and the Philosopher's Stone"});
graph.add_node("B2", "Book", #{title: "Harry Potter and the Chamber of Secrets"});
graph.add_edge("A1", "B1", "wrote");
graph.add_edge("A1", "B2", "wrote");
"#;

const RETRIEVE_TITLES_SCRIPT: &str = r#"
let titles = [];
for edge in graph.out_edges("A1") {
    titles.push(graph.node_property(edge.target, "title"));
}
let result = titles;
"#;

const BOOK_LIST: &str =
    "Harry Potter and the Philosopher's Stone, Harry Potter and the Chamber of Secrets";

/// One insert iteration (via llm_query) then a retrieve that lists the
/// books in insertion order.
#[tokio::test]
async fn insert_then_retrieve_produces_the_final_answer() {
    let rig = Rig::new();
    let config = ControllerConfig::default()
        .with_num_next_steps_decision(1)
        .with_max_final_solution_parsing(1);

    // Iteration 1: INSERT.
    rig.planning.push_json(json!({
        "query": "The graph does not contain J.K. Rowling's bibliography yet.",
        "query_type": "INSERT",
    }));
    // Tool selection (execution oracle) and the tool's own reply.
    rig.execution.push_tool_call(
        "llm_query",
        json!({"query": "Which books did J.K. Rowling write?"}),
    );
    rig.tool_model.push_text(
        "J.K. Rowling wrote Harry Potter and the Philosopher's Stone and Harry Potter and the Chamber of Secrets.",
    );
    // Write queries integrating the new information.
    rig.planning.push_json(json!({"queries": [INSERT_BOOKS_SCRIPT]}));
    // Iteration 2: RETRIEVE.
    rig.planning.push_json(json!({
        "query": RETRIEVE_TITLES_SCRIPT,
        "query_type": "RETRIEVE",
    }));
    // Finalization: no math, one parse, then the candidate vote.
    rig.planning.push_json(json!({"need_for_math": false}));
    rig.planning.push_json(json!({"final_solution": BOOK_LIST}));
    rig.planning.push_json(json!({"final_solution": BOOK_LIST}));

    let mut controller = rig.query_controller(config, rig.tools());
    let problem = Problem::new("List books by J.K. Rowling, comma-separated.");
    let (answer, iterations) = controller
        .run(&problem, 0, rig.snapshots.path())
        .await
        .unwrap();

    assert_eq!(answer, BOOK_LIST);
    assert_eq!(iterations, 2);
    assert_eq!(rig.planning.remaining(), 0);
    assert_eq!(rig.execution.remaining(), 0);

    // The parse prompt saw the titles in insertion order.
    let requests = rig.planning.requests();
    let parse_prompt = requests
        .iter()
        .filter_map(|r| match &r.messages[0].content {
            MessageContent::Text(text) => Some(text.clone()),
            MessageContent::Parts(_) => None,
        })
        .find(|text| text.contains("Philosopher"))
        .unwrap();
    let first = parse_prompt.find("Philosopher's Stone").unwrap();
    let second = parse_prompt.find("Chamber of Secrets").unwrap();
    assert!(first < second);

    // One successful write, exactly one snapshot file.
    let run_dirs: Vec<_> = std::fs::read_dir(rig.snapshots.path()).unwrap().collect();
    assert_eq!(run_dirs.len(), 1);
}

/// A malformed write query is repaired once; the snapshot counter
/// advances by exactly one, not two.
#[tokio::test]
async fn failed_write_is_repaired_with_a_single_snapshot() {
    let rig = Rig::new();
    let config = ControllerConfig::default()
        .with_num_next_steps_decision(1)
        .with_max_final_solution_parsing(1);

    rig.planning.push_json(json!({
        "query": "Spider data is missing.",
        "query_type": "INSERT",
    }));
    rig.execution.push_tool_call("llm_query", json!({"query": "spider legs?"}));
    rig.tool_model.push_text("Spiders have 8 legs");
    // Deliberately malformed script, then the repaired version.
    rig.planning
        .push_json(json!({"queries": ["graph.add_node(\"S1\" \"Animal\");"]}));
    rig.planning.push_json(json!({
        "query": "graph.add_node(\"S1\", \"Animal\", #{name: \"Spider\", legs: 8});",
    }));
    // Iteration 2: RETRIEVE the leg count.
    rig.planning.push_json(json!({
        "query": "let result = graph.node_property(\"S1\", \"legs\");",
        "query_type": "RETRIEVE",
    }));
    rig.planning.push_json(json!({"need_for_math": false}));
    rig.planning.push_json(json!({"final_solution": "8"}));
    rig.planning.push_json(json!({"final_solution": "8"}));

    let mut controller = rig.query_controller(config, rig.tools());
    let problem = Problem::new("How many legs does a spider have?");
    let (answer, _) = controller
        .run(&problem, 0, rig.snapshots.path())
        .await
        .unwrap();
    assert_eq!(answer, "8");

    // Find the snapshot_0 run directory and count its files.
    let timestamp_dir = std::fs::read_dir(rig.snapshots.path())
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    let snapshot_dir = timestamp_dir.join("snapshot_0");
    let snapshots: Vec<_> = std::fs::read_dir(&snapshot_dir).unwrap().collect();
    assert_eq!(snapshots.len(), 1, "one write, one snapshot");
}

/// Budget exhaustion with empty retrieves takes the forced-solution
/// path and still returns a non-empty answer.
#[tokio::test]
async fn forced_solution_when_all_retrieves_are_empty() {
    let rig = Rig::new();
    let config = ControllerConfig::default()
        .with_max_iterations(1)
        .with_num_next_steps_decision(1)
        .with_max_retrieve_query_retry(0)
        .with_max_final_solution_parsing(1)
        .with_gaia_formatter(true);

    // The single iteration inserts nothing useful.
    rig.planning.push_json(json!({
        "query": "Nothing in the graph yet.",
        "query_type": "INSERT",
    }));
    rig.execution.push_tool_call("llm_query", json!({"query": "anything?"}));
    rig.tool_model.push_text("no data");
    rig.planning.push_json(json!({"queries": []}));
    // Forced retrieve produces an unsatisfiable (empty) read.
    rig.planning.push_json(json!({"query": "let result = [];"}));
    // Forced solution, then strict parse.
    rig.planning.push_json(json!({"solution": "It is probably 42"}));
    rig.planning.push_json(json!({"final_solution": "42"}));

    let mut controller = rig.query_controller(config, rig.tools());
    let problem = Problem::new("What is the answer?");
    let (answer, iterations) = controller
        .run(&problem, 0, rig.snapshots.path())
        .await
        .unwrap();

    assert_eq!(answer, "42");
    assert!(!answer.trim().is_empty());
    assert_eq!(iterations, 1);
    assert_eq!(rig.planning.remaining(), 0);
}

/// Math post-processing: the partial solution still needs computation,
/// the executor runs once, and the strict formatter gets its output.
#[tokio::test]
async fn math_post_processing_feeds_the_executor_output() {
    let rig = Rig::new();
    let config = ControllerConfig::default()
        .with_num_next_steps_decision(1)
        .with_max_final_solution_parsing(1)
        .with_gaia_formatter(true);

    rig.planning.push_json(json!({
        "query": "let result = \"revenue=68000, expenses=23000\";",
        "query_type": "RETRIEVE",
    }));
    rig.planning.push_json(json!({"need_for_math": true}));
    rig.execution.push_tool_call(
        "run_python_code",
        json!({"code": "print((68000 - 23000) // 1000)"}),
    );
    rig.planning.push_json(json!({"final_solution": "45"}));
    rig.planning.push_json(json!({"final_solution": "45"}));

    let mut tools = rig.tools();
    tools.register(Arc::new(FakeExecutor { output: "45" }));

    let mut controller = rig.query_controller(config, tools);
    let problem = Problem::new(
        "What is the net profit, rounded to thousands? revenue=68000 expenses=23000",
    );
    let (answer, _) = controller
        .run(&problem, 0, rig.snapshots.path())
        .await
        .unwrap();
    assert_eq!(answer, "45");

    // The parse prompt carried the executor output.
    let requests = rig.planning.requests();
    let with_math = requests
        .iter()
        .filter_map(|r| match &r.messages[0].content {
            MessageContent::Text(text) => Some(text.clone()),
            MessageContent::Parts(_) => None,
        })
        .any(|text| text.contains("<math_solution>") && text.contains("45"));
    assert!(with_math);
}

/// An INSERT/RETRIEVE tie goes to the insert branch (strict majority
/// is required for retrieval).
#[tokio::test]
async fn vote_tie_falls_through_to_insert() {
    let rig = Rig::new();
    let config = ControllerConfig::default()
        .with_max_iterations(1)
        .with_num_next_steps_decision(2)
        .with_max_retrieve_query_retry(0)
        .with_max_final_solution_parsing(1);

    // One INSERT vote, one RETRIEVE vote: a tie.
    rig.planning.push_json(json!({
        "query": "More data needed.",
        "query_type": "INSERT",
    }));
    rig.planning.push_json(json!({
        "query": "let result = \"anything\";",
        "query_type": "RETRIEVE",
    }));
    // Tie resolves to the insert branch, so the execution oracle is hit.
    rig.execution.push_tool_call("llm_query", json!({"query": "more data"}));
    rig.tool_model.push_text("some data");
    rig.planning.push_json(json!({"queries": []}));
    // Budget exhausted: two forced retrieves, then finalization.
    rig.planning.push_json(json!({"query": "let result = \"data\";"}));
    rig.planning.push_json(json!({"query": "let result = \"data\";"}));
    rig.planning.push_json(json!({"need_for_math": false}));
    rig.planning.push_json(json!({"final_solution": "data"}));
    rig.planning.push_json(json!({"need_for_math": false}));
    rig.planning.push_json(json!({"final_solution": "data"}));
    rig.planning.push_json(json!({"final_solution": "data"}));

    let mut controller = rig.query_controller(config, rig.tools());
    let problem = Problem::new("Tie-break test");
    let (answer, _) = controller
        .run(&problem, 0, rig.snapshots.path())
        .await
        .unwrap();

    assert_eq!(answer, "data");
    // The insert branch consumed the execution oracle's scripted call.
    assert_eq!(rig.execution.remaining(), 0);
    assert_eq!(rig.planning.remaining(), 0);
}

/// Unknown tools are skipped: no write queries are requested for the
/// missing tool's output and the run still completes.
#[tokio::test]
async fn unknown_tool_skips_the_write_query_step() {
    let rig = Rig::new();
    let config = ControllerConfig::default()
        .with_max_iterations(1)
        .with_num_next_steps_decision(1)
        .with_max_retrieve_query_retry(0)
        .with_max_final_solution_parsing(1);

    rig.planning.push_json(json!({
        "query": "Need data.",
        "query_type": "INSERT",
    }));
    // The oracle picks a tool that is not registered.
    rig.execution.push_tool_call("no_such_tool", json!({"x": 1}));
    // No write-queries call is expected; next is the forced retrieve.
    rig.planning.push_json(json!({"query": "let result = [];"}));
    rig.planning.push_json(json!({"solution": "guess"}));
    rig.planning.push_json(json!({"final_solution": "guess"}));

    let mut controller = rig.query_controller(config, rig.tools());
    let problem = Problem::new("Skip test");
    let (answer, _) = controller
        .run(&problem, 0, rig.snapshots.path())
        .await
        .unwrap();

    assert_eq!(answer, "guess");
    assert_eq!(rig.planning.remaining(), 0);
}

/// The direct controller answers straight from the graph view, no read
/// queries involved.
#[tokio::test]
async fn direct_controller_reads_the_view() {
    let rig = Rig::new();
    let config = ControllerConfig::default()
        .with_num_next_steps_decision(1)
        .with_max_final_solution_parsing(1);

    rig.planning.push_json(json!({
        "query": "the answer is on the view",
        "query_type": "RETRIEVE",
    }));
    // Direct answer from the rendered view.
    rig.planning.push_json(json!({"solution": "Spiders have 8 legs"}));
    rig.planning.push_json(json!({"need_for_math": false}));
    rig.planning.push_json(json!({"final_solution": "8"}));
    rig.planning.push_json(json!({"final_solution": "8"}));

    let mut controller = DirectRetrieveController::new(
        Box::new(MemoryStore::new()),
        Arc::new(Oracle::new(rig.planning.clone_box(), rig.stats.clone(), 1)),
        Arc::new(Oracle::new(rig.execution.clone_box(), rig.stats.clone(), 1)),
        rig.tools(),
        config,
    )
    .unwrap();

    let problem = Problem::new("How many legs does a spider have?");
    let (answer, iterations) = controller
        .run(&problem, 0, rig.snapshots.path())
        .await
        .unwrap();

    assert_eq!(answer, "8");
    assert_eq!(iterations, 1);
    assert_eq!(rig.planning.remaining(), 0);
}
