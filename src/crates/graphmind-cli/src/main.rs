//! # graphmind-cli
//!
//! Solve natural-language problems by iteratively building and querying
//! a knowledge graph.
//!
//! Backend endpoints come from the environment (a `.env` file is loaded
//! when present): `NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASSWORD`,
//! `PYTHON_EXECUTOR_URI`, `RDF4J_READ_URI`, `RDF4J_WRITE_URI`,
//! `SEARCH_API_KEY`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::builder::TypedValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use graphmind_controller::{
    Controller, ControllerConfig, DirectRetrieveController, QueryRetrieveController,
};
use graphmind_core::{Problem, UsageStatistics};
use graphmind_store::{CypherStore, GraphStore, MemoryStore, SparqlStore};
use graphmind_tools::ToolManager;
use llm::{ModelCatalog, Oracle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DbChoice {
    /// Labeled-property graph over bolt.
    Labeled,
    /// In-memory directed multigraph (no external service).
    InMemory,
    /// SPARQL triple store over HTTP.
    Triple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ControllerChoice {
    /// Answer directly from the rendered graph view.
    Direct,
    /// Answer by generating read queries over the graph.
    QueryRetrieve,
}

#[derive(Parser)]
#[command(name = "graphmind")]
#[command(about = "Integrates LLM reasoning with dynamically constructed knowledge graphs.")]
#[command(version)]
struct Cli {
    /// Maximum number of iterations to run.
    #[arg(short, long, default_value_t = 7)]
    iterations: u32,

    /// Subfolder path to store snapshots.
    #[arg(
        short,
        long,
        default_value = "",
        value_parser = clap::builder::OsStringValueParser::new().map(PathBuf::from)
    )]
    snapshots: PathBuf,

    /// Path to the LLM configuration file.
    #[arg(long = "config_llm_path", default_value = "config_llms.json")]
    config_llm_path: PathBuf,

    /// Path to store LLM usage statistics.
    #[arg(long = "statistics_file", default_value = "llm_cost.json")]
    statistics_file: PathBuf,

    /// Number of next-step decision votes.
    #[arg(long = "num_next_steps_decision", default_value_t = 5)]
    num_next_steps_decision: u32,

    /// Maximum number of retries for a retrieve query.
    #[arg(long = "max_retrieve_query_retry", default_value_t = 3)]
    max_retrieve_query_retry: u32,

    /// Maximum number of retries for query fixing.
    #[arg(long = "max_query_fixing_retry", default_value_t = 3)]
    max_query_fixing_retry: u32,

    /// Maximum number of retries for final solution parsing.
    #[arg(long = "max_final_solution_parsing", default_value_t = 3)]
    max_final_solution_parsing: u32,

    /// Maximum number of retries for tools.
    #[arg(long = "max_tool_retries", default_value_t = 6)]
    max_tool_retries: u32,

    /// Maximum number of retries for the LLM.
    #[arg(long = "max_llm_retries", default_value_t = 6)]
    max_llm_retries: u32,

    /// LLM model used for the controller.
    #[arg(long = "llm-plan", default_value = "gpt-4o-mini")]
    llm_plan: String,

    /// Temperature for the controller LLM model.
    #[arg(long = "llm-plan-temp", default_value_t = 0.0)]
    llm_plan_temp: f32,

    /// LLM model used for tool execution calls.
    #[arg(long = "llm-exec", default_value = "gpt-4o-mini")]
    llm_exec: String,

    /// Temperature for the tool execution LLM model.
    #[arg(long = "llm-exec-temp", default_value_t = 0.0)]
    llm_exec_temp: f32,

    /// Controller choice for the agent.
    #[arg(long = "controller_choice", value_enum, default_value_t = ControllerChoice::QueryRetrieve)]
    controller_choice: ControllerChoice,

    /// Database choice for the agent.
    #[arg(long = "db_choice", value_enum, default_value_t = DbChoice::Labeled)]
    db_choice: DbChoice,

    /// Tool choice for the agent.
    #[arg(long = "tool_choice", default_value = "standard")]
    tool_choice: String,

    /// Use the strict benchmark-compatible final formatter: numeric,
    /// list or string output without surrounding text.
    #[arg(long = "gaia_formatter")]
    gaia_formatter: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a single problem given a statement and optional files.
    Single {
        /// The problem statement to solve.
        #[arg(short, long)]
        problem: String,

        /// List of file paths associated with the problem.
        #[arg(long, num_args = 0..)]
        files: Vec<PathBuf>,
    },
}

struct Endpoints {
    neo4j_uri: String,
    neo4j_user: String,
    neo4j_password: String,
    python_executor_uri: String,
    rdf4j_read_uri: String,
    rdf4j_write_uri: String,
    search_api_key: Option<String>,
}

impl Endpoints {
    fn from_env() -> Self {
        let get = |key: &str, default: &str| {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        Self {
            neo4j_uri: get("NEO4J_URI", "bolt://localhost:7687"),
            neo4j_user: get("NEO4J_USER", "neo4j"),
            neo4j_password: get("NEO4J_PASSWORD", "password"),
            python_executor_uri: get("PYTHON_EXECUTOR_URI", "http://localhost:16000/run"),
            rdf4j_read_uri: get(
                "RDF4J_READ_URI",
                "http://localhost:8080/rdf4j-server/repositories/graphmind",
            ),
            rdf4j_write_uri: get(
                "RDF4J_WRITE_URI",
                "http://localhost:8080/rdf4j-server/repositories/graphmind/statements",
            ),
            search_api_key: std::env::var("SEARCH_API_KEY").ok(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Commands::Single { problem, files } = &cli.command;

    if cli.db_choice == DbChoice::Triple && cli.controller_choice == ControllerChoice::Direct {
        anyhow::bail!("direct retrieve over the triple store is not supported");
    }
    if cli.tool_choice != "standard" {
        anyhow::bail!("unknown tool choice '{}'", cli.tool_choice);
    }
    for file in files {
        if !file.is_file() {
            anyhow::bail!("file '{}' does not exist", file.display());
        }
    }

    let endpoints = Endpoints::from_env();
    let stats = UsageStatistics::new(&cli.statistics_file)?;
    let catalog = ModelCatalog::load(&cli.config_llm_path)?;

    let planning = Arc::new(Oracle::new(
        catalog.client(&cli.llm_plan, Some(cli.llm_plan_temp))?,
        stats.clone(),
        cli.max_llm_retries,
    ));
    let execution = Arc::new(Oracle::new(
        catalog.client(&cli.llm_exec, Some(cli.llm_exec_temp))?,
        stats.clone(),
        cli.max_llm_retries,
    ));

    let store: Box<dyn GraphStore> = match cli.db_choice {
        DbChoice::Labeled => Box::new(
            CypherStore::connect(
                &endpoints.neo4j_uri,
                &endpoints.neo4j_user,
                &endpoints.neo4j_password,
            )
            .await?,
        ),
        DbChoice::InMemory => Box::new(MemoryStore::new()),
        DbChoice::Triple => Box::new(
            SparqlStore::connect(&endpoints.rdf4j_read_uri, &endpoints.rdf4j_write_uri).await?,
        ),
    };

    let tools = ToolManager::with_standard_tools(
        cli.max_tool_retries,
        execution.clone(),
        &endpoints.python_executor_uri,
        endpoints.search_api_key.clone(),
    )
    .await
    .map_err(|e| anyhow::anyhow!("tool setup failed: {e}"))?;

    let config = ControllerConfig {
        max_iterations: cli.iterations,
        num_next_steps_decision: cli.num_next_steps_decision,
        max_retrieve_query_retry: cli.max_retrieve_query_retry,
        max_query_fixing_retry: cli.max_query_fixing_retry,
        max_final_solution_parsing: cli.max_final_solution_parsing,
        max_tool_retries: cli.max_tool_retries,
        max_llm_retries: cli.max_llm_retries,
        gaia_formatter: cli.gaia_formatter,
    };

    let mut controller: Box<dyn Controller> = match cli.controller_choice {
        ControllerChoice::QueryRetrieve => Box::new(QueryRetrieveController::new(
            store, planning, execution, tools, config,
        )?),
        ControllerChoice::Direct => Box::new(DirectRetrieveController::new(
            store, planning, execution, tools, config,
        )?),
    };

    let problem = Problem::new(problem.clone()).with_attachment_paths(files.clone());
    let (solution, iterations) = controller.run(&problem, 0, &cli.snapshots).await?;

    println!("Solution: {solution}");
    println!("Iterations taken: {iterations}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_subcommand_parses_with_defaults() {
        let cli = Cli::parse_from(["graphmind", "single", "-p", "How many legs does a spider have?"]);
        assert_eq!(cli.iterations, 7);
        assert_eq!(cli.num_next_steps_decision, 5);
        assert_eq!(cli.db_choice, DbChoice::Labeled);
        assert_eq!(cli.controller_choice, ControllerChoice::QueryRetrieve);
        assert!(!cli.gaia_formatter);

        let Commands::Single { problem, files } = cli.command;
        assert!(problem.contains("spider"));
        assert!(files.is_empty());
    }

    #[test]
    fn value_enums_use_kebab_case_names() {
        let cli = Cli::parse_from([
            "graphmind",
            "--db_choice",
            "in-memory",
            "--controller_choice",
            "direct",
            "single",
            "-p",
            "x",
        ]);
        assert_eq!(cli.db_choice, DbChoice::InMemory);
        assert_eq!(cli.controller_choice, ControllerChoice::Direct);
    }

    #[test]
    fn retry_maxima_are_flags() {
        let cli = Cli::parse_from([
            "graphmind",
            "--max_retrieve_query_retry",
            "1",
            "--max_query_fixing_retry",
            "2",
            "--max_final_solution_parsing",
            "4",
            "--max_tool_retries",
            "5",
            "--max_llm_retries",
            "9",
            "single",
            "-p",
            "x",
        ]);
        assert_eq!(cli.max_retrieve_query_retry, 1);
        assert_eq!(cli.max_query_fixing_retry, 2);
        assert_eq!(cli.max_final_solution_parsing, 4);
        assert_eq!(cli.max_tool_retries, 5);
        assert_eq!(cli.max_llm_retries, 9);
    }

    #[test]
    fn files_flag_accepts_multiple_paths() {
        let cli = Cli::parse_from([
            "graphmind", "single", "-p", "x", "--files", "a.pdf", "b.zip",
        ]);
        let Commands::Single { files, .. } = cli.command;
        assert_eq!(files.len(), 2);
    }
}
