//! Triple-store backend over SPARQL HTTP endpoints.
//!
//! Data is modeled as subject-predicate-object triples behind two
//! endpoints: reads GET the query endpoint and return the result XML as
//! text; writes POST an update to the statements endpoint. Clear-all is
//! a delete-where-any-triple; rendering and snapshots serialize a
//! construct-all-triples query.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use graphmind_core::Dialect;
use serde_json::Value;

use crate::snapshot::SnapshotDir;
use crate::{GraphStore, QueryOutcome, StoreError, WriteOutcome};

const CONSTRUCT_ALL: &str = "CONSTRUCT { ?s ?p ?o . } WHERE { ?s ?p ?o . }";
const DELETE_ALL: &str = "DELETE WHERE { ?s ?p ?o . }";
const PROBE: &str = "ASK { ?s ?p ?o }";

/// SPARQL-over-HTTP triple store.
pub struct SparqlStore {
    client: Client,
    read_endpoint: String,
    write_endpoint: String,
    snapshots: SnapshotDir,
}

impl SparqlStore {
    /// Connect to the two endpoints and probe the read side with an ASK
    /// query. A failed probe is fatal.
    pub async fn connect(read_endpoint: &str, write_endpoint: &str) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        let store = Self {
            client,
            read_endpoint: read_endpoint.to_string(),
            write_endpoint: write_endpoint.to_string(),
            snapshots: SnapshotDir::new(),
        };

        store.test_connection().await?;
        info!(read_endpoint, write_endpoint, "Connected to triple store");
        Ok(store)
    }

    async fn test_connection(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(&self.read_endpoint)
            .query(&[("query", PROBE)])
            .header("Accept", "application/sparql-results+json")
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Unreachable(format!(
                "endpoint probe returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        if body.get("boolean").is_none() {
            return Err(StoreError::Unreachable(
                "invalid response to ASK probe".to_string(),
            ));
        }
        Ok(())
    }

    /// Run a read query, returning the response body as text.
    async fn query_xml(&self, text: &str, accept: &str) -> Result<QueryOutcome, StoreError> {
        let response = self
            .client
            .get(&self.read_endpoint)
            .query(&[("query", text)])
            .header("Accept", accept)
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        if status.is_success() {
            Ok(QueryOutcome::ok(Value::String(body)))
        } else if status.is_server_error() {
            Err(StoreError::Unreachable(format!("{status}: {body}")))
        } else {
            warn!(%status, "Read query rejected");
            Ok(QueryOutcome::failed(format!("{status}: {body}")))
        }
    }

    async fn update(&self, text: &str) -> Result<WriteOutcome, StoreError> {
        let response = self
            .client
            .post(&self.write_endpoint)
            .form(&[("update", text)])
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(WriteOutcome::ok());
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(StoreError::Unreachable(format!("{status}: {body}")))
        } else {
            warn!(%status, "Update query rejected");
            Ok(WriteOutcome::failed(format!("{status}: {body}")))
        }
    }

    /// Serialize all triples to the next numbered XML snapshot.
    async fn export_snapshot(&mut self) -> Result<(), StoreError> {
        let Some(path) = self.snapshots.next_file("xml") else {
            return Ok(());
        };

        let outcome = self.query_xml(CONSTRUCT_ALL, "application/rdf+xml").await?;
        let xml = outcome
            .payload
            .as_str()
            .unwrap_or_default()
            .to_string();

        std::fs::write(&path, xml)?;
        info!(file = %path.display(), "Exported graph snapshot");
        Ok(())
    }
}

#[async_trait]
impl GraphStore for SparqlStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sparql
    }

    async fn init(&mut self, run_index: usize, snapshot_parent: &Path) -> Result<(), StoreError> {
        let outcome = self.update(DELETE_ALL).await?;
        if !outcome.success {
            return Err(StoreError::Unreachable(
                outcome.error.unwrap_or_else(|| "clear-all rejected".to_string()),
            ));
        }
        info!("Deleted all triples");

        self.snapshots.rotate(run_index, snapshot_parent)?;
        Ok(())
    }

    async fn render(&self) -> Result<String, StoreError> {
        let outcome = self.query_xml(CONSTRUCT_ALL, "application/rdf+xml").await?;
        let body = outcome.payload.as_str().unwrap_or_default();
        Ok(format!(
            "This is the current state of the RDF graph database:\n{body}"
        ))
    }

    async fn read(&self, text: &str) -> Result<QueryOutcome, StoreError> {
        if text.trim().is_empty() {
            return Ok(QueryOutcome::failed("query to execute is empty"));
        }
        self.query_xml(text, "application/sparql-results+xml").await
    }

    async fn write(&mut self, text: &str) -> Result<WriteOutcome, StoreError> {
        if text.trim().is_empty() {
            return Ok(WriteOutcome::failed("query to execute is empty"));
        }

        let outcome = self.update(text).await?;
        if outcome.success {
            self.export_snapshot().await?;
        }
        Ok(outcome)
    }
}
