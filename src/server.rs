//! Mock server session manager.
//!
//! [`MockServer`] owns the catalog, client state table and variable store
//! and is the single handle through which request handlers and admin
//! handlers reach them. Share it behind an `Arc`.

use crate::catalog::{Mock, MockCatalog};
use crate::config::{MockServerConfig, RequestMatcher};
use crate::echo::{EchoRecord, EchoSink, IncomingRequest, TracingEchoSink};
use crate::engine::{MatchingEngine, RenderedResponse};
use crate::error::{RenderError, StateError, ValidationError};
use crate::state::{ClientId, MockState, StateUpdate};
use crate::variables::VariableStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Mock server state and request handling.
pub struct MockServer {
    engine: MatchingEngine,
    echo_sink: Arc<dyn EchoSink>,
    log_matches: bool,
    log_unmatched: bool,
    /// Total requests processed.
    requests_total: AtomicU64,
    /// Total requests matched to mocks.
    requests_matched: AtomicU64,
    /// Total requests unmatched.
    requests_unmatched: AtomicU64,
}

/// One mock in the admin listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MockSummary {
    pub name: String,
    pub request: RequestMatcher,
    /// Scenario names
    pub responses: Vec<String>,
}

/// Admin listing: the client's state for every mock plus the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MocksListing {
    pub state: BTreeMap<String, MockState>,
    pub mocks: Vec<MockSummary>,
}

/// Request counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    pub requests_total: u64,
    pub requests_matched: u64,
    pub requests_unmatched: u64,
}

impl MockServer {
    /// Validate the catalog and seed global variables.
    pub fn new(config: MockServerConfig) -> Result<Self, ValidationError> {
        let catalog = MockCatalog::load_with(config.mocks, &config.settings)?;
        let variables = VariableStore::with_globals(config.variables);

        info!(
            mocks = catalog.len(),
            duplicate_matchers = ?config.settings.duplicate_matchers,
            "Mock server initialized"
        );

        Ok(Self {
            engine: MatchingEngine::new(Arc::new(catalog), variables),
            echo_sink: Arc::new(TracingEchoSink),
            log_matches: config.settings.log_matches,
            log_unmatched: config.settings.log_unmatched,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        })
    }

    /// Create from a YAML configuration string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config = MockServerConfig::from_yaml(yaml)?;
        Ok(Self::new(config)?)
    }

    /// Replace the echo sink (defaults to [`TracingEchoSink`]).
    pub fn with_echo_sink(mut self, sink: Arc<dyn EchoSink>) -> Self {
        self.echo_sink = sink;
        self
    }

    pub fn catalog(&self) -> &MockCatalog {
        self.engine.catalog()
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn match_request(&self, method: &str, url: &str) -> Option<&Mock> {
        self.engine.match_request(method, url)
    }

    pub fn render(&self, mock: &Mock, client: &ClientId) -> Result<RenderedResponse, RenderError> {
        self.engine.render(mock, client)
    }

    /// Serve a data-plane request for a client.
    ///
    /// Returns `Ok(None)` when no mock matches. The configured delay is
    /// awaited before returning; dropping the future abandons the response
    /// without touching shared state.
    pub async fn handle(
        &self,
        request: &IncomingRequest,
        client: &ClientId,
    ) -> Result<Option<RenderedResponse>, RenderError> {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let Some(mock) = self.engine.match_request(&request.method, &request.url) else {
            self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
            if self.log_unmatched {
                warn!(
                    client = %client,
                    method = %request.method,
                    url = %request.url,
                    "No matching mock found"
                );
            }
            return Ok(None);
        };

        self.requests_matched.fetch_add(1, Ordering::Relaxed);
        let response = self.engine.render(mock, client)?;

        if self.log_matches {
            info!(
                client = %client,
                mock = mock.name(),
                scenario = %response.scenario,
                method = %request.method,
                url = %request.url,
                "Request matched mock"
            );
        }

        if response.echo {
            self.echo_sink
                .echo(EchoRecord::new(client, mock.name(), request))
                .await;
        }

        if response.delay_ms > 0 {
            debug!(mock = mock.name(), delay_ms = response.delay_ms, "Applying delay");
            tokio::time::sleep(Duration::from_millis(response.delay_ms)).await;
        }

        Ok(Some(response))
    }

    pub fn set_scenario(&self, client: &ClientId, mock: &str, scenario: &str) -> Result<(), StateError> {
        self.engine.states().set_scenario(client, mock, scenario)
    }

    pub fn set_delay(&self, client: &ClientId, mock: &str, delay_ms: i64) -> Result<(), StateError> {
        self.engine.states().set_delay(client, mock, delay_ms)
    }

    pub fn set_echo(&self, client: &ClientId, mock: &str, echo: bool) -> Result<(), StateError> {
        self.engine.states().set_echo(client, mock, echo)
    }

    /// Apply a combined scenario/delay/echo update atomically.
    pub fn update_mock(
        &self,
        client: &ClientId,
        mock: &str,
        update: &StateUpdate,
    ) -> Result<MockState, StateError> {
        self.engine.states().update(client, mock, update)
    }

    /// Reset the client's mock state to catalog defaults.
    pub fn reset(&self, client: &ClientId) {
        self.engine.states().reset(client);
    }

    /// Reset mock state and drop the client's own variables.
    pub fn reset_all(&self, client: &ClientId) {
        self.engine.states().reset(client);
        self.engine.variables().clear_client(client);
        info!(client = %client, "Client state and variables reset");
    }

    pub fn mock_states(&self, client: &ClientId) -> BTreeMap<String, MockState> {
        self.engine.states().snapshot(client)
    }

    /// Effective variables for a client.
    pub fn variables(&self, client: &ClientId) -> BTreeMap<String, String> {
        self.engine.variables().snapshot(client)
    }

    pub fn resolve_variable(&self, client: &ClientId, name: &str) -> Option<String> {
        self.engine.variables().resolve(client, name)
    }

    /// Set a variable for one client, or globally when `client` is `None`.
    pub fn set_variable(&self, client: Option<&ClientId>, name: &str, value: &str) {
        match client {
            Some(client) => self.engine.variables().set_for_client(client, name, value),
            None => self.engine.variables().set_global(name, value),
        }
    }

    /// Delete a variable for one client, or globally when `client` is `None`.
    /// Deleting an absent variable is a no-op.
    pub fn delete_variable(&self, client: Option<&ClientId>, name: &str) {
        match client {
            Some(client) => self.engine.variables().delete_for_client(client, name),
            None => self.engine.variables().delete_global(name),
        }
    }

    /// Admin listing of the catalog and the client's state.
    pub fn list_mocks(&self, client: &ClientId) -> MocksListing {
        let mocks = self
            .catalog()
            .all()
            .iter()
            .map(|mock| MockSummary {
                name: mock.name().to_string(),
                request: mock.request().clone(),
                responses: mock.responses().keys().cloned().collect(),
            })
            .collect();

        MocksListing {
            state: self.mock_states(client),
            mocks,
        }
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_matched: self.requests_matched.load(Ordering::Relaxed),
            requests_unmatched: self.requests_unmatched.load(Ordering::Relaxed),
        }
    }
}
