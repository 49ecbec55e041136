//! Matching engine.
//!
//! Selects the mock for an incoming request and renders the client's active
//! scenario for it.
//!
//! Matching is a linear scan in catalog order and the first accepting mock
//! wins. Url patterns are arbitrary regular expressions rather than
//! prefixes, so an index could not lower the worst case without restricting
//! what a matcher may express.

use crate::catalog::{Mock, MockCatalog};
use crate::error::RenderError;
use crate::state::{ClientId, ClientStateTable};
use crate::template;
use crate::variables::VariableStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, trace};

/// A response ready to be written, with placeholders substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedResponse {
    pub mock: String,
    pub scenario: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub delay_ms: u64,
    pub echo: bool,
}

/// Matching engine over a shared catalog, state table and variable store.
pub struct MatchingEngine {
    catalog: Arc<MockCatalog>,
    states: ClientStateTable,
    variables: VariableStore,
}

impl MatchingEngine {
    pub fn new(catalog: Arc<MockCatalog>, variables: VariableStore) -> Self {
        Self {
            states: ClientStateTable::new(Arc::clone(&catalog)),
            catalog,
            variables,
        }
    }

    pub fn catalog(&self) -> &MockCatalog {
        &self.catalog
    }

    pub fn states(&self) -> &ClientStateTable {
        &self.states
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// First mock in catalog order accepting (method, url), if any.
    pub fn match_request(&self, method: &str, url: &str) -> Option<&Mock> {
        let found = self.catalog.all().iter().find(|mock| mock.matches(method, url));
        trace!(method, url, mock = found.map(Mock::name), "Matched request");
        found
    }

    /// Render the client's active scenario of `mock`.
    pub fn render(&self, mock: &Mock, client: &ClientId) -> Result<RenderedResponse, RenderError> {
        let state = self.states.get_or_init(client, mock.name()).map_err(|_| {
            // The mock is not in this engine's catalog.
            error!(mock = mock.name(), "Rendering a mock unknown to the catalog");
            RenderError::MissingResponseTemplate {
                mock: mock.name().to_string(),
                scenario: mock.default_scenario().to_string(),
            }
        })?;

        let Some(response) = mock.response(&state.scenario) else {
            error!(
                mock = mock.name(),
                scenario = %state.scenario,
                client = %client,
                "Active scenario has no response template"
            );
            return Err(RenderError::MissingResponseTemplate {
                mock: mock.name().to_string(),
                scenario: state.scenario,
            });
        };

        let resolver = self.variables.resolver(client);
        let body = response
            .body
            .as_deref()
            .map(|body| template::render(body, &resolver).into_owned());

        Ok(RenderedResponse {
            mock: mock.name().to_string(),
            scenario: state.scenario,
            status: response.status,
            headers: response.headers.clone(),
            body,
            delay_ms: state.delay,
            echo: state.echo,
        })
    }
}
