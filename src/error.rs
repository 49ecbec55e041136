//! Error types for catalog loading, admin writes and rendering.

use thiserror::Error;

/// Catalog validation failure. Fatal at startup.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("mock #{index}: name cannot be empty")]
    EmptyName { index: usize },

    #[error("mock '{name}' is defined more than once")]
    DuplicateName { name: String },

    #[error("mock '{mock}': no responses defined")]
    NoResponses { mock: String },

    #[error("mock '{mock}': default scenario '{scenario}' is not one of its responses")]
    UnknownDefaultScenario { mock: String, scenario: String },

    #[error("mock '{mock}': no default scenario (set default_scenario or mark one response default)")]
    MissingDefaultScenario { mock: String },

    #[error("mock '{mock}': several responses are marked default: {scenarios:?}")]
    AmbiguousDefaultScenario { mock: String, scenarios: Vec<String> },

    #[error("mock '{mock}': invalid method '{method}'")]
    InvalidMethod { mock: String, method: String },

    #[error("mock '{mock}': invalid url pattern: {source}")]
    InvalidUrlPattern {
        mock: String,
        #[source]
        source: regex::Error,
    },

    #[error("mock '{mock}', scenario '{scenario}': invalid status code {status}")]
    InvalidStatus {
        mock: String,
        scenario: String,
        status: u16,
    },

    #[error("mock '{mock}', scenario '{scenario}': {reason}")]
    UnreadableBody {
        mock: String,
        scenario: String,
        reason: String,
    },

    #[error("mocks '{first}' and '{second}' both match {method} {url}")]
    DuplicateMatcher {
        first: String,
        second: String,
        method: String,
        url: String,
    },
}

/// Rejected admin write. State is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("no mock named '{mock}'")]
    UnknownMock { mock: String },

    #[error("mock '{mock}' has no scenario '{scenario}'")]
    UnknownScenario { mock: String, scenario: String },

    #[error("delay must be non-negative, got {delay_ms}")]
    InvalidDelay { delay_ms: i64 },
}

impl StateError {
    /// Stable identifier of the error kind, for reporting to admin callers.
    pub fn kind(&self) -> &'static str {
        match self {
            StateError::UnknownMock { .. } => "unknown_mock",
            StateError::UnknownScenario { .. } => "unknown_scenario",
            StateError::InvalidDelay { .. } => "invalid_delay",
        }
    }
}

/// Internal failure while rendering a matched mock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The active scenario has no template: the client state table and the
    /// catalog have drifted apart.
    #[error("mock '{mock}' has no response for active scenario '{scenario}'")]
    MissingResponseTemplate { mock: String, scenario: String },
}
