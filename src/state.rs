//! Per-client mock state.
//!
//! Each client id owns an independent map of mock name to [`MockState`].
//! States are seeded lazily from catalog defaults on first access. The
//! table is sharded by client id, so clients never wait on each other
//! beyond shard collisions, and every write to one client's state happens
//! under that client's shard lock.

use crate::catalog::{Mock, MockCatalog};
use crate::error::StateError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Opaque identifier of one test session (the `ngApimockId`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// State of one mock as seen by one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockState {
    /// Always a key of the owning mock's responses
    pub scenario: String,
    pub delay: u64,
    pub echo: bool,
}

impl MockState {
    /// Catalog defaults for a mock.
    pub fn defaults(mock: &Mock) -> Self {
        Self {
            scenario: mock.default_scenario().to_string(),
            delay: mock.default_delay_ms(),
            echo: mock.default_echo(),
        }
    }
}

/// Client state table.
pub struct ClientStateTable {
    catalog: Arc<MockCatalog>,
    clients: DashMap<ClientId, HashMap<String, MockState>>,
}

impl ClientStateTable {
    pub fn new(catalog: Arc<MockCatalog>) -> Self {
        Self {
            catalog,
            clients: DashMap::new(),
        }
    }

    /// Get the client's state for a mock, seeding it from catalog defaults
    /// if absent. Concurrent first access creates exactly one state.
    pub fn get_or_init(&self, client: &ClientId, mock_name: &str) -> Result<MockState, StateError> {
        let mock = self.mock(mock_name)?;
        Ok(self.with_state(client, mock, |state| state.clone()))
    }

    /// Select the active scenario.
    pub fn set_scenario(
        &self,
        client: &ClientId,
        mock_name: &str,
        scenario: &str,
    ) -> Result<(), StateError> {
        let mock = self.mock(mock_name)?;
        if !mock.has_scenario(scenario) {
            return Err(StateError::UnknownScenario {
                mock: mock_name.to_string(),
                scenario: scenario.to_string(),
            });
        }
        self.with_state(client, mock, |state| state.scenario = scenario.to_string());
        debug!(client = %client, mock = mock_name, scenario, "Scenario selected");
        Ok(())
    }

    /// Override the response delay. Negative delays are rejected.
    pub fn set_delay(&self, client: &ClientId, mock_name: &str, delay_ms: i64) -> Result<(), StateError> {
        let mock = self.mock(mock_name)?;
        let delay = u64::try_from(delay_ms).map_err(|_| StateError::InvalidDelay { delay_ms })?;
        self.with_state(client, mock, |state| state.delay = delay);
        debug!(client = %client, mock = mock_name, delay, "Delay set");
        Ok(())
    }

    /// Toggle request echoing.
    pub fn set_echo(&self, client: &ClientId, mock_name: &str, echo: bool) -> Result<(), StateError> {
        let mock = self.mock(mock_name)?;
        self.with_state(client, mock, |state| state.echo = echo);
        debug!(client = %client, mock = mock_name, echo, "Echo set");
        Ok(())
    }

    /// Apply several changes to one state as a single atomic update.
    /// Nothing is written if the scenario or delay is invalid.
    pub fn update(
        &self,
        client: &ClientId,
        mock_name: &str,
        update: &StateUpdate,
    ) -> Result<MockState, StateError> {
        let mock = self.mock(mock_name)?;
        if let Some(scenario) = &update.scenario {
            if !mock.has_scenario(scenario) {
                return Err(StateError::UnknownScenario {
                    mock: mock_name.to_string(),
                    scenario: scenario.clone(),
                });
            }
        }
        let delay = update
            .delay
            .map(|delay_ms| u64::try_from(delay_ms).map_err(|_| StateError::InvalidDelay { delay_ms }))
            .transpose()?;

        Ok(self.with_state(client, mock, |state| {
            if let Some(scenario) = &update.scenario {
                state.scenario = scenario.clone();
            }
            if let Some(delay) = delay {
                state.delay = delay;
            }
            if let Some(echo) = update.echo {
                state.echo = echo;
            }
            state.clone()
        }))
    }

    /// Drop all state for a client; the next access re-seeds from defaults.
    pub fn reset(&self, client: &ClientId) {
        self.clients.remove(client);
        debug!(client = %client, "Client mock state reset");
    }

    /// Effective state of every catalog mock for a client. Mocks the client
    /// has not touched report their catalog defaults. Nothing is inserted.
    pub fn snapshot(&self, client: &ClientId) -> BTreeMap<String, MockState> {
        let stored = self.clients.get(client);
        self.catalog
            .all()
            .iter()
            .map(|mock| {
                let state = stored
                    .as_ref()
                    .and_then(|states| states.value().get(mock.name()).cloned())
                    .unwrap_or_else(|| MockState::defaults(mock));
                (mock.name().to_string(), state)
            })
            .collect()
    }

    /// Number of clients with stored state.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn mock(&self, name: &str) -> Result<&Mock, StateError> {
        self.catalog.find(name).ok_or_else(|| StateError::UnknownMock {
            mock: name.to_string(),
        })
    }

    /// Run `f` on the client's state for `mock` while holding the client's
    /// shard write lock.
    fn with_state<R>(&self, client: &ClientId, mock: &Mock, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut states = self.clients.entry(client.clone()).or_default();
        let state = states
            .entry(mock.name().to_string())
            .or_insert_with(|| MockState::defaults(mock));
        f(state)
    }
}

/// Partial update of a [`MockState`]; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub delay: Option<i64>,
    #[serde(default)]
    pub echo: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::make_mock;

    fn table() -> ClientStateTable {
        let mut slow = make_mock("slow", "GET", "^/slow$");
        slow.delay = 250;
        slow.echo = true;
        let catalog = MockCatalog::load(vec![make_mock("greet", "GET", "^/greet$"), slow]).unwrap();
        ClientStateTable::new(Arc::new(catalog))
    }

    #[test]
    fn test_default_seeding() {
        let table = table();
        let client = ClientId::from("fresh");

        let state = table.get_or_init(&client, "slow").unwrap();
        assert_eq!(
            state,
            MockState {
                scenario: "default".to_string(),
                delay: 250,
                echo: true,
            }
        );
        assert_eq!(table.client_count(), 1);
    }

    #[test]
    fn test_unknown_mock() {
        let table = table();
        let err = table.get_or_init(&ClientId::from("c"), "nope").unwrap_err();
        assert_eq!(err.kind(), "unknown_mock");
        assert_eq!(table.client_count(), 0);
    }

    #[test]
    fn test_isolation_between_clients() {
        let table = table();
        let a = ClientId::from("a");
        let b = ClientId::from("b");

        let before = table.get_or_init(&b, "greet").unwrap();
        table.set_scenario(&a, "greet", "error").unwrap();
        table.set_delay(&a, "greet", 1000).unwrap();
        table.set_echo(&a, "greet", true).unwrap();

        assert_eq!(table.get_or_init(&a, "greet").unwrap().scenario, "error");
        assert_eq!(table.get_or_init(&b, "greet").unwrap(), before);
    }

    #[test]
    fn test_unknown_scenario_leaves_state() {
        let table = table();
        let client = ClientId::from("c");
        table.set_scenario(&client, "greet", "error").unwrap();

        let err = table.set_scenario(&client, "greet", "nonexistent").unwrap_err();
        assert_eq!(
            err,
            StateError::UnknownScenario {
                mock: "greet".to_string(),
                scenario: "nonexistent".to_string(),
            }
        );
        assert_eq!(table.get_or_init(&client, "greet").unwrap().scenario, "error");
    }

    #[test]
    fn test_invalid_delay() {
        let table = table();
        let client = ClientId::from("c");

        let err = table.set_delay(&client, "slow", -1).unwrap_err();
        assert_eq!(err, StateError::InvalidDelay { delay_ms: -1 });
        assert_eq!(table.get_or_init(&client, "slow").unwrap().delay, 250);

        table.set_delay(&client, "slow", 0).unwrap();
        assert_eq!(table.get_or_init(&client, "slow").unwrap().delay, 0);
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let table = table();
        let client = ClientId::from("c");

        let err = table
            .update(
                &client,
                "greet",
                &StateUpdate {
                    scenario: Some("error".to_string()),
                    delay: Some(-10),
                    echo: Some(true),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_delay");
        assert_eq!(
            table.get_or_init(&client, "greet").unwrap(),
            MockState {
                scenario: "default".to_string(),
                delay: 0,
                echo: false,
            }
        );

        let state = table
            .update(
                &client,
                "greet",
                &StateUpdate {
                    scenario: Some("error".to_string()),
                    delay: Some(10),
                    echo: None,
                },
            )
            .unwrap();
        assert_eq!(state.scenario, "error");
        assert_eq!(state.delay, 10);
        assert!(!state.echo);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let table = table();
        let client = ClientId::from("c");
        let defaults = table.snapshot(&client);

        table.set_scenario(&client, "greet", "error").unwrap();
        table.set_delay(&client, "slow", 5).unwrap();
        assert_ne!(table.snapshot(&client), defaults);

        table.reset(&client);
        assert_eq!(table.snapshot(&client), defaults);
        assert_eq!(table.get_or_init(&client, "greet").unwrap().scenario, "default");
    }

    #[test]
    fn test_snapshot_does_not_insert() {
        let table = table();
        let snapshot = table.snapshot(&ClientId::from("observer"));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["slow"].delay, 250);
        assert_eq!(table.client_count(), 0);
    }

    #[test]
    fn test_concurrent_first_access() {
        let table = Arc::new(table());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    table.get_or_init(&ClientId::from("racer"), "slow").unwrap()
                })
            })
            .collect();
        let states: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(states.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(table.client_count(), 1);
        assert_eq!(table.snapshot(&ClientId::from("racer"))["slow"], states[0]);
    }

    #[test]
    fn test_concurrent_writes_do_not_tear() {
        let table = Arc::new(table());
        let client = ClientId::from("shared");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                let client = client.clone();
                std::thread::spawn(move || {
                    for n in 0..200 {
                        let (scenario, delay) = if (i + n) % 2 == 0 {
                            ("default", 100)
                        } else {
                            ("error", 500)
                        };
                        table
                            .update(
                                &client,
                                "greet",
                                &StateUpdate {
                                    scenario: Some(scenario.to_string()),
                                    delay: Some(delay),
                                    echo: None,
                                },
                            )
                            .unwrap();
                        table.set_echo(&client, "greet", n % 3 == 0).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state = table.get_or_init(&client, "greet").unwrap();
        match state.scenario.as_str() {
            "default" => assert_eq!(state.delay, 100),
            "error" => assert_eq!(state.delay, 500),
            other => panic!("Unexpected scenario {other}"),
        }
        assert_eq!(table.client_count(), 1);
    }
}
