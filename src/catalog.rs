//! Mock catalog.
//!
//! Immutable set of validated mocks, in definition order. Built once at
//! startup and shared read-only by every client.

use crate::config::{DuplicateMatchers, GlobalSettings, MockDefinition, RequestMatcher};
use crate::error::ValidationError;
use crate::matcher::{is_valid_method, CompiledMatcher};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// A candidate response with its body still holding placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseTemplate {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

/// A validated mock.
#[derive(Debug, Clone)]
pub struct Mock {
    name: String,
    request: RequestMatcher,
    matcher: CompiledMatcher,
    responses: BTreeMap<String, ResponseTemplate>,
    default_scenario: String,
    default_delay_ms: u64,
    default_echo: bool,
}

impl Mock {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request matcher as defined.
    pub fn request(&self) -> &RequestMatcher {
        &self.request
    }

    pub fn responses(&self) -> &BTreeMap<String, ResponseTemplate> {
        &self.responses
    }

    pub fn response(&self, scenario: &str) -> Option<&ResponseTemplate> {
        self.responses.get(scenario)
    }

    pub fn has_scenario(&self, scenario: &str) -> bool {
        self.responses.contains_key(scenario)
    }

    pub fn default_scenario(&self) -> &str {
        &self.default_scenario
    }

    pub fn default_delay_ms(&self) -> u64 {
        self.default_delay_ms
    }

    pub fn default_echo(&self) -> bool {
        self.default_echo
    }

    /// Whether this mock accepts the request.
    pub fn matches(&self, method: &str, url: &str) -> bool {
        self.matcher.matches(method, url)
    }

    fn from_definition(
        index: usize,
        def: MockDefinition,
        settings: &GlobalSettings,
    ) -> Result<Self, ValidationError> {
        if def.name.trim().is_empty() {
            return Err(ValidationError::EmptyName { index });
        }
        let name = def.name;

        if !is_valid_method(&def.request.method) {
            return Err(ValidationError::InvalidMethod {
                mock: name,
                method: def.request.method,
            });
        }
        let matcher = CompiledMatcher::compile(&def.request).map_err(|source| {
            ValidationError::InvalidUrlPattern {
                mock: name.clone(),
                source,
            }
        })?;

        if def.responses.is_empty() {
            return Err(ValidationError::NoResponses { mock: name });
        }

        let default_scenario = match def.default_scenario {
            Some(scenario) => {
                if !def.responses.contains_key(&scenario) {
                    return Err(ValidationError::UnknownDefaultScenario {
                        mock: name,
                        scenario,
                    });
                }
                scenario
            }
            None => {
                let marked: Vec<String> = def
                    .responses
                    .iter()
                    .filter(|(_, r)| r.default)
                    .map(|(scenario, _)| scenario.clone())
                    .collect();
                match marked.len() {
                    0 => return Err(ValidationError::MissingDefaultScenario { mock: name }),
                    1 => marked.into_iter().next().unwrap_or_default(),
                    _ => {
                        return Err(ValidationError::AmbiguousDefaultScenario {
                            mock: name,
                            scenarios: marked,
                        })
                    }
                }
            }
        };

        let mut responses = BTreeMap::new();
        for (scenario, response) in def.responses {
            if !(100..=599).contains(&response.status) {
                return Err(ValidationError::InvalidStatus {
                    mock: name,
                    scenario,
                    status: response.status,
                });
            }

            let body = match &response.body {
                Some(body) => Some(body.to_template().map_err(|e| {
                    ValidationError::UnreadableBody {
                        mock: name.clone(),
                        scenario: scenario.clone(),
                        reason: format!("{:#}", e),
                    }
                })?),
                None => None,
            };

            let mut headers: BTreeMap<String, String> = response.headers.into_iter().collect();
            let has_content_type = headers.keys().any(|k| k.eq_ignore_ascii_case("content-type"));
            if !has_content_type {
                let content_type = response
                    .body
                    .as_ref()
                    .and_then(|b| b.content_type())
                    .map(str::to_string)
                    .unwrap_or_else(|| settings.default_content_type.clone());
                headers.insert("Content-Type".to_string(), content_type);
            }

            responses.insert(
                scenario,
                ResponseTemplate {
                    status: response.status,
                    headers,
                    body,
                },
            );
        }

        Ok(Self {
            name,
            request: def.request,
            matcher,
            responses,
            default_scenario,
            default_delay_ms: def.delay,
            default_echo: def.echo,
        })
    }
}

/// Validated, ordered collection of mocks.
#[derive(Debug, Clone, Default)]
pub struct MockCatalog {
    mocks: Vec<Mock>,
    by_name: HashMap<String, usize>,
}

impl MockCatalog {
    /// Validate and load definitions with default settings.
    pub fn load(
        definitions: impl IntoIterator<Item = MockDefinition>,
    ) -> Result<Self, ValidationError> {
        Self::load_with(definitions, &GlobalSettings::default())
    }

    /// Validate and load definitions.
    ///
    /// Fails if any mock is invalid, two mocks share a name, or two mocks
    /// declare an identical (method, url) matcher while
    /// `settings.duplicate_matchers` is `reject`.
    pub fn load_with(
        definitions: impl IntoIterator<Item = MockDefinition>,
        settings: &GlobalSettings,
    ) -> Result<Self, ValidationError> {
        let mut mocks: Vec<Mock> = Vec::new();
        let mut by_name = HashMap::new();
        let mut by_matcher: HashMap<(String, String), usize> = HashMap::new();

        for (index, def) in definitions.into_iter().enumerate() {
            let mock = Mock::from_definition(index, def, settings)?;

            if by_name.contains_key(&mock.name) {
                return Err(ValidationError::DuplicateName { name: mock.name });
            }

            let key = (
                mock.matcher.method().to_string(),
                mock.matcher.url_pattern().to_string(),
            );
            if let Some(&earlier) = by_matcher.get(&key) {
                if settings.duplicate_matchers == DuplicateMatchers::Reject {
                    return Err(ValidationError::DuplicateMatcher {
                        first: mocks[earlier].name.clone(),
                        second: mock.name,
                        method: key.0,
                        url: key.1,
                    });
                }
            } else {
                by_matcher.insert(key, mocks.len());
            }

            by_name.insert(mock.name.clone(), mocks.len());
            mocks.push(mock);
        }

        info!(mocks = mocks.len(), "Mock catalog loaded");

        Ok(Self { mocks, by_name })
    }

    /// Look up a mock by name.
    pub fn find(&self, name: &str) -> Option<&Mock> {
        self.by_name.get(name).map(|&i| &self.mocks[i])
    }

    /// All mocks in definition order.
    pub fn all(&self) -> &[Mock] {
        &self.mocks
    }

    pub fn len(&self) -> usize {
        self.mocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mocks.is_empty()
    }
}
