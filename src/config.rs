//! Configuration for the mock state engine.
//!
//! Defines mock definitions, their candidate responses, global variables
//! and engine settings.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Main configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MockServerConfig {
    /// Mock definitions, in matching order
    #[serde(default)]
    pub mocks: Vec<MockDefinition>,

    /// Global variables seeded at startup
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl MockServerConfig {
    /// Load configuration from a YAML or JSON file.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as YAML.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = if has_extension(path, &["json"]) {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?
        };
        Ok(config)
    }

    /// Load a mocks directory: one mock definition per `*.json`, `*.yaml`
    /// or `*.yml` file, ordered by file name.
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read mocks directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && has_extension(&path, &["json", "yaml", "yml"]) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut mocks = Vec::with_capacity(paths.len());
        for path in &paths {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read mock file {}", path.display()))?;
            let mock: MockDefinition = if has_extension(path, &["json"]) {
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid mock in {}", path.display()))?
            } else {
                serde_yaml::from_str(&content)
                    .with_context(|| format!("Invalid mock in {}", path.display()))?
            };
            mocks.push(mock);
        }

        Ok(Self {
            mocks,
            ..Self::default()
        })
    }

    /// Load from a file or a mocks directory.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::from_file(path)
        }
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// A single mock definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockDefinition {
    /// Unique name of this mock
    pub name: String,

    /// Request matcher
    pub request: RequestMatcher,

    /// Candidate responses keyed by scenario name
    pub responses: BTreeMap<String, ResponseDefinition>,

    /// Scenario selected for a fresh client
    #[serde(default)]
    pub default_scenario: Option<String>,

    /// Default response delay in milliseconds
    #[serde(default)]
    pub delay: u64,

    /// Whether requests are echoed by default
    #[serde(default)]
    pub echo: bool,
}

/// Request matching configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestMatcher {
    /// HTTP method to match
    pub method: String,

    /// Regular expression matched against the request URL
    pub url: String,
}

/// Response definition (one scenario).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseDefinition {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u16,

    /// Response headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Response body, may contain `{{variable}}` placeholders
    #[serde(default)]
    pub body: Option<ResponseBody>,

    /// Marks this response as the default scenario
    #[serde(default)]
    pub default: bool,
}

fn default_status() -> u16 {
    200
}

/// Response body configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Plain text body
    Text { content: String },
    /// JSON body
    Json { content: serde_json::Value },
    /// Load from file
    File { path: String },
}

impl ResponseBody {
    /// Get the body content as a string template.
    pub fn to_template(&self) -> anyhow::Result<String> {
        match self {
            ResponseBody::Text { content } => Ok(content.clone()),
            ResponseBody::Json { content } => Ok(serde_json::to_string(content)?),
            ResponseBody::File { path } => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read file {}", path)),
        }
    }

    /// Get content type for this body, if the kind implies one.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            ResponseBody::Text { .. } => Some("text/plain"),
            ResponseBody::Json { .. } => Some("application/json"),
            ResponseBody::File { .. } => None,
        }
    }
}

/// How to treat two mocks with an identical (method, url) matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateMatchers {
    /// Refuse to load the catalog
    #[default]
    Reject,
    /// Keep both; the earlier mock wins
    FirstMatch,
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log all matched mocks
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log unmatched requests
    #[serde(default = "default_true")]
    pub log_unmatched: bool,

    /// Content type for responses whose body kind does not imply one
    #[serde(default = "default_content_type")]
    pub default_content_type: String,

    /// Disambiguation rule for identical matchers
    #[serde(default)]
    pub duplicate_matchers: DuplicateMatchers,
}

fn default_true() -> bool {
    true
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
            default_content_type: default_content_type(),
            duplicate_matchers: DuplicateMatchers::default(),
        }
    }
}

fn default_content_type() -> String {
    "application/json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_simple_mock() {
        let yaml = r#"
mocks:
  - name: greet
    request:
      method: GET
      url: ^/greet$
    responses:
      default:
        default: true
        body:
          type: text
          content: "Hello {{name}}"
"#;
        let config = MockServerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.mocks.len(), 1);
        assert_eq!(config.mocks[0].name, "greet");
        assert_eq!(config.mocks[0].request.method, "GET");
        assert_eq!(config.mocks[0].responses["default"].status, 200);
        assert!(config.mocks[0].responses["default"].default);
        assert_eq!(config.mocks[0].delay, 0);
        assert!(!config.mocks[0].echo);
    }

    #[test]
    fn test_parse_settings_and_variables() {
        let yaml = r#"
variables:
  host: example.org
settings:
  log_matches: false
  duplicate_matchers: first_match
"#;
        let config = MockServerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.variables.get("host").map(String::as_str), Some("example.org"));
        assert!(!config.settings.log_matches);
        assert!(config.settings.log_unmatched);
        assert_eq!(config.settings.duplicate_matchers, DuplicateMatchers::FirstMatch);
        assert_eq!(config.settings.default_content_type, "application/json");
    }

    #[test]
    fn test_default_config_parses() {
        let config =
            MockServerConfig::from_yaml(include_str!("../demos/default-config.yaml")).unwrap();
        assert_eq!(config.mocks.len(), 2);
        assert_eq!(config.settings.duplicate_matchers, DuplicateMatchers::Reject);
        assert!(crate::catalog::MockCatalog::load_with(config.mocks, &config.settings).is_ok());
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let yaml = r#"
mocks:
  - name: greet
    request: { method: GET, url: /greet }
    responses: {}
    priority: 10
"#;
        assert!(MockServerConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_json_body_template() {
        let body = ResponseBody::Json {
            content: serde_json::json!({"greeting": "Hi {{name}}"}),
        };
        assert_eq!(body.to_template().unwrap(), r#"{"greeting":"Hi {{name}}"}"#);
        assert_eq!(body.content_type(), Some("application/json"));
    }

    #[test]
    fn test_file_body_template() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "from file {{{{who}}}}").unwrap();

        let body = ResponseBody::File {
            path: file.path().display().to_string(),
        };
        assert_eq!(body.to_template().unwrap(), "from file {{who}}");
        assert_eq!(body.content_type(), None);

        let missing = ResponseBody::File {
            path: "/nonexistent/body.json".to_string(),
        };
        assert!(missing.to_template().is_err());
    }

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"mocks": [{"name": "a", "request": {"method": "GET", "url": "/a"},
                "responses": {"ok": {"status": 204}}, "default_scenario": "ok"}]}"#,
        )
        .unwrap();

        let config = MockServerConfig::load(&path).unwrap();
        assert_eq!(config.mocks[0].responses["ok"].status, 204);
        assert_eq!(config.mocks[0].default_scenario.as_deref(), Some("ok"));
    }

    #[test]
    fn test_from_dir_orders_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b-second.yaml"),
            "name: second\nrequest: {method: GET, url: /b}\nresponses: {ok: {default: true}}\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a-first.json"),
            r#"{"name": "first", "request": {"method": "GET", "url": "/a"},
                "responses": {"ok": {"default": true}}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let config = MockServerConfig::load(dir.path()).unwrap();
        let names: Vec<_> = config.mocks.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
