//! Request matching logic.
//!
//! Compiles a mock's request matcher once at load time so matching an
//! incoming request is a method comparison plus one regex test.

use crate::config::RequestMatcher;
use regex::Regex;

/// Compiled (method, url pattern) matcher.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    method: String,
    url: Regex,
}

impl CompiledMatcher {
    /// Compile a request matcher. The method is normalized to upper case.
    pub fn compile(matcher: &RequestMatcher) -> Result<Self, regex::Error> {
        Ok(Self {
            method: matcher.method.to_uppercase(),
            url: Regex::new(&matcher.url)?,
        })
    }

    /// Normalized method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Source of the url pattern.
    pub fn url_pattern(&self) -> &str {
        self.url.as_str()
    }

    /// Whether the request is accepted: method equality (case-insensitive)
    /// and an unanchored regex search over the url.
    pub fn matches(&self, method: &str, url: &str) -> bool {
        self.method.eq_ignore_ascii_case(method) && self.url.is_match(url)
    }
}

/// Whether a method token is acceptable in a matcher.
pub(crate) fn is_valid_method(method: &str) -> bool {
    !method.is_empty() && method.chars().all(|c| c.is_ascii_alphabetic())
}
