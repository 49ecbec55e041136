//! Placeholder substitution for response bodies.
//!
//! Replaces `{{name}}` tokens using a [`VariableResolver`]. Unresolved
//! placeholders are kept literally so test authors can see which variables
//! are unbound.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Source of variable values.
pub trait VariableResolver {
    /// Value bound to `name`, or `None` if unbound.
    fn resolve(&self, name: &str) -> Option<String>;
}

impl VariableResolver for HashMap<String, String> {
    fn resolve(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    // Single-level tokens only: no braces inside the name.
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder regex"))
}

/// Substitute every `{{name}}` placeholder in `template`.
///
/// Borrows the input unchanged when nothing was replaced.
pub fn render<'t>(template: &'t str, resolver: &dyn VariableResolver) -> Cow<'t, str> {
    placeholder_regex().replace_all(template, |caps: &Captures| {
        resolver
            .resolve(&caps[1])
            .unwrap_or_else(|| caps[0].to_string())
    })
}

/// Names of all placeholders in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    placeholder_regex()
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_substitution() {
        let result = render("Hello {{name}}", &vars(&[("name", "Ann")]));
        assert_eq!(result, "Hello Ann");
    }

    #[test]
    fn test_unresolved_kept_literal() {
        let result = render("Hello {{name}}, {{greeting}}", &vars(&[("greeting", "hi")]));
        assert_eq!(result, "Hello {{name}}, hi");
    }

    #[test]
    fn test_empty_value_substituted() {
        let result = render("[{{blank}}]", &vars(&[("blank", "")]));
        assert_eq!(result, "[]");
    }

    #[test]
    fn test_no_placeholders_borrows() {
        let result = render("static body", &vars(&[]));
        assert!(matches!(result, Cow::Borrowed("static body")));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let result = render("{{a}}", &vars(&[("a", "{{b}}"), ("b", "nested")]));
        assert_eq!(result, "{{b}}");
    }

    #[test]
    fn test_json_body() {
        let body = r#"{"user":"{{user}}","id":{{id}}}"#;
        let result = render(body, &vars(&[("user", "ann"), ("id", "42")]));
        assert_eq!(result, r#"{"user":"ann","id":42}"#);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders("{{a}} and {{b}} and {{a}}"), vec!["a", "b", "a"]);
        assert!(placeholders("{ {not} }").is_empty());
    }
}
