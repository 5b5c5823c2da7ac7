//! Prompt templates
//!
//! Templates use `{name}` placeholders. Formatting is lenient: a placeholder
//! with no supplied value stays in the output verbatim, so a template can be
//! rendered in stages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A string template with `{name}` placeholders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    template: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    bound: HashMap<String, String>,
}

impl PromptTemplate {
    /// Create a template from its raw text
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            bound: HashMap::new(),
        }
    }

    /// The raw template text
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of first appearance
    pub fn template_vars(&self) -> Vec<String> {
        let mut vars: Vec<String> = Vec::new();
        for (_, name) in placeholders(&self.template) {
            if !vars.iter().any(|v| v == name) {
                vars.push(name.to_string());
            }
        }
        vars
    }

    /// Bind some variables now; later `format` calls can override them
    pub fn partial_format(&self, vars: &[(&str, &str)]) -> Self {
        let mut bound = self.bound.clone();
        for (name, value) in vars {
            bound.insert(name.to_string(), value.to_string());
        }
        Self {
            template: self.template.clone(),
            bound,
        }
    }

    /// Render the template, substituting every supplied or bound placeholder
    pub fn format(&self, vars: &[(&str, &str)]) -> String {
        let lookup = |name: &str| -> Option<&str> {
            vars.iter()
                .rev()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value)
                .or_else(|| self.bound.get(name).map(String::as_str))
        };

        let mut output = String::with_capacity(self.template.len());
        let mut last = 0;
        for (range, name) in placeholders(&self.template) {
            if let Some(value) = lookup(name) {
                output.push_str(&self.template[last..range.start]);
                output.push_str(value);
                last = range.end;
            }
        }
        output.push_str(&self.template[last..]);
        output
    }
}

impl From<&str> for PromptTemplate {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl std::fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.template)
    }
}

/// Find `{name}` spans where `name` is non-empty and contains no braces
///
/// Returns the byte range of the whole placeholder and the name inside it.
fn placeholders(template: &str) -> Vec<(std::ops::Range<usize>, &str)> {
    let bytes = template.as_bytes();
    let mut found = Vec::new();
    let mut open: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => open = Some(i),
            b'}' => {
                if let Some(start) = open.take() {
                    if i > start + 1 {
                        found.push((start..i + 1, &template[start + 1..i]));
                    }
                }
            }
            _ => {}
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_query_str() {
        let template = PromptTemplate::new("<|user|>\n{query_str}<|end|>\n<|assistant|>\n");

        let rendered = template.format(&[("query_str", "What is Rust?")]);

        assert_eq!(rendered, "<|user|>\nWhat is Rust?<|end|>\n<|assistant|>\n");
    }

    #[test]
    fn test_missing_vars_left_verbatim() {
        let template = PromptTemplate::new("Context: {context}\nQuestion: {query_str}");

        let rendered = template.format(&[("query_str", "why?")]);

        assert_eq!(rendered, "Context: {context}\nQuestion: why?");
    }

    #[test]
    fn test_template_vars_ordered_unique() {
        let template = PromptTemplate::new("{a} and {b}, then {a} again; {} is not a var");
        assert_eq!(template.template_vars(), vec!["a", "b"]);
    }

    #[test]
    fn test_double_braces_match_inner_placeholder() {
        let template = PromptTemplate::new("{{query_str}}");
        assert_eq!(template.format(&[("query_str", "x")]), "{x}");
    }

    #[test]
    fn test_partial_format_then_override() {
        let template = PromptTemplate::new("{greeting}, {name}!");
        let partial = template.partial_format(&[("greeting", "Hello"), ("name", "world")]);

        assert_eq!(partial.format(&[]), "Hello, world!");
        assert_eq!(partial.format(&[("name", "Rust")]), "Hello, Rust!");
        assert_eq!(partial.template(), template.template());
    }

    #[test]
    fn test_multibyte_text_preserved() {
        let template = PromptTemplate::new("질문: {query_str} ✓");
        assert_eq!(template.format(&[("query_str", "안녕")]), "질문: 안녕 ✓");
    }
}
