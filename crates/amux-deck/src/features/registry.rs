//! Tool dispatch table: tool name to rendering contract.
//!
//! Resolution order: exact names first (case-insensitive), then regex
//! patterns in descending priority, then the generic fallback. Unregistered
//! names are never an error; they are logged and rendered through the
//! fallback contract.

use std::collections::HashMap;

use anyhow::{Context, Result, bail, ensure};
use regex::Regex;
use serde_json::Value;

use crate::common::{single_line, truncate_with_ellipsis};

const SUMMARY_MAX_WIDTH: usize = 72;

type SummarizeFn = fn(&Value) -> Option<String>;

/// How a tool invocation is rendered.
#[derive(Debug, Clone)]
pub struct RenderContract {
    /// Canonical display label; `None` shows the invoked name as-is.
    label: Option<&'static str>,
    summarize: SummarizeFn,
}

impl RenderContract {
    pub fn new(label: &'static str, summarize: SummarizeFn) -> Self {
        Self {
            label: Some(label),
            summarize,
        }
    }

    /// Contract that echoes the invoked name with no argument summary.
    pub fn generic() -> Self {
        Self {
            label: None,
            summarize: summarize_none,
        }
    }

    /// One-line invocation summary, width-bounded.
    pub fn summary_line(&self, name: &str, input: &Value) -> String {
        let label = self.label.unwrap_or(name);
        match (self.summarize)(input) {
            Some(arg) => format!(
                "{label} {}",
                truncate_with_ellipsis(&single_line(&arg), SUMMARY_MAX_WIDTH)
            ),
            None => label.to_string(),
        }
    }
}

struct PatternContract {
    pattern: Regex,
    priority: i32,
    contract: RenderContract,
}

/// The dispatch table.
pub struct ToolRegistry {
    exact: HashMap<String, RenderContract>,
    /// Sorted by priority descending; insertion order breaks ties.
    patterns: Vec<PatternContract>,
    fallback: RenderContract,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            exact: HashMap::new(),
            patterns: Vec::new(),
            fallback: RenderContract::generic(),
        }
    }

    /// Registry pre-loaded with the backend's standard tool set.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register_batch(builtin_contracts())
            .unwrap_or_else(|e| unreachable!("builtin contracts are duplicate-free: {e}"));
        registry
            .register_pattern("^mcp__", 10, RenderContract::generic())
            .unwrap_or_else(|e| unreachable!("builtin pattern is valid: {e}"));
        registry
    }

    /// Registers one exact-name contract. Names are matched
    /// case-insensitively; a second registration of the same name fails.
    pub fn register(&mut self, name: &str, contract: RenderContract) -> Result<()> {
        let key = name.to_ascii_lowercase();
        ensure!(
            !self.exact.contains_key(&key),
            "Tool '{name}' is already registered"
        );
        self.exact.insert(key, contract);
        Ok(())
    }

    /// Registers a batch of exact-name contracts.
    ///
    /// Duplicates, within the batch or against existing entries, reject the
    /// whole batch before anything is inserted.
    pub fn register_batch(
        &mut self,
        entries: Vec<(&'static str, RenderContract)>,
    ) -> Result<()> {
        let mut keys: Vec<String> = Vec::with_capacity(entries.len());
        for (name, _) in &entries {
            let key = name.to_ascii_lowercase();
            if self.exact.contains_key(&key) || keys.contains(&key) {
                bail!("Duplicate tool name '{name}' in registration batch");
            }
            keys.push(key);
        }
        for (key, (_, contract)) in keys.into_iter().zip(entries) {
            self.exact.insert(key, contract);
        }
        Ok(())
    }

    /// Registers a regex pattern contract. Higher priority is tried first;
    /// equal priorities keep registration order.
    pub fn register_pattern(
        &mut self,
        pattern: &str,
        priority: i32,
        contract: RenderContract,
    ) -> Result<()> {
        let pattern = Regex::new(pattern)
            .with_context(|| format!("Invalid tool pattern '{pattern}'"))?;
        self.patterns.push(PatternContract {
            pattern,
            priority,
            contract,
        });
        // Stable sort keeps insertion order within a priority.
        self.patterns.sort_by_key(|p| std::cmp::Reverse(p.priority));
        Ok(())
    }

    /// Resolves a tool name to its rendering contract.
    ///
    /// An unregistered name logs a warning and resolves to the generic
    /// fallback.
    pub fn resolve(&self, name: &str) -> &RenderContract {
        if let Some(contract) = self.exact.get(&name.to_ascii_lowercase()) {
            return contract;
        }
        if let Some(entry) = self.patterns.iter().find(|p| p.pattern.is_match(name)) {
            return &entry.contract;
        }
        tracing::warn!(
            target: "amux::registry",
            "No rendering contract for tool '{name}', using generic fallback"
        );
        &self.fallback
    }

    /// Shorthand for `resolve(name).summary_line(name, input)`.
    pub fn summarize(&self, name: &str, input: &Value) -> String {
        self.resolve(name).summary_line(name, input)
    }
}

// ===== Builtin contracts =====

fn builtin_contracts() -> Vec<(&'static str, RenderContract)> {
    vec![
        ("bash", RenderContract::new("bash", summarize_command)),
        ("read", RenderContract::new("read", summarize_file_path)),
        ("write", RenderContract::new("write", summarize_file_path)),
        ("edit", RenderContract::new("edit", summarize_file_path)),
        ("multiedit", RenderContract::new("edit", summarize_file_path)),
        ("notebookedit", RenderContract::new("edit", summarize_file_path)),
        ("glob", RenderContract::new("glob", summarize_pattern)),
        ("grep", RenderContract::new("grep", summarize_pattern)),
        ("ls", RenderContract::new("ls", summarize_path)),
        ("task", RenderContract::new("task", summarize_description)),
        ("webfetch", RenderContract::new("fetch", summarize_url)),
        ("websearch", RenderContract::new("search", summarize_query)),
        ("todowrite", RenderContract::new("todos", summarize_todo_count)),
    ]
}

fn value_as_trimmed_str<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn summarize_none(_input: &Value) -> Option<String> {
    None
}

fn summarize_command(input: &Value) -> Option<String> {
    value_as_trimmed_str(input, "command").map(ToString::to_string)
}

fn summarize_file_path(input: &Value) -> Option<String> {
    value_as_trimmed_str(input, "file_path")
        .or_else(|| value_as_trimmed_str(input, "notebook_path"))
        .or_else(|| value_as_trimmed_str(input, "path"))
        .map(ToString::to_string)
}

fn summarize_pattern(input: &Value) -> Option<String> {
    value_as_trimmed_str(input, "pattern").map(ToString::to_string)
}

fn summarize_path(input: &Value) -> Option<String> {
    value_as_trimmed_str(input, "path").map(ToString::to_string)
}

fn summarize_description(input: &Value) -> Option<String> {
    value_as_trimmed_str(input, "description")
        .or_else(|| value_as_trimmed_str(input, "prompt"))
        .map(ToString::to_string)
}

fn summarize_url(input: &Value) -> Option<String> {
    value_as_trimmed_str(input, "url").map(ToString::to_string)
}

fn summarize_query(input: &Value) -> Option<String> {
    value_as_trimmed_str(input, "query").map(ToString::to_string)
}

fn summarize_todo_count(input: &Value) -> Option<String> {
    let count = input.get("todos").and_then(Value::as_array)?.len();
    Some(format!("{count} item(s)"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_resolve_exact_is_case_insensitive() {
        let registry = ToolRegistry::with_builtins();
        let line = registry.summarize("Bash", &json!({"command": "ls -la"}));
        assert_eq!(line, "bash ls -la");
    }

    #[test]
    fn test_batch_duplicate_rejected_without_partial_insert() {
        let mut registry = ToolRegistry::new();
        let result = registry.register_batch(vec![
            ("alpha", RenderContract::generic()),
            ("beta", RenderContract::generic()),
            ("Alpha", RenderContract::generic()),
        ]);

        assert!(result.is_err());
        // Nothing from the failed batch lands, not even the unique name.
        assert!(!registry.exact.contains_key("beta"));
    }

    #[test]
    fn test_duplicate_against_existing_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register("bash", RenderContract::generic()).unwrap();
        assert!(registry.register("BASH", RenderContract::generic()).is_err());
    }

    #[test]
    fn test_pattern_priority_wins() {
        let mut registry = ToolRegistry::new();
        registry
            .register_pattern("^x_", 1, RenderContract::new("low", summarize_none))
            .unwrap();
        registry
            .register_pattern("^x_special", 5, RenderContract::new("high", summarize_none))
            .unwrap();

        assert_eq!(registry.summarize("x_special_case", &json!({})), "high");
        assert_eq!(registry.summarize("x_other", &json!({})), "low");
    }

    #[test]
    fn test_equal_priority_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        registry
            .register_pattern("^y_", 3, RenderContract::new("first", summarize_none))
            .unwrap();
        registry
            .register_pattern("^y_", 3, RenderContract::new("second", summarize_none))
            .unwrap();

        assert_eq!(registry.summarize("y_tool", &json!({})), "first");
    }

    #[test]
    fn test_invalid_pattern_errors() {
        let mut registry = ToolRegistry::new();
        assert!(
            registry
                .register_pattern("([unclosed", 0, RenderContract::generic())
                .is_err()
        );
    }

    #[test]
    fn test_unregistered_falls_back_to_name() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(
            registry.summarize("SomeFutureTool", &json!({"a": 1})),
            "SomeFutureTool"
        );
    }

    #[test]
    fn test_mcp_pattern_keeps_full_name() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(
            registry.summarize("mcp__jira__create_issue", &json!({})),
            "mcp__jira__create_issue"
        );
    }

    #[test]
    fn test_builtin_summaries() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(
            registry.summarize("read", &json!({"file_path": "/work/src/lib.rs"})),
            "read /work/src/lib.rs"
        );
        assert_eq!(
            registry.summarize("task", &json!({"description": "Explore the repo"})),
            "task Explore the repo"
        );
        assert_eq!(
            registry.summarize("TodoWrite", &json!({"todos": [1, 2, 3]})),
            "todos 3 item(s)"
        );
    }

    #[test]
    fn test_summary_collapses_newlines_and_truncates() {
        let registry = ToolRegistry::with_builtins();
        let line = registry.summarize(
            "bash",
            &json!({"command": format!("echo {}\necho done", "x".repeat(100))}),
        );
        assert!(!line.contains('\n'));
        assert!(line.ends_with('…'));
    }
}
