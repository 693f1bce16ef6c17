//! Action trait: the abstraction over capabilities the model can invoke.
//!
//! Actions are what let the loop act in the world: search the web, enrich
//! a company profile, score it, save it. The runtime treats them as opaque
//! named capabilities; only their name, description and result shape matter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ActionError;

/// Arguments for an action: an ordered key → value mapping.
pub type ActionInput = serde_json::Map<String, serde_json::Value>;

/// The raw result of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionOutput {
    /// Structured data (a mapping or a sequence, usually).
    Structured(serde_json::Value),
    /// Plain text, which may itself contain JSON.
    Text(String),
}

impl From<String> for ActionOutput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for ActionOutput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<serde_json::Value> for ActionOutput {
    fn from(v: serde_json::Value) -> Self {
        Self::Structured(v)
    }
}

/// The core Action trait.
///
/// Invocation must be safe to retry at the caller's discretion; the loop
/// itself never retries.
#[async_trait]
pub trait Action: Send + Sync {
    /// The unique, case-sensitive name the model uses to call this action.
    fn name(&self) -> &str;

    /// A description of what this action does (rendered into the prompt).
    fn description(&self) -> &str;

    /// Execute the action with the given (possibly empty) input.
    async fn invoke(&self, input: ActionInput) -> std::result::Result<ActionOutput, ActionError>;
}

/// A catalog of available actions.
///
/// Built once before a loop starts, then shared read-only (behind an `Arc`)
/// by every run. Registration order is preserved so the prompt lists actions
/// the way the embedder declared them.
#[derive(Default)]
pub struct ActionCatalog {
    actions: Vec<Arc<dyn Action>>,
    index: HashMap<String, usize>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action. Replaces any existing action with the same name,
    /// keeping its original position.
    pub fn register(&mut self, action: Arc<dyn Action>) {
        let name = action.name().to_string();
        match self.index.get(&name) {
            Some(&pos) => self.actions[pos] = action,
            None => {
                self.index.insert(name, self.actions.len());
                self.actions.push(action);
            }
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, action: Arc<dyn Action>) -> Self {
        self.register(action);
        self
    }

    /// Get an action by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Action>> {
        self.index.get(name).map(|&pos| &self.actions[pos])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Render `- name: description` lines for the prompt.
    pub fn describe(&self) -> String {
        self.actions
            .iter()
            .map(|a| {
                let desc = if a.description().is_empty() {
                    "No description"
                } else {
                    a.description()
                };
                format!("- {}: {}", a.name(), desc)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Debug for ActionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionCatalog")
            .field("actions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test action for unit tests.
    struct EchoAction {
        name: &'static str,
        description: &'static str,
    }

    #[async_trait]
    impl Action for EchoAction {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            self.description
        }
        async fn invoke(&self, input: ActionInput) -> std::result::Result<ActionOutput, ActionError> {
            Ok(ActionOutput::Structured(serde_json::Value::Object(input)))
        }
    }

    fn echo(name: &'static str, description: &'static str) -> Arc<dyn Action> {
        Arc::new(EchoAction { name, description })
    }

    #[test]
    fn catalog_register_and_lookup() {
        let catalog = ActionCatalog::new().with(echo("echo", "Echoes back the input"));
        assert!(catalog.get("echo").is_some());
        assert!(catalog.get("Echo").is_none(), "names are case-sensitive");
        assert!(catalog.get("nonexistent").is_none());
    }

    #[test]
    fn catalog_preserves_registration_order() {
        let catalog = ActionCatalog::new()
            .with(echo("extract_icp", "a"))
            .with(echo("searxng_search", "b"))
            .with(echo("complete_task", "c"));
        assert_eq!(
            catalog.names(),
            vec!["extract_icp", "searxng_search", "complete_task"]
        );
    }

    #[test]
    fn re_registering_replaces_in_place() {
        let catalog = ActionCatalog::new()
            .with(echo("a", "first"))
            .with(echo("b", "second"))
            .with(echo("a", "replaced"));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.names(), vec!["a", "b"]);
        assert_eq!(catalog.get("a").unwrap().description(), "replaced");
    }

    #[test]
    fn describe_renders_one_line_per_action() {
        let catalog = ActionCatalog::new()
            .with(echo("echo", "Echoes back the input"))
            .with(echo("blank", ""));
        assert_eq!(
            catalog.describe(),
            "- echo: Echoes back the input\n- blank: No description"
        );
    }

    #[tokio::test]
    async fn invoke_through_catalog() {
        let catalog = ActionCatalog::new().with(echo("echo", "Echoes back the input"));
        let mut input = ActionInput::new();
        input.insert("text".into(), serde_json::json!("hello world"));

        let out = catalog.get("echo").unwrap().invoke(input).await.unwrap();
        assert_eq!(
            out,
            ActionOutput::Structured(serde_json::json!({"text": "hello world"}))
        );
    }

    #[test]
    fn output_conversions() {
        assert_eq!(ActionOutput::from("ok"), ActionOutput::Text("ok".into()));
        assert_eq!(
            ActionOutput::from(serde_json::json!([1, 2])),
            ActionOutput::Structured(serde_json::json!([1, 2]))
        );
    }
}
