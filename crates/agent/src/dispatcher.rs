//! Action dispatcher: executes a named action and normalizes its result
//! into observation text.
//!
//! Nothing an action does can abort the loop. Unknown names, action errors
//! and panics all come back as an [`Observation`] the model can read and
//! react to on the next iteration.
//!
//! Structured results are pretty-printed JSON. For a configured set of
//! actions a bulky field (by default the `body_html` of fetched emails) is
//! stripped from every nesting level before printing.

use futures::FutureExt;
use scoutloop_config::DispatcherConfig;
use scoutloop_core::{ActionCatalog, ActionError, ActionInput, ActionOutput};
use serde_json::Value;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::text::{ellipsize, truncate_chars};

/// The list of available names in an unknown-action message is cut to this.
const AVAILABLE_PREVIEW_CHARS: usize = 200;

/// Failure reasons longer than this are cut.
const FAILURE_REASON_CHARS: usize = 500;

/// What the loop records after dispatching an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub text: String,
    /// False for unknown actions, action errors and panics.
    pub success: bool,
}

impl Observation {
    fn ok(text: String) -> Self {
        Self {
            text,
            success: true,
        }
    }

    fn failed(text: String) -> Self {
        Self {
            text,
            success: false,
        }
    }
}

/// A field to strip from the results of a set of actions.
#[derive(Debug, Clone)]
pub struct Redaction {
    actions: HashSet<String>,
    field: String,
}

impl Redaction {
    pub fn new<I, S>(actions: I, field: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            field: field.into(),
        }
    }

    /// Strip `body_html` from the email actions.
    pub fn email_bodies() -> Self {
        Self::from(&DispatcherConfig::default())
    }

    pub fn applies_to(&self, action: &str) -> bool {
        self.actions.contains(action)
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl From<&DispatcherConfig> for Redaction {
    fn from(config: &DispatcherConfig) -> Self {
        Self::new(config.redacted_actions.iter().cloned(), config.redacted_field.clone())
    }
}

/// Executes actions from a shared catalog.
pub struct Dispatcher {
    catalog: Arc<ActionCatalog>,
    redactions: Vec<Redaction>,
}

impl Dispatcher {
    /// A dispatcher with the default email-body redaction.
    pub fn new(catalog: Arc<ActionCatalog>) -> Self {
        Self::from_config(catalog, &DispatcherConfig::default())
    }

    pub fn from_config(catalog: Arc<ActionCatalog>, config: &DispatcherConfig) -> Self {
        Self {
            catalog,
            redactions: vec![Redaction::from(config)],
        }
    }

    pub fn with_redaction(mut self, redaction: Redaction) -> Self {
        self.redactions.push(redaction);
        self
    }

    pub fn without_redactions(mut self) -> Self {
        self.redactions.clear();
        self
    }

    pub fn catalog(&self) -> &Arc<ActionCatalog> {
        &self.catalog
    }

    /// Execute `name` with `input` and normalize the outcome.
    pub async fn execute(&self, name: &str, input: ActionInput) -> Observation {
        let Some(action) = self.catalog.get(name) else {
            warn!(action = name, "Unknown action requested");
            return Observation::failed(self.unknown_action_message(name));
        };

        let start = Instant::now();
        let result = AssertUnwindSafe(action.invoke(input)).catch_unwind().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(output)) => {
                let text = self.render_output(name, output);
                info!(action = name, duration_ms, chars = text.len(), "Action executed");
                Observation::ok(text)
            }
            Ok(Err(e)) => {
                warn!(action = name, duration_ms, error = %e, "Action failed");
                Observation::failed(failure_message(name, &failure_reason(&e)))
            }
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                warn!(action = name, duration_ms, reason = %reason, "Action panicked");
                Observation::failed(failure_message(name, &reason))
            }
        }
    }

    fn unknown_action_message(&self, name: &str) -> String {
        let available = self.catalog.names().join(", ");
        format!(
            "Error: Action '{name}' not found. Available actions: {}...",
            truncate_chars(&available, AVAILABLE_PREVIEW_CHARS)
        )
    }

    fn render_output(&self, name: &str, output: ActionOutput) -> String {
        let value = match output {
            ActionOutput::Structured(Value::String(text)) | ActionOutput::Text(text) => {
                match serde_json::from_str::<Value>(&text) {
                    Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
                    // Plain text, or a bare JSON scalar: keep what the action wrote.
                    _ => return text,
                }
            }
            ActionOutput::Structured(value) => value,
        };

        let value = self
            .redactions
            .iter()
            .filter(|r| r.applies_to(name))
            .fold(value, |v, r| {
                debug!(action = name, field = r.field(), "Redacting field");
                strip_field(v, r.field())
            });

        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    }
}

/// Remove `field` from every mapping in `value`, at any depth.
/// Key order of the remaining entries is preserved.
pub fn strip_field(value: Value, field: &str) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| k != field)
                .map(|(k, v)| (k, strip_field(v, field)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| strip_field(v, field)).collect())
        }
        other => other,
    }
}

fn failure_message(name: &str, reason: &str) -> String {
    format!(
        "Error executing action '{name}': {}",
        ellipsize(reason, FAILURE_REASON_CHARS)
    )
}

fn failure_reason(error: &ActionError) -> String {
    match error {
        ActionError::ExecutionFailed { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}

fn panic_reason(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "action panicked".into()
    }
}
