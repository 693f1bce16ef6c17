//! Shared test helpers: a scripted model and canned actions.

use async_trait::async_trait;
use scoutloop_core::error::{ActionError, ProviderError};
use scoutloop_core::provider::{Provider, ProviderRequest, ProviderResponse};
use scoutloop_core::{Action, ActionInput, ActionOutput};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

type Reply = Result<String, ProviderError>;

/// A provider that returns scripted replies in order.
///
/// The last reply is sticky: once the script is down to one entry, every
/// further call returns it again.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        Self::with_replies(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn repeating(reply: &str) -> Self {
        Self::new(vec![reply])
    }

    pub fn with_replies(replies: Vec<Reply>) -> Self {
        assert!(!replies.is_empty(), "ScriptedProvider needs at least one reply");
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.prompt).collect()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap()
        };
        reply.map(|text| ProviderResponse::text(text, "mock-model"))
    }
}

/// An action that always returns the same output.
pub struct StaticAction {
    name: String,
    description: String,
    output: ActionOutput,
    calls: Mutex<Vec<ActionInput>>,
}

impl StaticAction {
    pub fn text(name: &str, description: &str, output: &str) -> Arc<dyn Action> {
        Arc::new(Self::build(name, description, ActionOutput::Text(output.into())))
    }

    pub fn structured(name: &str, output: serde_json::Value) -> Arc<dyn Action> {
        Arc::new(Self::build(name, "", ActionOutput::Structured(output)))
    }

    /// Keep a typed handle to inspect recorded inputs.
    pub fn tracked(name: &str, output: &str) -> Arc<Self> {
        Arc::new(Self::build(name, "", ActionOutput::Text(output.into())))
    }

    fn build(name: &str, description: &str, output: ActionOutput) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            output,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ActionInput> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Action for StaticAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, input: ActionInput) -> Result<ActionOutput, ActionError> {
        self.calls.lock().unwrap().push(input);
        Ok(self.output.clone())
    }
}

/// An action that always fails.
pub struct FailingAction {
    name: String,
    reason: String,
}

impl FailingAction {
    pub fn new(name: &str, reason: &str) -> Arc<dyn Action> {
        Arc::new(Self {
            name: name.into(),
            reason: reason.into(),
        })
    }
}

#[async_trait]
impl Action for FailingAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    async fn invoke(&self, _input: ActionInput) -> Result<ActionOutput, ActionError> {
        Err(ActionError::ExecutionFailed {
            action: self.name.clone(),
            reason: self.reason.clone(),
        })
    }
}

/// An action that panics.
pub struct PanickingAction {
    name: String,
    message: String,
}

impl PanickingAction {
    pub fn new(name: &str, message: &str) -> Arc<dyn Action> {
        Arc::new(Self {
            name: name.into(),
            message: message.into(),
        })
    }
}

#[async_trait]
impl Action for PanickingAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always panics"
    }

    async fn invoke(&self, _input: ActionInput) -> Result<ActionOutput, ActionError> {
        panic!("{}", self.message);
    }
}
