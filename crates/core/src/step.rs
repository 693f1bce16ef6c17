//! Step: one emitted unit of loop activity.
//!
//! A run produces an ordered sequence of steps: thoughts, actions and their
//! observations, and exactly one terminal step (a final answer, a
//! cancellation or cap notice, or an error).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::ActionInput;

/// The kind of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Thought,
    Action,
    Observation,
    FinalAnswer,
    Error,
}

/// Why a run ended. Attached to the terminal step only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model emitted a final answer.
    Answered,
    /// The cancellation token fired (or the consumer went away).
    Cancelled,
    /// The iteration cap was reached.
    IterationCap,
    /// The model invocation failed.
    ModelFailure,
}

/// One discrete unit of loop output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub kind: StepKind,

    /// Display text.
    pub content: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_input: Option<ActionInput>,

    /// Raw observation text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<Termination>,
}

impl Step {
    fn new(kind: StepKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: Utc::now(),
            action_name: None,
            action_input: None,
            action_output: None,
            termination: None,
        }
    }

    /// A reasoning step.
    pub fn thought(content: impl Into<String>) -> Self {
        Self::new(StepKind::Thought, content)
    }

    /// An action request. The content is the action name.
    pub fn action(name: impl Into<String>, input: ActionInput) -> Self {
        let name = name.into();
        let mut step = Self::new(StepKind::Action, name.clone());
        step.action_name = Some(name);
        step.action_input = Some(input);
        step
    }

    /// The observation produced by executing an action.
    pub fn observation(name: impl Into<String>, output: impl Into<String>) -> Self {
        let output = output.into();
        let mut step = Self::new(StepKind::Observation, output.clone());
        step.action_name = Some(name.into());
        step.action_output = Some(output);
        step
    }

    /// A terminal step carrying the model's answer or a synthetic notice.
    pub fn final_answer(content: impl Into<String>, termination: Termination) -> Self {
        let mut step = Self::new(StepKind::FinalAnswer, content);
        step.termination = Some(termination);
        step
    }

    /// A terminal error step (model invocation failed).
    pub fn error(content: impl Into<String>) -> Self {
        let mut step = Self::new(StepKind::Error, content);
        step.termination = Some(Termination::ModelFailure);
        step
    }

    /// Whether this step ends its run.
    pub fn is_terminal(&self) -> bool {
        self.termination.is_some()
    }
}
