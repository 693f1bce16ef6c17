//! Prompt assembly for each loop iteration.
//!
//! A prompt is rebuilt from scratch every iteration:
//!
//! 1. system prompt
//! 2. current local time
//! 3. recent prior conversation turns (if any)
//! 4. the action catalog and the response-format rules
//! 5. the task
//! 6. the rendered transcript
//!
//! Only the transcript grows between iterations.

use chrono::{DateTime, Local};
use scoutloop_config::AgentConfig;
use scoutloop_core::ActionCatalog;
use serde::{Deserialize, Serialize};

use crate::text::ellipsize;
use crate::transcript::Transcript;

/// Prior turns older than this are left out of the prompt.
pub const MAX_PRIOR_TURNS: usize = 6;

/// Each prior turn is cut to this many characters.
pub const PRIOR_TURN_CHARS: usize = 800;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a precise assistant that solves tasks step by step using the actions available to you.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message from an earlier conversation, given as context only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorTurn {
    pub role: TurnRole,
    pub content: String,
}

impl PriorTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Builds the per-iteration prompt text.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    completion_sentinel: String,
    include_time: bool,
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>, completion_sentinel: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            completion_sentinel: completion_sentinel.into(),
            include_time: true,
        }
    }

    /// Leave the clock out of the prompt. Used where output must be
    /// reproducible.
    pub fn without_time(mut self) -> Self {
        self.include_time = false;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_completion_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.completion_sentinel = sentinel.into();
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn build(
        &self,
        catalog: &ActionCatalog,
        task: &str,
        history: &[PriorTurn],
        transcript: &Transcript,
    ) -> String {
        let now = self.include_time.then(Local::now);
        self.build_at(catalog, task, history, transcript, now)
    }

    pub(crate) fn build_at(
        &self,
        catalog: &ActionCatalog,
        task: &str,
        history: &[PriorTurn],
        transcript: &Transcript,
        now: Option<DateTime<Local>>,
    ) -> String {
        let mut prompt = String::with_capacity(2048);
        prompt.push_str(self.system_prompt.trim_end());
        prompt.push_str("\n\n");

        if let Some(now) = now {
            prompt.push_str(&format!(
                "CURRENT TIME: {}\nUse this when the task depends on the date.\n\n",
                now.format("%A, %B %d, %Y at %I:%M %p")
            ));
        }

        let history_block = render_history(history);
        if !history_block.is_empty() {
            prompt.push_str(&history_block);
        }

        prompt.push_str(&self.format_rules(catalog));
        prompt.push_str(&format!("\nQuestion: {task}\n"));
        prompt.push_str("\nPrevious steps (do not repeat them):\n");
        prompt.push_str(&transcript.render());
        prompt.push_str("\nContinue (or give the Final Answer if done):\n");
        prompt
    }

    fn format_rules(&self, catalog: &ActionCatalog) -> String {
        let sentinel = &self.completion_sentinel;
        format!(
            "You have access to these actions:\n\
             {actions}\n\
             \n\
             Reply in EXACTLY this format and nothing else:\n\
             \n\
             Thought: <one short sentence of reasoning>\n\
             Action: <action name, exactly as listed>\n\
             Action Input: {{\"arg\": \"value\"}}\n\
             \n\
             Then STOP. The result is appended for you as an Observation. Never write \"Observation:\" yourself.\n\
             \n\
             Rules:\n\
             1. Always begin with \"Thought:\".\n\
             2. Action Input must be a valid JSON object: double quotes, lowercase true/false/null.\n\
             3. Do not repeat an action that already appears in the previous steps.\n\
             4. If an Observation contains {sentinel}, reply with \"Final Answer:\" immediately.\n\
             5. When the task is done, reply with \"Final Answer: <answer>\" instead of an action.\n",
            actions = catalog.describe(),
        )
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT, AgentConfig::default().completion_sentinel)
    }
}

/// The most recent [`MAX_PRIOR_TURNS`] turns, each cut to
/// [`PRIOR_TURN_CHARS`] characters.
pub fn render_history(history: &[PriorTurn]) -> String {
    if history.is_empty() {
        return String::new();
    }

    let recent = &history[history.len().saturating_sub(MAX_PRIOR_TURNS)..];
    let mut out = String::from("Previous conversation:\n\n");
    for turn in recent {
        let label = match turn.role {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
        };
        out.push_str(&format!(
            "{label}: {}\n",
            ellipsize(&turn.content, PRIOR_TURN_CHARS)
        ));
    }
    out.push_str("\nCurrent question follows.\n\n");
    out
}
