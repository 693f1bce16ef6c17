//! Transcript: the append-only scratchpad of one run.
//!
//! Every completed step is recorded here and rendered back into the next
//! prompt so the model sees what it already did. Entries are never edited
//! or removed while a run is in progress.

use scoutloop_core::ActionInput;
use serde::{Deserialize, Serialize};

/// One recorded piece of the scratchpad.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptEntry {
    /// Reasoning without an action.
    Thought { thought: String },
    /// A full thought, action, observation exchange.
    Exchange {
        thought: String,
        action: String,
        input: ActionInput,
        observation: String,
    },
    /// A reply the parser could not classify, kept verbatim.
    Raw { text: String },
    /// A note injected by the loop itself, e.g. after the completion sentinel.
    SystemNote { note: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn record_thought(&mut self, thought: &str) {
        self.entries.push(TranscriptEntry::Thought {
            thought: thought.to_string(),
        });
    }

    pub fn record_exchange(
        &mut self,
        thought: &str,
        action: &str,
        input: &ActionInput,
        observation: &str,
    ) {
        self.entries.push(TranscriptEntry::Exchange {
            thought: thought.to_string(),
            action: action.to_string(),
            input: input.clone(),
            observation: observation.to_string(),
        });
    }

    pub fn record_raw(&mut self, text: &str) {
        self.entries.push(TranscriptEntry::Raw {
            text: text.to_string(),
        });
    }

    pub fn record_system_note(&mut self, note: &str) {
        self.entries.push(TranscriptEntry::SystemNote {
            note: note.to_string(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the scratchpad in the same text protocol the model writes.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                TranscriptEntry::Thought { thought } => {
                    out.push_str(&format!("\nThought: {thought}\n"));
                }
                TranscriptEntry::Exchange {
                    thought,
                    action,
                    input,
                    observation,
                } => {
                    let input = serde_json::to_string(input).unwrap_or_else(|_| "{}".into());
                    out.push_str(&format!(
                        "\nThought: {thought}\nAction: {action}\nAction Input: {input}\nObservation: {observation}\n"
                    ));
                }
                TranscriptEntry::Raw { text } => {
                    out.push('\n');
                    out.push_str(text.trim());
                    out.push('\n');
                }
                TranscriptEntry::SystemNote { note } => {
                    out.push_str(&format!("\n[SYSTEM]: {note}\n"));
                }
            }
        }
        out
    }
}
