//! The reason–act–observe loop.
//!
//! One run follows a **Thought → Action → Observation** cycle:
//!
//! 1. **Build the prompt** (system prompt, time, prior turns, actions, task, transcript)
//! 2. **Ask the model** for one reply, stopped before it writes an observation
//! 3. **Parse** the reply: final answer, action, thought, or nothing usable
//! 4. **If an action**: dispatch it, record the observation, loop back to 1
//! 5. **If a final answer**: emit it and stop
//!
//! The run also stops on cancellation, on the iteration cap, or when the
//! model call fails. Every step is emitted as it happens, either collected
//! into a [`ReactOutcome`] or streamed.
//!
//! [`ResearchController`] specializes the loop for lead research.

pub mod dispatcher;
pub mod parser;
pub mod prompt;
pub mod react;
pub mod repair;
pub mod research;
pub mod text;
pub mod transcript;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dispatcher::{Dispatcher, Observation, Redaction};
pub use parser::{ParseResult, parse};
pub use prompt::{PriorTurn, PromptBuilder, TurnRole};
pub use react::{LoopRun, ReactLoop, ReactOutcome, RunRequest, StepObserver, StepStream};
pub use research::{
    CompleteTaskAction, GoalTracker, ResearchController, ResearchGoal, ResearchOutcome,
    ResearchPolicy, ResearchRun, StopReason,
};
pub use transcript::{Transcript, TranscriptEntry};
