//! # scoutloop core
//!
//! Domain types, traits, and error definitions for the scoutloop
//! reason–act–observe runtime. This crate has **no runtime dependencies**:
//! it defines the model that the loop driver, the providers, and the
//! actions implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the loop is a trait here:
//! - [`Provider`]: the language model, one prompt in, one reply out
//! - [`Action`]: a named capability the model may invoke
//!
//! Implementations live in their own crates (or in the embedding
//! application), which keeps the loop testable with scripted mocks.

pub mod action;
pub mod error;
pub mod provider;
pub mod step;

// Re-export key types at crate root for ergonomics
pub use action::{Action, ActionCatalog, ActionInput, ActionOutput};
pub use error::{ActionError, ProviderError};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use step::{Step, StepKind, Termination};
