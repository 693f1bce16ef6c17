//! `scoutloop ask`: run one task through the generic loop.

use scoutloop_agent::{Dispatcher, ReactLoop};
use scoutloop_core::{ActionCatalog, Termination};
use std::sync::Arc;
use tokio_stream::StreamExt;

use super::{cancel_on_ctrl_c, load, print_step};

pub async fn run(
    task: String,
    max_iterations: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, provider) = load()?;

    // The generic loop ships no actions of its own; embedders register theirs.
    let catalog = Arc::new(ActionCatalog::new());
    let dispatcher = Arc::new(Dispatcher::from_config(catalog, &config.dispatcher));
    let mut react = ReactLoop::from_config(provider, &config, dispatcher);
    if let Some(max) = max_iterations {
        react = react.with_max_iterations(max);
    }

    let mut steps = react.run_stream(task, cancel_on_ctrl_c());
    let mut termination = None;
    while let Some(step) = steps.next().await {
        print_step(&step);
        if step.is_terminal() {
            termination = step.termination;
        }
    }

    match termination {
        Some(Termination::ModelFailure) => Err("Model call failed".into()),
        _ => Ok(()),
    }
}
