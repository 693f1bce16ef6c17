//! Subcommand implementations and the helpers they share.

pub mod ask;
pub mod config_cmd;
pub mod research;

use scoutloop_config::AppConfig;
use scoutloop_core::{Provider, Step, StepKind};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Observations longer than this are shortened on screen.
const OBSERVATION_PREVIEW_CHARS: usize = 400;

/// Load the config and build the provider, with a readable error when no
/// key is available.
pub fn load() -> Result<(AppConfig, Arc<dyn Provider>), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let provider = scoutloop_providers::build_from_config(&config).map_err(|e| {
        eprintln!();
        eprintln!("  ERROR: {e}");
        eprintln!();
        eprintln!("  Set SCOUTLOOP_API_KEY or OPENAI_API_KEY, or add api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        format!("Provider setup failed: {e}")
    })?;

    Ok((config, provider))
}

/// A token that fires on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\n  Stopping after the current step...");
                trigger.cancel();
            }
            Err(e) => warn!("Could not listen for Ctrl-C: {e}"),
        }
    });
    token
}

/// Render one step for the terminal.
pub fn print_step(step: &Step) {
    match step.kind {
        StepKind::Thought => println!("  Thought: {}", step.content),
        StepKind::Action => {
            let input = step
                .action_input
                .as_ref()
                .and_then(|i| serde_json::to_string(i).ok())
                .unwrap_or_else(|| "{}".into());
            println!("  Action: {} {input}", step.content);
        }
        StepKind::Observation => {
            let text = step.content.trim();
            let preview: String = text.chars().take(OBSERVATION_PREVIEW_CHARS).collect();
            let more = if preview.len() < text.len() { " ..." } else { "" };
            println!("  Observation: {preview}{more}");
        }
        StepKind::FinalAnswer => {
            println!();
            println!("{}", step.content);
        }
        StepKind::Error => eprintln!("  Error: {}", step.content),
    }
}
