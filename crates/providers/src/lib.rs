//! LLM Provider implementations for scoutloop.
//!
//! All providers implement the `scoutloop_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use scoutloop_config::AppConfig;
use scoutloop_core::error::ProviderError;
use std::sync::Arc;

/// Build the provider described by the configuration.
///
/// Local endpoints (Ollama and friends) work without a key; anything else
/// needs one.
pub fn build_from_config(
    config: &AppConfig,
) -> Result<Arc<dyn scoutloop_core::Provider>, ProviderError> {
    let is_local = config.base_url.contains("localhost") || config.base_url.contains("127.0.0.1");
    let api_key = match (&config.api_key, is_local) {
        (Some(key), _) => key.clone(),
        (None, true) => "local".into(),
        (None, false) => {
            return Err(ProviderError::NotConfigured(
                "no API key (set SCOUTLOOP_API_KEY or OPENAI_API_KEY)".into(),
            ));
        }
    };

    let name = if is_local { "local" } else { "openai_compat" };
    Ok(Arc::new(OpenAiCompatProvider::new(
        name,
        &config.base_url,
        api_key,
    )))
}
