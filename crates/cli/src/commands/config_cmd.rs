//! `scoutloop config`: print the effective configuration.

use scoutloop_config::AppConfig;

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Config error: {e}"))?;

    println!(
        "# {}",
        AppConfig::config_dir().join("config.toml").display()
    );
    println!(
        "# api key: {}",
        if config.has_api_key() { "set" } else { "not set" }
    );
    println!();
    print!("{}", config.to_toml());
    Ok(())
}
