#![cfg(not(tarpaulin_include))]

use buskerz::app;
use buskerz::config::AppConfig;

/// Main entry point for the web application
///
/// Loads settings from `buskerz.toml` and `BUSKERZ_*` environment variables,
/// opens (or creates) the workbook and serves the JSON API.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    log::info!(
        "Starting web server on {} with workbook {}",
        config.bind_addr,
        config.workbook_path
    );
    app::run(config).await
}
