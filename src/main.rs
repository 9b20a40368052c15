#![cfg(not(tarpaulin_include))]

use datavis::{app, config::Config};

/// Entry point of the DataVis Canvas web server
///
/// Configuration comes from `DATAVIS_*` environment variables and log
/// filtering from `RUST_LOG` (default `info`).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    log::info!("store at {}", config.store_path().display());

    app::run(config).await
}
