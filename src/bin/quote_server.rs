use anyhow::Context;
use stay_quotes::server::{router, AppState};
use stay_quotes::utils::logger;
use stay_quotes::TomlConfig;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_server_logger();

    let config_path =
        std::env::var("STAY_QUOTES_CONFIG").unwrap_or_else(|_| "stay-quotes.toml".to_string());
    let config = if Path::new(&config_path).exists() {
        TomlConfig::from_file(&config_path)
            .with_context(|| format!("failed to load {}", config_path))?
    } else {
        tracing::warn!("⚠️ Config file '{}' not found, using defaults", config_path);
        TomlConfig::default()
    };
    let settings = config.into_settings()?;

    if settings.refresh_secret.is_none() {
        tracing::warn!("⚠️ No refresh secret configured; /api/refresh-prices will fail");
    }

    let bind = settings.bind.clone();
    tracing::info!("🚀 Serving {} mode on {}", settings.mode, bind);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    axum::serve(listener, router(AppState::new(settings))).await?;

    Ok(())
}
