use crate::config::settings::Settings;
use crate::config::toml_config::TomlConfig;
use crate::domain::model::ResolutionMode;
use crate::utils::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::Path;

#[derive(Debug, Clone, Parser)]
#[command(name = "stay-quotes")]
#[command(about = "Tiered lodging price resolution: static cache, live backend, refresh")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, default_value = "stay-quotes.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Command line values that win over the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Override resolution mode (static | hybrid)
    #[arg(long, global = true)]
    pub mode: Option<ResolutionMode>,

    /// Override the cache location (path or URL)
    #[arg(long, global = true)]
    pub cache: Option<String>,

    /// Override the primary backend endpoint
    #[arg(long, global = true)]
    pub primary: Option<String>,

    /// Override the fallback backend endpoint
    #[arg(long, global = true)]
    pub fallback: Option<String>,

    /// Override the request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Resolve a price quote for a destination and stay
    Resolve {
        #[arg(long)]
        destination: String,
        /// Check-in date (YYYY-MM-DD)
        #[arg(long)]
        checkin: String,
        /// Check-out date (YYYY-MM-DD)
        #[arg(long)]
        checkout: String,
        #[arg(long, default_value = "2")]
        guests: u32,
        #[arg(long, default_value = "1")]
        rooms: u32,
    },
    /// Generate fresh mock cache entries (prints JSON, writes nothing)
    Refresh {
        /// Bearer token; must match refresh.secret
        #[arg(long, env = "STAY_QUOTES_REFRESH_TOKEN")]
        token: Option<String>,
        /// Generate every configured preset
        #[arg(long)]
        all: bool,
        #[arg(long)]
        destination: Option<String>,
        #[arg(long)]
        checkin: Option<String>,
        #[arg(long)]
        checkout: Option<String>,
    },
    /// Probe the live backend health endpoint
    Health,
    /// Project membership savings over several years
    Savings {
        #[arg(long)]
        membership_cost: f64,
        /// Retail price of one trip today
        #[arg(long)]
        retail_price: f64,
        /// Member price of the same trip
        #[arg(long)]
        member_price: f64,
        #[arg(long, default_value = "1")]
        trips_per_year: f64,
        #[arg(long, default_value = "5")]
        years: u32,
        /// Yearly retail inflation in percent
        #[arg(long, default_value = "0")]
        inflation: f64,
        /// Print the yearly table as CSV
        #[arg(long)]
        csv: bool,
    },
}

impl Cli {
    /// 載入設定檔（不存在時使用預設值）並套用命令列覆蓋
    pub fn load_settings(&self) -> Result<Settings> {
        let mut config = if Path::new(&self.config).exists() {
            TomlConfig::from_file(&self.config)?
        } else {
            tracing::warn!(
                "⚠️ Config file '{}' not found, using defaults",
                self.config
            );
            TomlConfig::default()
        };

        let overrides = &self.overrides;
        if let Some(mode) = overrides.mode {
            config.resolver.mode = Some(mode);
            tracing::info!("🔧 Mode overridden to: {}", mode);
        }
        if let Some(cache) = &overrides.cache {
            config.cache.location = Some(cache.clone());
        }
        if let Some(primary) = &overrides.primary {
            config.remote.primary_endpoint = Some(primary.clone());
        }
        if let Some(fallback) = &overrides.fallback {
            config.remote.fallback_endpoint = Some(fallback.clone());
        }
        if let Some(timeout) = overrides.timeout {
            config.resolver.timeout_seconds = Some(timeout);
        }

        let settings = config.into_settings()?;
        tracing::debug!(
            "Settings: mode={}, cache={}, timeout={:?}",
            settings.mode,
            settings.cache_location,
            settings.timeout
        );
        Ok(settings)
    }
}
