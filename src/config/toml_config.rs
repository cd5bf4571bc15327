use crate::config::settings::{
    GeneratorSettings, Preset, Settings, VarianceBand, DEFAULT_BIND, DEFAULT_CACHE_LOCATION,
    DEFAULT_TIMEOUT,
};
use crate::domain::model::{ResolutionMode, SourceKey, DEFAULT_DISCOUNT_RATE};
use crate::utils::error::{QuoteError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_stay, validate_url,
    Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    pub generator: Option<GeneratorConfig>,
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub mode: Option<ResolutionMode>,
    pub timeout_seconds: Option<u64>,
    pub discount_rate: Option<f64>,
    pub probe_health: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub primary_endpoint: Option<String>,
    pub fallback_endpoint: Option<String>,
    pub health_endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub currency: Option<String>,
    pub default_base_price: Option<f64>,
    pub base_prices: Option<BTreeMap<String, f64>>,
    pub variance: Option<BTreeMap<String, [f64; 2]>>,
    pub presets: Option<Vec<Preset>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
}

fn env_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").ok())
        .as_ref()
}

fn is_unresolved(value: &str) -> bool {
    env_pattern().is_some_and(|pattern| pattern.is_match(value))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(QuoteError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| QuoteError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${REFRESH_SECRET})，找不到的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        let Some(pattern) = env_pattern() else {
            return content.to_string();
        };
        pattern
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if let Some(primary) = &self.remote.primary_endpoint {
            validate_url("remote.primary_endpoint", primary)?;
        }
        if let Some(fallback) = &self.remote.fallback_endpoint {
            validate_url("remote.fallback_endpoint", fallback)?;
            if self.remote.primary_endpoint.is_none() {
                return Err(QuoteError::MissingConfigError {
                    field: "remote.primary_endpoint".to_string(),
                });
            }
        }
        if let Some(health) = &self.remote.health_endpoint {
            validate_url("remote.health_endpoint", health)?;
        }

        if let Some(location) = &self.cache.location {
            if location.starts_with("http://") || location.starts_with("https://") {
                validate_url("cache.location", location)?;
            } else {
                validate_path("cache.location", location)?;
            }
        }

        if let Some(timeout) = self.resolver.timeout_seconds {
            validate_range("resolver.timeout_seconds", timeout, 1, 300)?;
        }
        if let Some(rate) = self.resolver.discount_rate {
            validate_range("resolver.discount_rate", rate, 0.0, 1.0)?;
        }

        if let Some(generator) = &self.generator {
            generator.validate()?;
        }

        if let Some(bind) = self.server.as_ref().and_then(|s| s.bind.as_deref()) {
            validate_non_empty_string("server.bind", bind)?;
        }

        Ok(())
    }

    /// 凍結成不可變的 Settings
    pub fn into_settings(self) -> Result<Settings> {
        self.validate_config()?;

        let defaults = Settings::default();

        let refresh_secret = self.refresh.secret.filter(|secret| {
            let usable = !secret.trim().is_empty() && !is_unresolved(secret);
            if !usable {
                tracing::warn!("⚠️ refresh.secret is empty or unresolved; refresh is disabled");
            }
            usable
        });

        let generator = match self.generator {
            Some(config) => config.into_settings()?,
            None => defaults.generator,
        };

        Ok(Settings {
            mode: self.resolver.mode.unwrap_or(defaults.mode),
            cache_location: self
                .cache
                .location
                .unwrap_or_else(|| DEFAULT_CACHE_LOCATION.to_string()),
            primary_endpoint: self.remote.primary_endpoint,
            fallback_endpoint: self.remote.fallback_endpoint,
            health_endpoint: self.remote.health_endpoint,
            probe_health: self.resolver.probe_health.unwrap_or(false),
            timeout: self
                .resolver
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            discount_rate: self.resolver.discount_rate.unwrap_or(DEFAULT_DISCOUNT_RATE),
            refresh_secret,
            generator,
            bind: self
                .server
                .and_then(|s| s.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
        })
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

impl GeneratorConfig {
    fn validate(&self) -> Result<()> {
        if let Some(price) = self.default_base_price {
            validate_range("generator.default_base_price", price, 1.0, 100_000.0)?;
        }
        for (destination, price) in self.base_prices.iter().flatten() {
            validate_range(
                &format!("generator.base_prices.{}", destination),
                *price,
                1.0,
                100_000.0,
            )?;
        }
        for (source, [low, high]) in self.variance.iter().flatten() {
            if SourceKey::from_label(source).is_none() {
                return Err(QuoteError::InvalidConfigValueError {
                    field: "generator.variance".to_string(),
                    value: source.clone(),
                    reason: "Unknown source; expected booking, expedia, hotels or despegar"
                        .to_string(),
                });
            }
            if !(*low > 0.0 && low <= high) {
                return Err(QuoteError::InvalidConfigValueError {
                    field: format!("generator.variance.{}", source),
                    value: format!("[{}, {}]", low, high),
                    reason: "Band must satisfy 0 < low <= high".to_string(),
                });
            }
        }
        for preset in self.presets.iter().flatten() {
            validate_non_empty_string("generator.presets.destination", &preset.destination)?;
            validate_stay(preset.checkin, preset.checkout)?;
        }
        Ok(())
    }

    fn into_settings(self) -> Result<GeneratorSettings> {
        let defaults = GeneratorSettings::default();

        let variance = match self.variance {
            Some(bands) => {
                let mut resolved = BTreeMap::new();
                for (source, [low, high]) in bands {
                    let key = SourceKey::from_label(&source).ok_or_else(|| {
                        QuoteError::InvalidConfigValueError {
                            field: "generator.variance".to_string(),
                            value: source.clone(),
                            reason: "Unknown source".to_string(),
                        }
                    })?;
                    resolved.insert(key, VarianceBand::new(low, high));
                }
                resolved
            }
            None => defaults.variance,
        };

        Ok(GeneratorSettings {
            currency: self.currency.unwrap_or(defaults.currency),
            default_base_price: self.default_base_price.unwrap_or(defaults.default_base_price),
            base_prices: self
                .base_prices
                .map(|prices| {
                    prices
                        .into_iter()
                        .map(|(name, price)| (name.trim().to_lowercase(), price))
                        .collect()
                })
                .unwrap_or(defaults.base_prices),
            variance,
            presets: self.presets.unwrap_or(defaults.presets),
        })
    }
}
