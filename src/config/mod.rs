#[cfg(feature = "cli")]
pub mod cli;
pub mod settings;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::Cli;
pub use settings::{GeneratorSettings, Preset, Settings, VarianceBand};
pub use toml_config::TomlConfig;
