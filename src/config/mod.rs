mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./imageforged.toml", "~/.config/imageforged/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let conversion = &config.conversion;

    if !(1..=100).contains(&conversion.default_quality) {
        anyhow::bail!(
            "default_quality must be between 1 and 100, got {}",
            conversion.default_quality
        );
    }

    if !(1..=10).contains(&conversion.avif_speed) {
        anyhow::bail!(
            "avif_speed must be between 1 and 10, got {}",
            conversion.avif_speed
        );
    }

    if conversion.max_parallel == Some(0) {
        anyhow::bail!("max_parallel cannot be 0");
    }

    if config.ingest.extensions.is_empty() {
        anyhow::bail!("ingest.extensions cannot be empty");
    }

    if conversion.default_output.as_os_str().is_empty() {
        tracing::warn!("default_output is empty; conversions will write to the working directory");
    }

    Ok(())
}
