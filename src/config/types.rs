use imageforged_common::{paths, ImageFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub conversion: ConversionConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Defaults for conversion options and engine tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Target format when no saved option exists.
    #[serde(default)]
    pub default_format: ImageFormat,

    /// Encoder quality (1-100) when no saved option exists.
    #[serde(default = "default_quality")]
    pub default_quality: u8,

    /// Output directory when no saved option exists.
    #[serde(default = "default_output")]
    pub default_output: PathBuf,

    /// Pause after applying results before returning to idle (default: 400)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// AVIF encoder speed, 1 (slowest) to 10 (fastest) (default: 6)
    #[serde(default = "default_avif_speed")]
    pub avif_speed: u8,

    /// Files encoded concurrently (default: number of CPU cores)
    #[serde(default)]
    pub max_parallel: Option<usize>,
}

fn default_quality() -> u8 {
    80
}

fn default_output() -> PathBuf {
    PathBuf::from("./converted")
}

fn default_settle_delay_ms() -> u64 {
    400
}

fn default_avif_speed() -> u8 {
    6
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            default_format: ImageFormat::default(),
            default_quality: default_quality(),
            default_output: default_output(),
            settle_delay_ms: default_settle_delay_ms(),
            avif_speed: default_avif_speed(),
            max_parallel: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Skip files and directories whose name starts with a dot.
    #[serde(default = "default_true")]
    pub skip_hidden: bool,

    /// Extensions picked up when listing a directory.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    paths::image_extensions()
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            skip_hidden: true,
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettingsConfig {
    /// File the user's options are persisted to.
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("~/.config/imageforged/settings.toml")
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

impl SettingsConfig {
    /// The settings path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        let raw = self.path.to_string_lossy();
        PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
    }
}
