//! Conversion options: target format, quality and output directory.

use crate::config::ConversionConfig;
use crate::settings::SettingsStore;
use crate::state::StateStore;
use imageforged_common::{Error, ImageFormat, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const KEY_FORMAT: &str = "format";
pub const KEY_QUALITY: &str = "quality";
pub const KEY_OUTPUT: &str = "output";

/// Options applied to the next conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsState {
    pub format: ImageFormat,
    /// Encoder quality, 1-100.
    pub quality: u8,
    /// Directory outputs are written under.
    pub output: PathBuf,
}

impl OptionsState {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            format: config.default_format,
            quality: config.default_quality,
            output: config.default_output.clone(),
        }
    }
}

impl Default for OptionsState {
    fn default() -> Self {
        Self::from_config(&ConversionConfig::default())
    }
}

fn validate_quality(quality: u8) -> Result<u8> {
    if (1..=100).contains(&quality) {
        Ok(quality)
    } else {
        Err(Error::validation(format!(
            "quality must be between 1 and 100, got {}",
            quality
        )))
    }
}

/// Owns the current options and keeps them persisted.
pub struct OptionsController {
    state: RwLock<OptionsState>,
    settings: Arc<dyn SettingsStore>,
    store: Arc<StateStore>,
}

impl OptionsController {
    /// Read saved options from `settings`, falling back to `defaults` for
    /// keys that are missing or malformed.
    pub fn load(
        settings: Arc<dyn SettingsStore>,
        store: Arc<StateStore>,
        defaults: OptionsState,
    ) -> Self {
        let mut state = defaults;

        if let Some(raw) = settings.get(KEY_FORMAT) {
            match raw.parse::<ImageFormat>() {
                Ok(format) => state.format = format,
                Err(e) => warn!("Ignoring saved format {:?}: {}", raw, e),
            }
        }

        if let Some(raw) = settings.get(KEY_QUALITY) {
            let parsed = raw
                .parse::<u8>()
                .map_err(|e| Error::validation(e.to_string()))
                .and_then(validate_quality);
            match parsed {
                Ok(quality) => state.quality = quality,
                Err(e) => warn!("Ignoring saved quality {:?}: {}", raw, e),
            }
        }

        if let Some(raw) = settings.get(KEY_OUTPUT) {
            if raw.trim().is_empty() {
                warn!("Ignoring empty saved output directory");
            } else {
                state.output = PathBuf::from(raw);
            }
        }

        debug!("Loaded options: {:?}", state);
        Self {
            state: RwLock::new(state),
            settings,
            store,
        }
    }

    pub fn snapshot(&self) -> OptionsState {
        self.state.read().clone()
    }

    pub fn set_format(&self, format: ImageFormat) {
        self.state.write().format = format;
        info!("Output format set to {}", format.display_name());
        self.persist(KEY_FORMAT, format.extension());
    }

    /// Fails with a validation error if `quality` is outside 1..=100.
    pub fn set_quality(&self, quality: u8) -> Result<()> {
        let quality = validate_quality(quality)?;
        self.state.write().quality = quality;
        info!("Quality set to {}", quality);
        self.persist(KEY_QUALITY, &quality.to_string());
        Ok(())
    }

    /// Change the output directory.
    ///
    /// Completed entries refer to files under the old directory, so they are
    /// dropped when the directory actually changes; undo snapshots are kept.
    /// Returns `true` if the directory changed.
    pub fn set_output(&self, output: impl Into<PathBuf>) -> bool {
        let output = output.into();
        {
            let mut state = self.state.write();
            if state.output == output {
                debug!("Output directory unchanged: {:?}", output);
                return false;
            }
            state.output = output.clone();
        }

        let invalidated = self.store.invalidate_complete();
        info!(
            "Output directory set to {:?} ({} completed entries invalidated)",
            output,
            invalidated.len()
        );
        self.persist(KEY_OUTPUT, &output.to_string_lossy());
        true
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.settings.set(key, value) {
            error!("Failed to persist option {}: {}", key, e);
        }
    }
}
