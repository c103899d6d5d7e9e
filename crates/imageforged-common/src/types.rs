//! Core type definitions for output formats and accepted inputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MIME types accepted as conversion input.
pub const ALLOWED_INPUT_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// Check whether a MIME type is accepted as conversion input.
pub fn is_allowed_input_mime(mime: &str) -> bool {
    ALLOWED_INPUT_MIME_TYPES.contains(&mime)
}

/// Target format of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// WebP output.
    #[default]
    WebP,
    /// AVIF output.
    Avif,
}

impl ImageFormat {
    /// File extension written for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }

    /// MIME type of files in this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
        }
    }

    /// Human-readable format name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::WebP => "WebP",
            Self::Avif => "AVIF",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "webp" => Ok(Self::WebP),
            "avif" => Ok(Self::Avif),
            other => Err(crate::Error::invalid_input(format!(
                "unknown format: {other}"
            ))),
        }
    }
}

/// Format a byte count for display, e.g. `1.46 MB`.
///
/// Values that would print above 999 in a unit are promoted to the next one.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["bytes", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 byte".to_string();
    }

    let mut unit = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    unit = unit.min(UNITS.len() - 1);
    let mut value = bytes as f64 / 1024f64.powi(unit as i32);

    if value > 999.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.*} {}", unit.min(2), value, UNITS[unit])
}
