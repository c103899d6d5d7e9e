//! Conversion engine built on the `image` crate.
//!
//! Decodes each source file and re-encodes it as lossy WebP (through
//! libwebp) or AVIF on blocking worker threads, reporting one progress event
//! per written file.

use super::engine::{find_existing_outputs, BatchRequest, ConversionEngine, ConvertedFile, EngineEvent};
use crate::config::ConversionConfig;
use crate::options::OptionsState;
use async_trait::async_trait;
use futures::StreamExt;
use image::codecs::avif::AvifEncoder;
use image::DynamicImage;
use imageforged_common::{Error, ImageFormat, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Encoder settings for [`ImageEngine`].
#[derive(Debug, Clone)]
pub struct ImageEngineSettings {
    /// AVIF encoder speed, 1 (slowest) to 10 (fastest). Default: 6.
    pub avif_speed: u8,
    /// Files encoded concurrently (default: available CPU cores).
    pub max_parallel: usize,
}

impl Default for ImageEngineSettings {
    fn default() -> Self {
        Self {
            avif_speed: 6,
            max_parallel: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl From<&ConversionConfig> for ImageEngineSettings {
    fn from(config: &ConversionConfig) -> Self {
        let defaults = Self::default();
        Self {
            avif_speed: config.avif_speed,
            max_parallel: config.max_parallel.unwrap_or(defaults.max_parallel),
        }
    }
}

/// [`ConversionEngine`] encoding with the `image` crate.
pub struct ImageEngine {
    settings: ImageEngineSettings,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl ImageEngine {
    pub fn new(settings: ImageEngineSettings) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { settings, event_tx }
    }

    fn emit(tx: &broadcast::Sender<EngineEvent>, event: EngineEvent) {
        if tx.send(event).is_err() {
            debug!("No subscribers for engine event");
        }
    }
}

impl Default for ImageEngine {
    fn default() -> Self {
        Self::new(ImageEngineSettings::default())
    }
}

/// Encode one file, returning the size of the written output.
///
/// A partially written output is removed on failure so that reconciliation
/// never mistakes it for a finished file.
fn encode_file(
    source: &Path,
    target: &Path,
    format: ImageFormat,
    quality: u8,
    avif_speed: u8,
) -> Result<u64> {
    let img = image::open(source).map_err(|e| {
        Error::engine(format!("Failed to open image {}: {}", source.display(), e))
    })?;

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let written = write_encoded(&img, target, format, quality, avif_speed);
    if written.is_err() {
        let _ = std::fs::remove_file(target);
    }
    written?;

    Ok(std::fs::metadata(target)?.len())
}

fn write_encoded(
    img: &DynamicImage,
    target: &Path,
    format: ImageFormat,
    quality: u8,
    avif_speed: u8,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(target)?);

    let encoded = match format {
        ImageFormat::WebP => encode_webp(img, quality)
            .and_then(|data| writer.write_all(&data).map_err(|e| e.to_string())),
        ImageFormat::Avif => img
            .write_with_encoder(AvifEncoder::new_with_speed_quality(
                &mut writer,
                avif_speed,
                quality,
            ))
            .map_err(|e| e.to_string()),
    };
    encoded.map_err(|e| {
        Error::engine(format!(
            "{} encoding failed for {}: {}",
            format.display_name(),
            target.display(),
            e
        ))
    })?;

    writer.flush()?;
    Ok(())
}

/// Lossy WebP at `quality` (1-100).
fn encode_webp(img: &DynamicImage, quality: u8) -> std::result::Result<Vec<u8>, String> {
    // libwebp only takes 8-bit RGB or RGBA buffers.
    let pixels = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };
    let encoder = webp::Encoder::from_image(&pixels).map_err(|e| e.to_string())?;
    Ok(encoder.encode(f32::from(quality)).to_vec())
}

#[async_trait]
impl ConversionEngine for ImageEngine {
    fn name(&self) -> &'static str {
        "image"
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    async fn batch_convert(
        &self,
        request: &BatchRequest,
        options: &OptionsState,
    ) -> Result<Vec<ConvertedFile>> {
        if !(1..=100).contains(&options.quality) {
            return Err(Error::engine(format!(
                "Quality must be between 1 and 100, got {}",
                options.quality
            )));
        }

        let output_dir = options.output.clone();
        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            Error::engine(format!(
                "Failed to create directory {}: {}",
                output_dir.display(),
                e
            ))
        })?;

        info!(
            "Encoding {} files to {} (quality {}) in {}",
            request.len(),
            options.format.display_name(),
            options.quality,
            output_dir.display()
        );
        Self::emit(&self.event_tx, EngineEvent::TotalKnown(request.len()));

        let format = options.format;
        let quality = options.quality;
        let avif_speed = self.settings.avif_speed;

        let converted: Vec<ConvertedFile> = futures::stream::iter(request.items.iter().cloned())
            .map(|item| {
                let tx = self.event_tx.clone();
                let target = item.target_path(&output_dir);
                async move {
                    let source = item.source_path.clone();
                    let out = target.clone();
                    let encoded = tokio::task::spawn_blocking(move || {
                        encode_file(&source, &out, format, quality, avif_speed)
                    })
                    .await;

                    match encoded {
                        Ok(Ok(output_size)) => {
                            debug!("Encoded {:?} -> {:?}", item.source_path, target);
                            Self::emit(&tx, EngineEvent::ItemCompleted(item.id));
                            Some(ConvertedFile {
                                id: item.id,
                                output_path: target,
                                output_size,
                            })
                        }
                        Ok(Err(e)) => {
                            warn!("Failed to convert {:?}: {}", item.source_path, e);
                            None
                        }
                        Err(e) => {
                            warn!("Encoder task for {:?} failed: {}", item.source_path, e);
                            None
                        }
                    }
                }
            })
            .buffered(self.settings.max_parallel.max(1))
            .filter_map(|converted| async move { converted })
            .collect()
            .await;

        info!("Encoded {}/{} files", converted.len(), request.len());
        Ok(converted)
    }

    async fn reconcile_existing(
        &self,
        request: &BatchRequest,
        output_dir: &Path,
    ) -> Result<Vec<ConvertedFile>> {
        find_existing_outputs(request, output_dir).await
    }
}
