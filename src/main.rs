mod cli;

use imageforged::{
    config,
    conversion::{ImageEngine, ImageEngineSettings, OutcomeStatus},
    inspect::FsInspector,
    options::OptionsState,
    settings::TomlSettingsStore,
    Orchestrator,
};
use imageforged_common::{format_bytes, ImageFormat};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, OptionsAction};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Store events included in a `--json` report.
const REPORT_EVENTS: usize = 50;

fn build_orchestrator(config: &config::Config) -> Result<Orchestrator> {
    let settings_path = config.settings.resolved_path();
    tracing::debug!("Using settings file {:?}", settings_path);
    let settings = TomlSettingsStore::open(&settings_path)
        .with_context(|| format!("Failed to open settings file: {:?}", settings_path))?;

    let engine = ImageEngine::new(ImageEngineSettings::from(&config.conversion));

    Ok(Orchestrator::new(
        config,
        Arc::new(FsInspector::new()),
        Arc::new(engine),
        Arc::new(settings),
    ))
}

fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "imageforged=trace,imageforged_common=debug"
    } else {
        "imageforged=debug,imageforged_common=info"
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| default_log_filter(cli.verbose).to_string());

    // stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            paths,
            format,
            quality,
            output,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_paths(
                cli.config.as_deref(),
                &paths,
                format,
                quality,
                output,
                json,
            ))
        }
        Commands::Options { action } => manage_options(cli.config.as_deref(), action),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("imageforged {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn convert_paths(
    config_path: Option<&Path>,
    paths: &[PathBuf],
    format: Option<ImageFormat>,
    quality: Option<u8>,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let orchestrator = build_orchestrator(&config)?;

    if let Some(format) = format {
        orchestrator.set_format(format);
    }
    if let Some(quality) = quality {
        orchestrator.set_quality(quality)?;
    }
    if let Some(output) = output {
        orchestrator.set_output(output);
    }

    let flags = orchestrator.ingest(paths).await?;
    let outcome = orchestrator.convert().await?;
    let stats = orchestrator.stats();

    if json {
        let report = serde_json::json!({
            "ingest": flags,
            "outcome": outcome,
            "stats": stats,
            "converted": orchestrator.complete(),
            "pending": orchestrator.standby(),
            "events": orchestrator.recent_events(REPORT_EVENTS),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let options = orchestrator.options();
        println!(
            "Queued {} file(s), {} skipped",
            flags.added, flags.skipped
        );
        if flags.duplicate_found {
            println!("  Some files were already queued");
        }
        if flags.unsupported_found {
            println!("  Some files are not supported images (JPEG, PNG or WebP)");
        }
        if flags.saw_nested_directory {
            println!("  Nested directories were skipped");
        }

        for entry in orchestrator.complete() {
            println!(
                "  {} {} -> {}",
                entry.file_name,
                format_bytes(entry.size_before),
                format_bytes(entry.size_after)
            );
        }

        println!(
            "\nConverted {}/{} to {} in {}",
            outcome.converted,
            outcome.requested,
            options.format.display_name(),
            options.output.display()
        );
        if let Some(ref message) = outcome.message {
            println!("Engine: {}", message);
        }
        println!(
            "Total: {} -> {} ({} saved)",
            format_bytes(stats.bytes_before),
            format_bytes(stats.bytes_after),
            format_bytes(stats.bytes_saved())
        );
    }

    match outcome.status {
        OutcomeStatus::Failed if outcome.requested > 0 => {
            anyhow::bail!(
                "Conversion failed: {}",
                outcome.message.as_deref().unwrap_or("no files converted")
            )
        }
        OutcomeStatus::Partial => {
            tracing::warn!(
                "Only {} of {} files were converted",
                outcome.converted,
                outcome.requested
            );
            Ok(())
        }
        _ => Ok(()),
    }
}

fn manage_options(config_path: Option<&Path>, action: OptionsAction) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let orchestrator = build_orchestrator(&config)?;

    match action {
        OptionsAction::Show => {}
        OptionsAction::SetFormat { format } => orchestrator.set_format(format),
        OptionsAction::SetQuality { quality } => orchestrator.set_quality(quality)?,
        OptionsAction::SetOutput { output } => {
            orchestrator.set_output(output);
        }
    }

    print_options(&orchestrator.options());
    Ok(())
}

fn print_options(options: &OptionsState) {
    println!("Format:  {}", options.format.display_name());
    println!("Quality: {}", options.quality);
    println!("Output:  {}", options.output.display());
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            print_config(&config);
        }
    }

    Ok(())
}

fn print_config(config: &config::Config) {
    let conversion = &config.conversion;
    println!(
        "  Default format: {}",
        conversion.default_format.display_name()
    );
    println!("  Default quality: {}", conversion.default_quality);
    println!("  Default output: {}", conversion.default_output.display());
    println!("  AVIF speed: {}", conversion.avif_speed);
    println!("  Settle delay: {} ms", conversion.settle_delay_ms);
    println!("  Extensions: {}", config.ingest.extensions.join(", "));
    println!("  Settings file: {}", config.settings.path.display());
}
