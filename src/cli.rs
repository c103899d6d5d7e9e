use clap::{Parser, Subcommand};
use imageforged_common::ImageFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "imageforged")]
#[command(author, version, about = "Batch image conversion tool")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert images and directories of images
    Convert {
        /// Files or directories to convert
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Target format (webp or avif); saved as the new default
        #[arg(short, long)]
        format: Option<ImageFormat>,

        /// Encoder quality, 1-100; saved as the new default
        #[arg(short, long)]
        quality: Option<u8>,

        /// Output directory; saved as the new default
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or change saved conversion options
    Options {
        #[command(subcommand)]
        action: OptionsAction,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum OptionsAction {
    /// Print the current options
    Show,

    /// Set the target format
    SetFormat { format: ImageFormat },

    /// Set the encoder quality (1-100)
    SetQuality { quality: u8 },

    /// Set the output directory
    SetOutput { output: PathBuf },
}
