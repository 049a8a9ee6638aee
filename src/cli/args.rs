use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::defaults::*;

#[derive(Parser, Debug)]
#[command(name = "pdf-squeeze")]
#[command(
    author,
    version,
    about = "Shrink PDF files by downsampling and re-encoding their embedded images"
)]
pub struct Args {
    /// Input PDF file path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output PDF file path (defaults to <input>_compressed.pdf)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Compression mode; selects default PPI and quality
    #[arg(short, long, value_enum, default_value = "balanced")]
    pub mode: CompressionMode,

    /// Override the target image resolution (pixels per inch)
    #[arg(long, value_parser = clap::value_parser!(u32).range(MIN_TARGET_PPI as i64..=MAX_TARGET_PPI as i64))]
    pub ppi: Option<u32>,

    /// Override the JPEG quality used for re-encoded images
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(MIN_JPEG_QUALITY as i64..=MAX_JPEG_QUALITY as i64))]
    pub quality: Option<u8>,

    /// Per-image time budget in seconds (0 disables the budget)
    #[arg(long)]
    pub image_timeout_secs: Option<u64>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Default values a compression mode selects
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModeDefaults {
    pub target_ppi: u32,
    pub jpeg_quality: u8,
    pub strip_metadata: bool,
}

/// How hard to squeeze the document
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum CompressionMode {
    /// Good balance between size and quality (150 PPI)
    #[default]
    Balanced,
    /// Smaller size, noticeable quality loss (96 PPI)
    Aggressive,
    /// Lowest quality, smallest size (72 PPI); also removes metadata
    Extreme,
}

impl CompressionMode {
    pub const fn defaults(self) -> ModeDefaults {
        match self {
            CompressionMode::Balanced => ModeDefaults {
                target_ppi: BALANCED_PPI,
                jpeg_quality: BALANCED_QUALITY,
                strip_metadata: false,
            },
            CompressionMode::Aggressive => ModeDefaults {
                target_ppi: AGGRESSIVE_PPI,
                jpeg_quality: AGGRESSIVE_QUALITY,
                strip_metadata: false,
            },
            CompressionMode::Extreme => ModeDefaults {
                target_ppi: EXTREME_PPI,
                jpeg_quality: EXTREME_QUALITY,
                strip_metadata: true,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompressionMode::Balanced => "Balanced",
            CompressionMode::Aggressive => "Aggressive",
            CompressionMode::Extreme => "Extreme",
        }
    }
}

impl Args {
    /// Get the output path, defaulting to `<stem>_compressed.pdf` next to the input
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = self
                .input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            self.input.with_file_name(format!("{}_compressed.pdf", stem))
        })
    }
}
