//! Compression orchestrator
//!
//! Parses the upload, runs the walker and optimizer, serializes the result
//! and decides whether it is worth handing back.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use lopdf::Document;

use crate::config::CompressionConfig;
use crate::error::CompressError;
use crate::format::format_bytes;
use crate::pdf::{decrypt_with_empty_password, optimize, walk, OptimizeOptions, WalkStats};

/// Outcome of one compression run
#[derive(Debug, Clone, PartialEq)]
pub enum CompressionResult {
    /// The output is smaller than the input
    Success {
        original_size: u64,
        compressed_size: u64,
        savings: u64,
        /// Size reduction in percent of the original
        ratio: f64,
        output: Vec<u8>,
        processed_count: usize,
        skipped_count: usize,
    },
    /// Re-encoding did not make the file smaller; nothing to hand back
    AlreadyOptimal {
        original_size: u64,
        compressed_size: u64,
        processed_count: usize,
        skipped_count: usize,
    },
    Failure { reason: String },
}

impl CompressionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CompressionResult::Success { .. })
    }

    /// Compressed PDF bytes; only a `Success` carries them
    pub fn output(&self) -> Option<&[u8]> {
        match self {
            CompressionResult::Success { output, .. } => Some(output),
            _ => None,
        }
    }

    /// One-line message suitable for showing to the user
    pub fn summary(&self) -> String {
        match self {
            CompressionResult::Success {
                original_size,
                compressed_size,
                savings,
                ratio,
                ..
            } => format!(
                "Compressed {} to {}, saving {} ({:.1}%)",
                format_bytes(*original_size),
                format_bytes(*compressed_size),
                format_bytes(*savings),
                ratio
            ),
            CompressionResult::AlreadyOptimal {
                compressed_size, ..
            } => format!(
                "This PDF is already highly optimized. The compressed file ({}) is not smaller than the original.",
                format_bytes(*compressed_size)
            ),
            CompressionResult::Failure { reason } => format!(
                "An error occurred: {}. The PDF might be corrupted or encrypted.",
                reason
            ),
        }
    }
}

/// Compress a PDF held in memory.
///
/// Never panics and never returns partial output: every fatal problem,
/// including a panic inside a third-party parser, becomes `Failure`.
pub fn compress(input: &[u8], config: &CompressionConfig) -> CompressionResult {
    let original_size = input.len() as u64;

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run(input, config)))
        .unwrap_or_else(|payload| Err(CompressError::Panicked(panic_message(payload))));

    match outcome {
        Ok((output, stats)) => classify(original_size, output, &stats),
        Err(e) => {
            log::warn!("Compression failed: {}", e);
            CompressionResult::Failure {
                reason: e.to_string(),
            }
        }
    }
}

fn run(input: &[u8], config: &CompressionConfig) -> Result<(Vec<u8>, WalkStats), CompressError> {
    config.validate()?;

    let mut doc =
        Document::load_mem(input).map_err(|e| CompressError::DocumentParse(e.to_string()))?;
    if doc.is_encrypted() {
        decrypt_with_empty_password(&mut doc).map_err(|e| {
            log::debug!("Cannot decrypt with an empty user password: {}", e);
            CompressError::Encrypted
        })?;
        log::info!("Removed owner-password encryption");
    }
    doc.catalog()
        .map_err(|e| CompressError::DocumentParse(format!("no document catalog: {}", e)))?;

    log::info!(
        "Loaded PDF with {} pages; {} mode, {} PPI, quality {}",
        doc.get_pages().len(),
        config.mode.name(),
        config.target_ppi,
        config.jpeg_quality
    );

    let stats = walk(&mut doc, config);
    log::info!(
        "Re-encoded {} images, skipped {}",
        stats.processed,
        stats.skipped
    );

    optimize(&mut doc, OptimizeOptions::for_mode(config.mode));

    let mut output = Vec::with_capacity(input.len());
    doc.save_to(&mut output)
        .map_err(|e| CompressError::Serialization(e.to_string()))?;

    Ok((output, stats))
}

/// Decide between `Success` and `AlreadyOptimal` from the sizes alone
pub fn classify(original_size: u64, output: Vec<u8>, stats: &WalkStats) -> CompressionResult {
    let compressed_size = output.len() as u64;

    if compressed_size >= original_size {
        log::info!(
            "Output ({}) is not smaller than input ({})",
            format_bytes(compressed_size),
            format_bytes(original_size)
        );
        return CompressionResult::AlreadyOptimal {
            original_size,
            compressed_size,
            processed_count: stats.processed,
            skipped_count: stats.skipped,
        };
    }

    let savings = original_size - compressed_size;
    CompressionResult::Success {
        original_size,
        compressed_size,
        savings,
        ratio: savings as f64 / original_size as f64 * 100.0,
        output,
        processed_count: stats.processed,
        skipped_count: stats.skipped,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
