use anyhow::{Context, Result};
use clap::Parser;
use std::fs;

use pdf_squeeze::cli::Args;
use pdf_squeeze::config::CompressionConfig;
use pdf_squeeze::{compress, format_bytes, CompressionResult};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    // Read input file
    let original = fs::read(&args.input)
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;

    let config = CompressionConfig::from_args(&args);
    log::info!(
        "Compressing {} ({}) in {} mode",
        args.input.display(),
        format_bytes(original.len() as u64),
        config.mode.name()
    );

    let result = compress(&original, &config);

    match result {
        CompressionResult::Success {
            ref output,
            original_size,
            compressed_size,
            savings,
            ratio,
            processed_count,
            skipped_count,
        } => {
            let output_path = args.output_path();
            fs::write(&output_path, output).with_context(|| {
                format!("Failed to write output file: {}", output_path.display())
            })?;

            println!("Original size:   {}", format_bytes(original_size));
            println!("Compressed size: {}", format_bytes(compressed_size));
            println!("Space saved:     {} ({:.1}%)", format_bytes(savings), ratio);
            println!(
                "Images re-encoded: {} (skipped {})",
                processed_count, skipped_count
            );
            println!("Successfully wrote PDF to {}", output_path.display());
        }
        CompressionResult::AlreadyOptimal {
            original_size,
            processed_count,
            ..
        } => {
            println!("Original size:   {}", format_bytes(original_size));
            println!("Images re-encoded: {}", processed_count);
            println!("{}", result.summary());
        }
        CompressionResult::Failure { .. } => {
            anyhow::bail!("{}", result.summary());
        }
    }

    Ok(())
}
