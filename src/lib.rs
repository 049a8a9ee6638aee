pub mod cli;
pub mod compressor;
pub mod config;
pub mod error;
pub mod format;
pub mod pdf;

pub use cli::CompressionMode;
pub use compressor::{classify, compress, CompressionResult};
pub use config::CompressionConfig;
pub use error::{CompressError, ConfigError, ImageError};
pub use format::format_bytes;
pub use pdf::WalkStats;

/// Compress a PDF with the defaults of a mode.
///
/// Shorthand for [`compress`] with [`CompressionConfig::for_mode`]. Use
/// `compress` directly to override the target PPI or JPEG quality.
///
/// # Example
///
/// ```no_run
/// use pdf_squeeze::{compress_with_mode, CompressionMode, CompressionResult};
///
/// let original = std::fs::read("scan.pdf").unwrap();
///
/// match compress_with_mode(&original, CompressionMode::Aggressive) {
///     CompressionResult::Success { output, .. } => {
///         std::fs::write("scan_compressed.pdf", output).unwrap();
///     }
///     other => println!("{}", other.summary()),
/// }
/// ```
pub fn compress_with_mode(input: &[u8], mode: CompressionMode) -> CompressionResult {
    compress(input, &CompressionConfig::for_mode(mode))
}
