use std::time::Duration;

use thiserror::Error;

/// Fatal errors: the run produces no output document.
#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Failed to parse PDF: {0}")]
    DocumentParse(String),

    #[error("PDF is encrypted and cannot be opened without a password")]
    Encrypted,

    #[error("Invalid compression settings: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Failed to write compressed PDF: {0}")]
    Serialization(String),

    #[error("Internal error while compressing: {0}")]
    Panicked(String),
}

/// Per-image errors. These never abort a run; the image is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("Cannot decode image: {0}")]
    Decode(String),

    #[error("Unsupported stream filter: {0}")]
    UnsupportedFilter(String),

    #[error("Unsupported color space: {0}")]
    UnsupportedColorSpace(String),

    #[error("Unsupported bit depth: {0} bits per component")]
    UnsupportedBitDepth(i64),

    #[error("Unsupported /Decode array: {0}")]
    UnsupportedDecode(String),

    #[error("Color-key /Mask cannot be carried over to a re-encoded image")]
    ColorKeyMask,

    #[error("Cannot encode image: {0}")]
    Encode(String),

    #[error("Transcoding exceeded the {0:?} time budget")]
    TimedOut(Duration),

    #[error("Transcoder worker failed: {0}")]
    WorkerFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target PPI {0} is outside the supported range 50-300")]
    PpiOutOfRange(u32),

    #[error("JPEG quality {0} is outside the supported range 10-95")]
    QualityOutOfRange(u8),
}
