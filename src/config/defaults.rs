use std::time::Duration;

/// Lowest accepted target resolution in pixels per inch
pub const MIN_TARGET_PPI: u32 = 50;

/// Highest accepted target resolution in pixels per inch
pub const MAX_TARGET_PPI: u32 = 300;

/// Lowest accepted JPEG quality
pub const MIN_JPEG_QUALITY: u8 = 10;

/// Highest accepted JPEG quality
pub const MAX_JPEG_QUALITY: u8 = 95;

/// Balanced mode: good balance between size and quality
pub const BALANCED_PPI: u32 = 150;
pub const BALANCED_QUALITY: u8 = 75;

/// Aggressive mode: smaller size, noticeable quality loss
pub const AGGRESSIVE_PPI: u32 = 96;
pub const AGGRESSIVE_QUALITY: u8 = 65;

/// Extreme mode: lowest quality, smallest size, metadata removed
pub const EXTREME_PPI: u32 = 72;
pub const EXTREME_QUALITY: u8 = 50;

/// Longest side of a letter/A4 page in inches, rounded up.
/// Images are sized against this rather than the page box they sit on.
pub const ASSUMED_PAGE_INCHES: u32 = 12;

/// Wall-clock budget for decoding, resizing and encoding one image
pub const DEFAULT_IMAGE_TIME_BUDGET: Duration = Duration::from_secs(10);

/// Images above this pixel count are skipped instead of decoded (~100 MP)
pub const MAX_IMAGE_PIXELS: u64 = 100_000_000;
