use std::time::Duration;

use crate::cli::{Args, CompressionMode};
use crate::error::ConfigError;
use crate::pdf::transcode::TranscodeParams;

use super::defaults::*;

/// Runtime settings for one compression run
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionConfig {
    pub mode: CompressionMode,
    pub target_ppi: u32,
    pub jpeg_quality: u8,

    /// Longest page side assumed when converting PPI to a pixel limit
    pub assumed_page_inches: u32,

    /// Per-image wall-clock budget; `None` lets an image take as long as it needs
    pub image_time_budget: Option<Duration>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self::for_mode(CompressionMode::default())
    }
}

impl CompressionConfig {
    /// Create settings with the defaults of the given mode
    pub fn for_mode(mode: CompressionMode) -> Self {
        let defaults = mode.defaults();
        Self {
            mode,
            target_ppi: defaults.target_ppi,
            jpeg_quality: defaults.jpeg_quality,
            assumed_page_inches: ASSUMED_PAGE_INCHES,
            image_time_budget: Some(DEFAULT_IMAGE_TIME_BUDGET),
        }
    }

    /// Create settings from CLI arguments
    pub fn from_args(args: &Args) -> Self {
        let mut config = Self::for_mode(args.mode);
        if let Some(ppi) = args.ppi {
            config = config.with_target_ppi(ppi);
        }
        if let Some(quality) = args.quality {
            config = config.with_jpeg_quality(quality);
        }
        if let Some(secs) = args.image_timeout_secs {
            let budget = (secs > 0).then(|| Duration::from_secs(secs));
            config = config.with_image_time_budget(budget);
        }
        config
    }

    pub fn with_target_ppi(mut self, target_ppi: u32) -> Self {
        self.target_ppi = target_ppi;
        self
    }

    pub fn with_jpeg_quality(mut self, jpeg_quality: u8) -> Self {
        self.jpeg_quality = jpeg_quality;
        self
    }

    pub fn with_image_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.image_time_budget = budget;
        self
    }

    /// Check that overrides stay inside the supported ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TARGET_PPI..=MAX_TARGET_PPI).contains(&self.target_ppi) {
            return Err(ConfigError::PpiOutOfRange(self.target_ppi));
        }
        if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&self.jpeg_quality) {
            return Err(ConfigError::QualityOutOfRange(self.jpeg_quality));
        }
        Ok(())
    }

    /// Whether document metadata is removed before saving
    pub fn strip_metadata(&self) -> bool {
        self.mode.defaults().strip_metadata
    }

    /// Longest side, in pixels, an image may keep
    pub fn max_image_side(&self) -> u32 {
        self.target_ppi.saturating_mul(self.assumed_page_inches)
    }

    pub fn transcode_params(&self) -> TranscodeParams {
        TranscodeParams {
            max_side: self.max_image_side(),
            jpeg_quality: self.jpeg_quality,
        }
    }
}
