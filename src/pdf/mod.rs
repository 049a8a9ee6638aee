//! PDF image transcoding pipeline

pub mod decrypt;
pub mod extract;
pub mod optimize;
pub mod transcode;
pub mod walker;

pub use decrypt::decrypt_with_empty_password;
pub use extract::{extract_image, page_images};
pub use optimize::{optimize, reorder_objects, strip_metadata, OptimizeOptions};
pub use transcode::{transcode, transcode_within, RawImage, TranscodeParams, TranscodedImage};
pub use walker::{collect_images, walk, ImageRef, SkippedImage, WalkStats};
