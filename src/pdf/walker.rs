//! Document walker
//!
//! Visits every image XObject in page order and swaps in the transcoded
//! version. One bad image never stops the walk: it is counted as skipped and
//! left byte-for-byte as it was.

use std::collections::HashSet;

use lopdf::{Document, Object, ObjectId};

use crate::config::CompressionConfig;
use crate::error::ImageError;

use super::extract::{extract_image, page_images};
use super::transcode::{transcode_within, TranscodedImage};

/// Dictionary keys describing the old encoding; dropped on replacement
const ENCODING_KEYS: [&[u8]; 6] = [
    b"Filter",
    b"DecodeParms",
    b"ColorSpace",
    b"BitsPerComponent",
    b"Decode",
    b"Length",
];

/// An image XObject together with where it was first seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// 1-based page number
    pub page: u32,
    /// Resource name on that page, e.g. `Im0`
    pub name: String,
    pub id: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedImage {
    pub page: u32,
    pub name: String,
    pub reason: ImageError,
}

/// Tally of one walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub processed: usize,
    pub skipped: usize,
    pub skipped_images: Vec<SkippedImage>,
}

impl WalkStats {
    fn record(mut self, image: ImageRef, outcome: Result<(), ImageError>) -> Self {
        match outcome {
            Ok(()) => self.processed += 1,
            Err(reason) => {
                log::warn!(
                    "Skipping image {} on page {}: {}",
                    image.name,
                    image.page,
                    reason
                );
                self.skipped += 1;
                self.skipped_images.push(SkippedImage {
                    page: image.page,
                    name: image.name,
                    reason,
                });
            }
        }
        self
    }
}

/// All image XObjects in document order: pages ascending, then resource order.
///
/// An image shared by several pages is listed once, under the first page
/// that uses it.
pub fn collect_images(doc: &Document) -> Vec<ImageRef> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for (page, page_id) in doc.get_pages() {
        for (name, id) in page_images(doc, page_id) {
            if seen.insert(id) {
                images.push(ImageRef { page, name, id });
            }
        }
    }

    images
}

/// Transcode every image in place and report what happened
pub fn walk(doc: &mut Document, config: &CompressionConfig) -> WalkStats {
    let params = config.transcode_params();

    collect_images(doc)
        .into_iter()
        .fold(WalkStats::default(), |stats, image| {
            let outcome = extract_image(doc, image.id)
                .and_then(|raw| transcode_within(raw, params, config.image_time_budget))
                .and_then(|transcoded| {
                    log::debug!(
                        "Page {} image {}: re-encoded to {}x{} ({} bytes{})",
                        image.page,
                        image.name,
                        transcoded.width,
                        transcoded.height,
                        transcoded.data.len(),
                        if transcoded.resized { ", downsampled" } else { "" }
                    );
                    replace_image(doc, image.id, transcoded)
                });
            stats.record(image, outcome)
        })
}

/// Swap an image stream's payload for a transcoded JPEG.
///
/// Entries unrelated to encoding (`SMask`, `Interpolate`, `Intent`, ...) stay.
pub fn replace_image(
    doc: &mut Document,
    id: ObjectId,
    image: TranscodedImage,
) -> Result<(), ImageError> {
    let stream = doc
        .get_object_mut(id)
        .and_then(Object::as_stream_mut)
        .map_err(|e| ImageError::Encode(e.to_string()))?;

    for key in ENCODING_KEYS {
        stream.dict.remove(key);
    }
    stream.dict.set("Width", image.width as i64);
    stream.dict.set("Height", image.height as i64);
    stream.dict.set("ColorSpace", "DeviceRGB");
    stream.dict.set("BitsPerComponent", 8);
    stream.dict.set("Filter", "DCTDecode");
    stream.set_content(image.data);
    stream.allows_compression = false;

    Ok(())
}
