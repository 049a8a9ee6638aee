//! Image transcoder
//!
//! Decodes one embedded image, downsamples it when it is larger than the
//! configured limit, flattens it to RGB and re-encodes it as JPEG. Every
//! failure is returned as an [`ImageError`] so the caller can skip the image.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};

use crate::config::defaults::MAX_IMAGE_PIXELS;
use crate::error::ImageError;

/// Color model of raw (non-JPEG) pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceColor {
    Gray,
    Rgb,
    Cmyk,
}

impl DeviceColor {
    pub fn components(self) -> usize {
        match self {
            DeviceColor::Gray => 1,
            DeviceColor::Rgb => 3,
            DeviceColor::Cmyk => 4,
        }
    }

    /// Append one pixel, given in this color model, to an RGB buffer
    fn push_rgb(self, components: &[u8], out: &mut Vec<u8>) {
        match self {
            DeviceColor::Gray => out.extend_from_slice(&[components[0]; 3]),
            DeviceColor::Rgb => out.extend_from_slice(&components[..3]),
            DeviceColor::Cmyk => {
                let k = 1.0 - components[3] as f32 / 255.0;
                for &ink in &components[..3] {
                    let value = (1.0 - ink as f32 / 255.0) * k * 255.0;
                    out.push(value.round() as u8);
                }
            }
        }
    }
}

/// How raw pixel bytes map to colors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorSpec {
    Device(DeviceColor),
    /// One byte per pixel indexing into a palette of `base` colors
    Indexed { base: DeviceColor, palette: Vec<u8> },
}

/// Encoded payload of an embedded image
#[derive(Debug, Clone)]
pub enum ImageData {
    /// A complete JPEG file (`DCTDecode` stream)
    Jpeg(Vec<u8>),
    /// Unfiltered samples, 8 bits per component, row-major
    Pixels { color: ColorSpec, bytes: Vec<u8> },
}

/// An embedded image as lifted out of the document
#[derive(Debug, Clone)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub data: ImageData,
}

/// Limits applied while transcoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeParams {
    /// Longest side, in pixels, the output may have
    pub max_side: u32,
    pub jpeg_quality: u8,
}

/// A successfully re-encoded image
#[derive(Debug, Clone)]
pub struct TranscodedImage {
    /// JPEG file bytes
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

/// Output dimensions for an image, or `None` when it already fits.
///
/// Images are never upscaled. When the longest side exceeds `max_side` both
/// sides are scaled by `max_side / longest`, rounding down, never below 1.
pub fn target_dimensions(width: u32, height: u32, max_side: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_side {
        return None;
    }

    let scale = |side: u32| (side as u64 * max_side as u64 / longest as u64).max(1) as u32;
    Some((scale(width), scale(height)))
}

/// Decode, downsample and re-encode one image
pub fn transcode(raw: &RawImage, params: &TranscodeParams) -> Result<TranscodedImage, ImageError> {
    let decoded = decode(raw)?;

    let (resized, image) = match target_dimensions(decoded.width(), decoded.height(), params.max_side) {
        Some((width, height)) => (
            true,
            decoded.resize_exact(width, height, FilterType::Lanczos3),
        ),
        None => (false, decoded),
    };

    let rgb = flatten_to_rgb(image);
    let (width, height) = rgb.dimensions();
    let data = encode_jpeg(&rgb, params.jpeg_quality)?;

    Ok(TranscodedImage {
        data,
        width,
        height,
        resized,
    })
}

/// Run [`transcode`] on a worker thread, giving up after `budget`.
///
/// A worker that overruns is abandoned; its result is discarded when it
/// eventually finishes. A panicking decoder surfaces as `WorkerFailed`.
pub fn transcode_within(
    raw: RawImage,
    params: TranscodeParams,
    budget: Option<Duration>,
) -> Result<TranscodedImage, ImageError> {
    let (sender, receiver) = mpsc::channel();

    thread::Builder::new()
        .name("pdf-squeeze-transcode".to_string())
        .spawn(move || {
            let _ = sender.send(transcode(&raw, &params));
        })
        .map_err(|e| ImageError::WorkerFailed(e.to_string()))?;

    match budget {
        Some(limit) => match receiver.recv_timeout(limit) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(ImageError::TimedOut(limit)),
            Err(RecvTimeoutError::Disconnected) => Err(worker_died()),
        },
        None => receiver.recv().unwrap_or_else(|_| Err(worker_died())),
    }
}

fn worker_died() -> ImageError {
    ImageError::WorkerFailed("transcoder stopped without a result".to_string())
}

fn decode(raw: &RawImage) -> Result<DynamicImage, ImageError> {
    let pixels = raw.width as u64 * raw.height as u64;
    if pixels > MAX_IMAGE_PIXELS {
        return Err(ImageError::Decode(format!(
            "{}x{} exceeds the {} pixel limit",
            raw.width, raw.height, MAX_IMAGE_PIXELS
        )));
    }

    match &raw.data {
        ImageData::Jpeg(bytes) => image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
            .map_err(|e| ImageError::Decode(e.to_string())),
        ImageData::Pixels { color, bytes } => {
            pixels_to_image(raw.width, raw.height, color, bytes)
        }
    }
}

fn pixels_to_image(
    width: u32,
    height: u32,
    color: &ColorSpec,
    bytes: &[u8],
) -> Result<DynamicImage, ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::Decode("image has no pixels".to_string()));
    }
    let pixels = width as usize * height as usize;

    match color {
        ColorSpec::Device(DeviceColor::Gray) => {
            let samples = take(bytes, pixels)?.to_vec();
            GrayImage::from_raw(width, height, samples)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| ImageError::Decode("grayscale buffer mismatch".to_string()))
        }
        ColorSpec::Device(DeviceColor::Rgb) => {
            let samples = take(bytes, pixels * 3)?.to_vec();
            rgb_image(width, height, samples)
        }
        ColorSpec::Device(DeviceColor::Cmyk) => {
            let mut rgb = Vec::with_capacity(pixels * 3);
            for pixel in take(bytes, pixels * 4)?.chunks_exact(4) {
                DeviceColor::Cmyk.push_rgb(pixel, &mut rgb);
            }
            rgb_image(width, height, rgb)
        }
        ColorSpec::Indexed { base, palette } => {
            let n = base.components();
            let mut rgb = Vec::with_capacity(pixels * 3);
            for &index in take(bytes, pixels)? {
                let start = index as usize * n;
                let entry = palette.get(start..start + n).ok_or_else(|| {
                    ImageError::Decode(format!("palette index {} out of range", index))
                })?;
                base.push_rgb(entry, &mut rgb);
            }
            rgb_image(width, height, rgb)
        }
    }
}

fn take(bytes: &[u8], len: usize) -> Result<&[u8], ImageError> {
    bytes.get(..len).ok_or_else(|| {
        ImageError::Decode(format!(
            "expected {} bytes of samples, found {}",
            len,
            bytes.len()
        ))
    })
}

fn rgb_image(width: u32, height: u32, samples: Vec<u8>) -> Result<DynamicImage, ImageError> {
    RgbImage::from_raw(width, height, samples)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| ImageError::Decode("RGB buffer mismatch".to_string()))
}

/// JPEG has no alpha or palette; any transparency is dropped here for good.
fn flatten_to_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let (width, height) = rgb.dimensions();
    let (w, h) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(ImageError::Encode(format!(
                "{}x{} is too large for JPEG",
                width, height
            )))
        }
    };

    let mut jpeg_bytes = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, quality);
    encoder.set_sampling_factor(jpeg_encoder::SamplingFactor::R_4_2_0);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(rgb.as_raw(), w, h, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| ImageError::Encode(e.to_string()))?;

    Ok(jpeg_bytes)
}
