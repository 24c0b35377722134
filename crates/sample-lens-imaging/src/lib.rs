#![warn(missing_docs)]
//! # sample-lens-imaging
//!
//! ## Purpose
//! Normalizes a user-selected image file into a canonical square payload.
//!
//! ## Responsibilities
//! - Reject files that are not images before any decoding work.
//! - Crop the largest centered square from the decoded bitmap.
//! - Scale the crop to the canonical 512x512 resolution and encode as JPEG.
//! - Return both the submission payload and a displayable preview.
//!
//! ## Data flow
//! File picker or drag-and-drop bytes -> [`prepare_image`] ->
//! [`PreparedImage`] whose payload is submitted by the session controller and
//! whose preview is shown by the presentation layer.
//!
//! ## Ownership and lifetimes
//! The prepared image owns its encoded buffers; the source bytes are only
//! borrowed for the duration of the call.
//!
//! ## Error model
//! Undecodable or non-image input fails with [`ImagingError`]. Callers map
//! these to the `InvalidInput` failure and leave any existing preview alone.
//!
//! ## Security and privacy notes
//! Nothing is written to disk. Logs carry dimensions and byte counts only.

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use sample_lens_core::{AnalysisFailure, CANONICAL_RESOLUTION, CoreError, ImagePayload};
use thiserror::Error;
use tracing::debug;

/// JPEG quality used for submitted payloads.
pub const PAYLOAD_JPEG_QUALITY: u8 = 85;

/// Media type of the encoded payload.
pub const PAYLOAD_MEDIA_TYPE: &str = "image/jpeg";

/// How the user handed the file to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Chosen through a file dialog or camera capture input.
    FilePicker,
    /// Dropped onto the upload area.
    DragAndDrop,
}

/// Raw file as received from the user.
#[derive(Debug, Clone, Copy)]
pub struct RawImageFile<'a> {
    /// Input channel.
    pub source: ImageSource,
    /// Media type reported by the input channel, if any.
    pub declared_media_type: Option<&'a str>,
    /// Undecoded file contents.
    pub bytes: &'a [u8],
}

/// Centered square region inside the source bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    /// Left offset in source pixels.
    pub x: u32,
    /// Top offset in source pixels.
    pub y: u32,
    /// Edge length in source pixels.
    pub size: u32,
}

/// Output of the preprocessing stage.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Payload to submit.
    pub payload: ImagePayload,
    /// `data:image/jpeg;base64,...` URL for display.
    pub preview_data_url: String,
    /// Decoded source width.
    pub source_width: u32,
    /// Decoded source height.
    pub source_height: u32,
    /// Region of the source that was kept.
    pub crop: CropRegion,
}

/// Computes the largest centered square inside `width x height`.
///
/// # Errors
/// Returns [`ImagingError::ZeroDimensions`] when either side is zero.
pub fn centered_square(width: u32, height: u32) -> Result<CropRegion, ImagingError> {
    if width == 0 || height == 0 {
        return Err(ImagingError::ZeroDimensions);
    }

    let size = width.min(height);
    Ok(CropRegion {
        x: (width - size) / 2,
        y: (height - size) / 2,
        size,
    })
}

/// Decodes, crops, scales, and encodes one user-selected image.
///
/// Picker and drag-and-drop inputs take the same path; the source only shows
/// up in logs.
///
/// # Errors
/// Returns [`ImagingError::NotAnImage`] when the declared media type is not
/// `image/*`, [`ImagingError::EmptyFile`] for empty input, and
/// [`ImagingError::Decode`] when the bytes are not a supported image.
pub fn prepare_image(file: RawImageFile<'_>) -> Result<PreparedImage, ImagingError> {
    if let Some(media_type) = file.declared_media_type {
        if !media_type.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(ImagingError::NotAnImage(media_type.to_string()));
        }
    }

    if file.bytes.is_empty() {
        return Err(ImagingError::EmptyFile);
    }

    let decoded = image::load_from_memory(file.bytes)
        .map_err(|error| ImagingError::Decode(error.to_string()))?;
    let (source_width, source_height) = (decoded.width(), decoded.height());
    debug!(
        stage = "imaging",
        action = "decoded",
        source = ?file.source,
        width = source_width,
        height = source_height,
        "decoded selected image"
    );

    let crop = centered_square(source_width, source_height)?;
    let normalized = normalize(&decoded, crop);
    let jpeg = encode_jpeg(&normalized)?;
    let encoded = STANDARD.encode(&jpeg);
    let preview_data_url = format!("data:{PAYLOAD_MEDIA_TYPE};base64,{encoded}");
    let payload = ImagePayload::new(encoded, normalized.width(), normalized.height())
        .map_err(ImagingError::Payload)?;

    debug!(
        stage = "imaging",
        action = "encoded",
        jpeg_bytes = jpeg.len(),
        fingerprint = %payload.fingerprint(),
        "normalized image payload"
    );

    Ok(PreparedImage {
        payload,
        preview_data_url,
        source_width,
        source_height,
        crop,
    })
}

/// Crops `region` out of `source` and scales it to the canonical square.
pub fn normalize(source: &DynamicImage, region: CropRegion) -> RgbImage {
    let square = source.crop_imm(region.x, region.y, region.size, region.size);
    // Invariant:
    // - Output is always exactly CANONICAL_RESOLUTION on both sides, even when
    //   the source square is smaller (upscaled) or already canonical.
    square
        .resize_exact(
            CANONICAL_RESOLUTION,
            CANONICAL_RESOLUTION,
            FilterType::Triangle,
        )
        .to_rgb8()
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, ImagingError> {
    let mut buffer = Cursor::new(Vec::new());
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, PAYLOAD_JPEG_QUALITY)
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgb8.into(),
        )
        .map_err(|error| ImagingError::Encode(error.to_string()))?;
    Ok(buffer.into_inner())
}

/// Error type for image preprocessing.
#[derive(Debug, Error)]
pub enum ImagingError {
    /// Declared media type is not an image.
    #[error("file is not an image (declared type {0})")]
    NotAnImage(String),
    /// The file contains no bytes.
    #[error("file is empty")]
    EmptyFile,
    /// Decoder rejected the bytes.
    #[error("image decoding failed: {0}")]
    Decode(String),
    /// Decoded bitmap has a zero-length side.
    #[error("image has zero width or height")]
    ZeroDimensions,
    /// JPEG encoding failed.
    #[error("jpeg encoding failed: {0}")]
    Encode(String),
    /// Encoded output violated payload invariants.
    #[error("payload construction failed: {0}")]
    Payload(CoreError),
}

impl From<&ImagingError> for AnalysisFailure {
    fn from(error: &ImagingError) -> Self {
        AnalysisFailure::InvalidInput(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for crop geometry and normalization.

    use image::{ImageFormat, Rgb};

    use super::*;

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .expect("png encoding should work");
        buffer.into_inner()
    }

    #[test]
    fn centered_square_offsets_follow_shorter_side() {
        assert_eq!(
            centered_square(800, 600).expect("valid dims"),
            CropRegion {
                x: 100,
                y: 0,
                size: 600
            }
        );
        assert_eq!(
            centered_square(301, 1000).expect("valid dims"),
            CropRegion {
                x: 0,
                y: 349,
                size: 301
            }
        );
        assert!(centered_square(0, 10).is_err());
    }

    #[test]
    fn normalize_keeps_center_and_drops_sides() {
        // 300x100 with a white middle third and black sides.
        let mut source = RgbImage::new(300, 100);
        for (x, _, pixel) in source.enumerate_pixels_mut() {
            *pixel = if (100..200).contains(&x) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            };
        }
        let source = DynamicImage::ImageRgb8(source);
        let region = centered_square(300, 100).expect("valid dims");

        let normalized = normalize(&source, region);
        assert_eq!(normalized.dimensions(), (512, 512));
        assert!(normalized.get_pixel(10, 256).0[0] > 200);
        assert!(normalized.get_pixel(500, 256).0[0] > 200);
    }

    #[test]
    fn prepare_image_produces_canonical_payload_and_preview() {
        let bytes = png_bytes(&DynamicImage::new_rgb8(640, 480));
        let prepared = prepare_image(RawImageFile {
            source: ImageSource::FilePicker,
            declared_media_type: Some("image/png"),
            bytes: &bytes,
        })
        .expect("image should prepare");

        assert_eq!(prepared.payload.width(), 512);
        assert_eq!(prepared.payload.height(), 512);
        assert_eq!(prepared.crop.x, 80);
        assert!(prepared.preview_data_url.starts_with("data:image/jpeg;base64,"));

        let jpeg = STANDARD
            .decode(prepared.payload.as_base64())
            .expect("payload is base64");
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn prepare_image_rejects_non_image_media_type() {
        let bytes = png_bytes(&DynamicImage::new_rgb8(16, 16));
        let result = prepare_image(RawImageFile {
            source: ImageSource::DragAndDrop,
            declared_media_type: Some("application/pdf"),
            bytes: &bytes,
        });
        assert!(matches!(result, Err(ImagingError::NotAnImage(_))));
    }

    #[test]
    fn prepare_image_rejects_undecodable_bytes() {
        let result = prepare_image(RawImageFile {
            source: ImageSource::FilePicker,
            declared_media_type: None,
            bytes: b"not an image",
        });
        assert!(matches!(result, Err(ImagingError::Decode(_))));
    }
}
