//! Image transcoding
//!
//! Attachments are decoded, shrunk to fit the configured bounding box
//! (aspect ratio preserved, never enlarged), and re-encoded as progressive
//! JPEG. Nothing here touches storage.
//!
//! Failure policy: a decode or encode failure on any attachment aborts the
//! whole batch with `Error::ImageProcessing` naming the file. Both upload
//! entry points rely on this.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use sitefeed_common::config::ImageSettings;
use sitefeed_common::{Error, Result};
use tracing::{debug, warn};

/// Raw attachment as received from the boundary
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Re-encoded JPEG payload
#[derive(Debug, Clone)]
pub struct TranscodedImage {
    pub original_name: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Accepted input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
}

impl MediaType {
    /// Parse a content-type header value, ignoring parameters and case
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            "image/webp" => Some(MediaType::Webp),
            _ => None,
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            MediaType::Jpeg => ImageFormat::Jpeg,
            MediaType::Png => ImageFormat::Png,
            MediaType::Webp => ImageFormat::WebP,
        }
    }
}

/// Cheap pre-decode checks: allow-listed content type and size limit
pub fn check_upload(upload: &ImageUpload, settings: &ImageSettings) -> Result<MediaType> {
    let media_type = MediaType::from_content_type(&upload.content_type).ok_or_else(|| {
        Error::InvalidMediaType(format!(
            "{} ({}): only JPEG, PNG and WEBP images are allowed",
            upload.file_name, upload.content_type
        ))
    })?;

    if upload.bytes.len() > settings.max_upload_bytes {
        return Err(Error::FileTooLarge(format!(
            "{} is {} bytes, limit is {} bytes",
            upload.file_name,
            upload.bytes.len(),
            settings.max_upload_bytes
        )));
    }

    Ok(media_type)
}

/// Check a whole batch before any decoding starts
pub fn check_batch(uploads: &[ImageUpload], settings: &ImageSettings) -> Result<()> {
    if uploads.len() > settings.max_files {
        return Err(Error::TooManyFiles(format!(
            "{} images submitted, at most {} allowed",
            uploads.len(),
            settings.max_files
        )));
    }
    for upload in uploads {
        check_upload(upload, settings)?;
    }
    Ok(())
}

/// Target size for `(width, height)` inside `(max_width, max_height)`
///
/// Returns the input unchanged when it already fits. Otherwise the limiting
/// side lands exactly on its bound and the other is rounded, never below 1.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let scaled_width = ((width as f64 * scale).round() as u32).clamp(1, max_width);
    let scaled_height = ((height as f64 * scale).round() as u32).clamp(1, max_height);
    (scaled_width, scaled_height)
}

/// Decode, resize, and re-encode one attachment
pub fn transcode(upload: &ImageUpload, settings: &ImageSettings) -> Result<TranscodedImage> {
    let media_type = check_upload(upload, settings)?;

    let decoded = image::load_from_memory_with_format(&upload.bytes, media_type.image_format())
        .map_err(|e| {
            warn!(file = %upload.file_name, error = %e, "Image decode failed");
            Error::ImageProcessing(upload.file_name.clone())
        })?;

    let (width, height) = fit_within(
        decoded.width(),
        decoded.height(),
        settings.max_width,
        settings.max_height,
    );
    let resized = if (width, height) == (decoded.width(), decoded.height()) {
        decoded
    } else {
        debug!(
            file = %upload.file_name,
            from_width = decoded.width(),
            from_height = decoded.height(),
            width,
            height,
            "Downscaling image"
        );
        decoded.resize_exact(width, height, FilterType::Lanczos3)
    };

    let bytes = encode_progressive_jpeg(&resized, settings.quality).map_err(|e| {
        warn!(file = %upload.file_name, error = %e, "JPEG encode failed");
        Error::ImageProcessing(upload.file_name.clone())
    })?;

    Ok(TranscodedImage {
        original_name: upload.file_name.clone(),
        bytes,
        width,
        height,
    })
}

fn encode_progressive_jpeg(
    image: &DynamicImage,
    quality: u8,
) -> std::result::Result<Vec<u8>, String> {
    let rgb = image.to_rgb8();
    let width = u16::try_from(rgb.width()).map_err(|_| "width exceeds JPEG limit".to_string())?;
    let height =
        u16::try_from(rgb.height()).map_err(|_| "height exceeds JPEG limit".to_string())?;

    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, quality);
    encoder.set_progressive(true);
    encoder
        .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| e.to_string())?;

    Ok(out)
}

/// Transcode a batch in submission order on the blocking pool
///
/// The whole batch is checked first, so an invalid last attachment fails
/// the submission before any CPU is spent on the first.
pub async fn transcode_all(
    uploads: Vec<ImageUpload>,
    settings: &ImageSettings,
) -> Result<Vec<TranscodedImage>> {
    check_batch(&uploads, settings)?;

    let mut transcoded = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let settings = settings.clone();
        let image = tokio::task::spawn_blocking(move || transcode(&upload, &settings))
            .await
            .map_err(|e| Error::Internal(format!("Transcode task failed: {}", e)))??;
        transcoded.push(image);
    }

    Ok(transcoded)
}
