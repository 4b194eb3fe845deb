use crate::config::S3Config;
use crate::error::ServiceError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// File extensions accepted for upload
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Longest side of a stored image after thumbnailing
const THUMBNAIL_BOUND: u32 = 1024;

/// JPEG re-encode quality
const JPEG_QUALITY: u8 = 85;

/// A stored object: the bucket key plus a retrieval URL
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub object_key: String,
    pub url: String,
}

/// Port for the object storage backend, mockable in service tests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload image bytes under a freshly generated key, returning the key
    /// and a retrieval URL
    async fn upload(&self, filename: &str, data: Vec<u8>) -> Result<StoredObject, ServiceError>;

    /// Delete the object behind a key; failure propagates to the caller
    async fn delete(&self, object_key: &str) -> Result<(), ServiceError>;
}

/// Extract the lower-cased extension from a filename, if it has one
pub fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Filename must contain a dot and its lower-cased suffix must be allowed
pub fn is_allowed_extension(filename: &str) -> bool {
    extension(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Generate a globally unique object key: random hex + original extension
fn generate_object_key(filename: &str) -> String {
    let ext = extension(filename).unwrap_or_else(|| "bin".to_string());
    format!("{}.{}", Uuid::new_v4().simple(), ext)
}

/// Content type for an object key extension
fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Best-effort thumbnail: bound the longest side and re-encode in the
/// original format. Any decode or encode failure returns the input bytes
/// unchanged; this never errors. Resizing happens entirely in memory, so
/// there is no temporary file to clean up afterwards.
fn prepare_image(data: Vec<u8>, ext: &str) -> Vec<u8> {
    let img = match image::load_from_memory(&data) {
        Ok(img) => img,
        Err(e) => {
            warn!(error = %e, "Image decode failed, uploading original bytes");
            return data;
        }
    };

    let img = if img.width() > THUMBNAIL_BOUND || img.height() > THUMBNAIL_BOUND {
        img.thumbnail(THUMBNAIL_BOUND, THUMBNAIL_BOUND)
    } else {
        img
    };

    match encode_image(&img, ext) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(error = %e, ext = ext, "Image re-encode failed, uploading original bytes");
            data
        }
    }
}

fn encode_image(img: &DynamicImage, ext: &str) -> image::ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    match ext {
        "jpg" | "jpeg" => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            rgb.write_with_encoder(encoder)?;
        }
        "png" => img.write_to(&mut buf, ImageFormat::Png)?,
        "gif" => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_to(&mut buf, ImageFormat::Gif)?;
        }
        _ => img.write_to(&mut buf, ImageFormat::Png)?,
    }
    Ok(buf.into_inner())
}

/// Object storage adapter for an S3-compatible bucket (R2, MinIO, S3)
pub struct ObjectStorage {
    client: S3Client,
    bucket: String,
    endpoint_url: Option<String>,
    region: String,
    presigned_url_expiry: Duration,
}

impl ObjectStorage {
    /// Create a new adapter from configuration
    pub async fn new(config: &S3Config, presigned_url_expiry: Duration) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Custom endpoint for R2/MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "Object storage adapter initialized"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
            endpoint_url: config.endpoint_url.clone(),
            region: config.region.clone(),
            presigned_url_expiry,
        }
    }

    /// Presigned GET URL for a key, falling back to a direct
    /// endpoint/bucket/key URL when presigning fails
    async fn retrieval_url(&self, object_key: &str) -> String {
        let presigning_config = match PresigningConfig::expires_in(self.presigned_url_expiry) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(error = %e, "Invalid presigning config, using direct URL");
                return self.direct_url(object_key);
            }
        };

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key)
            .presigned(presigning_config)
            .await;

        match request {
            Ok(presigned) => presigned.uri().to_string(),
            Err(e) => {
                warn!(error = %e, object_key = %object_key, "Presigning failed, using direct URL");
                self.direct_url(object_key)
            }
        }
    }

    fn direct_url(&self, object_key: &str) -> String {
        match self.endpoint_url {
            Some(ref endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.bucket,
                object_key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, object_key
            ),
        }
    }
}

#[async_trait]
impl ObjectStore for ObjectStorage {
    #[instrument(skip(self, data), fields(filename = %filename, size_bytes = data.len()))]
    async fn upload(&self, filename: &str, data: Vec<u8>) -> Result<StoredObject, ServiceError> {
        let object_key = generate_object_key(filename);
        let ext = extension(&object_key).unwrap_or_else(|| "bin".to_string());
        let body = prepare_image(data, &ext);

        debug!(
            object_key = %object_key,
            size_bytes = body.len(),
            "Uploading image to object storage"
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(body))
            .content_type(content_type_for(&ext))
            .send()
            .await
            .map_err(|e| ServiceError::Storage(format!("put_object failed: {e}")))?;

        let url = self.retrieval_url(&object_key).await;

        debug!(object_key = %object_key, "Image uploaded");
        Ok(StoredObject { object_key, url })
    }

    #[instrument(skip(self), fields(object_key = %object_key))]
    async fn delete(&self, object_key: &str) -> Result<(), ServiceError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(object_key)
            .send()
            .await
            .map_err(|e| ServiceError::Storage(format!("delete_object failed: {e}")))?;

        debug!(object_key = %object_key, "Image deleted from object storage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_allowed_extensions() {
        assert!(is_allowed_extension("photo.png"));
        assert!(is_allowed_extension("photo.jpg"));
        assert!(is_allowed_extension("photo.jpeg"));
        assert!(is_allowed_extension("photo.gif"));
        assert!(is_allowed_extension("PHOTO.JPG"));
        assert!(is_allowed_extension("archive.tar.gif"));
    }

    #[test]
    fn test_disallowed_extensions() {
        assert!(!is_allowed_extension("notes.txt"));
        assert!(!is_allowed_extension("photo.webp"));
        assert!(!is_allowed_extension("no_extension"));
        assert!(!is_allowed_extension("trailing_dot."));
        assert!(!is_allowed_extension(""));
    }

    #[test]
    fn test_generate_object_key_keeps_extension() {
        let key = generate_object_key("My Photo.JPG");
        assert!(key.ends_with(".jpg"));
        // 32 hex chars + dot + ext
        assert_eq!(key.len(), 32 + 1 + 3);
    }

    #[test]
    fn test_generate_object_key_unique() {
        assert_ne!(generate_object_key("a.png"), generate_object_key("a.png"));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("jpg"), "image/jpeg");
        assert_eq!(content_type_for("jpeg"), "image/jpeg");
        assert_eq!(content_type_for("png"), "image/png");
        assert_eq!(content_type_for("gif"), "image/gif");
        assert_eq!(content_type_for("bin"), "application/octet-stream");
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_prepare_image_bounds_large_images() {
        let original = png_bytes(2048, 512);
        let prepared = prepare_image(original, "png");
        let img = image::load_from_memory(&prepared).unwrap();
        assert!(img.width() <= THUMBNAIL_BOUND);
        assert!(img.height() <= THUMBNAIL_BOUND);
    }

    #[test]
    fn test_prepare_image_keeps_small_dimensions() {
        let original = png_bytes(64, 32);
        let prepared = prepare_image(original, "png");
        let img = image::load_from_memory(&prepared).unwrap();
        assert_eq!(img.width(), 64);
        assert_eq!(img.height(), 32);
    }

    #[test]
    fn test_prepare_image_reencodes_jpeg() {
        let original = png_bytes(32, 32);
        let prepared = prepare_image(original, "jpg");
        assert_eq!(
            image::guess_format(&prepared).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_prepare_image_falls_back_on_garbage() {
        let garbage = vec![0xde, 0xad, 0xbe, 0xef];
        let prepared = prepare_image(garbage.clone(), "png");
        assert_eq!(prepared, garbage);
    }
}
