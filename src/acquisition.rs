//! Entry points that pull an image from a source and hand it to the
//! normalizer: camera shutter and photo-library import.

use crate::decoder::ExifDecoder;
use crate::device::{ImageSource, LocationService};
use crate::error::NormalizeError;
use crate::exif_tags::ExifTags;
use crate::metadata::NormalizedRecord;
use crate::normalizer::Normalizer;
use std::path::Path;

/// Imports a photo picked from the library. Only `image/*` files are
/// accepted, like the picker filter on the device.
pub async fn import_from_file(
    path: &Path,
    decoder: &dyn ExifDecoder,
    normalizer: &Normalizer,
    owner_id: Option<&str>,
) -> Result<NormalizedRecord, NormalizeError> {
    log::info!("Importing image from {:?}", path);

    let file_type = mime_guess::from_path(path).first_or_octet_stream();
    if file_type.type_() != mime::IMAGE {
        log::warn!("Refusing {:?} with type {}", path, file_type);
        return Err(NormalizeError::UnsupportedFile);
    }

    let file_bytes = tokio::fs::read(path).await.map_err(|e| {
        log::error!("Could not read {:?}: {}", path, e);
        NormalizeError::ImageReadFailed
    })?;
    log::debug!("File read, length: {}", file_bytes.len());

    let tags = decoder
        .decode(&file_bytes)
        .map_err(|e| {
            log::error!("EXIF decoding failed for {:?}: {}", path, e);
            NormalizeError::ImageReadFailed
        })?
        .map(|raw| ExifTags::from_raw(&raw));

    normalizer.normalize_from_imported_file(file_bytes, tags.as_ref(), owner_id)
}

/// Imports bytes whose EXIF tags were decoded elsewhere, e.g. a JSON tag dump.
pub fn import_with_tags(
    file_bytes: Vec<u8>,
    tags_json: Option<&str>,
    normalizer: &Normalizer,
    owner_id: Option<&str>,
) -> Result<NormalizedRecord, NormalizeError> {
    let tags = match tags_json {
        Some(json) => Some(ExifTags::from_raw(&ExifTags::raw_from_json(json).map_err(|e| {
            log::error!("Tag dump is not a JSON object: {}", e);
            NormalizeError::ImageReadFailed
        })?)),
        None => None,
    };
    normalizer.normalize_from_imported_file(file_bytes, tags.as_ref(), owner_id)
}

/// Takes a photo from `source` and georeferences it with a fresh fix.
pub async fn capture_live(
    source: &dyn ImageSource,
    location: &dyn LocationService,
    normalizer: &Normalizer,
    owner_id: Option<&str>,
) -> Result<NormalizedRecord, NormalizeError> {
    log::info!("Capturing photo");
    let image_bytes = match source.acquire().await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("Capture failed: {}", e);
            None
        }
    };
    normalizer
        .normalize_from_live_capture(image_bytes, owner_id, location)
        .await
}
