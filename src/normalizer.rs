//! Turns capture metadata into a [`NormalizedRecord`] or a definite rejection.
//!
//! Two entry points exist, one per acquisition path. A live capture takes its
//! position from the device and its timestamp from the clock. An imported
//! file takes both from its EXIF tags. The normalizer keeps no state between
//! calls.

use crate::config::{AppConfig, ExifDateZone};
use crate::device::{Accuracy, Clock, LocationService, PermissionStatus, SystemClock};
use crate::error::NormalizeError;
use crate::exif_tags::{hemisphere, DateSource, ExifTags, Hemisphere};
use crate::metadata::NormalizedRecord;
use chrono::{
    DateTime, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta,
    TimeZone, Utc,
};
use std::sync::Arc;

const EXIF_DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const GPS_DATE_STAMP_FORMAT: &str = "%Y:%m:%d";

/// Timezone decisions applied while building timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePolicy {
    /// Offset stamped on live captures.
    pub regional_offset: FixedOffset,
    pub exif_date_zone: ExifDateZone,
}

impl TimePolicy {
    pub fn from_config(config: &AppConfig) -> Result<Self, config::ConfigError> {
        Ok(Self {
            regional_offset: config.regional_offset()?,
            exif_date_zone: config.exif_date_zone,
        })
    }
}

pub struct Normalizer {
    policy: TimePolicy,
    clock: Arc<dyn Clock>,
}

impl Normalizer {
    pub fn new(policy: TimePolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: TimePolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    /// Builds a record for a photo just taken with the device camera.
    ///
    /// Owner and image are checked before the location permission prompt, so
    /// an invalid call never reaches the device.
    pub async fn normalize_from_live_capture(
        &self,
        image_bytes: Option<Vec<u8>>,
        owner_id: Option<&str>,
        location: &dyn LocationService,
    ) -> Result<NormalizedRecord, NormalizeError> {
        let owner_id = require_owner(owner_id)?;

        let image_bytes = match image_bytes {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(reject(NormalizeError::CaptureFailed)),
        };
        if let Err(e) = image::guess_format(&image_bytes) {
            log::debug!("Captured bytes are not a known image format: {}", e);
            return Err(reject(NormalizeError::CaptureFailed));
        }

        log::debug!("Requesting location permissions...");
        match location.request_foreground_permission().await {
            Ok(PermissionStatus::Granted) => {}
            Ok(status) => {
                log::debug!("Location permission status: {:?}", status);
                return Err(reject(NormalizeError::LocationPermissionDenied));
            }
            Err(e) => {
                log::error!("Location permission request failed: {}", e);
                return Err(reject(NormalizeError::LocationUnavailable));
            }
        }

        log::debug!("Getting current location...");
        let fix = location.current_position(Accuracy::High).await.map_err(|e| {
            log::error!("Location fix failed: {}", e);
            reject(NormalizeError::LocationUnavailable)
        })?;
        log::debug!("Location obtained: {:?}", fix);

        let captured_at = self.clock.now().with_timezone(&self.policy.regional_offset);

        NormalizedRecord::new(image_bytes, fix.latitude, fix.longitude, captured_at, owner_id)
            .map_err(reject)
    }

    /// Builds a record for a file picked from the photo library.
    ///
    /// `exif_tags` is `None` when the decoder found no EXIF block.
    pub fn normalize_from_imported_file(
        &self,
        file_bytes: Vec<u8>,
        exif_tags: Option<&ExifTags>,
        owner_id: Option<&str>,
    ) -> Result<NormalizedRecord, NormalizeError> {
        let owner_id = require_owner(owner_id)?;
        let tags = exif_tags.ok_or_else(|| reject(NormalizeError::NoExifData))?;

        let (latitude, longitude) = coordinates(tags).map_err(reject)?;
        log::debug!("Parsed GPS coordinates: ({}, {})", latitude, longitude);

        let captured_at = self.captured_at(tags).map_err(reject)?;
        log::debug!("Resolved capture date: {}", captured_at.to_rfc3339());

        NormalizedRecord::new(file_bytes, latitude, longitude, captured_at, owner_id)
            .map_err(reject)
    }

    /// First applicable date source wins. A source that applies but does not
    /// yield a real instant fails the attempt instead of falling through.
    fn captured_at(&self, tags: &ExifTags) -> Result<DateTime<FixedOffset>, NormalizeError> {
        if let Some(DateSource::EpochSeconds(seconds)) = tags.date_time_original {
            log::trace!("Using numeric DateTimeOriginal");
            return from_epoch_seconds(seconds);
        }

        let text = match &tags.date_time_original {
            Some(DateSource::Text(text)) => Some(text.as_str()),
            _ => tags.date_time.as_deref(),
        };
        if let Some(text) = text {
            log::trace!("Using string date {:?}", text);
            return self.parse_exif_string(text);
        }

        if let (Some(date), Some(time)) = (&tags.gps_date_stamp, tags.gps_time_stamp) {
            log::trace!("Using GPS date/time stamp");
            return from_gps_stamp(date, time);
        }

        Err(NormalizeError::MissingCaptureDate)
    }

    fn parse_exif_string(&self, text: &str) -> Result<DateTime<FixedOffset>, NormalizeError> {
        let rewritten = rewrite_date_separators(text);
        let naive = NaiveDateTime::parse_from_str(&rewritten, EXIF_DATE_TIME_FORMAT).map_err(|e| {
            log::debug!("Unparseable EXIF date {:?}: {}", text, e);
            NormalizeError::InvalidExifDate
        })?;

        let resolved = match self.policy.exif_date_zone {
            ExifDateZone::Utc => Some(Utc.from_utc_datetime(&naive).fixed_offset()),
            ExifDateZone::Local => resolve_wall_clock(&naive, local_time),
            ExifDateZone::Regional => self.policy.regional_offset.from_local_datetime(&naive).single(),
        };
        resolved.ok_or(NormalizeError::InvalidExifDate)
    }
}

fn require_owner(owner_id: Option<&str>) -> Result<&str, NormalizeError> {
    match owner_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(reject(NormalizeError::Unauthenticated)),
    }
}

fn reject(err: NormalizeError) -> NormalizeError {
    log::warn!("Capture rejected ({}): {}", err, err.notice());
    err
}

/// Sign comes from the reference letter alone; the decoded sign is ignored.
fn coordinates(tags: &ExifTags) -> Result<(f64, f64), NormalizeError> {
    let (Some(latitude), Some(longitude), Some(latitude_ref), Some(longitude_ref)) = (
        tags.gps_latitude,
        tags.gps_longitude,
        tags.gps_latitude_ref.as_deref(),
        tags.gps_longitude_ref.as_deref(),
    ) else {
        return Err(NormalizeError::MissingGpsData);
    };

    Ok((signed(latitude, latitude_ref), signed(longitude, longitude_ref)))
}

fn signed(magnitude: f64, reference: &str) -> f64 {
    match hemisphere(reference) {
        Hemisphere::Negative => -magnitude.abs(),
        Hemisphere::Positive => magnitude.abs(),
    }
}

fn from_epoch_seconds(seconds: f64) -> Result<DateTime<FixedOffset>, NormalizeError> {
    if !seconds.is_finite() {
        return Err(NormalizeError::InvalidExifDate);
    }
    let whole = seconds.floor();
    let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return Err(NormalizeError::InvalidExifDate);
    }

    DateTime::<Utc>::from_timestamp(whole as i64, nanos)
        .map(|dt| dt.fixed_offset())
        .ok_or(NormalizeError::InvalidExifDate)
}

/// `YYYY:MM:DD HH:MM:SS` becomes `YYYY-MM-DD HH:MM:SS`. Only the date part
/// is touched.
fn rewrite_date_separators(text: &str) -> String {
    let mut rewritten = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        if c == ':' && (i == 4 || i == 7) {
            rewritten.push('-');
        } else {
            rewritten.push(c);
        }
    }
    rewritten
}

/// GPS stamps carry no zone; they are read as local wall-clock time.
fn from_gps_stamp(date: &str, time: [f64; 3]) -> Result<DateTime<FixedOffset>, NormalizeError> {
    let date = NaiveDate::parse_from_str(date.trim(), GPS_DATE_STAMP_FORMAT).map_err(|e| {
        log::debug!("Unparseable GPSDateStamp {:?}: {}", date, e);
        NormalizeError::InvalidExifDate
    })?;

    let [hour, minute, second] = time;
    if time.iter().any(|part| !part.is_finite() || *part < 0.0) {
        return Err(NormalizeError::InvalidExifDate);
    }
    let time = NaiveTime::from_hms_opt(hour as u32, minute as u32, second.floor() as u32)
        .ok_or(NormalizeError::InvalidExifDate)?;

    resolve_wall_clock(&date.and_time(time), local_time).ok_or(NormalizeError::InvalidExifDate)
}

fn local_time(naive: &NaiveDateTime) -> LocalResult<DateTime<FixedOffset>> {
    Local.from_local_datetime(naive).map(|dt| dt.fixed_offset())
}

/// Anchors a wall-clock time in a zone. Repeated times take the earlier
/// instant. Times skipped by a forward transition are read with the offset in
/// force just before it, which moves them forward by the size of the gap.
fn resolve_wall_clock<F>(naive: &NaiveDateTime, zone: F) -> Option<DateTime<FixedOffset>>
where
    F: Fn(&NaiveDateTime) -> LocalResult<DateTime<FixedOffset>>,
{
    match zone(naive) {
        LocalResult::None => {
            let day_before = naive.checked_sub_signed(TimeDelta::try_days(1)?)?;
            let offset_before = *zone(&day_before).earliest()?.offset();
            log::debug!("{} falls in a transition gap, reading it at {}", naive, offset_before);
            offset_before.from_local_datetime(naive).single()
        }
        resolved => resolved.earliest(),
    }
}
