// src/metadata.rs

use crate::error::NormalizeError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};

/// A georeferenced, timestamped photo ready for submission.
///
/// Fields are private so every instance has passed [`NormalizedRecord::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    image_bytes: Vec<u8>,
    latitude: f64,
    longitude: f64,
    captured_at: DateTime<FixedOffset>,
    owner_id: String,
}

impl NormalizedRecord {
    pub fn new(
        image_bytes: Vec<u8>,
        latitude: f64,
        longitude: f64,
        captured_at: DateTime<FixedOffset>,
        owner_id: &str,
    ) -> Result<Self, NormalizeError> {
        if owner_id.trim().is_empty() {
            return Err(NormalizeError::Unauthenticated);
        }
        if !latitude.is_finite()
            || !longitude.is_finite()
            || !(-90.0..=90.0).contains(&latitude)
            || !(-180.0..=180.0).contains(&longitude)
        {
            return Err(NormalizeError::InvalidGpsData);
        }

        Ok(Self {
            image_bytes,
            latitude,
            longitude,
            captured_at,
            owner_id: owner_id.to_string(),
        })
    }

    pub fn image_bytes(&self) -> &[u8] {
        &self.image_bytes
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn captured_at(&self) -> DateTime<FixedOffset> {
        self.captured_at
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn to_payload(&self) -> SubmissionPayload {
        SubmissionPayload {
            base64: BASE64.encode(&self.image_bytes),
            latitude: self.latitude,
            longitude: self.longitude,
            date_taken: self
                .captured_at
                .to_rfc3339_opts(SecondsFormat::Millis, false),
            user_id: self.owner_id.clone(),
        }
    }
}

/// Wire shape accepted by the classification endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub base64: String,
    pub latitude: f64,
    pub longitude: f64,
    pub date_taken: String,
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2023-05-10T14:30:00-03:00").unwrap()
    }

    #[test]
    fn rejects_empty_owner() {
        let err = NormalizedRecord::new(vec![1], 0.0, 0.0, instant(), "  ").unwrap_err();
        assert_eq!(err, NormalizeError::Unauthenticated);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        for (lat, lon) in [(90.5, 0.0), (0.0, -180.1), (f64::NAN, 0.0), (0.0, f64::INFINITY)] {
            let err = NormalizedRecord::new(vec![1], lat, lon, instant(), "u1").unwrap_err();
            assert_eq!(err, NormalizeError::InvalidGpsData);
        }
    }

    #[test]
    fn payload_uses_camel_case_keys_and_explicit_offset() {
        let record =
            NormalizedRecord::new(b"jpeg".to_vec(), -23.55, -46.63, instant(), "user-42").unwrap();
        let json = serde_json::to_value(record.to_payload()).unwrap();

        assert_eq!(json["base64"], "anBlZw==");
        assert_eq!(json["latitude"], -23.55);
        assert_eq!(json["longitude"], -46.63);
        assert_eq!(json["dateTaken"], "2023-05-10T14:30:00.000-03:00");
        assert_eq!(json["userId"], "user-42");
    }

    #[test]
    fn keeps_image_bytes_verbatim() {
        let bytes = vec![0xFF, 0xD8, 0x00, 0x7F, 0xFF, 0xD9];
        let record = NormalizedRecord::new(bytes.clone(), 1.0, 2.0, instant(), "u").unwrap();
        assert_eq!(record.image_bytes(), bytes.as_slice());
    }
}
