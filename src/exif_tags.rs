//! Typed view over an untrusted EXIF tag map.
//!
//! Decoders hand back a [`RawTagSet`]: tag name to a value of any shape.
//! [`ExifTags::from_raw`] validates each field the normalizer reads and drops
//! the ones with an unexpected shape, so downstream code never inspects raw
//! values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const GPS_LATITUDE: &str = "GPSLatitude";
pub const GPS_LATITUDE_REF: &str = "GPSLatitudeRef";
pub const GPS_LONGITUDE: &str = "GPSLongitude";
pub const GPS_LONGITUDE_REF: &str = "GPSLongitudeRef";
pub const DATE_TIME_ORIGINAL: &str = "DateTimeOriginal";
pub const DATE_TIME: &str = "DateTime";
pub const GPS_DATE_STAMP: &str = "GPSDateStamp";
pub const GPS_TIME_STAMP: &str = "GPSTimeStamp";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ExifValue {
    Number(f64),
    Text(String),
    List(Vec<f64>),
    Other(serde_json::Value),
}

pub type RawTagSet = BTreeMap<String, ExifValue>;

/// Date source as found in `DateTimeOriginal`: some decoders emit epoch
/// seconds, others the EXIF `YYYY:MM:DD HH:MM:SS` string.
#[derive(Debug, Clone, PartialEq)]
pub enum DateSource {
    EpochSeconds(f64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    Positive,
    Negative,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExifTags {
    pub gps_latitude: Option<f64>,
    pub gps_latitude_ref: Option<String>,
    pub gps_longitude: Option<f64>,
    pub gps_longitude_ref: Option<String>,
    pub date_time_original: Option<DateSource>,
    pub date_time: Option<String>,
    pub gps_date_stamp: Option<String>,
    pub gps_time_stamp: Option<[f64; 3]>,
}

impl ExifTags {
    pub fn from_raw(raw: &RawTagSet) -> Self {
        let tags = ExifTags {
            gps_latitude: number(raw, GPS_LATITUDE),
            gps_latitude_ref: text(raw, GPS_LATITUDE_REF),
            gps_longitude: number(raw, GPS_LONGITUDE),
            gps_longitude_ref: text(raw, GPS_LONGITUDE_REF),
            date_time_original: match raw.get(DATE_TIME_ORIGINAL) {
                Some(ExifValue::Number(n)) => Some(DateSource::EpochSeconds(*n)),
                Some(ExifValue::Text(s)) if !s.trim().is_empty() => {
                    Some(DateSource::Text(s.trim().to_string()))
                }
                _ => None,
            },
            date_time: text(raw, DATE_TIME),
            gps_date_stamp: text(raw, GPS_DATE_STAMP),
            gps_time_stamp: match raw.get(GPS_TIME_STAMP) {
                Some(ExifValue::List(parts)) if parts.len() == 3 => {
                    Some([parts[0], parts[1], parts[2]])
                }
                _ => None,
            },
        };
        log::trace!("Typed EXIF tags: {:?}", tags);
        tags
    }

    /// Parses a JSON object of tag name to value, as produced by JavaScript
    /// style EXIF parsers.
    pub fn raw_from_json(json: &str) -> Result<RawTagSet, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Reads a hemisphere letter. Only `S` and `W` flip the sign.
pub fn hemisphere(reference: &str) -> Hemisphere {
    match reference.trim() {
        "S" | "W" => Hemisphere::Negative,
        _ => Hemisphere::Positive,
    }
}

fn number(raw: &RawTagSet, tag: &str) -> Option<f64> {
    match raw.get(tag) {
        Some(ExifValue::Number(n)) => Some(*n),
        Some(other) => {
            log::debug!("Ignoring {} with unexpected shape: {:?}", tag, other);
            None
        }
        None => None,
    }
}

fn text(raw: &RawTagSet, tag: &str) -> Option<String> {
    match raw.get(tag) {
        Some(ExifValue::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(ExifValue::Text(_)) => None,
        Some(other) => {
            log::debug!("Ignoring {} with unexpected shape: {:?}", tag, other);
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_exif_parser_style_json() {
        let raw = ExifTags::raw_from_json(
            r#"{
                "GPSLatitude": 23.55,
                "GPSLatitudeRef": "S",
                "GPSLongitude": 46.63,
                "GPSLongitudeRef": "W",
                "DateTimeOriginal": 1683729000,
                "GPSTimeStamp": [14, 30, 0],
                "Make": "Apple",
                "Thumbnail": {"offset": 12}
            }"#,
        )
        .unwrap();
        let tags = ExifTags::from_raw(&raw);

        assert_eq!(tags.gps_latitude, Some(23.55));
        assert_eq!(tags.gps_latitude_ref.as_deref(), Some("S"));
        assert_eq!(tags.gps_longitude, Some(46.63));
        assert_eq!(tags.gps_longitude_ref.as_deref(), Some("W"));
        assert_eq!(tags.date_time_original, Some(DateSource::EpochSeconds(1683729000.0)));
        assert_eq!(tags.gps_time_stamp, Some([14.0, 30.0, 0.0]));
        assert_eq!(tags.date_time, None);
    }

    #[test]
    fn drops_fields_with_unexpected_shapes() {
        let mut raw = RawTagSet::new();
        raw.insert(GPS_LATITUDE.into(), ExifValue::Text("twenty".into()));
        raw.insert(GPS_LONGITUDE_REF.into(), ExifValue::Number(1.0));
        raw.insert(DATE_TIME_ORIGINAL.into(), ExifValue::List(vec![2023.0]));
        raw.insert(DATE_TIME.into(), ExifValue::Text("   ".into()));
        raw.insert(GPS_TIME_STAMP.into(), ExifValue::List(vec![14.0, 30.0]));

        assert_eq!(ExifTags::from_raw(&raw), ExifTags::default());
    }

    #[test]
    fn only_south_and_west_are_negative() {
        assert_eq!(hemisphere("S"), Hemisphere::Negative);
        assert_eq!(hemisphere("W"), Hemisphere::Negative);
        assert_eq!(hemisphere("N"), Hemisphere::Positive);
        assert_eq!(hemisphere("E"), Hemisphere::Positive);
        assert_eq!(hemisphere("s"), Hemisphere::Positive);
    }
}
