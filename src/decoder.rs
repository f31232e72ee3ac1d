use crate::error::AppError;
use crate::exif_tags::{self, ExifValue, RawTagSet};
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::io::Cursor;

/// Extracts raw EXIF tags from an image payload.
pub trait ExifDecoder: Send + Sync {
    /// `Ok(None)` when the image carries no EXIF block at all.
    fn decode(&self, image_bytes: &[u8]) -> Result<Option<RawTagSet>, AppError>;
}

/// Decoder backed by `kamadak-exif`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KamadakDecoder;

impl ExifDecoder for KamadakDecoder {
    fn decode(&self, image_bytes: &[u8]) -> Result<Option<RawTagSet>, AppError> {
        log::trace!("Decoding EXIF from {} bytes", image_bytes.len());
        let mut cursor = Cursor::new(image_bytes);
        let exif = match Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(container)) => {
                log::debug!("No EXIF block found in {} container", container);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let raw = raw_tags(&exif);
        log::debug!("Decoded {} EXIF tags of interest", raw.len());
        Ok(Some(raw))
    }
}

fn raw_tags(exif: &Exif) -> RawTagSet {
    let mut raw = RawTagSet::new();

    let mut put = |name: &str, value: Option<ExifValue>| {
        if let Some(value) = value {
            raw.insert(name.to_string(), value);
        }
    };

    put(exif_tags::GPS_LATITUDE, field(exif, Tag::GPSLatitude).and_then(degrees));
    put(exif_tags::GPS_LATITUDE_REF, field(exif, Tag::GPSLatitudeRef).and_then(ascii));
    put(exif_tags::GPS_LONGITUDE, field(exif, Tag::GPSLongitude).and_then(degrees));
    put(exif_tags::GPS_LONGITUDE_REF, field(exif, Tag::GPSLongitudeRef).and_then(ascii));
    put(exif_tags::DATE_TIME_ORIGINAL, field(exif, Tag::DateTimeOriginal).and_then(ascii));
    put(exif_tags::DATE_TIME, field(exif, Tag::DateTime).and_then(ascii));
    put(exif_tags::GPS_DATE_STAMP, field(exif, Tag::GPSDateStamp).and_then(ascii));
    put(exif_tags::GPS_TIME_STAMP, field(exif, Tag::GPSTimeStamp).and_then(rationals));

    raw
}

fn field(exif: &Exif, tag: Tag) -> Option<&Field> {
    exif.get_field(tag, In::PRIMARY)
}

fn ascii(field: &Field) -> Option<ExifValue> {
    match &field.value {
        Value::Ascii(parts) => {
            let first = parts.first()?;
            let text = String::from_utf8_lossy(first)
                .trim_end_matches('\0')
                .to_string();
            Some(ExifValue::Text(text))
        }
        other => {
            log::debug!("{} is not ASCII: {:?}", field.tag, other);
            None
        }
    }
}

fn rationals(field: &Field) -> Option<ExifValue> {
    match &field.value {
        Value::Rational(parts) => Some(ExifValue::List(parts.iter().map(|r| r.to_f64()).collect())),
        _ => None,
    }
}

/// Degrees, minutes and seconds collapsed into decimal degrees.
fn degrees(field: &Field) -> Option<ExifValue> {
    let Value::Rational(parts) = &field.value else {
        log::debug!("{} is not rational: {:?}", field.tag, field.value);
        return None;
    };
    let value = parts
        .iter()
        .zip([1.0, 60.0, 3600.0])
        .map(|(part, divisor)| part.to_f64() / divisor)
        .sum();
    Some(ExifValue::Number(value))
}
