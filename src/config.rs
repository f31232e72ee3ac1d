use chrono::{FixedOffset, Offset, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// How a string-form `DateTimeOriginal`/`DateTime` is anchored to an instant.
/// EXIF stores these as wall-clock time without a zone.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExifDateZone {
    Utc,
    Local,
    Regional,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    pub endpoint: String,
    pub project_id: String,
    pub platform: Option<String>,
    pub recovery_url: String,
    /// Where the login cookie is kept between runs. No persistence when unset.
    pub session_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub regional_utc_offset: String,
    pub exif_date_zone: ExifDateZone,
    pub submission_url: String,
    pub identity: IdentityConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("VETIVERDE").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.regional_offset()?;
        for (key, value) in [
            ("submission_url", &self.submission_url),
            ("identity.endpoint", &self.identity.endpoint),
            ("identity.recovery_url", &self.identity.recovery_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ConfigError::Message(format!("{} is not a valid URL: {}", key, e)))?;
        }
        Ok(())
    }

    pub fn regional_offset(&self) -> Result<FixedOffset, ConfigError> {
        parse_utc_offset(&self.regional_utc_offset)
    }
}

/// Parses offsets written as `-03:00`, `+0530` or `Z`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, ConfigError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") {
        return Ok(Utc.fix());
    }
    raw.parse::<FixedOffset>()
        .map_err(|e| ConfigError::Message(format!("invalid UTC offset {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_regional_offsets() {
        assert_eq!(parse_utc_offset("-03:00").unwrap().local_minus_utc(), -3 * 3600);
        assert_eq!(parse_utc_offset("+0530").unwrap().local_minus_utc(), 5 * 3600 + 1800);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn rejects_malformed_offsets() {
        for raw in ["", "03:00", "-3", "-24:00", "+01:60", "-ab:cd", "+3:00"] {
            assert!(parse_utc_offset(raw).is_err(), "{:?} should be rejected", raw);
        }
    }
}
