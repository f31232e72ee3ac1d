//! Device collaborators the normalizer talks to.

use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
}

#[async_trait]
pub trait LocationService: Send + Sync {
    async fn request_foreground_permission(&self) -> Result<PermissionStatus, AppError>;
    async fn current_position(&self, accuracy: Accuracy) -> Result<GeoFix, AppError>;
}

/// Camera shutter or file picker. `None` means the user backed out or the
/// device produced nothing.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn acquire(&self) -> Result<Option<Vec<u8>>, AppError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A location service that always grants access and reports one fix.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    pub fix: GeoFix,
}

#[async_trait]
impl LocationService for FixedLocation {
    async fn request_foreground_permission(&self) -> Result<PermissionStatus, AppError> {
        Ok(PermissionStatus::Granted)
    }

    async fn current_position(&self, accuracy: Accuracy) -> Result<GeoFix, AppError> {
        log::trace!("Fixed location requested at {:?} accuracy", accuracy);
        Ok(self.fix)
    }
}

/// Reads the "captured" image from disk. An empty file counts as no image.
#[derive(Debug, Clone)]
pub struct FileImageSource {
    pub path: PathBuf,
}

#[async_trait]
impl ImageSource for FileImageSource {
    async fn acquire(&self) -> Result<Option<Vec<u8>>, AppError> {
        log::debug!("Reading image from {:?}", self.path);
        let bytes = tokio::fs::read(&self.path).await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(bytes))
    }
}
