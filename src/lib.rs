pub mod acquisition;
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod exif_tags;
pub mod identity_clients;
pub mod metadata;
pub mod normalizer;
pub mod session;
pub mod submission;
