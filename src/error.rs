//! Error type shared by the catalog, the storage backend and image items.
//!
//! Absence the caller is expected to branch on (an unknown filter name, a
//! missing derived image while auto-fix is off) is modelled with `Option`
//! at the call site and never ends up here.

use thiserror::Error;

/// Everything that can go wrong while reading or deriving stored media
#[derive(Debug, Error)]
pub enum Error {
    /// The file an image was derived from is no longer in the catalog
    #[error("the file \"{0}\" does not exist in the storage system")]
    FileNotFound(i64),

    #[error("the image \"{0}\" does not exist in the storage system")]
    ImageNotFound(i64),

    #[error("the filter \"{0}\" does not exist in the storage system")]
    FilterNotFound(i64),

    #[error("catalog error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
