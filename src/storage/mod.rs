//! Storage service
//!
//! `StorageService` is everything an [`ImageItem`](crate::image_item::ImageItem)
//! needs from the place files live: existence checks, web and server paths,
//! raw content, catalog lookups and image (re)generation. `LocalStorage` is
//! the folder + SQLite catalog implementation.

pub mod local;
pub mod processor;

pub use local::LocalStorage;

use crate::error::Result;
use crate::state::data::{FileRecord, FilterDefinition, ImageRecord};

/// Backend owning stored files and their derived images
pub trait StorageService {
    /// Whether `name` exists in the storage folder
    fn file_system_exists(&self, name: &str) -> bool;

    /// Web path of `name`, relative to the host (e.g. "/storage/3_a.jpg")
    fn file_http_path(&self, name: &str) -> String;

    /// Web path of `name` including scheme and host
    fn file_absolute_http_path(&self, name: &str) -> String;

    /// Path of `name` on the server's file system
    fn file_server_path(&self, name: &str) -> String;

    /// Raw bytes of `name`
    fn file_system_content(&self, name: &str) -> Result<Vec<u8>>;

    /// The uploaded file `file_id`, None when it is not in the catalog
    fn get_file(&self, file_id: i64) -> Result<Option<FileRecord>>;

    /// The filter with this identifier (e.g. "small-thumbnail")
    fn get_filters_array_item(&self, identifier: &str) -> Result<Option<FilterDefinition>>;

    /// Make sure the image for this file/filter pair exists and return it.
    /// An existing derived image is reused unless `force_regenerate` is set.
    fn add_image(&self, file_id: i64, filter_id: i64, force_regenerate: bool) -> Result<ImageRecord>;

    /// Derive the image for this file/filter pair again, replacing any
    /// previous result
    fn create_image(&self, file_id: i64, filter_id: i64) -> Result<ImageRecord>;

    /// Re-create derived images that went missing when their source is asked for
    fn auto_fix_missing_image_sources(&self) -> bool;

    fn is_production(&self) -> bool;
}
