//! Shared data structures for stored media
//!
//! These structs represent the rows that flow between the catalog
//! database and the storage layer.

use serde::{Deserialize, Serialize};

use super::filter::FilterEffect;

/// Filter id of the unfiltered image every upload gets
pub const ORIGINAL_FILTER_ID: i64 = 0;

/// An uploaded original in the storage folder
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileRecord {
    /// Unique database ID
    pub id: i64,
    /// Filename as uploaded (e.g., "Harbour at dawn.jpg")
    pub name_original: String,
    /// Unique name inside the storage folder (e.g., "harbour-at-dawn_17f3a2c1.jpg")
    pub system_file_name: String,
    pub mime_type: String,
    pub extension: String,
    pub size_bytes: i64,
    /// Caption set in the file manager, if any
    pub caption: Option<String>,
    /// Upload time, unix seconds
    pub uploaded_at: i64,
}

/// A file with a filter applied. `filter_id` 0 is the unfiltered image.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: i64,
    pub file_id: i64,
    pub filter_id: i64,
    pub resolution_width: u32,
    pub resolution_height: u32,
    /// Caption bound to this image; overrides the file caption
    pub caption: Option<String>,
}

impl ImageRecord {
    /// On-disk name of a derived image: `{filter_id}_{system_file_name}`
    pub fn derived_file_name(filter_id: i64, system_file_name: &str) -> String {
        format!("{}_{}", filter_id, system_file_name)
    }
}

/// A named chain of effects, looked up by `identifier`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FilterDefinition {
    pub id: i64,
    /// Stable lookup key (e.g., "small-thumbnail")
    pub identifier: String,
    /// Human readable label
    pub name: String,
    pub chain: Vec<FilterEffect>,
}
