//! Filter effects applied to an uploaded file to produce a derived image
//!
//! A filter is an ordered chain of effects. The chain is serialized to JSON
//! and stored in the catalog, so filter definitions can be changed without
//! touching the derived images already on disk (they get re-created on
//! demand).

use serde::{Deserialize, Serialize};

/// One step of a filter chain
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum FilterEffect {
    /// Scale down to fit inside the box, keeping the aspect ratio
    Thumbnail { width: u32, height: u32 },
    /// Scale to exactly this size (aspect ratio is not kept)
    Resize { width: u32, height: u32 },
    /// Scale to cover the box, then cut the centered part
    Crop { width: u32, height: u32 },
    Grayscale,
}

/// Built-in filters seeded into every new catalog: (identifier, name, chain)
pub fn default_filters() -> Vec<(&'static str, &'static str, Vec<FilterEffect>)> {
    use FilterEffect::*;

    vec![
        ("tiny-crop", "Crop tiny", vec![Crop { width: 40, height: 40 }]),
        (
            "tiny-thumbnail",
            "Thumbnail tiny",
            vec![Thumbnail { width: 40, height: 40 }],
        ),
        (
            "medium-crop",
            "Crop medium",
            vec![Crop { width: 250, height: 250 }],
        ),
        (
            "medium-thumbnail",
            "Thumbnail medium",
            vec![Thumbnail { width: 250, height: 250 }],
        ),
        (
            "small-crop",
            "Crop small",
            vec![Crop { width: 100, height: 100 }],
        ),
        (
            "small-landscape",
            "Landscape small",
            vec![Thumbnail { width: 150, height: 50 }],
        ),
        (
            "small-thumbnail",
            "Thumbnail small",
            vec![Thumbnail { width: 100, height: 100 }],
        ),
    ]
}

/// Convert a chain to JSON string for database storage
pub fn chain_to_json(chain: &[FilterEffect]) -> Result<String, serde_json::Error> {
    serde_json::to_string(chain)
}

/// Parse a chain from JSON string (from database)
pub fn chain_from_json(json: &str) -> Result<Vec<FilterEffect>, serde_json::Error> {
    serde_json::from_str(json)
}
