//! Admin media storage
//!
//! - `storage`: the folder + catalog that owns uploaded files and the
//!   images derived from them by filters
//! - `image_item`: an image record decorated with caption, sources and
//!   filter application
//! - `assets`: vendor script/style bundles of the admin UI

pub mod assets;
pub mod config;
pub mod error;
pub mod image_item;
pub mod state;
pub mod storage;

pub use config::{Environment, StorageConfig};
pub use error::{Error, Result};
pub use image_item::{ImageItem, ImageItemView, Scheme};
pub use storage::{LocalStorage, StorageService};
