use chrono::Utc;
use image::ImageFormat;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use super::{processor, StorageService};
use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::image_item::ImageItem;
use crate::state::data::{FileRecord, FilterDefinition, ImageRecord, ORIGINAL_FILTER_ID};
use crate::state::library::{Library, NewFile};

/// Storage folder on the local disk, indexed by a SQLite catalog
pub struct LocalStorage {
    config: StorageConfig,
    library: Library,
}

impl LocalStorage {
    /// Create the storage folder if needed and open its catalog
    pub fn open(config: StorageConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.base_path)?;
        let library = Library::open(&config.catalog_path())?;

        info!("Storage ready at {}", config.base_path.display());
        Ok(Self { config, library })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Copy an upload into the storage folder. Image uploads also get their
    /// unfiltered image created.
    pub fn add_file(&self, source: &Path, caption: Option<&str>) -> Result<FileRecord> {
        let name_original = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::Config(format!("{} is not a file", source.display())))?;
        let extension = source
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let format = ImageFormat::from_extension(&extension);
        let mime_type = format
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let system_file_name = self.unique_system_file_name(source, &extension)?;
        let size_bytes = std::fs::copy(source, self.server_path(&system_file_name))?;

        let inserted = self.library.insert_file(&NewFile {
            name_original,
            system_file_name: system_file_name.clone(),
            mime_type,
            extension,
            size_bytes: size_bytes as i64,
            caption: caption.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        });
        let file = match inserted {
            Ok(file) => file,
            Err(e) => {
                self.remove_stored(&system_file_name);
                return Err(e);
            }
        };

        // A failed upload leaves neither a catalog row nor files behind
        if format.is_some() {
            if let Err(e) = self.create_image(file.id, ORIGINAL_FILTER_ID) {
                warn!("Discarding upload {}: {}", file.name_original, e);
                self.library.delete_file(file.id)?;
                self.remove_stored(&file.system_file_name);
                self.remove_stored(&ImageRecord::derived_file_name(
                    ORIGINAL_FILTER_ID,
                    &file.system_file_name,
                ));
                return Err(e);
            }
        }

        info!("Stored {} as {}", file.name_original, file.system_file_name);
        Ok(file)
    }

    /// Delete `name` from the storage folder if it is there
    fn remove_stored(&self, name: &str) {
        let path = self.server_path(name);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Could not remove {}: {}", path.display(), e);
            }
        }
    }

    /// The image with this id, bound to this storage
    pub fn get_image(&self, id: i64) -> Result<ImageItem<'_, Self>> {
        let record = self.library.get_image(id)?.ok_or(Error::ImageNotFound(id))?;
        Ok(ImageItem::new(self, record))
    }

    /// Every image derived from a file, unfiltered one first
    pub fn images_for_file(&self, file_id: i64) -> Result<Vec<ImageItem<'_, Self>>> {
        Ok(self
            .library
            .images_for_file(file_id)?
            .into_iter()
            .map(|record| ImageItem::new(self, record))
            .collect())
    }

    pub fn filters(&self) -> Result<Vec<FilterDefinition>> {
        self.library.list_filters()
    }

    /// Number of catalogued images whose derived file is gone
    pub fn verify(&self) -> Result<usize> {
        self.library.verify_images(&self.config.base_path)
    }

    fn server_path(&self, name: &str) -> PathBuf {
        self.config.base_path.join(name)
    }

    /// `{stem}_{upload time as hex}.{ext}`, bumped until the name is free
    fn unique_system_file_name(&self, source: &Path, extension: &str) -> Result<String> {
        let stem = source
            .file_stem()
            .map(|s| slugify(&s.to_string_lossy()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "file".to_string());

        let mut stamp = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| Utc::now().timestamp()) as u64;

        loop {
            let name = if extension.is_empty() {
                format!("{}_{:x}", stem, stamp)
            } else {
                format!("{}_{:x}.{}", stem, stamp, extension)
            };

            if !self.library.system_file_name_exists(&name)? && !self.server_path(&name).exists() {
                return Ok(name);
            }
            stamp = stamp.wrapping_add(1);
        }
    }

    /// Derive the image file for the pair and record its resolution
    fn derive(&self, file_id: i64, filter_id: i64) -> Result<ImageRecord> {
        let file = self
            .library
            .get_file(file_id)?
            .ok_or(Error::FileNotFound(file_id))?;

        let chain = if filter_id == ORIGINAL_FILTER_ID {
            Vec::new()
        } else {
            self.library
                .get_filter(filter_id)?
                .ok_or(Error::FilterNotFound(filter_id))?
                .chain
        };

        let target = self.server_path(&ImageRecord::derived_file_name(
            filter_id,
            &file.system_file_name,
        ));
        let (width, height) =
            processor::derive_image(&self.server_path(&file.system_file_name), &chain, &target)?;

        debug!(
            "Derived image for file {} with filter {}: {}x{}",
            file_id, filter_id, width, height
        );
        self.library.upsert_image(file_id, filter_id, width, height)
    }
}

impl StorageService for LocalStorage {
    fn file_system_exists(&self, name: &str) -> bool {
        self.server_path(name).is_file()
    }

    fn file_http_path(&self, name: &str) -> String {
        join_url(&self.config.http_path, name)
    }

    fn file_absolute_http_path(&self, name: &str) -> String {
        join_url(&self.config.absolute_http_path, name)
    }

    fn file_server_path(&self, name: &str) -> String {
        self.server_path(name).to_string_lossy().to_string()
    }

    fn file_system_content(&self, name: &str) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.server_path(name))?)
    }

    fn get_file(&self, file_id: i64) -> Result<Option<FileRecord>> {
        self.library.get_file(file_id)
    }

    fn get_filters_array_item(&self, identifier: &str) -> Result<Option<FilterDefinition>> {
        self.library.filter_by_identifier(identifier)
    }

    fn add_image(&self, file_id: i64, filter_id: i64, force_regenerate: bool) -> Result<ImageRecord> {
        if !force_regenerate {
            if let Some(existing) = self.library.find_image(file_id, filter_id)? {
                let file = self
                    .library
                    .get_file(file_id)?
                    .ok_or(Error::FileNotFound(file_id))?;
                let name = ImageRecord::derived_file_name(filter_id, &file.system_file_name);

                if self.file_system_exists(&name) {
                    return Ok(existing);
                }
            }
        }

        self.derive(file_id, filter_id)
    }

    fn create_image(&self, file_id: i64, filter_id: i64) -> Result<ImageRecord> {
        self.derive(file_id, filter_id)
    }

    fn auto_fix_missing_image_sources(&self) -> bool {
        self.config.auto_fix_missing_image_sources
    }

    fn is_production(&self) -> bool {
        self.config.is_production()
    }
}

impl std::fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorage")
            .field("base_path", &self.config.base_path)
            .field("library", &self.library)
            .finish()
    }
}

fn join_url(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// Lowercase ascii alphanumerics, everything else collapsed to single dashes
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
