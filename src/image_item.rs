//! Image item
//!
//! Wraps a stored image record and exposes what the admin UI needs about
//! it: resolution, caption, web source, server path and raw content. The
//! parent file and the caption are resolved lazily on first access and
//! kept for the life of the item.

use log::{debug, info};
use serde::Serialize;
use std::cell::OnceCell;

use crate::error::{Error, Result};
use crate::state::data::{FileRecord, ImageRecord};
use crate::storage::StorageService;

/// Whether a web source should include scheme and host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    #[default]
    Relative,
    Absolute,
}

/// An image (a file with a filter applied), bound to the storage it lives in
pub struct ImageItem<'s, S: StorageService> {
    storage: &'s S,
    record: ImageRecord,
    /// Parent file, fetched on first use
    file: OnceCell<FileRecord>,
    /// Resolved caption (None = no caption anywhere)
    caption: OnceCell<Option<String>>,
}

/// Serializable projection of an image item, as the admin API returns it
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageItemView {
    pub id: i64,
    pub file_id: i64,
    pub filter_id: i64,
    /// None when the derived image is missing and auto-fix is off
    pub source: Option<String>,
    pub server_source: String,
    pub resolution_width: u32,
    pub resolution_height: u32,
    pub caption: Option<String>,
}

impl<'s, S: StorageService> ImageItem<'s, S> {
    pub fn new(storage: &'s S, record: ImageRecord) -> Self {
        Self {
            storage,
            record,
            file: OnceCell::new(),
            caption: OnceCell::new(),
        }
    }

    pub fn record(&self) -> &ImageRecord {
        &self.record
    }

    pub fn id(&self) -> i64 {
        self.record.id
    }

    pub fn file_id(&self) -> i64 {
        self.record.file_id
    }

    pub fn filter_id(&self) -> i64 {
        self.record.filter_id
    }

    /// Image width in pixels
    pub fn resolution_width(&self) -> u32 {
        self.record.resolution_width
    }

    /// Image height in pixels
    pub fn resolution_height(&self) -> u32 {
        self.record.resolution_height
    }

    /// Override the caption of this item. Stored trimmed.
    pub fn set_caption(&mut self, text: &str) {
        self.caption = OnceCell::from(Some(text.trim().to_string()));
    }

    /// Caption of this image.
    ///
    /// An explicit caption (see [`set_caption`](Self::set_caption)) wins,
    /// then a non-empty caption bound to the image record, then the caption
    /// the file manager stored on the parent file.
    pub fn caption(&self) -> Result<Option<&str>> {
        if let Some(caption) = self.caption.get() {
            return Ok(caption.as_deref());
        }

        let resolved = match self.record.caption.as_deref().filter(|c| !c.is_empty()) {
            Some(caption) => Some(caption.to_string()),
            None => self.file()?.caption.clone(),
        };

        Ok(self.caption.get_or_init(|| resolved).as_deref())
    }

    /// The file this image was created from.
    ///
    /// # Errors
    ///
    /// [`Error::FileNotFound`] when the file is no longer in the storage system.
    pub fn file(&self) -> Result<&FileRecord> {
        if let Some(file) = self.file.get() {
            return Ok(file);
        }

        let file = self
            .storage
            .get_file(self.file_id())?
            .ok_or(Error::FileNotFound(self.file_id()))?;

        Ok(self.file.get_or_init(|| file))
    }

    /// Name of the image in the storage folder: `{filter_id}_{file system name}`
    pub fn system_file_name(&self) -> Result<String> {
        let file = self.file()?;
        Ok(ImageRecord::derived_file_name(
            self.filter_id(),
            &file.system_file_name,
        ))
    }

    /// Whether the derived image is present in the storage folder
    pub fn file_exists(&self) -> Result<bool> {
        Ok(self.storage.file_system_exists(&self.system_file_name()?))
    }

    /// Web path of the image.
    ///
    /// A derived image that went missing (e.g. after its filter changed) is
    /// re-created first. Returns `Ok(None)` when it is missing and the
    /// storage has auto-fix turned off.
    pub fn source(&self, scheme: Scheme) -> Result<Option<String>> {
        let name = self.system_file_name()?;

        if !self.storage.file_system_exists(&name) {
            if !self.storage.auto_fix_missing_image_sources() {
                debug!("Image {} has no source and auto-fix is off", self.id());
                return Ok(None);
            }

            info!(
                "Image {} is missing {}, re-creating it",
                self.id(),
                name
            );
            self.storage.create_image(self.file_id(), self.filter_id())?;
        }

        let path = match scheme {
            Scheme::Relative => self.storage.file_http_path(&name),
            Scheme::Absolute => self.storage.file_absolute_http_path(&name),
        };
        Ok(Some(path))
    }

    pub fn source_absolute(&self) -> Result<Option<String>> {
        self.source(Scheme::Absolute)
    }

    /// Path of the image on the server
    pub fn server_source(&self) -> Result<String> {
        Ok(self.storage.file_server_path(&self.system_file_name()?))
    }

    /// Raw bytes of the image file
    pub fn content(&self) -> Result<Vec<u8>> {
        self.storage.file_system_content(&self.system_file_name()?)
    }

    /// Apply another filter to the file this image was created from.
    ///
    /// Returns `Ok(None)` when no filter is named `filter_name`. Outside
    /// production the filter is always re-applied so chain edits show up
    /// immediately.
    pub fn apply_filter(&self, filter_name: &str) -> Result<Option<ImageItem<'s, S>>> {
        let Some(filter) = self.storage.get_filters_array_item(filter_name)? else {
            debug!("No filter named {}", filter_name);
            return Ok(None);
        };

        let force = !self.storage.is_production();
        let record = self.storage.add_image(self.file_id(), filter.id, force)?;
        Ok(Some(ImageItem::new(self.storage, record)))
    }

    /// Fields exposed by the admin API
    pub fn to_view(&self) -> Result<ImageItemView> {
        Ok(ImageItemView {
            id: self.id(),
            file_id: self.file_id(),
            filter_id: self.filter_id(),
            source: self.source(Scheme::Relative)?,
            server_source: self.server_source()?,
            resolution_width: self.resolution_width(),
            resolution_height: self.resolution_height(),
            caption: self.caption()?.map(str::to_string),
        })
    }
}

impl<S: StorageService> std::fmt::Debug for ImageItem<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageItem")
            .field("record", &self.record)
            .field("file", &self.file.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::FilterDefinition;
    use crate::state::filter::FilterEffect;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;

    /// Storage double that records every regeneration request
    struct RecordingStorage {
        files: Vec<FileRecord>,
        filters: Vec<FilterDefinition>,
        existing: RefCell<HashSet<String>>,
        auto_fix: bool,
        production: bool,
        get_file_calls: Cell<usize>,
        create_calls: RefCell<Vec<(i64, i64)>>,
        add_calls: RefCell<Vec<(i64, i64, bool)>>,
    }

    impl RecordingStorage {
        fn new() -> Self {
            Self {
                files: vec![FileRecord {
                    id: 7,
                    name_original: "Harbour.jpg".to_string(),
                    system_file_name: "harbour_17f3a2c1.jpg".to_string(),
                    mime_type: "image/jpeg".to_string(),
                    extension: "jpg".to_string(),
                    size_bytes: 2048,
                    caption: Some("Harbour at dawn".to_string()),
                    uploaded_at: 0,
                }],
                filters: vec![FilterDefinition {
                    id: 4,
                    identifier: "small-thumbnail".to_string(),
                    name: "Thumbnail small".to_string(),
                    chain: vec![FilterEffect::Thumbnail { width: 100, height: 100 }],
                }],
                existing: RefCell::new(HashSet::new()),
                auto_fix: true,
                production: true,
                get_file_calls: Cell::new(0),
                create_calls: RefCell::new(Vec::new()),
                add_calls: RefCell::new(Vec::new()),
            }
        }

        fn with_existing(self, name: &str) -> Self {
            self.existing.borrow_mut().insert(name.to_string());
            self
        }
    }

    impl StorageService for RecordingStorage {
        fn file_system_exists(&self, name: &str) -> bool {
            self.existing.borrow().contains(name)
        }

        fn file_http_path(&self, name: &str) -> String {
            format!("/storage/{}", name)
        }

        fn file_absolute_http_path(&self, name: &str) -> String {
            format!("https://cms.example.com/storage/{}", name)
        }

        fn file_server_path(&self, name: &str) -> String {
            format!("/srv/storage/{}", name)
        }

        fn file_system_content(&self, name: &str) -> Result<Vec<u8>> {
            Ok(name.as_bytes().to_vec())
        }

        fn get_file(&self, file_id: i64) -> Result<Option<FileRecord>> {
            self.get_file_calls.set(self.get_file_calls.get() + 1);
            Ok(self.files.iter().find(|f| f.id == file_id).cloned())
        }

        fn get_filters_array_item(&self, identifier: &str) -> Result<Option<FilterDefinition>> {
            Ok(self
                .filters
                .iter()
                .find(|f| f.identifier == identifier)
                .cloned())
        }

        fn add_image(&self, file_id: i64, filter_id: i64, force: bool) -> Result<ImageRecord> {
            self.add_calls.borrow_mut().push((file_id, filter_id, force));
            Ok(ImageRecord {
                id: 99,
                file_id,
                filter_id,
                resolution_width: 100,
                resolution_height: 67,
                caption: None,
            })
        }

        fn create_image(&self, file_id: i64, filter_id: i64) -> Result<ImageRecord> {
            self.create_calls.borrow_mut().push((file_id, filter_id));
            self.existing
                .borrow_mut()
                .insert(format!("{}_harbour_17f3a2c1.jpg", filter_id));
            Ok(record(filter_id, None))
        }

        fn auto_fix_missing_image_sources(&self) -> bool {
            self.auto_fix
        }

        fn is_production(&self) -> bool {
            self.production
        }
    }

    fn record(filter_id: i64, caption: Option<&str>) -> ImageRecord {
        ImageRecord {
            id: 12,
            file_id: 7,
            filter_id,
            resolution_width: 640,
            resolution_height: 480,
            caption: caption.map(str::to_string),
        }
    }

    #[test]
    fn test_accessors_read_the_record() {
        let storage = RecordingStorage::new();
        let item = ImageItem::new(&storage, record(3, None));

        assert_eq!(item.id(), 12);
        assert_eq!(item.file_id(), 7);
        assert_eq!(item.filter_id(), 3);
        assert_eq!(item.resolution_width(), 640);
        assert_eq!(item.resolution_height(), 480);
    }

    #[test]
    fn test_explicit_caption_wins_trimmed() {
        let storage = RecordingStorage::new();
        let mut item = ImageItem::new(&storage, record(3, Some("Bound caption")));

        item.set_caption("  Explicit caption \n");

        assert_eq!(item.caption().unwrap(), Some("Explicit caption"));
        // Explicit caption never needs the file
        assert_eq!(storage.get_file_calls.get(), 0);
    }

    #[test]
    fn test_explicit_caption_replaces_resolved_one() {
        let storage = RecordingStorage::new();
        let mut item = ImageItem::new(&storage, record(3, None));

        assert_eq!(item.caption().unwrap(), Some("Harbour at dawn"));
        item.set_caption("Later");
        assert_eq!(item.caption().unwrap(), Some("Later"));
    }

    #[test]
    fn test_record_caption_before_file_caption() {
        let storage = RecordingStorage::new();
        let item = ImageItem::new(&storage, record(3, Some("Bound caption")));

        assert_eq!(item.caption().unwrap(), Some("Bound caption"));
    }

    #[test]
    fn test_caption_falls_back_to_file() {
        let storage = RecordingStorage::new();
        let item = ImageItem::new(&storage, record(3, None));

        assert_eq!(item.caption().unwrap(), Some("Harbour at dawn"));

        let empty = ImageItem::new(&storage, record(3, Some("")));
        assert_eq!(empty.caption().unwrap(), Some("Harbour at dawn"));
    }

    #[test]
    fn test_file_is_fetched_once() {
        let storage = RecordingStorage::new();
        let item = ImageItem::new(&storage, record(3, None));

        item.file().unwrap();
        item.system_file_name().unwrap();
        item.caption().unwrap();
        item.caption().unwrap();

        assert_eq!(storage.get_file_calls.get(), 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let storage = RecordingStorage::new();
        let mut orphan = record(3, None);
        orphan.file_id = 404;
        let item = ImageItem::new(&storage, orphan);

        assert!(matches!(item.file(), Err(Error::FileNotFound(404))));
        assert!(matches!(item.system_file_name(), Err(Error::FileNotFound(404))));
    }

    #[test]
    fn test_system_file_name_prefixes_filter_id() {
        let storage = RecordingStorage::new();
        let item = ImageItem::new(&storage, record(3, None));

        assert_eq!(item.system_file_name().unwrap(), "3_harbour_17f3a2c1.jpg");
    }

    #[test]
    fn test_existing_source_paths() {
        let storage = RecordingStorage::new().with_existing("3_harbour_17f3a2c1.jpg");
        let item = ImageItem::new(&storage, record(3, None));

        assert!(item.file_exists().unwrap());
        assert_eq!(
            item.source(Scheme::Relative).unwrap().as_deref(),
            Some("/storage/3_harbour_17f3a2c1.jpg")
        );
        assert_eq!(
            item.source_absolute().unwrap().as_deref(),
            Some("https://cms.example.com/storage/3_harbour_17f3a2c1.jpg")
        );
        assert_eq!(item.server_source().unwrap(), "/srv/storage/3_harbour_17f3a2c1.jpg");
        assert_eq!(item.content().unwrap(), b"3_harbour_17f3a2c1.jpg".to_vec());
        assert!(storage.create_calls.borrow().is_empty());
    }

    #[test]
    fn test_missing_source_without_auto_fix() {
        let mut storage = RecordingStorage::new();
        storage.auto_fix = false;
        let item = ImageItem::new(&storage, record(3, None));

        assert!(!item.file_exists().unwrap());
        assert_eq!(item.source(Scheme::Relative).unwrap(), None);
        assert_eq!(item.source_absolute().unwrap(), None);
        assert!(storage.create_calls.borrow().is_empty());
    }

    #[test]
    fn test_missing_source_is_recreated_once() {
        let storage = RecordingStorage::new();
        let item = ImageItem::new(&storage, record(3, None));

        assert_eq!(
            item.source(Scheme::Relative).unwrap().as_deref(),
            Some("/storage/3_harbour_17f3a2c1.jpg")
        );
        assert_eq!(*storage.create_calls.borrow(), vec![(7, 3)]);
    }

    #[test]
    fn test_apply_unknown_filter() {
        let storage = RecordingStorage::new();
        let item = ImageItem::new(&storage, record(0, None));

        assert!(item.apply_filter("nonexistent-filter").unwrap().is_none());
        assert!(storage.add_calls.borrow().is_empty());
    }

    #[test]
    fn test_apply_filter_in_production_reuses() {
        let storage = RecordingStorage::new();
        let item = ImageItem::new(&storage, record(0, None));

        let thumb = item.apply_filter("small-thumbnail").unwrap().unwrap();

        assert_eq!(thumb.filter_id(), 4);
        assert_eq!(thumb.file_id(), 7);
        assert_eq!(*storage.add_calls.borrow(), vec![(7, 4, false)]);
    }

    #[test]
    fn test_apply_filter_outside_production_forces() {
        let mut storage = RecordingStorage::new();
        storage.production = false;
        let item = ImageItem::new(&storage, record(0, None));

        item.apply_filter("small-thumbnail").unwrap();

        assert_eq!(*storage.add_calls.borrow(), vec![(7, 4, true)]);
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let storage = RecordingStorage::new().with_existing("3_harbour_17f3a2c1.jpg");
        let item = ImageItem::new(&storage, record(3, None));

        let json = serde_json::to_value(item.to_view().unwrap()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "id": 12,
                "fileId": 7,
                "filterId": 3,
                "source": "/storage/3_harbour_17f3a2c1.jpg",
                "serverSource": "/srv/storage/3_harbour_17f3a2c1.jpg",
                "resolutionWidth": 640,
                "resolutionHeight": 480,
                "caption": "Harbour at dawn",
            })
        );
    }
}
