use chrono::Utc;
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::data::{FileRecord, FilterDefinition, ImageRecord};
use super::filter::{self, FilterEffect};
use crate::error::{Error, Result};

/// Columns of a `files` row, in `row_to_file` order
const FILE_COLUMNS: &str =
    "id, name_original, system_file_name, mime_type, extension, size_bytes, caption, uploaded_at";

/// Columns of an `images` row, in `row_to_image` order
const IMAGE_COLUMNS: &str =
    "id, file_id, filter_id, resolution_width, resolution_height, caption";

/// A file about to be inserted into the catalog
#[derive(Debug, Clone)]
pub struct NewFile {
    pub name_original: String,
    pub system_file_name: String,
    pub mime_type: String,
    pub extension: String,
    pub size_bytes: i64,
    pub caption: Option<String>,
}

/// The Library manages the SQLite catalog database.
/// It stores uploaded files, filter definitions and the images derived
/// from files by applying filters.
pub struct Library {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl Library {
    /// Open (or create) the catalog at `db_path` and initialize the schema.
    pub fn open(db_path: &Path) -> Result<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        info!("Catalog opened at {}", db_path.display());

        let library = Library {
            conn,
            db_path: Some(db_path.to_path_buf()),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// In-memory catalog, gone when dropped
    pub fn open_in_memory() -> Result<Self> {
        let library = Library {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist, then
    /// seeds the built-in filters.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS files (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                name_original       TEXT NOT NULL,
                system_file_name    TEXT NOT NULL UNIQUE,
                mime_type           TEXT NOT NULL,
                extension           TEXT NOT NULL,
                size_bytes          INTEGER NOT NULL,
                caption             TEXT,
                uploaded_at         INTEGER NOT NULL
            );

            -- ids start at 1, filter id 0 is the unfiltered image
            CREATE TABLE IF NOT EXISTS filters (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier          TEXT NOT NULL UNIQUE,
                name                TEXT NOT NULL,
                chain_json          TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS images (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id             INTEGER NOT NULL,
                filter_id           INTEGER NOT NULL,
                resolution_width    INTEGER NOT NULL DEFAULT 0,
                resolution_height   INTEGER NOT NULL DEFAULT 0,
                caption             TEXT,
                UNIQUE(file_id, filter_id),
                FOREIGN KEY(file_id) REFERENCES files(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_images_file_id ON images(file_id);",
        )?;

        self.seed_default_filters()?;
        debug!("Catalog schema initialized");
        Ok(())
    }

    /// Get the path to the database file (None for in-memory catalogs)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Insert the built-in filters, leaving existing definitions untouched
    pub fn seed_default_filters(&self) -> Result<()> {
        for (identifier, name, chain) in filter::default_filters() {
            self.conn.execute(
                "INSERT OR IGNORE INTO filters (identifier, name, chain_json) VALUES (?1, ?2, ?3)",
                params![identifier, name, filter::chain_to_json(&chain)?],
            )?;
        }
        Ok(())
    }

    // ========== Files ==========

    /// Record a new upload. Returns the stored row.
    pub fn insert_file(&self, file: &NewFile) -> Result<FileRecord> {
        self.conn.execute(
            "INSERT INTO files (name_original, system_file_name, mime_type, extension, size_bytes, caption, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                file.name_original,
                file.system_file_name,
                file.mime_type,
                file.extension,
                file.size_bytes,
                file.caption,
                Utc::now().timestamp(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted file {} as {}", id, file.system_file_name);

        // The row was just written, it is there
        self.get_file(id)?
            .ok_or(Error::FileNotFound(id))
    }

    pub fn get_file(&self, id: i64) -> Result<Option<FileRecord>> {
        let file = self
            .conn
            .query_row(
                &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
                [id],
                row_to_file,
            )
            .optional()?;
        Ok(file)
    }

    /// Whether a system file name is already taken
    pub fn system_file_name_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM files WHERE system_file_name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All files, newest upload first
    pub fn list_files(&self) -> Result<Vec<FileRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM files ORDER BY uploaded_at DESC, id DESC",
            FILE_COLUMNS
        ))?;

        let files = stmt
            .query_map([], row_to_file)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    pub fn set_file_caption(&self, id: i64, caption: Option<&str>) -> Result<()> {
        self.conn.execute(
            "UPDATE files SET caption = ?1 WHERE id = ?2",
            params![caption, id],
        )?;
        Ok(())
    }

    /// Remove a file row; its images go with it
    pub fn delete_file(&self, id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM files WHERE id = ?1", [id])?;
        debug!("Deleted file {}", id);
        Ok(())
    }

    // ========== Images ==========

    /// Insert the image for a file/filter pair, or update its resolution
    /// when the pair is already known. Returns the stored row.
    pub fn upsert_image(
        &self,
        file_id: i64,
        filter_id: i64,
        width: u32,
        height: u32,
    ) -> Result<ImageRecord> {
        self.conn.execute(
            "INSERT INTO images (file_id, filter_id, resolution_width, resolution_height)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(file_id, filter_id) DO UPDATE SET
                resolution_width = excluded.resolution_width,
                resolution_height = excluded.resolution_height",
            params![file_id, filter_id, width, height],
        )?;

        self.find_image(file_id, filter_id)?
            .ok_or(Error::FileNotFound(file_id))
    }

    pub fn get_image(&self, id: i64) -> Result<Option<ImageRecord>> {
        let image = self
            .conn
            .query_row(
                &format!("SELECT {} FROM images WHERE id = ?1", IMAGE_COLUMNS),
                [id],
                row_to_image,
            )
            .optional()?;
        Ok(image)
    }

    /// The image derived from `file_id` with `filter_id`, if any
    pub fn find_image(&self, file_id: i64, filter_id: i64) -> Result<Option<ImageRecord>> {
        let image = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM images WHERE file_id = ?1 AND filter_id = ?2",
                    IMAGE_COLUMNS
                ),
                [file_id, filter_id],
                row_to_image,
            )
            .optional()?;
        Ok(image)
    }

    pub fn images_for_file(&self, file_id: i64) -> Result<Vec<ImageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM images WHERE file_id = ?1 ORDER BY filter_id",
            IMAGE_COLUMNS
        ))?;

        let images = stmt
            .query_map([file_id], row_to_image)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }

    pub fn set_image_caption(&self, id: i64, caption: Option<&str>) -> Result<()> {
        self.conn.execute(
            "UPDATE images SET caption = ?1 WHERE id = ?2",
            params![caption, id],
        )?;
        Ok(())
    }

    // ========== Filters ==========

    /// Create a filter or replace the chain of an existing one
    pub fn upsert_filter(
        &self,
        identifier: &str,
        name: &str,
        chain: &[FilterEffect],
    ) -> Result<FilterDefinition> {
        self.conn.execute(
            "INSERT INTO filters (identifier, name, chain_json) VALUES (?1, ?2, ?3)
             ON CONFLICT(identifier) DO UPDATE SET
                name = excluded.name,
                chain_json = excluded.chain_json",
            params![identifier, name, filter::chain_to_json(chain)?],
        )?;

        self.filter_by_identifier(identifier)?
            .ok_or_else(|| Error::Config(format!("filter {} not stored", identifier)))
    }

    pub fn filter_by_identifier(&self, identifier: &str) -> Result<Option<FilterDefinition>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, identifier, name, chain_json FROM filters WHERE identifier = ?1",
                [identifier],
                row_to_filter_parts,
            )
            .optional()?;
        row.map(filter_from_parts).transpose()
    }

    pub fn get_filter(&self, id: i64) -> Result<Option<FilterDefinition>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, identifier, name, chain_json FROM filters WHERE id = ?1",
                [id],
                row_to_filter_parts,
            )
            .optional()?;
        row.map(filter_from_parts).transpose()
    }

    pub fn list_filters(&self) -> Result<Vec<FilterDefinition>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, identifier, name, chain_json FROM filters ORDER BY identifier")?;

        let rows = stmt
            .query_map([], row_to_filter_parts)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(filter_from_parts).collect()
    }

    // ========== Verification ==========

    /// Count image rows whose derived file is missing from `base_path`.
    /// Nothing is changed: missing sources are re-created on demand.
    pub fn verify_images(&self, base_path: &Path) -> Result<usize> {
        let mut stmt = self.conn.prepare(
            "SELECT images.id, images.filter_id, files.system_file_name
             FROM images JOIN files ON files.id = images.file_id",
        )?;

        let rows: Vec<(i64, i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut missing = 0;
        for (id, filter_id, system_file_name) in rows {
            let name = ImageRecord::derived_file_name(filter_id, &system_file_name);
            if !base_path.join(&name).exists() {
                debug!("Image {} is missing its derived file {}", id, name);
                missing += 1;
            }
        }

        if missing > 0 {
            warn!("{} images are missing their derived file", missing);
        }

        Ok(missing)
    }
}

fn row_to_file(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        name_original: row.get(1)?,
        system_file_name: row.get(2)?,
        mime_type: row.get(3)?,
        extension: row.get(4)?,
        size_bytes: row.get(5)?,
        caption: row.get(6)?,
        uploaded_at: row.get(7)?,
    })
}

fn row_to_image(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        file_id: row.get(1)?,
        filter_id: row.get(2)?,
        resolution_width: row.get(3)?,
        resolution_height: row.get(4)?,
        caption: row.get(5)?,
    })
}

type FilterParts = (i64, String, String, String);

fn row_to_filter_parts(row: &Row<'_>) -> rusqlite::Result<FilterParts> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn filter_from_parts((id, identifier, name, chain_json): FilterParts) -> Result<FilterDefinition> {
    Ok(FilterDefinition {
        id,
        identifier,
        name,
        chain: filter::chain_from_json(&chain_json)?,
    })
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}
