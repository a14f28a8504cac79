use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use admin_storage::assets::{resolve_language, AdminIdentity, AssetBundle};
use admin_storage::{LocalStorage, Result, Scheme, StorageConfig};

/// Manage the admin media storage from the command line
#[derive(Parser, Debug)]
#[command(name = "admin-storage", version)]
struct Cli {
    /// JSON config file; defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add every image below a folder to the storage
    Import { folder: PathBuf },
    /// Print the web source of an image
    Source {
        image_id: i64,
        #[arg(long)]
        absolute: bool,
    },
    /// Apply a filter to the file of an image
    Apply { image_id: i64, filter: String },
    /// Print an image as the admin API returns it
    Show { image_id: i64 },
    /// List the known filters
    Filters,
    /// Count images whose derived file is missing
    Verify,
    /// Print the vendor asset urls for an admin language
    Assets {
        /// Admin language; the configured default when omitted
        #[arg(long)]
        language: Option<String>,
        #[arg(long, default_value = "/assets/bowervendor")]
        base_url: String,
    },
}

/// Result of a folder import operation
#[derive(Debug, Clone, Default)]
struct ImportResult {
    imported_count: usize,
    skipped_count: usize,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => StorageConfig::load(path)?,
        None => StorageConfig::default(),
    };

    match cli.command {
        // Asset bundles need no storage
        Command::Assets { language, base_url } => {
            for url in asset_urls(language.as_deref(), &config.default_language, &base_url) {
                println!("{}", url);
            }
        }
        Command::Import { folder } => {
            let storage = LocalStorage::open(config)?;
            let result = import_folder(&storage, &folder);
            info!(
                "Import complete: {} new, {} skipped",
                result.imported_count, result.skipped_count
            );
        }
        Command::Source { image_id, absolute } => {
            let storage = LocalStorage::open(config)?;
            let scheme = if absolute { Scheme::Absolute } else { Scheme::Relative };
            match storage.get_image(image_id)?.source(scheme)? {
                Some(source) => println!("{}", source),
                None => warn!("Image {} has no source on disk", image_id),
            }
        }
        Command::Apply { image_id, filter } => {
            let storage = LocalStorage::open(config)?;
            match storage.get_image(image_id)?.apply_filter(&filter)? {
                Some(image) => println!("{}", serde_json::to_string_pretty(&image.to_view()?)?),
                None => warn!("No filter named {}", filter),
            }
        }
        Command::Show { image_id } => {
            let storage = LocalStorage::open(config)?;
            let image = storage.get_image(image_id)?;
            println!("{}", serde_json::to_string_pretty(&image.to_view()?)?);
        }
        Command::Filters => {
            let storage = LocalStorage::open(config)?;
            for filter in storage.filters()? {
                println!(
                    "{:>3}  {:<20} {}",
                    filter.id,
                    filter.identifier,
                    serde_json::to_string(&filter.chain)?
                );
            }
        }
        Command::Verify => {
            let storage = LocalStorage::open(config)?;
            let missing = storage.verify()?;
            println!("{} images missing their derived file", missing);
        }
    }

    Ok(())
}

/// Vendor asset urls for `language`, or for `default_language` when none is given
fn asset_urls(language: Option<&str>, default_language: &str, base_url: &str) -> Vec<String> {
    let identity = language.map(AdminIdentity::with_language);
    let language = resolve_language(identity.as_ref(), default_language);
    AssetBundle::bower_vendor(language).urls(base_url)
}

/// Add every image file below `folder` to the storage.
/// Files that fail to import are logged and counted as skipped.
fn import_folder(storage: &LocalStorage, folder: &Path) -> ImportResult {
    let mut result = ImportResult::default();
    info!("Scanning folder: {}", folder.display());

    // Walk the directory tree recursively
    for entry in WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_image(path) {
            continue;
        }

        match storage.add_file(path, None) {
            Ok(_) => {
                result.imported_count += 1;
                if result.imported_count % 100 == 0 {
                    info!("Imported {} files...", result.imported_count);
                }
            }
            Err(e) => {
                warn!("Error importing {}: {}", path.display(), e);
                result.skipped_count += 1;
            }
        }
    }

    result
}

fn is_image(path: &Path) -> bool {
    image::ImageFormat::from_path(path)
        .map(|f| f.can_read())
        .unwrap_or(false)
}
