//! Cover-art thumbnail cache.
//!
//! Turns a cover-art *locator* (an `http(s)://` URL, a `file://` URI or an
//! absolute path) into an *art reference*: a short path such as
//! `/art/3f2a….jpg` that a static file responder can serve from the cache
//! directory.
//!
//! # Keys
//!
//! The cache key is a hash of the locator string, not of the image bytes.
//! Two tracks that share a locator share one thumbnail; entries are never
//! evicted.
//!
//! # Population
//!
//! [`ArtCache::lookup`] is a synchronous existence check. [`ArtCache::resolve`]
//! fetches, decodes, resizes to a square thumbnail, re-encodes as JPEG and
//! writes the file under a temporary name before renaming it into place, so
//! readers never observe a partial file. Concurrent resolves of one key are
//! collapsed: the second caller waits for the first and then hits the cache.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use reqwest::Client;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ArtError, ArtResult, ErrorCode};
use crate::protocol_constants::{CACHE_KEY_BYTES, THUMBNAIL_EXTENSION, THUMBNAIL_JPEG_QUALITY};
use crate::state::Config;

/// Hex digest used for cache and staging file names.
#[must_use]
pub fn hash_key(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..CACHE_KEY_BYTES])
}

/// Deduplicating, resizing thumbnail cache on local disk.
pub struct ArtCache {
    cache_dir: PathBuf,
    staging_dir: PathBuf,
    url_prefix: String,
    thumbnail_size: u32,
    http: Client,
    /// Per-key locks for in-progress population.
    in_flight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    /// Number of thumbnails actually produced (fetch + transcode + write).
    transcodes: AtomicUsize,
}

impl ArtCache {
    /// Creates a cache rooted at the configured directories.
    ///
    /// Directories are created lazily on first write.
    #[must_use]
    pub fn new(config: &Config, http: Client) -> Self {
        Self {
            cache_dir: config.art_cache_dir.clone(),
            staging_dir: config.art_staging_dir.clone(),
            url_prefix: config.art_url_prefix.clone(),
            thumbnail_size: config.thumbnail_size,
            http,
            in_flight: DashMap::new(),
            transcodes: AtomicUsize::new(0),
        }
    }

    /// Thumbnail file name for a locator.
    #[must_use]
    pub fn file_name(&self, locator: &str) -> String {
        format!("{}.{}", hash_key(locator), THUMBNAIL_EXTENSION)
    }

    /// Absolute cache path for a locator.
    #[must_use]
    pub fn cache_path(&self, locator: &str) -> PathBuf {
        self.cache_dir.join(self.file_name(locator))
    }

    /// Art reference for a locator, whether or not it is cached yet.
    #[must_use]
    pub fn reference_for(&self, locator: &str) -> String {
        format!("{}{}", self.url_prefix, self.file_name(locator))
    }

    /// Returns the art reference if the thumbnail already exists.
    ///
    /// Performs no I/O beyond one existence check.
    #[must_use]
    pub fn lookup(&self, locator: &str) -> Option<String> {
        self.cache_path(locator)
            .exists()
            .then(|| self.reference_for(locator))
    }

    /// Number of thumbnails this cache has produced.
    #[must_use]
    pub fn transcode_count(&self) -> usize {
        self.transcodes.load(Ordering::Relaxed)
    }

    /// Produces the thumbnail for `locator` if needed and returns its reference.
    ///
    /// # Errors
    ///
    /// Fails if the source cannot be read or fetched, is not a decodable
    /// image, or the thumbnail cannot be written.
    pub async fn resolve(&self, locator: &str) -> ArtResult<String> {
        if let Some(reference) = self.lookup(locator) {
            return Ok(reference);
        }

        let key = hash_key(locator);
        let lock = self.in_flight.entry(key.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            match self.lookup(locator) {
                // Another caller finished while we waited
                Some(reference) => Ok(reference),
                None => self.populate(locator).await,
            }
        };
        drop(lock);
        self.in_flight
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    /// Like [`resolve`](Self::resolve) but logs failures and yields `None`.
    pub async fn resolve_or_log(&self, locator: &str) -> Option<String> {
        match self.resolve(locator).await {
            Ok(reference) => Some(reference),
            Err(e) => {
                log::warn!(
                    "[ArtCache] Failed to cache art from {} ({}): {}",
                    locator,
                    e.code(),
                    e
                );
                None
            }
        }
    }

    /// Writes raw artwork bytes to the staging directory and returns a
    /// `file://` locator for them.
    ///
    /// The file name is derived from `key` (normally the songid), so staging
    /// the same track twice reuses the existing file.
    ///
    /// # Errors
    ///
    /// Fails if the staging directory or file cannot be written.
    pub async fn stage_bytes(&self, key: &str, bytes: &[u8]) -> ArtResult<String> {
        let path = self.staging_dir.join(format!("{}.tmp", hash_key(key)));
        if !path.exists() {
            tokio::fs::create_dir_all(&self.staging_dir).await?;
            write_atomic(&path, bytes).await?;
            log::debug!(
                "[ArtCache] Staged {} bytes of artwork at {}",
                bytes.len(),
                path.display()
            );
        }
        Ok(format!("file://{}", path.display()))
    }

    async fn populate(&self, locator: &str) -> ArtResult<String> {
        log::info!("[ArtCache] Caching {}", locator);

        let source = self.fetch(locator).await?;
        let size = self.thumbnail_size;
        let thumbnail = tokio::task::spawn_blocking(move || transcode(&source, size))
            .await
            .map_err(|e| ArtError::Worker(e.to_string()))??;

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let path = self.cache_path(locator);
        write_atomic(&path, &thumbnail).await?;
        self.transcodes.fetch_add(1, Ordering::Relaxed);

        let reference = self.reference_for(locator);
        log::info!("[ArtCache] Cached {} as {}", locator, reference);
        Ok(reference)
    }

    async fn fetch(&self, locator: &str) -> ArtResult<Vec<u8>> {
        if let Some(path) = locator.strip_prefix("file://") {
            return Ok(tokio::fs::read(path).await?);
        }
        if locator.starts_with("http://") || locator.starts_with("https://") {
            let response = self.http.get(locator).send().await?.error_for_status()?;
            return Ok(response.bytes().await?.to_vec());
        }
        if Path::new(locator).is_absolute() {
            return Ok(tokio::fs::read(locator).await?);
        }
        Err(ArtError::UnsupportedLocator(locator.to_string()))
    }
}

/// Decodes `source`, resizes it to `size`×`size` and encodes it as JPEG.
fn transcode(source: &[u8], size: u32) -> ArtResult<Vec<u8>> {
    let image = image::load_from_memory(source)?;
    let thumbnail = image.resize_exact(size, size, FilterType::Lanczos3).to_rgb8();

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, THUMBNAIL_JPEG_QUALITY);
    thumbnail.write_with_encoder(encoder)?;
    Ok(out)
}

/// Writes `bytes` to a unique sibling temp file, then renames it over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension(format!("{}.part", Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
