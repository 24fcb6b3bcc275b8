use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// On-disk store for raw telemetry responses, keyed by request identity.
///
/// Passed explicitly to whichever source needs it, so tests and separate
/// sessions can point at isolated directories.
#[derive(Debug, Clone)]
pub struct TelemetryCache {
    dir: PathBuf,
}

impl TelemetryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| Error::storage(&dir, e))?;
        tracing::debug!(dir = %dir.display(), "telemetry cache enabled");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(path, e)),
        }
    }

    /// Whole-file write through a temp file, so a crash never leaves a
    /// truncated entry behind.
    pub fn put(&self, key: &str, body: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| Error::storage(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| Error::storage(&path, e))
    }

    /// Returns the cached body for `key`, or runs `fetch` and stores its result.
    ///
    /// Empty listings are returned but never stored; the data may be
    /// published later.
    pub fn get_or_fetch<F>(&self, key: &str, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Result<String>,
    {
        if let Some(hit) = self.get(key)? {
            tracing::trace!(key, "telemetry cache hit");
            return Ok(hit);
        }
        let body = fetch()?;
        if is_empty_listing(&body) {
            tracing::debug!(key, "empty response, not cached");
        } else {
            self.put(key, &body)?;
        }
        Ok(body)
    }
}

fn is_empty_listing(body: &str) -> bool {
    let body = body.trim();
    body.is_empty() || body == "[]"
}
