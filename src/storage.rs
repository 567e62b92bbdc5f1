//! Storage collaborator.
//!
//! The pipeline never decides where bytes live; it reads and writes through
//! the [`Storage`] trait using relative, `/`-separated paths. [`FsStorage`]
//! is the local-filesystem implementation: files live under a root directory
//! and are served from a base URL.
//!
//! Writes are atomic: bytes go to a temporary file in the destination
//! directory which is then renamed over the target, so a reader sees either
//! the old asset or the complete new one.

use crate::types::Location;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Byte storage addressed by relative paths.
pub trait Storage: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    fn read(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Replace the bytes at `path` and return where they can be fetched.
    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<Location>;

    /// Where the bytes at `path` can be fetched from.
    fn location(&self, path: &str) -> io::Result<Location>;
}

impl<S: Storage + ?Sized> Storage for &S {
    fn exists(&self, path: &str) -> bool {
        (**self).exists(path)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        (**self).read(path)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<Location> {
        (**self).write(path, bytes)
    }

    fn location(&self, path: &str) -> io::Result<Location> {
        (**self).location(path)
    }
}

/// Local filesystem storage.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
    base_url: String,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl FsStorage {
    /// Files under `root` are served at `base_url` (e.g. `/media`).
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative storage path onto the root, refusing anything that
    /// would escape it.
    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(path);
        let is_plain = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !is_plain {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("storage path escapes root: {path:?}"),
            ));
        }
        Ok(self.root.join(relative))
    }

    fn url_for(&self, path: &str) -> Location {
        let base = self.base_url.trim_end_matches('/');
        Location::new(format!("{}/{}", base, path.trim_start_matches("./")))
    }
}

impl Storage for FsStorage {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.is_file())
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path)?)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<Location> {
        let target = self.resolve(path)?;
        let parent = target.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent)?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = parent.join(format!(
            ".{}.{}-{}.tmp",
            file_name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, &target))
        {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(self.url_for(path))
    }

    fn location(&self, path: &str) -> io::Result<Location> {
        let resolved = self.resolve(path)?;
        if !resolved.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no stored asset at {path:?}"),
            ));
        }
        Ok(self.url_for(path))
    }
}
