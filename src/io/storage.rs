//! Spectrogram storage backends
//!
//! The cache talks to storage through [`SpectrogramStore`], keyed by the
//! cache path derived from an audio path ([`cache_key`]). [`FileStore`]
//! persists `.npy` files beside the audio; [`MemoryStore`] keeps arrays in a
//! map and never touches the filesystem.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ndarray::Ix3;

use super::npy;
use crate::error::Result;
use crate::spectral::Magnitude;

/// Extension that replaces the audio extension for cache files
pub const CACHE_EXTENSION: &str = "npy";

/// Cache key for an audio file: the same path with its extension replaced
///
/// ```
/// use std::path::Path;
/// use stratum_sep::io::storage::cache_key;
///
/// assert_eq!(cache_key(Path::new("songs/a_mix.wav")), Path::new("songs/a_mix.npy"));
/// assert_eq!(cache_key(Path::new("songs/a_inst.flac")), Path::new("songs/a_inst.npy"));
/// ```
pub fn cache_key(audio_path: &Path) -> PathBuf {
    audio_path.with_extension(CACHE_EXTENSION)
}

/// Storage for raw (un-normalized) magnitude spectrograms
///
/// Implementations must be shareable across worker threads.
pub trait SpectrogramStore: Send + Sync {
    /// Whether an entry exists for `key`
    fn contains(&self, key: &Path) -> bool;

    /// Load the entry for `key`, `None` if absent
    ///
    /// An entry that exists but cannot be read is an error, not `None`.
    fn get(&self, key: &Path) -> Result<Option<Magnitude>>;

    /// Store `value` under `key`, replacing any previous entry
    fn put(&self, key: &Path, value: &Magnitude) -> Result<()>;

    /// Delete the entry for `key`; absent entries are not an error
    fn remove(&self, key: &Path) -> Result<()>;
}

/// `.npy` files on the local filesystem
///
/// Writes go to a temporary file in the target directory and are renamed
/// into place, so a reader never observes a half-written array.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStore;

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_path(key: &Path) -> PathBuf {
    let name = key
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "spectrogram".to_string());
    let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    key.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), unique))
}

impl SpectrogramStore for FileStore {
    fn contains(&self, key: &Path) -> bool {
        key.is_file()
    }

    fn get(&self, key: &Path) -> Result<Option<Magnitude>> {
        let array = match npy::load(key) {
            Ok(array) => array,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let magnitude = array.into_dimensionality::<Ix3>().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: expected a 3-D spectrogram: {}", key.display(), e),
            )
        })?;

        log::debug!("Loaded cached spectrogram {} {:?}", key.display(), magnitude.shape());
        Ok(Some(magnitude))
    }

    fn put(&self, key: &Path, value: &Magnitude) -> Result<()> {
        let tmp = temp_path(key);

        let written = npy::save(&tmp, value).and_then(|_| fs::rename(&tmp, key));

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        log::debug!("Cached spectrogram {} {:?}", key.display(), value.shape());
        Ok(())
    }

    fn remove(&self, key: &Path) -> Result<()> {
        match fs::remove_file(key) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store, mainly for tests and short-lived pipelines
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<PathBuf, Magnitude>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Magnitude>> {
        // A panicked writer cannot leave a half-inserted array behind
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SpectrogramStore for MemoryStore {
    fn contains(&self, key: &Path) -> bool {
        self.lock().contains_key(key)
    }

    fn get(&self, key: &Path) -> Result<Option<Magnitude>> {
        Ok(self.lock().get(key).cloned())
    }

    fn put(&self, key: &Path, value: &Magnitude) -> Result<()> {
        self.lock().insert(key.to_path_buf(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &Path) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}
