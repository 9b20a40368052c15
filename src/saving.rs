use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs::{File, create_dir_all};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::storage::KeyValueStore;

/// Key/value store persisted as a gzip-compressed bincode snapshot
///
/// The whole map lives in memory. Every `set` and `remove` rewrites the
/// snapshot file in full, so a record on disk is never half-written by us.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the snapshot at `path`
    ///
    /// A missing file yields an empty store. A file that cannot be decoded is
    /// logged and ignored; it is replaced on the next write.
    ///
    /// # Errors
    /// * Returns an error if the parent directory cannot be created
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }

        let entries = if path.exists() {
            match load_snapshot(&path) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("discarding unreadable store snapshot {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        debug!("opened {} with {} keys", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        save_snapshot(&self.entries, &self.path)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

fn save_snapshot(entries: &BTreeMap<String, String>, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serialize_into(&mut writer, entries)?;

    let encoder = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    encoder.finish()?.flush()?;
    Ok(())
}

fn load_snapshot(path: &Path) -> Result<BTreeMap<String, String>> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let mut reader = BufReader::new(decoder);

    let entries: BTreeMap<String, String> = deserialize_from(&mut reader)?;
    Ok(entries)
}
