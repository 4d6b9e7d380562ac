//! Single-file snapshot persistence for [`RecommenderModel`].
//!
//! File layout: magic `PRCM`, format version (u16 LE), CRC32 of the payload (u32 LE),
//! then the bincode payload. Writes go to a uniquely named sibling temp file that is
//! fsynced and renamed over the target, so readers see either the old or the new snapshot.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher as Crc32;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::RecommenderModel;

/// Default snapshot file name.
pub const DEFAULT_MODEL_PATH: &str = "recommender_model.bin";

const MAGIC: [u8; 4] = *b"PRCM";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 4;

/// Failures while reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("snapshot I/O failed for {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Payload could not be encoded or decoded.
    #[error("snapshot encoding failed: {0}")]
    Codec(#[from] bincode::Error),
    /// File does not start with the snapshot header.
    #[error("{0} is not a recommender snapshot")]
    BadMagic(PathBuf),
    /// Snapshot written by an incompatible format version.
    #[error("unsupported snapshot version {found} (expected {expected})")]
    Version {
        /// Version stored in the file.
        found: u16,
        /// Version this build reads.
        expected: u16,
    },
    /// Payload checksum mismatch.
    #[error("snapshot checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    Checksum {
        /// Checksum from the header.
        stored: u32,
        /// Checksum of the payload read.
        computed: u32,
    },
}

/// Reads and writes the model snapshot at a fixed path.
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    /// Store rooted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replaces the snapshot with `model`.
    pub fn save<V: Serialize>(&self, model: &RecommenderModel<V>) -> Result<(), StoreError> {
        let payload = bincode::serialize(model)?;
        let mut hasher = Crc32::new();
        hasher.update(&payload);
        let checksum = hasher.finalize();

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&checksum.to_le_bytes());
        bytes.extend_from_slice(&payload);

        let dir = self.dir();
        fs::create_dir_all(dir).map_err(io_error(dir))?;
        // Unique per writer; dropped (and deleted) if any step before persist fails.
        let mut temp = NamedTempFile::new_in(dir).map_err(io_error(dir))?;
        temp.write_all(&bytes).map_err(io_error(temp.path()))?;
        temp.as_file().sync_all().map_err(io_error(temp.path()))?;
        temp.persist(&self.path).map_err(|err| io_error(&self.path)(err.error))?;
        info!(
            path = %self.path.display(),
            bytes = bytes.len(),
            products = model.len(),
            "saved recommender snapshot"
        );
        Ok(())
    }

    /// Loads the snapshot, or `None` when no snapshot exists yet.
    pub fn load<V: DeserializeOwned>(&self) -> Result<Option<RecommenderModel<V>>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no recommender snapshot on disk");
                return Ok(None);
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if bytes.len() < HEADER_LEN || bytes[..4] != MAGIC {
            return Err(StoreError::BadMagic(self.path.clone()));
        }
        let found = u16::from_le_bytes([bytes[4], bytes[5]]);
        if found != FORMAT_VERSION {
            return Err(StoreError::Version {
                found,
                expected: FORMAT_VERSION,
            });
        }
        let stored = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        let payload = &bytes[HEADER_LEN..];
        let mut hasher = Crc32::new();
        hasher.update(payload);
        let computed = hasher.finalize();
        if stored != computed {
            return Err(StoreError::Checksum { stored, computed });
        }
        let model: RecommenderModel<V> = bincode::deserialize(payload)?;
        debug!(path = %self.path.display(), products = model.len(), "loaded recommender snapshot");
        Ok(Some(model))
    }

    /// Deletes the snapshot; a missing file is not an error.
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::ProductRecord;
    use crate::normalizer::ProductFields;
    use crate::vectorizer::TfidfVectorizer;

    fn model() -> RecommenderModel {
        let records = ["steel kettle", "steel toaster", "garden hose"]
            .iter()
            .enumerate()
            .map(|(idx, title)| {
                ProductRecord::from_fields(
                    format!("p{idx}"),
                    ProductFields {
                        title: (*title).into(),
                        ..ProductFields::default()
                    },
                )
            })
            .collect();
        RecommenderModel::train(records, TfidfVectorizer::default()).expect("model")
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ModelStore::new(dir.path().join("model.bin"));
        let loaded: Option<RecommenderModel> = store.load().expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn save_then_load_preserves_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ModelStore::new(dir.path().join("nested/model.bin"));
        let original = model();
        store.save(&original).expect("save");

        let loaded: RecommenderModel = store.load().expect("load").expect("present");
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.similarity(), original.similarity());
        assert_eq!(loaded.recommend("p0", 2), original.recommend("p0", 2));
        assert_eq!(loaded.corpus().position("p2"), Some(2));
    }

    #[test]
    fn repeated_saves_leave_only_the_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ModelStore::new(dir.path().join("model.bin"));
        store.save(&model()).expect("first save");
        store.save(&model()).expect("second save");
        let names: Vec<_> = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("model.bin")]);
    }

    #[test]
    fn concurrent_writers_never_corrupt_the_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.bin");
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = ModelStore::new(&path);
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        store.save(&model()).expect("save");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread");
        }
        let loaded: RecommenderModel = ModelStore::new(&path)
            .load()
            .expect("load")
            .expect("present");
        assert_eq!(loaded.len(), 3);
        assert_eq!(fs::read_dir(dir.path()).expect("read dir").count(), 1);
    }

    #[test]
    fn failed_save_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ModelStore::new(dir.path().join("model.bin"));
        store.save(&model()).expect("save");
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, b"file, not a directory").expect("write");
        let broken = ModelStore::new(blocker.join("model.bin"));
        assert!(matches!(broken.save(&model()), Err(StoreError::Io { .. })));
        assert!(store.load::<TfidfVectorizer>().expect("load").is_some());
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ModelStore::new(dir.path().join("model.bin"));
        store.save(&model()).expect("save");
        let mut bytes = fs::read(store.path()).expect("read");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(store.path(), &bytes).expect("write");

        let err = store.load::<TfidfVectorizer>().expect_err("checksum");
        assert!(matches!(err, StoreError::Checksum { .. }), "got {err:?}");
    }

    #[test]
    fn foreign_file_and_version_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ModelStore::new(dir.path().join("model.bin"));
        fs::write(store.path(), b"not a model").expect("write");
        assert!(matches!(
            store.load::<TfidfVectorizer>(),
            Err(StoreError::BadMagic(_))
        ));

        store.save(&model()).expect("save");
        let mut bytes = fs::read(store.path()).expect("read");
        bytes[4] = 9;
        fs::write(store.path(), &bytes).expect("write");
        assert!(matches!(
            store.load::<TfidfVectorizer>(),
            Err(StoreError::Version { found: 9, .. })
        ));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ModelStore::new(dir.path().join("model.bin"));
        store.save(&model()).expect("save");
        store.clear().expect("clear");
        store.clear().expect("clear again");
        assert!(!store.path().exists());
    }
}
