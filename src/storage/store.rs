use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::models::{FileHeader, FileId, Record, StorageClass};
use crate::utils::error::StoreError;

/// Record storage. Change notification is a queue: writes to watched files
/// are recorded and the owner collects them with [`FileStore::take_changes`]
/// once the current task has returned.
pub trait FileStore {
    /// Creates a file. For permanent files, previously persisted content takes
    /// precedence over `initial`.
    fn init(&mut self, id: FileId, header: FileHeader, initial: &[u8]) -> Result<(), StoreError>;

    fn read(&self, id: FileId, offset: usize, len: usize) -> Result<Vec<u8>, StoreError>;

    fn write(&mut self, id: FileId, offset: usize, data: &[u8]) -> Result<(), StoreError>;

    fn header(&self, id: FileId) -> Option<FileHeader>;

    fn watch(&mut self, id: FileId);

    fn take_changes(&mut self) -> Vec<FileId>;
}

pub fn read_record<R: Record>(store: &dyn FileStore) -> Result<R, StoreError> {
    let bytes = store.read(R::FILE_ID, 0, R::LAYOUT.size)?;
    R::decode(&bytes).map_err(|source| StoreError::Corrupt {
        id: R::FILE_ID,
        source,
    })
}

pub fn write_record<R: Record>(store: &mut dyn FileStore, record: &R) -> Result<(), StoreError> {
    store.write(R::FILE_ID, 0, &record.encode())
}

/// Reads a record, creating it with `default` content when it does not exist
/// yet. Returns the stored content, which for permanent files may come from an
/// earlier run.
pub fn load_or_init<R: Record>(store: &mut dyn FileStore, default: &R) -> Result<R, StoreError> {
    match read_record::<R>(store) {
        Err(StoreError::NotFound(_)) => {
            store.init(R::FILE_ID, R::header(), &default.encode())?;
            read_record::<R>(store)
        }
        other => other,
    }
}

#[derive(Debug, Clone)]
struct StoredFile {
    header: FileHeader,
    data: Vec<u8>,
}

/// Files kept in memory. With a persistence directory, permanent files are
/// mirrored to `<dir>/<id>.bin` on every write and reloaded by `init`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: HashMap<FileId, StoredFile>,
    watched: HashSet<FileId>,
    changes: Vec<FileId>,
    persist_dir: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_persistence<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!("💾 Persisting permanent files in {}", dir.display());
        Ok(Self {
            persist_dir: Some(dir),
            ..Self::default()
        })
    }

    fn persisted_path(&self, id: FileId) -> Option<PathBuf> {
        self.persist_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.bin", id)))
    }

    fn persist(&self, id: FileId, file: &StoredFile) -> Result<(), StoreError> {
        if file.header.storage_class != StorageClass::Permanent {
            return Ok(());
        }
        if let Some(path) = self.persisted_path(id) {
            fs::write(&path, &file.data)?;
            debug!("💾 File {} persisted to {}", id, path.display());
        }
        Ok(())
    }
}

impl FileStore for MemoryStore {
    fn init(&mut self, id: FileId, header: FileHeader, initial: &[u8]) -> Result<(), StoreError> {
        if self.files.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        if initial.len() > header.allocated_length {
            return Err(StoreError::OutOfBounds {
                id,
                offset: 0,
                len: initial.len(),
                length: header.allocated_length,
            });
        }

        let mut data = initial.to_vec();
        if header.storage_class == StorageClass::Permanent {
            if let Some(path) = self.persisted_path(id).filter(|p| p.exists()) {
                match fs::read(&path) {
                    Ok(stored) if stored.len() <= header.allocated_length => data = stored,
                    Ok(stored) => warn!(
                        "⚠️  Ignoring persisted file {} ({} bytes, {} allocated)",
                        id,
                        stored.len(),
                        header.allocated_length
                    ),
                    Err(e) => warn!("⚠️  Cannot read persisted file {}: {}", id, e),
                }
            }
        }

        let file = StoredFile { header, data };
        self.persist(id, &file)?;
        self.files.insert(id, file);
        Ok(())
    }

    fn read(&self, id: FileId, offset: usize, len: usize) -> Result<Vec<u8>, StoreError> {
        let file = self.files.get(&id).ok_or(StoreError::NotFound(id))?;
        let end = offset.saturating_add(len);
        if end > file.data.len() {
            return Err(StoreError::OutOfBounds {
                id,
                offset,
                len,
                length: file.data.len(),
            });
        }
        Ok(file.data[offset..end].to_vec())
    }

    fn write(&mut self, id: FileId, offset: usize, data: &[u8]) -> Result<(), StoreError> {
        let file = self.files.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let end = offset.saturating_add(data.len());
        if end > file.header.allocated_length {
            return Err(StoreError::OutOfBounds {
                id,
                offset,
                len: data.len(),
                length: file.header.allocated_length,
            });
        }
        let previous = file.data.clone();
        if end > file.data.len() {
            file.data.resize(end, 0);
        }
        file.data[offset..end].copy_from_slice(data);

        let snapshot = file.clone();
        if let Err(e) = self.persist(id, &snapshot) {
            // memory stays in step with disk
            if let Some(file) = self.files.get_mut(&id) {
                file.data = previous;
            }
            return Err(e);
        }
        if self.watched.contains(&id) {
            self.changes.push(id);
        }
        Ok(())
    }

    fn header(&self, id: FileId) -> Option<FileHeader> {
        self.files.get(&id).map(|f| f.header)
    }

    fn watch(&mut self, id: FileId) {
        self.watched.insert(id);
    }

    fn take_changes(&mut self) -> Vec<FileId> {
        std::mem::take(&mut self.changes)
    }
}
