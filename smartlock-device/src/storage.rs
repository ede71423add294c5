//! Host storage backends: a directory of files, and memory for tests

use std::collections::HashMap;
use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use smartlock_mcu::BlobStorage;

/// Blobs kept as files under a root directory
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    /// Open `root`, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }
}

impl BlobStorage for DirStorage {
    type Error = io::Error;

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error> {
        fs::write(self.path(name), data)
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        match fs::read(self.path(name)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        match fs::remove_file(self.path(name)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }
}

/// In-memory blobs
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStorage for MemoryStorage {
    type Error = Infallible;

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error> {
        self.blobs.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.blobs.get(name).cloned())
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        self.blobs.remove(name);
        Ok(())
    }
}
