use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Location of an uploaded file. Owned by exactly one session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StorageHandle(PathBuf);

impl StorageHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Storage capability the registry needs: probe and delete.
///
/// `remove` on an already-absent file must return `Ok(())`.
#[cfg_attr(test, mockall::automock)]
pub trait FileStore: Send + Sync {
    fn exists(&self, handle: &StorageHandle) -> bool;
    fn remove(&self, handle: &StorageHandle) -> io::Result<()>;
}

/// Files on the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskStore;

impl FileStore for DiskStore {
    fn exists(&self, handle: &StorageHandle) -> bool {
        fs::metadata(handle.path())
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    fn remove(&self, handle: &StorageHandle) -> io::Result<()> {
        match fs::remove_file(handle.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_store_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1700000000000_slides.pdf");
        fs::write(&path, b"%PDF-1.7").unwrap();

        let store = DiskStore;
        let handle = StorageHandle::new(&path);
        assert!(store.exists(&handle));

        store.remove(&handle).unwrap();
        assert!(!store.exists(&handle));
        assert!(!path.exists());

        // Second delete of the same handle is a no-op.
        store.remove(&handle).unwrap();
    }

    #[test]
    fn test_disk_store_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore;
        assert!(!store.exists(&StorageHandle::new(dir.path())));
        assert!(!store.exists(&StorageHandle::new(dir.path().join("missing.png"))));
    }
}
