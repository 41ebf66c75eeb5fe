//! Directory-backed store for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::key::StorageKey;
use crate::store::KeyValueStore;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const TEMP_SUFFIX: &str = ".tmp";

/// A directory-backed key-value store.
///
/// Each key is one file inside the root directory, named by the hex
/// encoding of the key. Data survives process restarts.
///
/// # Durability
///
/// `put` writes a temporary file, syncs it, then renames it over the old
/// value, so a reader sees either the old or the new bytes.
///
/// # Example
///
/// ```no_run
/// use risusave_storage::{FileStore, KeyValueStore, StorageKey};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("save")).unwrap();
/// store.put(&StorageKey::from("database/database.bin"), b"...").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &StorageKey) -> StorageResult<PathBuf> {
        if key.as_bytes().is_empty() {
            return Err(StorageError::InvalidKey("empty key".into()));
        }
        Ok(self.root.join(key.to_hex()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &StorageKey) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)?) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &StorageKey, data: &[u8]) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let mut temp_name = path.clone().into_os_string();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);

        let written = fs::File::create(&temp_path)
            .and_then(|mut file| {
                file.write_all(data)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&temp_path, &path));
        if let Err(e) = written {
            // The old value, if any, is untouched.
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn delete(&self, key: &StorageKey) -> StorageResult<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<StorageKey>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            // Files that are not hex-named keys are not ours.
            let Ok(key) = StorageKey::from_hex(name) else {
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_put_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let key = StorageKey::from("database/database.bin");

        assert_eq!(store.get(&key).unwrap(), None);
        store.put(&key, b"hello").unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(b"hello".to_vec()));
        assert!(dir.path().join(key.to_hex()).exists());
    }

    #[test]
    fn failed_put_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let key = StorageKey::from("database/database.bin");
        // A directory in the way makes the final rename fail.
        fs::create_dir(dir.path().join(key.to_hex())).unwrap();

        assert!(store.put(&key, b"hello").is_err());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(TEMP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn file_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let key = StorageKey::from("a");
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put(&key, b"persistent").unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(b"persistent".to_vec()));
    }

    #[test]
    fn file_overwrite_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let key = StorageKey::from("a");
        store.put(&key, b"one").unwrap();
        store.put(&key, b"two").unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(b"two".to_vec()));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn file_delete() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let key = StorageKey::from("a");
        store.delete(&key).unwrap();
        store.put(&key, b"x").unwrap();
        store.delete(&key).unwrap();
        assert_eq!(store.get(&key).unwrap(), None);
    }

    #[test]
    fn file_list_prefix_skips_foreign_files() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.put(&StorageKey::from("database/b"), b"").unwrap();
        store.put(&StorageKey::from("database/a"), b"").unwrap();
        store.put(&StorageKey::from("other"), b"").unwrap();
        fs::write(dir.path().join("README"), b"not a key").unwrap();

        let keys = store.list_prefix(b"database/").unwrap();
        assert_eq!(
            keys,
            vec![StorageKey::from("database/a"), StorageKey::from("database/b")]
        );
    }

    #[test]
    fn file_empty_key_is_invalid() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.put(&StorageKey::new(Vec::new()), b"x"),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
