//! Durable backend using redb.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};

use super::KeyValueBackend;
use crate::error::VaultError;

/// Single table holding every key (key: storage key, value: stored text)
const ENTRIES_TABLE: TableDefinition<&str, &str> = TableDefinition::new("entries");

/// Key-value backend persisted in a redb database file.
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<RwLock<Database>>,
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend")
            .field("db", &"<Database>")
            .finish()
    }
}

impl RedbBackend {
    /// Open (or create) the database at the given path.
    ///
    /// This will:
    /// - Create the parent directory if it doesn't exist
    /// - Initialize the database file
    /// - Create the entries table
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VaultError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ENTRIES_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    fn read_entry(&self, key: &str) -> Result<Option<String>, VaultError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(ENTRIES_TABLE)?;

        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    fn write_entry(&self, key: &str, value: &str) -> Result<(), VaultError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTRIES_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove_entry(&self, key: &str) -> Result<(), VaultError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTRIES_TABLE)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn clear_entries(&self) -> Result<(), VaultError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTRIES_TABLE)?;

            let mut keys = Vec::new();
            for entry in table.iter()? {
                let (key, _) = entry?;
                keys.push(key.value().to_string());
            }

            for key in &keys {
                table.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl KeyValueBackend for RedbBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, VaultError> {
        self.read_entry(key)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), VaultError> {
        self.write_entry(key, &value)
    }

    async fn remove(&self, key: &str) -> Result<(), VaultError> {
        self.remove_entry(key)
    }

    async fn clear(&self) -> Result<(), VaultError> {
        self.clear_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_backend() -> (RedbBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        let backend = RedbBackend::open(&db_path).unwrap();
        (backend, temp_dir)
    }

    #[test]
    fn test_backend_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested/path/to/test.redb");
        assert!(RedbBackend::open(&db_path).is_ok());
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (backend, _temp) = create_test_backend();

        assert!(backend.get("profilevault_version").await.unwrap().is_none());

        backend
            .set("profilevault_version", "0.1.0".to_string())
            .await
            .unwrap();
        assert_eq!(
            backend.get("profilevault_version").await.unwrap().as_deref(),
            Some("0.1.0")
        );
    }

    #[tokio::test]
    async fn test_overwrite_and_remove() {
        let (backend, _temp) = create_test_backend();

        backend.set("k", "one".to_string()).await.unwrap();
        backend.set("k", "two".to_string()).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("two"));

        backend.remove("k").await.unwrap();
        assert!(backend.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let (backend, _temp) = create_test_backend();

        for i in 0..5 {
            backend.set(&format!("k{}", i), i.to_string()).await.unwrap();
        }
        backend.clear().await.unwrap();

        for i in 0..5 {
            assert!(backend.get(&format!("k{}", i)).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_entries_persist_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");

        {
            let backend = RedbBackend::open(&db_path).unwrap();
            backend.set("persisted", "yes".to_string()).await.unwrap();
        }

        {
            let backend = RedbBackend::open(&db_path).unwrap();
            assert_eq!(backend.get("persisted").await.unwrap().as_deref(), Some("yes"));
        }
    }
}
