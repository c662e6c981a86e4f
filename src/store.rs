// Snapshot persistence for the last parsed workbook.
//
// A store is a plain key-value map of strings. The parsed mapping is kept as
// JSON under `SNAPSHOT_KEY`.
use crate::error::StoreError;
use crate::types::MonthlyData;
use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub const SNAPSHOT_KEY: &str = "monthlyData";

pub trait SnapshotStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One `<key>.json` file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SnapshotStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // written beside the target, then renamed into place
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!("stored {} bytes at {}", value.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub fn save_snapshot(store: &mut dyn SnapshotStore, data: &MonthlyData) -> Result<(), StoreError> {
    let json = serde_json::to_string(data)?;
    store.set(SNAPSHOT_KEY, &json)
}

/// `Ok(None)` when nothing has been saved yet.
pub fn restore_snapshot(store: &dyn SnapshotStore) -> Result<Option<MonthlyData>, StoreError> {
    match store.get(SNAPSHOT_KEY)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApplicationRecord, Bays, DateCode};

    fn sample() -> MonthlyData {
        let record = |month: &str, week: u32, price: f64| ApplicationRecord {
            spray_chemicals: [Some("Bifenthrin".to_string()), None, Some("Malathion".to_string())],
            fog_chemicals: [None, Some("Pyrethrin".to_string()), None],
            date: DateCode {
                week,
                day: 4,
                formatted: format!("Week {week}, Day 4"),
            },
            bays: Bays {
                count: 2.5,
                is_full: true,
            },
            price,
            monthly_budget: 1234.56,
            month: month.to_string(),
        };
        let mut data = MonthlyData::new();
        data.insert("October".into(), vec![record("October", 40, 19.99), record("October", 41, 0.1)]);
        data.insert("April".into(), vec![record("April", 14, 7.0)]);
        data.insert("Empty".into(), vec![]);
        data
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(restore_snapshot(&store).unwrap(), None);
        let data = sample();
        save_snapshot(&mut store, &data).unwrap();
        let restored = restore_snapshot(&store).unwrap().unwrap();
        assert_eq!(restored, data);
        assert_eq!(
            restored.months().collect::<Vec<_>>(),
            vec!["October", "April", "Empty"]
        );
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("state"));
        assert_eq!(restore_snapshot(&store).unwrap(), None);

        let data = sample();
        save_snapshot(&mut store, &data).unwrap();
        assert!(dir.path().join("state").join("monthlyData.json").exists());

        // a fresh store over the same directory sees the snapshot
        let reopened = FileStore::new(dir.path().join("state"));
        assert_eq!(restore_snapshot(&reopened).unwrap(), Some(data));
    }

    #[test]
    fn later_save_replaces_snapshot() {
        let mut store = MemoryStore::new();
        save_snapshot(&mut store, &sample()).unwrap();
        save_snapshot(&mut store, &MonthlyData::new()).unwrap();
        assert_eq!(restore_snapshot(&store).unwrap(), Some(MonthlyData::new()));
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let mut store = MemoryStore::new();
        store.set(SNAPSHOT_KEY, "{\"Jan\": [").unwrap();
        assert!(matches!(restore_snapshot(&store), Err(StoreError::Json(_))));
    }
}
