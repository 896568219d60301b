use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{NativeValue, StoreError};

const FORMAT_VERSION: u32 = 1;

/// On-disk layout. Entries are loaded as raw JSON first so one unreadable entry can be skipped.
#[derive(Serialize, Deserialize)]
struct SuiteSnapshot<M> {
    version: u32,
    values: M,
}

/// JSON file holding the stored values of one suite. Registered defaults are never written.
#[derive(Debug, Clone)]
pub(crate) struct SuiteFile {
    path: PathBuf,
}

impl SuiteFile {
    pub(crate) fn new(folder_path: &Path, suite: &str) -> Self {
        let mut path = folder_path.to_path_buf();
        path.push(format!("{suite}.json"));
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the suite, returning an empty map if the file does not exist yet.
    pub(crate) fn load(&self) -> Result<BTreeMap<String, NativeValue>, StoreError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        let snapshot: SuiteSnapshot<BTreeMap<String, serde_json::Value>> =
            serde_json::from_slice(&contents)?;
        if snapshot.version != FORMAT_VERSION {
            log::warn!(
                "Suite file {} has version {}, expected {}",
                self.path.display(),
                snapshot.version,
                FORMAT_VERSION
            );
        }

        let mut values = BTreeMap::new();
        for (name, raw) in snapshot.values {
            match serde_json::from_value::<NativeValue>(raw) {
                Ok(value) => {
                    values.insert(name, value);
                }
                Err(e) => log::warn!(
                    "Skipping unreadable value '{}' in {}: {:?}",
                    name,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(values)
    }

    /// Replaces the file contents with `values`. Writes to a sibling file first and renames it
    /// into place so readers never observe a partially written suite.
    pub(crate) fn save(&self, values: &BTreeMap<String, NativeValue>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let snapshot = SuiteSnapshot {
            version: FORMAT_VERSION,
            values,
        };
        let contents = serde_json::to_vec_pretty(&snapshot)?;

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, contents)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}
