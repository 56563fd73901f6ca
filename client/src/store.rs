//! Session-state stores backing the wizard's persistence.
//!
//! The wizard only needs three string keys to survive a restart; here that
//! contract is backed by a small JSON file. Writes are best-effort — losing
//! recovery state must never break an active registration, so flush failures
//! are logged and swallowed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use wizard::session::StateStore;

/// A [`StateStore`] persisted as a pretty-printed JSON object on disk.
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// An unreadable or corrupt file starts the store empty rather than
    /// failing; the previous session is simply not resumable.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        let values = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|error| {
                tracing::warn!(path = %path.display(), %error, "state file is corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path: path.to_owned(),
            values,
        }
    }

    fn flush(&self) {
        let rendered = match serde_json::to_string_pretty(&self.values) {
            Ok(rendered) => rendered,
            Err(error) => {
                tracing::warn!(%error, "could not serialize session state");
                return;
            }
        };
        if let Err(error) = fs::write(&self.path, rendered) {
            tracing::warn!(path = %self.path.display(), %error, "could not persist session state");
        }
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_owned(), value.to_owned());
        self.flush();
    }

    fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.flush();
        }
    }
}
