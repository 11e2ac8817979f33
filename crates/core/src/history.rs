//! Bounded search-history store.
//!
//! The one client-persisted artifact: the 10 most recent search strings,
//! most recent first. An explicit, injected capability rather than a
//! module-level global, so tests can swap in `MemoryHistory`.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::HistoryError;

/// Maximum number of entries a history store keeps.
pub const HISTORY_LIMIT: usize = 10;

/// A bounded list of recent search strings, most recent first.
pub trait SearchHistory: Send + Sync {
    fn load(&self) -> Result<Vec<String>, HistoryError>;

    /// Prepends `entry`, dropping any older duplicate and anything past the
    /// bound. Blank entries are ignored.
    fn append(&self, entry: &str) -> Result<(), HistoryError>;

    fn clear(&self) -> Result<(), HistoryError>;
}

fn push_front_bounded(entries: &mut Vec<String>, entry: &str, limit: usize) -> bool {
    let entry = entry.trim();
    if entry.is_empty() {
        return false;
    }
    entries.retain(|existing| existing != entry);
    entries.insert(0, entry.to_string());
    entries.truncate(limit);
    true
}

/// History persisted as a JSON array on disk.
pub struct FileHistory {
    path: PathBuf,
    limit: usize,
}

impl FileHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            limit: HISTORY_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Default location: `<data dir>/wpfleet/search_history.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|mut p| {
            p.push("wpfleet");
            p.push("search_history.json");
            p
        })
    }
}

impl SearchHistory for FileHistory {
    fn load(&self) -> Result<Vec<String>, HistoryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let entries: Vec<String> = serde_json::from_str(&content)?;
        Ok(entries)
    }

    fn append(&self, entry: &str) -> Result<(), HistoryError> {
        let mut entries = self.load()?;
        if !push_front_bounded(&mut entries, entry, self.limit) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(&entries)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), HistoryError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory history fake for tests and non-persistent consumers.
#[derive(Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<String>>,
    limit: usize,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            limit: HISTORY_LIMIT,
        }
    }
}

impl SearchHistory for MemoryHistory {
    fn load(&self) -> Result<Vec<String>, HistoryError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn append(&self, entry: &str) -> Result<(), HistoryError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let limit = if self.limit == 0 {
            HISTORY_LIMIT
        } else {
            self.limit
        };
        push_front_bounded(&mut entries, entry, limit);
        Ok(())
    }

    fn clear(&self) -> Result<(), HistoryError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        Ok(())
    }
}
