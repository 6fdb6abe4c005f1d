//! The persisted set of already-notified event ids.
//!
//! The ledger is the only state that survives between invocations. It is
//! loaded at the start of a run, pruned to the ids of the current fetch
//! window, extended with every id that gets a notification, and saved.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{NotifyError, NotifyResult};

/// Event ids that have already fired a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    ids: BTreeSet<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Records `id` as notified. Returns false if it already was.
    pub fn mark(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    /// Forgets every id not in `current_ids`, returning how many were dropped.
    ///
    /// Pruning twice with the same ids leaves the ledger unchanged.
    pub fn prune<'a, I>(&mut self, current_ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let current: BTreeSet<&str> = current_ids.into_iter().collect();
        let before = self.ids.len();
        self.ids.retain(|id| current.contains(id.as_str()));
        before - self.ids.len()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Ledger {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Held for the duration of a read-modify-write; dropping it releases the lock.
#[derive(Debug)]
pub struct LedgerLock {
    _file: Option<File>,
}

impl LedgerLock {
    /// A guard that locks nothing.
    pub fn unlocked() -> Self {
        Self { _file: None }
    }
}

/// Where the ledger lives between invocations.
pub trait LedgerStore {
    fn load(&self) -> NotifyResult<Ledger>;

    fn save(&self, ledger: &Ledger) -> NotifyResult<()>;

    /// Serializes concurrent read-modify-write cycles.
    fn lock(&self) -> NotifyResult<LedgerLock> {
        Ok(LedgerLock::unlocked())
    }
}

/// JSON array of ids in a file, e.g. `["abc_20240101T090000Z", "def"]`.
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    path: PathBuf,
    use_lock: bool,
}

impl FileLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            use_lock: true,
        }
    }

    /// Turns the advisory `<ledger>.lock` file on or off.
    pub fn with_lock(mut self, use_lock: bool) -> Self {
        self.use_lock = use_lock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, ".lock")
    }

    fn ensure_parent(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }
}

impl LedgerStore for FileLedgerStore {
    /// A missing file is an empty ledger. So is a corrupt one: losing the
    /// history can at worst repeat one alert, while failing would stop all of
    /// them.
    fn load(&self) -> NotifyResult<Ledger> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no ledger file yet");
                return Ok(Ledger::new());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Ledger>(&content) {
            Ok(ledger) => Ok(ledger),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding corrupt ledger");
                Ok(Ledger::new())
            }
        }
    }

    fn save(&self, ledger: &Ledger) -> NotifyResult<()> {
        self.ensure_parent()?;
        let content = serde_json::to_vec(ledger)?;

        let temp_path = sibling(&self.path, ".tmp");
        let result = (|| -> io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(&content)?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result?;

        debug!(path = %self.path.display(), ids = ledger.len(), "saved ledger");
        Ok(())
    }

    fn lock(&self) -> NotifyResult<LedgerLock> {
        if !self.use_lock {
            return Ok(LedgerLock::unlocked());
        }

        let lock_path = self.lock_path();
        self.ensure_parent()
            .map_err(|e| NotifyError::lock(&lock_path, e))?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| NotifyError::lock(&lock_path, e))?;

        if file.try_lock_exclusive().is_err() {
            debug!(path = %lock_path.display(), "waiting for ledger lock");
            file.lock_exclusive()
                .map_err(|e| NotifyError::lock(&lock_path, e))?;
        }

        Ok(LedgerLock { _file: Some(file) })
    }
}

/// `notified.json` + `.lock` -> `notified.json.lock`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    ledger: Mutex<Ledger>,
}

impl MemoryLedgerStore {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: Mutex::new(ledger),
        }
    }

    pub fn snapshot(&self) -> Ledger {
        self.ledger
            .lock()
            .map(|l| l.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> NotifyResult<Ledger> {
        Ok(self.snapshot())
    }

    fn save(&self, ledger: &Ledger) -> NotifyResult<()> {
        let mut guard = self
            .ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = ledger.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod ledger {
        use super::*;

        #[test]
        fn mark_and_contains() {
            let mut ledger = Ledger::new();
            assert!(ledger.mark("e1"));
            assert!(!ledger.mark("e1"));
            assert!(ledger.contains("e1"));
            assert!(!ledger.contains("e2"));
            assert_eq!(ledger.len(), 1);
        }

        #[test]
        fn prune_keeps_only_current_ids() {
            let mut ledger: Ledger = ["old", "e1", "e2"].into_iter().collect();
            let removed = ledger.prune(["e1", "e2", "e3"]);
            assert_eq!(removed, 1);
            assert_eq!(ledger.iter().collect::<Vec<_>>(), vec!["e1", "e2"]);
        }

        #[test]
        fn prune_is_idempotent() {
            let current = ["b", "c"];
            let mut once: Ledger = ["a", "b", "c", "d"].into_iter().collect();
            once.prune(current);
            let mut twice = once.clone();
            assert_eq!(twice.prune(current), 0);
            assert_eq!(once, twice);
        }

        #[test]
        fn prune_with_empty_window_clears() {
            let mut ledger: Ledger = ["a", "b"].into_iter().collect();
            assert_eq!(ledger.prune(std::iter::empty()), 2);
            assert!(ledger.is_empty());
        }

        #[test]
        fn serializes_as_sorted_array() {
            let ledger: Ledger = ["b", "a"].into_iter().collect();
            assert_eq!(serde_json::to_string(&ledger).unwrap(), r#"["a","b"]"#);
            let back: Ledger = serde_json::from_str(r#"["x","y","x"]"#).unwrap();
            assert_eq!(back.len(), 2);
        }
    }

    mod file_store {
        use super::*;

        #[test]
        fn missing_file_is_empty() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileLedgerStore::new(dir.path().join("notified.json"));
            assert!(store.load().unwrap().is_empty());
        }

        #[test]
        fn save_then_load() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileLedgerStore::new(dir.path().join("state").join("notified.json"));
            let ledger: Ledger = ["e1", "e2"].into_iter().collect();
            store.save(&ledger).unwrap();

            assert_eq!(store.load().unwrap(), ledger);
            assert!(!dir.path().join("state").join("notified.json.tmp").exists());
        }

        #[test]
        fn corrupt_file_is_empty() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("notified.json");
            fs::write(&path, "{\"not\": \"a list\"").unwrap();
            assert!(FileLedgerStore::new(&path).load().unwrap().is_empty());
        }

        #[test]
        fn reads_plain_id_array() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("notified.json");
            fs::write(&path, r#"["abc123_20240101T090000Z"]"#).unwrap();
            let ledger = FileLedgerStore::new(&path).load().unwrap();
            assert!(ledger.contains("abc123_20240101T090000Z"));
        }

        #[test]
        fn lock_creates_lock_file() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileLedgerStore::new(dir.path().join("notified.json"));
            let guard = store.lock().unwrap();
            assert!(store.lock_path().exists());
            assert_eq!(store.lock_path(), dir.path().join("notified.json.lock"));

            let other = File::open(store.lock_path()).unwrap();
            assert!(other.try_lock_exclusive().is_err());
            drop(guard);
            assert!(other.try_lock_exclusive().is_ok());
        }

        #[test]
        fn lock_can_be_disabled() {
            let dir = tempfile::tempdir().unwrap();
            let store = FileLedgerStore::new(dir.path().join("notified.json")).with_lock(false);
            let _guard = store.lock().unwrap();
            assert!(!store.lock_path().exists());
        }
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryLedgerStore::default();
        let ledger: Ledger = ["e1"].into_iter().collect();
        store.save(&ledger).unwrap();
        assert_eq!(store.load().unwrap(), ledger);
    }
}
