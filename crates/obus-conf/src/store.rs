use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, warn};

use crate::entry::Entry;
use crate::error::{ConfError, ConfResult, LoadStatus};
use crate::parser::{self, Table};
use crate::traits::ConfigSource;

/// Answer to "is this key configured?".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPresence {
    /// No configuration table is loaded.
    NotLoaded,
    Absent,
    Present,
}

/// A counted handle on a top-level entry.
///
/// The entry stays alive while the store or any handle refers to it, so a
/// handle remains readable even after a reload displaces its key. Release it
/// with [`ConfigStore::release`] or by dropping it.
#[derive(Clone, Debug)]
pub struct EntryRef {
    key: String,
    entry: Arc<Entry>,
}

impl EntryRef {
    /// The key this handle was obtained under.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Live references to the entry, the store's own included.
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.entry)
    }
}

impl Deref for EntryRef {
    type Target = Entry;

    fn deref(&self) -> &Entry {
        &self.entry
    }
}

#[derive(Default)]
struct Inner {
    source: Option<PathBuf>,
    entries: Option<HashMap<String, Arc<Entry>>>,
}

impl Inner {
    fn install(&mut self, table: Table) -> usize {
        let entries: HashMap<_, _> = table
            .into_iter()
            .map(|(key, entry)| (key, Arc::new(entry)))
            .collect();
        let count = entries.len();
        self.entries = Some(entries);
        count
    }
}

/// The loaded configuration: a key → entry table behind a `RwLock`.
///
/// A store starts out unloaded. Every load first drops the current table, so
/// a failed load leaves nothing loaded and a successful one replaces the
/// previous table completely. Entries are shared with callers through
/// [`EntryRef`] handles; an entry is destroyed, together with any array
/// elements it owns, once the store and all handles have let go of it.
pub struct ConfigStore {
    inner: RwLock<Inner>,
}

impl ConfigStore {
    /// Create a store with nothing loaded.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Create a store and load `path` into it.
    pub fn open(path: impl AsRef<Path>) -> ConfResult<Self> {
        let store = Self::new();
        store.try_load(path)?;
        Ok(store)
    }

    /// Load `path`, replacing whatever was loaded before.
    ///
    /// Errors are logged and folded into the returned status.
    pub fn load(&self, path: impl AsRef<Path>) -> LoadStatus {
        status_of(self.try_load(path))
    }

    /// Load `path` and return the number of keys, or the reason nothing is
    /// loaded.
    pub fn try_load(&self, path: impl AsRef<Path>) -> ConfResult<usize> {
        let path = path.as_ref();
        let mut inner = self.write();
        inner.entries = None;
        inner.source = Some(path.to_path_buf());

        let file = File::open(path).map_err(|source| ConfError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let table = parser::parse_reader(BufReader::new(file))?;
        let count = inner.install(table);
        info!(path = %path.display(), keys = count, "configuration loaded");
        Ok(count)
    }

    /// Load configuration from an already open reader.
    pub fn load_reader<R: BufRead>(&self, reader: R) -> LoadStatus {
        status_of(self.try_load_reader(reader))
    }

    pub fn try_load_reader<R: BufRead>(&self, reader: R) -> ConfResult<usize> {
        let mut inner = self.write();
        inner.entries = None;
        inner.source = None;
        let table = parser::parse_reader(reader)?;
        let count = inner.install(table);
        info!(keys = count, "configuration loaded");
        Ok(count)
    }

    /// Load the most recently loaded path again.
    pub fn reload(&self) -> LoadStatus {
        let source = self.read().source.clone();
        match source {
            Some(path) => self.load(path),
            None => {
                warn!("reload requested but no configuration file was ever loaded");
                LoadStatus::Warning
            }
        }
    }

    /// Drop the current table. Outstanding handles stay valid.
    pub fn unload(&self) {
        let mut inner = self.write();
        if inner.entries.take().is_some() {
            debug!("configuration unloaded");
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.read().entries.is_some()
    }

    /// The path the current (or last attempted) load read from.
    pub fn source(&self) -> Option<PathBuf> {
        self.read().source.clone()
    }

    pub fn lookup(&self, name: &str) -> KeyPresence {
        match &self.read().entries {
            None => KeyPresence::NotLoaded,
            Some(entries) if entries.contains_key(name) => KeyPresence::Present,
            Some(_) => KeyPresence::Absent,
        }
    }

    /// Whether `name` is present. Also `true` when nothing is loaded; use
    /// [`ConfigStore::lookup`] to tell the cases apart.
    pub fn has_key(&self, name: &str) -> bool {
        !matches!(self.lookup(name), KeyPresence::Absent)
    }

    /// Take a counted handle on `name`. Pair it with one
    /// [`ConfigStore::release`] (or drop).
    pub fn get(&self, name: &str) -> Option<EntryRef> {
        let inner = self.read();
        let entry = inner.entries.as_ref()?.get(name)?;
        Some(EntryRef {
            key: name.to_owned(),
            entry: Arc::clone(entry),
        })
    }

    /// Give a handle back. The entry is destroyed here if this was its last
    /// reference.
    pub fn release(&self, entry: EntryRef) {
        debug!(
            key = %entry.key,
            remaining = entry.refcount() - 1,
            "released entry"
        );
        drop(entry);
    }

    /// Live references to the entry under `name`, the store's own included.
    pub fn refcount(&self, name: &str) -> Option<usize> {
        let inner = self.read();
        inner
            .entries
            .as_ref()?
            .get(name)
            .map(Arc::strong_count)
    }

    /// All loaded keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let inner = self.read();
        let mut keys: Vec<String> = inner
            .entries
            .iter()
            .flat_map(|entries| entries.keys().cloned())
            .collect();
        keys.sort();
        keys
    }

    /// Number of loaded keys (zero when nothing is loaded).
    pub fn len(&self) -> usize {
        self.read().entries.as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The table is only ever replaced wholesale, so a panic while the lock
    // was held cannot leave it half-written.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn status_of(result: ConfResult<usize>) -> LoadStatus {
    match result {
        Ok(_) => LoadStatus::Ok,
        Err(err) => {
            let status = err.status();
            if status.is_fatal() {
                error!(error = %err, "configuration is unusable");
            } else {
                warn!(error = %err, "configuration not loaded, using defaults");
            }
            status
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for ConfigStore {
    fn is_loaded(&self) -> bool {
        ConfigStore::is_loaded(self)
    }

    fn lookup(&self, name: &str) -> KeyPresence {
        ConfigStore::lookup(self, name)
    }

    fn get(&self, name: &str) -> Option<EntryRef> {
        ConfigStore::get(self, name)
    }

    fn release(&self, entry: EntryRef) {
        ConfigStore::release(self, entry)
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("ConfigStore")
            .field("source", &inner.source)
            .field("loaded", &inner.entries.is_some())
            .field("key_count", &inner.entries.as_ref().map_or(0, HashMap::len))
            .finish()
    }
}
