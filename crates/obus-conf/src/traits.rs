use crate::store::{EntryRef, KeyPresence};

/// Read access to a loaded configuration.
///
/// Every handle returned by [`ConfigSource::get`] holds a reference on the
/// entry until it is passed to [`ConfigSource::release`] or dropped.
pub trait ConfigSource: Send + Sync {
    /// Whether a configuration table is currently loaded.
    fn is_loaded(&self) -> bool;

    /// Distinguish "no configuration loaded" from "key absent".
    fn lookup(&self, name: &str) -> KeyPresence;

    /// Take a counted handle on the entry stored under `name`.
    fn get(&self, name: &str) -> Option<EntryRef>;

    /// Whether `name` is present.
    ///
    /// Also returns `true` when nothing is loaded, so callers that need to
    /// tell the two apart should use [`ConfigSource::lookup`].
    fn has_key(&self, name: &str) -> bool {
        !matches!(self.lookup(name), KeyPresence::Absent)
    }

    /// Give a handle back.
    fn release(&self, entry: EntryRef) {
        drop(entry);
    }

    /// Read an integer entry, releasing the handle afterwards.
    fn get_integer(&self, name: &str) -> Option<i64> {
        let entry = self.get(name)?;
        let value = entry.as_integer();
        self.release(entry);
        value
    }

    /// Read a UTF-8 string entry, releasing the handle afterwards.
    fn get_string(&self, name: &str) -> Option<String> {
        let entry = self.get(name)?;
        let value = entry.as_str().map(str::to_owned);
        self.release(entry);
        value
    }
}
