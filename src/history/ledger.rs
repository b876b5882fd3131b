//! Replace-by-filename ledger with synchronous change notification.

use log::debug;
use std::collections::HashMap;

use super::record::ConversionHistoryEntry;

/// Receives ledger changes in-line, before the mutating call returns.
pub trait HistoryListener {
    fn entry_added(&mut self, _entry: &ConversionHistoryEntry) {}
    fn entry_updated(&mut self, _entry: &ConversionHistoryEntry) {}
    fn entry_removed(&mut self, _filename: &str) {}
    fn history_cleared(&mut self) {}
}

/// Listener that ignores every change.
#[derive(Debug, Default)]
pub struct NoListener;

impl HistoryListener for NoListener {}

/// At most one entry per source filename. A new entry for an existing name
/// replaces the old one entirely; records are never merged.
#[derive(Debug, Default)]
pub struct HistoryLedger<L: HistoryListener = NoListener> {
    entries: HashMap<String, ConversionHistoryEntry>,
    listener: L,
}

impl HistoryLedger<NoListener> {
    pub fn new() -> Self {
        Self::with_listener(NoListener)
    }
}

impl<L: HistoryListener> HistoryLedger<L> {
    pub fn with_listener(listener: L) -> Self {
        Self {
            entries: HashMap::new(),
            listener,
        }
    }

    /// Upsert by filename; notifies `entry_added` for a new key, else `entry_updated`.
    pub fn replace(&mut self, entry: ConversionHistoryEntry) {
        let key = entry.filename().to_string();
        let is_new = !self.entries.contains_key(&key);
        self.entries.insert(key.clone(), entry);
        let stored = &self.entries[&key];
        if is_new {
            self.listener.entry_added(stored);
        } else {
            debug!("history for {} replaced", key);
            self.listener.entry_updated(stored);
        }
    }

    pub fn replace_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = ConversionHistoryEntry>,
    {
        for entry in entries {
            self.replace(entry);
        }
    }

    pub fn get(&self, filename: &str) -> Option<&ConversionHistoryEntry> {
        self.entries.get(filename)
    }

    /// Remove entries; `entry_removed` fires once per name given.
    pub fn clear_for<I, S>(&mut self, filenames: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in filenames {
            let name = name.as_ref();
            self.entries.remove(name);
            self.listener.entry_removed(name);
        }
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.listener.history_cleared();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversionHistoryEntry> {
        self.entries.values()
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }
}
