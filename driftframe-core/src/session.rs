//! Best-effort page-reconnect handoff.
//!
//! Purely an optimization: when absent (or when the key misses) a
//! reconnecting page degrades to a cold rescan.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::scan::ScanSnapshot;

/// Narrow session-store contract: a provider deposits its discovery
/// state under the folder path, and at most one successor claims it.
pub trait SessionStore: Send + Sync {
    fn put(&self, key: &str, snapshot: ScanSnapshot);

    /// Remove and return the snapshot for `key`, if one was deposited.
    fn take_if_present(&self, key: &str) -> Option<ScanSnapshot>;
}

/// In-memory [`SessionStore`]; state lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<HashMap<String, ScanSnapshot>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, key: &str, snapshot: ScanSnapshot) {
        self.inner
            .lock()
            .expect("session store lock poisoned")
            .insert(key.to_string(), snapshot);
    }

    fn take_if_present(&self, key: &str) -> Option<ScanSnapshot> {
        self.inner
            .lock()
            .expect("session store lock poisoned")
            .remove(key)
    }
}
