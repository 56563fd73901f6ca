//! Key-value session persistence and expiry arithmetic.
//!
//! The wizard survives a host restart through three string keys in an
//! injected store: the session id, the 0-based step index, and the
//! last-activity timestamp. Any concrete store works — browser storage, a
//! JSON file, or the in-memory map used by tests. All keys are written and
//! cleared together.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::BTreeMap;

use crate::consts::{KEY_CURRENT_STEP, KEY_LAST_ACTIVITY, KEY_SESSION_ID};

/// Minimal key-value persistence the wizard needs.
///
/// Implementations are expected to be best-effort: a write that cannot be
/// flushed should be logged by the implementation, not bubbled up, since
/// losing recovery state must never break an active registration.
pub trait StateStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_owned(), value.to_owned());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// Session state recovered from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    /// Stored session identifier.
    pub id: String,
    /// Recovered step index, already normalized and clamped.
    pub step: usize,
    /// Last-activity timestamp in Unix milliseconds, if readable.
    pub last_activity: Option<u64>,
}

/// Write the session id and step index.
pub fn persist<S: StateStore>(store: &mut S, id: &str, step: usize) {
    store.set(KEY_SESSION_ID, id);
    store.set(KEY_CURRENT_STEP, &step.to_string());
}

/// Refresh the last-activity timestamp.
pub fn touch<S: StateStore>(store: &mut S, now_ms: u64) {
    store.set(KEY_LAST_ACTIVITY, &now_ms.to_string());
}

/// Recover a persisted session, if one exists.
pub fn load<S: StateStore>(store: &S, total_steps: usize) -> Option<PersistedSession> {
    let id = store.get(KEY_SESSION_ID)?;
    if id.is_empty() {
        return None;
    }
    Some(PersistedSession {
        id,
        step: parse_step(store.get(KEY_CURRENT_STEP).as_deref(), total_steps),
        last_activity: store
            .get(KEY_LAST_ACTIVITY)
            .and_then(|raw| raw.trim().parse().ok()),
    })
}

/// Remove every session key. Called together on expiry, reset or completion.
pub fn clear<S: StateStore>(store: &mut S) {
    store.remove(KEY_SESSION_ID);
    store.remove(KEY_CURRENT_STEP);
    store.remove(KEY_LAST_ACTIVITY);
}

/// Normalize a persisted step index.
///
/// Invariant: the result is always in `[0, total_steps - 1]`; missing,
/// unparseable or out-of-range values become `0` or the last step.
#[must_use]
pub fn parse_step(raw: Option<&str>, total_steps: usize) -> usize {
    let last = total_steps.saturating_sub(1);
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0)
        .min(last)
}

/// Whether a session has been idle past the timeout.
#[must_use]
pub fn is_expired(now_ms: u64, last_activity_ms: u64, timeout_ms: u64) -> bool {
    now_ms.saturating_sub(last_activity_ms) >= timeout_ms
}
