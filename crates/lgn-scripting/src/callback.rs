//! Callback-completion registry: pairs an async-create command with the
//! script-side continuation to invoke once the command processor assigns
//! the new record's id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ids::SENTINEL_ID;

/// The outcome a ready callback is dispatched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackResult {
    /// The CREATE_* command succeeded; carries the assigned record id.
    Id(u64),
    /// The command failed or was orphaned; dispatched with the sentinel id
    /// so the script side can still complete.
    Error,
}

impl CallbackResult {
    /// The raw id a script-facing callback receives: the real id on
    /// success, [`SENTINEL_ID`] on error.
    pub fn as_id(&self) -> u64 {
        match self {
            Self::Id(id) => *id,
            Self::Error => SENTINEL_ID,
        }
    }
}

#[derive(Debug)]
enum Entry {
    Pending,
    Ready(CallbackResult),
}

/// Monotonic table of pending async-create callbacks for one subsystem API.
///
/// The script-boundary adapter calls [`CallbackRegistry::register`] when it
/// submits a CREATE_* command, getting back a callback id to embed in the
/// command. The command processor calls [`CallbackRegistry::resolve`] once
/// the record id is known. The frame orchestrator calls
/// [`CallbackRegistry::take_ready`] once per frame, after swap, and hands
/// each `(callback_id, result)` pair to the script runtime.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    next_id: u64,
    pending: HashMap<u64, Entry>,
}

impl CallbackRegistry {
    /// Construct an empty registry. Callback ids start at 1; 0 is reserved
    /// as a sentinel meaning "no callback".
    pub fn new() -> Self {
        Self { next_id: 1, pending: HashMap::new() }
    }

    /// Allocate a new callback id and mark it pending.
    pub fn register(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, Entry::Pending);
        id
    }

    /// Mark a pending callback ready with its outcome. No-op if
    /// `callback_id` is unknown (e.g. already resolved or never
    /// registered).
    pub fn resolve(&mut self, callback_id: u64, result: CallbackResult) {
        if let Some(entry) = self.pending.get_mut(&callback_id) {
            *entry = Entry::Ready(result);
        }
    }

    /// Drain every callback that has been resolved, removing it from the
    /// pending table. Callbacks still awaiting their command are left in
    /// place for a future frame.
    pub fn take_ready(&mut self) -> Vec<(u64, CallbackResult)> {
        let ready_ids: Vec<u64> = self
            .pending
            .iter()
            .filter_map(|(&id, entry)| matches!(entry, Entry::Ready(_)).then_some(id))
            .collect();

        ready_ids
            .into_iter()
            .filter_map(|id| match self.pending.remove(&id) {
                Some(Entry::Ready(result)) => Some((id, result)),
                _ => None,
            })
            .collect()
    }

    /// Number of callbacks still awaiting resolution.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// A registry shared between the script-boundary adapter (which registers a
/// callback id on the script worker thread, synchronously with the method
/// call) and the main thread (which resolves and drains it). Unlike the
/// command queue, callback registration is not a hot per-frame path, so a
/// plain mutex is the right tool rather than a lock-free structure.
pub type SharedCallbackRegistry = Arc<Mutex<CallbackRegistry>>;

/// Construct a new, empty shared registry.
pub fn new_shared() -> SharedCallbackRegistry {
    Arc::new(Mutex::new(CallbackRegistry::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_create_leads_to_exactly_one_dispatch() {
        let mut registry = CallbackRegistry::new();
        let id = registry.register();
        assert_eq!(registry.take_ready(), Vec::new());

        registry.resolve(id, CallbackResult::Id(42));
        let ready = registry.take_ready();
        assert_eq!(ready, vec![(id, CallbackResult::Id(42))]);

        // dispatched exactly once: a second drain sees nothing more.
        assert_eq!(registry.take_ready(), Vec::new());
    }

    #[test]
    fn failed_create_dispatches_with_error_sentinel() {
        let mut registry = CallbackRegistry::new();
        let id = registry.register();
        registry.resolve(id, CallbackResult::Error);
        let ready = registry.take_ready();
        assert_eq!(ready, vec![(id, CallbackResult::Error)]);
        assert_eq!(CallbackResult::Error.as_id(), SENTINEL_ID);
    }

    #[test]
    fn callback_ids_are_monotonic_and_skip_zero() {
        let mut registry = CallbackRegistry::new();
        assert_eq!(registry.register(), 1);
        assert_eq!(registry.register(), 2);
    }
}
