use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Identity of a user action for double-submit suppression. Mutations on a
/// specific record carry its id so unrelated actions never block each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKey {
    CreateEvent,
    UpdateEvent(i64),
    DeleteEvent(i64),
    AddInvitation(i64),
    DeleteInvitation(i64),
    CreateAssociation,
    EditAssociation(i64),
    DeleteAssociation(i64),
}

/// Tracks which actions currently have a network call pending. A second
/// invocation of the same action is refused until the first one's token is
/// dropped. The registry can be cloned and shared between engines or views.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    pending: Arc<Mutex<HashSet<ActionKey>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the key, or returns None when the same action is already
    /// pending. The claim is released when the token drops.
    pub fn begin(&self, key: ActionKey) -> Option<InFlightToken> {
        let mut pending = self.pending.lock().expect("in-flight registry poisoned");
        if !pending.insert(key.clone()) {
            return None;
        }
        Some(InFlightToken {
            key,
            pending: Arc::clone(&self.pending),
        })
    }

    pub fn is_pending(&self, key: &ActionKey) -> bool {
        self.pending
            .lock()
            .expect("in-flight registry poisoned")
            .contains(key)
    }
}

pub struct InFlightToken {
    key: ActionKey,
    pending: Arc<Mutex<HashSet<ActionKey>>>,
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.key);
        }
    }
}
