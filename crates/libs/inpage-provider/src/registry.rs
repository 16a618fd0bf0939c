use std::collections::HashMap;

use serde_json::Value as JsonValue;
use tokio::sync::oneshot;

use crate::error::ProviderError;
use crate::types::{InternalId, ResultShape};

pub type Outcome = Result<JsonValue, ProviderError>;

struct PendingCall {
    settle: oneshot::Sender<Outcome>,
    shape: ResultShape,
}

/// In-flight calls keyed by internal id. Each entry is consumed by exactly one settlement.
#[derive(Default)]
pub struct PendingRegistry {
    pending: HashMap<InternalId, PendingCall>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a call and hands back the receiver its caller awaits.
    ///
    /// Ids come from the process-wide mint, so an existing entry is never replaced in
    /// practice; if one were, its caller would observe a dropped settlement.
    pub fn register(&mut self, id: InternalId, shape: ResultShape) -> oneshot::Receiver<Outcome> {
        let (settle, receiver) = oneshot::channel();
        if self.pending.insert(id, PendingCall { settle, shape }).is_some() {
            log::warn!("provider: internal id {id} registered twice");
        }
        log::trace!("provider: registered {id}, {} pending", self.pending.len());
        receiver
    }

    /// Sends `outcome` to the caller and removes the entry. Returns `false` when nothing
    /// was registered under `id`.
    pub fn settle(&mut self, id: InternalId, outcome: Outcome) -> bool {
        let Some(call) = self.pending.remove(&id) else {
            return false;
        };
        if call.settle.send(outcome).is_err() {
            log::debug!("provider: caller of {id} went away before settlement");
        }
        true
    }

    pub fn expects_envelope(&self, id: InternalId) -> Option<bool> {
        self.pending.get(&id).map(|call| call.shape == ResultShape::Envelope)
    }

    /// Unregisters without settling; the receiver observes a closed channel.
    pub fn remove(&mut self, id: InternalId) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub fn contains(&self, id: InternalId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
