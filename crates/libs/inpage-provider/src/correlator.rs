use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use rand_core::{OsRng, RngCore};

use crate::types::{InternalId, Request, RequestId, RpcRequest, JSONRPC_VERSION};

static ID_BASE: OnceLock<u64> = OnceLock::new();
static NEXT_ID_OFFSET: AtomicU64 = AtomicU64::new(0);

/// Millisecond timestamp plus a random offset below 1000. Not unique on its own.
pub fn generate_id() -> u64 {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX / 2))
        .unwrap_or_default();
    now_ms + u64::from(OsRng.next_u32() % 1000)
}

/// Mints an internal id unique across every provider instance in the process.
pub fn mint_internal_id() -> InternalId {
    let base = *ID_BASE.get_or_init(generate_id);
    InternalId(base + NEXT_ID_OFFSET.fetch_add(1, Ordering::Relaxed))
}

/// Maps private internal ids back to the ids callers chose.
#[derive(Debug, Default)]
pub struct IdCorrelator {
    originals: HashMap<InternalId, RequestId>,
}

impl IdCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites the request onto a fresh internal id, remembering the caller's id if it
    /// supplied one, and fills in the protocol version.
    pub fn normalize(&mut self, request: Request) -> RpcRequest {
        let internal = mint_internal_id();
        if let Some(external) = request.id {
            log::trace!("provider: correlate {internal} -> {external:?}");
            self.originals.insert(internal, external);
        }
        RpcRequest {
            jsonrpc: request.jsonrpc.unwrap_or_else(|| JSONRPC_VERSION.to_owned()),
            id: internal,
            method: request.method,
            params: request.params,
        }
    }

    /// Removes and returns the caller's id; unknown ids are taken to be original already.
    pub fn resolve_original(&mut self, internal: InternalId) -> RequestId {
        self.originals.remove(&internal).unwrap_or_else(|| RequestId::from(internal))
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }
}
