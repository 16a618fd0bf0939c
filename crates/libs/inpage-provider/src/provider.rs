use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard};
use std::time::Duration;

use futures::future::try_join_all;
use serde_json::{json, Value as JsonValue};
use tokio::sync::{broadcast, oneshot};

use crate::bridge::{BridgeMessage, HostBridge};
use crate::config::{DappContext, ProviderConfig};
use crate::correlator::{mint_internal_id, IdCorrelator};
use crate::error::ProviderError;
use crate::events::{ProviderEvent, EVENT_CHANNEL_CAPACITY};
use crate::method::{LocalValue, Method, Policy};
use crate::payload;
use crate::registry::{Outcome, PendingRegistry};
use crate::session::SessionState;
use crate::types::{
    unwrap_envelope, InternalId, Request, RequestId, ResultShape, RpcEnvelope, RpcRequest,
};
use crate::upstream::UpstreamClient;

/// Correlator and registry share one lock so a call is never half-registered.
#[derive(Default)]
struct CallTable {
    correlator: IdCorrelator,
    registry: PendingRegistry,
}

#[derive(Clone, Copy, Debug)]
struct DispatchOptions {
    proxy: bool,
    is_debug: bool,
    request_timeout: Option<Duration>,
}

impl DispatchOptions {
    fn from_config(config: &ProviderConfig) -> Self {
        Self {
            proxy: config.proxy,
            is_debug: config.is_debug,
            request_timeout: config.request_timeout(),
        }
    }
}

/// Clears a call's registry and correlation entries when its caller stops waiting
/// before the call settles.
struct CallGuard<'a> {
    provider: &'a Provider,
    id: InternalId,
    armed: bool,
}

impl<'a> CallGuard<'a> {
    fn new(provider: &'a Provider, id: InternalId) -> Self {
        Self { provider, id, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.armed && !std::thread::panicking() {
            self.provider.abandon(self.id);
        }
    }
}

enum Dispatched<'a> {
    /// Registered; settled by the response sink, possibly already.
    Waiting { guard: CallGuard<'a>, receiver: oneshot::Receiver<Outcome> },
    /// Handed to the upstream client, which owns the call's lifecycle.
    Upstream { guard: CallGuard<'a>, request: RpcRequest, shape: ResultShape },
}

/// Request correlation and dispatch engine behind an in-page provider.
///
/// Dapp calls enter through [`request`](Self::request) (bare results) or
/// [`send_async`](Self::send_async) (reply envelopes). Each call is answered locally,
/// posted to the host over the [`HostBridge`], or delegated to the [`UpstreamClient`].
/// Host answers come back through [`deliver_result`](Self::deliver_result) and
/// [`deliver_error`](Self::deliver_error); every call settles at most once, and a call
/// whose future is dropped leaves nothing behind.
///
/// The request timeout runs on the tokio timer. Polled outside a tokio runtime, calls
/// wait for their answer without one.
pub struct Provider {
    session: RwLock<SessionState>,
    options: RwLock<DispatchOptions>,
    calls: Mutex<CallTable>,
    bridge: Arc<dyn HostBridge>,
    upstream: Arc<dyn UpstreamClient>,
    context: Option<DappContext>,
    children: Vec<Arc<Provider>>,
    events: broadcast::Sender<ProviderEvent>,
}

impl Provider {
    pub fn new(
        config: ProviderConfig,
        bridge: Arc<dyn HostBridge>,
        upstream: Arc<dyn UpstreamClient>,
    ) -> Result<Self, ProviderError> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            session: RwLock::new(SessionState::new(config.chain_id, config.address.as_deref())),
            options: RwLock::new(DispatchOptions::from_config(&config)),
            calls: Mutex::new(CallTable::default()),
            bridge,
            upstream,
            context: None,
            children: Vec::new(),
            events,
        })
    }

    /// Page context attached to bootstrap actions.
    pub fn with_context(mut self, context: DappContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Declares a nested provider (e.g. an embedded frame) whose host answers may
    /// arrive at this instance.
    pub fn with_child(mut self, child: Arc<Provider>) -> Self {
        self.children.push(child);
        self
    }

    // ── Dapp entry points ────────────────────────────────────────────────────

    /// Resolves to the bare `result` value.
    pub async fn request(&self, request: Request) -> Result<JsonValue, ProviderError> {
        let dispatched = self.dispatch(request, ResultShape::Bare);
        self.settle(dispatched).await
    }

    /// Resolves to the `{jsonrpc, id, result}` envelope carrying the caller's own id.
    pub async fn send_async(&self, request: Request) -> Result<RpcEnvelope, ProviderError> {
        let dispatched = self.dispatch(request, ResultShape::Envelope);
        into_envelope(self.settle(dispatched).await?)
    }

    /// Dispatches every request before awaiting any, then fails with the first error.
    /// Calls still outstanding at that point are abandoned.
    pub async fn send_batch(
        &self,
        requests: Vec<Request>,
    ) -> Result<Vec<RpcEnvelope>, ProviderError> {
        let dispatched: Vec<Dispatched<'_>> = requests
            .into_iter()
            .map(|request| self.dispatch(request, ResultShape::Envelope))
            .collect();
        try_join_all(
            dispatched
                .into_iter()
                .map(|dispatched| async move { into_envelope(self.settle(dispatched).await?) }),
        )
        .await
    }

    /// Legacy synchronous entry point: only locally answerable methods are supported.
    pub fn send_sync(&self, request: Request) -> Result<RpcEnvelope, ProviderError> {
        let Policy::Local(value) = Method::from_name(&request.method).policy() else {
            return Err(ProviderError::unsupported(request.method));
        };
        let id = request.id.unwrap_or_else(|| RequestId::from(mint_internal_id()));
        Ok(RpcEnvelope::new(id, self.local_value(value)))
    }

    /// Asks the host for accounts (`eth_requestAccounts`).
    pub async fn enable(&self) -> Result<Vec<String>, ProviderError> {
        let accounts = self.request(Request::new("eth_requestAccounts", json!([]))).await?;
        serde_json::from_value(accounts).map_err(|err| {
            ProviderError::internal(format!("host returned malformed accounts: {err}"))
        })
    }

    // ── Response sink ────────────────────────────────────────────────────────

    /// Settles a call with the host's (or a nested provider's) answer. Answers for ids
    /// nobody owns are logged and dropped.
    pub fn deliver_result(&self, id: InternalId, raw: JsonValue) {
        if !self.claim_result(id, &raw) {
            log::warn!("provider: dropping result for unknown call {id}");
        }
    }

    /// Rejects a call owned by this instance. Errors for unknown ids are dropped.
    pub fn deliver_error(&self, id: InternalId, error: ProviderError) {
        let mut calls = self.lock_calls();
        if !calls.registry.contains(id) {
            log::warn!("provider: dropping error for unknown call {id}: {error}");
            return;
        }
        log::debug!("provider: reject {id}: {error}");
        calls.registry.settle(id, Err(error));
        calls.correlator.resolve_original(id);
    }

    fn claim_result(&self, id: InternalId, raw: &JsonValue) -> bool {
        {
            let mut calls = self.lock_calls();
            if let Some(envelope) = calls.registry.expects_envelope(id) {
                let original = calls.correlator.resolve_original(id);
                let result = unwrap_envelope(raw.clone());
                let value = if envelope {
                    RpcEnvelope::new(original, result).into_value()
                } else {
                    result
                };
                if self.options().is_debug {
                    log::debug!("provider: <- {id} {value}");
                }
                calls.registry.settle(id, Ok(value));
                return true;
            }
        }
        self.children.iter().any(|child| child.claim_result(id, raw))
    }

    // ── Session configuration ────────────────────────────────────────────────

    /// Applies a new configuration. A missing address leaves the current one in place.
    pub fn set_config(&self, config: &ProviderConfig) -> Result<(), ProviderError> {
        config.validate()?;
        *self.options.write().expect("options lock poisoned") =
            DispatchOptions::from_config(config);
        self.set_chain_id(config.chain_id);
        if let Some(address) = config.address.as_deref() {
            self.set_address(address);
        }
        Ok(())
    }

    pub fn set_address(&self, address: &str) {
        let accounts = {
            let mut session = self.session.write().expect("session lock poisoned");
            if !session.set_address(address) {
                return;
            }
            session.accounts()
        };
        self.emit(ProviderEvent::AccountsChanged { accounts });
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        let chain_id = {
            let mut session = self.session.write().expect("session lock poisoned");
            if !session.set_chain_id(chain_id) {
                return;
            }
            session.chain_id().to_owned()
        };
        self.emit(ProviderEvent::ChainChanged { chain_id });
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    pub fn address(&self) -> String {
        self.session().address().to_owned()
    }

    pub fn chain_id(&self) -> String {
        self.session().chain_id().to_owned()
    }

    pub fn network_id(&self) -> String {
        self.session().network_id().to_owned()
    }

    pub fn is_ready(&self) -> bool {
        self.session().is_ready()
    }

    /// Calls registered and not yet settled.
    pub fn pending_calls(&self) -> usize {
        self.lock_calls().registry.len()
    }

    /// Caller ids still waiting to be restored into a reply.
    pub fn correlated_ids(&self) -> usize {
        self.lock_calls().correlator.len()
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    fn dispatch(&self, request: Request, shape: ResultShape) -> Dispatched<'_> {
        let method = Method::from_name(&request.method);
        let (request, receiver) = {
            let mut calls = self.lock_calls();
            let request = calls.correlator.normalize(request);
            let receiver = calls.registry.register(request.id, shape);
            (request, receiver)
        };
        let id = request.id;
        let guard = CallGuard::new(self, id);
        let options = self.options();
        if options.is_debug {
            log::debug!("provider: -> {id} {} {}", request.method, request.params);
        }

        match method.policy() {
            Policy::Local(value) => self.deliver_result(id, self.local_value(value)),
            Policy::Unsupported => {
                self.deliver_error(id, ProviderError::unsupported(&request.method));
            }
            Policy::Bridge(action) => match payload::build(&method, action, &request) {
                Ok(built) => self.post(
                    id,
                    built.action.name(),
                    built.payload,
                    built.action.allowed_before_ready(),
                ),
                Err(err) => self.deliver_error(id, err),
            },
            Policy::Fallback if options.proxy => {
                self.post(id, &request.method, payload::forward(&request), false);
            }
            Policy::Fallback => {
                self.lock_calls().registry.remove(id);
                log::debug!("provider: {id} {} -> upstream", request.method);
                return Dispatched::Upstream { guard, request, shape };
            }
        }
        Dispatched::Waiting { guard, receiver }
    }

    fn local_value(&self, value: LocalValue) -> JsonValue {
        let session = self.session();
        match value {
            LocalValue::Accounts => json!(session.accounts()),
            LocalValue::Coinbase if session.is_ready() => json!(session.address()),
            LocalValue::Coinbase => JsonValue::Null,
            LocalValue::NetworkId => json!(session.network_id()),
            LocalValue::ChainId => json!(session.chain_id()),
        }
    }

    /// Sends one message to the host, unless the readiness gate refuses it.
    fn post(&self, id: InternalId, name: &str, payload: JsonValue, bootstrap: bool) {
        if !bootstrap && !self.is_ready() {
            log::warn!("provider: refusing '{name}' for {id}, no account selected");
            self.deliver_error(id, ProviderError::NotReady);
            return;
        }
        let (origin, icon) = match (&self.context, bootstrap) {
            (Some(context), true) => (Some(context.origin.clone()), context.icon.clone()),
            _ => (None, None),
        };
        let message =
            BridgeMessage { name: name.to_owned(), payload, id: id.to_string(), origin, icon };
        log::debug!("provider: {id} -> host '{name}'");
        if let Err(err) = self.bridge.post(message) {
            log::warn!("provider: host bridge refused {id}: {err}");
            self.deliver_error(id, err);
        }
    }

    async fn settle(&self, dispatched: Dispatched<'_>) -> Result<JsonValue, ProviderError> {
        match dispatched {
            Dispatched::Waiting { guard, receiver } => {
                self.await_settlement(guard, receiver).await
            }
            Dispatched::Upstream { guard, request, shape } => {
                self.call_upstream(guard, request, shape).await
            }
        }
    }

    async fn await_settlement(
        &self,
        guard: CallGuard<'_>,
        mut receiver: oneshot::Receiver<Outcome>,
    ) -> Result<JsonValue, ProviderError> {
        let id = guard.id;
        // Local and rejected calls are already settled; they never touch the timer.
        match receiver.try_recv() {
            Ok(outcome) => {
                guard.disarm();
                return outcome;
            }
            Err(oneshot::error::TryRecvError::Closed) => return Err(dropped(id)),
            Err(oneshot::error::TryRecvError::Empty) => {}
        }
        let received = match self.request_timer() {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(received) => received,
                Err(_) => {
                    log::warn!("provider: call {id} timed out, discarding");
                    return Err(timed_out(id, limit));
                }
            },
            None => receiver.await,
        };
        let outcome = received.map_err(|_| dropped(id))?;
        guard.disarm();
        outcome
    }

    async fn call_upstream(
        &self,
        guard: CallGuard<'_>,
        request: RpcRequest,
        shape: ResultShape,
    ) -> Result<JsonValue, ProviderError> {
        let id = request.id;
        let call = self.upstream.call(request);
        let outcome = match self.request_timer() {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                log::warn!("provider: upstream call {id} timed out");
                Err(timed_out(id, limit))
            }),
            None => call.await,
        };
        let original = self.lock_calls().correlator.resolve_original(id);
        guard.disarm();
        let result = unwrap_envelope(outcome?);
        Ok(match shape {
            ResultShape::Bare => result,
            ResultShape::Envelope => RpcEnvelope::new(original, result).into_value(),
        })
    }

    /// The configured timeout, when a tokio runtime is there to drive the timer.
    fn request_timer(&self) -> Option<Duration> {
        let limit = self.options().request_timeout?;
        if tokio::runtime::Handle::try_current().is_err() {
            log::debug!("provider: no tokio runtime, waiting without a timeout");
            return None;
        }
        Some(limit)
    }

    /// Drops every trace of a call whose answer will no longer be awaited.
    fn abandon(&self, id: InternalId) {
        let mut calls = self.lock_calls();
        if calls.registry.remove(id) {
            log::debug!("provider: abandoned call {id}");
        }
        calls.correlator.resolve_original(id);
    }

    fn emit(&self, event: ProviderEvent) {
        if self.events.send(event).is_err() {
            log::trace!("provider: no event subscribers");
        }
    }

    fn lock_calls(&self) -> MutexGuard<'_, CallTable> {
        self.calls.lock().expect("call table mutex poisoned")
    }

    fn session(&self) -> RwLockReadGuard<'_, SessionState> {
        self.session.read().expect("session lock poisoned")
    }

    fn options(&self) -> DispatchOptions {
        *self.options.read().expect("options lock poisoned")
    }
}

fn into_envelope(value: JsonValue) -> Result<RpcEnvelope, ProviderError> {
    serde_json::from_value(value)
        .map_err(|err| ProviderError::internal(format!("malformed reply envelope: {err}")))
}

fn dropped(id: InternalId) -> ProviderError {
    ProviderError::internal(format!("call {id} was dropped without settlement"))
}

fn timed_out(id: InternalId, limit: Duration) -> ProviderError {
    ProviderError::Timeout {
        id: id.0,
        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
    }
}
