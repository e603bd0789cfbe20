//! MCP Session
//!
//! A [`Session`] ties the envelope codec, the lifecycle, the correlation table
//! and the handler registry to one transport. It is cheap to clone; every
//! clone drives the same conversation.
//!
//! One reader task ([`Session::serve`]) consumes inbound frames. Responses are
//! handed to the correlation table, requests are answered by registered
//! handlers on their own tasks, and notifications fan out to progress streams,
//! change subscribers and notification handlers. Any number of tasks may call
//! [`Session::send`] concurrently.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError, RwLock };

use futures::{ FutureExt, StreamExt };
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{ json, Map, Value };
use tokio::sync::{ broadcast, oneshot };
use tokio::task::{ AbortHandle, JoinHandle };
use tracing::{ debug, error, info, warn };
use uuid::Uuid;

use crate::errors::Error;
use crate::lifecycle::{ negotiate_version, Lifecycle, SessionRole, SessionState };
use crate::protocol::envelope::{
    self,
    attach_progress_token,
    DecodeError,
    Envelope,
    Notification,
    Request,
    RequestId,
};
use crate::protocol::method::Method;
use crate::protocol::one_of::PayloadError;
use crate::protocol::types::{
    CancelledParams,
    Implementation,
    InitializeParams,
    InitializeResult,
    ProgressParams,
    ProgressToken,
};
use crate::protocol::unions::{
    decode_notification,
    decode_request,
    ClientNotification,
    ClientRequest,
    ServerNotification,
    ServerRequest,
};
use crate::transport::{ Connection, InboundFrames, Transport };

pub mod config;
pub mod correlation;
pub mod handlers;
pub mod notifications;


pub use config::{ Capabilities, SessionCapabilities, SessionConfig };
pub use correlation::{ CorrelationTable, PendingCall };
pub use handlers::{ HandlerRegistry, RequestContext };
pub use notifications::{ ChangeEvent, ProgressStream, ProgressTracker, Subscription };

/// What initialization settled on
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiated {
    pub protocol_version: String,
    pub peer_info: Implementation,
    pub peer_capabilities: Capabilities,
    /// Instructions the server handed out, as seen by the client
    pub instructions: Option<String>,
}

struct SessionInner {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    lifecycle: Lifecycle,
    calls: Arc<CorrelationTable>,
    handlers: HandlerRegistry,
    progress: ProgressTracker,
    changes: Mutex<Option<broadcast::Sender<ChangeEvent>>>,
    negotiated: RwLock<Option<Negotiated>>,
    inflight: Mutex<HashMap<RequestId, AbortHandle>>,
}

/// One side of an MCP conversation
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role())
            .field("state", &self.state())
            .field("pending", &self.inner.calls.len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    /// Create a session writing to `transport`.
    ///
    /// Nothing is read until [`Session::serve`] is given the inbound frames.
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let (changes, _) = broadcast::channel(config.change_buffer.max(1));
        let progress = ProgressTracker::new(config.progress_buffer);
        info!("Creating {} session {} {}", config.role(), config.info.name, config.info.version);

        Self {
            inner: Arc::new(SessionInner {
                config,
                transport,
                lifecycle: Lifecycle::new(),
                calls: CorrelationTable::new(),
                handlers: HandlerRegistry::new(),
                progress,
                changes: Mutex::new(Some(changes)),
                negotiated: RwLock::new(None),
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create a session on a connection and start reading from it
    pub fn connect(connection: Connection, config: SessionConfig) -> (Self, JoinHandle<()>) {
        let (transport, inbound) = connection.into_parts();
        let session = Self::new(transport, config);
        let reader = session.spawn_serve(inbound);
        (session, reader)
    }

    pub fn role(&self) -> SessionRole {
        self.inner.config.role()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.lifecycle.state()
    }

    /// Wait until initialization has finished
    pub async fn wait_ready(&self) -> Result<(), Error> {
        match self.inner.lifecycle.wait_for(SessionState::Ready).await {
            SessionState::Ready => Ok(()),
            _ => Err(Error::SessionClosed),
        }
    }

    /// Our capabilities, and the peer's once initialization has run
    pub fn current_capabilities(&self) -> SessionCapabilities {
        SessionCapabilities {
            local: self.inner.config.capabilities.clone(),
            peer: self.negotiated().map(|n| n.peer_capabilities),
        }
    }

    pub fn negotiated(&self) -> Option<Negotiated> {
        self.inner.negotiated.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_negotiated(&self, negotiated: Negotiated) {
        info!(
            "Negotiated protocol {} with {} {}",
            negotiated.protocol_version,
            negotiated.peer_info.name,
            negotiated.peer_info.version
        );
        *self.inner.negotiated.write().unwrap_or_else(PoisonError::into_inner) = Some(negotiated);
    }

    /// Number of requests we are still waiting on
    pub fn pending_calls(&self) -> usize {
        self.inner.calls.len()
    }

    // ---------------------------------------------------------------------
    // Handlers
    // ---------------------------------------------------------------------

    /// Answer requests for `method` with `handler`.
    ///
    /// The handler runs on its own task, so it may itself call the peer.
    pub fn register_handler<F, Fut>(&self, method: impl Into<String>, handler: F)
        where
            F: Fn(RequestContext, Option<Value>) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<Value, Error>> + Send + 'static
    {
        self.inner.handlers.register_request(method, handler);
    }

    /// Like [`Session::register_handler`], decoding params and encoding the result.
    ///
    /// Missing params decode as an empty object. Params that fail to decode are
    /// answered with InvalidParams.
    pub fn register_typed_handler<P, R, F, Fut>(&self, method: impl Into<String>, handler: F)
        where
            P: DeserializeOwned + Send + 'static,
            R: Serialize + Send + 'static,
            F: Fn(RequestContext, P) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<R, Error>> + Send + 'static
    {
        let handler = Arc::new(handler);
        self.register_handler(method, move |ctx, params| {
            let handler = handler.clone();
            async move {
                let params = params.unwrap_or_else(|| Value::Object(Map::new()));
                let params: P = serde_json
                    ::from_value(params)
                    .map_err(|e| Error::InvalidParams(e.to_string()))?;
                let result = handler(ctx, params).await?;
                serde_json::to_value(result).map_err(|e| Error::Internal(e.to_string()))
            }
        });
    }

    /// Observe notifications for `method`
    pub fn on_notification<F, Fut>(&self, method: impl Into<String>, handler: F)
        where F: Fn(Notification) -> Fut + Send + Sync + 'static, Fut: Future<Output = ()> + Send + 'static
    {
        self.inner.handlers.register_notification(method, handler);
    }

    /// Receive list-changed and resource-updated events from the peer
    pub fn subscribe_changes(&self) -> Subscription<ChangeEvent> {
        match lock(&self.inner.changes).as_ref() {
            Some(tx) => Subscription::new(tx.subscribe()),
            None => Subscription::closed(),
        }
    }

    // ---------------------------------------------------------------------
    // Outbound
    // ---------------------------------------------------------------------

    async fn write(&self, envelope: &Envelope) -> Result<(), Error> {
        let frame = envelope::serialize(envelope)?;
        self.inner.transport.send_frame(frame).await
    }

    async fn dispatch_call(
        &self,
        method: &str,
        params: Option<Value>,
        progress_token: Option<ProgressToken>
    ) -> Result<PendingCall, Error> {
        let call = self.inner.calls.register(method, progress_token)?;
        let envelope = Envelope::request(call.id().clone(), method, params);
        if let Err(e) = self.write(&envelope).await {
            warn!("Failed to send {} ({}): {}", method, call.id(), e);
            self.inner.calls.remove(call.id());
            return Err(e);
        }
        debug!("Sent request {} ({})", method, call.id());
        Ok(call)
    }

    /// Send a request. The returned call completes when the peer answers.
    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<PendingCall, Error> {
        self.inner.lifecycle.check_outbound_request(method)?;
        self.dispatch_call(method, params, None).await
    }

    /// Send a request asking the peer for progress updates.
    ///
    /// `params` must be an object (or absent); a fresh token is written to
    /// `params._meta.progressToken`. The progress stream ends once the call
    /// completes, is cancelled, or the session closes.
    pub async fn send_with_progress(
        &self,
        method: &str,
        params: Option<Value>
    ) -> Result<(PendingCall, ProgressStream), Error> {
        self.inner.lifecycle.check_outbound_request(method)?;
        let token = ProgressToken::String(Uuid::new_v4().to_string());
        let params = attach_progress_token(params, &token)?;
        let stream = self.inner.progress.track(token.clone());
        match self.dispatch_call(method, Some(params), Some(token.clone())).await {
            Ok(call) => Ok((call, stream)),
            Err(e) => {
                self.inner.progress.finish(&token);
                Err(e)
            }
        }
    }

    /// Send a request and decode its result
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R, Error>
        where P: Serialize, R: DeserializeOwned
    {
        let params = match serde_json::to_value(params)? {
            Value::Null => None,
            value => Some(value),
        };
        self.send(method, params).await?.decode().await
    }

    /// Send a notification
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), Error> {
        self.inner.lifecycle.check_outbound_notification(method)?;
        self.write(&Envelope::notification(method, params)).await
    }

    /// Liveness check, legal in every state but Closed
    pub async fn ping(&self) -> Result<PendingCall, Error> {
        self.send(Method::Ping.as_str(), None).await
    }

    /// Give up on an outstanding request.
    ///
    /// The local call completes with `Error::Cancelled` and the peer is told
    /// with `notifications/cancelled`. Returns false if the request was no
    /// longer outstanding; a late reply is then treated as dangling.
    pub async fn cancel(&self, id: &RequestId, reason: Option<String>) -> Result<bool, Error> {
        let Some(completed) = self.inner.calls.cancel(id) else {
            return Ok(false);
        };
        if let Some(token) = completed.progress_token {
            self.inner.progress.finish(&token);
        }

        let params = CancelledParams {
            request_id: id.clone(),
            reason,
        };
        let notified = self.notify(
            Method::NotificationsCancelled.as_str(),
            Some(serde_json::to_value(params)?)
        ).await;
        if let Err(e) = notified {
            debug!("Could not tell peer about cancelled request {}: {}", id, e);
        }
        Ok(true)
    }

    /// Run the initialize handshake as the client.
    ///
    /// On success the session is Ready and the server's result is returned.
    /// If the server picks a version we do not speak, the session is closed.
    pub async fn initialize(&self) -> Result<InitializeResult, Error> {
        let Capabilities::Client(capabilities) = &self.inner.config.capabilities else {
            return Err(Error::Protocol("only a client session sends initialize".to_string()));
        };
        let params = InitializeParams {
            protocol_version: self.inner.config.preferred_protocol_version().to_string(),
            capabilities: capabilities.clone(),
            client_info: self.inner.config.info.clone(),
        };

        let result: InitializeResult = self.request(Method::Initialize.as_str(), params).await?;

        if !self.inner.config.protocol_versions.contains(&result.protocol_version) {
            error!("Server selected unsupported protocol version {}", result.protocol_version);
            self.close().await;
            return Err(
                Error::Protocol(
                    format!("server selected unsupported protocol version {}", result.protocol_version)
                )
            );
        }

        self.set_negotiated(Negotiated {
            protocol_version: result.protocol_version.clone(),
            peer_info: result.server_info.clone(),
            peer_capabilities: Capabilities::Server(result.capabilities.clone()),
            instructions: result.instructions.clone(),
        });
        self.inner.lifecycle.transition_to(SessionState::AwaitingInitializedNotification)?;
        self.notify(Method::NotificationsInitialized.as_str(), None).await?;
        self.inner.lifecycle.transition_to(SessionState::Ready)?;
        Ok(result)
    }

    // ---------------------------------------------------------------------
    // Inbound
    // ---------------------------------------------------------------------

    /// Read inbound frames until the stream ends or the session is closed,
    /// then close the session.
    ///
    /// A frame that fails to decode is logged and skipped.
    pub async fn serve(&self, mut inbound: InboundFrames) {
        loop {
            let frame = tokio::select! {
                frame = inbound.next() => frame,
                _ = self.inner.lifecycle.wait_for(SessionState::Closed) => break,
            };
            let Some(frame) = frame else {
                debug!("Inbound stream ended");
                break;
            };
            match frame {
                Ok(frame) => {
                    if let Err(e) = self.handle_frame(&frame).await {
                        warn!("Discarding inbound message: {}", e);
                    }
                }
                Err(e) => warn!("Inbound transport error: {}", e),
            }
        }
        self.close().await;
    }

    /// Run [`Session::serve`] on a new task
    pub fn spawn_serve(&self, inbound: InboundFrames) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move { session.serve(inbound).await })
    }

    /// Decode and route one inbound frame
    pub async fn handle_frame(&self, frame: &[u8]) -> Result<(), DecodeError> {
        let envelope = envelope::parse(frame)?;
        self.on_incoming(envelope).await;
        Ok(())
    }

    /// Route one decoded envelope
    pub async fn on_incoming(&self, envelope: Envelope) {
        if self.inner.lifecycle.is_closed() {
            debug!("Ignoring inbound message on closed session");
            return;
        }
        match envelope {
            Envelope::Response(response) => self.complete(&response.id, Ok(response.result)),
            Envelope::Error(response) => self.complete(&response.id, Err(Error::Rpc(response.error))),
            Envelope::Request(request) => self.dispatch_request(request).await,
            Envelope::Notification(notification) => self.dispatch_notification(notification).await,
        }
    }

    fn complete(&self, id: &RequestId, outcome: Result<Value, Error>) {
        match self.inner.calls.complete(id, outcome) {
            Some(completed) => {
                debug!("Request {} ({}) completed in {:?}", id, completed.method, completed.elapsed);
                if let Some(token) = completed.progress_token {
                    self.inner.progress.finish(&token);
                }
            }
            None => warn!("Dangling response for unknown request id {}", id),
        }
    }

    async fn reply(&self, id: RequestId, outcome: Result<Value, Error>) {
        let envelope = match outcome {
            Ok(result) => Envelope::response(id, result),
            Err(e) => {
                debug!("Answering request {} with error: {}", id, e);
                Envelope::error(id, e.to_error_data())
            }
        };
        if let Err(e) = self.write(&envelope).await {
            warn!("Failed to send response: {}", e);
        }
    }

    /// Check a request against the union of requests the peer may send
    fn validate_request(&self, request: &Request) -> Result<(), PayloadError> {
        let decoded = match self.role() {
            SessionRole::Server => decode_request::<ClientRequest>(request).map(|r| r.map(drop)),
            SessionRole::Client => decode_request::<ServerRequest>(request).map(|r| r.map(drop)),
        };
        decoded.unwrap_or(Ok(()))
    }

    async fn dispatch_request(&self, request: Request) {
        let id = request.id.clone();
        debug!("Received request {} ({})", request.method, id);

        if let Err(e) = self.inner.lifecycle.check_inbound_request(&request.method) {
            warn!("Rejecting request {} ({}): {}", request.method, id, e);
            return self.reply(id, Err(e)).await;
        }

        if request.method == Method::Ping.as_str() {
            return self.reply(id, Ok(json!({}))).await;
        }

        if request.method == Method::Initialize.as_str() && self.role() == SessionRole::Server {
            return self.answer_initialize(request).await;
        }

        let Some(handler) = self.inner.handlers.request_handler(&request.method) else {
            debug!("No handler for {}", request.method);
            return self.reply(id, Err(Error::MethodNotFound(request.method))).await;
        };

        if let Err(e) = self.validate_request(&request) {
            warn!("Invalid params for {} ({}): {}", request.method, id, e);
            return self.reply(id, Err(Error::Payload(e))).await;
        }

        let progress_token = request.progress_token();
        let Request { id, method, params } = request;
        let ctx = RequestContext::new(id.clone(), method.clone(), progress_token, self.clone());
        let session = self.clone();

        // The task waits until its abort handle is in the table, so it can
        // never deregister before it has been registered.
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let task_id = id.clone();
        let task = tokio::spawn(async move {
            let _ = registered_rx.await;
            let outcome = match AssertUnwindSafe(handler(ctx, params)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("Handler for {} panicked", method);
                    Err(Error::Internal(format!("handler for {} panicked", method)))
                }
            };
            lock(&session.inner.inflight).remove(&task_id);
            session.reply(task_id, outcome).await;
        });
        lock(&self.inner.inflight).insert(id.clone(), task.abort_handle());
        if self.inner.lifecycle.is_closed() {
            lock(&self.inner.inflight).remove(&id);
            task.abort();
            return;
        }
        let _ = registered_tx.send(());
    }

    /// Answer `initialize` as the server and become Ready once the answer is out
    async fn answer_initialize(&self, request: Request) {
        let params = request.params.unwrap_or(Value::Null);
        let params: InitializeParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return self.reply(request.id, Err(Error::InvalidParams(e.to_string()))).await;
            }
        };

        let protocol_version = negotiate_version(&params.protocol_version, &self.inner.config.protocol_versions);
        let result = InitializeResult {
            meta: None,
            protocol_version: protocol_version.clone(),
            capabilities: self.inner.config.capabilities.as_server().cloned().unwrap_or_default(),
            server_info: self.inner.config.info.clone(),
            instructions: self.inner.config.instructions.clone(),
        };
        let result = match serde_json::to_value(&result) {
            Ok(result) => result,
            Err(e) => {
                return self.reply(request.id, Err(Error::Internal(e.to_string()))).await;
            }
        };

        self.set_negotiated(Negotiated {
            protocol_version,
            peer_info: params.client_info,
            peer_capabilities: Capabilities::Client(params.capabilities),
            instructions: None,
        });

        if let Err(e) = self.write(&Envelope::response(request.id, result)).await {
            warn!("Failed to send initialize result: {}", e);
            return;
        }
        if let Err(e) = self.inner.lifecycle.transition_to(SessionState::Ready) {
            warn!("Could not enter Ready state: {}", e);
        }
    }

    async fn dispatch_notification(&self, notification: Notification) {
        debug!("Received notification {}", notification.method);

        let event = match self.role() {
            SessionRole::Client => {
                decode_notification::<ServerNotification>(&notification).map(|r| {
                    r.map(|n| ChangeEvent::from_server(&n))
                })
            }
            SessionRole::Server => {
                decode_notification::<ClientNotification>(&notification).map(|r| {
                    r.map(|n| ChangeEvent::from_client(&n))
                })
            }
        };
        let event = match event {
            Some(Err(e)) => {
                warn!("Dropping malformed notification {}: {}", notification.method, e);
                return;
            }
            Some(Ok(event)) => event,
            None => None,
        };

        let mut handled = true;
        match notification.method.parse::<Method>() {
            Ok(Method::NotificationsProgress) => self.on_progress(&notification),
            Ok(Method::NotificationsCancelled) => self.on_cancelled(&notification),
            Ok(Method::NotificationsInitialized) => info!("Peer finished initialization"),
            _ => {
                handled = event.is_some();
            }
        }

        if let Some(event) = event {
            if let Some(tx) = lock(&self.inner.changes).as_ref() {
                // No subscribers is fine
                let _ = tx.send(event);
            }
        }

        let handlers = self.inner.handlers.notification_handlers(&notification.method);
        if handlers.is_empty() {
            if !handled {
                debug!("Dropping notification {} with no handler", notification.method);
            }
            return;
        }
        for handler in handlers {
            tokio::spawn(handler(notification.clone()));
        }
    }

    fn on_progress(&self, notification: &Notification) {
        let params = notification.params.clone().unwrap_or(Value::Null);
        match serde_json::from_value::<ProgressParams>(params) {
            Ok(params) => {
                self.inner.progress.deliver(params);
            }
            Err(e) => warn!("Failed to parse progress notification: {}", e),
        }
    }

    fn on_cancelled(&self, notification: &Notification) {
        let params = notification.params.clone().unwrap_or(Value::Null);
        let params = match serde_json::from_value::<CancelledParams>(params) {
            Ok(params) => params,
            Err(e) => {
                warn!("Failed to parse cancellation notification: {}", e);
                return;
            }
        };
        info!(
            "Peer cancelled request {}{}",
            params.request_id,
            params.reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default()
        );
        if let Some(task) = lock(&self.inner.inflight).remove(&params.request_id) {
            task.abort();
        }
    }

    // ---------------------------------------------------------------------
    // Teardown
    // ---------------------------------------------------------------------

    /// Close the session.
    ///
    /// Every outstanding call completes with `SessionClosed`, progress streams
    /// and change subscriptions end, running handlers are aborted, and the
    /// transport is closed. Later calls fail with `SessionClosed`.
    pub async fn close(&self) {
        if !self.inner.lifecycle.is_closed() {
            info!("Closing {} session", self.role());
        }
        self.inner.lifecycle.close();
        self.inner.calls.close();
        self.inner.progress.clear();
        lock(&self.inner.changes).take();
        for (_, task) in lock(&self.inner.inflight).drain() {
            task.abort();
        }
        if let Err(e) = self.inner.transport.close().await {
            debug!("Error closing transport: {}", e);
        }
    }
}
