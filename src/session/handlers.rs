//! Method handler registry
//!
//! Maps a method name to the code that answers it. Request handlers produce a
//! result or an error; notification handlers only observe. Several
//! notification handlers may be attached to the same method.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{ Arc, PoisonError, RwLock };

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tracing::debug;

use crate::errors::Error;
use crate::protocol::envelope::{ Notification, RequestId };
use crate::protocol::types::{ ProgressParams, ProgressToken };
use crate::session::Session;

/// Type for request handler functions
pub type RequestHandler = Arc<
    dyn (Fn(RequestContext, Option<Value>) -> BoxFuture<'static, Result<Value, Error>>) + Send + Sync
>;

/// Type for notification handler functions
pub type NotificationHandler = Arc<dyn (Fn(Notification) -> BoxFuture<'static, ()>) + Send + Sync>;

/// What a request handler knows about the request it is answering
#[derive(Clone)]
pub struct RequestContext {
    id: RequestId,
    method: String,
    progress_token: Option<ProgressToken>,
    session: Session,
}

impl RequestContext {
    pub(crate) fn new(
        id: RequestId,
        method: String,
        progress_token: Option<ProgressToken>,
        session: Session
    ) -> Self {
        Self {
            id,
            method,
            progress_token,
            session,
        }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Token the requester attached, if it wants progress
    pub fn progress_token(&self) -> Option<&ProgressToken> {
        self.progress_token.as_ref()
    }

    /// The session the request arrived on, for calling back into the peer
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Send `notifications/progress` for this request.
    ///
    /// Does nothing when the requester did not ask for progress.
    pub async fn report_progress(
        &self,
        progress: f64,
        total: Option<f64>,
        message: Option<String>
    ) -> Result<(), Error> {
        let Some(token) = self.progress_token.clone() else {
            return Ok(());
        };
        let params = ProgressParams {
            progress_token: token,
            progress,
            total,
            message,
        };
        self.session.notify(
            crate::protocol::method::Method::NotificationsProgress.as_str(),
            Some(serde_json::to_value(params)?)
        ).await
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("progress_token", &self.progress_token)
            .finish()
    }
}

/// Registry of request and notification handlers, keyed by method
#[derive(Default)]
pub struct HandlerRegistry {
    requests: RwLock<HashMap<String, RequestHandler>>,
    notifications: RwLock<HashMap<String, Vec<NotificationHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request handler, replacing any previous one for the method
    pub fn register_request<F, Fut>(&self, method: impl Into<String>, handler: F)
        where
            F: Fn(RequestContext, Option<Value>) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<Value, Error>> + Send + 'static
    {
        let method = method.into();
        debug!("Registering request handler for {}", method);
        let handler: RequestHandler = Arc::new(move |ctx, params| handler(ctx, params).boxed());
        let mut requests = self.requests.write().unwrap_or_else(PoisonError::into_inner);
        requests.insert(method, handler);
    }

    /// Add a notification handler for the method
    pub fn register_notification<F, Fut>(&self, method: impl Into<String>, handler: F)
        where F: Fn(Notification) -> Fut + Send + Sync + 'static, Fut: Future<Output = ()> + Send + 'static
    {
        let method = method.into();
        debug!("Registering notification handler for {}", method);
        let handler: NotificationHandler = Arc::new(move |notification| handler(notification).boxed());
        let mut notifications = self.notifications.write().unwrap_or_else(PoisonError::into_inner);
        notifications.entry(method).or_default().push(handler);
    }

    pub fn request_handler(&self, method: &str) -> Option<RequestHandler> {
        let requests = self.requests.read().unwrap_or_else(PoisonError::into_inner);
        requests.get(method).cloned()
    }

    pub fn notification_handlers(&self, method: &str) -> Vec<NotificationHandler> {
        let notifications = self.notifications.read().unwrap_or_else(PoisonError::into_inner);
        notifications.get(method).cloned().unwrap_or_default()
    }

    pub fn has_request_handler(&self, method: &str) -> bool {
        let requests = self.requests.read().unwrap_or_else(PoisonError::into_inner);
        requests.contains_key(method)
    }

    pub fn unregister_request(&self, method: &str) -> bool {
        let mut requests = self.requests.write().unwrap_or_else(PoisonError::into_inner);
        requests.remove(method).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{ AtomicUsize, Ordering };

    #[tokio::test]
    async fn later_registration_replaces_request_handler() {
        let registry = HandlerRegistry::new();
        registry.register_request("echo", |_ctx, _params| async { Ok(Value::from(1)) });
        registry.register_request("echo", |_ctx, params| async move { Ok(params.unwrap_or(Value::Null)) });

        assert!(registry.has_request_handler("echo"));
        assert!(registry.request_handler("missing").is_none());
        assert!(registry.unregister_request("echo"));
        assert!(!registry.has_request_handler("echo"));
    }

    #[tokio::test]
    async fn notification_handlers_accumulate() {
        let registry = HandlerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let hits = hits.clone();
            registry.register_notification("notifications/tools/list_changed", move |_n| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        let handlers = registry.notification_handlers("notifications/tools/list_changed");
        assert_eq!(handlers.len(), 2);
        for handler in handlers {
            handler(Notification::new("notifications/tools/list_changed", None)).await;
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(registry.notification_handlers("other").is_empty());
    }
}
