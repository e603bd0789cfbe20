//! Progress and change notifications
//!
//! Progress notifications are routed by progress token to the caller that
//! asked for them. They never complete a call; the stream simply ends once the
//! call has its terminal response.
//!
//! List-changed and resource-updated notifications are unsolicited. They are
//! broadcast to every subscriber and have nothing to do with correlation.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{ Mutex, MutexGuard, PoisonError };
use std::task::{ Context, Poll };

use futures::stream::{ self, BoxStream, Stream, StreamExt };
use tokio::sync::{ broadcast, mpsc };
use tracing::{ debug, warn };

use crate::protocol::method::Method;
use crate::protocol::one_of::OneOf;
use crate::protocol::types::{ ProgressParams, ProgressToken };
use crate::protocol::unions::{ ClientNotification, ServerNotification };

/// An unsolicited change announced by the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    ToolsListChanged,
    PromptsListChanged,
    ResourcesListChanged,
    ResourceUpdated {
        uri: String,
    },
    RootsListChanged,
}

impl ChangeEvent {
    /// Method of the notification that carries this event
    pub fn method(&self) -> Method {
        match self {
            ChangeEvent::ToolsListChanged => Method::NotificationsToolsListChanged,
            ChangeEvent::PromptsListChanged => Method::NotificationsPromptsListChanged,
            ChangeEvent::ResourcesListChanged => Method::NotificationsResourcesListChanged,
            ChangeEvent::ResourceUpdated { .. } => Method::NotificationsResourcesUpdated,
            ChangeEvent::RootsListChanged => Method::NotificationsRootsListChanged,
        }
    }

    pub(crate) fn from_server(notification: &OneOf<ServerNotification>) -> Option<Self> {
        match notification.get()? {
            ServerNotification::ToolListChanged(_) => Some(ChangeEvent::ToolsListChanged),
            ServerNotification::PromptListChanged(_) => Some(ChangeEvent::PromptsListChanged),
            ServerNotification::ResourceListChanged(_) => Some(ChangeEvent::ResourcesListChanged),
            ServerNotification::ResourceUpdated(n) => {
                Some(ChangeEvent::ResourceUpdated { uri: n.params.uri.clone() })
            }
            _ => None,
        }
    }

    pub(crate) fn from_client(notification: &OneOf<ClientNotification>) -> Option<Self> {
        match notification.get()? {
            ClientNotification::RootsListChanged(_) => Some(ChangeEvent::RootsListChanged),
            _ => None,
        }
    }
}

/// Receives broadcast values until the sending side goes away
pub struct Subscription<T> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    pub(crate) fn new(rx: broadcast::Receiver<T>) -> Self {
        Self { rx }
    }

    /// A subscription that is already finished
    pub(crate) fn closed() -> Self {
        let (tx, rx) = broadcast::channel(1);
        drop(tx);
        Self { rx }
    }

    /// Get the next value, or None once the session is gone.
    ///
    /// A subscriber that falls behind skips what it missed.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(value) => {
                    return Some(value);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Subscriber lagged behind, {} notification(s) dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return None;
                }
            }
        }
    }

    /// Convert the subscription into a stream
    pub fn into_stream(self) -> BoxStream<'static, T> {
        stream::unfold(self, |mut sub| async move { sub.next().await.map(|value| (value, sub)) }).boxed()
    }
}

/// Progress updates for one outstanding request
pub struct ProgressStream {
    token: ProgressToken,
    rx: mpsc::Receiver<ProgressParams>,
}

impl ProgressStream {
    pub fn token(&self) -> &ProgressToken {
        &self.token
    }

    /// Next update, or None once the request has completed
    pub async fn next(&mut self) -> Option<ProgressParams> {
        self.rx.recv().await
    }
}

impl Stream for ProgressStream {
    type Item = ProgressParams;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Routes progress notifications to the stream registered for their token
pub struct ProgressTracker {
    streams: Mutex<HashMap<ProgressToken, mpsc::Sender<ProgressParams>>>,
    buffer: usize,
}

impl ProgressTracker {
    pub fn new(buffer: usize) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProgressToken, mpsc::Sender<ProgressParams>>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking a token
    pub fn track(&self, token: ProgressToken) -> ProgressStream {
        let (tx, rx) = mpsc::channel(self.buffer);
        self.lock().insert(token.clone(), tx);
        ProgressStream { token, rx }
    }

    /// Hand an update to the stream for its token.
    ///
    /// Returns false when no one is tracking the token.
    pub fn deliver(&self, params: ProgressParams) -> bool {
        let mut streams = self.lock();
        let Some(tx) = streams.get(&params.progress_token) else {
            debug!("Dropping progress for unknown token {}", params.progress_token);
            return false;
        };
        match tx.try_send(params) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(params)) => {
                warn!("Progress stream for {} is full, dropping update", params.progress_token);
                true
            }
            Err(mpsc::error::TrySendError::Closed(params)) => {
                streams.remove(&params.progress_token);
                false
            }
        }
    }

    /// Stop tracking a token; its stream ends after buffered updates
    pub fn finish(&self, token: &ProgressToken) {
        self.lock().remove(token);
    }

    /// Stop tracking everything
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn is_tracking(&self, token: &ProgressToken) -> bool {
        self.lock().contains_key(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::*;

    fn progress(token: &str, progress: f64) -> ProgressParams {
        ProgressParams {
            progress_token: ProgressToken::String(token.to_string()),
            progress,
            total: Some(10.0),
            message: None,
        }
    }

    #[tokio::test]
    async fn updates_reach_their_own_stream_and_end_on_finish() {
        let tracker = ProgressTracker::new(8);
        let mut a = tracker.track(ProgressToken::String("a".into()));
        let mut b = tracker.track(ProgressToken::String("b".into()));

        assert!(tracker.deliver(progress("a", 1.0)));
        assert!(tracker.deliver(progress("b", 5.0)));
        assert!(tracker.deliver(progress("a", 2.0)));
        assert!(!tracker.deliver(progress("zzz", 1.0)));

        tracker.finish(a.token());
        assert_eq!(a.next().await.map(|p| p.progress), Some(1.0));
        assert_eq!(a.next().await.map(|p| p.progress), Some(2.0));
        assert!(a.next().await.is_none());
        assert_eq!(b.next().await.map(|p| p.progress), Some(5.0));
        assert!(tracker.is_tracking(b.token()));
    }

    #[tokio::test]
    async fn dropped_streams_are_forgotten() {
        let tracker = ProgressTracker::new(1);
        let stream = tracker.track(ProgressToken::Number(3));
        drop(stream);
        let mut update = progress("x", 1.0);
        update.progress_token = ProgressToken::Number(3);
        assert!(!tracker.deliver(update));
        assert!(!tracker.is_tracking(&ProgressToken::Number(3)));
    }

    #[tokio::test]
    async fn subscription_ends_when_sender_goes_away() {
        let (tx, rx) = broadcast::channel(4);
        let mut sub = Subscription::new(rx);
        tx.send(ChangeEvent::ToolsListChanged).unwrap();
        drop(tx);

        assert_eq!(sub.next().await, Some(ChangeEvent::ToolsListChanged));
        assert_eq!(sub.next().await, None);
        assert_eq!(Subscription::<ChangeEvent>::closed().next().await, None);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let (tx, rx) = broadcast::channel(1);
        let mut sub = Subscription::new(rx);
        tx.send(ChangeEvent::ToolsListChanged).unwrap();
        tx.send(ChangeEvent::PromptsListChanged).unwrap();

        assert_eq!(sub.next().await, Some(ChangeEvent::PromptsListChanged));
    }

    #[test]
    fn change_events_from_notification_unions() {
        let updated = OneOf::<ServerNotification>::new(
            ResourceUpdatedNotification::new(ResourceUriParams { uri: "file:///a".into() })
        );
        assert_eq!(
            ChangeEvent::from_server(&updated),
            Some(ChangeEvent::ResourceUpdated { uri: "file:///a".into() })
        );

        let progress = OneOf::<ServerNotification>::new(ProgressNotification::new(progress("t", 1.0)));
        assert_eq!(ChangeEvent::from_server(&progress), None);

        let roots = OneOf::<ClientNotification>::new(RootsListChangedNotification::new(None));
        assert_eq!(ChangeEvent::from_client(&roots), Some(ChangeEvent::RootsListChanged));
        assert_eq!(ChangeEvent::RootsListChanged.method(), Method::NotificationsRootsListChanged);
    }
}
