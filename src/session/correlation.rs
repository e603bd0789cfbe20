//! Request/response correlation
//!
//! Every outbound request gets a fresh integer id and an entry in the pending
//! table. The matching response (or error response) removes the entry and
//! completes the caller's [`PendingCall`]. Responses may arrive in any order;
//! several requests for the same method may be outstanding at once.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{ AtomicI64, Ordering };
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError, Weak };
use std::task::{ Context, Poll };
use std::time::{ Duration, Instant };

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{ debug, warn };

use crate::errors::Error;
use crate::protocol::envelope::RequestId;
use crate::protocol::types::ProgressToken;

type Completion = oneshot::Sender<Result<Value, Error>>;

struct PendingEntry {
    method: String,
    created_at: Instant,
    progress_token: Option<ProgressToken>,
    tx: Completion,
}

#[derive(Default)]
struct TableState {
    pending: HashMap<RequestId, PendingEntry>,
    closed: bool,
}

/// What the table knew about a call when it was completed
#[derive(Debug, Clone)]
pub struct Completed {
    pub method: String,
    pub progress_token: Option<ProgressToken>,
    pub elapsed: Duration,
}

/// Snapshot of one outstanding call
#[derive(Debug, Clone)]
pub struct Outstanding {
    pub id: RequestId,
    pub method: String,
    pub created_at: Instant,
}

/// The pending table. Shared by every sender and the single inbound reader.
pub struct CorrelationTable {
    next_id: AtomicI64,
    state: Mutex<TableState>,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            state: Mutex::new(TableState::default()),
        }
    }
}

impl CorrelationTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new call under a fresh id.
    ///
    /// Ids come from a monotonic counter, so an id is never handed out twice
    /// within one session.
    pub fn register(
        self: &Arc<Self>,
        method: &str,
        progress_token: Option<ProgressToken>
    ) -> Result<PendingCall, Error> {
        let mut state = self.lock();
        if state.closed {
            return Err(Error::SessionClosed);
        }

        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        let created_at = Instant::now();
        state.pending.insert(id.clone(), PendingEntry {
            method: method.to_string(),
            created_at,
            progress_token,
            tx,
        });

        Ok(PendingCall {
            id,
            method: method.to_string(),
            created_at,
            rx,
            table: Arc::downgrade(self),
        })
    }

    /// Deliver the terminal outcome for `id`.
    ///
    /// Returns `None` when nothing was waiting for this id: it was never sent,
    /// was already answered, or was cancelled. Such a response is dangling and
    /// only worth a warning.
    pub fn complete(&self, id: &RequestId, outcome: Result<Value, Error>) -> Option<Completed> {
        let entry = self.lock().pending.remove(id)?;
        let completed = Completed {
            method: entry.method,
            progress_token: entry.progress_token,
            elapsed: entry.created_at.elapsed(),
        };
        if entry.tx.send(outcome).is_err() {
            debug!("Caller for request {} ({}) went away before completion", id, completed.method);
        }
        Some(completed)
    }

    /// Cancel a call locally; the caller sees `Error::Cancelled`.
    ///
    /// Returns the entry's progress token if the call was still outstanding.
    pub fn cancel(&self, id: &RequestId) -> Option<Completed> {
        let completed = self.complete(id, Err(Error::Cancelled));
        if completed.is_some() {
            debug!("Cancelled request {}", id);
        }
        completed
    }

    /// Drop an entry without completing it, e.g. after a failed write
    pub fn remove(&self, id: &RequestId) -> bool {
        self.lock().pending.remove(id).is_some()
    }

    /// Close the table: fail every outstanding call with `SessionClosed` and
    /// refuse new registrations.
    pub fn close(&self) -> usize {
        let drained: Vec<_> = {
            let mut state = self.lock();
            state.closed = true;
            state.pending.drain().collect()
        };
        let count = drained.len();
        for (id, entry) in drained {
            debug!("Failing request {} ({}) on session close", id, entry.method);
            let _ = entry.tx.send(Err(Error::SessionClosed));
        }
        if count > 0 {
            warn!("Session closed with {} request(s) outstanding", count);
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of outstanding calls
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.lock().pending.contains_key(id)
    }

    /// Outstanding calls, oldest first
    pub fn outstanding(&self) -> Vec<Outstanding> {
        let mut calls: Vec<_> = self
            .lock()
            .pending.iter()
            .map(|(id, entry)| Outstanding {
                id: id.clone(),
                method: entry.method.clone(),
                created_at: entry.created_at,
            })
            .collect();
        calls.sort_by_key(|c| {
            let seq = match &c.id {
                RequestId::Number(n) => *n,
                RequestId::String(_) => i64::MAX,
            };
            (c.created_at, seq)
        });
        calls
    }
}

/// Handle to an outstanding request.
///
/// Awaiting it yields the peer's result, the peer's error as `Error::Rpc`,
/// `Error::Cancelled` after a local cancel, or `Error::SessionClosed` when the
/// session went away first. Dropping it does not cancel the request.
#[must_use = "a PendingCall does nothing unless awaited"]
pub struct PendingCall {
    id: RequestId,
    method: String,
    created_at: Instant,
    rx: oneshot::Receiver<Result<Value, Error>>,
    table: Weak<CorrelationTable>,
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl PendingCall {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Cancel locally. Returns false if the call had already completed.
    pub fn cancel(&self) -> bool {
        self.table.upgrade().is_some_and(|table| table.cancel(&self.id).is_some())
    }

    /// Await the result, cancelling locally if it takes longer than `timeout`
    pub async fn with_timeout(mut self, timeout: Duration) -> Result<Value, Error> {
        match tokio::time::timeout(timeout, &mut self).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.cancel();
                Err(Error::Timeout(format!("{} ({}) did not complete within {:?}", self.method, self.id, timeout)))
            }
        }
    }

    /// Await the result and decode it
    pub async fn decode<R: DeserializeOwned>(self) -> Result<R, Error> {
        let value = self.await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl Future for PendingCall {
    type Output = Result<Value, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(Error::SessionClosed)))
    }
}
