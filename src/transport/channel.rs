//! In-memory transport
//!
//! [`pair`] returns two connected ends. Frames written on one end arrive, in
//! order, on the other end's inbound stream. Closing one end ends the other
//! end's stream.

use std::sync::Mutex;
use std::sync::PoisonError;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{ self, StreamExt };
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::Error;
use crate::transport::{ Connection, InboundFrames, Transport };

/// Outbound half of an in-memory connection
pub struct ChannelTransport {
    tx: Mutex<Option<mpsc::Sender<Bytes>>>,
}

impl ChannelTransport {
    fn sender(&self) -> Option<mpsc::Sender<Bytes>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send_frame(&self, frame: Bytes) -> Result<(), Error> {
        let tx = self.sender().ok_or(Error::SessionClosed)?;
        tx.send(frame).await.map_err(|_| Error::Transport("peer has gone away".to_string()))
    }

    async fn close(&self) -> Result<(), Error> {
        if self.tx.lock().unwrap_or_else(PoisonError::into_inner).take().is_some() {
            debug!("Channel transport closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.sender().is_some_and(|tx| !tx.is_closed())
    }
}

fn inbound(rx: mpsc::Receiver<Bytes>) -> InboundFrames {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|frame| (Ok(frame), rx)) }).boxed()
}

/// Create two connected in-memory ends with room for `capacity` frames each way
pub fn pair(capacity: usize) -> (Connection, Connection) {
    let (a_tx, a_rx) = mpsc::channel(capacity.max(1));
    let (b_tx, b_rx) = mpsc::channel(capacity.max(1));
    let a = Connection::new(ChannelTransport { tx: Mutex::new(Some(a_tx)) }, inbound(b_rx));
    let b = Connection::new(ChannelTransport { tx: Mutex::new(Some(b_tx)) }, inbound(a_rx));
    (a, b)
}
