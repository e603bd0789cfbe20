//! Transport module for MCP communication
//!
//! A transport moves complete JSON documents (frames) between the two sides.
//! Framing is the transport's business; the session only sees whole frames.
//! Outbound frames go through [`Transport::send_frame`]; inbound frames are a
//! stream the session reads from.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::errors::Error;

pub mod channel;
pub mod stdio;

/// Stream of inbound frames, one complete JSON document each
pub type InboundFrames = BoxStream<'static, Result<Bytes, Error>>;

/// Outbound half of a transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one complete frame
    async fn send_frame(&self, frame: Bytes) -> Result<(), Error>;

    /// Close the outbound half; the peer sees end of stream
    async fn close(&self) -> Result<(), Error>;

    /// Check if the transport can still send
    fn is_connected(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_frame(&self, frame: Bytes) -> Result<(), Error> {
        (**self).send_frame(frame).await
    }

    async fn close(&self) -> Result<(), Error> {
        (**self).close().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// Both halves of a connected transport
pub struct Connection {
    pub transport: Arc<dyn Transport>,
    pub inbound: InboundFrames,
}

impl Connection {
    pub fn new(transport: impl Transport + 'static, inbound: InboundFrames) -> Self {
        Self {
            transport: Arc::new(transport),
            inbound,
        }
    }

    pub fn into_parts(self) -> (Arc<dyn Transport>, InboundFrames) {
        (self.transport, self.inbound)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.transport.is_connected())
            .finish_non_exhaustive()
    }
}
