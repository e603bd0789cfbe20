//! MCP Session Layer
//!
//! A Rust implementation of the session layer of the Model Context Protocol
//! (MCP): JSON-RPC envelopes, polymorphic payload unions, capability and
//! version negotiation, request/response correlation, progress and change
//! notifications. Transports only move whole frames; [`transport::stdio`] and
//! [`transport::channel`] are provided.
//!
//! ```no_run
//! use mcp_session::{ ClientBuilder, transport::stdio };
//!
//! # async fn run() -> Result<(), mcp_session::Error> {
//! let (connection, _child) = stdio::spawn("my-mcp-server", &[], None)?;
//! let (client, _reader) = ClientBuilder::new().with_info("example", "0.1.0").build(connection);
//! client.initialize().await?;
//! for tool in client.list_all_tools().await? {
//!     println!("{}", tool.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod client;
pub mod errors;
pub mod lifecycle;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

// Re-export commonly used items
pub use backend::{ BackendRegistry, ProcessBackend };
pub use client::{ ClientBuilder, ClientSession };
pub use errors::{ Error, ErrorData };
pub use lifecycle::{ SessionRole, SessionState, LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS };
pub use protocol::{ Envelope, OneOf, RequestId };
pub use server::{ ServerBuilder, ServerSession };
pub use session::{ PendingCall, RequestContext, Session, SessionConfig };
pub use transport::{ Connection, Transport };
