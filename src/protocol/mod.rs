//! MCP protocol model
//!
//! Wire envelopes, payload unions, the schema types exchanged by client and
//! server, method names and pagination.

pub mod envelope;
pub mod method;
pub mod one_of;
pub mod pagination;
pub mod types;
pub mod unions;

pub use envelope::{ DecodeError, Envelope, ErrorResponse, Notification, Request, RequestId, Response };
pub use method::Method;
pub use one_of::{ OneOf, PayloadError };
pub use pagination::{ Cursor, PaginatedParams };
