//! HTTP layer: cookie and query parsing, request/response values, header
//! rendering, and the per-connection exchange state machine.

pub mod cookie;
pub mod exchange;
pub mod header;
pub mod query;
pub mod request;

pub use exchange::{HttpExchange, HttpInbound};
pub use request::{HttpRequest, HttpResponse};
