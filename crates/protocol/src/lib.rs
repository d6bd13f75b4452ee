//! HTTP API definitions for the diary study server.
//!
//! Every response body is an [`ApiResponse`] envelope: `code` is `0` on
//! success and a negative [`ErrorCode`] otherwise. Request and response
//! payloads use camelCase field names.

mod envelope;
mod error;
mod requests;
mod responses;

pub use envelope::*;
pub use error::*;
pub use requests::*;
pub use responses::*;
