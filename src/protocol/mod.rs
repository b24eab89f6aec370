//! RESP Protocol Implementation
//!
//! Stateless translation between RESP bytes and [`RespValue`].
//!
//! ## Modules
//!
//! - `types`: Defines the `RespValue` enum and its encoding
//! - `parser`: Bounded recursive-descent decoder
//!
//! ## Example
//!
//! ```
//! use emberkv::protocol::{decode, RespValue};
//! use bytes::Bytes;
//!
//! // Decoding a request
//! let request = decode(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").unwrap();
//! assert_eq!(request.as_array().map(|a| a.len()), Some(2));
//!
//! // Encoding a reply
//! let reply = RespValue::bulk_string(Bytes::from("bar"));
//! assert_eq!(reply.serialize(), b"$3\r\nbar\r\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{decode, parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
