//! RESP (Redis Serialization Protocol) Data Types
//!
//! This module defines the value model shared by the decoder and the encoder.
//!
//! ## Protocol Format
//!
//! Each RESP type starts with a type prefix byte:
//! - `+` Simple String
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk String
//! - `*` Array
//!
//! All types are terminated with CRLF (`\r\n`).
//!
//! ## Examples
//!
//! Simple String: `+OK\r\n`
//! Error: `-ERR unknown command\r\n`
//! Integer: `:1000\r\n`
//! Bulk String: `$5\r\nhello\r\n`
//! Array: `*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n`
//! Null Bulk String: `$-1\r\n`
//! Null Array: `*-1\r\n`

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A value in the RESP protocol.
///
/// The set of shapes is closed: one variant per wire type. Null bulk strings
/// and null arrays are the `None` payloads of their variants, so a null is
/// always tied to the type it was sent as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Non-binary-safe line of text.
    /// Format: `+<string>\r\n`
    SimpleString(String),

    /// Like a simple string, but signals an error condition.
    /// Format: `-<error message>\r\n`
    Error(String),

    /// 64-bit signed integer.
    /// Format: `:<integer>\r\n`
    Integer(i64),

    /// Binary-safe string with an explicit length.
    /// Format: `$<length>\r\n<data>\r\n`, null: `$-1\r\n`
    BulkString(Option<Bytes>),

    /// Ordered sequence of values, possibly nested.
    /// Format: `*<count>\r\n<element1><element2>...`, null: `*-1\r\n`
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Creates a new simple string reply.
    ///
    /// # Example
    /// ```
    /// use emberkv::protocol::types::RespValue;
    /// let ok = RespValue::simple_string("OK");
    /// assert_eq!(ok.serialize(), b"+OK\r\n");
    /// ```
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates a new error reply.
    ///
    /// # Example
    /// ```
    /// use emberkv::protocol::types::RespValue;
    /// let err = RespValue::error("ERR unknown command");
    /// assert_eq!(err.serialize(), b"-ERR unknown command\r\n");
    /// ```
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Creates a non-null bulk string.
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    /// `$-1\r\n`
    pub fn null_bulk_string() -> Self {
        RespValue::BulkString(None)
    }

    /// `*-1\r\n`
    pub fn null_array() -> Self {
        RespValue::Array(None)
    }

    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(Some(values))
    }

    /// Common reply for successful writes
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    /// Serializes the value into its exact wire representation.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the value into an existing buffer.
    ///
    /// The connection layer uses this to batch every reply produced by one
    /// read into a single write.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(Some(data)) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(None) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
            RespValue::Array(Some(values)) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(values.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for value in values {
                    value.serialize_into(buf);
                }
            }
            RespValue::Array(None) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
        }
    }

    /// Returns true for a null bulk string or a null array.
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::BulkString(None) | RespValue::Array(None))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Returns the payload of a simple string or a non-null bulk string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::SimpleString(s) => Some(s.as_bytes()),
            RespValue::BulkString(Some(b)) => Some(b),
            _ => None,
        }
    }

    /// Like [`as_bytes`](Self::as_bytes), but only when the payload is UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the elements of a non-null array.
    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(Some(arr)) => Some(arr),
            _ => None,
        }
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "\"{}\"", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(Some(data)) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            RespValue::BulkString(None) | RespValue::Array(None) => write!(f, "(nil)"),
            RespValue::Array(Some(values)) => {
                if values.is_empty() {
                    write!(f, "(empty array)")
                } else {
                    for (i, v) in values.iter().enumerate() {
                        if i > 0 {
                            writeln!(f)?;
                        }
                        write!(f, "{}) {}", i + 1, v)?;
                    }
                    Ok(())
                }
            }
        }
    }
}
