//! Recursive-Descent RESP Decoder
//!
//! The decoder reads one type prefix byte and dispatches on it. Arrays
//! recurse into the same entry point for each element.
//!
//! ## How the Parser Works
//!
//! [`RespParser::parse`] reads from a buffer and returns either:
//! - `Ok(Some((value, consumed)))` - a complete value, `consumed` bytes were used
//! - `Ok(None)` - the buffer holds only the beginning of a value
//! - `Err(ParseError)` - the bytes can never form a valid value
//!
//! The connection layer appends socket reads to a buffer and calls `parse`
//! until it returns `None`, so a frame split across reads is reassembled
//! and several frames arriving in one read are served in order.
//!
//! [`decode`] is the strict form: the input must contain a whole value, and
//! running out of bytes is an error.
//!
//! ## Bounds
//!
//! Nesting depth, array element count and bulk length are all capped so a
//! hostile stream cannot grow the stack or force large allocations.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use std::num::ParseIntError;
use thiserror::Error;

/// Errors that can occur during RESP decoding.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The stream ended before a complete value was read
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// Unknown type prefix byte
    #[error("unknown prefix: {}", prefix_char(.0))]
    UnknownPrefix(u8),

    /// Integer or length line is not a base-10 number
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a simple string, error, or numeric line
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative (but not -1 for null)
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Arrays nested deeper than [`MAX_NESTING_DEPTH`]
    #[error("maximum nesting depth exceeded: {max}")]
    NestingTooDeep { max: usize },

    /// Array declares more than [`MAX_ARRAY_LEN`] elements
    #[error("array too large: {size} elements (max: {max})")]
    ArrayTooLarge { size: usize, max: usize },

    /// Bulk string declares more than [`MAX_BULK_SIZE`] bytes
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A header or simple line ran past [`MAX_INLINE_LEN`] without a newline
    #[error("line too long (max: {max} bytes)")]
    LineTooLong { max: usize },

    /// Framing violation (missing CRLF after a bulk payload, etc.)
    #[error("protocol error: {0}")]
    ProtocolError(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

fn prefix_char(byte: &u8) -> char {
    char::from(*byte)
}

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth
pub const MAX_NESTING_DEPTH: usize = 32;

/// Maximum number of elements in a single array
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Maximum length of a single line (type header, simple string, error, integer)
pub const MAX_INLINE_LEN: usize = 64 * 1024;

/// Elements pre-allocated for an array before any of them has been read.
const ARRAY_PREALLOC_LIMIT: usize = 1024;

/// A RESP decoder.
///
/// The parser itself is stateless between calls; it exists as a type so the
/// connection layer can hold one per client.
///
/// # Example
///
/// ```
/// use emberkv::protocol::parser::RespParser;
/// use emberkv::protocol::types::RespValue;
///
/// let mut parser = RespParser::new();
/// let buffer = b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n";
///
/// let (value, consumed) = parser.parse(buffer).unwrap().unwrap();
/// assert_eq!(consumed, buffer.len());
/// assert_eq!(value.as_array().map(|a| a.len()), Some(2));
/// ```
#[derive(Debug, Default)]
pub struct RespParser;

impl RespParser {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to parse one RESP value from the front of `buf`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((value, consumed)))` - Successfully parsed a value
    /// - `Ok(None)` - Incomplete data, need more bytes
    /// - `Err(e)` - Parse error
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        self.parse_value(buf, 0)
    }

    fn parse_value(&mut self, buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
        let Some(&first) = buf.first() else {
            return Ok(None);
        };

        match first {
            prefix::SIMPLE_STRING => self.parse_simple_string(buf),
            prefix::ERROR => self.parse_error(buf),
            prefix::INTEGER => self.parse_integer(buf),
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf, depth),
            other => Err(ParseError::UnknownPrefix(other)),
        }
    }

    /// Parses a simple string: `+<string>\r\n`
    fn parse_simple_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        Ok(read_text_line(buf)?.map(|(s, consumed)| (RespValue::SimpleString(s), consumed)))
    }

    /// Parses an error: `-<error message>\r\n`
    fn parse_error(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        Ok(read_text_line(buf)?.map(|(s, consumed)| (RespValue::Error(s), consumed)))
    }

    /// Parses an integer: `:<integer>\r\n`
    fn parse_integer(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        Ok(read_number_line(buf)?.map(|(n, consumed)| (RespValue::Integer(n), consumed)))
    }

    /// Parses a bulk string: `$<length>\r\n<data>\r\n`
    fn parse_bulk_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let (length, header_len) = match read_number_line(buf)? {
            Some(line) => line,
            None => return Ok(None),
        };

        if length == -1 {
            return Ok(Some((RespValue::BulkString(None), header_len)));
        }
        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let total_needed = header_len + length + CRLF.len();
        if buf.len() < total_needed {
            return Ok(None);
        }

        let payload_end = header_len + length;
        if &buf[payload_end..total_needed] != CRLF {
            return Err(ParseError::ProtocolError(
                "bulk string length does not match payload".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[header_len..payload_end]);
        Ok(Some((RespValue::BulkString(Some(data)), total_needed)))
    }

    /// Parses an array: `*<count>\r\n<elements...>`
    fn parse_array(&mut self, buf: &[u8], depth: usize) -> ParseResult<Option<(RespValue, usize)>> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::NestingTooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }

        let (count, header_len) = match read_number_line(buf)? {
            Some(line) => line,
            None => return Ok(None),
        };

        if count == -1 {
            return Ok(Some((RespValue::Array(None), header_len)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let count = count as usize;
        if count > MAX_ARRAY_LEN {
            return Err(ParseError::ArrayTooLarge {
                size: count,
                max: MAX_ARRAY_LEN,
            });
        }

        let mut elements = Vec::with_capacity(count.min(ARRAY_PREALLOC_LIMIT));
        let mut consumed = header_len;

        for _ in 0..count {
            match self.parse_value(&buf[consumed..], depth + 1)? {
                Some((value, element_consumed)) => {
                    elements.push(value);
                    consumed += element_consumed;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(Some(elements)), consumed)))
    }
}

/// Decodes exactly one value from a complete input.
///
/// Unlike [`RespParser::parse`], an input that stops in the middle of a
/// value is an error. Bytes after the first value are ignored.
pub fn decode(buf: &[u8]) -> ParseResult<RespValue> {
    match RespParser::new().parse(buf)? {
        Some((value, _)) => Ok(value),
        None => Err(ParseError::UnexpectedEof),
    }
}

/// Helper function to parse a single RESP message from bytes.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}

/// Reads the line following the prefix byte at `buf[0]`.
///
/// A line runs up to `\n`; a `\r` right before it is stripped. Returns the
/// line contents and the number of bytes consumed including the prefix and
/// the terminator. A line longer than [`MAX_INLINE_LEN`] is an error even
/// while its newline has not arrived yet.
fn read_line(buf: &[u8]) -> ParseResult<Option<(&[u8], usize)>> {
    // Prefix byte, the line itself, then "\r\n"
    let window = &buf[1..buf.len().min(MAX_INLINE_LEN + 3)];
    let newline = match window.iter().position(|&b| b == b'\n') {
        Some(pos) => pos + 1,
        None if buf.len() > MAX_INLINE_LEN + 2 => {
            return Err(ParseError::LineTooLong {
                max: MAX_INLINE_LEN,
            })
        }
        None => return Ok(None),
    };

    let line = &buf[1..newline];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.len() > MAX_INLINE_LEN {
        return Err(ParseError::LineTooLong {
            max: MAX_INLINE_LEN,
        });
    }
    Ok(Some((line, newline + 1)))
}

fn read_text_line(buf: &[u8]) -> ParseResult<Option<(String, usize)>> {
    match read_line(buf)? {
        Some((line, consumed)) => {
            let s = std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
            Ok(Some((s.to_string(), consumed)))
        }
        None => Ok(None),
    }
}

fn read_number_line(buf: &[u8]) -> ParseResult<Option<(i64, usize)>> {
    match read_text_line(buf)? {
        Some((s, consumed)) => {
            let n: i64 = s
                .parse()
                .map_err(|e: ParseIntError| ParseError::InvalidInteger(format!("{s:?}: {e}")))?;
            Ok(Some((n, consumed)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> RespValue {
        RespValue::bulk_string(Bytes::from(s.to_string()))
    }

    #[test]
    fn test_parse_simple_string() {
        let (value, consumed) = parse_message(b"+OK\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::SimpleString("OK".to_string()));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_parse_simple_string_incomplete() {
        assert!(parse_message(b"+OK").unwrap().is_none());
        assert!(parse_message(b"").unwrap().is_none());
    }

    #[test]
    fn test_parse_error() {
        let (value, consumed) = parse_message(b"-ERR unknown command\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Error("ERR unknown command".to_string()));
        assert_eq!(consumed, 22);
    }

    #[test]
    fn test_parse_integer() {
        let (value, consumed) = parse_message(b":1000\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Integer(1000));
        assert_eq!(consumed, 7);

        let (value, _) = parse_message(b":-42\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Integer(-42));
    }

    #[test]
    fn test_parse_invalid_integer() {
        let result = parse_message(b":not_a_number\r\n");
        assert!(matches!(result, Err(ParseError::InvalidInteger(_))));
    }

    #[test]
    fn test_parse_bulk_string() {
        let (value, consumed) = parse_message(b"$6\r\nfoobar\r\n").unwrap().unwrap();
        assert_eq!(value, bulk("foobar"));
        assert_eq!(consumed, 12);
    }

    #[test]
    fn test_parse_null_bulk_string() {
        let (value, consumed) = parse_message(b"$-1\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::BulkString(None));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_parse_empty_bulk_string() {
        let (value, consumed) = parse_message(b"$0\r\n\r\n").unwrap().unwrap();
        assert_eq!(value, bulk(""));
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_parse_bulk_string_incomplete() {
        assert!(parse_message(b"$5\r\nhel").unwrap().is_none());
        assert!(parse_message(b"$5\r\nhello").unwrap().is_none());
        assert!(parse_message(b"$5").unwrap().is_none());
    }

    #[test]
    fn test_bulk_length_mismatch_is_error() {
        let result = parse_message(b"$3\r\nhello\r\n");
        assert!(matches!(result, Err(ParseError::ProtocolError(_))));
    }

    #[test]
    fn test_bulk_length_not_numeric() {
        let result = parse_message(b"$abc\r\nhello\r\n");
        assert!(matches!(result, Err(ParseError::InvalidInteger(_))));
    }

    #[test]
    fn test_negative_lengths_rejected() {
        assert_eq!(
            parse_message(b"$-2\r\n"),
            Err(ParseError::InvalidBulkLength(-2))
        );
        assert_eq!(
            parse_message(b"*-5\r\n"),
            Err(ParseError::InvalidArrayLength(-5))
        );
    }

    #[test]
    fn test_parse_array() {
        let input = b"*2\r\n$4\r\nECHO\r\n$5\r\nhello\r\n";
        let (value, consumed) = parse_message(input).unwrap().unwrap();
        assert_eq!(value, RespValue::array(vec![bulk("ECHO"), bulk("hello")]));
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_parse_null_array() {
        let (value, _) = parse_message(b"*-1\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::Array(None));
    }

    #[test]
    fn test_parse_empty_array() {
        let (value, _) = parse_message(b"*0\r\n").unwrap().unwrap();
        assert_eq!(value, RespValue::array(vec![]));
    }

    #[test]
    fn test_parse_nested_array() {
        let input = b"*2\r\n:1\r\n*2\r\n:2\r\n$-1\r\n";
        let (value, _) = parse_message(input).unwrap().unwrap();
        assert_eq!(
            value,
            RespValue::array(vec![
                RespValue::Integer(1),
                RespValue::array(vec![RespValue::Integer(2), RespValue::BulkString(None)]),
            ])
        );
    }

    #[test]
    fn test_parse_array_incomplete() {
        assert!(parse_message(b"*2\r\n$3\r\nGET\r\n").unwrap().is_none());
        assert!(parse_message(b"*2\r\n$3\r\nGET\r\n$3\r\nfo").unwrap().is_none());
    }

    #[test]
    fn test_unknown_prefix() {
        let result = parse_message(b"!unknown\r\n");
        assert_eq!(result, Err(ParseError::UnknownPrefix(b'!')));
        assert_eq!(
            ParseError::UnknownPrefix(b'!').to_string(),
            "unknown prefix: !"
        );
    }

    #[test]
    fn test_line_without_carriage_return() {
        let (value, consumed) = parse_message(b"+OK\n").unwrap().unwrap();
        assert_eq!(value, RespValue::SimpleString("OK".to_string()));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_unterminated_line_is_bounded() {
        let mut input = vec![b'+'];
        input.extend(std::iter::repeat(b'a').take(MAX_INLINE_LEN));
        assert_eq!(parse_message(&input), Ok(None));

        input.extend_from_slice(b"aaa");
        assert_eq!(
            parse_message(&input),
            Err(ParseError::LineTooLong {
                max: MAX_INLINE_LEN
            })
        );
    }

    #[test]
    fn test_bulk_string_larger_than_line_limit() {
        let payload = "x".repeat(100 * 1024);
        let input = format!("*3\r\n$3\r\nSET\r\n$1\r\nk\r\n${}\r\n{}\r\n", payload.len(), payload);

        // Every prefix of the frame is merely incomplete
        let partial = &input.as_bytes()[..70 * 1024];
        assert_eq!(parse_message(partial), Ok(None));

        let (value, consumed) = parse_message(input.as_bytes()).unwrap().unwrap();
        assert_eq!(consumed, input.len());
        assert_eq!(value.as_array().unwrap()[2].as_bytes().unwrap().len(), payload.len());
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let mut input = Vec::new();
        for _ in 0..=MAX_NESTING_DEPTH {
            input.extend_from_slice(b"*1\r\n");
        }
        input.extend_from_slice(b":1\r\n");

        let result = parse_message(&input);
        assert_eq!(
            result,
            Err(ParseError::NestingTooDeep {
                max: MAX_NESTING_DEPTH
            })
        );
    }

    #[test]
    fn test_nesting_within_bound() {
        let mut input = Vec::new();
        for _ in 0..MAX_NESTING_DEPTH {
            input.extend_from_slice(b"*1\r\n");
        }
        input.extend_from_slice(b":1\r\n");

        let (_, consumed) = parse_message(&input).unwrap().unwrap();
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_array_length_is_bounded() {
        let input = format!("*{}\r\n", MAX_ARRAY_LEN + 1);
        let result = parse_message(input.as_bytes());
        assert!(matches!(result, Err(ParseError::ArrayTooLarge { .. })));
    }

    #[test]
    fn test_bulk_length_is_bounded() {
        let input = format!("${}\r\n", MAX_BULK_SIZE + 1);
        let result = parse_message(input.as_bytes());
        assert!(matches!(result, Err(ParseError::MessageTooLarge { .. })));
    }

    #[test]
    fn test_decode_requires_complete_value() {
        assert_eq!(decode(b"*2\r\n$3\r\nGET\r\n"), Err(ParseError::UnexpectedEof));
        assert_eq!(decode(b""), Err(ParseError::UnexpectedEof));
        assert_eq!(decode(b"+PING\r\n"), Ok(RespValue::simple_string("PING")));
    }

    #[test]
    fn test_binary_safe_bulk_string() {
        let (value, _) = parse_message(b"$5\r\nhel\x00o\r\n").unwrap().unwrap();
        assert_eq!(
            value,
            RespValue::bulk_string(Bytes::from(&b"hel\x00o"[..]))
        );
    }

    #[test]
    fn test_pipelined_frames_parse_in_order() {
        let input = b"+PING\r\n*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n";
        let mut parser = RespParser::new();

        let (first, used) = parser.parse(input).unwrap().unwrap();
        assert_eq!(first, RespValue::simple_string("PING"));

        let (second, rest) = parser.parse(&input[used..]).unwrap().unwrap();
        assert_eq!(second, RespValue::array(vec![bulk("GET"), bulk("foo")]));
        assert_eq!(used + rest, input.len());
    }

    #[test]
    fn test_roundtrip() {
        let values = vec![
            RespValue::simple_string("OK"),
            RespValue::error("ERR wrong number of arguments for 'GET' command"),
            RespValue::integer(-9_000_000_000),
            RespValue::null_bulk_string(),
            RespValue::null_array(),
            RespValue::array(vec![
                bulk("SET"),
                bulk("foo"),
                bulk("bar"),
                bulk("PX"),
                bulk("100"),
            ]),
            RespValue::array(vec![RespValue::array(vec![]), RespValue::integer(3)]),
        ];

        for original in values {
            let encoded = original.serialize();
            assert_eq!(decode(&encoded), Ok(original));
        }
    }
}
