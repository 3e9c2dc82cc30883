//! Discovery payloads and the forward-only payload read cursor.
//!
//! Only two payload formats are defined by lanpeer itself:
//!
//! ```text
//! Discovery probe  (broadcast):    [0x01]
//! Discovery reply  (unconnected):  [0x01 0x00 0x00 0x00]   (i32 1, little-endian)
//! ```
//!
//! Everything else is application data and passes through untouched.
//!
//! # Little-endian (for beginners)
//!
//! A 4-byte integer can be laid out most-significant byte first ("big-endian")
//! or least-significant byte first ("little-endian").  The discovery reply is
//! little-endian, so the value `1` is sent as `01 00 00 00`.  Rust's
//! `i32::to_le_bytes` / `i32::from_le_bytes` do the conversion for us.

use thiserror::Error;

/// The single byte broadcast by a client looking for a server.
pub const DISCOVERY_PROBE: [u8; 1] = [0x01];

/// The integer a server sends back to answer a probe.
pub const DISCOVERY_REPLY_VALUE: i32 = 1;

/// Errors returned by [`PayloadReader`] when the payload runs out of bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// Fewer bytes remain than the read requires.
    #[error("insufficient data: need {needed} bytes, {available} remaining")]
    InsufficientData { needed: usize, available: usize },

    /// A string read did not contain valid UTF-8.
    #[error("payload string is not valid UTF-8")]
    InvalidUtf8,

    /// A string is too long for its `u16` length prefix.
    #[error("string of {0} bytes exceeds the 65535-byte limit")]
    StringTooLong(usize),
}

/// Returns the discovery probe payload.
pub fn encode_discovery_probe() -> Vec<u8> {
    DISCOVERY_PROBE.to_vec()
}

/// Returns `true` if `payload` is exactly a discovery probe.
pub fn is_discovery_probe(payload: &[u8]) -> bool {
    payload == DISCOVERY_PROBE
}

/// Returns the discovery reply payload (`1` as a little-endian `i32`).
pub fn encode_discovery_reply() -> Vec<u8> {
    DISCOVERY_REPLY_VALUE.to_le_bytes().to_vec()
}

/// Reads the leading little-endian `i32` of `payload`.
///
/// Trailing bytes are ignored.  Returns `None` for payloads shorter than four
/// bytes; callers treat that as unrelated traffic, not as an error.
pub fn decode_discovery_reply(payload: &[u8]) -> Option<i32> {
    PayloadReader::new(payload).read_i32().ok()
}

/// Encodes `text` the way [`PayloadReader::read_string`] reads it: a `u16`
/// little-endian byte length followed by the UTF-8 bytes.
///
/// # Errors
///
/// Returns [`PayloadError::StringTooLong`] if `text` exceeds `u16::MAX` bytes.
pub fn encode_string(text: &str) -> Result<Vec<u8>, PayloadError> {
    let len = u16::try_from(text.len()).map_err(|_| PayloadError::StringTooLong(text.len()))?;
    let mut out = Vec::with_capacity(2 + text.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(text.as_bytes());
    Ok(out)
}

/// A forward-only read cursor over a received payload.
///
/// Every read consumes bytes; there is no way to rewind.  The reader borrows
/// the payload, so it cannot outlive the event it was created from.
///
/// # Examples
///
/// ```rust
/// use lanpeer_core::protocol::PayloadReader;
///
/// let bytes = [0x07, 0x01, 0x00, 0x00, 0x00];
/// let mut reader = PayloadReader::new(&bytes);
/// assert_eq!(reader.read_u8().unwrap(), 7);
/// assert_eq!(reader.read_i32().unwrap(), 1);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug)]
pub struct PayloadReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PayloadReader<'a> {
    /// Creates a cursor positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Returns `true` once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InsufficientData`] if the payload is exhausted.
    pub fn read_u8(&mut self) -> Result<u8, PayloadError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InsufficientData`] if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16, PayloadError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a little-endian `i32`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InsufficientData`] if fewer than 4 bytes remain.
    pub fn read_i32(&mut self) -> Result<i32, PayloadError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InsufficientData`] if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32, PayloadError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a string prefixed with its byte length as a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InsufficientData`] for a truncated string and
    /// [`PayloadError::InvalidUtf8`] for non-UTF-8 contents.
    pub fn read_string(&mut self) -> Result<&'a str, PayloadError> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|_| PayloadError::InvalidUtf8)
    }

    /// Consumes and returns every remaining byte.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let rest = &self.data[self.position..];
        self.position = self.data.len();
        rest
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], PayloadError> {
        let available = self.remaining();
        if available < len {
            return Err(PayloadError::InsufficientData {
                needed: len,
                available,
            });
        }
        let start = self.position;
        self.position += len;
        Ok(&self.data[start..self.position])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
