//! Result channel wire format
//!
//! A namespace child reports exactly one result to its parent over a
//! one-shot byte stream. The frame is an ASCII tag, the payload, and a single
//! NUL byte which is the only framing marker:
//!
//! ```text
//! ok:<json value>\0
//! err:<utf-8 message>\0
//! ```
//!
//! JSON never contains a raw NUL, so successful payloads cannot be cut
//! short. NUL bytes in failure messages are dropped when encoding.

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Tag of a successful frame
pub const OK_TAG: &[u8] = b"ok:";

/// Tag of a failed frame
pub const ERR_TAG: &[u8] = b"err:";

/// Frame terminator
pub const TERMINATOR: u8 = 0;

/// Initial size of the receive buffer; doubled whenever it fills up
const INITIAL_READ_SIZE: usize = 256;

/// Outcome of a request executed in a namespace child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionResult<T> {
    /// The request produced a value
    Success(T),
    /// The request failed; the message is all that survives the channel
    Failure(String),
}

impl<T> ExecutionResult<T> {
    /// Build from any result whose error can be rendered as text
    pub fn from_result<E: fmt::Display>(result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) => Self::Failure(e.to_string()),
        }
    }

    /// Convert into a `Result`, mapping `Failure` to [`Error::Remote`]
    ///
    /// # Errors
    /// Returns the child's failure message
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(message) => Err(Error::Remote { message }),
        }
    }

    /// Check whether this is a success
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl<T: Serialize> ExecutionResult<T> {
    /// Encode into a complete frame, terminator included
    ///
    /// A value that fails to serialize is reported as a failure frame.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Success(value) => match serde_json::to_vec(value) {
                Ok(json) => {
                    let mut frame = BytesMut::with_capacity(OK_TAG.len() + json.len() + 1);
                    frame.put_slice(OK_TAG);
                    frame.put_slice(&json);
                    frame.put_u8(TERMINATOR);
                    frame.freeze()
                }
                Err(e) => encode_failure(&e.to_string()),
            },
            Self::Failure(message) => encode_failure(message),
        }
    }
}

impl<T: DeserializeOwned> ExecutionResult<T> {
    /// Decode a frame read from the channel
    ///
    /// # Errors
    /// Returns [`Error::UnexpectedResponse`] when the terminator is missing,
    /// misplaced or the tag is unknown, and [`Error::Serialization`] when a
    /// success payload is not valid JSON for `T`.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let Some((&TERMINATOR, body)) = frame.split_last() else {
            return Err(Error::UnexpectedResponse {
                message: if frame.is_empty() {
                    "empty response".to_string()
                } else {
                    "invalid termination character, not NUL".to_string()
                },
            });
        };

        if body.contains(&TERMINATOR) {
            return Err(Error::UnexpectedResponse {
                message: "data after frame terminator".to_string(),
            });
        }

        if let Some(message) = body.strip_prefix(ERR_TAG) {
            return Ok(Self::Failure(String::from_utf8_lossy(message).into_owned()));
        }

        if let Some(json) = body.strip_prefix(OK_TAG) {
            return Ok(Self::Success(serde_json::from_slice(json)?));
        }

        Err(Error::UnexpectedResponse {
            message: String::from_utf8_lossy(body).into_owned(),
        })
    }
}

fn encode_failure(message: &str) -> Bytes {
    let mut frame = BytesMut::with_capacity(ERR_TAG.len() + message.len() + 1);
    frame.put_slice(ERR_TAG);
    for chunk in message.as_bytes().split(|b| *b == TERMINATOR) {
        frame.put_slice(chunk);
    }
    frame.put_u8(TERMINATOR);
    frame.freeze()
}

/// Read one frame from a byte stream
///
/// `read` is called with the unfilled tail of a growing buffer and returns
/// the number of bytes it stored; `0` means the stream closed. Reading stops
/// at end of stream or as soon as a terminator has arrived. The returned
/// bytes are not validated; pass them to [`ExecutionResult::decode`].
///
/// # Errors
/// Propagates the first error returned by `read`
pub fn read_frame<F>(mut read: F) -> Result<Vec<u8>>
where
    F: FnMut(&mut [u8]) -> Result<usize>,
{
    let mut buf = vec![0u8; INITIAL_READ_SIZE];
    let mut filled = 0;

    loop {
        if filled == buf.len() {
            buf.resize(buf.len() * 2, 0);
        }

        let n = read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }

        let complete = buf[filled..filled + n].contains(&TERMINATOR);
        filled += n;
        if complete {
            break;
        }
    }

    buf.truncate(filled);
    Ok(buf)
}
