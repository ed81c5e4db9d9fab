//! NDJSON framing shared by the stdio and socket transports.
//!
//! Both transports carry one JSON-RPC message per line. Frame-level faults
//! (oversize, bad JSON, batch arrays, wrong version) are handled here,
//! below the dispatcher: a malformed frame is logged and dropped, and the
//! connection survives — it never produces an invocation to attribute an
//! error to.

pub mod stdio;
pub mod tcp;

use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncBufReadExt;

use vanguard_core::jsonrpc::{ClassifyError, MessageKind, classify};

/// Maximum frame size (10 MB).
///
/// Lines beyond this are rejected before JSON parsing to prevent oversized
/// allocation from crafted input.
pub const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// Frame-level faults. The connection survives all of these except `Io`.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The line exceeds [`MAX_FRAME_BYTES`].
    #[error("frame exceeds {max_bytes} byte limit")]
    FrameTooLarge {
        /// The enforced limit
        max_bytes: usize,
    },

    /// The line is not valid JSON, or not a classifiable JSON-RPC message.
    #[error("malformed frame: {reason}")]
    MalformedFrame {
        /// What failed to parse
        reason: String,
    },

    /// JSON-RPC batch arrays are not supported over these transports.
    #[error("batch frames are not supported")]
    UnsupportedBatch,

    /// The `jsonrpc` version field is missing.
    #[error("missing jsonrpc version field")]
    MissingVersion,

    /// The `jsonrpc` version field is present but not `"2.0"`.
    #[error("unsupported jsonrpc version: {version}")]
    UnsupportedVersion {
        /// The version the peer sent
        version: String,
    },

    /// The underlying stream failed. Terminal for the connection.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl FramingError {
    /// Stable name for log fields.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::FrameTooLarge { .. } => "frame_too_large",
            Self::MalformedFrame { .. } => "malformed_frame",
            Self::UnsupportedBatch => "unsupported_batch",
            Self::MissingVersion => "missing_version",
            Self::UnsupportedVersion { .. } => "unsupported_version",
            Self::Io(_) => "io",
        }
    }

    /// True when the reader loop should continue after this fault.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// A parsed inbound frame: the classified message plus its `params`.
#[derive(Debug)]
pub struct Frame {
    /// Classified message kind (request, response, or notification).
    pub kind: MessageKind,
    /// The `params` field, extracted so the dispatcher need not re-parse.
    pub params: Option<Value>,
}

/// Parse one NDJSON line into a [`Frame`].
///
/// Size is checked before JSON parsing; arrays are rejected (batch
/// requests are not part of the protocol here); the version and shape
/// checks run via [`classify`].
pub fn parse_frame(line: &str) -> Result<Frame, FramingError> {
    if line.len() > MAX_FRAME_BYTES {
        return Err(FramingError::FrameTooLarge {
            max_bytes: MAX_FRAME_BYTES,
        });
    }

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(FramingError::MalformedFrame {
            reason: "empty frame".to_string(),
        });
    }

    let mut value: Value =
        serde_json::from_str(trimmed).map_err(|e| FramingError::MalformedFrame {
            reason: e.to_string(),
        })?;

    if value.is_array() {
        return Err(FramingError::UnsupportedBatch);
    }

    let kind = classify(&value).map_err(|e| match e {
        ClassifyError::InvalidVersion => match value.get("jsonrpc").and_then(Value::as_str) {
            Some(v) => FramingError::UnsupportedVersion {
                version: v.to_string(),
            },
            None => FramingError::MissingVersion,
        },
        ClassifyError::InvalidId => FramingError::MalformedFrame {
            reason: "invalid id field".to_string(),
        },
        ClassifyError::Unclassifiable => FramingError::MalformedFrame {
            reason: "message has neither id nor method".to_string(),
        },
    })?;

    let params = value.as_object_mut().and_then(|obj| obj.remove("params"));

    Ok(Frame { kind, params })
}

/// Read one newline-terminated line with a byte cap.
///
/// Unlike `read_until`, an oversized line is drained (to keep the reader
/// usable for the next frame) and reported instead of buffered without
/// bound. Returns the number of bytes appended; 0 means EOF.
pub async fn bounded_read_line<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_bytes: usize,
) -> Result<usize, FramingError> {
    let mut total = 0usize;
    loop {
        let available = reader.fill_buf().await.map_err(FramingError::Io)?;

        if available.is_empty() {
            return Ok(total);
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let to_consume = pos + 1;
                if total + to_consume > max_bytes {
                    reader.consume(to_consume);
                    return Err(FramingError::FrameTooLarge { max_bytes });
                }
                buf.extend_from_slice(&available[..to_consume]);
                total += to_consume;
                reader.consume(to_consume);
                return Ok(total);
            }
            None => {
                let len = available.len();
                if total + len > max_bytes {
                    reader.consume(len);
                    drain_until_newline(reader).await;
                    return Err(FramingError::FrameTooLarge { max_bytes });
                }
                buf.extend_from_slice(available);
                total += len;
                reader.consume(len);
            }
        }
    }
}

/// Discard the rest of an oversized line so the next read starts clean.
async fn drain_until_newline<R: tokio::io::AsyncBufRead + Unpin>(reader: &mut R) {
    loop {
        let available = match reader.fill_buf().await {
            Ok(buf) => buf,
            Err(_) => return,
        };
        if available.is_empty() {
            return;
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return;
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}
