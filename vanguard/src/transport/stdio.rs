//! Single-peer stream transport: NDJSON over a duplex byte stream.
//!
//! The read loop is sequential — one frame is dispatched and answered
//! before the next is read. A single stdio peer that wants pipelining can
//! open the socket transport instead. Malformed frames are logged and
//! dropped; only an I/O failure or EOF ends the loop.
//!
//! [`run_stream`] is generic over the byte stream so tests can drive it
//! through an in-memory duplex pipe; [`run_stdio`] binds it to the
//! process's stdin/stdout. Logs go to stderr — stdout belongs to the
//! protocol.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::transport::{FramingError, MAX_FRAME_BYTES, bounded_read_line, parse_frame};

/// Drive the dispatcher over an arbitrary duplex byte stream until EOF.
pub async fn run_stream<R, W>(
    mut reader: R,
    mut writer: W,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), std::io::Error>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw_buf = Vec::new();

    loop {
        raw_buf.clear();

        let bytes_read = match bounded_read_line(&mut reader, &mut raw_buf, MAX_FRAME_BYTES).await {
            Ok(n) => n,
            Err(FramingError::Io(e)) => return Err(e),
            Err(e) => {
                warn!(error_type = e.error_type(), error = %e, "dropping malformed frame");
                continue;
            }
        };

        if bytes_read == 0 {
            debug!("stream EOF");
            return Ok(());
        }

        // Strict UTF-8: lossy conversion would silently corrupt message
        // content with replacement characters.
        let line = match std::str::from_utf8(&raw_buf) {
            Ok(s) => s,
            Err(_) => {
                warn!(len = raw_buf.len(), "dropping non-UTF-8 frame");
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let frame = match parse_frame(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error_type = e.error_type(), error = %e, "dropping malformed frame");
                continue;
            }
        };

        if let Some(response) = dispatcher.dispatch(frame.kind, frame.params).await {
            writer.write_all(response.to_line().as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }
}

/// Run the gateway over the process's stdin/stdout until EOF.
pub async fn run_stdio(dispatcher: Arc<Dispatcher>) -> Result<(), std::io::Error> {
    info!("gateway listening on stdio");
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    run_stream(reader, writer, dispatcher).await
}
