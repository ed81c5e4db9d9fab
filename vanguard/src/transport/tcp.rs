//! Socket transport: a TCP listener multiplexing independent peers.
//!
//! Each accepted connection gets its own task, its own [`Dispatcher`]
//! instance, and its own outbound queue — no state is shared between
//! connections except the governed client behind the dispatcher (and with
//! it the process-wide rate limiter). One connection failing, flooding, or
//! closing never affects another.
//!
//! Within a connection, each request is dispatched on its own task, so a
//! slow Platform call does not stall later invocations. Responses are
//! written in completion order; peers needing request order must serialize
//! themselves. When the peer disconnects, in-flight invocations run to
//! completion and their responses are discarded with a distinct
//! "connection closed" condition — not a generic I/O error.

use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vanguard_core::client::ApiClient;

use crate::dispatcher::Dispatcher;
use crate::transport::{FramingError, MAX_FRAME_BYTES, bounded_read_line, parse_frame};

/// Outbound queue depth per connection before senders wait.
const OUTBOUND_QUEUE: usize = 64;

/// Accept connections forever, spawning one isolated task per peer.
pub async fn serve(listener: TcpListener, client: Arc<ApiClient>) -> Result<(), std::io::Error> {
    let local_addr = listener.local_addr()?;
    info!(%local_addr, "gateway listening on tcp");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let conn_id = short_id();
        info!(conn_id = %conn_id, %peer_addr, "connection accepted");

        let client = Arc::clone(&client);
        tokio::spawn(async move {
            handle_connection(stream, client, conn_id.clone()).await;
            info!(conn_id = %conn_id, "connection closed");
        });
    }
}

/// One connection's control loop: read frames, dispatch each on its own
/// task, funnel responses through the outbound queue.
async fn handle_connection(stream: TcpStream, client: Arc<ApiClient>, conn_id: String) {
    let dispatcher = Arc::new(Dispatcher::new(client));
    let (read_half, write_half) = stream.into_split();

    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    let writer = tokio::spawn(write_outbound(write_half, outbound_rx, conn_id.clone()));

    let mut reader = BufReader::new(read_half);
    let mut raw_buf = Vec::new();

    loop {
        raw_buf.clear();

        let bytes_read = match bounded_read_line(&mut reader, &mut raw_buf, MAX_FRAME_BYTES).await {
            Ok(n) => n,
            Err(e) if e.is_recoverable() => {
                warn!(conn_id = %conn_id, error_type = e.error_type(), error = %e, "dropping malformed frame");
                continue;
            }
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "read failed, closing connection");
                break;
            }
        };

        if bytes_read == 0 {
            debug!(conn_id = %conn_id, "peer EOF");
            break;
        }

        let line = match std::str::from_utf8(&raw_buf) {
            Ok(s) => s,
            Err(_) => {
                warn!(conn_id = %conn_id, len = raw_buf.len(), "dropping non-UTF-8 frame");
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let frame = match parse_frame(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(conn_id = %conn_id, error_type = e.error_type(), error = %e, "dropping malformed frame");
                continue;
            }
        };

        // Each invocation runs independently; the admission wait inside the
        // governed client must not block this read loop.
        let dispatcher = Arc::clone(&dispatcher);
        let outbound_tx = outbound_tx.clone();
        let conn_id = conn_id.clone();
        tokio::spawn(async move {
            if let Some(response) = dispatcher.dispatch(frame.kind, frame.params).await {
                if outbound_tx.send(response.to_line()).await.is_err() {
                    // Distinct condition: the peer is gone, the response is
                    // discarded. Not an I/O failure.
                    debug!(conn_id = %conn_id, "connection closed, response discarded");
                }
            }
        });
    }

    // Closing the queue lets the writer drain in-flight responses and exit.
    drop(outbound_tx);
    let _ = writer.await;
}

/// Writer task: drains the outbound queue onto the socket.
async fn write_outbound(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<String>,
    conn_id: String,
) {
    while let Some(line) = outbound_rx.recv().await {
        let write = async {
            write_half.write_all(line.as_bytes()).await?;
            write_half.write_all(b"\n").await?;
            write_half.flush().await
        };
        if let Err(e) = write.await {
            debug!(conn_id = %conn_id, error = %e, "connection closed while writing, discarding remaining responses");
            break;
        }
    }
    // Remaining queued responses (if the write failed) are dropped with the
    // receiver.
}

/// Short connection id for log correlation.
fn short_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_shape() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(short_id(), short_id());
    }
}
