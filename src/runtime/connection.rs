use crate::wire::{Frame, SseDecoder};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::client::HubClient;
use super::error::ClientError;

/// Why a stream read ended.
enum StreamEnd {
    /// Another process opened a session under our agent id. Terminal:
    /// reconnecting would just fight it for the identity.
    Displaced,
    /// The hub closed the session deliberately. Terminal.
    Closed,
    /// Channel broke or a malformed frame arrived; reconnect with backoff.
    Broken(String),
}

/// A live attachment to the hub: the session plus the background task that
/// pumps the push channel and reconnects across transport drops.
///
/// Dropping the connection aborts the pump task, so a crashing caller never
/// leaks a reader.
pub struct Connection {
    /// Decoded push frames (heartbeats included). Bounded; slow consumers
    /// lose frames rather than stalling the pump.
    pub frames: mpsc::Receiver<Frame>,
    handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Exponential backoff step: 1s, 2s, 4s, … capped.
pub fn next_backoff(current: Duration, cap: Duration) -> Duration {
    (current * 2).min(cap)
}

/// Open the session and start the push-channel pump. The first open must
/// succeed; later drops are retried forever (until displaced) with capped
/// exponential backoff, always under the same `agent_id` — peers route by
/// agent id, so the changing session id is invisible to them.
pub async fn connect(client: Arc<HubClient>) -> Result<Connection, ClientError> {
    client.open_session().await?;
    let (tx, rx) = mpsc::channel(64);
    let handle = tokio::spawn(pump(client, tx));
    Ok(Connection { frames: rx, handle })
}

async fn pump(client: Arc<HubClient>, tx: mpsc::Sender<Frame>) {
    let cap = Duration::from_millis(client.config().reconnect_max_backoff_ms.max(1000));
    let mut backoff = Duration::from_secs(1);

    loop {
        let Some(session_id) = client.session_id() else {
            break;
        };

        match read_stream(&client, &session_id, &tx).await {
            StreamEnd::Displaced => {
                eprintln!(
                    "⚠️  {} displaced by another session; stopping reconnects",
                    client.agent_id()
                );
                break;
            }
            StreamEnd::Closed => break,
            StreamEnd::Broken(reason) => {
                eprintln!(
                    "🔌 {} stream dropped ({reason}); reconnecting in {:?}",
                    client.agent_id(),
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff, cap);
                // Reopen under the same identity. Within the grace window
                // this reattaches the buffered mentions.
                if client.open_session().await.is_ok() {
                    backoff = Duration::from_secs(1);
                }
            }
        }
    }
}

async fn read_stream(client: &HubClient, session_id: &str, tx: &mpsc::Sender<Frame>) -> StreamEnd {
    let resp = match client.open_stream(session_id).await {
        Ok(resp) => resp,
        Err(e) => return StreamEnd::Broken(e.to_string()),
    };

    let mut stream = resp.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return StreamEnd::Broken(e.to_string()),
        };
        for event in decoder.feed(&String::from_utf8_lossy(&chunk)) {
            if event.data.is_empty() {
                continue;
            }
            match Frame::decode(&event.data) {
                Ok(Some(Frame::Displaced { .. })) => return StreamEnd::Displaced,
                Ok(Some(Frame::SessionClosed { .. })) => return StreamEnd::Closed,
                Ok(Some(frame)) => {
                    // Observers that fall behind lose frames; the pump never
                    // blocks on them.
                    let _ = tx.try_send(frame);
                }
                Ok(None) => {} // unknown kind: ignore (forward compat)
                Err(e) => return StreamEnd::Broken(format!("protocol error: {e}")),
            }
        }
    }

    StreamEnd::Broken("stream ended".to_string())
}
