use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior, interval};

use super::client::HubClient;
use super::config::{KeepaliveMode, RuntimeConfig};

/// Spawn the keepalive pinger, if the policy calls for one.
///
/// The deployment fabric prunes channels idle for ~5 s; a cheap
/// `list_agents` every `keepalive_interval_ms` (default 3000) keeps the
/// session continuously hot, and the hub counts each ping as activity.
/// Overlapping a ping with a parked wait on the same session is fine.
///
/// Ping failures are logged and swallowed — nothing that happens in here may
/// take the dispatch loop down.
pub fn spawn(
    client: Arc<HubClient>,
    config: &RuntimeConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Option<tokio::task::JoinHandle<()>> {
    if config.keepalive_mode != KeepaliveMode::Active {
        return None;
    }
    let interval_ms = config.keepalive_interval_ms;

    Some(tokio::spawn(async move {
        println!(
            "💓 Keepalive active for {} (every {interval_ms} ms)",
            client.agent_id()
        );
        let mut ticker = interval(Duration::from_millis(interval_ms.max(100)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = client.list_agents(false).await {
                        eprintln!("⚠️  Keepalive ping failed: {e}");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        println!("💓 Keepalive stopped for {}", client.agent_id());
    }))
}
