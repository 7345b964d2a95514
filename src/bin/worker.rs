//! Minimal worker agent: connects to the hub, keeps its session hot, and
//! echoes every mention back to its sender. Useful as a smoke-test peer and
//! as the skeleton a real agent starts from.

use agent_fabric::models::MentionDelivery;
use agent_fabric::runtime::{
    AgentBrain, DispatchLoop, HubClient, OutboundAction, RuntimeConfig, connect, keepalive,
};
use agent_fabric::wire::Frame;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

struct EchoBrain;

#[async_trait]
impl AgentBrain for EchoBrain {
    async fn handle(
        &self,
        batch: &[MentionDelivery],
    ) -> Result<Vec<OutboundAction>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(batch
            .iter()
            .map(|d| OutboundAction::SendMessage {
                thread_id: d.thread_id.clone(),
                body: format!("@{} echo: {}", d.sender, d.body),
                mentions: vec![d.sender.clone()],
            })
            .collect())
    }
}

#[tokio::main]
async fn main() {
    let config = RuntimeConfig::from_env();
    println!("🤖 {} connecting to {}", config.agent_id, config.hub_url);

    let client = Arc::new(HubClient::new(config.clone()));
    let mut connection = match connect(client.clone()).await {
        Ok(connection) => connection,
        Err(e) => {
            eprintln!("Failed to open session: {e}");
            std::process::exit(1);
        }
    };

    if config.wait_for_agents > 0 {
        println!("⏳ Waiting for {} peers to join", config.wait_for_agents);
        client
            .await_peers(config.wait_for_agents as usize, Duration::from_secs(60))
            .await
            .ok();
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let keepalive_handle = keepalive::spawn(client.clone(), &config, shutdown_rx.clone());

    let dispatch = DispatchLoop::new(client.clone(), Arc::new(EchoBrain), shutdown_rx);
    let dispatch_handle = tokio::spawn(dispatch.run());

    // Narrate registry churn from the push channel.
    let frame_logger = tokio::spawn(async move {
        while let Some(frame) = connection.frames.recv().await {
            match frame {
                Frame::AgentJoined { agent, .. } => println!("👋 {} joined", agent.agent_id),
                Frame::AgentLeft {
                    agent_id, reason, ..
                } => println!("👋 {agent_id} left ({reason})"),
                _ => {}
            }
        }
    });

    tokio::signal::ctrl_c().await.ok();
    println!("👋 Shutting down");

    // Dispatch loop first (drains the in-flight action), keepalive second.
    let _ = shutdown_tx.send(true);
    dispatch_handle.await.ok();
    if let Some(handle) = keepalive_handle {
        handle.await.ok();
    }
    frame_logger.abort();
    client.close_session().await.ok();
}
