use crate::models::MentionDelivery;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

use super::client::HubClient;
use super::error::{ApiErrorKind, ClientError};

/// The expensive decision-maker behind an agent — typically a language-model
/// call. The dispatch loop invokes it with batches of at least one delivery,
/// never with an empty batch.
#[async_trait]
pub trait AgentBrain: Send + Sync {
    async fn handle(
        &self,
        batch: &[MentionDelivery],
    ) -> Result<Vec<OutboundAction>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Tool-surface operations a brain may request in response to a batch.
#[derive(Debug, Clone)]
pub enum OutboundAction {
    SendMessage {
        thread_id: String,
        body: String,
        mentions: Vec<String>,
    },
    CreateThread {
        name: String,
        participants: Vec<String>,
    },
    AddParticipant {
        thread_id: String,
        agent_id: String,
    },
    RemoveParticipant {
        thread_id: String,
        agent_id: String,
    },
    CloseThread {
        thread_id: String,
    },
}

/// The cost-gated wait → dispatch → respond loop.
///
/// Owning the loop owns the agent's only wait call, which is how the
/// single-flight rule is enforced client-side. Brain failures are contained
/// here: they are logged and reported back to the originating thread so the
/// coordinator never hangs silently, and they never kill the loop.
pub struct DispatchLoop {
    client: Arc<HubClient>,
    brain: Arc<dyn AgentBrain>,
    wait_timeout_ms: u64,
    idle_backoff: Duration,
    shutdown: watch::Receiver<bool>,
}

impl DispatchLoop {
    pub fn new(
        client: Arc<HubClient>,
        brain: Arc<dyn AgentBrain>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let config = client.config();
        Self {
            wait_timeout_ms: config.wait_timeout_ms,
            idle_backoff: Duration::from_millis(config.idle_backoff_ms),
            client,
            brain,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        println!("🧠 Dispatch loop started for {}", self.client.agent_id());

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let result = tokio::select! {
                _ = self.shutdown.changed() => break,
                result = self.client.wait_for_mentions(self.wait_timeout_ms) => result,
            };

            match result {
                Ok(batch) if batch.is_empty() => {
                    // Normal outcome, not a failure. Breathe, then wait again.
                    self.idle_sleep().await;
                }
                Ok(batch) => self.handle_batch(&batch).await,
                Err(ClientError::Api {
                    kind: ApiErrorKind::TimeoutTooLarge,
                    max_wait_ms,
                    ..
                }) => {
                    let clamped = max_wait_ms.unwrap_or(60_000).min(self.wait_timeout_ms);
                    eprintln!(
                        "⚠️  Wait budget {} exceeds hub ceiling; clamping to {clamped}",
                        self.wait_timeout_ms
                    );
                    self.wait_timeout_ms = clamped;
                }
                Err(ClientError::Api {
                    kind: ApiErrorKind::WaitAlreadyActive,
                    ..
                }) => {
                    // Something else is waiting on our agent id. That is a
                    // client bug to fix upstream, not a reason to spin.
                    eprintln!("⚠️  Concurrent wait detected for {}", self.client.agent_id());
                    self.idle_sleep().await;
                }
                Err(e) => {
                    // Transport trouble: the connection manager is already
                    // reconnecting; don't hammer the hub meanwhile.
                    eprintln!("⚠️  Wait failed: {e}");
                    self.idle_sleep().await;
                }
            }
        }

        println!("🧠 Dispatch loop stopped for {}", self.client.agent_id());
    }

    async fn handle_batch(&self, batch: &[MentionDelivery]) {
        match self.brain.handle(batch).await {
            Ok(actions) => {
                for action in actions {
                    if let Err(e) = self.execute(action).await {
                        eprintln!("⚠️  Outbound action failed: {e}");
                    }
                }
            }
            Err(e) => {
                eprintln!("⚠️  Brain failed on a batch of {}: {e}", batch.len());
                // Best-effort error reply so the sender isn't left hanging.
                if let Some(first) = batch.first() {
                    let body = format!(
                        "@{} {} hit an error handling this mention: {e}",
                        first.sender,
                        self.client.agent_id()
                    );
                    let _ = self
                        .client
                        .send_message(&first.thread_id, &body, &[first.sender.clone()])
                        .await;
                }
            }
        }
    }

    async fn execute(&self, action: OutboundAction) -> Result<(), ClientError> {
        match action {
            OutboundAction::SendMessage {
                thread_id,
                body,
                mentions,
            } => {
                self.client
                    .send_message(&thread_id, &body, &mentions)
                    .await?;
            }
            OutboundAction::CreateThread { name, participants } => {
                self.client.create_thread(&name, &participants).await?;
            }
            OutboundAction::AddParticipant {
                thread_id,
                agent_id,
            } => {
                self.client.add_participant(&thread_id, &agent_id).await?;
            }
            OutboundAction::RemoveParticipant {
                thread_id,
                agent_id,
            } => {
                self.client
                    .remove_participant(&thread_id, &agent_id)
                    .await?;
            }
            OutboundAction::CloseThread { thread_id } => {
                self.client.close_thread(&thread_id).await?;
            }
        }
        Ok(())
    }

    async fn idle_sleep(&mut self) {
        tokio::select! {
            _ = tokio::time::sleep(self.idle_backoff) => {}
            _ = self.shutdown.changed() => {}
        }
    }
}
