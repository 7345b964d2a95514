use crate::models::AgentSummary;
use tokio::sync::broadcast;

/// Registry-change events fanned out to every attached push channel.
#[derive(Debug, Clone)]
pub enum HubEvent {
    AgentJoined(AgentSummary),
    AgentLeft { agent_id: String, reason: String },
}

pub struct EventBus {
    pub sender: broadcast::Sender<HubEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        EventBus { sender }
    }

    pub fn publish(&self, event: HubEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }
}
