use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AgentSummary {
    pub agent_id: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_agents: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention_buffer_depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions_dropped: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenSessionResponse {
    pub session_id: String,
    pub agent_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub message_id: String,
    pub thread_id: String,
    pub sender: String,
    pub body: String,
    pub mentions: Vec<String>,
    pub posted_at: String,
    pub seq: i64,
}

/// One addressed-work record handed to a mentioned agent by a wait call.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MentionDelivery {
    pub thread_id: String,
    pub thread_name: String,
    pub message_id: String,
    pub sender: String,
    pub body: String,
    pub posted_at: String,
    pub seq: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ThreadParticipant {
    pub agent_id: String,
    pub departed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ThreadInfo {
    pub thread_id: String,
    pub name: String,
    pub created_by: String,
    pub created_at: String,
    pub closed: bool,
    pub participants: Vec<ThreadParticipant>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ThreadCreated {
    pub thread_id: String,
}

// --- Request bodies ---

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateThread {
    pub name: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddParticipant {
    pub agent_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessage {
    pub body: String,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WaitRequest {
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WaitResponse {
    pub deliveries: Vec<MentionDelivery>,
    pub count: usize,
}
