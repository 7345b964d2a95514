use crate::models::AgentSummary;
use serde::{Deserialize, Serialize};

/// One request class: which keywords select it, how long the coordinator
/// should wait for the specialist's reply, and which specialist to address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestClass {
    pub class: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub wait_timeout_ms: u64,
    /// Preferred specialist agent id. `None` falls back to capability match.
    #[serde(default)]
    pub specialist: Option<String>,
}

/// Keyword-driven request classification for the coordinator agent.
///
/// The whole policy is data: classes are matched in table order against the
/// lowercased input, and new request classes are added by editing the table
/// (or loading a replacement from JSON), never by editing the dispatch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestClassifier {
    pub classes: Vec<RequestClass>,
    pub fallback: RequestClass,
}

impl Default for RequestClassifier {
    fn default() -> Self {
        let kw = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            classes: vec![
                RequestClass {
                    class: "media-creation".to_string(),
                    keywords: kw(&["song", "music", "compose", "track"]),
                    wait_timeout_ms: 60_000,
                    specialist: Some("media".to_string()),
                },
                RequestClass {
                    class: "news-query".to_string(),
                    keywords: kw(&["news", "latest", "headline"]),
                    wait_timeout_ms: 15_000,
                    specialist: Some("news".to_string()),
                },
                RequestClass {
                    class: "automation".to_string(),
                    keywords: kw(&["upload", "comment", "quota"]),
                    wait_timeout_ms: 30_000,
                    specialist: Some("automation".to_string()),
                },
            ],
            fallback: RequestClass {
                class: "general".to_string(),
                keywords: Vec::new(),
                wait_timeout_ms: 20_000,
                specialist: None,
            },
        }
    }
}

impl RequestClassifier {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// First class whose keywords match the input, else the fallback.
    pub fn classify(&self, input: &str) -> &RequestClass {
        let lowered = input.to_lowercase();
        self.classes
            .iter()
            .find(|c| c.keywords.iter().any(|k| lowered.contains(k.as_str())))
            .unwrap_or(&self.fallback)
    }

    /// Resolve the specialist to mention: the class's configured specialist
    /// when it is live, else the first live peer advertising the class as a
    /// capability.
    pub fn pick_specialist(
        &self,
        class: &RequestClass,
        agents: &[AgentSummary],
        self_id: &str,
    ) -> Option<String> {
        if let Some(preferred) = &class.specialist
            && agents.iter().any(|a| a.agent_id == *preferred)
        {
            return Some(preferred.clone());
        }
        agents
            .iter()
            .find(|a| {
                a.agent_id != self_id && a.capabilities.iter().any(|c| c == &class.class)
            })
            .map(|a| a.agent_id.clone())
    }
}
