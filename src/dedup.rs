use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Retry-safety cache for non-idempotent operations.
///
/// Clients stamp `create_thread`/`send_message` attempts with a correlation
/// id; a retried attempt inside the window gets the first attempt's result id
/// back instead of a second append. Entries expire after the window; expired
/// entries are swept on insert.
pub struct CorrelationCache {
    inner: Mutex<HashMap<String, (String, Instant)>>,
    window: Duration,
}

impl CorrelationCache {
    pub fn new(window: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Look up the result id recorded for `(agent, correlation_id)`.
    pub fn get(&self, agent_id: &str, correlation_id: &str) -> Option<String> {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&key(agent_id, correlation_id))
            .filter(|(_, at)| at.elapsed() < self.window)
            .map(|(id, _)| id.clone())
    }

    /// Record the result id for `(agent, correlation_id)`.
    pub fn put(&self, agent_id: &str, correlation_id: &str, result_id: &str) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let window = self.window;
        map.retain(|_, (_, at)| at.elapsed() < window);
        map.insert(
            key(agent_id, correlation_id),
            (result_id.to_string(), Instant::now()),
        );
    }
}

fn key(agent_id: &str, correlation_id: &str) -> String {
    format!("{agent_id}:{correlation_id}")
}
