use std::env;

/// Keepalive policy. `Off` is the right default on developer workstations;
/// deployments behind idle-pruning fabrics run `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepaliveMode {
    #[default]
    Off,
    Active,
}

impl KeepaliveMode {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "active" => Self::Active,
            _ => Self::Off,
        }
    }
}

/// Client-runtime configuration. All read from environment variables with
/// sensible defaults.
///
/// Environment variables:
/// - `HUB_URL` — base coordination endpoint (default: `http://127.0.0.1:8000`)
/// - `AGENT_ID` — stable identity of this agent process
/// - `AGENT_DESCRIPTION` — human description advertised to peers
/// - `AGENT_CAPABILITIES` — comma-separated capability tags
/// - `APPLICATION_ID` / `PRIVACY_KEY` — application scoping tuple
/// - `WAIT_FOR_AGENTS` — advisory minimum peer count before real work starts
/// - `KEEPALIVE_MODE` — `off` or `active`
/// - `KEEPALIVE_INTERVAL_MS` — ping spacing; must beat the fabric's
///   idle-prune window (empirically 5000 ms on the target cloud, so 3000)
/// - `WAIT_TIMEOUT_MS` — per-wait budget; should stay ≤ interval + 1000 so a
///   wait in flight plus pings still defeats the prune window
/// - `RECONNECT_MAX_BACKOFF_MS` — cap on reconnect backoff
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub hub_url: String,
    pub agent_id: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub application_id: String,
    pub privacy_key: Option<String>,
    pub wait_for_agents: u32,
    pub keepalive_mode: KeepaliveMode,
    pub keepalive_interval_ms: u64,
    pub wait_timeout_ms: u64,
    pub reconnect_max_backoff_ms: u64,
    /// Pause between empty waits in the dispatch loop.
    pub idle_backoff_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            hub_url: "http://127.0.0.1:8000".to_string(),
            agent_id: "agent".to_string(),
            description: String::new(),
            capabilities: Vec::new(),
            application_id: "default".to_string(),
            privacy_key: None,
            wait_for_agents: 0,
            keepalive_mode: KeepaliveMode::Off,
            keepalive_interval_ms: 3000,
            wait_timeout_ms: 4000,
            reconnect_max_backoff_ms: 16_000,
            idle_backoff_ms: 1000,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("HUB_URL")
            && !val.is_empty()
        {
            config.hub_url = val.trim_end_matches('/').to_string();
        }
        if let Ok(val) = env::var("AGENT_ID")
            && !val.is_empty()
        {
            config.agent_id = val;
        }
        if let Ok(val) = env::var("AGENT_DESCRIPTION") {
            config.description = val;
        }
        if let Ok(val) = env::var("AGENT_CAPABILITIES") {
            config.capabilities = val
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Ok(val) = env::var("APPLICATION_ID")
            && !val.is_empty()
        {
            config.application_id = val;
        }
        if let Ok(val) = env::var("PRIVACY_KEY")
            && !val.is_empty()
        {
            config.privacy_key = Some(val);
        }
        if let Ok(val) = env::var("WAIT_FOR_AGENTS")
            && let Ok(n) = val.parse::<u32>()
        {
            config.wait_for_agents = n;
        }
        if let Ok(val) = env::var("KEEPALIVE_MODE") {
            config.keepalive_mode = KeepaliveMode::parse(&val);
        }
        if let Ok(val) = env::var("KEEPALIVE_INTERVAL_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.keepalive_interval_ms = n;
        }
        if let Ok(val) = env::var("WAIT_TIMEOUT_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.wait_timeout_ms = n;
        }
        if let Ok(val) = env::var("RECONNECT_MAX_BACKOFF_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.reconnect_max_backoff_ms = n;
        }

        config
    }
}
