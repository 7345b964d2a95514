use std::env;

/// Hub-side tunables. All read from environment variables with sensible
/// defaults.
///
/// Environment variables:
/// - `HUB_MAX_WAIT_MS` — Ceiling on the `timeout_ms` a wait call may request (default: 60000)
/// - `HUB_MENTION_BUFFER_CAP` — Soft cap per agent mention buffer, oldest dropped beyond it (default: 1024)
/// - `HUB_RECONNECT_GRACE_MS` — How long a detached agent keeps its registration and buffer (default: 30000)
/// - `HUB_HEARTBEAT_SECS` — Spacing of heartbeat frames on the push channel (default: 12)
/// - `HUB_DEDUP_WINDOW_MS` — Retry-dedup window for correlation ids (default: 30000)
/// - `HUB_PRIVACY_KEY` — When set, session opens must present the matching key
/// - `HUB_STRICT_DUPLICATES` — `1`/`true` rejects a second open for a live agent id
///   instead of displacing the older session
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Ceiling on `waitForMentions` timeouts (`T_max`).
    pub max_wait_ms: u64,
    /// Max deliveries drained by a single wait call.
    pub wait_drain_cap: usize,
    /// Soft cap on each agent's mention buffer.
    pub mention_buffer_cap: usize,
    /// Grace window before a detached agent is evicted.
    pub reconnect_grace_ms: u64,
    /// Heartbeat spacing on the push channel.
    pub heartbeat_secs: u64,
    /// Per-session push channel capacity; a saturated channel terminates the session.
    pub push_channel_cap: usize,
    /// Correlation-id dedup window.
    pub dedup_window_ms: u64,
    /// Shared session key; `None` disables the check.
    pub privacy_key: Option<String>,
    /// Reject rather than displace a duplicate agent id.
    pub strict_duplicates: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: 60_000,
            wait_drain_cap: 64,
            mention_buffer_cap: 1024,
            reconnect_grace_ms: 30_000,
            heartbeat_secs: 12,
            push_channel_cap: 256,
            dedup_window_ms: 30_000,
            privacy_key: None,
            strict_duplicates: false,
        }
    }
}

impl HubConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("HUB_MAX_WAIT_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.max_wait_ms = n;
        }
        if let Ok(val) = env::var("HUB_MENTION_BUFFER_CAP")
            && let Ok(n) = val.parse::<usize>()
        {
            config.mention_buffer_cap = n;
        }
        if let Ok(val) = env::var("HUB_RECONNECT_GRACE_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.reconnect_grace_ms = n;
        }
        if let Ok(val) = env::var("HUB_HEARTBEAT_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.heartbeat_secs = n;
        }
        if let Ok(val) = env::var("HUB_DEDUP_WINDOW_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.dedup_window_ms = n;
        }
        if let Ok(val) = env::var("HUB_PRIVACY_KEY")
            && !val.is_empty()
        {
            config.privacy_key = Some(val);
        }
        if let Ok(val) = env::var("HUB_STRICT_DUPLICATES") {
            config.strict_duplicates = val == "1" || val.to_lowercase() == "true";
        }

        config
    }
}
