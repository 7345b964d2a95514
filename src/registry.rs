use crate::config::HubConfig;
use crate::db::{self, Db};
use crate::events::HubEvent;
use crate::models::{AgentSummary, MentionDelivery};
use crate::wire::Frame;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Identity handshake carried by a session open.
#[derive(Debug, Clone)]
pub struct OpenParams {
    pub agent_id: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub application_id: String,
    pub wait_for_agents: u32,
}

#[derive(Debug)]
pub struct OpenOutcome {
    pub session_id: String,
    pub displaced: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum OpenError {
    /// Strict mode only: the agent id already has a live session.
    DuplicateAgent,
}

/// Outcome of entering a wait.
pub enum BeginWait {
    /// The buffer had deliveries; they are already drained.
    Ready(Vec<MentionDelivery>),
    /// Nothing buffered; the caller parks on this receiver.
    Parked(oneshot::Receiver<Vec<MentionDelivery>>),
    /// Another wait is already parked for this agent.
    AlreadyActive,
    /// The agent vanished between auth and the wait (eviction race).
    UnknownAgent,
}

struct AgentEntry {
    agent_id: String,
    description: String,
    capabilities: Vec<String>,
    application_id: String,
    wait_for_agents: u32,
    session_id: String,
    registered_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    /// Push channel to the attached SSE stream, if one is attached.
    downstream: Option<mpsc::Sender<Frame>>,
    /// When the stream detached (or the entry was created unattached).
    detached_at: Option<DateTime<Utc>>,
    buffer: VecDeque<MentionDelivery>,
    dropped: u64,
    /// At most one parked wait per agent.
    waiter: Option<oneshot::Sender<Vec<MentionDelivery>>>,
}

impl AgentEntry {
    fn summary(&self, details: bool) -> AgentSummary {
        AgentSummary {
            agent_id: self.agent_id.clone(),
            description: self.description.clone(),
            capabilities: self.capabilities.clone(),
            application_id: details.then(|| self.application_id.clone()),
            registered_at: details.then(|| self.registered_at.to_rfc3339()),
            last_activity_at: details.then(|| self.last_activity_at.to_rfc3339()),
            wait_for_agents: details.then_some(self.wait_for_agents),
            connected: details.then_some(self.downstream.is_some()),
            mention_buffer_depth: details.then_some(self.buffer.len()),
            mentions_dropped: details.then_some(self.dropped),
        }
    }

    fn drain(&mut self, cap: usize) -> Vec<MentionDelivery> {
        let n = self.buffer.len().min(cap);
        self.buffer.drain(..n).collect()
    }
}

/// The hub's map of live agents: session identity, push channels, mention
/// buffers and parked waits, all behind one lock that is never held across a
/// suspension point.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<String, AgentEntry>>>,
    buffer_cap: usize,
    push_channel_cap: usize,
    strict_duplicates: bool,
}

impl SessionRegistry {
    pub fn new(config: &HubConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            buffer_cap: config.mention_buffer_cap,
            push_channel_cap: config.push_channel_cap,
            strict_duplicates: config.strict_duplicates,
        }
    }

    /// Install a session for `params.agent_id`. A live session for the same
    /// agent id is displaced: its push channel gets a `displaced` frame and
    /// closes, its parked wait completes empty, but its mention buffer and
    /// drop counter carry over. That carry-over is also the reconnect path —
    /// an agent that lost its stream and reopens within the grace window gets
    /// its undrained deliveries back.
    pub fn open(&self, params: OpenParams) -> Result<OpenOutcome, OpenError> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        let session_id = db::generate_session_id();

        if let Some(existing) = map.get_mut(&params.agent_id) {
            if self.strict_duplicates {
                return Err(OpenError::DuplicateAgent);
            }
            if let Some(old) = existing.downstream.take() {
                let _ = old.try_send(Frame::Displaced {
                    time: now.to_rfc3339(),
                });
                // Dropping the sender ends the old stream loop.
            }
            existing.waiter = None;
            existing.description = params.description;
            existing.capabilities = params.capabilities;
            existing.application_id = params.application_id;
            existing.wait_for_agents = params.wait_for_agents;
            existing.session_id = session_id.clone();
            existing.last_activity_at = now;
            existing.detached_at = Some(now);
            return Ok(OpenOutcome {
                session_id,
                displaced: true,
            });
        }

        map.insert(
            params.agent_id.clone(),
            AgentEntry {
                agent_id: params.agent_id,
                description: params.description,
                capabilities: params.capabilities,
                application_id: params.application_id,
                wait_for_agents: params.wait_for_agents,
                session_id: session_id.clone(),
                registered_at: now,
                last_activity_at: now,
                downstream: None,
                detached_at: Some(now),
                buffer: VecDeque::new(),
                dropped: 0,
                waiter: None,
            },
        );
        Ok(OpenOutcome {
            session_id,
            displaced: false,
        })
    }

    /// Remove the session and everything that lives with it: registration,
    /// mention buffer, parked wait. Idempotent; returns the agent id when a
    /// live session was actually closed.
    pub fn close(&self, session_id: &str) -> Option<String> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let agent_id = map
            .values()
            .find(|e| e.session_id == session_id)
            .map(|e| e.agent_id.clone())?;
        let mut entry = map.remove(&agent_id)?;
        // A parked wait completes with an empty batch when its sender drops.
        entry.waiter = None;
        if let Some(downstream) = entry.downstream.take() {
            let _ = downstream.try_send(Frame::SessionClosed {
                time: Utc::now().to_rfc3339(),
            });
        }
        Some(agent_id)
    }

    /// Resolve a session id to its agent id.
    pub fn resolve(&self, session_id: &str) -> Option<String> {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.values()
            .find(|e| e.session_id == session_id)
            .map(|e| e.agent_id.clone())
    }

    pub fn is_registered(&self, agent_id: &str) -> bool {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.contains_key(agent_id)
    }

    /// Bump an agent's activity clock. Pings count as activity.
    pub fn touch(&self, agent_id: &str) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = map.get_mut(agent_id) {
            entry.last_activity_at = Utc::now();
        }
    }

    /// Attach an SSE stream to a session, replacing any prior attachment.
    /// Returns the receive end of the push channel plus the agent id.
    pub fn attach_stream(&self, session_id: &str) -> Option<(mpsc::Receiver<Frame>, String)> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let entry = map.values_mut().find(|e| e.session_id == session_id)?;
        let (tx, rx) = mpsc::channel(self.push_channel_cap);
        entry.downstream = Some(tx);
        entry.detached_at = None;
        entry.last_activity_at = Utc::now();
        Some((rx, entry.agent_id.clone()))
    }

    /// Mark a stream as gone, starting the grace clock. No-op if the session
    /// was already displaced or closed.
    pub fn detach_stream(&self, session_id: &str) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = map.values_mut().find(|e| e.session_id == session_id) {
            entry.downstream = None;
            entry.detached_at = Some(Utc::now());
        }
    }

    /// Route one delivery to its target. A parked wait gets it directly;
    /// otherwise it is buffered with oldest-drop overflow.
    pub fn deliver(&self, target: &str, delivery: MentionDelivery) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = map.get_mut(target) else {
            return;
        };
        if let Some(waiter) = entry.waiter.take() {
            match waiter.send(vec![delivery]) {
                Ok(()) => return,
                // The wait timed out between unparking and this send; keep
                // the delivery for the next call.
                Err(batch) => entry.buffer.extend(batch),
            }
        } else {
            entry.buffer.push_back(delivery);
        }
        while entry.buffer.len() > self.buffer_cap {
            entry.buffer.pop_front();
            entry.dropped += 1;
        }
    }

    pub fn begin_wait(&self, agent_id: &str, drain_cap: usize) -> BeginWait {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = map.get_mut(agent_id) else {
            return BeginWait::UnknownAgent;
        };
        if !entry.buffer.is_empty() {
            return BeginWait::Ready(entry.drain(drain_cap));
        }
        if entry.waiter.is_some() {
            return BeginWait::AlreadyActive;
        }
        let (tx, rx) = oneshot::channel();
        entry.waiter = Some(tx);
        BeginWait::Parked(rx)
    }

    /// Tear down a parked wait after its timeout and drain whatever raced in.
    pub fn finish_wait(&self, agent_id: &str, drain_cap: usize) -> Vec<MentionDelivery> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entry) = map.get_mut(agent_id) else {
            return Vec::new();
        };
        entry.waiter = None;
        entry.drain(drain_cap)
    }

    /// Evict agents whose stream has been gone longer than `grace`. Returns
    /// the evicted agent ids.
    pub fn evict_stale(&self, grace: chrono::Duration) -> Vec<String> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        let stale: Vec<String> = map
            .values()
            .filter(|e| {
                e.downstream.is_none()
                    && e.detached_at.is_some_and(|at| now - at > grace)
            })
            .map(|e| e.agent_id.clone())
            .collect();
        for agent_id in &stale {
            // Dropping the entry drops its waiter, completing a parked wait
            // with an empty batch.
            map.remove(agent_id);
        }
        stale
    }

    pub fn snapshot(&self, details: bool) -> Vec<AgentSummary> {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut agents: Vec<AgentSummary> = map.values().map(|e| e.summary(details)).collect();
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        agents
    }

    /// (live agents, buffered deliveries, total dropped) for the stats page.
    pub fn stats(&self) -> (usize, usize, u64) {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let buffered = map.values().map(|e| e.buffer.len()).sum();
        let dropped = map.values().map(|e| e.dropped).sum();
        (map.len(), buffered, dropped)
    }
}

/// Spawns the background task that enforces the reconnect grace window.
/// Evicted agents are marked departed in their threads and announced on the
/// event bus.
pub fn spawn_eviction_task(
    registry: SessionRegistry,
    events: broadcast::Sender<HubEvent>,
    db: Db,
    grace_ms: u64,
) {
    tokio::spawn(async move {
        let grace = chrono::Duration::milliseconds(grace_ms as i64);
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            for agent_id in registry.evict_stale(grace) {
                {
                    let conn = db.conn();
                    db::mark_departed(&conn, &agent_id);
                }
                eprintln!("⏱️  Evicted {agent_id}: no reconnect within grace window");
                let _ = events.send(HubEvent::AgentLeft {
                    agent_id,
                    reason: "evicted".to_string(),
                });
            }
        }
    });
}
