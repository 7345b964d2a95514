use crate::config::HubConfig;
use crate::events::{EventBus, HubEvent};
use crate::registry::SessionRegistry;
use crate::wire::Frame;
use rocket::http::Status;
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::{State, get};
use tokio::time::{Duration, interval};

use super::api_error;

/// RAII guard that marks the session's stream detached when the SSE
/// connection drops, starting the reconnect grace clock.
struct DetachGuard {
    registry: SessionRegistry,
    session_id: String,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        self.registry.detach_stream(&self.session_id);
    }
}

/// The per-session push channel: heartbeats, registry-change notifications,
/// and session-control frames, multiplexed onto one server-sent-event stream.
#[get("/api/v1/session/<session_id>/stream")]
pub fn session_stream(
    registry: &State<SessionRegistry>,
    events: &State<EventBus>,
    config: &State<HubConfig>,
    session_id: &str,
) -> Result<EventStream![], (Status, Json<serde_json::Value>)> {
    let Some((mut session_rx, agent_id)) = registry.attach_stream(session_id) else {
        return Err(api_error(
            Status::Unauthorized,
            "unauthorized",
            "Unknown session",
        ));
    };

    let mut bus_rx = events.sender.subscribe();
    let heartbeat_secs = config.heartbeat_secs;
    let session_id = session_id.to_string();
    let guard = DetachGuard {
        registry: registry.inner().clone(),
        session_id: session_id.clone(),
    };

    Ok(EventStream! {
        // Keep the detach guard alive for the lifetime of the stream. When
        // the client disconnects the guard drops, which starts the grace
        // window for this agent.
        let _guard = guard;

        let connected = Frame::Connected {
            session_id: session_id.clone(),
            agent_id: agent_id.clone(),
            time: chrono::Utc::now().to_rfc3339(),
        };
        yield Event::json(&connected).event(connected.event_name());

        let mut heartbeat = interval(Duration::from_secs(heartbeat_secs));

        loop {
            tokio::select! {
                frame = session_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            let terminal = matches!(
                                frame,
                                Frame::Displaced { .. } | Frame::SessionClosed { .. }
                            );
                            yield Event::json(&frame).event(frame.event_name());
                            if terminal {
                                break;
                            }
                        }
                        // Sender dropped: the session was displaced or closed
                        // without a farewell frame.
                        None => break,
                    }
                }
                ev = bus_rx.recv() => {
                    match ev {
                        Ok(HubEvent::AgentJoined(agent)) if agent.agent_id != agent_id => {
                            let frame = Frame::AgentJoined {
                                agent,
                                time: chrono::Utc::now().to_rfc3339(),
                            };
                            yield Event::json(&frame).event(frame.event_name());
                        }
                        Ok(HubEvent::AgentLeft { agent_id: left, reason }) if left != agent_id => {
                            let frame = Frame::AgentLeft {
                                agent_id: left,
                                reason,
                                time: chrono::Utc::now().to_rfc3339(),
                            };
                            yield Event::json(&frame).event(frame.event_name());
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            // This consumer is the slowest one on the bus.
                            // Terminate the stream rather than deliver a gap;
                            // the client reconnects within the grace window.
                            eprintln!("🐌 {agent_id} lagged {n} frames behind; dropping its stream");
                            break;
                        }
                        _ => {} // own registry event
                    }
                }
                _ = heartbeat.tick() => {
                    let frame = Frame::Heartbeat {
                        time: chrono::Utc::now().to_rfc3339(),
                    };
                    yield Event::json(&frame).event(frame.event_name());
                }
            }
        }
    })
}
