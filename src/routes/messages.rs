use crate::db::Db;
use crate::dedup::CorrelationCache;
use crate::mentions::parse_mentions;
use crate::models::*;
use crate::registry::SessionRegistry;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, post};
use rusqlite::params;

use super::threads::{require_active_participant, require_open_thread};
use super::{SessionAuth, api_error};

/// Append a message and route its mentions.
///
/// The mention set is the union of the explicit list and `@name` tokens in
/// the body. Every validation runs before the append, so a rejected post
/// leaves the thread log untouched.
#[post("/api/v1/threads/<thread_id>/messages", format = "json", data = "<body>")]
pub fn send_message(
    db: &State<Db>,
    registry: &State<SessionRegistry>,
    dedup: &State<CorrelationCache>,
    auth: SessionAuth,
    thread_id: &str,
    body: Json<SendMessage>,
) -> Result<Json<Message>, (Status, Json<serde_json::Value>)> {
    let text = body.body.trim().to_string();
    if text.is_empty() || text.len() > 10_000 {
        return Err(api_error(
            Status::BadRequest,
            "bad_request",
            "Message body must be 1-10000 characters",
        ));
    }

    let mut mentions: Vec<String> = Vec::new();
    for m in body.mentions.iter().map(|m| m.trim().to_string()) {
        if !m.is_empty() && !mentions.contains(&m) {
            mentions.push(m);
        }
    }
    for m in parse_mentions(&text) {
        if !mentions.contains(&m) {
            mentions.push(m);
        }
    }

    let (message, thread_name) = {
        let conn = db.conn();

        require_open_thread(&conn, thread_id)?;
        require_active_participant(&conn, thread_id, &auth.agent_id)?;

        for m in &mentions {
            let active: bool = conn
                .query_row(
                    "SELECT COUNT(*) FROM thread_participants WHERE thread_id = ?1 AND agent_id = ?2 AND departed_at IS NULL",
                    params![thread_id, m],
                    |r| r.get::<_, i64>(0),
                )
                .map(|c| c > 0)
                .unwrap_or(false);
            if !active {
                return Err(api_error(
                    Status::BadRequest,
                    "mention_not_participant",
                    &format!("Mentioned agent '{m}' is not a participant in this thread"),
                ));
            }
        }

        if let Some(corr) = body.correlation_id.as_deref()
            && let Some(prev) = dedup.get(&auth.agent_id, corr)
        {
            // Retried attempt: return the original append, do not route again.
            let message = conn
                .query_row(
                    "SELECT id, thread_id, sender, body, mentions, created_at, seq FROM messages WHERE id = ?1",
                    params![&prev],
                    crate::db::row_to_message,
                )
                .map_err(|e| api_error(Status::InternalServerError, "internal", &e.to_string()))?;
            return Ok(Json(message));
        }

        let thread_name: String = conn
            .query_row(
                "SELECT name FROM threads WHERE id = ?1",
                params![thread_id],
                |r| r.get(0),
            )
            .map_err(|e| api_error(Status::InternalServerError, "internal", &e.to_string()))?;

        // Globally monotone seq: per-thread order plus a cross-thread order
        // for mention buffers.
        let seq: i64 = conn
            .query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM messages", [], |r| {
                r.get(0)
            })
            .unwrap_or(1);

        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO messages (id, thread_id, sender, body, mentions, created_at, seq) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &id,
                thread_id,
                &auth.agent_id,
                &text,
                serde_json::to_string(&mentions).unwrap_or_else(|_| "[]".to_string()),
                &now,
                seq
            ],
        )
        .map_err(|e| api_error(Status::InternalServerError, "internal", &e.to_string()))?;

        (
            Message {
                message_id: id,
                thread_id: thread_id.to_string(),
                sender: auth.agent_id.clone(),
                body: text,
                mentions,
                posted_at: now,
                seq,
            },
            thread_name,
        )
    };

    // Append lock released; hand the message to the mention router. The
    // sender never receives its own mention.
    for target in message.mentions.iter().filter(|m| **m != auth.agent_id) {
        registry.deliver(
            target,
            MentionDelivery {
                thread_id: message.thread_id.clone(),
                thread_name: thread_name.clone(),
                message_id: message.message_id.clone(),
                sender: message.sender.clone(),
                body: message.body.clone(),
                posted_at: message.posted_at.clone(),
                seq: message.seq,
            },
        );
    }

    if let Some(corr) = body.correlation_id.as_deref() {
        dedup.put(&auth.agent_id, corr, &message.message_id);
    }

    Ok(Json(message))
}
