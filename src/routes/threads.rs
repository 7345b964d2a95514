use crate::db::{Db, row_to_message};
use crate::dedup::CorrelationCache;
use crate::models::*;
use crate::registry::SessionRegistry;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post};
use rusqlite::params;

use super::{SessionAuth, api_error};

type ApiResult<T> = Result<Json<T>, (Status, Json<serde_json::Value>)>;

#[post("/api/v1/threads", format = "json", data = "<body>")]
pub fn create_thread(
    db: &State<Db>,
    registry: &State<SessionRegistry>,
    dedup: &State<CorrelationCache>,
    auth: SessionAuth,
    body: Json<CreateThread>,
) -> ApiResult<ThreadCreated> {
    let name = body.name.trim().to_string();
    if name.is_empty() || name.len() > 100 {
        return Err(api_error(
            Status::BadRequest,
            "bad_request",
            "Thread name must be 1-100 characters",
        ));
    }

    // Creator is always a participant.
    let mut participants: Vec<String> = vec![auth.agent_id.clone()];
    for p in &body.participants {
        let p = p.trim().to_string();
        if !p.is_empty() && !participants.contains(&p) {
            participants.push(p);
        }
    }

    // Every participant must be currently registered.
    for p in &participants {
        if !registry.is_registered(p) {
            return Err(api_error(
                Status::NotFound,
                "unknown_agent",
                &format!("Agent '{p}' is not registered"),
            ));
        }
    }

    if let Some(corr) = body.correlation_id.as_deref()
        && let Some(prev) = dedup.get(&auth.agent_id, corr)
    {
        return Ok(Json(ThreadCreated { thread_id: prev }));
    }

    let thread_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let conn = db.conn();
    conn.execute(
        "INSERT INTO threads (id, name, created_by, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![&thread_id, &name, &auth.agent_id, &now],
    )
    .map_err(|e| {
        api_error(
            Status::InternalServerError,
            "internal",
            &e.to_string(),
        )
    })?;
    for p in &participants {
        conn.execute(
            "INSERT INTO thread_participants (thread_id, agent_id, added_at) VALUES (?1, ?2, ?3)",
            params![&thread_id, p, &now],
        )
        .ok();
    }
    drop(conn);

    if let Some(corr) = body.correlation_id.as_deref() {
        dedup.put(&auth.agent_id, corr, &thread_id);
    }

    Ok(Json(ThreadCreated { thread_id }))
}

#[get("/api/v1/threads/<thread_id>")]
pub fn get_thread(db: &State<Db>, _auth: SessionAuth, thread_id: &str) -> ApiResult<ThreadInfo> {
    let conn = db.conn();

    let (name, created_by, created_at, closed_at): (String, String, String, Option<String>) = conn
        .query_row(
            "SELECT name, created_by, created_at, closed_at FROM threads WHERE id = ?1",
            params![thread_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .map_err(|_| api_error(Status::NotFound, "unknown_thread", "Thread not found"))?;

    let participants: Vec<ThreadParticipant> = {
        let mut stmt = conn
            .prepare(
                "SELECT agent_id, departed_at FROM thread_participants WHERE thread_id = ?1 ORDER BY added_at ASC",
            )
            .map_err(|e| api_error(Status::InternalServerError, "internal", &e.to_string()))?;
        stmt.query_map(params![thread_id], |row| {
            Ok(ThreadParticipant {
                agent_id: row.get(0)?,
                departed: row.get::<_, Option<String>>(1)?.is_some(),
            })
        })
        .map_err(|e| api_error(Status::InternalServerError, "internal", &e.to_string()))?
        .filter_map(|r| r.ok())
        .collect()
    };

    let messages: Vec<Message> = {
        let mut stmt = conn
            .prepare(
                "SELECT id, thread_id, sender, body, mentions, created_at, seq FROM messages WHERE thread_id = ?1 ORDER BY seq ASC",
            )
            .map_err(|e| api_error(Status::InternalServerError, "internal", &e.to_string()))?;
        stmt.query_map(params![thread_id], row_to_message)
            .map_err(|e| api_error(Status::InternalServerError, "internal", &e.to_string()))?
            .filter_map(|r| r.ok())
            .collect()
    };

    Ok(Json(ThreadInfo {
        thread_id: thread_id.to_string(),
        name,
        created_by,
        created_at,
        closed: closed_at.is_some(),
        participants,
        messages,
    }))
}

#[post(
    "/api/v1/threads/<thread_id>/participants",
    format = "json",
    data = "<body>"
)]
pub fn add_participant(
    db: &State<Db>,
    registry: &State<SessionRegistry>,
    auth: SessionAuth,
    thread_id: &str,
    body: Json<AddParticipant>,
) -> ApiResult<serde_json::Value> {
    let agent_id = body.agent_id.trim().to_string();

    let conn = db.conn();
    require_open_thread(&conn, thread_id)?;
    require_active_participant(&conn, thread_id, &auth.agent_id)?;

    if !registry.is_registered(&agent_id) {
        return Err(api_error(
            Status::NotFound,
            "unknown_agent",
            &format!("Agent '{agent_id}' is not registered"),
        ));
    }

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO thread_participants (thread_id, agent_id, added_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(thread_id, agent_id) DO UPDATE SET departed_at = NULL",
        params![thread_id, &agent_id, &now],
    )
    .map_err(|e| api_error(Status::InternalServerError, "internal", &e.to_string()))?;

    Ok(Json(serde_json::json!({"ok": true})))
}

#[delete("/api/v1/threads/<thread_id>/participants/<agent_id>")]
pub fn remove_participant(
    db: &State<Db>,
    auth: SessionAuth,
    thread_id: &str,
    agent_id: &str,
) -> ApiResult<serde_json::Value> {
    let conn = db.conn();
    require_open_thread(&conn, thread_id)?;
    require_active_participant(&conn, thread_id, &auth.agent_id)?;
    require_active_participant(&conn, thread_id, agent_id)?;

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE thread_participants SET departed_at = ?1 WHERE thread_id = ?2 AND agent_id = ?3",
        params![&now, thread_id, agent_id],
    )
    .map_err(|e| api_error(Status::InternalServerError, "internal", &e.to_string()))?;

    // Removing the last active participant closes the thread.
    let remaining: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM thread_participants WHERE thread_id = ?1 AND departed_at IS NULL",
            params![thread_id],
            |r| r.get(0),
        )
        .unwrap_or(0);
    let mut thread_closed = false;
    if remaining == 0 {
        conn.execute(
            "UPDATE threads SET closed_at = ?1 WHERE id = ?2 AND closed_at IS NULL",
            params![&now, thread_id],
        )
        .ok();
        thread_closed = true;
    }

    Ok(Json(
        serde_json::json!({"ok": true, "thread_closed": thread_closed}),
    ))
}

/// Idempotent: closing a closed thread succeeds without effect.
#[post("/api/v1/threads/<thread_id>/close")]
pub fn close_thread(
    db: &State<Db>,
    auth: SessionAuth,
    thread_id: &str,
) -> ApiResult<serde_json::Value> {
    let conn = db.conn();

    let closed_at: Option<String> = conn
        .query_row(
            "SELECT closed_at FROM threads WHERE id = ?1",
            params![thread_id],
            |r| r.get(0),
        )
        .map_err(|_| api_error(Status::NotFound, "unknown_thread", "Thread not found"))?;

    if closed_at.is_some() {
        return Ok(Json(serde_json::json!({"ok": true, "already_closed": true})));
    }

    require_active_participant(&conn, thread_id, &auth.agent_id)?;

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE threads SET closed_at = ?1 WHERE id = ?2",
        params![&now, thread_id],
    )
    .map_err(|e| api_error(Status::InternalServerError, "internal", &e.to_string()))?;

    Ok(Json(serde_json::json!({"ok": true, "already_closed": false})))
}

// --- Shared thread-store validation ---

pub(super) fn require_open_thread(
    conn: &rusqlite::Connection,
    thread_id: &str,
) -> Result<(), (Status, Json<serde_json::Value>)> {
    let closed_at: Option<String> = conn
        .query_row(
            "SELECT closed_at FROM threads WHERE id = ?1",
            params![thread_id],
            |r| r.get(0),
        )
        .map_err(|_| api_error(Status::NotFound, "unknown_thread", "Thread not found"))?;
    if closed_at.is_some() {
        return Err(api_error(
            Status::Conflict,
            "thread_closed",
            "Thread is closed",
        ));
    }
    Ok(())
}

pub(super) fn require_active_participant(
    conn: &rusqlite::Connection,
    thread_id: &str,
    agent_id: &str,
) -> Result<(), (Status, Json<serde_json::Value>)> {
    let active: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM thread_participants WHERE thread_id = ?1 AND agent_id = ?2 AND departed_at IS NULL",
            params![thread_id, agent_id],
            |r| r.get::<_, i64>(0),
        )
        .map(|c| c > 0)
        .unwrap_or(false);
    if !active {
        return Err(api_error(
            Status::Forbidden,
            "not_a_participant",
            &format!("Agent '{agent_id}' is not a participant in this thread"),
        ));
    }
    Ok(())
}
