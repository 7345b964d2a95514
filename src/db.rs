use rusqlite::{Connection, params};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::Message;

/// Generate an opaque session id: `sess_<32 hex chars>`
pub fn generate_session_id() -> String {
    format!("sess_{:032x}", uuid::Uuid::new_v4().as_u128())
}

/// In-memory thread store. Threads and their logs live exactly as long as the
/// hub process; nothing is persisted across restarts.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn new_in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("Failed to open in-memory database");
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .expect("Failed to set pragmas");
        let db = Db {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate();
        db
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) {
        let conn = self.conn();
        conn.execute_batch(
            "CREATE TABLE threads (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                closed_at TEXT
            );

            CREATE TABLE thread_participants (
                thread_id TEXT NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
                agent_id TEXT NOT NULL,
                added_at TEXT NOT NULL,
                departed_at TEXT,
                PRIMARY KEY (thread_id, agent_id)
            );
            CREATE INDEX idx_participants_agent ON thread_participants(agent_id);

            CREATE TABLE messages (
                id TEXT PRIMARY KEY,
                thread_id TEXT NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
                sender TEXT NOT NULL,
                body TEXT NOT NULL,
                mentions TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                seq INTEGER NOT NULL
            );
            CREATE INDEX idx_messages_thread_seq ON messages(thread_id, seq);
            CREATE INDEX idx_messages_seq ON messages(seq);",
        )
        .expect("Failed to run migrations");
    }
}

/// Map a full `messages` row (id, thread_id, sender, body, mentions,
/// created_at, seq) to a [`Message`].
pub fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let mentions_str: String = row.get(4)?;
    Ok(Message {
        message_id: row.get(0)?,
        thread_id: row.get(1)?,
        sender: row.get(2)?,
        body: row.get(3)?,
        mentions: serde_json::from_str(&mentions_str).unwrap_or_default(),
        posted_at: row.get(5)?,
        seq: row.get(6)?,
    })
}

/// Mark an agent as departed in every thread it is still active in. The
/// threads themselves remain; the agent's prior messages keep their sender.
pub fn mark_departed(conn: &Connection, agent_id: &str) {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE thread_participants SET departed_at = ?1 WHERE agent_id = ?2 AND departed_at IS NULL",
        params![&now, agent_id],
    )
    .ok();
}
