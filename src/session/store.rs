//! SQLite-backed persistence for sessions, messages and personas
//!
//! The store is created once at startup and shared through an `Arc`. Tests
//! use `SessionStore::in_memory()`, which keeps a single pooled connection
//! alive so every query sees the same database.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use tracing::{debug, info};

use crate::providers::Role;
use crate::session::types::{Message, NewMessage, Persona, PersonaInput, Session};
use crate::utils::error::{ConfabError, Result};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS personas (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        avatar TEXT NOT NULL DEFAULT '',
        identity TEXT NOT NULL DEFAULT '',
        appearance TEXT NOT NULL DEFAULT '',
        personality TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    // persona_id carries no foreign key: deleting a persona leaves the reference dangling
    "CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        model TEXT NOT NULL DEFAULT '',
        personality TEXT NOT NULL DEFAULT '',
        ai_name TEXT NOT NULL DEFAULT '',
        ai_avatar TEXT NOT NULL DEFAULT '',
        persona_id INTEGER,
        terminated INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        meta TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, created_at, id)",
];

const SESSION_COLUMNS: &str = "id, name, model, personality, ai_name, ai_avatar, persona_id, terminated, created_at, updated_at";
const PERSONA_COLUMNS: &str =
    "id, name, avatar, identity, appearance, personality, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    /// Opens the database at `database_url`, creating the file and schema if needed
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = is_memory_url(database_url);
        if !in_memory {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        ConfabError::persistence(format!(
                            "failed to create database directory {:?}: {}",
                            parent, e
                        ))
                    })?;
                }
            }
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        info!(in_memory, "Connected to session store");
        Self::from_pool(pool).await
    }

    /// Opens a private in-memory database
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Wraps an existing pool and provisions the schema
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Session store schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ---- sessions ----

    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (id, name, model, personality, ai_name, ai_avatar, persona_id, terminated, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.name)
        .bind(&session.model)
        .bind(&session.personality)
        .bind(&session.ai_name)
        .bind(&session.ai_avatar)
        .bind(session.persona_id)
        .bind(session.terminated)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM sessions WHERE id = ?",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    /// Returns all sessions, newest first
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sessions ORDER BY created_at DESC, id DESC",
            SESSION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(session_from_row).collect()
    }

    /// Returns false if the session does not exist
    pub async fn rename_session(&self, session_id: &str, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE sessions SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Utc::now())
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Renames only while the current name still equals `expected`
    pub async fn rename_session_if(
        &self,
        session_id: &str,
        expected: &str,
        name: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET name = ?, updated_at = ? WHERE id = ? AND name = ?",
        )
        .bind(name)
        .bind(Utc::now())
        .bind(session_id)
        .bind(expected)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Writes the persona-derived fields of `session`
    pub async fn update_session_persona(&self, session: &Session) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET personality = ?, ai_name = ?, ai_avatar = ?, persona_id = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&session.personality)
        .bind(&session.ai_name)
        .bind(&session.ai_avatar)
        .bind(session.persona_id)
        .bind(Utc::now())
        .bind(&session.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Marks an active session terminated, renames it and appends `closing`
    ///
    /// All writes share one transaction. Returns false when the session is
    /// missing or already terminated, in which case nothing was written.
    pub async fn terminate_with_messages(
        &self,
        session_id: &str,
        title: &str,
        closing: &[NewMessage],
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE sessions SET terminated = 1, name = ?, updated_at = ?
             WHERE id = ? AND terminated = 0",
        )
        .bind(title)
        .bind(Utc::now())
        .bind(session_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for message in closing {
            write_message(&mut *tx, message, Utc::now()).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Deletes a session and all its messages; false if it did not exist
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    // ---- messages ----

    pub async fn insert_message(&self, message: NewMessage) -> Result<Message> {
        let created_at = Utc::now();
        let mut conn = self.pool.acquire().await?;
        let id = write_message(&mut conn, &message, created_at).await?;

        Ok(Message {
            id,
            session_id: message.session_id,
            role: message.role,
            content: message.content,
            meta: message.meta,
            created_at,
        })
    }

    /// Returns a session's messages in conversation order
    pub async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, meta, created_at FROM messages
             WHERE session_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    pub async fn count_messages(&self, session_id: &str, role: Role) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM messages WHERE session_id = ? AND role = ?")
            .bind(session_id)
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    // ---- personas ----

    /// Returns all personas, newest first
    pub async fn list_personas(&self) -> Result<Vec<Persona>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM personas ORDER BY created_at DESC, id DESC",
            PERSONA_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(persona_from_row).collect()
    }

    pub async fn get_persona(&self, persona_id: i64) -> Result<Option<Persona>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM personas WHERE id = ?",
            PERSONA_COLUMNS
        ))
        .bind(persona_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(persona_from_row).transpose()
    }

    pub async fn create_persona(&self, input: &PersonaInput) -> Result<Persona> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO personas (name, avatar, identity, appearance, personality, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.name)
        .bind(&input.avatar)
        .bind(&input.identity)
        .bind(&input.appearance)
        .bind(&input.personality)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Persona {
            id: result.last_insert_rowid(),
            name: input.name.clone(),
            avatar: input.avatar.clone(),
            identity: input.identity.clone(),
            appearance: input.appearance.clone(),
            personality: input.personality.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Overwrites a persona's fields; `None` if it does not exist
    pub async fn update_persona(
        &self,
        persona_id: i64,
        input: &PersonaInput,
    ) -> Result<Option<Persona>> {
        let result = sqlx::query(
            "UPDATE personas SET name = ?, avatar = ?, identity = ?, appearance = ?, personality = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&input.name)
        .bind(&input.avatar)
        .bind(&input.identity)
        .bind(&input.appearance)
        .bind(&input.personality)
        .bind(Utc::now())
        .bind(persona_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_persona(persona_id).await
    }

    /// Deletes a persona; sessions bound to it keep their copied fields
    pub async fn delete_persona(&self, persona_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM personas WHERE id = ?")
            .bind(persona_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

async fn write_message(
    conn: &mut SqliteConnection,
    message: &NewMessage,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO messages (session_id, role, content, meta, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&message.session_id)
    .bind(message.role.as_str())
    .bind(&message.content)
    .bind(&message.meta)
    .bind(created_at)
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn session_from_row(row: &SqliteRow) -> Result<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        model: row.try_get("model")?,
        personality: row.try_get("personality")?,
        ai_name: row.try_get("ai_name")?,
        ai_avatar: row.try_get("ai_avatar")?,
        persona_id: row.try_get("persona_id")?,
        terminated: row.try_get("terminated")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    let role: String = row.try_get("role")?;
    let role = Role::parse(&role)
        .ok_or_else(|| ConfabError::persistence(format!("unknown message role '{}'", role)))?;

    Ok(Message {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        role,
        content: row.try_get("content")?,
        meta: row.try_get("meta")?,
        created_at: row.try_get("created_at")?,
    })
}

fn persona_from_row(row: &SqliteRow) -> Result<Persona> {
    Ok(Persona {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        avatar: row.try_get("avatar")?,
        identity: row.try_get("identity")?,
        appearance: row.try_get("appearance")?,
        personality: row.try_get("personality")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
