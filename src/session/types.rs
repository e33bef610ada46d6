use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::Role;

pub const DEFAULT_SESSION_NAME: &str = "New conversation";
pub const DEFAULT_AI_NAME: &str = "AI Assistant";
pub const DEFAULT_AI_AVATAR: &str = "/static/ai_avatar.png";

static LAST_SESSION_NANOS: AtomicI64 = AtomicI64::new(0);

/// Returns a new `session_<nanos>` identifier
///
/// Identifiers are strictly increasing within the process even when the
/// clock does not advance between two calls.
pub fn generate_session_id() -> String {
    let now = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1_000);

    let mut last = LAST_SESSION_NANOS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_SESSION_NANOS.compare_exchange_weak(
            last,
            next,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return format!("session_{}", next),
            Err(actual) => last = actual,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub name: String,
    pub model: String,
    pub personality: String,
    pub ai_name: String,
    pub ai_avatar: String,
    pub persona_id: Option<i64>,
    pub terminated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates an active session with a fresh identifier and the default name
    pub fn new(
        model: impl Into<String>,
        personality: impl Into<String>,
        ai_name: impl Into<String>,
        ai_avatar: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: generate_session_id(),
            name: DEFAULT_SESSION_NAME.to_string(),
            model: model.into(),
            personality: personality.into(),
            ai_name: ai_name.into(),
            ai_avatar: ai_avatar.into(),
            persona_id: None,
            terminated: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copies the persona's identity onto the session and references it
    pub fn bind(&mut self, persona: &Persona) {
        self.personality = persona.personality.clone();
        self.ai_name = persona.name.clone();
        self.ai_avatar = persona.avatar.clone();
        self.persona_id = Some(persona.id);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub meta: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A message about to be stored; the store assigns id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub meta: Option<String>,
}

impl NewMessage {
    pub fn new(session_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            role,
            content: content.into(),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: i64,
    pub name: String,
    pub avatar: String,
    pub identity: String,
    pub appearance: String,
    pub personality: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a persona
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonaInput {
    /// Absent or zero creates a new persona
    pub id: Option<i64>,
    pub name: String,
    pub avatar: String,
    pub identity: String,
    pub appearance: String,
    pub personality: String,
}
