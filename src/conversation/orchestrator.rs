//! Session orchestration
//!
//! A session is either ACTIVE or TERMINATED. Every incoming turn is first
//! checked for exit intent; an exit ends the session with a summary, any
//! other turn is answered by the model and both messages are stored.
//!
//! All mutations of one session run under that session's lock, so two turns
//! of the same conversation never interleave. External calls happen while the
//! lock is held; the background titler is the only work that outlives a
//! request.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::TimeoutConfig;
use crate::conversation::composer::{compose, resolve_directive};
use crate::conversation::intent::IntentClassifier;
use crate::conversation::summarizer::{DEFAULT_SUMMARY_TITLE, Summarizer, render_transcript};
use crate::conversation::titler::BackgroundTitler;
use crate::conversation::types::{
    ChatOutcome, ChatReply, ChatRequest, SetupRequest, SetupResponse, TerminationReply,
    format_elapsed,
};
use crate::providers::{CompletionClient, Role};
use crate::session::{
    DEFAULT_AI_AVATAR, DEFAULT_AI_NAME, Message, NewMessage, Persona, PersonaInput, Session,
    SessionLocks, SessionStore,
};
use crate::utils::error::{ConfabError, Result};

pub const SETUP_CONFIRMATION: &str = "Model setup succeeded";
pub const CLOSE_OUT_TEXT: &str = "This conversation has ended. Thank you for chatting.";
pub const SUMMARY_META: &str = "Conversation summary";

pub struct Orchestrator {
    store: Arc<SessionStore>,
    client: Arc<dyn CompletionClient>,
    intent: IntentClassifier,
    summarizer: Arc<Summarizer>,
    titler: BackgroundTitler,
    locks: SessionLocks,
    timeouts: TimeoutConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        client: Arc<dyn CompletionClient>,
        timeouts: TimeoutConfig,
    ) -> Self {
        let summarizer = Arc::new(Summarizer::new(
            client.clone(),
            timeouts.summary(),
            timeouts.title(),
        ));
        Self {
            intent: IntentClassifier::new(client.clone(), timeouts.intent()),
            titler: BackgroundTitler::new(store.clone(), summarizer.clone()),
            summarizer,
            store,
            client,
            locks: SessionLocks::new(),
            timeouts,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn titler(&self) -> &BackgroundTitler {
        &self.titler
    }

    /// Creates a session, optionally bound to an existing persona
    ///
    /// An unknown persona id is ignored and the request's own fields are used.
    pub async fn setup(&self, request: SetupRequest) -> Result<SetupResponse> {
        let model = non_empty_or(&request.model_name, self.client.model());
        let mut session = Session::new(
            model,
            request.personality.trim(),
            non_empty_or(&request.ai_name, DEFAULT_AI_NAME),
            non_empty_or(&request.ai_avatar, DEFAULT_AI_AVATAR),
        );

        let persona = match request.persona_id.filter(|id| *id > 0) {
            Some(id) => {
                let persona = self.store.get_persona(id).await?;
                if persona.is_none() {
                    debug!(persona_id = id, "Requested persona not found, using request fields");
                }
                persona
            }
            None => None,
        };
        if let Some(ref persona) = persona {
            session.bind(persona);
        }

        self.store.insert_session(&session).await?;
        let directive = resolve_directive(&session, persona.as_ref());
        self.store
            .insert_message(NewMessage::new(&session.id, Role::System, directive))
            .await?;

        info!(
            session_id = %session.id,
            persona_id = ?session.persona_id,
            "Session created"
        );

        Ok(SetupResponse {
            session_id: session.id,
            message: SETUP_CONFIRMATION.to_string(),
        })
    }

    /// Handles one user turn
    ///
    /// Returns a termination outcome when the turn expresses exit intent; the
    /// triggering message is then not stored and no reply is generated.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome> {
        let session_id = require("sessionId", &request.session_id)?;
        require("message", &request.message)?;
        let text = request.message.as_str();

        let _guard = self.locks.acquire(session_id).await;
        let session = self.load_active(session_id).await?;
        let persona = self.live_persona(&session).await?;
        let personality = persona
            .as_ref()
            .map(|p| p.personality.clone())
            .unwrap_or_else(|| session.personality.clone());

        if self.intent.wants_to_end(text, &personality).await {
            info!(session_id = %session.id, "Exit intent detected, ending session");
            return self.end_session(&session).await.map(ChatOutcome::Terminated);
        }

        let history = self.store.list_messages(session_id).await?;
        let directive = resolve_directive(&session, persona.as_ref());
        let turns = compose(&history, &directive, text);
        let prior_user_turns = self.store.count_messages(session_id, Role::User).await?;

        self.store
            .insert_message(NewMessage::new(session_id, Role::User, text))
            .await?;

        if prior_user_turns == 0 {
            self.titler
                .schedule(session.id.clone(), personality.clone(), text.to_string());
        }

        let started = Instant::now();
        let completion = self
            .client
            .complete(turns, self.timeouts.reply())
            .await
            .map_err(|e| {
                warn!(session_id = %session.id, error = %e, "Reply generation failed");
                ConfabError::from(e)
            })?;
        let elapsed = format_elapsed(started.elapsed());

        self.store
            .insert_message(
                NewMessage::new(session_id, Role::Assistant, completion.content.as_str())
                    .with_meta(format!("Response time: {}", elapsed)),
            )
            .await?;

        debug!(
            session_id = %session.id,
            elapsed = %elapsed,
            total_tokens = completion.usage.total_tokens,
            "Turn completed"
        );

        let (ai_name, ai_avatar) = display_identity(&session, persona.as_ref());
        Ok(ChatOutcome::Reply(ChatReply {
            message: completion.content,
            elapsed_time: elapsed,
            usage: completion.usage,
            ai_name,
            ai_avatar,
        }))
    }

    /// Ends an active session on request
    pub async fn terminate(&self, session_id: &str) -> Result<TerminationReply> {
        let session_id = require("sessionId", session_id)?;
        let _guard = self.locks.acquire(session_id).await;
        let session = self.load_active(session_id).await?;
        self.end_session(&session).await
    }

    pub async fn rename(&self, session_id: &str, new_name: &str) -> Result<()> {
        let session_id = require("sessionId", session_id)?;
        let new_name = require("newName", new_name)?;

        let _guard = self.locks.acquire(session_id).await;
        if !self.store.rename_session(session_id, new_name).await? {
            return Err(ConfabError::session_not_found(session_id));
        }
        info!(session_id = %session_id, "Session renamed");
        Ok(())
    }

    /// Deletes a session together with all of its messages
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        let session_id = require("sessionId", session_id)?;

        let _guard = self.locks.acquire(session_id).await;
        if !self.store.delete_session(session_id).await? {
            return Err(ConfabError::session_not_found(session_id));
        }

        info!(session_id = %session_id, "Session deleted");
        Ok(())
    }

    /// Binds a persona to a session, copying its identity onto the session
    pub async fn bind_persona(&self, session_id: &str, persona_id: i64) -> Result<Session> {
        let session_id = require("sessionId", session_id)?;

        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.load(session_id).await?;
        let persona = self
            .store
            .get_persona(persona_id)
            .await?
            .ok_or_else(|| ConfabError::persona_not_found(persona_id))?;

        session.bind(&persona);
        self.store.update_session_persona(&session).await?;

        info!(session_id = %session_id, persona_id, "Persona bound to session");
        Ok(session)
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.store.list_sessions().await
    }

    pub async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let session_id = require("sessionId", session_id)?;
        self.load(session_id).await?;
        self.store.list_messages(session_id).await
    }

    pub async fn list_personas(&self) -> Result<Vec<Persona>> {
        self.store.list_personas().await
    }

    pub async fn get_persona(&self, persona_id: i64) -> Result<Persona> {
        self.store
            .get_persona(persona_id)
            .await?
            .ok_or_else(|| ConfabError::persona_not_found(persona_id))
    }

    /// Creates a persona, or updates it when `input.id` names an existing one
    pub async fn save_persona(&self, mut input: PersonaInput) -> Result<Persona> {
        input.name = require("name", &input.name)?.to_string();

        match input.id.filter(|id| *id > 0) {
            Some(id) => self
                .store
                .update_persona(id, &input)
                .await?
                .ok_or_else(|| ConfabError::persona_not_found(id)),
            None => {
                let persona = self.store.create_persona(&input).await?;
                info!(persona_id = persona.id, "Persona created");
                Ok(persona)
            }
        }
    }

    pub async fn delete_persona(&self, persona_id: i64) -> Result<()> {
        if !self.store.delete_persona(persona_id).await? {
            return Err(ConfabError::persona_not_found(persona_id));
        }
        Ok(())
    }

    /// Summarizes and closes a session; the caller holds the session lock
    async fn end_session(&self, session: &Session) -> Result<TerminationReply> {
        let history = self.store.list_messages(&session.id).await?;
        let transcript = render_transcript(&history);
        let outcome = self
            .summarizer
            .summarize(&session.personality, &transcript)
            .await;

        let title = if outcome.title.is_empty() {
            DEFAULT_SUMMARY_TITLE.to_string()
        } else {
            outcome.title
        };

        let closing = [
            NewMessage::new(&session.id, Role::System, CLOSE_OUT_TEXT),
            NewMessage::new(&session.id, Role::Assistant, outcome.summary.as_str())
                .with_meta(SUMMARY_META),
        ];
        if !self
            .store
            .terminate_with_messages(&session.id, &title, &closing)
            .await?
        {
            return Err(ConfabError::terminated(&session.id));
        }

        info!(session_id = %session.id, title = %title, "Session terminated");

        Ok(TerminationReply {
            terminated: true,
            end_message: CLOSE_OUT_TEXT.to_string(),
            summary: outcome.summary,
            new_title: title,
        })
    }

    async fn load(&self, session_id: &str) -> Result<Session> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| ConfabError::session_not_found(session_id))
    }

    async fn load_active(&self, session_id: &str) -> Result<Session> {
        let session = self.load(session_id).await?;
        if session.terminated {
            return Err(ConfabError::terminated(session_id));
        }
        Ok(session)
    }

    /// The bound persona as currently stored, if it still exists
    async fn live_persona(&self, session: &Session) -> Result<Option<Persona>> {
        match session.persona_id {
            Some(id) => {
                let persona = self.store.get_persona(id).await?;
                if persona.is_none() {
                    debug!(session_id = %session.id, persona_id = id, "Bound persona no longer exists");
                }
                Ok(persona)
            }
            None => Ok(None),
        }
    }
}

fn require<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfabError::validation(format!("{} is required", field)));
    }
    Ok(value)
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn display_identity(session: &Session, persona: Option<&Persona>) -> (String, String) {
    match persona {
        Some(p) => (
            non_empty_or(&p.name, &session.ai_name),
            non_empty_or(&p.avatar, &session.ai_avatar),
        ),
        None => (session.ai_name.clone(), session.ai_avatar.clone()),
    }
}
