//! Route handlers
//!
//! Each handler only decodes the request and delegates to the orchestrator.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::conversation::{ChatOutcome, ChatRequest, SetupRequest, SetupResponse, TerminationReply};
use crate::gateway::AppState;
use crate::session::{Message, Persona, PersonaInput, Session};
use crate::utils::error::ConfabError;

type ApiResult<T> = Result<Json<T>, ConfabError>;

const SUCCESS: &str = "success";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionRef {
    pub session_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenameRequest {
    pub session_id: String,
    pub new_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsePersonaRequest {
    pub session_id: String,
    pub persona_id: i64,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub result: &'static str,
}

impl Ack {
    fn success() -> Json<Self> {
        Json(Self { result: SUCCESS })
    }
}

#[derive(Debug, Serialize)]
pub struct PersonaSaved {
    pub result: &'static str,
    pub persona: Persona,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub async fn setup(
    State(state): State<AppState>,
    payload: Result<Json<SetupRequest>, JsonRejection>,
) -> ApiResult<SetupResponse> {
    let Json(request) = payload?;
    Ok(Json(state.orchestrator.setup(request).await?))
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatOutcome> {
    let Json(request) = payload?;
    Ok(Json(state.orchestrator.chat(request).await?))
}

pub async fn terminate(
    State(state): State<AppState>,
    payload: Result<Json<SessionRef>, JsonRejection>,
) -> ApiResult<TerminationReply> {
    let Json(request) = payload?;
    Ok(Json(state.orchestrator.terminate(&request.session_id).await?))
}

pub async fn rename(
    State(state): State<AppState>,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> ApiResult<Ack> {
    let Json(request) = payload?;
    state
        .orchestrator
        .rename(&request.session_id, &request.new_name)
        .await?;
    Ok(Ack::success())
}

pub async fn delete(
    State(state): State<AppState>,
    payload: Result<Json<SessionRef>, JsonRejection>,
) -> ApiResult<Ack> {
    let Json(request) = payload?;
    state.orchestrator.delete(&request.session_id).await?;
    Ok(Ack::success())
}

pub async fn use_persona(
    State(state): State<AppState>,
    payload: Result<Json<UsePersonaRequest>, JsonRejection>,
) -> ApiResult<Ack> {
    let Json(request) = payload?;
    state
        .orchestrator
        .bind_persona(&request.session_id, request.persona_id)
        .await?;
    Ok(Ack::success())
}

pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Vec<Session>> {
    Ok(Json(state.orchestrator.list_sessions().await?))
}

pub async fn list_messages(
    State(state): State<AppState>,
    query: Result<Query<SessionRef>, QueryRejection>,
) -> ApiResult<Vec<Message>> {
    let Query(query) = query?;
    Ok(Json(state.orchestrator.list_messages(&query.session_id).await?))
}

pub async fn list_personas(State(state): State<AppState>) -> ApiResult<Vec<Persona>> {
    Ok(Json(state.orchestrator.list_personas().await?))
}

pub async fn save_persona(
    State(state): State<AppState>,
    payload: Result<Json<PersonaInput>, JsonRejection>,
) -> ApiResult<PersonaSaved> {
    let Json(input) = payload?;
    let persona = state.orchestrator.save_persona(input).await?;
    Ok(Json(PersonaSaved {
        result: SUCCESS,
        persona,
    }))
}

pub async fn get_persona(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Persona> {
    let Path(id) = id?;
    Ok(Json(state.orchestrator.get_persona(id).await?))
}

pub async fn delete_persona(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Ack> {
    let Path(id) = id?;
    state.orchestrator.delete_persona(id).await?;
    Ok(Ack::success())
}
