use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::providers::TokenUsage;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SetupRequest {
    pub model_name: String,
    pub personality: String,
    pub ai_name: String,
    pub ai_avatar: String,
    pub persona_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetupResponse {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

/// Answer to a normal conversation turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub message: String,
    pub elapsed_time: String,
    pub usage: TokenUsage,
    pub ai_name: String,
    pub ai_avatar: String,
}

/// Answer when a session ends, explicitly or by detected exit intent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TerminationReply {
    pub terminated: bool,
    pub end_message: String,
    pub summary: String,
    pub new_title: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ChatOutcome {
    Reply(ChatReply),
    Terminated(TerminationReply),
}

impl ChatOutcome {
    pub fn is_terminated(&self) -> bool {
        matches!(self, ChatOutcome::Terminated(_))
    }
}

/// Formats a latency as `{ms}ms` below one second, `{s:.2}s` otherwise
pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}
