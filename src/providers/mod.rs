//! Completion client module for confab
//!
//! This module defines the value types and the trait used to talk to an
//! external chat-completion endpoint. Every component that needs a model
//! answer (reply generation, intent classification, summarization, titling)
//! goes through the `CompletionClient` trait.
//!
//! # Architecture
//!
//! - `ChatTurn` is the single role/content pair sent upstream
//! - `CompletionClient` is the seam; `OpenAiCompatibleClient` is the HTTP implementation
//! - Errors are classified into transport, upstream-status and decode failures
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use confab::providers::{ChatTurn, CompletionClient, Role};
//!
//! async fn example(client: &dyn CompletionClient) {
//!     let turns = vec![
//!         ChatTurn::new(Role::System, "You are a helpful assistant"),
//!         ChatTurn::new(Role::User, "Hello!"),
//!     ];
//!
//!     let completion = client.complete(turns, Duration::from_secs(60)).await.unwrap();
//!     println!("Response: {}", completion.content);
//! }
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod error;
#[cfg(test)]
pub mod mock;
pub mod openai;

pub use error::ProviderError;
pub use openai::OpenAiCompatibleClient;

/// One turn of a conversation as sent to the completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    /// Role of the sender
    pub role: Role,
    /// Text content
    pub content: String,
}

impl ChatTurn {
    /// Creates a new turn with the specified role and content
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Returns true if this turn carries the system directive
    pub fn is_system(&self) -> bool {
        matches!(self.role, Role::System)
    }
}

/// Role of a message sender in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System directive
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

impl Role {
    /// Returns the wire representation of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parses a stored role string
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Token accounting reported by the upstream
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Result of a single completion call
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Completion {
    /// Content of the first choice
    pub content: String,
    /// Token usage, zeroed when the upstream omits it
    pub usage: TokenUsage,
}

impl Completion {
    /// Creates a completion with just content
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
        }
    }

    /// Adds token usage information
    pub fn with_usage(mut self, prompt: u32, completion: u32) -> Self {
        self.usage = TokenUsage::new(prompt, completion);
        self
    }
}

/// Trait for chat-completion backends
///
/// Implementations must be Send + Sync so one client can be shared by the
/// request handlers and the background titling tasks.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends the ordered turns and returns the first choice
    ///
    /// `timeout` bounds the whole call. Implementations do not retry; a
    /// failure is returned to the caller as-is.
    async fn complete(
        &self,
        turns: Vec<ChatTurn>,
        timeout: Duration,
    ) -> Result<Completion, ProviderError>;

    /// Returns the model sent with every request
    fn model(&self) -> &str;

    /// Returns the client name, used for logging
    fn client_name(&self) -> &'static str;
}
