//! Transcript summarization and conversation titling
//!
//! The summary call asks the model for free text followed by a title line
//! introduced by [`TITLE_MARKER`]. The last marker wins, so a summary that
//! quotes the marker still parses.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::providers::{ChatTurn, CompletionClient};
use crate::session::Message;

/// Literal that introduces the title in a summary answer
pub const TITLE_MARKER: &str = "标题：";

/// Summary text used when the summary call fails
pub const SUMMARY_FAILED: &str = "Failed to summarize the conversation";

/// Session name used when the summary answer carries no title
pub const DEFAULT_SUMMARY_TITLE: &str = "Conversation summary";

/// Session name used when first-turn titling fails
pub const DEFAULT_TOPIC_TITLE: &str = "Topic conversation";

/// Summary and title extracted from a summary answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutcome {
    pub summary: String,
    /// Empty when the answer had no title
    pub title: String,
}

/// Renders messages as `[role]: content` lines in chronological order
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("[{}]: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn summary_prompt(personality: &str, transcript: &str) -> String {
    format!(
        "You are an AI assistant with this personality: {}. Summarize the following conversation, \
         then write a fitting title of one sentence (no more than 20 characters).\n\n\
         Conversation:\n{}\n\n\
         Output the summary first, then the title on its own line in the form: {}<title>",
        personality, transcript, TITLE_MARKER
    )
}

pub fn title_prompt(personality: &str, first_message: &str) -> String {
    format!(
        "You are an AI assistant. The user's personality is: {}. The topic of the conversation is: {}. \
         Write one concise, accurate title (no more than 20 characters) for this conversation. \
         Return only the title, nothing else.",
        personality, first_message
    )
}

/// Splits a summary answer at the last title marker
pub fn parse_summary(output: &str) -> SummaryOutcome {
    let output = output.trim();
    match output.rfind(TITLE_MARKER) {
        Some(idx) => SummaryOutcome {
            summary: output[..idx].trim().to_string(),
            title: output[idx + TITLE_MARKER.len()..].trim().to_string(),
        },
        None => SummaryOutcome {
            summary: output.to_string(),
            title: String::new(),
        },
    }
}

pub struct Summarizer {
    client: Arc<dyn CompletionClient>,
    summary_timeout: Duration,
    title_timeout: Duration,
}

impl Summarizer {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        summary_timeout: Duration,
        title_timeout: Duration,
    ) -> Self {
        Self {
            client,
            summary_timeout,
            title_timeout,
        }
    }

    /// Summarizes a transcript; failures yield [`SUMMARY_FAILED`] and no title
    pub async fn summarize(&self, personality: &str, transcript: &str) -> SummaryOutcome {
        let prompt = summary_prompt(personality, transcript);
        match self
            .client
            .complete(vec![ChatTurn::user(prompt)], self.summary_timeout)
            .await
        {
            Ok(completion) => {
                let outcome = parse_summary(&completion.content);
                debug!(
                    summary_len = outcome.summary.len(),
                    has_title = !outcome.title.is_empty(),
                    "Conversation summarized"
                );
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Conversation summary failed");
                SummaryOutcome {
                    summary: SUMMARY_FAILED.to_string(),
                    title: String::new(),
                }
            }
        }
    }

    /// Derives a short title from the first user message
    ///
    /// Never fails: errors and empty answers yield [`DEFAULT_TOPIC_TITLE`].
    pub async fn title_for(&self, personality: &str, first_message: &str) -> String {
        let prompt = title_prompt(personality, first_message);
        match self
            .client
            .complete(vec![ChatTurn::user(prompt)], self.title_timeout)
            .await
        {
            Ok(completion) => {
                let title = completion.content.trim();
                if title.is_empty() {
                    DEFAULT_TOPIC_TITLE.to_string()
                } else {
                    title.to_string()
                }
            }
            Err(e) => {
                warn!(error = %e, "Title generation failed, using fallback");
                DEFAULT_TOPIC_TITLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockCompletionClient;
    use crate::providers::{ProviderError, Role};
    use chrono::Utc;

    fn summarizer(mock: &MockCompletionClient) -> Summarizer {
        Summarizer::new(
            Arc::new(mock.clone()),
            Duration::from_secs(30),
            Duration::from_secs(20),
        )
    }

    #[test]
    fn test_parse_summary_with_marker() {
        let outcome = parse_summary("the user asked about X.\n标题：Weather Chat");
        assert_eq!(outcome.summary, "the user asked about X.");
        assert_eq!(outcome.title, "Weather Chat");
    }

    #[test]
    fn test_parse_summary_without_marker() {
        let outcome = parse_summary("  just a summary  ");
        assert_eq!(outcome.summary, "just a summary");
        assert_eq!(outcome.title, "");
    }

    #[test]
    fn test_parse_summary_uses_last_marker() {
        let outcome = parse_summary("we discussed 标题：formats\n标题：Format Talk");
        assert_eq!(outcome.summary, "we discussed 标题：formats");
        assert_eq!(outcome.title, "Format Talk");
    }

    #[test]
    fn test_parse_summary_marker_only() {
        let outcome = parse_summary("标题：");
        assert_eq!(outcome.summary, "");
        assert_eq!(outcome.title, "");
    }

    #[test]
    fn test_render_transcript() {
        let make = |id, role, content: &str| Message {
            id,
            session_id: "s".to_string(),
            role,
            content: content.to_string(),
            meta: None,
            created_at: Utc::now(),
        };
        let transcript = render_transcript(&[
            make(1, Role::System, "rules"),
            make(2, Role::User, "hi"),
            make(3, Role::Assistant, "hello"),
        ]);
        assert_eq!(transcript, "[system]: rules\n[user]: hi\n[assistant]: hello");
    }

    #[tokio::test]
    async fn test_summarize_success() {
        let mock = MockCompletionClient::new();
        mock.set_response("Talked about rain.\n标题：Rainy Day");

        let outcome = summarizer(&mock).summarize("calm", "[user]: rain?").await;
        assert_eq!(outcome.summary, "Talked about rain.");
        assert_eq!(outcome.title, "Rainy Day");
        assert_eq!(mock.timeouts(), vec![Duration::from_secs(30)]);
        assert!(mock.calls()[0][0].content.contains("[user]: rain?"));
    }

    #[tokio::test]
    async fn test_summarize_failure_defaults() {
        let mock = MockCompletionClient::new();
        mock.set_error(ProviderError::timeout(30));

        let outcome = summarizer(&mock).summarize("calm", "").await;
        assert_eq!(outcome.summary, SUMMARY_FAILED);
        assert_eq!(outcome.title, "");
    }

    #[tokio::test]
    async fn test_title_for_trims_and_falls_back() {
        let mock = MockCompletionClient::new();
        mock.set_response("  Weather Chat \n");
        assert_eq!(
            summarizer(&mock).title_for("calm", "is it raining?").await,
            "Weather Chat"
        );
        assert_eq!(mock.timeouts(), vec![Duration::from_secs(20)]);

        mock.set_response("   ");
        assert_eq!(
            summarizer(&mock).title_for("calm", "hi").await,
            DEFAULT_TOPIC_TITLE
        );

        mock.set_error(ProviderError::transport("refused"));
        assert_eq!(
            summarizer(&mock).title_for("calm", "hi").await,
            DEFAULT_TOPIC_TITLE
        );
    }
}
