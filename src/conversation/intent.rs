//! Exit-intent detection
//!
//! A secondary completion call judges whether the user wants to end the
//! conversation. The classifier fails open: any error counts as "keep going".

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::providers::{ChatTurn, CompletionClient};

/// Builds the single-turn judgment prompt
pub fn exit_intent_prompt(personality: &str, utterance: &str) -> String {
    format!(
        "You are an AI assistant whose personality is: {}.\n\
         The user just said: \"{}\".\n\
         Decide whether the user intends to end this conversation (finish, exit, stop, say goodbye, or no longer chat).\n\
         If so, answer only \"YES\", otherwise answer only \"NO\". Do not output anything else.",
        personality, utterance
    )
}

/// True only for an answer that is exactly `YES` after trimming, ignoring case
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("YES")
}

pub struct IntentClassifier {
    client: Arc<dyn CompletionClient>,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(client: Arc<dyn CompletionClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Returns true if the utterance asks to end the conversation
    pub async fn wants_to_end(&self, utterance: &str, personality: &str) -> bool {
        let prompt = exit_intent_prompt(personality, utterance);

        match self
            .client
            .complete(vec![ChatTurn::user(prompt)], self.timeout)
            .await
        {
            Ok(completion) => {
                let decision = is_affirmative(&completion.content);
                debug!(decision, answer = %completion.content.trim(), "Exit intent classified");
                decision
            }
            Err(e) => {
                warn!(error = %e, "Exit intent classification failed, continuing conversation");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;
    use crate::providers::mock::MockCompletionClient;

    fn classifier(mock: &MockCompletionClient) -> IntentClassifier {
        IntentClassifier::new(Arc::new(mock.clone()), Duration::from_secs(15))
    }

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("YES"));
        assert!(is_affirmative("  yes\n"));
        assert!(!is_affirmative("NO"));
        assert!(!is_affirmative("YES."));
        assert!(!is_affirmative("Yes, the user wants to leave"));
        assert!(!is_affirmative(""));
    }

    #[test]
    fn test_prompt_embeds_inputs() {
        let prompt = exit_intent_prompt("cheerful tutor", "bye now");
        assert!(prompt.contains("cheerful tutor"));
        assert!(prompt.contains("\"bye now\""));
        assert!(prompt.contains("answer only \"YES\""));
    }

    #[tokio::test]
    async fn test_yes_answer_is_exit() {
        let mock = MockCompletionClient::new();
        mock.set_response(" yes ");

        assert!(classifier(&mock).wants_to_end("goodbye", "calm").await);
        assert_eq!(mock.timeouts(), vec![Duration::from_secs(15)]);
        let call = &mock.calls()[0];
        assert_eq!(call.len(), 1);
        assert!(call[0].content.contains("goodbye"));
    }

    #[tokio::test]
    async fn test_other_answers_continue() {
        let mock = MockCompletionClient::new();
        mock.set_response("NO");
        assert!(!classifier(&mock).wants_to_end("tell me more", "calm").await);

        mock.set_response("Maybe");
        assert!(!classifier(&mock).wants_to_end("hmm", "calm").await);
    }

    #[tokio::test]
    async fn test_failures_fail_open() {
        let mock = MockCompletionClient::new();

        for error in [
            ProviderError::timeout(15),
            ProviderError::upstream(500, "boom"),
            ProviderError::decode("no choices"),
        ] {
            mock.set_error(error);
            assert!(!classifier(&mock).wants_to_end("bye", "calm").await);
        }
    }
}
