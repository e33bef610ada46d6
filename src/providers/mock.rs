//! Mock completion client for testing
//!
//! Answers are chosen by prompt content: the first rule whose needle occurs
//! in any turn of the request wins, otherwise the default response is used.
//! This keeps tests deterministic even when the background titler races the
//! reply call.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::providers::{ChatTurn, Completion, CompletionClient, ProviderError};

type Outcome = Result<Completion, ProviderError>;

/// Scripted completion client
#[derive(Clone)]
pub struct MockCompletionClient {
    rules: Arc<Mutex<Vec<(String, Outcome)>>>,
    default: Arc<Mutex<Outcome>>,
    delay: Arc<Mutex<Option<Duration>>>,
    calls: Arc<Mutex<Vec<Vec<ChatTurn>>>>,
    timeouts: Arc<Mutex<Vec<Duration>>>,
    model: String,
}

impl MockCompletionClient {
    /// Creates a mock answering every call with "Mock response"
    pub fn new() -> Self {
        Self {
            rules: Arc::new(Mutex::new(Vec::new())),
            default: Arc::new(Mutex::new(Ok(Completion::new("Mock response")))),
            delay: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
            timeouts: Arc::new(Mutex::new(Vec::new())),
            model: "mock-model".to_string(),
        }
    }

    /// Sets the answer for calls no rule matches
    pub fn set_response(&self, content: impl Into<String>) {
        *self.default.lock().unwrap() = Ok(Completion::new(content));
    }

    /// Sets the answer, with usage, for calls no rule matches
    pub fn set_completion(&self, completion: Completion) {
        *self.default.lock().unwrap() = Ok(completion);
    }

    /// Makes unmatched calls fail
    pub fn set_error(&self, error: ProviderError) {
        *self.default.lock().unwrap() = Err(error);
    }

    /// Answers `content` to any request containing `needle`
    pub fn respond_when(&self, needle: impl Into<String>, content: impl Into<String>) {
        self.rules
            .lock()
            .unwrap()
            .push((needle.into(), Ok(Completion::new(content))));
    }

    /// Fails any request containing `needle`
    pub fn fail_when(&self, needle: impl Into<String>, error: ProviderError) {
        self.rules.lock().unwrap().push((needle.into(), Err(error)));
    }

    /// Sleeps before every answer
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Returns the number of calls made
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Returns every request received, in call order
    pub fn calls(&self) -> Vec<Vec<ChatTurn>> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns the requests containing `needle`
    pub fn calls_containing(&self, needle: &str) -> Vec<Vec<ChatTurn>> {
        self.calls()
            .into_iter()
            .filter(|turns| turns.iter().any(|t| t.content.contains(needle)))
            .collect()
    }

    /// Returns the timeout passed with every call
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().unwrap().clone()
    }
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(
        &self,
        turns: Vec<ChatTurn>,
        timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        let outcome = {
            let rules = self.rules.lock().unwrap();
            rules
                .iter()
                .find(|(needle, _)| turns.iter().any(|t| t.content.contains(needle.as_str())))
                .map(|(_, outcome)| outcome.clone())
        }
        .unwrap_or_else(|| self.default.lock().unwrap().clone());

        self.calls.lock().unwrap().push(turns);
        self.timeouts.lock().unwrap().push(timeout);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        outcome
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn client_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_response() {
        let mock = MockCompletionClient::new();
        mock.set_response("Hello!");

        let completion = mock
            .complete(vec![ChatTurn::user("Hi")], Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(completion.content, "Hello!");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rule_matches_any_turn() {
        let mock = MockCompletionClient::new();
        mock.respond_when("weather", "sunny");

        let completion = mock
            .complete(
                vec![ChatTurn::system("about the weather"), ChatTurn::user("?")],
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(completion.content, "sunny");

        let completion = mock
            .complete(vec![ChatTurn::user("other")], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(completion.content, "Mock response");
    }

    #[tokio::test]
    async fn test_error_rule_and_recording() {
        let mock = MockCompletionClient::new();
        mock.fail_when("boom", ProviderError::timeout(15));

        let result = mock
            .complete(vec![ChatTurn::user("boom")], Duration::from_secs(15))
            .await;

        assert!(result.unwrap_err().is_transport());
        assert_eq!(mock.calls_containing("boom").len(), 1);
        assert_eq!(mock.timeouts(), vec![Duration::from_secs(15)]);
    }

    #[test]
    fn test_mock_implements_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockCompletionClient>();
    }
}
