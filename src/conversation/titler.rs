//! Fire-and-forget titling of new conversations
//!
//! Tasks run detached from the request that scheduled them. They are tracked
//! only so shutdown (and tests) can wait for in-flight writes.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::conversation::summarizer::Summarizer;
use crate::session::{DEFAULT_SESSION_NAME, SessionStore};

pub struct BackgroundTitler {
    store: Arc<SessionStore>,
    summarizer: Arc<Summarizer>,
    tracker: TaskTracker,
}

impl BackgroundTitler {
    pub fn new(store: Arc<SessionStore>, summarizer: Arc<Summarizer>) -> Self {
        Self {
            store,
            summarizer,
            tracker: TaskTracker::new(),
        }
    }

    /// Spawns a task that names the session after its first message
    ///
    /// The name is written only while the session still carries the default
    /// name, so a user rename or a termination title is never overwritten.
    pub fn schedule(&self, session_id: String, personality: String, first_message: String) {
        let store = self.store.clone();
        let summarizer = self.summarizer.clone();

        self.tracker.spawn(async move {
            let title = summarizer.title_for(&personality, &first_message).await;

            match store
                .rename_session_if(&session_id, DEFAULT_SESSION_NAME, &title)
                .await
            {
                Ok(true) => info!(session_id = %session_id, title = %title, "Session titled"),
                Ok(false) => {
                    debug!(session_id = %session_id, "Session already renamed, generated title dropped")
                }
                Err(e) => warn!(session_id = %session_id, error = %e, "Failed to store session title"),
            }
        });
    }

    /// Number of titling tasks still running
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every task scheduled so far has finished
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Waits for pending tasks at shutdown, giving up after `grace`
    ///
    /// Returns false if tasks were still running when the grace period ended.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "Waiting for background titling tasks");
        }
        tokio::time::timeout(grace, self.tracker.wait()).await.is_ok()
    }
}
