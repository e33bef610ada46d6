//! Conversation flow: prompt composition, exit-intent detection,
//! summarization, background titling and the session state machine that
//! ties them together.

pub mod composer;
pub mod intent;
pub mod orchestrator;
pub mod summarizer;
pub mod titler;
pub mod types;

pub use intent::IntentClassifier;
pub use orchestrator::{CLOSE_OUT_TEXT, Orchestrator, SETUP_CONFIRMATION};
pub use summarizer::{Summarizer, SummaryOutcome};
pub use titler::BackgroundTitler;
pub use types::{
    ChatOutcome, ChatReply, ChatRequest, SetupRequest, SetupResponse, TerminationReply,
};
