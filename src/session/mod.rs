pub mod locks;
pub mod store;
pub mod types;

pub use locks::SessionLocks;
pub use store::SessionStore;
pub use types::{
    DEFAULT_AI_AVATAR, DEFAULT_AI_NAME, DEFAULT_SESSION_NAME, Message, NewMessage, Persona,
    PersonaInput, Session, generate_session_id,
};
