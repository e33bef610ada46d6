use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = HashMap<String, LockSlot>;

struct LockSlot {
    lock: Arc<Mutex<()>>,
    /// Guards holding or waiting for `lock`
    users: usize,
}

/// One async mutex per session id
///
/// Holding a session's guard serializes every mutation of that session.
/// Different sessions never contend. An entry lives only while some guard
/// holds or waits for it, so ids that never name a session leave nothing
/// behind.
#[derive(Default)]
pub struct SessionLocks {
    locks: Arc<StdMutex<LockMap>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to a session
    pub async fn acquire(&self, session_id: &str) -> SessionGuard {
        let lock = {
            let mut locks = lock_map(&self.locks);
            let slot = locks
                .entry(session_id.to_string())
                .or_insert_with(|| LockSlot {
                    lock: Arc::new(Mutex::new(())),
                    users: 0,
                });
            slot.users += 1;
            slot.lock.clone()
        };

        // Registered before waiting so a cancelled wait still releases the slot
        let mut guard = SessionGuard {
            locks: self.locks.clone(),
            session_id: session_id.to_string(),
            held: None,
        };
        guard.held = Some(lock.lock_owned().await);
        guard
    }

    /// Number of sessions with a lock entry
    pub fn tracked(&self) -> usize {
        lock_map(&self.locks).len()
    }
}

/// Exclusive access to one session, released on drop
pub struct SessionGuard {
    locks: Arc<StdMutex<LockMap>>,
    session_id: String,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.held.take();

        let mut locks = lock_map(&self.locks);
        if let Some(slot) = locks.get_mut(&self.session_id) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                locks.remove(&self.session_id);
            }
        }
    }
}

fn lock_map(locks: &StdMutex<LockMap>) -> MutexGuard<'_, LockMap> {
    locks.lock().unwrap_or_else(PoisonError::into_inner)
}
