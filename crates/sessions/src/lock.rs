//! Per-user lifecycle locks.
//!
//! Creation, replacement and teardown of a user's conversation run one at a
//! time.  Other users are unaffected.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use tp_domain::error::{Error, Result};

/// Maps each user id to a `Semaphore(1)`.  Holding the permit grants
/// exclusive lifecycle access; it releases on drop.
#[derive(Default)]
pub struct UserLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl UserLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lifecycle lock of `user_id`.
    pub async fn acquire(&self, user_id: &str) -> Result<OwnedSemaphorePermit> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(user_id.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        sem.acquire_owned()
            .await
            .map_err(|_| Error::Other(format!("lifecycle lock for {user_id} closed")))
    }

    /// Number of users with a lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }

    /// Drop lock entries nobody holds or waits on.
    ///
    /// Handles are only cloned under the map lock, so a strong count of one
    /// means the map is the sole owner.
    pub fn prune_idle(&self) {
        self.locks.lock().retain(|_, sem| Arc::strong_count(sem) > 1);
    }
}
