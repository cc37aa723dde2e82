use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes work on a single event. Scoring passes and pick writes for the
/// same event never interleave, different events proceed in parallel.
#[derive(Debug, Default)]
pub struct EventLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EventLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, event_id: &str) -> OwnedMutexGuard<()> {
        let event_lock = {
            let mut locks = self.locks.lock().await;
            // Drop entries nobody is holding or waiting on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(event_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        event_lock.lock_owned().await
    }
}
