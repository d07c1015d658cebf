//! Tracks outstanding group-management commands that were forwarded to
//! another server, so the caller of `add_group`/`remove_group` can block
//! until that server confirms it applied the change (or time out).

use crate::error::ManagerError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};

type AckSender = oneshot::Sender<Result<(), ManagerError>>;
type AckReceiver = oneshot::Receiver<Result<(), ManagerError>>;

pub struct AckCoordinator {
    next_id: AtomicU32,
    slots: RwLock<HashMap<u32, AckSender>>,
    timeout: Duration,
}

impl AckCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            next_id: AtomicU32::new(0),
            slots: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    /// Allocates a fresh, process-unique (within this manager's lifetime)
    /// command id to tag an outgoing `GroupCommand` frame with.
    pub fn next_command_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a waiting slot for `id`. Must be called before the command
    /// is published, so the ack can never arrive before the slot exists.
    pub async fn create_ack(&self, id: u32) -> AckReceiver {
        let (tx, rx) = oneshot::channel();
        self.slots.write().await.insert(id, tx);
        rx
    }

    /// Resolves the slot for `id`, if still outstanding. A stale or
    /// duplicate ack (slot already removed by a timeout or an earlier
    /// trigger) is silently ignored.
    pub async fn trigger_ack(&self, id: u32) {
        if let Some(tx) = self.slots.write().await.remove(&id) {
            let _ = tx.send(Ok(()));
        }
    }

    /// Waits for `id`'s slot to resolve, enforcing this coordinator's
    /// configured timeout. Removes the slot itself on timeout so a
    /// late-arriving ack is a no-op rather than resolving a stale waiter.
    pub async fn wait(&self, id: u32, rx: AckReceiver) -> Result<(), ManagerError> {
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ManagerError::ManagerShutdown),
            Err(_) => {
                self.slots.write().await.remove(&id);
                Err(ManagerError::AckTimeout(id))
            }
        }
    }

    /// Resolves every outstanding slot with a shutdown error so no waiter
    /// is left hanging once the manager is disposed.
    pub async fn dispose(&self) {
        let mut slots = self.slots.write().await;
        for (_, tx) in slots.drain() {
            let _ = tx.send(Err(ManagerError::ManagerShutdown));
        }
    }
}
