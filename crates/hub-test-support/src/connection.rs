use async_trait::async_trait;
use hub_core::{ConnectionHandle, WriteError};
use hub_wire::SharedHubProtocol;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A connection handle that records every write instead of delivering it
/// anywhere, for assertions in integration tests.
pub struct MockConnection {
    connection_id: String,
    user_id: Option<String>,
    protocol: SharedHubProtocol,
    outbox: Mutex<Vec<Vec<u8>>>,
    failing: AtomicBool,
}

impl MockConnection {
    pub fn new(connection_id: impl Into<String>, protocol: SharedHubProtocol) -> Self {
        Self {
            connection_id: connection_id.into(),
            user_id: None,
            protocol,
            outbox: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Makes every subsequent write on this connection fail, to exercise
    /// write-failure isolation without affecting any other connection.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn received(&self) -> Vec<Vec<u8>> {
        self.outbox.lock().await.clone()
    }

    /// Parses every recorded write as JSON. Panics if a write wasn't valid
    /// JSON -- only meaningful for tests configured with a JSON protocol.
    pub async fn received_json(&self) -> Vec<Value> {
        self.outbox
            .lock()
            .await
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).expect("mock connection received non-JSON bytes"))
            .collect()
    }
}

#[async_trait]
impl ConnectionHandle for MockConnection {
    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn protocol(&self) -> &SharedHubProtocol {
        &self.protocol
    }

    async fn write_bytes(&self, bytes: Vec<u8>) -> Result<(), WriteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(WriteError::Failed("mock connection configured to fail".to_owned()));
        }
        self.outbox.lock().await.push(bytes);
        Ok(())
    }
}
