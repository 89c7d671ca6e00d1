//! A capturing mock transport: instead of one hard-coded method per template, it records every
//! [`OutgoingMessage`] handed to `send` so dispatcher unit tests and the session/reset/invitation
//! service tests can assert on what would have gone out. `fail_next` lets tests exercise the
//! dispatcher's retry/back-off path without a real SMTP server.
use async_trait::async_trait;
use domain::errors::EmailError;
use domain::ports::{EmailTransportPort, OutgoingMessage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    /// Number of remaining calls to `send` that should fail before succeeding.
    fail_remaining: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls to `send` fail with `"smtp down"`.
    pub fn fail_next(&self, count: usize) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    pub async fn sent_messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    pub async fn find_by_recipient(&self, to: &str) -> Vec<OutgoingMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.to == to)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EmailTransportPort for MockTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), EmailError> {
        let mut remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            remaining -= 1;
            self.fail_remaining.store(remaining, Ordering::SeqCst);
            return Err(EmailError::Transport("smtp down".to_string()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}
