use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::EmailError;

#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub template: String,
    pub content: HashMap<String, String>,
}

/// Identifies which row the callback should write delivery state back into.
#[derive(Debug, Clone)]
pub struct SendMetadata {
    pub kind: SendKind,
    pub reference_id: i64,
    pub token: String,
    pub recipient: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    PasswordReset,
    Invitation,
}

#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub attempt: u32,
    pub status: DeliveryStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub err: Option<String>,
    pub r#final: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

pub type DeliveryCallback =
    Box<dyn Fn(SendMetadata, DeliveryOutcome) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct SendRequest {
    pub message: OutgoingMessage,
    pub metadata: SendMetadata,
    pub back_off_policy: Vec<Duration>,
    pub max_attempts: u32,
    pub callback: DeliveryCallback,
}

impl std::fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendRequest")
            .field("message", &self.message)
            .field("metadata", &self.metadata)
            .field("back_off_policy", &self.back_off_policy)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

/// The abstract SMTP sender the dispatcher drives. Kept separate from the dispatcher itself
/// so the retry/back-off logic can be unit-tested against a transport double.
#[async_trait]
pub trait EmailTransportPort: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), EmailError>;
}

/// The single-producer/multi-consumer dispatcher (C5).
#[async_trait]
pub trait EmailDispatchPort: Send + Sync {
    /// Enqueues `request`; returns immediately, the send happens on a worker.
    async fn dispatch(&self, request: SendRequest);

    /// Waits for in-flight sends to terminate or `timeout` to elapse.
    async fn drain(&self, timeout: Duration);
}
