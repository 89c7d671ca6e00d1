//! The bounded single-producer/multi-consumer dispatcher (C5).
//!
//! Sends never block the caller: every request is routed through a fixed worker pool reading off
//! one `tokio::sync::mpsc` channel, retried per `back_off_policy`, and reported after every
//! attempt (not just the final one) through the caller-supplied callback so delivery state can be
//! persisted incrementally.
use async_trait::async_trait;
use domain::ports::{DeliveryOutcome, DeliveryStatus, EmailDispatchPort, EmailTransportPort, SendRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

pub struct Dispatcher {
    sender: mpsc::Sender<SendRequest>,
    in_flight: Arc<AtomicUsize>,
}

impl Dispatcher {
    /// Spawns `worker_count` workers sharing one bounded channel of capacity `queue_capacity`.
    pub fn new(
        transport: Arc<dyn EmailTransportPort>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let in_flight = Arc::new(AtomicUsize::new(0));

        for worker_id in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            let transport = transport.clone();
            let in_flight = in_flight.clone();
            tokio::spawn(async move {
                loop {
                    let request = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    let Some(request) = request else {
                        tracing::debug!(worker_id, "dispatcher worker shutting down, channel closed");
                        break;
                    };
                    process_request(transport.as_ref(), request).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }

        Self { sender, in_flight }
    }
}

async fn process_request(transport: &dyn EmailTransportPort, request: SendRequest) {
    let SendRequest {
        message,
        metadata,
        back_off_policy,
        max_attempts,
        callback,
    } = request;

    let max_attempts = max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let result = transport.send(&message).await;
        let is_last = attempt >= max_attempts;

        let outcome = match result {
            Ok(()) => DeliveryOutcome {
                attempt,
                status: DeliveryStatus::Sent,
                sent_at: Some(chrono::Utc::now()),
                err: None,
                r#final: true,
            },
            Err(e) => {
                if !is_last {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        recipient = %metadata.recipient,
                        error = %e,
                        "email send attempt failed, will retry"
                    );
                } else {
                    tracing::error!(
                        attempt,
                        max_attempts,
                        recipient = %metadata.recipient,
                        error = %e,
                        "email send exhausted retries"
                    );
                }
                DeliveryOutcome {
                    attempt,
                    status: DeliveryStatus::Failed,
                    sent_at: None,
                    err: Some(e.to_string()),
                    r#final: is_last,
                }
            }
        };

        let terminal = outcome.r#final;
        (callback)(metadata.clone(), outcome).await;

        if terminal {
            break;
        }

        let delay = back_off_policy
            .get((attempt - 1) as usize)
            .copied()
            .or_else(|| back_off_policy.last().copied())
            .unwrap_or(Duration::from_secs(1));
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl EmailDispatchPort for Dispatcher {
    async fn dispatch(&self, request: SendRequest) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(request).await.is_err() {
            tracing::error!("email dispatcher channel closed, dropping send request");
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn drain(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                tracing::warn!("dispatcher drain timed out with sends still in flight");
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use domain::ports::SendMetadata;
    use futures::future::BoxFuture;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    fn message() -> domain::ports::OutgoingMessage {
        domain::ports::OutgoingMessage {
            from: "noreply@example.com".into(),
            to: "bob@example.com".into(),
            subject: "hi".into(),
            template: "password-reset.html".into(),
            content: HashMap::new(),
        }
    }

    fn metadata() -> SendMetadata {
        SendMetadata {
            kind: domain::ports::SendKind::PasswordReset,
            reference_id: 1,
            token: "tok".into(),
            recipient: "bob@example.com".into(),
        }
    }

    #[tokio::test]
    async fn successful_send_invokes_callback_once() {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = Dispatcher::new(transport.clone(), 1, 8);

        let outcomes: Arc<StdMutex<Vec<DeliveryOutcome>>> = Arc::new(StdMutex::new(Vec::new()));
        let outcomes_clone = outcomes.clone();
        let callback: domain::ports::DeliveryCallback = Box::new(move |_meta, outcome| {
            let outcomes = outcomes_clone.clone();
            Box::pin(async move {
                outcomes.lock().unwrap().push(outcome);
            }) as BoxFuture<'static, ()>
        });

        dispatcher
            .dispatch(SendRequest {
                message: message(),
                metadata: metadata(),
                back_off_policy: vec![Duration::from_millis(1)],
                max_attempts: 3,
                callback,
            })
            .await;

        dispatcher.drain(Duration::from_secs(1)).await;

        let recorded = outcomes.lock().unwrap().clone();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].status, DeliveryStatus::Sent);
        assert!(recorded[0].r#final);
        assert_eq!(transport.count().await, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_report_final_failure() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_next(3);
        let dispatcher = Dispatcher::new(transport.clone(), 1, 8);

        let outcomes: Arc<StdMutex<Vec<DeliveryOutcome>>> = Arc::new(StdMutex::new(Vec::new()));
        let outcomes_clone = outcomes.clone();
        let callback: domain::ports::DeliveryCallback = Box::new(move |_meta, outcome| {
            let outcomes = outcomes_clone.clone();
            Box::pin(async move {
                outcomes.lock().unwrap().push(outcome);
            }) as BoxFuture<'static, ()>
        });

        dispatcher
            .dispatch(SendRequest {
                message: message(),
                metadata: metadata(),
                back_off_policy: vec![
                    Duration::from_millis(5),
                    Duration::from_millis(5),
                    Duration::from_millis(5),
                ],
                max_attempts: 3,
                callback,
            })
            .await;

        dispatcher.drain(Duration::from_secs(2)).await;

        let recorded = outcomes.lock().unwrap().clone();
        assert_eq!(recorded.len(), 3);
        assert!(recorded[..2].iter().all(|o| !o.r#final));
        assert!(recorded[2].r#final);
        assert_eq!(recorded[2].status, DeliveryStatus::Failed);
    }
}
