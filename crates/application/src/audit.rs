//! Fire-and-forget audit writes: spawn a task so the caller's response is never delayed, log on
//! failure rather than propagating it. The write runs inside a bounded detached context — a
//! 5-second `tokio::time::timeout` — so a stalled store connection can't leak tasks forever.
use domain::models::NewAuthEvent;
use domain::ports::AuthEventRepositoryPort;
use domain::tx::Context;
use std::sync::Arc;
use std::time::Duration;

const AUDIT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AuditWriter {
    repo: Arc<dyn AuthEventRepositoryPort>,
    root_ctx: Context,
}

impl AuditWriter {
    pub fn new(repo: Arc<dyn AuthEventRepositoryPort>, root_ctx: Context) -> Self {
        Self { repo, root_ctx }
    }

    /// Enqueues `event` for writing and returns immediately.
    pub fn log(&self, event: NewAuthEvent) {
        let repo = self.repo.clone();
        let ctx = self.root_ctx.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(AUDIT_WRITE_TIMEOUT, repo.create(&ctx, &event)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, event_type = event.event_type.as_str(), "failed to write audit event");
                }
                Err(_) => {
                    tracing::error!(event_type = event.event_type.as_str(), "audit event write timed out");
                }
            }
        });
    }
}
