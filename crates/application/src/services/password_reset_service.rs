//! Password reset service (C8): rate-limited issuance of single-use reset tokens and
//! transactional password change that purges every session for the account.
//!
//! The reset credential is an opaque store-backed token rather than a signed one, so it can be
//! revoked outright by deleting the row instead of only expiring with its signature; issuance is
//! gated by the windowed limiter (C6).
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;

use core_services::hashing::{hash_password, validate_password_strength};
use core_services::rate_limit::is_rate_limited;
use core_services::token::generate_opaque_token;
use core_services::tx::Runner;
use domain::errors::AuthError;
use domain::models::NewPasswordResetToken;
use domain::ports::{
    AccountRepositoryPort, DeliveryCallback, DeliveryStatus, EmailDispatchPort,
    OutgoingMessage, PasswordResetRepositoryPort, RateLimitRepositoryPort,
    RefreshTokenRepositoryPort, SendKind, SendMetadata, SendRequest,
};
use domain::tx::Context;
use domain::value_objects::Email;

use crate::config::AuthConfig;

pub struct PasswordResetService {
    accounts: Arc<dyn AccountRepositoryPort>,
    reset_tokens: Arc<dyn PasswordResetRepositoryPort>,
    refresh_tokens: Arc<dyn RefreshTokenRepositoryPort>,
    rate_limits: Arc<dyn RateLimitRepositoryPort>,
    dispatcher: Arc<dyn EmailDispatchPort>,
    tx: Runner,
    config: Arc<AuthConfig>,
}

impl PasswordResetService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<dyn AccountRepositoryPort>,
        reset_tokens: Arc<dyn PasswordResetRepositoryPort>,
        refresh_tokens: Arc<dyn RefreshTokenRepositoryPort>,
        rate_limits: Arc<dyn RateLimitRepositoryPort>,
        dispatcher: Arc<dyn EmailDispatchPort>,
        tx: Runner,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            accounts,
            reset_tokens,
            refresh_tokens,
            rate_limits,
            dispatcher,
            tx,
            config,
        }
    }

    /// Always returns `Ok(())` for an unknown e-mail, to not disclose account existence.
    pub async fn initiate(&self, email: &str) -> Result<(), AuthError> {
        let Ok(email) = Email::try_from(email) else {
            return Ok(());
        };

        let ctx = self.tx.root_context();
        let account = match self.accounts.find_by_email(&ctx, &email).await? {
            Some(account) => account,
            None => return Ok(()),
        };

        let reset_expiry = self.config.password_reset_expiry();
        let rate_limit_window = self.config.password_reset_rate_limit_window();
        let threshold = self.config.password_reset_rate_limit_threshold;
        let rate_limit_enabled = self.config.password_reset_rate_limit_enabled;
        let key = account.email.as_str().to_string();
        let account_id = account.id;

        let reset_row = self
            .tx
            .run_in_tx(&ctx, |ctx| async move {
                if rate_limit_enabled {
                    if let Some(window) = self.rate_limits.check(&ctx, &key).await? {
                        if is_rate_limited(&window, Utc::now(), threshold, rate_limit_window) {
                            let retry_at = window.retry_at(rate_limit_window);
                            return Err(AuthError::RateLimitExceeded {
                                attempts: window.attempts,
                                retry_at,
                                retry_after_seconds: (retry_at - Utc::now()).num_seconds().max(0),
                            });
                        }
                    }
                    self.rate_limits.increment(&ctx, &key).await?;
                }

                self.reset_tokens
                    .invalidate_by_account_id(&ctx, account_id)
                    .await?;

                let row = self
                    .reset_tokens
                    .create(
                        &ctx,
                        &NewPasswordResetToken {
                            account_id,
                            token: generate_opaque_token(),
                            expiry: Utc::now() + reset_expiry,
                        },
                    )
                    .await?;

                Ok::<_, AuthError>(row)
            })
            .await?;

        let mut content = HashMap::new();
        content.insert(
            "ResetURL".to_string(),
            format!(
                "{}/reset-password?token={}",
                self.config.frontend_url, reset_row.token
            ),
        );
        content.insert(
            "ExpiryMinutes".to_string(),
            (reset_expiry.num_minutes()).to_string(),
        );
        content.insert(
            "LogoURL".to_string(),
            format!("{}/logo.png", self.config.frontend_url),
        );

        self.dispatcher
            .dispatch(SendRequest {
                message: OutgoingMessage {
                    from: self.config.email_default_from.clone(),
                    to: account.email.as_str().to_string(),
                    subject: "Reset your password".to_string(),
                    template: "password-reset.html".to_string(),
                    content,
                },
                metadata: SendMetadata {
                    kind: SendKind::PasswordReset,
                    reference_id: reset_row.id,
                    token: reset_row.token.clone(),
                    recipient: account.email.as_str().to_string(),
                },
                back_off_policy: self.config.email_retry_backoff(),
                max_attempts: self.config.email_max_attempts,
                callback: reset_delivery_callback(self.reset_tokens.clone(), self.tx.root_context()),
            })
            .await;

        Ok(())
    }

    pub async fn reset(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let ctx = self.tx.root_context();
        let reset_row = self
            .reset_tokens
            .find_valid_by_token(&ctx, token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        validate_password_strength(new_password).map_err(AuthError::PasswordTooWeak)?;
        let new_hash =
            hash_password(new_password).map_err(|e| AuthError::Internal(e.to_string()))?;

        self.tx
            .run_in_tx(&ctx, |ctx| async move {
                self.accounts
                    .update_password(&ctx, reset_row.account_id, &new_hash)
                    .await?;
                self.reset_tokens.mark_used(&ctx, reset_row.id).await?;
                self.refresh_tokens
                    .delete_by_account_id(&ctx, reset_row.account_id)
                    .await?;
                Ok::<_, AuthError>(())
            })
            .await
    }
}

fn reset_delivery_callback(
    repo: Arc<dyn PasswordResetRepositoryPort>,
    ctx: Context,
) -> DeliveryCallback {
    Box::new(move |metadata, outcome| {
        let repo = repo.clone();
        let ctx = ctx.clone();
        Box::pin(async move {
            let sent_at = match outcome.status {
                DeliveryStatus::Sent => outcome.sent_at,
                DeliveryStatus::Failed => None,
            };
            if let Err(e) = repo
                .update_delivery_result(
                    &ctx,
                    metadata.reference_id,
                    sent_at,
                    outcome.err.clone(),
                    outcome.attempt as i32,
                )
                .await
            {
                tracing::error!(
                    error = %e,
                    reference_id = metadata.reference_id,
                    "failed to persist password reset delivery state"
                );
            }
        }) as BoxFuture<'static, ()>
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_services::tx::FakeTransactionRunner;
    use domain::models::{NewAccount, NewRefreshToken};
    use email_service::MockTransport;
    use email_service::Dispatcher;
    use persistence::fake::{FakeAccountRepository, FakeAuthStore, FakePasswordResetRepository, FakeRateLimitRepository, FakeRefreshTokenRepository};

    fn config() -> Arc<AuthConfig> {
        Arc::new(AuthConfig {
            frontend_url: "https://app.example.com".to_string(),
            jwt_signing_key: "x".repeat(32),
            email_default_from: "noreply@example.com".to_string(),
            jwt_access_lifetime_secs: 900,
            jwt_refresh_lifetime_secs: 86400,
            password_reset_expiry_secs: 1800,
            password_reset_rate_limit_window_secs: 3600,
            password_reset_rate_limit_threshold: 3,
            password_reset_rate_limit_enabled: true,
            invitation_expiry_secs: 172800,
            max_sessions_per_account: 5,
            email_retry_backoff: "1,5,15".to_string(),
            email_max_attempts: 3,
        })
    }

    async fn make_service() -> (PasswordResetService, Arc<FakeAuthStore>, Arc<MockTransport>, i64) {
        make_service_with_config(config()).await
    }

    async fn make_service_with_config(
        cfg: Arc<AuthConfig>,
    ) -> (PasswordResetService, Arc<FakeAuthStore>, Arc<MockTransport>, i64) {
        let store = FakeAuthStore::new();
        let runner = Runner::Fake(FakeTransactionRunner::new());
        let accounts = Arc::new(FakeAccountRepository(store.clone()));
        let account = accounts
            .create(
                &runner.root_context(),
                &NewAccount {
                    email: Email::try_from("bob@example.com").unwrap(),
                    username: None,
                    password_hash: Some(hash_password("Str0ng!Pass").unwrap()),
                },
            )
            .await
            .unwrap();

        let refresh_tokens = Arc::new(FakeRefreshTokenRepository(store.clone()));
        for i in 0..3 {
            refresh_tokens
                .create(
                    &runner.root_context(),
                    &NewRefreshToken {
                        account_id: account.id,
                        token: format!("seed-{i}"),
                        expiry: Utc::now() + chrono::Duration::hours(24),
                        mobile: false,
                        identifier: None,
                        family_id: 1000 + i,
                        generation: 0,
                    },
                )
                .await
                .unwrap();
        }

        let transport = Arc::new(MockTransport::new());
        let dispatcher = Arc::new(Dispatcher::new(transport.clone(), 1, 8));

        let service = PasswordResetService::new(
            accounts,
            Arc::new(FakePasswordResetRepository(store.clone())),
            refresh_tokens,
            Arc::new(FakeRateLimitRepository::new(store.clone(), chrono::Duration::hours(1))),
            dispatcher,
            runner,
            cfg,
        );

        (service, store, transport, account.id)
    }

    fn token_from_reset_url(reset_url: &str) -> String {
        reset_url.split("token=").nth(1).unwrap().to_string()
    }

    #[tokio::test]
    async fn initiate_on_unknown_email_is_silently_ok() {
        let (service, _store, _transport, _id) = make_service().await;
        assert!(service.initiate("ghost@example.com").await.is_ok());
    }

    #[tokio::test]
    async fn reset_kills_every_session() {
        let (service, store, transport, id) = make_service().await;
        service.initiate("bob@example.com").await.unwrap();
        for _ in 0..50 {
            if transport.count().await >= 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let sent = transport.sent_messages().await;
        let token = token_from_reset_url(sent.last().unwrap().content.get("ResetURL").unwrap());

        service.reset(&token, "N3wPa$$word").await.unwrap();

        let refresh_tokens = Arc::new(FakeRefreshTokenRepository(store.clone()));
        let remaining = refresh_tokens
            .count_for_account(&Context::Fake { bound: false }, id)
            .await
            .unwrap();
        assert_eq!(remaining, 0);

        let second = service.reset(&token, "An0ther!Pass").await;
        assert!(matches!(second, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn fourth_initiate_within_window_is_rate_limited() {
        let (service, _store, _transport, _id) = make_service().await;
        for _ in 0..3 {
            service.initiate("bob@example.com").await.unwrap();
        }
        let fourth = service.initiate("bob@example.com").await;
        assert!(matches!(fourth, Err(AuthError::RateLimitExceeded { .. })));
    }

    #[tokio::test]
    async fn initiate_records_delivery_failure_on_reset_token_row() {
        let mut cfg = config();
        Arc::make_mut(&mut cfg).email_retry_backoff = "0,0,0".to_string();
        let (service, store, transport, id) = make_service_with_config(cfg).await;
        transport.fail_next(3);

        service.initiate("bob@example.com").await.unwrap();

        let row = loop {
            let rows = store.reset_tokens_for_account(id).await;
            if let Some(row) = rows.into_iter().find(|r| r.email_retry_count >= 3) {
                break row;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        };

        assert_eq!(row.email_retry_count, 3);
        assert!(row.email_error.is_some());
        assert!(row.email_sent_at.is_none());
        assert_eq!(transport.count().await, 0);
    }
}
