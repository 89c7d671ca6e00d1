//! Invitation service (C9): issue / validate / accept / resend / revoke onboarding invitations.
//!
//! Follows the same repository-plus-dispatcher shape as
//! [`crate::services::password_reset_service::PasswordResetService`]: accept creates the person,
//! account, and role assignment, then consumes the invitation, all inside one transaction.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use core_services::hashing::{hash_password, validate_password_strength};
use core_services::token::generate_opaque_token;
use core_services::tx::Runner;
use domain::errors::AuthError;
use domain::models::{
    InvitationSummary, InvitationToken, NewAccount, NewInvitation, NewPerson,
};
use domain::ports::{
    AccountRepositoryPort, AccountRoleRepositoryPort, DeliveryCallback, DeliveryStatus,
    EmailDispatchPort, InvitationListFilter, InvitationRepositoryPort, OutgoingMessage,
    PersonRepositoryPort, RoleRepositoryPort, SendKind, SendMetadata, SendRequest,
};
use domain::tx::Context;
use domain::value_objects::Email;

use crate::config::AuthConfig;

/// Fields supplied by the invitee at acceptance time.
pub struct AcceptRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: String,
    pub confirm: String,
}

pub struct InvitationService {
    accounts: Arc<dyn AccountRepositoryPort>,
    invitations: Arc<dyn InvitationRepositoryPort>,
    roles: Arc<dyn RoleRepositoryPort>,
    persons: Arc<dyn PersonRepositoryPort>,
    account_roles: Arc<dyn AccountRoleRepositoryPort>,
    dispatcher: Arc<dyn EmailDispatchPort>,
    tx: Runner,
    config: Arc<AuthConfig>,
}

impl InvitationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<dyn AccountRepositoryPort>,
        invitations: Arc<dyn InvitationRepositoryPort>,
        roles: Arc<dyn RoleRepositoryPort>,
        persons: Arc<dyn PersonRepositoryPort>,
        account_roles: Arc<dyn AccountRoleRepositoryPort>,
        dispatcher: Arc<dyn EmailDispatchPort>,
        tx: Runner,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            accounts,
            invitations,
            roles,
            persons,
            account_roles,
            dispatcher,
            tx,
            config,
        }
    }

    pub async fn create(
        &self,
        email: &str,
        role_id: i64,
        created_by: i64,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<InvitationToken, AuthError> {
        let email = Email::try_from(email).map_err(AuthError::InvalidEmail)?;
        let ctx = self.tx.root_context();

        if self.accounts.find_by_email(&ctx, &email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        self.roles
            .find_by_id(&ctx, role_id)
            .await?
            .ok_or(AuthError::RoleNotFound)?;

        let invitation_expiry = self.config.invitation_expiry();
        let email_key = email.as_str().to_string();

        let invitation = self
            .tx
            .run_in_tx(&ctx, |ctx| async move {
                self.invitations.invalidate_by_email(&ctx, &email_key).await?;

                let row = self
                    .invitations
                    .create(
                        &ctx,
                        &NewInvitation {
                            email: email_key.clone(),
                            token: generate_opaque_token(),
                            role_id,
                            created_by,
                            expires_at: Utc::now() + invitation_expiry,
                            first_name: first_name.clone(),
                            last_name: last_name.clone(),
                        },
                    )
                    .await?;

                Ok::<_, AuthError>(row)
            })
            .await?;

        self.dispatch_invitation(&invitation, invitation_expiry).await;

        Ok(invitation)
    }

    pub async fn validate(&self, token: &str) -> Result<InvitationSummary, AuthError> {
        let ctx = self.tx.root_context();
        let invitation = self
            .invitations
            .find_by_token(&ctx, token)
            .await?
            .ok_or(AuthError::InvitationNotFound)?;

        let now = Utc::now();
        if invitation.is_used() {
            return Err(AuthError::InvitationUsed);
        }
        if invitation.is_expired(now) {
            return Err(AuthError::InvitationExpired);
        }

        let role = self
            .roles
            .find_by_id(&ctx, invitation.role_id)
            .await?
            .ok_or(AuthError::RoleNotFound)?;

        Ok(InvitationSummary {
            email: invitation.email,
            role_name: role.name,
            first_name: invitation.first_name,
            last_name: invitation.last_name,
            expires_at: invitation.expires_at,
        })
    }

    pub async fn accept(
        &self,
        token: &str,
        request: AcceptRequest,
    ) -> Result<i64, AuthError> {
        let ctx = self.tx.root_context();
        let invitation = self
            .invitations
            .find_by_token(&ctx, token)
            .await?
            .ok_or(AuthError::InvitationNotFound)?;

        let now = Utc::now();
        if invitation.is_used() {
            return Err(AuthError::InvitationUsed);
        }
        if invitation.is_expired(now) {
            return Err(AuthError::InvitationExpired);
        }

        if request.password != request.confirm {
            return Err(AuthError::PasswordMismatch);
        }
        validate_password_strength(&request.password).map_err(AuthError::PasswordTooWeak)?;
        let password_hash =
            hash_password(&request.password).map_err(|e| AuthError::Internal(e.to_string()))?;

        let first_name = request
            .first_name
            .or_else(|| invitation.first_name.clone())
            .unwrap_or_default();
        let last_name = request
            .last_name
            .or_else(|| invitation.last_name.clone())
            .unwrap_or_default();
        if first_name.trim().is_empty() || last_name.trim().is_empty() {
            return Err(AuthError::InvitationNameRequired);
        }

        let email = Email::try_from(invitation.email.as_str()).map_err(AuthError::InvalidEmail)?;
        if self.accounts.find_by_email(&ctx, &email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let invitation_id = invitation.id;
        let role_id = invitation.role_id;

        let account_id = self
            .tx
            .run_in_tx(&ctx, |ctx| async move {
                let person = self
                    .persons
                    .create(
                        &ctx,
                        &NewPerson {
                            first_name: first_name.clone(),
                            last_name: last_name.clone(),
                            account_id: None,
                        },
                    )
                    .await?;

                let account = self
                    .accounts
                    .create(
                        &ctx,
                        &NewAccount {
                            email: email.clone(),
                            username: None,
                            password_hash: Some(password_hash.clone()),
                        },
                    )
                    .await?;

                self.persons.link_account(&ctx, person.id, account.id).await?;
                self.account_roles.assign(&ctx, account.id, role_id).await?;
                self.invitations.mark_used(&ctx, invitation_id, Utc::now()).await?;

                Ok::<_, AuthError>(account.id)
            })
            .await?;

        Ok(account_id)
    }

    /// Fails on an already-used or expired invitation; otherwise resets delivery state and
    /// dispatches again, without issuing a new token.
    pub async fn resend(&self, id: i64, _actor: i64) -> Result<(), AuthError> {
        let ctx = self.tx.root_context();
        let mut invitation = self
            .invitations
            .find_by_id(&ctx, id)
            .await?
            .ok_or(AuthError::InvitationNotFound)?;

        let now = Utc::now();
        if invitation.is_used() {
            return Err(AuthError::InvitationUsed);
        }
        if invitation.is_expired(now) {
            return Err(AuthError::InvitationExpired);
        }

        invitation.email_sent_at = None;
        invitation.email_error = None;
        self.invitations.update(&ctx, &invitation).await?;

        let remaining = invitation.expires_at - now;
        self.dispatch_invitation(&invitation, remaining).await;

        Ok(())
    }

    /// No-op if the invitation is already used.
    pub async fn revoke(&self, id: i64, _actor: i64) -> Result<(), AuthError> {
        let ctx = self.tx.root_context();
        let invitation = self
            .invitations
            .find_by_id(&ctx, id)
            .await?
            .ok_or(AuthError::InvitationNotFound)?;

        if invitation.is_used() {
            return Ok(());
        }

        self.invitations.mark_used(&ctx, id, Utc::now()).await?;
        Ok(())
    }

    pub async fn cleanup_expired(&self) -> Result<u64, AuthError> {
        let ctx = self.tx.root_context();
        Ok(self.invitations.delete_expired(&ctx, Utc::now()).await?)
    }

    pub async fn list(&self, pending: Option<bool>) -> Result<Vec<InvitationToken>, AuthError> {
        let ctx = self.tx.root_context();
        Ok(self
            .invitations
            .list(&ctx, InvitationListFilter { pending })
            .await?)
    }

    async fn dispatch_invitation(&self, invitation: &InvitationToken, expiry: chrono::Duration) {
        let role_name = match self.roles.find_by_id(&self.tx.root_context(), invitation.role_id).await {
            Ok(Some(role)) => role.name,
            Ok(None) => {
                tracing::warn!(role_id = invitation.role_id, "invitation role missing at dispatch time");
                String::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load role name for invitation e-mail");
                String::new()
            }
        };

        let mut content = HashMap::new();
        content.insert(
            "InvitationURL".to_string(),
            format!(
                "{}/accept-invitation?token={}",
                self.config.frontend_url, invitation.token
            ),
        );
        content.insert("RoleName".to_string(), role_name);
        if let Some(first_name) = &invitation.first_name {
            content.insert("FirstName".to_string(), first_name.clone());
        }
        if let Some(last_name) = &invitation.last_name {
            content.insert("LastName".to_string(), last_name.clone());
        }
        content.insert(
            "ExpiryHours".to_string(),
            expiry.num_hours().max(1).to_string(),
        );
        content.insert(
            "LogoURL".to_string(),
            format!("{}/logo.png", self.config.frontend_url),
        );

        self.dispatcher
            .dispatch(SendRequest {
                message: OutgoingMessage {
                    from: self.config.email_default_from.clone(),
                    to: invitation.email.clone(),
                    subject: "You've been invited".to_string(),
                    template: "invitation.html".to_string(),
                    content,
                },
                metadata: SendMetadata {
                    kind: SendKind::Invitation,
                    reference_id: invitation.id,
                    token: invitation.token.clone(),
                    recipient: invitation.email.clone(),
                },
                back_off_policy: self.config.email_retry_backoff(),
                max_attempts: self.config.email_max_attempts,
                callback: invitation_delivery_callback(self.invitations.clone(), self.tx.root_context()),
            })
            .await;
    }
}

fn invitation_delivery_callback(
    repo: Arc<dyn InvitationRepositoryPort>,
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
                    "failed to persist invitation delivery state"
                );
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_services::tx::FakeTransactionRunner;
    use domain::models::NewAccount as NewAccountModel;
    use email_service::{Dispatcher, MockTransport};
    use persistence::fake::{
        FakeAccountRepository, FakeAccountRoleRepository, FakeAuthStore, FakeInvitationRepository,
        FakePersonRepository, FakeRoleRepository,
    };

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

    const TEACHER_ROLE_ID: i64 = 1;

    async fn make_service() -> (InvitationService, Arc<FakeAuthStore>, Arc<MockTransport>, i64) {
        make_service_with_config(config()).await
    }

    async fn make_service_with_config(
        cfg: Arc<AuthConfig>,
    ) -> (InvitationService, Arc<FakeAuthStore>, Arc<MockTransport>, i64) {
        let store = FakeAuthStore::new();
        store.seed_role(TEACHER_ROLE_ID, "teacher").await;
        let runner = Runner::Fake(FakeTransactionRunner::new());
        let roles = Arc::new(FakeRoleRepository(store.clone()));

        let transport = Arc::new(MockTransport::new());
        let dispatcher = Arc::new(Dispatcher::new(transport.clone(), 1, 8));

        let service = InvitationService::new(
            Arc::new(FakeAccountRepository(store.clone())),
            Arc::new(FakeInvitationRepository(store.clone())),
            roles,
            Arc::new(FakePersonRepository(store.clone())),
            Arc::new(FakeAccountRoleRepository(store.clone())),
            dispatcher,
            runner,
            cfg,
        );

        (service, store, transport, TEACHER_ROLE_ID)
    }

    fn token_from_invitation_url(url: &str) -> String {
        url.split("token=").nth(1).unwrap().to_string()
    }

    #[tokio::test]
    async fn create_validate_accept_round_trip() {
        let (service, _store, transport, role_id) = make_service().await;

        let invitation = service
            .create(
                "carol@example.com",
                role_id,
                1,
                Some("Carol".to_string()),
                None,
            )
            .await
            .unwrap();

        let summary = service.validate(&invitation.token).await.unwrap();
        assert_eq!(summary.email, "carol@example.com");
        assert_eq!(summary.role_name, "teacher");
        assert_eq!(summary.first_name.as_deref(), Some("Carol"));

        for _ in 0..50 {
            if transport.count().await >= 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let sent = transport.sent_messages().await;
        assert_eq!(token_from_invitation_url(sent[0].content.get("InvitationURL").unwrap()), invitation.token);

        let account_id = service
            .accept(
                &invitation.token,
                AcceptRequest {
                    first_name: Some("Carol".to_string()),
                    last_name: Some("Diaz".to_string()),
                    password: "Str0ng!Pass".to_string(),
                    confirm: "Str0ng!Pass".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(account_id > 0);

        let after = service.validate(&invitation.token).await;
        assert!(matches!(after, Err(AuthError::InvitationUsed)));
    }

    #[tokio::test]
    async fn create_rejects_existing_email() {
        let (service, store, _transport, role_id) = make_service().await;
        let accounts = Arc::new(FakeAccountRepository(store.clone()));
        let runner = Runner::Fake(FakeTransactionRunner::new());
        accounts
            .create(
                &runner.root_context(),
                &NewAccountModel {
                    email: Email::try_from("dave@example.com").unwrap(),
                    username: None,
                    password_hash: None,
                },
            )
            .await
            .unwrap();

        let result = service.create("dave@example.com", role_id, 1, None, None).await;
        assert!(matches!(result, Err(AuthError::EmailAlreadyExists)));
    }

    #[tokio::test]
    async fn create_rejects_unknown_role() {
        let (service, _store, _transport, _role_id) = make_service().await;
        let result = service.create("erin@example.com", 9999, 1, None, None).await;
        assert!(matches!(result, Err(AuthError::RoleNotFound)));
    }

    #[tokio::test]
    async fn accept_fails_on_password_mismatch_and_persists_nothing() {
        let (service, store, _transport, role_id) = make_service().await;
        let invitation = service
            .create("frank@example.com", role_id, 1, Some("Frank".to_string()), Some("Lee".to_string()))
            .await
            .unwrap();

        let result = service
            .accept(
                &invitation.token,
                AcceptRequest {
                    first_name: None,
                    last_name: None,
                    password: "Str0ng!Pass".to_string(),
                    confirm: "Different!Pass".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AuthError::PasswordMismatch)));

        let accounts = Arc::new(FakeAccountRepository(store.clone()));
        let runner = Runner::Fake(FakeTransactionRunner::new());
        let email = Email::try_from("frank@example.com").unwrap();
        assert!(accounts
            .find_by_email(&runner.root_context(), &email)
            .await
            .unwrap()
            .is_none());

        let still_pending = service.validate(&invitation.token).await;
        assert!(still_pending.is_ok());
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let (service, _store, _transport, role_id) = make_service().await;
        let invitation = service
            .create("gina@example.com", role_id, 1, None, None)
            .await
            .unwrap();

        service.revoke(invitation.id, 1).await.unwrap();
        service.revoke(invitation.id, 1).await.unwrap();

        let result = service.validate(&invitation.token).await;
        assert!(matches!(result, Err(AuthError::InvitationUsed)));
    }

    #[tokio::test]
    async fn create_records_delivery_failure_on_invitation_row() {
        let mut cfg = config();
        Arc::make_mut(&mut cfg).email_retry_backoff = "0,0,0".to_string();
        let (service, store, transport, role_id) = make_service_with_config(cfg).await;
        transport.fail_next(3);

        let invitation = service
            .create("hank@example.com", role_id, 1, None, None)
            .await
            .unwrap();

        let invitations = Arc::new(FakeInvitationRepository(store.clone()));
        let runner = Runner::Fake(FakeTransactionRunner::new());
        let row = loop {
            let row = invitations
                .find_by_id(&runner.root_context(), invitation.id)
                .await
                .unwrap()
                .unwrap();
            if row.email_retry_count >= 3 {
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
