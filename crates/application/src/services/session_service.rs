//! Session service (C7): login / refresh / logout / change-password, including refresh-token
//! family theft detection.
//!
//! One struct of `Arc<dyn Port>` fields plus a signer, one method per public operation. Refresh
//! tokens are modeled as a family/generation chain rather than a single revocable row, since theft
//! detection needs a row-level lock held across the read-compare-write, not a plain update.
use std::sync::Arc;

use chrono::Utc;

use core_services::hashing::verify_password;
use core_services::jwt::JwtService;
use core_services::token::{generate_family_id, generate_opaque_token};
use core_services::tx::Runner;
use domain::errors::{AuthError, RepositoryError};
use domain::models::{
    AccessClaims, Account, AccountProfile, AuthEventType, NewAuthEvent, NewRefreshToken,
    RefreshToken, TokenPair,
};
use domain::ports::{
    AccountRepositoryPort, PermissionRepositoryPort, PersonRepositoryPort,
    RefreshTokenRepositoryPort, RoleRepositoryPort,
};
use domain::tx::Context;
use domain::value_objects::Email;

use crate::audit::AuditWriter;
use crate::config::AuthConfig;

/// Bound on family-id regeneration when `(family_id, generation)` collides at login.
const MAX_FAMILY_COLLISION_RETRIES: usize = 3;

pub struct SessionService {
    accounts: Arc<dyn AccountRepositoryPort>,
    refresh_tokens: Arc<dyn RefreshTokenRepositoryPort>,
    roles: Arc<dyn RoleRepositoryPort>,
    permissions: Arc<dyn PermissionRepositoryPort>,
    persons: Arc<dyn PersonRepositoryPort>,
    jwt: Arc<JwtService>,
    tx: Runner,
    audit: AuditWriter,
    config: Arc<AuthConfig>,
}

impl SessionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<dyn AccountRepositoryPort>,
        refresh_tokens: Arc<dyn RefreshTokenRepositoryPort>,
        roles: Arc<dyn RoleRepositoryPort>,
        permissions: Arc<dyn PermissionRepositoryPort>,
        persons: Arc<dyn PersonRepositoryPort>,
        jwt: Arc<JwtService>,
        tx: Runner,
        audit: AuditWriter,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            accounts,
            refresh_tokens,
            roles,
            permissions,
            persons,
            jwt,
            tx,
            audit,
            config,
        }
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        mobile: bool,
        identifier: Option<String>,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<TokenPair, AuthError> {
        let email = Email::try_from(email).map_err(|_| AuthError::InvalidCredentials)?;
        let read_ctx = self.tx.root_context();

        let account = match self.accounts.find_by_email(&read_ctx, &email).await? {
            Some(account) => account,
            None => {
                self.audit_failure(0, AuthEventType::Login, &ip, &user_agent, "account not found");
                return Err(AuthError::AccountNotFound);
            }
        };

        if !account.active {
            self.audit_failure(
                account.id,
                AuthEventType::Login,
                &ip,
                &user_agent,
                "account inactive",
            );
            return Err(AuthError::AccountInactive);
        }

        let password_ok = match &account.password_hash {
            Some(hash) => verify_password(password, hash).unwrap_or(false),
            None => false,
        };
        if !password_ok {
            self.audit_failure(
                account.id,
                AuthEventType::Login,
                &ip,
                &user_agent,
                "invalid credentials",
            );
            return Err(AuthError::InvalidCredentials);
        }

        let max_sessions = self.config.max_sessions_per_account;
        let refresh_lifetime = self.config.jwt_refresh_lifetime();
        let account_id = account.id;

        let refresh_row = self
            .tx
            .run_in_tx(&read_ctx, |ctx| async move {
                self.refresh_tokens
                    .cleanup_old_for_account(&ctx, account_id, (max_sessions - 1).max(0))
                    .await?;

                let row = self
                    .create_refresh_token_with_retry(
                        &ctx,
                        account_id,
                        generate_family_id(),
                        0,
                        refresh_lifetime,
                        mobile,
                        identifier.clone(),
                    )
                    .await?;

                self.accounts.update_last_login(&ctx, account_id).await?;
                Ok::<_, AuthError>(row)
            })
            .await?;

        let pair = self.sign_session(&read_ctx, &account, &refresh_row).await?;

        self.audit.log(
            NewAuthEvent::new(account.id, AuthEventType::Login, true)
                .with_request_info(ip, user_agent),
        );

        Ok(pair)
    }

    pub async fn refresh(
        &self,
        refresh_credential: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<TokenPair, AuthError> {
        let claims = self
            .jwt
            .verify_refresh_token(refresh_credential)
            .map_err(|_| AuthError::InvalidToken)?;

        let root_ctx = self.tx.root_context();
        let refresh_lifetime = self.config.jwt_refresh_lifetime();
        let token_string = claims.refresh_token_string;

        let (new_row, account) = self
            .tx
            .run_in_tx(&root_ctx, |ctx| async move {
                let row = self
                    .refresh_tokens
                    .find_by_token_for_update(&ctx, &token_string)
                    .await?
                    .ok_or(AuthError::TokenNotFound)?;

                if Utc::now() > row.expiry {
                    self.refresh_tokens.delete(&ctx, row.id).await?;
                    self.audit_failure_ctx(
                        row.account_id,
                        AuthEventType::TokenExpired,
                        &ip,
                        &user_agent,
                        "refresh token expired",
                    );
                    return Err(AuthError::TokenExpired);
                }

                if let Some(latest) = self
                    .refresh_tokens
                    .get_latest_in_family(&ctx, row.family_id)
                    .await?
                {
                    if latest.generation > row.generation {
                        self.refresh_tokens
                            .delete_by_family_id(&ctx, row.family_id)
                            .await?;
                        self.audit_failure_ctx(
                            row.account_id,
                            AuthEventType::TokenRefresh,
                            &ip,
                            &user_agent,
                            "refresh token family theft detected",
                        );
                        return Err(AuthError::InvalidToken);
                    }
                }

                let account = self
                    .accounts
                    .find_by_id(&ctx, row.account_id)
                    .await?
                    .ok_or(AuthError::AccountNotFound)?;

                if !account.active {
                    self.audit_failure_ctx(
                        account.id,
                        AuthEventType::TokenRefresh,
                        &ip,
                        &user_agent,
                        "account inactive",
                    );
                    return Err(AuthError::AccountInactive);
                }

                self.refresh_tokens.delete(&ctx, row.id).await?;
                let new_row = self
                    .refresh_tokens
                    .create(
                        &ctx,
                        &NewRefreshToken {
                            account_id: row.account_id,
                            token: generate_opaque_token(),
                            expiry: Utc::now() + refresh_lifetime,
                            mobile: row.mobile,
                            identifier: row.identifier.clone(),
                            family_id: row.family_id,
                            generation: row.generation + 1,
                        },
                    )
                    .await?;

                self.accounts.update_last_login(&ctx, account.id).await?;

                Ok::<_, AuthError>((new_row, account))
            })
            .await?;

        let pair = self.sign_session(&root_ctx, &account, &new_row).await?;

        self.audit.log(
            NewAuthEvent::new(account.id, AuthEventType::TokenRefresh, true)
                .with_request_info(ip, user_agent),
        );

        Ok(pair)
    }

    pub async fn logout(
        &self,
        refresh_credential: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(), AuthError> {
        let claims = self
            .jwt
            .verify_refresh_token(refresh_credential)
            .map_err(|_| AuthError::InvalidToken)?;

        let ctx = self.tx.root_context();
        let row = self
            .refresh_tokens
            .find_by_token(&ctx, &claims.refresh_token_string)
            .await?;

        let Some(row) = row else {
            return Ok(());
        };

        self.refresh_tokens
            .delete_by_account_id(&ctx, row.account_id)
            .await?;

        self.audit.log(
            NewAuthEvent::new(row.account_id, AuthEventType::Logout, true)
                .with_request_info(ip, user_agent),
        );

        Ok(())
    }

    /// Does not invalidate other sessions; that's a deliberate difference from
    /// `PasswordResetService::reset`, which does.
    pub async fn change_password(
        &self,
        account_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let ctx = self.tx.root_context();
        let account = self
            .accounts
            .find_by_id(&ctx, account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let current_ok = match &account.password_hash {
            Some(hash) => verify_password(current_password, hash).unwrap_or(false),
            None => false,
        };
        if !current_ok {
            return Err(AuthError::InvalidCredentials);
        }

        core_services::hashing::validate_password_strength(new_password)
            .map_err(AuthError::PasswordTooWeak)?;

        let new_hash = core_services::hashing::hash_password(new_password)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        self.accounts
            .update_password(&ctx, account_id, &new_hash)
            .await?;

        Ok(())
    }

    async fn create_refresh_token_with_retry(
        &self,
        ctx: &Context,
        account_id: i64,
        mut family_id: i64,
        generation: i32,
        lifetime: chrono::Duration,
        mobile: bool,
        identifier: Option<String>,
    ) -> Result<RefreshToken, AuthError> {
        for attempt in 0..MAX_FAMILY_COLLISION_RETRIES {
            let new_token = NewRefreshToken {
                account_id,
                token: generate_opaque_token(),
                expiry: Utc::now() + lifetime,
                mobile,
                identifier: identifier.clone(),
                family_id,
                generation,
            };

            match self.refresh_tokens.create(ctx, &new_token).await {
                Ok(row) => return Ok(row),
                Err(RepositoryError::Duplicate(_)) if attempt + 1 < MAX_FAMILY_COLLISION_RETRIES => {
                    tracing::warn!(attempt, "refresh token family_id collision, regenerating");
                    family_id = generate_family_id();
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::Internal(
            "exhausted refresh token family_id collision retries".to_string(),
        ))
    }

    /// Builds the signed access/refresh pair from a freshly-written refresh row. Role,
    /// permission, and person loads are best-effort: a failure logs and proceeds with an empty
    /// set rather than failing the whole operation.
    async fn sign_session(
        &self,
        ctx: &Context,
        account: &Account,
        refresh_row: &RefreshToken,
    ) -> Result<TokenPair, AuthError> {
        let profile = self.load_profile(ctx, account).await;

        let claims = AccessClaims {
            account_id: account.id,
            sub: account.email.as_str().to_string(),
            username: account.username.as_ref().map(|u| u.as_str().to_string()),
            first_name: profile.first_name,
            last_name: profile.last_name,
            roles: profile.roles.clone(),
            permissions: profile.permissions,
            is_admin: profile.roles.iter().any(|r| r == "admin"),
            is_teacher: profile.roles.iter().any(|r| r == "teacher"),
            iat: 0,
            exp: 0,
        };

        let access_lifetime = self.config.jwt_access_lifetime();
        let access_token = self
            .jwt
            .generate_access_token(claims, access_lifetime)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let refresh_token = self
            .jwt
            .generate_refresh_token(refresh_row.id, &refresh_row.token, self.config.jwt_refresh_lifetime())
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: access_lifetime.num_seconds(),
        })
    }

    async fn load_profile(&self, ctx: &Context, account: &Account) -> AccountProfile {
        let roles = match self.roles.find_by_account_id(ctx, account.id).await {
            Ok(roles) => roles.into_iter().map(|r| r.name).collect(),
            Err(e) => {
                tracing::warn!(account_id = account.id, error = %e, "failed to load roles for session claims");
                Vec::new()
            }
        };

        let permissions = match self.permissions.find_by_account_id(ctx, account.id).await {
            Ok(perms) => perms.iter().map(|p| p.full_name()).collect(),
            Err(e) => {
                tracing::warn!(account_id = account.id, error = %e, "failed to load permissions for session claims");
                Vec::new()
            }
        };

        let (first_name, last_name) = match self.persons.find_by_account_id(ctx, account.id).await {
            Ok(Some(person)) => (person.first_name, person.last_name),
            Ok(None) => (String::new(), String::new()),
            Err(e) => {
                tracing::warn!(account_id = account.id, error = %e, "failed to load person for session claims");
                (String::new(), String::new())
            }
        };

        AccountProfile {
            account: account.clone(),
            first_name,
            last_name,
            roles,
            permissions,
        }
    }

    fn audit_failure(
        &self,
        account_id: i64,
        event_type: AuthEventType,
        ip: &Option<String>,
        user_agent: &Option<String>,
        error: &str,
    ) {
        self.audit.log(
            NewAuthEvent::new(account_id, event_type, false)
                .with_request_info(ip.clone(), user_agent.clone())
                .with_error(error),
        );
    }

    /// Same as [`Self::audit_failure`], named separately at call sites inside a transaction body
    /// so it's clear the audit write itself is never part of that transaction — `AuditWriter`
    /// always spawns against its own detached context.
    fn audit_failure_ctx(
        &self,
        account_id: i64,
        event_type: AuthEventType,
        ip: &Option<String>,
        user_agent: &Option<String>,
        error: &str,
    ) {
        self.audit_failure(account_id, event_type, ip, user_agent, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_services::hashing::hash_password;
    use core_services::tx::FakeTransactionRunner;
    use domain::models::NewAccount;
    use persistence::fake::{
        FakeAccountRepository, FakeAuthStore, FakeAuthEventRepository, FakePermissionRepository,
        FakePersonRepository, FakeRefreshTokenRepository, FakeRoleRepository,
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

    async fn make_service() -> (SessionService, Arc<FakeAuthStore>, i64) {
        let store = FakeAuthStore::new();
        let runner = Runner::Fake(FakeTransactionRunner::new());
        let audit = AuditWriter::new(
            Arc::new(FakeAuthEventRepository(store.clone())),
            runner.root_context(),
        );
        let accounts = Arc::new(FakeAccountRepository(store.clone()));
        let hash = hash_password("Str0ng!Pass").unwrap();
        let account = accounts
            .create(
                &runner.root_context(),
                &NewAccount {
                    email: Email::try_from("alice@example.com").unwrap(),
                    username: None,
                    password_hash: Some(hash),
                },
            )
            .await
            .unwrap();

        let service = SessionService::new(
            accounts,
            Arc::new(FakeRefreshTokenRepository(store.clone())),
            Arc::new(FakeRoleRepository(store.clone())),
            Arc::new(FakePermissionRepository(store.clone())),
            Arc::new(FakePersonRepository(store.clone())),
            Arc::new(JwtService::new(b"0123456789abcdef0123456789abcdef")),
            runner,
            audit,
            config(),
        );

        (service, store, account.id)
    }

    #[tokio::test]
    async fn login_then_refresh_rotates_and_detects_replay() {
        let (service, _store, _id) = make_service().await;

        let first = service
            .login("alice@example.com", "Str0ng!Pass", false, None, None, None)
            .await
            .unwrap();

        let second = service
            .refresh(&first.refresh_token, None, None)
            .await
            .unwrap();
        assert_ne!(first.access_token, second.access_token);
        assert_ne!(first.refresh_token, second.refresh_token);

        let replay = service.refresh(&first.refresh_token, None, None).await;
        assert!(matches!(replay, Err(AuthError::InvalidToken)));

        let reuse_latest = service.refresh(&second.refresh_token, None, None).await;
        assert!(reuse_latest.is_ok());
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let (service, _store, _id) = make_service().await;
        let result = service
            .login("alice@example.com", "wrong", false, None, None, None)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (service, _store, _id) = make_service().await;
        let pair = service
            .login("alice@example.com", "Str0ng!Pass", false, None, None, None)
            .await
            .unwrap();

        service.logout(&pair.refresh_token, None, None).await.unwrap();
        service.logout(&pair.refresh_token, None, None).await.unwrap();

        let after = service.refresh(&pair.refresh_token, None, None).await;
        assert!(matches!(after, Err(AuthError::TokenNotFound)));
    }

    #[tokio::test]
    async fn change_password_does_not_invalidate_sessions() {
        let (service, _store, id) = make_service().await;
        let pair = service
            .login("alice@example.com", "Str0ng!Pass", false, None, None, None)
            .await
            .unwrap();

        service
            .change_password(id, "Str0ng!Pass", "N3wPa$$word")
            .await
            .unwrap();

        let refreshed = service.refresh(&pair.refresh_token, None, None).await;
        assert!(refreshed.is_ok());
    }

    #[tokio::test]
    async fn session_cap_holds_after_repeated_logins() {
        let (service, _store, id) = make_service().await;
        for _ in 0..(config().max_sessions_per_account + 3) {
            service
                .login("alice@example.com", "Str0ng!Pass", false, None, None, None)
                .await
                .unwrap();
        }

        let count = service
            .refresh_tokens
            .count_for_account(&Context::Fake { bound: false }, id)
            .await
            .unwrap();
        assert!(count <= config().max_sessions_per_account);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refresh_exactly_one_succeeds() {
        let (service, _store, id) = make_service().await;
        let first = service
            .login("alice@example.com", "Str0ng!Pass", false, None, None, None)
            .await
            .unwrap();

        let service = Arc::new(service);
        let mut handles = Vec::new();
        for _ in 0..10 {
            let service = service.clone();
            let token = first.refresh_token.clone();
            handles.push(tokio::spawn(async move {
                service.refresh(&token, None, None).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AuthError::InvalidToken) | Err(AuthError::TokenNotFound) => {}
                Err(other) => panic!("unexpected error from concurrent refresh: {other:?}"),
            }
        }
        assert_eq!(successes, 1);

        let remaining = service
            .refresh_tokens
            .count_for_account(&Context::Fake { bound: false }, id)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }
}
