use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_services::rate_limit::{decide_rollover, RolloverDecision};
use domain::errors::RepositoryError;
use domain::models::*;
use domain::ports::*;
use domain::tx::Context;
use domain::value_objects::{Email, Username};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    next_account_id: i64,
    persons: Vec<Person>,
    next_person_id: i64,
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    account_roles: Vec<AccountRole>,
    role_permissions: Vec<RolePermission>,
    account_permissions: Vec<AccountPermission>,
    refresh_tokens: Vec<RefreshToken>,
    next_refresh_id: i64,
    reset_tokens: Vec<PasswordResetToken>,
    next_reset_id: i64,
    invitations: Vec<InvitationToken>,
    next_invitation_id: i64,
    rate_limits: std::collections::HashMap<String, RateLimitWindow>,
    auth_events: Vec<AuthEvent>,
    next_event_id: i64,
}

/// Shared backing state for every fake repository. Seed roles/permissions directly through
/// [`FakeAuthStore::seed_role`] before wiring services in a test — there is no migration path
/// that creates them implicitly, mirroring how the real schema is seeded out of band.
#[derive(Default)]
pub struct FakeAuthStore {
    tables: Mutex<Tables>,
}

impl FakeAuthStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn seed_role(&self, id: i64, name: &str) {
        let mut t = self.tables.lock().await;
        t.roles.push(Role {
            id,
            name: name.to_string(),
            description: None,
        });
    }

    pub async fn seed_account(&self, account: Account) {
        let mut t = self.tables.lock().await;
        t.next_account_id = t.next_account_id.max(account.id + 1);
        t.accounts.push(account);
    }

    /// Test-only inspection hook: the reset-token repository port has no "find by account"
    /// query (services only ever look one up by its token), but delivery-failure tests need to
    /// observe the row's retry/error state without knowing its opaque token up front.
    pub async fn reset_tokens_for_account(&self, account_id: i64) -> Vec<PasswordResetToken> {
        let t = self.tables.lock().await;
        t.reset_tokens
            .iter()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------------------------

pub struct FakeAccountRepository(pub Arc<FakeAuthStore>);

#[async_trait]
impl AccountRepositoryPort for FakeAccountRepository {
    async fn find_by_email(
        &self,
        _ctx: &Context,
        email: &Email,
    ) -> Result<Option<Account>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.accounts.iter().find(|a| &a.email == email).cloned())
    }

    async fn find_by_username(
        &self,
        _ctx: &Context,
        username: &Username,
    ) -> Result<Option<Account>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.accounts
            .iter()
            .find(|a| a.username.as_ref() == Some(username))
            .cloned())
    }

    async fn find_by_id(&self, _ctx: &Context, id: i64) -> Result<Option<Account>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn create(&self, _ctx: &Context, account: &NewAccount) -> Result<Account, RepositoryError> {
        let mut t = self.0.tables.lock().await;
        if t.accounts.iter().any(|a| a.email == account.email) {
            return Err(RepositoryError::Duplicate(format!(
                "account with email {} already exists",
                account.email
            )));
        }
        let id = t.next_account_id;
        t.next_account_id += 1;
        let now = Utc::now();
        let row = Account {
            id,
            email: account.email.clone(),
            username: account.username.clone(),
            password_hash: account.password_hash.clone(),
            active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        t.accounts.push(row.clone());
        Ok(row)
    }

    async fn update_password(
        &self,
        _ctx: &Context,
        id: i64,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let acct = t
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;
        acct.password_hash = Some(password_hash.to_string());
        acct.updated_at = Utc::now();
        Ok(())
    }

    async fn update_last_login(&self, _ctx: &Context, id: i64) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let acct = t
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;
        acct.last_login = Some(Utc::now());
        Ok(())
    }

    async fn deactivate(&self, _ctx: &Context, id: i64) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let acct = t
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;
        acct.active = false;
        Ok(())
    }

    async fn list(
        &self,
        _ctx: &Context,
        filters: AccountFilters,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Account>, i64), RepositoryError> {
        let t = self.0.tables.lock().await;
        let filtered: Vec<Account> = t
            .accounts
            .iter()
            .filter(|a| !filters.active_only || a.active)
            .filter(|a| match &filters.search {
                None => true,
                Some(s) => a.email.as_str().contains(s.as_str()),
            })
            .cloned()
            .collect();
        let total = filtered.len() as i64;
        let page = filtered
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn find_by_role(
        &self,
        _ctx: &Context,
        role_name: &str,
    ) -> Result<Vec<Account>, RepositoryError> {
        let t = self.0.tables.lock().await;
        let Some(role) = t.roles.iter().find(|r| r.name == role_name) else {
            return Ok(Vec::new());
        };
        let account_ids: Vec<i64> = t
            .account_roles
            .iter()
            .filter(|ar| ar.role_id == role.id)
            .map(|ar| ar.account_id)
            .collect();
        Ok(t.accounts
            .iter()
            .filter(|a| account_ids.contains(&a.id))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------------------------
// Person
// ---------------------------------------------------------------------------------------------

pub struct FakePersonRepository(pub Arc<FakeAuthStore>);

#[async_trait]
impl PersonRepositoryPort for FakePersonRepository {
    async fn find_by_id(&self, _ctx: &Context, id: i64) -> Result<Option<Person>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.persons.iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_account_id(
        &self,
        _ctx: &Context,
        account_id: i64,
    ) -> Result<Option<Person>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.persons
            .iter()
            .find(|p| p.account_id == Some(account_id))
            .cloned())
    }

    async fn create(&self, _ctx: &Context, person: &NewPerson) -> Result<Person, RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let id = t.next_person_id;
        t.next_person_id += 1;
        let row = Person {
            id,
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            account_id: person.account_id,
        };
        t.persons.push(row.clone());
        Ok(row)
    }

    async fn link_account(
        &self,
        _ctx: &Context,
        person_id: i64,
        account_id: i64,
    ) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let person = t
            .persons
            .iter_mut()
            .find(|p| p.id == person_id)
            .ok_or(RepositoryError::NotFound)?;
        person.account_id = Some(account_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------------------------
// Role / Permission / AccountRole / RolePermission / AccountPermission
// ---------------------------------------------------------------------------------------------

pub struct FakeRoleRepository(pub Arc<FakeAuthStore>);

#[async_trait]
impl RoleRepositoryPort for FakeRoleRepository {
    async fn find_by_id(&self, _ctx: &Context, id: i64) -> Result<Option<Role>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.roles.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_name(&self, _ctx: &Context, name: &str) -> Result<Option<Role>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn list(&self, _ctx: &Context) -> Result<Vec<Role>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.roles.clone())
    }

    async fn find_by_account_id(
        &self,
        _ctx: &Context,
        account_id: i64,
    ) -> Result<Vec<Role>, RepositoryError> {
        let t = self.0.tables.lock().await;
        let role_ids: Vec<i64> = t
            .account_roles
            .iter()
            .filter(|ar| ar.account_id == account_id)
            .map(|ar| ar.role_id)
            .collect();
        Ok(t.roles
            .iter()
            .filter(|r| role_ids.contains(&r.id))
            .cloned()
            .collect())
    }
}

pub struct FakePermissionRepository(pub Arc<FakeAuthStore>);

#[async_trait]
impl PermissionRepositoryPort for FakePermissionRepository {
    async fn find_by_id(&self, _ctx: &Context, id: i64) -> Result<Option<Permission>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.permissions.iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self, _ctx: &Context) -> Result<Vec<Permission>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.permissions.clone())
    }

    async fn find_by_account_id(
        &self,
        _ctx: &Context,
        account_id: i64,
    ) -> Result<Vec<Permission>, RepositoryError> {
        let t = self.0.tables.lock().await;
        let role_ids: Vec<i64> = t
            .account_roles
            .iter()
            .filter(|ar| ar.account_id == account_id)
            .map(|ar| ar.role_id)
            .collect();
        let mut via_roles: Vec<i64> = t
            .role_permissions
            .iter()
            .filter(|rp| role_ids.contains(&rp.role_id))
            .map(|rp| rp.permission_id)
            .collect();
        for denial in t
            .account_permissions
            .iter()
            .filter(|ap| ap.account_id == account_id && !ap.granted)
        {
            via_roles.retain(|id| *id != denial.permission_id);
        }
        let mut granted: Vec<i64> = t
            .account_permissions
            .iter()
            .filter(|ap| ap.account_id == account_id && ap.granted)
            .map(|ap| ap.permission_id)
            .collect();
        via_roles.append(&mut granted);
        via_roles.sort_unstable();
        via_roles.dedup();
        Ok(t.permissions
            .iter()
            .filter(|p| via_roles.contains(&p.id))
            .cloned()
            .collect())
    }
}

pub struct FakeAccountRoleRepository(pub Arc<FakeAuthStore>);

#[async_trait]
impl AccountRoleRepositoryPort for FakeAccountRoleRepository {
    async fn assign(
        &self,
        _ctx: &Context,
        account_id: i64,
        role_id: i64,
    ) -> Result<AccountRole, RepositoryError> {
        let mut t = self.0.tables.lock().await;
        if !t
            .account_roles
            .iter()
            .any(|ar| ar.account_id == account_id && ar.role_id == role_id)
        {
            t.account_roles.push(AccountRole { account_id, role_id });
        }
        Ok(AccountRole { account_id, role_id })
    }

    async fn revoke(&self, _ctx: &Context, account_id: i64, role_id: i64) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        t.account_roles
            .retain(|ar| !(ar.account_id == account_id && ar.role_id == role_id));
        Ok(())
    }

    async fn list_for_account(
        &self,
        _ctx: &Context,
        account_id: i64,
    ) -> Result<Vec<AccountRole>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.account_roles
            .iter()
            .filter(|ar| ar.account_id == account_id)
            .cloned()
            .collect())
    }
}


// ---------------------------------------------------------------------------------------------
// RefreshToken
// ---------------------------------------------------------------------------------------------

pub struct FakeRefreshTokenRepository(pub Arc<FakeAuthStore>);

#[async_trait]
impl RefreshTokenRepositoryPort for FakeRefreshTokenRepository {
    async fn create(
        &self,
        _ctx: &Context,
        token: &NewRefreshToken,
    ) -> Result<RefreshToken, RepositoryError> {
        let mut t = self.0.tables.lock().await;
        if t.refresh_tokens.iter().any(|r| r.token == token.token) {
            return Err(RepositoryError::Duplicate("refresh token collision".into()));
        }
        if t.refresh_tokens
            .iter()
            .any(|r| r.family_id == token.family_id && r.generation == token.generation)
        {
            return Err(RepositoryError::Duplicate(
                "(family_id, generation) collision".into(),
            ));
        }
        let id = t.next_refresh_id;
        t.next_refresh_id += 1;
        let row = RefreshToken {
            id,
            token: token.token.clone(),
            account_id: token.account_id,
            expiry: token.expiry,
            mobile: token.mobile,
            identifier: token.identifier.clone(),
            family_id: token.family_id,
            generation: token.generation,
            created_at: Utc::now(),
        };
        t.refresh_tokens.push(row.clone());
        Ok(row)
    }

    async fn find_by_token(
        &self,
        _ctx: &Context,
        token: &str,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.refresh_tokens.iter().find(|r| r.token == token).cloned())
    }

    async fn find_by_token_for_update(
        &self,
        _ctx: &Context,
        token: &str,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        // The fake transaction runner already holds its one serializing lock for the whole
        // transaction body, so a plain read here has the same effect as `SELECT ... FOR UPDATE`.
        let t = self.0.tables.lock().await;
        Ok(t.refresh_tokens.iter().find(|r| r.token == token).cloned())
    }

    async fn delete(&self, _ctx: &Context, id: i64) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        t.refresh_tokens.retain(|r| r.id != id);
        Ok(())
    }

    async fn delete_by_account_id(&self, _ctx: &Context, account_id: i64) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        t.refresh_tokens.retain(|r| r.account_id != account_id);
        Ok(())
    }

    async fn delete_by_family_id(&self, _ctx: &Context, family_id: i64) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        t.refresh_tokens.retain(|r| r.family_id != family_id);
        Ok(())
    }

    async fn get_latest_in_family(
        &self,
        _ctx: &Context,
        family_id: i64,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.refresh_tokens
            .iter()
            .filter(|r| r.family_id == family_id)
            .max_by_key(|r| r.generation)
            .cloned())
    }

    async fn cleanup_old_for_account(
        &self,
        _ctx: &Context,
        account_id: i64,
        keep_k: i64,
    ) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let mut for_account: Vec<RefreshToken> = t
            .refresh_tokens
            .iter()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect();
        for_account.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        let keep_ids: std::collections::HashSet<i64> = for_account
            .into_iter()
            .take(keep_k.max(0) as usize)
            .map(|r| r.id)
            .collect();
        t.refresh_tokens
            .retain(|r| r.account_id != account_id || keep_ids.contains(&r.id));
        Ok(())
    }

    async fn delete_expired(&self, _ctx: &Context) -> Result<u64, RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let now = Utc::now();
        let before = t.refresh_tokens.len();
        t.refresh_tokens.retain(|r| r.expiry >= now);
        Ok((before - t.refresh_tokens.len()) as u64)
    }

    async fn count_for_account(&self, _ctx: &Context, account_id: i64) -> Result<i64, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.refresh_tokens
            .iter()
            .filter(|r| r.account_id == account_id)
            .count() as i64)
    }
}

// ---------------------------------------------------------------------------------------------
// PasswordResetToken
// ---------------------------------------------------------------------------------------------

pub struct FakePasswordResetRepository(pub Arc<FakeAuthStore>);

#[async_trait]
impl PasswordResetRepositoryPort for FakePasswordResetRepository {
    async fn create(
        &self,
        _ctx: &Context,
        token: &NewPasswordResetToken,
    ) -> Result<PasswordResetToken, RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let id = t.next_reset_id;
        t.next_reset_id += 1;
        let row = PasswordResetToken {
            id,
            account_id: token.account_id,
            token: token.token.clone(),
            expiry: token.expiry,
            used: false,
            email_sent_at: None,
            email_error: None,
            email_retry_count: 0,
            created_at: Utc::now(),
        };
        t.reset_tokens.push(row.clone());
        Ok(row)
    }

    async fn find_valid_by_token(
        &self,
        _ctx: &Context,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, RepositoryError> {
        let t = self.0.tables.lock().await;
        let now = Utc::now();
        Ok(t.reset_tokens
            .iter()
            .find(|r| r.token == token && r.is_valid(now))
            .cloned())
    }

    async fn mark_used(&self, _ctx: &Context, id: i64) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let row = t
            .reset_tokens
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RepositoryError::NotFound)?;
        row.used = true;
        Ok(())
    }

    async fn invalidate_by_account_id(
        &self,
        _ctx: &Context,
        account_id: i64,
    ) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        for row in t
            .reset_tokens
            .iter_mut()
            .filter(|r| r.account_id == account_id && !r.used)
        {
            row.used = true;
        }
        Ok(())
    }

    async fn delete_expired(&self, _ctx: &Context) -> Result<u64, RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let now = Utc::now();
        let before = t.reset_tokens.len();
        t.reset_tokens.retain(|r| !r.used && r.expiry >= now);
        Ok((before - t.reset_tokens.len()) as u64)
    }

    async fn update_delivery_result(
        &self,
        _ctx: &Context,
        id: i64,
        sent_at: Option<DateTime<Utc>>,
        error: Option<String>,
        retry_count: i32,
    ) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let row = t
            .reset_tokens
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RepositoryError::NotFound)?;
        row.email_sent_at = sent_at;
        row.email_error = error;
        row.email_retry_count = retry_count;
        Ok(())
    }
}

// ---------------------------------------------------------------------------------------------
// InvitationToken
// ---------------------------------------------------------------------------------------------

pub struct FakeInvitationRepository(pub Arc<FakeAuthStore>);

#[async_trait]
impl InvitationRepositoryPort for FakeInvitationRepository {
    async fn create(
        &self,
        _ctx: &Context,
        invitation: &NewInvitation,
    ) -> Result<InvitationToken, RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let id = t.next_invitation_id;
        t.next_invitation_id += 1;
        let row = InvitationToken {
            id,
            email: invitation.email.clone(),
            token: invitation.token.clone(),
            role_id: invitation.role_id,
            created_by: invitation.created_by,
            expires_at: invitation.expires_at,
            used_at: None,
            first_name: invitation.first_name.clone(),
            last_name: invitation.last_name.clone(),
            email_sent_at: None,
            email_error: None,
            email_retry_count: 0,
            created_at: Utc::now(),
        };
        t.invitations.push(row.clone());
        Ok(row)
    }

    async fn update(&self, _ctx: &Context, invitation: &InvitationToken) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let row = t
            .invitations
            .iter_mut()
            .find(|i| i.id == invitation.id)
            .ok_or(RepositoryError::NotFound)?;
        *row = invitation.clone();
        Ok(())
    }

    async fn find_by_id(
        &self,
        _ctx: &Context,
        id: i64,
    ) -> Result<Option<InvitationToken>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.invitations.iter().find(|i| i.id == id).cloned())
    }

    async fn find_by_token(
        &self,
        _ctx: &Context,
        token: &str,
    ) -> Result<Option<InvitationToken>, RepositoryError> {
        let t = self.0.tables.lock().await;
        Ok(t.invitations.iter().find(|i| i.token == token).cloned())
    }

    async fn mark_used(&self, _ctx: &Context, id: i64, used_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let row = t
            .invitations
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(RepositoryError::NotFound)?;
        row.used_at = Some(used_at);
        Ok(())
    }

    async fn invalidate_by_email(&self, _ctx: &Context, email: &str) -> Result<u64, RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let now = Utc::now();
        let mut count = 0u64;
        for row in t
            .invitations
            .iter_mut()
            .filter(|i| i.email == email && i.is_pending(now))
        {
            row.used_at = Some(now);
            count += 1;
        }
        Ok(count)
    }

    async fn delete_expired(&self, _ctx: &Context, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let before = t.invitations.len();
        t.invitations
            .retain(|i| i.used_at.is_none() && i.expires_at >= now);
        Ok((before - t.invitations.len()) as u64)
    }

    async fn list(
        &self,
        _ctx: &Context,
        filter: InvitationListFilter,
    ) -> Result<Vec<InvitationToken>, RepositoryError> {
        let t = self.0.tables.lock().await;
        let now = Utc::now();
        Ok(t.invitations
            .iter()
            .filter(|i| match filter.pending {
                None => true,
                Some(p) => i.is_pending(now) == p,
            })
            .cloned()
            .collect())
    }

    async fn update_delivery_result(
        &self,
        _ctx: &Context,
        id: i64,
        sent_at: Option<DateTime<Utc>>,
        error: Option<String>,
        retry_count: i32,
    ) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let row = t
            .invitations
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(RepositoryError::NotFound)?;
        row.email_sent_at = sent_at;
        row.email_error = error;
        row.email_retry_count = retry_count;
        Ok(())
    }
}

// ---------------------------------------------------------------------------------------------
// RateLimitWindow
// ---------------------------------------------------------------------------------------------

pub struct FakeRateLimitRepository {
    store: Arc<FakeAuthStore>,
    window: chrono::Duration,
}

impl FakeRateLimitRepository {
    pub fn new(store: Arc<FakeAuthStore>, window: chrono::Duration) -> Self {
        Self { store, window }
    }
}

#[async_trait]
impl RateLimitRepositoryPort for FakeRateLimitRepository {
    async fn check(
        &self,
        _ctx: &Context,
        key: &str,
    ) -> Result<Option<RateLimitWindow>, RepositoryError> {
        let t = self.store.tables.lock().await;
        Ok(t.rate_limits.get(key).cloned())
    }

    async fn increment(&self, _ctx: &Context, key: &str) -> Result<RateLimitWindow, RepositoryError> {
        let mut t = self.store.tables.lock().await;
        let now = Utc::now();
        let existing = t.rate_limits.get(key).cloned();
        let updated = match decide_rollover(existing.as_ref(), now, self.window) {
            RolloverDecision::Reset => RateLimitWindow {
                identity_key: key.to_string(),
                attempts: 1,
                window_start: now,
            },
            RolloverDecision::Increment => {
                let mut w = existing.expect("Increment decision implies an existing window");
                w.attempts += 1;
                w
            }
        };
        t.rate_limits.insert(key.to_string(), updated.clone());
        Ok(updated)
    }

    async fn cleanup_expired(&self, _ctx: &Context) -> Result<u64, RepositoryError> {
        let mut t = self.store.tables.lock().await;
        let now = Utc::now();
        let window = self.window;
        let before = t.rate_limits.len();
        t.rate_limits
            .retain(|_, w| now - w.window_start <= window);
        Ok((before - t.rate_limits.len()) as u64)
    }
}

// ---------------------------------------------------------------------------------------------
// AuthEvent
// ---------------------------------------------------------------------------------------------

pub struct FakeAuthEventRepository(pub Arc<FakeAuthStore>);

#[async_trait]
impl AuthEventRepositoryPort for FakeAuthEventRepository {
    async fn create(&self, _ctx: &Context, event: &NewAuthEvent) -> Result<(), RepositoryError> {
        let mut t = self.0.tables.lock().await;
        let id = t.next_event_id;
        t.next_event_id += 1;
        t.auth_events.push(AuthEvent {
            id,
            account_id: event.account_id,
            event_type: event.event_type.as_str().to_string(),
            success: event.success,
            ip: event.ip.clone(),
            user_agent: event.user_agent.clone(),
            error: event.error.clone(),
            ts: Utc::now(),
        });
        Ok(())
    }
}
