//! In-memory fakes of every repository port (C4), for tests that exercise the session,
//! password-reset, and invitation services without a real Postgres instance.
//!
//! All fakes share one [`FakeAuthStore`] behind a single `tokio::sync::Mutex`. They ignore the
//! `Context` parameter entirely — unlike the sqlx-backed repositories, a fake never resolves a
//! connection out of it — because `core_services::tx::FakeTransactionRunner` already serializes
//! whole transactions against that same kind of lock. See its doc comment for why that coarser
//! granularity is still a faithful stand-in for row-level locking in tests.
mod store;

pub use store::{
    FakeAccountRepository, FakeAccountRoleRepository, FakeAuthEventRepository, FakeAuthStore,
    FakeInvitationRepository, FakePasswordResetRepository, FakePermissionRepository,
    FakePersonRepository, FakeRateLimitRepository, FakeRefreshTokenRepository, FakeRoleRepository,
};
