//! The context-bound transaction handle (C3).
//!
//! A `Context` is either a bare pool or a transaction that some outer call already bound.
//! Repositories never receive a raw `Transaction` or `PgPool` directly — they take `&Context`
//! and resolve the live connection through [`with_conn!`] at the call site. This keeps nested
//! service calls from needing to thread a transaction handle through every signature: they
//! just pass the same `Context` down.
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub enum Context {
    Pool(PgPool),
    Tx(Arc<Mutex<Transaction<'static, Postgres>>>),
    /// Used only by `core_services::tx::FakeTransactionRunner` and the in-memory repository
    /// fakes in `persistence::fake`, which hold their own state behind an `Arc<Mutex<_>>` and
    /// never resolve a connection out of the context at all. `bound` still distinguishes a
    /// nested call from a fresh one so `FakeTransactionRunner::run_in_tx` doesn't take its
    /// serializing lock twice for one logical unit of work.
    Fake { bound: bool },
}

impl Context {
    pub fn new(pool: PgPool) -> Self {
        Context::Pool(pool)
    }

    pub fn bound(tx: Transaction<'static, Postgres>) -> Self {
        Context::Tx(Arc::new(Mutex::new(tx)))
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Context::Tx(_) | Context::Fake { bound: true })
    }
}

/// Resolves the live connection out of a `&Context` and binds it to `$conn` for the body.
///
/// Expands to a match arm per variant rather than a trait object: `sqlx::Executor` is not
/// object-safe across `&PgPool` and `&mut Transaction`, so the two branches simply have
/// different concrete executor types and the macro picks the right one at the call site.
#[macro_export]
macro_rules! with_conn {
    ($ctx:expr, |$conn:ident| $body:expr) => {{
        match $ctx {
            $crate::tx::Context::Pool(pool) => {
                let $conn = pool;
                $body
            }
            $crate::tx::Context::Tx(tx) => {
                let mut __guard = tx.lock().await;
                let $conn = &mut *__guard;
                $body
            }
            $crate::tx::Context::Fake { .. } => {
                unreachable!("with_conn! is only reachable from sqlx-backed repositories; fakes never resolve a connection from Context")
            }
        }
    }};
}
