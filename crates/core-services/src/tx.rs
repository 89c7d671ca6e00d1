//! Transaction runner (C3): binds one unit of work to one store transaction.
use domain::errors::RepositoryError;
use domain::tx::Context;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct TransactionRunner {
    pool: PgPool,
}

impl TransactionRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn root_context(&self) -> Context {
        Context::new(self.pool.clone())
    }

    /// Opens a transaction, binds it into a derived context, runs `body`, commits on `Ok`,
    /// rolls back on `Err`. If `ctx` already carries a bound transaction, `body` runs inside
    /// it directly with no new boundary — nested calls never open a second transaction.
    pub async fn run_in_tx<F, Fut, T, E>(&self, ctx: &Context, body: F) -> Result<T, E>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RepositoryError>,
    {
        if ctx.is_bound() {
            return body(ctx.clone()).await;
        }

        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::Transaction(e.to_string()))?;
        let inner_ctx = Context::bound(tx);

        match body(inner_ctx.clone()).await {
            Ok(value) => {
                let Context::Tx(tx) = inner_ctx else {
                    unreachable!("run_in_tx always binds a transaction context")
                };
                let tx = std::sync::Arc::try_unwrap(tx)
                    .unwrap_or_else(|_| panic!("transaction still referenced after body completed"))
                    .into_inner();
                tx.commit()
                    .await
                    .map_err(|e| RepositoryError::Transaction(e.to_string()))?;
                Ok(value)
            }
            Err(e) => {
                let Context::Tx(tx) = inner_ctx else {
                    unreachable!("run_in_tx always binds a transaction context")
                };
                if let Ok(tx) = std::sync::Arc::try_unwrap(tx) {
                    let _ = tx.into_inner().rollback().await;
                }
                Err(e)
            }
        }
    }
}

/// A `TransactionRunner` stand-in for tests against the in-memory repository fakes in
/// `persistence::fake`, which need no real database handle. One shared `tokio::sync::Mutex`
/// takes the place of row-level locking: a transaction serializes against every other
/// transaction on this runner rather than only against the rows it actually touches. That is
/// coarser than Postgres's `SELECT ... FOR UPDATE`, but it is a conservative over-approximation
/// — it never lets two concurrent logical transactions interleave — so every invariant the real
/// runner guarantees still holds for tests built on this one.
#[derive(Clone, Default)]
pub struct FakeTransactionRunner {
    lock: Arc<Mutex<()>>,
}

impl FakeTransactionRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_context(&self) -> Context {
        Context::Fake { bound: false }
    }

    pub async fn run_in_tx<F, Fut, T, E>(&self, ctx: &Context, body: F) -> Result<T, E>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RepositoryError>,
    {
        if ctx.is_bound() {
            return body(ctx.clone()).await;
        }

        let _guard = self.lock.lock().await;
        body(Context::Fake { bound: true }).await
    }
}

/// Either runner behind one call shape, so services take a single type and tests swap in
/// `FakeTransactionRunner` without the service needing to be generic over it.
#[derive(Clone)]
pub enum Runner {
    Real(TransactionRunner),
    Fake(FakeTransactionRunner),
}

impl Runner {
    pub fn root_context(&self) -> Context {
        match self {
            Runner::Real(r) => r.root_context(),
            Runner::Fake(r) => r.root_context(),
        }
    }

    pub async fn run_in_tx<F, Fut, T, E>(&self, ctx: &Context, body: F) -> Result<T, E>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RepositoryError>,
    {
        match self {
            Runner::Real(r) => r.run_in_tx(ctx, body).await,
            Runner::Fake(r) => r.run_in_tx(ctx, body).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nested_call_reuses_the_bound_context() {
        let runner = FakeTransactionRunner::new();
        let root = runner.root_context();

        let result: Result<(), RepositoryError> = runner
            .run_in_tx(&root, |outer| async move {
                assert!(outer.is_bound());
                // A nested call against the same bound context must not take the
                // serializing lock a second time, or this would deadlock.
                runner
                    .run_in_tx(&outer, |inner| async move {
                        assert!(inner.is_bound());
                        Ok::<_, RepositoryError>(())
                    })
                    .await
            })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn concurrent_transactions_serialize_rather_than_interleave() {
        let runner = FakeTransactionRunner::new();
        let root = runner.root_context();
        let order = Arc::new(Mutex::new(Vec::new()));

        let run = |tag: &'static str| {
            let runner = runner.clone();
            let root = root.clone();
            let order = order.clone();
            async move {
                runner
                    .run_in_tx(&root, |_ctx| async move {
                        order.lock().await.push(format!("{tag}-start"));
                        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                        order.lock().await.push(format!("{tag}-end"));
                        Ok::<_, RepositoryError>(())
                    })
                    .await
            }
        };

        let (a, b): (Result<(), RepositoryError>, Result<(), RepositoryError>) =
            tokio::join!(run("a"), run("b"));
        a.unwrap();
        b.unwrap();

        let order = order.lock().await.clone();
        // Whichever transaction goes first, it must fully finish before the other starts.
        assert_eq!(order.len(), 4);
        assert_eq!(&order[1], &format!("{}-end", order[0].trim_end_matches("-start")));
    }
}
