//! Per-run context: identity, cancellation, deadline and the limit on
//! external calls in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ResearchError, ResearchResult, Stage};

/// Context threaded through every external call of one research run.
///
/// Absent cancellation and deadline a run goes to completion or failure.
/// Clones share the token and the call limiter.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    token: CancellationToken,
    deadline: Option<Instant>,
    limiter: Option<Arc<Semaphore>>,
}

impl RunContext {
    /// Fresh context with its own token and an optional time budget.
    pub fn new(budget: Option<Duration>) -> Self {
        Self::with_token(CancellationToken::new(), budget)
    }

    /// Context bound to a caller-owned cancellation token.
    pub fn with_token(token: CancellationToken, budget: Option<Duration>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            token,
            deadline: budget.map(|b| Instant::now() + b),
            limiter: None,
        }
    }

    /// Allow at most `permits` guarded calls in flight across all clones.
    ///
    /// Fan-out at every level shares this one budget, so nested countries,
    /// links and chunks never multiply it.
    #[must_use]
    pub fn with_call_limit(mut self, permits: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(permits.max(1))));
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Request cancellation of every guarded call still in flight.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fail fast if the run was cancelled or ran out of time.
    pub fn ensure_active(&self, stage: Stage) -> ResearchResult<()> {
        if self.token.is_cancelled() {
            return Err(cancelled(stage, "cancellation requested"));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(cancelled(stage, "deadline exceeded"));
        }
        Ok(())
    }

    /// Race `fut` against cancellation and the deadline.
    ///
    /// The call holds one limiter permit while it runs. Waiting for a permit
    /// is itself cancellable.
    pub async fn guard<T, F>(&self, stage: Stage, fut: F) -> ResearchResult<T>
    where
        F: Future<Output = ResearchResult<T>>,
    {
        let limited = async {
            let _permit = match &self.limiter {
                Some(limiter) => Some(
                    limiter
                        .acquire()
                        .await
                        .map_err(|e| cancelled(stage, &format!("call limiter closed: {e}")))?,
                ),
                None => None,
            };
            fut.await
        };
        self.race(stage, limited).await
    }

    /// Sleep for `delay` without holding a limiter permit.
    pub async fn sleep(&self, stage: Stage, delay: Duration) -> ResearchResult<()> {
        self.race(stage, async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }

    async fn race<T, F>(&self, stage: Stage, fut: F) -> ResearchResult<T>
    where
        F: Future<Output = ResearchResult<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(cancelled(stage, "cancellation requested")),
            () = deadline => Err(cancelled(stage, "deadline exceeded")),
            result = fut => result,
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(None)
    }
}

fn cancelled(stage: Stage, reason: &str) -> ResearchError {
    ResearchError::Cancelled {
        stage,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_passes_result_through() {
        let ctx = RunContext::default();
        let out = ctx.guard(Stage::Search, async { Ok(3) }).await.unwrap();
        assert_eq!(out, 3);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_call() {
        let ctx = RunContext::default();
        ctx.cancel();
        let err = ctx
            .guard(Stage::Render, std::future::pending::<ResearchResult<()>>())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResearchError::Cancelled {
                stage: Stage::Render,
                ..
            }
        ));
        assert!(ctx.ensure_active(Stage::Search).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let ctx = RunContext::new(Some(Duration::from_secs(5)));
        assert!(ctx.ensure_active(Stage::Search).is_ok());

        let err = ctx
            .guard(Stage::LanguageModel, async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("deadline exceeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_limit_is_shared_by_clones() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let ctx = RunContext::default().with_call_limit(2);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let call = |ctx: RunContext| {
            let active = &active;
            let peak = &peak;
            async move {
                ctx.guard(Stage::Render, async {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }
        };

        let results = futures::future::join_all((0..5).map(|_| call(ctx.clone()))).await;
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_for_permit_is_cancellable() {
        let ctx = RunContext::default().with_call_limit(1);
        let holder = ctx.clone();
        let _held = tokio::spawn(async move {
            holder
                .guard(Stage::Render, std::future::pending::<ResearchResult<()>>())
                .await
        });
        tokio::task::yield_now().await;

        ctx.cancel();
        let err = ctx
            .guard(Stage::LanguageModel, async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::Cancelled { .. }));
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunContext::default().run_id(), RunContext::default().run_id());
    }
}
