use crate::error::ScanError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{warn, Span};

/// Bounded pool of concurrent tasks, reusable across scans.
///
/// At most `ceiling` submitted futures run at once; the rest wait for a
/// permit. Each submitted item gets its own result slot, so tasks never
/// share a result collection.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    ceiling: usize,
    span: Span,
}

impl WorkerPool {
    pub fn new(ceiling: usize) -> Result<Self, ScanError> {
        Self::with_span(ceiling, tracing::info_span!("pool", ceiling))
    }

    pub fn with_span(ceiling: usize, span: Span) -> Result<Self, ScanError> {
        if ceiling == 0 || ceiling > Semaphore::MAX_PERMITS {
            return Err(ScanError::InvalidConcurrency(ceiling));
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(ceiling)),
            ceiling,
            span,
        })
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Stop accepting work. Later calls to [`WorkerPool::run`] fail with
    /// [`ScanError::PoolClosed`].
    pub fn close(&self) {
        self.permits.close();
    }

    /// Run `f` over every item and wait for all of them (barrier).
    ///
    /// `out[i]` holds the result for `items[i]`, or `None` when that task was
    /// cancelled, panicked, or never submitted because `cancel` fired first.
    /// Fails only if the pool refuses new work.
    pub async fn run<I, T, F, Fut>(
        &self,
        items: Vec<I>,
        cancel: &CancellationToken,
        f: F,
    ) -> Result<Vec<Option<T>>, ScanError>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut slots: Vec<Option<T>> = (0..items.len()).map(|_| None).collect();
        let mut set = JoinSet::new();

        for (slot, item) in items.into_iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ScanError::PoolClosed)?;
            let cancel = cancel.clone();
            let fut = f(item);

            set.spawn(async move {
                let _permit = permit; // held until the task completes
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => (slot, None),
                    out = fut => (slot, Some(out)),
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((slot, out)) => slots[slot] = out,
                Err(e) => warn!(parent: &self.span, error = %e, "worker task failed"),
            }
        }
        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn zero_ceiling_is_rejected() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(ScanError::InvalidConcurrency(0))
        ));
    }

    #[tokio::test]
    async fn results_land_in_submission_slots() {
        let pool = WorkerPool::new(4).unwrap();
        let items: Vec<u64> = (0..32).collect();
        let out = pool
            .run(items, &CancellationToken::new(), |n| async move {
                // Finish in reverse order to shuffle completion.
                tokio::time::sleep(Duration::from_millis(32 - n)).await;
                n * 2
            })
            .await
            .unwrap();
        let expected: Vec<Option<u64>> = (0..32).map(|n| Some(n * 2)).collect();
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn never_exceeds_ceiling() {
        let pool = WorkerPool::new(3).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let out = pool
            .run((0..20).collect::<Vec<u32>>(), &CancellationToken::new(), |_| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await
            .unwrap();

        assert_eq!(out.len(), 20);
        assert!(out.iter().all(Option::is_some));
        let peak = peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak was {peak}");
    }

    #[tokio::test]
    async fn panicking_task_leaves_only_its_slot_empty() {
        let pool = WorkerPool::new(2).unwrap();
        let out = pool
            .run(vec![1u32, 2, 3], &CancellationToken::new(), |n| async move {
                if n == 2 {
                    panic!("boom");
                }
                n
            })
            .await
            .unwrap();
        assert_eq!(out, vec![Some(1), None, Some(3)]);
    }

    #[tokio::test]
    async fn cancelled_tasks_yield_none() {
        let pool = WorkerPool::new(1).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = pool
            .run(vec![1u32, 2], &cancel, |n| async move { n })
            .await
            .unwrap();
        assert_eq!(out, vec![None, None]);
    }

    #[tokio::test]
    async fn closed_pool_refuses_work() {
        let pool = WorkerPool::new(1).unwrap();
        pool.close();
        let res = pool
            .run(vec![1u32], &CancellationToken::new(), |n| async move { n })
            .await;
        assert!(matches!(res, Err(ScanError::PoolClosed)));
    }
}
