//! # Debounced batching of bursty events.
//!
//! [`DebouncePool`] collects events from any number of producers and hands
//! them to one reducer in batches. A batch is delivered once no event has
//! arrived for the configured window; every push restarts the window.
//!
//! ## Architecture
//! ```text
//! producers (many)                         worker (one)
//!   push(ev) ──┐                    ┌──────────────────────────────┐
//!   push(ev) ──┼──► unbounded mpsc ─┤ idle ──recv──► collecting    │
//!   push(ev) ──┘                    │   ▲            │  recv → reset window
//!                                   │   │            │  window elapsed
//!                                   │   └── reduce(Batch{seq, events}) ◄┘
//!                                   └──────────────────────────────┘
//! ```
//!
//! ## Rules
//! - **Debounce, not throttle**: a sustained burst is delivered once it goes quiet.
//! - **All-or-nothing**: the reducer always gets the whole buffer, in push order.
//! - **No drops**: events are only delayed, never discarded.
//! - **Sequential batches**: batch `n + 1` is not reduced before batch `n` finished;
//!   events pushed meanwhile wait in the channel.
//! - **Shutdown**: on cancellation the pending buffer (and anything queued) is
//!   delivered as a final batch.

use std::future::Future;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// One flushed window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    /// Monotonic batch number, starting at 1.
    pub seq: u64,
    /// Events in push order; never empty.
    pub events: Vec<T>,
}

/// Consumer of flushed batches.
#[async_trait]
pub trait Reduce<T: Send + 'static>: Send + Sync + 'static {
    async fn reduce(&self, batch: Batch<T>);
}

/// Closure-backed reducer.
pub struct ReduceFn<F>(F);

impl<F> ReduceFn<F> {
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self(f))
    }
}

#[async_trait]
impl<T, F, Fut> Reduce<T> for ReduceFn<F>
where
    T: Send + 'static,
    F: Fn(Batch<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn reduce(&self, batch: Batch<T>) {
        (self.0)(batch).await
    }
}

/// Handle for pushing events into a running pool.
///
/// Cheap to clone; all clones feed the same worker.
pub struct DebouncePool<T> {
    tx: mpsc::UnboundedSender<T>,
    window: Duration,
}

impl<T> Clone for DebouncePool<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            window: self.window,
        }
    }
}

impl<T: Send + 'static> DebouncePool<T> {
    /// Spawns the worker and returns the push handle plus the worker's join handle.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn<R>(window: Duration, reducer: Arc<R>, token: CancellationToken) -> (Self, JoinHandle<()>)
    where
        R: Reduce<T> + ?Sized,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(rx, window, reducer, token));
        (Self { tx, window }, worker)
    }

    /// Adds an event to the current window and restarts it.
    pub fn push(&self, event: T) {
        if self.tx.send(event).is_err() {
            tracing::debug!("debounce pool closed; event discarded");
        }
    }

    /// The configured quiet period.
    pub fn window(&self) -> Duration {
        self.window
    }
}

async fn run<T, R>(
    mut rx: mpsc::UnboundedReceiver<T>,
    window: Duration,
    reducer: Arc<R>,
    token: CancellationToken,
) where
    T: Send + 'static,
    R: Reduce<T> + ?Sized,
{
    let mut seq = 0u64;
    let mut buf: Vec<T> = Vec::new();

    loop {
        let first = tokio::select! {
            ev = rx.recv() => match ev {
                Some(ev) => ev,
                None => break,
            },
            _ = token.cancelled() => break,
        };
        buf.push(first);

        let mut stopping = false;
        let sleep = time::sleep(window);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                ev = rx.recv() => match ev {
                    Some(ev) => {
                        buf.push(ev);
                        sleep.as_mut().reset(Instant::now() + window);
                    }
                    None => break,
                },
                _ = &mut sleep => break,
                _ = token.cancelled() => {
                    stopping = true;
                    break;
                }
            }
        }
        if stopping {
            break;
        }

        seq += 1;
        reducer
            .reduce(Batch {
                seq,
                events: mem::take(&mut buf),
            })
            .await;
    }

    while let Ok(ev) = rx.try_recv() {
        buf.push(ev);
    }
    if !buf.is_empty() {
        reducer.reduce(Batch { seq: seq + 1, events: buf }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: Duration = Duration::from_millis(100);

    fn collecting_pool(
        token: CancellationToken,
    ) -> (
        DebouncePool<u32>,
        JoinHandle<()>,
        mpsc::UnboundedReceiver<Batch<u32>>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let reducer = ReduceFn::arc(move |batch: Batch<u32>| {
            let out = out_tx.clone();
            async move {
                let _ = out.send(batch);
            }
        });
        let (pool, worker) = DebouncePool::spawn(W, reducer, token);
        (pool, worker, out_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn close_pushes_are_delivered_as_one_ordered_batch() {
        let (pool, _w, mut out) = collecting_pool(CancellationToken::new());

        for i in 0..5 {
            pool.push(i);
            time::sleep(Duration::from_millis(30)).await;
        }

        let batch = out.recv().await.expect("batch");
        assert_eq!(batch.seq, 1);
        assert_eq!(batch.events, vec![0, 1, 2, 3, 4]);

        time::sleep(W * 5).await;
        assert!(out.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_pushes_flush_individually() {
        let (pool, _w, mut out) = collecting_pool(CancellationToken::new());

        for i in 0..3 {
            pool.push(i);
            time::sleep(W * 2).await;
        }

        for (n, expected) in (0..3).enumerate() {
            let batch = out.recv().await.expect("batch");
            assert_eq!(batch.seq, n as u64 + 1);
            assert_eq!(batch.events, vec![expected]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_burst_defers_flush_until_quiet() {
        let (pool, _w, mut out) = collecting_pool(CancellationToken::new());
        let started = Instant::now();

        // 10 pushes, 80ms apart: 720ms of activity, far more than one window.
        for i in 0..10 {
            pool.push(i);
            if i < 9 {
                time::sleep(Duration::from_millis(80)).await;
            }
        }

        let batch = out.recv().await.expect("batch");
        assert_eq!(batch.events.len(), 10);
        assert!(started.elapsed() >= Duration::from_millis(720) + W);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_producers_lose_nothing() {
        let (pool, _w, mut out) = collecting_pool(CancellationToken::new());

        let mut producers = Vec::new();
        for p in 0..4u32 {
            let pool = pool.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..25 {
                    pool.push(p * 100 + i);
                }
            }));
        }
        for p in producers {
            p.await.unwrap();
        }

        let batch = out.recv().await.expect("batch");
        assert_eq!(batch.events.len(), 100);
        for p in 0..4u32 {
            let mine: Vec<u32> = batch
                .events
                .iter()
                .copied()
                .filter(|e| e / 100 == p)
                .collect();
            assert_eq!(mine, (0..25).map(|i| p * 100 + i).collect::<Vec<_>>());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_flushes_pending_events() {
        let token = CancellationToken::new();
        let (pool, worker, mut out) = collecting_pool(token.clone());

        pool.push(7);
        pool.push(8);
        token.cancel();
        worker.await.unwrap();

        let batch = out.recv().await.expect("final batch");
        assert_eq!(batch.events, vec![7, 8]);
    }
}
