//! Deadline wrapper: run a probe on a helper thread and stop waiting after `timeout`.
//!
//! The underlying OS call cannot be cancelled. When the deadline passes the helper thread is
//! abandoned and keeps running (possibly forever, e.g. on a stalled network share). Each call
//! against a permanently unreachable resource therefore leaves one more thread behind; the
//! in-flight counter makes that accumulation visible but does not bound it.

use crate::ExistenceProbe;
use existbench_types::{Failure, ProbeOutcome, StrategyKind};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct Bounded<P> {
    inner: Arc<P>,
    timeout: Duration,
    in_flight: Arc<AtomicUsize>,
}

impl<P: ExistenceProbe + 'static> Bounded<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

struct InFlightGuard(Arc<AtomicUsize>);

impl InFlightGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<P: ExistenceProbe + 'static> ExistenceProbe for Bounded<P> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BoundedNativeApiQuery
    }

    fn probe(&self, path: &Path) -> ProbeOutcome {
        // One slot, one producer, one consumer.
        let (tx, rx) = mpsc::sync_channel::<ProbeOutcome>(1);
        let inner = Arc::clone(&self.inner);
        let owned = path.to_path_buf();
        let guard = InFlightGuard::enter(&self.in_flight);

        let spawned = thread::Builder::new()
            .name("existbench-bounded-probe".to_string())
            .spawn(move || {
                let outcome = inner.probe(&owned);
                // Leave the counter before publishing, so a caller that got the result
                // never sees this thread as in flight.
                drop(guard);
                // The receiver is gone if the caller already gave up.
                let _ = tx.send(outcome);
            });

        if let Err(err) = spawned {
            return ProbeOutcome::failed(Failure::unexpected(format!(
                "failed to spawn probe thread: {err}"
            )));
        }

        match rx.recv_timeout(self.timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                let after_ms = self.timeout.as_millis() as u64;
                tracing::debug!(
                    path = %path.display(),
                    after_ms,
                    in_flight = self.in_flight.load(Ordering::SeqCst),
                    "existence probe timed out; helper thread abandoned"
                );
                ProbeOutcome::failed(Failure::Timeout { after_ms })
            }
            Err(RecvTimeoutError::Disconnected) => ProbeOutcome::failed(Failure::unexpected(
                "probe thread exited without a result",
            )),
        }
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}
