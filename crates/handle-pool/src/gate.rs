//! Global admission control for probe calls
//!
//! Bounds how many probe calls are in flight across all credentials at once.
//! This is separate from per-credential cooldown, which bounds the call rate
//! of a single credential. A slot is held by a `GatePermit` and released when
//! the permit drops, so every exit path (normal return, early return,
//! cancellation, panic unwind) gives the slot back.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// A held admission slot. Dropping it releases the slot.
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let now = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::gauge!("checker_probes_in_flight").set(now as f64);
    }
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free slot.
    ///
    /// The semaphore is never closed, so acquisition only fails if that
    /// invariant is broken; callers get `None` in that case.
    pub async fn acquire(&self) -> Option<GatePermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        metrics::gauge!("checker_probes_in_flight").set(now as f64);
        Some(GatePermit {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of slots ever held at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_capacity_under_contention() {
        let gate = Arc::new(ConcurrencyGate::new(3));
        let observed_max = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..12u64 {
            let gate = gate.clone();
            let observed_max = observed_max.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
                observed_max.fetch_max(gate.in_flight(), Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10 + i)).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(observed_max.load(Ordering::SeqCst) <= 3);
        assert_eq!(gate.peak(), 3);
        assert_eq!(gate.in_flight(), 0);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test]
    async fn permit_released_on_drop() {
        let gate = ConcurrencyGate::new(1);
        {
            let _permit = gate.acquire().await.unwrap();
            assert_eq!(gate.available(), 0);
            assert_eq!(gate.in_flight(), 1);
        }
        assert_eq!(gate.available(), 1);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slot_released_when_holder_is_aborted() {
        let gate = Arc::new(ConcurrencyGate::new(1));
        let holder = {
            let gate = gate.clone();
            tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(gate.available(), 0);

        holder.abort();
        let _ = holder.await;
        assert_eq!(gate.available(), 1);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_blocks_until_slot_frees() {
        let gate = Arc::new(ConcurrencyGate::new(1));
        let first = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await.is_some() })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(first);
        assert!(waiter.await.unwrap());
        assert_eq!(gate.capacity(), 1);
    }
}
