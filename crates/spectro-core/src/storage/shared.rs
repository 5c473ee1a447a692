//! Interrupt-safe wrapper around [`SampleStore`].
//!
//! The wake cycle owns its store directly and needs no locking. When samples are
//! produced from an interrupt handler (or another executor) while the main loop
//! reports, both sides go through this wrapper so every mutation happens inside
//! a critical section.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use super::{PushOutcome, Sample, SampleStore};

pub struct SharedSampleStore<const CAP: usize> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<SampleStore<CAP>>>,
}

impl<const CAP: usize> SharedSampleStore<CAP> {
    /// Usable in a `static`.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(SampleStore::new())),
        }
    }

    /// Producer side: push one sample.
    pub fn push(&self, sample: Sample) -> PushOutcome {
        self.inner.lock(|store| store.borrow_mut().push(sample))
    }

    /// Consumer side: read-only access for the duration of `f`.
    ///
    /// Keep `f` short, interrupts are masked while it runs.
    pub fn with<R>(&self, f: impl FnOnce(&SampleStore<CAP>) -> R) -> R {
        self.inner.lock(|store| f(&store.borrow()))
    }

    pub fn len(&self) -> usize {
        self.with(|store| store.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const CAP: usize> Default for SharedSampleStore<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::testing::sample_with_ts;
    use alloc::vec::Vec;

    static SHARED: SharedSampleStore<16> = SharedSampleStore::new();

    #[test]
    fn test_concurrent_producer_and_reader() {
        let producer = std::thread::spawn(|| {
            for ts in 0..100 {
                SHARED.push(sample_with_ts(ts));
            }
        });

        // Reader sees a consistent, ordered snapshot at every point
        for _ in 0..50 {
            SHARED.with(|store| {
                assert!(store.len() <= 16);
                let ts: Vec<u32> = store.iter().map(|s| s.timestamp).collect();
                assert!(ts.windows(2).all(|w| w[0] + 1 == w[1]));
            });
        }

        producer.join().unwrap();

        let ts: Vec<u32> = SHARED.with(|store| store.iter().map(|s| s.timestamp).collect());
        assert_eq!(ts, (84..100).collect::<Vec<u32>>());
        assert!(!SHARED.is_empty());
    }
}
