use heapless::Vec;
use log::warn;

use super::ring::{Pushed, RingBuffer, RingIter};
use super::{SAMPLES_PER_GROUP, Sample};

/// Result of pushing a sample into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Stored,
    /// The store was full and the oldest sample was replaced
    Overwrote(Sample),
}

/// Fixed-capacity RAM buffer of samples with overwrite-oldest semantics.
///
/// The store lives in RAM that stays powered during light sleep, so samples
/// written in one wake cycle can be read in a later one. Nothing is ever removed
/// explicitly; entries are retired only by being overwritten.
///
/// ## Memory Usage
///
/// - One sample: 36 bytes (timestamp, batch id, tags, 12 × u16 channels)
/// - Reference capacity of 50 samples: ~1.8 KB plus the `Option` tag per slot
pub struct SampleStore<const CAP: usize> {
    ring: RingBuffer<Sample, CAP>,
    /// Lifetime count of overwritten samples
    overwrites: u32,
}

impl<const CAP: usize> SampleStore<CAP> {
    pub const fn new() -> Self {
        Self {
            ring: RingBuffer::new(),
            overwrites: 0,
        }
    }

    /// Append a sample, replacing the oldest one if the store is full.
    ///
    /// Every replacement logs its own warning.
    pub fn push(&mut self, sample: Sample) -> PushOutcome {
        match self.ring.push(sample) {
            Pushed::Stored => PushOutcome::Stored,
            Pushed::Replaced(evicted) => {
                self.overwrites = self.overwrites.saturating_add(1);
                warn!(
                    "Sample store full ({} entries), overwriting oldest sample (ts={}, batch={}, color={})",
                    CAP,
                    evicted.timestamp,
                    evicted.batch_id,
                    evicted.led_color.label()
                );
                PushOutcome::Overwrote(evicted)
            }
        }
    }

    /// Iterate all stored samples, oldest first.
    pub fn iter(&self) -> RingIter<'_, Sample, CAP> {
        self.ring.iter()
    }

    /// Iterate the `n` most recently pushed samples, oldest first.
    pub fn iter_latest(&self, n: usize) -> RingIter<'_, Sample, CAP> {
        self.ring.iter_latest(n)
    }

    /// Copy of the `n` most recent samples in oldest-first order.
    pub fn latest(&self, n: usize) -> Vec<Sample, CAP> {
        let mut out = Vec::new();
        for sample in self.iter_latest(n) {
            // cannot overflow: iter_latest yields at most CAP entries
            let _ = out.push(*sample);
        }
        out
    }

    /// Number of complete batches the store can still provide
    pub const fn groups_available(&self) -> usize {
        self.ring.len() / SAMPLES_PER_GROUP
    }

    pub const fn len(&self) -> usize {
        self.ring.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub const fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub const fn capacity(&self) -> usize {
        CAP
    }

    pub const fn overwrites(&self) -> u32 {
        self.overwrites
    }
}

impl<const CAP: usize> Default for SampleStore<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DEFAULT_STORE_CAPACITY;
    use crate::testing::{record_logs, recorded, sample_with_ts};
    use alloc::vec::Vec as StdVec;

    #[test]
    fn test_count_never_exceeds_capacity() {
        let mut store = SampleStore::<8>::new();
        for i in 0..100 {
            store.push(sample_with_ts(i));
            assert!(store.len() <= store.capacity());
        }
        assert!(store.is_full());
    }

    #[test]
    fn test_overflow_keeps_last_capacity_samples() {
        let mut store = SampleStore::<DEFAULT_STORE_CAPACITY>::new();
        let mut warnings = 0;

        for ts in 1..=55 {
            if let PushOutcome::Overwrote(_) = store.push(sample_with_ts(ts)) {
                warnings += 1;
            }
        }

        let timestamps: StdVec<u32> = store.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps.len(), 50);
        assert_eq!(timestamps, (6..=55).collect::<StdVec<u32>>());
        assert_eq!(warnings, 5, "one warning per push beyond capacity");
        assert_eq!(store.overwrites(), 5);
    }

    #[test]
    fn test_overwrite_returns_evicted_sample() {
        let mut store = SampleStore::<2>::new();
        store.push(sample_with_ts(10));
        store.push(sample_with_ts(11));
        match store.push(sample_with_ts(12)) {
            PushOutcome::Overwrote(evicted) => assert_eq!(evicted.timestamp, 10),
            PushOutcome::Stored => panic!("expected an overwrite"),
        }
    }

    #[test]
    fn test_each_overwrite_logs_a_warning() {
        record_logs();
        let mut store = SampleStore::<2>::new();
        for ts in 20..24 {
            store.push(sample_with_ts(ts));
        }

        let warnings = recorded(log::Level::Warn);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("overwriting oldest sample (ts=20"));
        assert!(warnings[1].contains("ts=21"));
    }

    #[test]
    fn test_latest_returns_newest_in_order() {
        let mut store = SampleStore::<10>::new();
        for ts in 0..13 {
            store.push(sample_with_ts(ts));
        }
        let latest: StdVec<u32> = store.latest(4).iter().map(|s| s.timestamp).collect();
        assert_eq!(latest, [9, 10, 11, 12]);
        assert_eq!(store.groups_available(), 2);
    }

    #[test]
    fn test_empty_store() {
        let store = SampleStore::<4>::new();
        assert!(store.is_empty());
        assert_eq!(store.iter().count(), 0);
        assert!(store.latest(3).is_empty());
    }
}
