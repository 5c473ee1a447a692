//! Fixed-capacity ring arena.
//!
//! All wrap-around index arithmetic for the sample store lives here. Slots are
//! addressed physically by `head` (next write) and logically by age, where
//! logical index 0 is the oldest valid entry.

/// Outcome of a [`RingBuffer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pushed<T> {
    /// Written into a free slot
    Stored,
    /// The ring was full; the returned entry was the oldest and has been replaced
    Replaced(T),
}

pub struct RingBuffer<T: Copy, const N: usize> {
    slots: [Option<T>; N],
    head: usize,
    count: usize,
}

impl<T: Copy, const N: usize> RingBuffer<T, N> {
    pub const fn new() -> Self {
        Self {
            slots: [None; N],
            head: 0,
            count: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub const fn len(&self) -> usize {
        self.count
    }

    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn is_full(&self) -> bool {
        self.count == N
    }

    /// Physical index of the next write
    pub const fn head(&self) -> usize {
        self.head
    }

    /// Write at `head`, replacing the oldest entry when full.
    pub fn push(&mut self, value: T) -> Pushed<T> {
        if N == 0 {
            return Pushed::Replaced(value);
        }

        let previous = self.slots[self.head].replace(value);
        self.head = (self.head + 1) % N;

        if self.count < N {
            self.count += 1;
            Pushed::Stored
        } else {
            match previous {
                Some(evicted) => Pushed::Replaced(evicted),
                None => Pushed::Stored,
            }
        }
    }

    /// Physical slot of the entry at logical position `index` (0 = oldest).
    fn physical(&self, index: usize) -> usize {
        // head - count is the oldest slot; add N before subtracting to stay unsigned
        (self.head + N - self.count + index) % N
    }

    /// Entry at logical position `index`, 0 being the oldest.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.count {
            return None;
        }
        self.slots[self.physical(index)].as_ref()
    }

    /// Iterate oldest to newest. Each call starts again from the oldest entry.
    pub fn iter(&self) -> RingIter<'_, T, N> {
        self.iter_from(0)
    }

    /// Iterate the newest `n` entries (or all, if fewer), oldest first.
    pub fn iter_latest(&self, n: usize) -> RingIter<'_, T, N> {
        self.iter_from(self.count - n.min(self.count))
    }

    fn iter_from(&self, start: usize) -> RingIter<'_, T, N> {
        RingIter {
            ring: self,
            next: start,
        }
    }
}

impl<T: Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RingIter<'a, T: Copy, const N: usize> {
    ring: &'a RingBuffer<T, N>,
    next: usize,
}

impl<'a, T: Copy, const N: usize> Iterator for RingIter<'a, T, N> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.ring.get(self.next)?;
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ring.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl<T: Copy, const N: usize> ExactSizeIterator for RingIter<'_, T, N> {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_push_below_capacity() {
        let mut ring = RingBuffer::<u32, 4>::new();
        assert_eq!(ring.push(1), Pushed::Stored);
        assert_eq!(ring.push(2), Pushed::Stored);
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.head(), 2);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn test_wraps_and_replaces_oldest() {
        let mut ring = RingBuffer::<u32, 3>::new();
        for v in 1..=3 {
            ring.push(v);
        }
        assert!(ring.is_full());
        assert_eq!(ring.head(), 0);

        assert_eq!(ring.push(4), Pushed::Replaced(1));
        assert_eq!(ring.push(5), Pushed::Replaced(2));
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), [3, 4, 5]);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let mut ring = RingBuffer::<u32, 3>::new();
        for v in 0..7 {
            ring.push(v);
        }
        let first: Vec<u32> = ring.iter().copied().collect();
        let second: Vec<u32> = ring.iter().copied().collect();
        assert_eq!(first, second);
        assert_eq!(first, [4, 5, 6]);
    }

    #[test]
    fn test_latest_across_wrap_boundary() {
        let mut ring = RingBuffer::<u32, 5>::new();
        for v in 0..8 {
            ring.push(v);
        }
        // physical layout is [5, 6, 7, 3, 4], head = 3
        assert_eq!(ring.iter_latest(4).copied().collect::<Vec<_>>(), [4, 5, 6, 7]);
        assert_eq!(ring.iter_latest(0).count(), 0);
        assert_eq!(ring.iter_latest(99).count(), 5);
        assert_eq!(ring.iter_latest(2).len(), 2);
    }

    #[test]
    fn test_get_out_of_range() {
        let mut ring = RingBuffer::<u32, 2>::new();
        ring.push(9);
        assert_eq!(ring.get(0), Some(&9));
        assert_eq!(ring.get(1), None);
    }
}
