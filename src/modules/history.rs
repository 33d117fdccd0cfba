use std::collections::VecDeque;

/// Fixed-capacity FIFO of per-frame samples in arrival order; the oldest sample is evicted first.
#[derive(Debug, Clone)]
pub struct HistoryWindow<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryWindow<T> {
    pub fn new(capacity: usize) -> Self {
        HistoryWindow {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: T) {
        if self.capacity == 0 {
            return
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&T> {
        self.samples.back()
    }

    /// Sample `n` positions before the newest one; `nth_back(0)` is the newest.
    pub fn nth_back(&self, n: usize) -> Option<&T> {
        self.samples.len().checked_sub(n + 1).and_then(|i| self.samples.get(i))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.samples.iter()
    }

    /// The newest `n` samples (fewer if the window holds fewer), oldest first.
    pub fn recent(&self, n: usize) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.range(skip..)
    }
}
