//! Fixed-capacity ring buffer of recent samples

use std::collections::VecDeque;

use crate::generator::Sample;

/// The last `capacity` samples, oldest first.
///
/// Appends past capacity evict from the front, so the store always holds a
/// contiguous, chronologically ordered tail of everything ever appended.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SeriesStore {
    /// Create an empty store. A capacity of zero is clamped to one; the
    /// configuration layer rejects zero before it gets here.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest at capacity. A timestamp earlier
    /// than the newest retained one (a wall-clock step backwards) is raised
    /// to it so the series stays non-decreasing.
    pub fn append(&mut self, mut sample: Sample) {
        if let Some(last) = self.samples.back() {
            sample.timestamp = sample.timestamp.max(last.timestamp);
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Independent copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// Most recent sample, `None` before the first append
    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
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
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new(100)
    }
}
