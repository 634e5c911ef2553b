//! Bounded tick history for late joiners.

use blobber_env::TickRecord;
use std::collections::VecDeque;

/// Ring buffer of the most recent tick records, oldest first.
#[derive(Debug, Clone)]
pub struct TickHistory {
    records: VecDeque<TickRecord>,
    cap: usize,
}

impl TickHistory {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            records: VecDeque::with_capacity(cap.min(4096)),
            cap,
        }
    }

    /// Appends a record, evicting the oldest when full.
    pub fn push(&mut self, record: TickRecord) {
        if self.records.len() == self.cap {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Copy of every stored record, in tick order.
    pub fn snapshot(&self) -> Vec<TickRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The most recently emitted record.
    pub fn latest(&self) -> Option<&TickRecord> {
        self.records.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_keeps_newest() {
        let mut history = TickHistory::new(3);
        for tick in 0..5 {
            history.push(TickRecord::empty(tick));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.latest().map(|r| r.tick), Some(4));
        let ticks: Vec<u64> = history.snapshot().iter().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![2, 3, 4]);
    }

    #[test]
    fn test_clear() {
        let mut history = TickHistory::new(10);
        history.push(TickRecord::empty(0));
        history.clear();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }
}
