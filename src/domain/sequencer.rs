//! Process-wide sequence counter for ordering-sensitive broadcasts.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues strictly increasing, gap-free sequence numbers.
///
/// The counter starts at 0 and [`next`](Self::next) returns the value
/// *after* incrementing, so the first issued number is 1. The increment
/// and the read are a single atomic step: concurrent callers never see
/// the same value, and values are handed out in the order callers reach
/// the counter.
#[derive(Debug, Default)]
pub struct Sequencer {
    last: AtomicU64,
}

impl Sequencer {
    /// Creates a sequencer that has issued nothing yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Increments the counter and returns the new value.
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Returns the last issued value (0 if none) without incrementing.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn first_value_is_one() {
        let seq = Sequencer::new();
        assert_eq!(seq.current(), 0);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.current(), 1);
    }

    #[test]
    fn values_are_gap_free() {
        let seq = Sequencer::new();
        let values: Vec<u64> = (0..100).map(|_| seq.next()).collect();
        let expected: Vec<u64> = (1..=100).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_get_distinct_values() {
        let seq = Arc::new(Sequencer::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let seq = Arc::clone(&seq);
            handles.push(tokio::spawn(async move {
                (0..500).map(|_| seq.next()).collect::<Vec<_>>()
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            let Ok(values) = handle.await else {
                panic!("task panicked");
            };
            // Each caller observes its own values in increasing order.
            assert!(values.windows(2).all(|w| w.first() < w.get(1)));
            all.extend(values);
        }

        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 4000);
        assert_eq!(all.first(), Some(&1));
        assert_eq!(all.last(), Some(&4000));
        assert_eq!(seq.current(), 4000);
    }
}
