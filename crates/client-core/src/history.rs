//! Bounded call history
//!
//! Completed calls are kept newest first. Once the store is full, recording a call
//! evicts the oldest entry.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_HISTORY_CAPACITY;

/// Record of one finished call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallHistoryEntry {
    /// Number that was dialed, after normalization
    pub number: String,
    /// When the call was recorded
    pub timestamp: DateTime<Utc>,
    /// Engine-reported call duration
    pub duration_secs: u32,
    /// Name of the terminal call state, e.g. `Ended` or `Error`
    pub status: String,
}

/// Newest-first, capacity-bounded log of finished calls
#[derive(Debug, Clone)]
pub struct CallHistory {
    entries: VecDeque<CallHistoryEntry>,
    capacity: usize,
}

impl CallHistory {
    /// Create an empty history; a zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend `entry`, dropping the oldest entry if the store is full
    pub fn record(&mut self, entry: CallHistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Entries, newest first
    pub fn list(&self) -> Vec<CallHistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallHistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&CallHistoryEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CallHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(n: usize) -> CallHistoryEntry {
        CallHistoryEntry {
            number: format!("00{}", n),
            timestamp: Utc::now(),
            duration_secs: n as u32,
            status: "Ended".to_string(),
        }
    }

    #[test]
    fn test_newest_first() {
        let mut history = CallHistory::default();
        history.record(entry(1));
        history.record(entry(2));

        let numbers: Vec<_> = history.iter().map(|e| e.number.as_str()).collect();
        assert_eq!(numbers, ["002", "001"]);
        assert_eq!(history.latest().map(|e| e.duration_secs), Some(2));
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let mut history = CallHistory::default();
        for n in 0..21 {
            history.record(entry(n));
        }
        assert_eq!(history.len(), 20);
        assert_eq!(history.latest().unwrap().number, "0020");
        assert!(history.iter().all(|e| e.number != "000"));
    }

    #[test]
    fn test_entry_serializes_timestamp_as_rfc3339() {
        let mut e = entry(7);
        e.timestamp = "2024-05-01T10:00:00Z".parse().unwrap();
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["timestamp"], "2024-05-01T10:00:00Z");
        assert_eq!(json["status"], "Ended");
    }

    proptest! {
        #[test]
        fn prop_length_is_bounded(count in 0usize..64, capacity in 1usize..32) {
            let mut history = CallHistory::new(capacity);
            for n in 0..count {
                history.record(entry(n));
                prop_assert!(history.len() <= capacity);
                prop_assert_eq!(history.latest().map(|e| e.duration_secs), Some(n as u32));
            }
            prop_assert_eq!(history.len(), count.min(capacity));
        }
    }
}
