//! Bounded recent-request history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// How a forwarded request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed,
}

/// One completed backend call.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    #[serde(rename = "server_id")]
    pub node_id: String,
    /// Wall-clock time of the backend call, seconds, 3 decimals.
    #[serde(rename = "response_time")]
    pub response_time_secs: f64,
    #[serde(rename = "status")]
    pub outcome: Outcome,
}

/// Fixed-capacity ring buffer; the oldest record is evicted on overflow.
#[derive(Debug)]
pub struct RequestHistory {
    records: VecDeque<RequestRecord>,
    capacity: usize,
}

impl RequestHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: RequestRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// The last `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<RequestRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).cloned().collect()
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

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
