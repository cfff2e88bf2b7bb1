//! Rolling buffer: bounded, time-sorted retention window over records.
//!
//! Maintains a sliding window of the most recent `max_points` records in
//! ascending timestamp order. Records may arrive out of order and are
//! merged into place; when the window overflows, the oldest records are
//! evicted first.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;

use crate::record::Record;

/// Bounded time-sorted window of records.
#[derive(Debug)]
pub struct RollingBuffer {
    /// Maximum number of records to keep; 0 is a valid degenerate mode
    /// where every insert is evicted immediately
    max_points: usize,
    /// Records in ascending timestamp order
    records: VecDeque<Record>,
}

impl RollingBuffer {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points,
            records: VecDeque::with_capacity(max_points.min(4096)),
        }
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending timestamp order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Insert a record at its timestamp position, then evict the oldest
    /// records until the window fits `max_points` again.
    ///
    /// Equal timestamps keep arrival order among themselves (stable), and
    /// duplicates are legal. An in-order arrival (timestamp >= current
    /// maximum) is a plain O(1) append.
    pub fn insert(&mut self, record: Record) {
        let at_tail = self
            .records
            .back()
            .map(|last| record.timestamp_ms >= last.timestamp_ms)
            .unwrap_or(true);
        if at_tail {
            self.records.push_back(record);
        } else {
            // First index whose timestamp exceeds the new one; inserting
            // there lands after any equal timestamps already present
            let idx = self
                .records
                .partition_point(|r| r.timestamp_ms <= record.timestamp_ms);
            self.records.insert(idx, record);
        }

        while self.records.len() > self.max_points {
            self.records.pop_front();
        }
    }

    /// Discard all retained records. The capacity setting is kept.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Materialize the window into a chart-ready frame.
    ///
    /// The frame owns its data; handing it to a renderer never blocks
    /// further inserts.
    pub fn frame(&self) -> ChartFrame {
        // Union of field names across the window; a field may appear in
        // only some records (sources can add or drop columns mid-stream)
        let mut names: BTreeSet<&str> = BTreeSet::new();
        for record in &self.records {
            for name in record.fields.keys() {
                names.insert(name.as_str());
            }
        }

        let mut timestamps = Vec::with_capacity(self.records.len());
        let mut series: BTreeMap<String, Vec<Option<f64>>> = names
            .iter()
            .map(|n| (n.to_string(), Vec::with_capacity(self.records.len())))
            .collect();

        for record in &self.records {
            timestamps.push(record.timestamp_ms);
            for (name, values) in series.iter_mut() {
                values.push(record.fields.get(name).copied());
            }
        }

        ChartFrame { timestamps, series }
    }
}

/// Immutable point-in-time view of the buffer, shaped for a renderer:
/// one ordered x-axis plus one parallel series per field name, with
/// `None` gaps where a field was absent for a given timestamp.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChartFrame {
    pub timestamps: Vec<i64>,
    pub series: BTreeMap<String, Vec<Option<f64>>>,
}

impl ChartFrame {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Inclusive (oldest, newest) timestamp span, if any points exist.
    pub fn span_ms(&self) -> Option<(i64, i64)> {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(&first), Some(&last)) => Some((first, last)),
            _ => None,
        }
    }
}
