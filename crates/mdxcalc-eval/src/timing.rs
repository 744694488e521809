//! Named timing marks collected during a query

use indexmap::IndexMap;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Accumulated time for one mark name
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimingStat {
    pub count: u64,
    pub total: Duration,
}

/// Start/end marks keyed by name, in first-seen order
#[derive(Debug, Default)]
pub struct QueryTiming {
    open: Vec<(String, Instant)>,
    stats: IndexMap<String, TimingStat>,
}

impl QueryTiming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_start(&mut self, name: &str) {
        self.open.push((name.to_string(), Instant::now()));
    }

    /// Close the most recent open mark with this name.
    ///
    /// An end without a matching start is ignored.
    pub fn mark_end(&mut self, name: &str) {
        let Some(pos) = self.open.iter().rposition(|(n, _)| n == name) else {
            log::trace!("timing mark '{}' ended without start", name);
            return;
        };
        let (name, start) = self.open.remove(pos);
        let stat = self.stats.entry(name).or_default();
        stat.count += 1;
        stat.total += start.elapsed();
    }

    /// Add another collector's totals into this one
    pub fn merge(&mut self, other: &QueryTiming) {
        for (name, stat) in &other.stats {
            let entry = self.stats.entry(name.clone()).or_default();
            entry.count += stat.count;
            entry.total += stat.total;
        }
    }

    pub fn stats(&self) -> &IndexMap<String, TimingStat> {
        &self.stats
    }

    pub fn get(&self, name: &str) -> Option<&TimingStat> {
        self.stats.get(name)
    }
}
