//! Per-node evaluation profiling

use crate::calc::ResultStyle;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::{Duration, Instant, SystemTime};

#[derive(Debug, Default, Clone, Copy)]
struct ProfileState {
    first_start: Option<SystemTime>,
    last_end: Option<SystemTime>,
    count: u64,
    elapsed: Duration,
}

/// Call statistics of one calc node, shared by every evaluator that runs it
#[derive(Debug, Default)]
pub struct Profiler {
    state: Mutex<ProfileState>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` and record one call, whatever `f` returns
    pub fn record<T>(&self, f: impl FnOnce() -> T) -> T {
        let wall_start = SystemTime::now();
        let start = Instant::now();
        let out = f();
        let elapsed = start.elapsed();

        let mut state = self.state.lock();
        state.first_start.get_or_insert(wall_start);
        state.last_end = Some(SystemTime::now());
        state.count += 1;
        state.elapsed += elapsed;
        out
    }

    pub fn call_count(&self) -> u64 {
        self.state.lock().count
    }

    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }

    pub fn reset(&self) {
        *self.state.lock() = ProfileState::default();
    }

    pub(crate) fn snapshot(
        &self,
        name: &str,
        ty: String,
        style: ResultStyle,
        children: Vec<CalculationProfile>,
    ) -> CalculationProfile {
        let state = *self.state.lock();
        CalculationProfile {
            name: name.to_string(),
            ty,
            style,
            call_count: state.count,
            elapsed: state.elapsed,
            first_start: state.first_start,
            last_end: state.last_end,
            children,
        }
    }
}

/// Snapshot of a calc tree's profiling counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub style: ResultStyle,
    pub call_count: u64,
    pub elapsed: Duration,
    pub first_start: Option<SystemTime>,
    pub last_end: Option<SystemTime>,
    pub children: Vec<CalculationProfile>,
}

impl CalculationProfile {
    /// Total calls across this node and all descendants
    pub fn total_calls(&self) -> u64 {
        self.call_count + self.children.iter().map(Self::total_calls).sum::<u64>()
    }

    /// Depth-first search for the first node with `name`
    pub fn find(&self, name: &str) -> Option<&CalculationProfile> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_failed_calls() {
        let profiler = Profiler::new();
        let ok: Result<i32, ()> = profiler.record(|| Ok(1));
        let err: Result<i32, ()> = profiler.record(|| Err(()));
        assert!(ok.is_ok() && err.is_err());
        assert_eq!(profiler.call_count(), 2);

        let snap = profiler.snapshot("Sum", "Numeric".into(), ResultStyle::Value, vec![]);
        assert_eq!(snap.call_count, 2);
        assert!(snap.first_start.is_some());
        assert!(snap.first_start <= snap.last_end);
    }

    #[test]
    fn test_reset() {
        let profiler = Profiler::new();
        profiler.record(|| ());
        profiler.reset();
        assert_eq!(profiler.call_count(), 0);
    }
}
