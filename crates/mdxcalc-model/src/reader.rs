//! Cell access for the calculation engine
//!
//! The engine never talks to physical storage. It asks a `CellReader` for
//! the value at a full coordinate (one member per hierarchy, indexed by
//! hierarchy ordinal). A reader may answer immediately, or queue the request
//! and answer `Pending`, in which case the caller finishes the current phase,
//! asks the reader to load everything queued, and runs the phase again.

use crate::catalog::MemberRef;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Outcome of a cell lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellLookup {
    /// The cell is available; `None` means the cell is empty
    Ready(Option<f64>),
    /// The request was queued and will be answered after `load_pending`
    Pending,
}

/// Source of cell values
pub trait CellReader: Send + Sync {
    /// Look up the cell at `coordinates` (indexed by hierarchy ordinal)
    fn get(&self, coordinates: &[MemberRef]) -> CellLookup;

    /// Number of requests queued since the last load
    fn pending_count(&self) -> usize {
        0
    }

    /// Load all queued requests; returns how many were loaded
    fn load_pending(&self) -> usize {
        0
    }
}

impl<T: CellReader + ?Sized> CellReader for Arc<T> {
    fn get(&self, coordinates: &[MemberRef]) -> CellLookup {
        (**self).get(coordinates)
    }

    fn pending_count(&self) -> usize {
        (**self).pending_count()
    }

    fn load_pending(&self) -> usize {
        (**self).load_pending()
    }
}

#[derive(Debug, Clone)]
struct Fact {
    coordinates: Vec<MemberRef>,
    value: f64,
}

/// In-memory fact store that aggregates by summation.
///
/// A fact constrains some hierarchies; a cell at coordinate `c` sums every
/// fact whose constrained members are each equal to, or descendants of, the
/// member `c` holds on the same hierarchy.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCellReader {
    facts: Vec<Fact>,
}

impl InMemoryCellReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fact at the given (partial) coordinate
    pub fn add_fact(&mut self, coordinates: impl IntoIterator<Item = MemberRef>, value: f64) {
        self.facts.push(Fact {
            coordinates: coordinates.into_iter().collect(),
            value,
        });
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

impl CellReader for InMemoryCellReader {
    fn get(&self, coordinates: &[MemberRef]) -> CellLookup {
        let mut total = None;
        for fact in &self.facts {
            let matches = fact.coordinates.iter().all(|m| {
                coordinates
                    .get(m.hierarchy_ordinal())
                    .is_some_and(|context| m.is_child_or_equal_to(context))
            });
            if matches {
                *total.get_or_insert(0.0) += fact.value;
            }
        }
        CellLookup::Ready(total)
    }
}

type CellKey = Vec<Arc<str>>;

fn cell_key(coordinates: &[MemberRef]) -> CellKey {
    coordinates
        .iter()
        .map(|m| m.unique_name_arc().clone())
        .collect()
}

/// A reader that defers every miss into a batch.
///
/// The first request for a cell answers `Pending` and queues it; the cell is
/// fetched from the wrapped reader only when `load_pending` is called.
#[derive(Debug)]
pub struct BatchingCellReader<R> {
    inner: R,
    loaded: Mutex<HashMap<CellKey, Option<f64>>>,
    pending: Mutex<IndexMap<CellKey, Vec<MemberRef>>>,
    batches: AtomicUsize,
}

impl<R: CellReader> BatchingCellReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            loaded: Mutex::new(HashMap::new()),
            pending: Mutex::new(IndexMap::new()),
            batches: AtomicUsize::new(0),
        }
    }

    /// Number of batches loaded so far
    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.lock().len()
    }
}

impl<R: CellReader> CellReader for BatchingCellReader<R> {
    fn get(&self, coordinates: &[MemberRef]) -> CellLookup {
        let key = cell_key(coordinates);
        if let Some(value) = self.loaded.lock().get(&key) {
            return CellLookup::Ready(*value);
        }
        self.pending
            .lock()
            .entry(key)
            .or_insert_with(|| coordinates.to_vec());
        CellLookup::Pending
    }

    fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn load_pending(&self) -> usize {
        let batch: Vec<(CellKey, Vec<MemberRef>)> = self.pending.lock().drain(..).collect();
        if batch.is_empty() {
            return 0;
        }
        let mut loaded = self.loaded.lock();
        let mut count = 0;
        for (key, coordinates) in batch {
            if let CellLookup::Ready(value) = self.inner.get(&coordinates) {
                loaded.insert(key, value);
                count += 1;
            }
        }
        let batch_no = self.batches.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!("loaded cell batch #{} ({} cells)", batch_no, count);
        count
    }
}
