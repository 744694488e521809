//! Evaluation context
//!
//! An `Evaluator` holds the current member of every hierarchy in the cube,
//! the non-empty flag, and everything a calc needs while it runs: the
//! catalog, the cell reader, configuration, the cancellation state, timing
//! and an expression cache.
//!
//! Context changes are recorded on an undo stack. `savepoint` marks the
//! stack, `restore` pops back to a mark in LIFO order, and `push` returns a
//! guard that restores when it goes out of scope, so a calc that changes the
//! context and then fails with `?` leaves the evaluator as it found it.

use crate::cancel::{CancellationChecker, Execution, IterationCounter};
use crate::config::EngineConfig;
use crate::error::{CalcError, CalcResult};
use crate::timing::QueryTiming;
use crate::tuple::TupleCollections;
use crate::value::Value;
use mdxcalc_model::{CellLookup, CellReader, Cube, Hierarchy, MemberRef};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Key of a cached expression value: the cache slot, the non-empty flag and
/// the current members of the hierarchies the expression depends on
pub type CacheKey = (u64, bool, SmallVec<[MemberRef; 4]>);

/// Opaque marker into the evaluator's undo stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint(usize);

#[derive(Debug, Clone)]
enum Mutation {
    Member { ordinal: usize, previous: MemberRef },
    NonEmpty(bool),
}

pub struct Evaluator {
    cube: Arc<Cube>,
    config: Arc<EngineConfig>,
    reader: Arc<dyn CellReader>,
    execution: Arc<Execution>,
    checker: CancellationChecker,
    collections: TupleCollections,
    context: Vec<MemberRef>,
    non_empty: bool,
    undo: Vec<Mutation>,
    timing: QueryTiming,
    cache: HashMap<CacheKey, Value>,
    parameters: HashMap<String, Value>,
    depth: usize,
}

impl Evaluator {
    /// A fresh evaluator positioned on every hierarchy's default member
    pub fn new(cube: Arc<Cube>, reader: Arc<dyn CellReader>, config: Arc<EngineConfig>) -> Self {
        let execution = Arc::new(Execution::new(config.query_timeout()));
        Self {
            context: cube.default_members(),
            checker: CancellationChecker::new(config.check_cancel_or_timeout_interval),
            collections: TupleCollections::new(config.result_limit),
            cube,
            config,
            reader,
            execution,
            non_empty: false,
            undo: Vec::new(),
            timing: QueryTiming::new(),
            cache: HashMap::new(),
            parameters: HashMap::new(),
            depth: 0,
        }
    }

    /// Share an existing execution, so several evaluators stop together
    pub fn with_execution(mut self, execution: Arc<Execution>) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn cube(&self) -> &Arc<Cube> {
        &self.cube
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn execution(&self) -> &Arc<Execution> {
        &self.execution
    }

    pub fn collections(&self) -> TupleCollections {
        self.collections
    }

    pub fn timing(&self) -> &QueryTiming {
        &self.timing
    }

    pub fn timing_mut(&mut self) -> &mut QueryTiming {
        &mut self.timing
    }

    // Context

    pub fn savepoint(&self) -> Savepoint {
        Savepoint(self.undo.len())
    }

    /// Undo every mutation made since `savepoint`, newest first
    pub fn restore(&mut self, savepoint: Savepoint) {
        while self.undo.len() > savepoint.0 {
            match self.undo.pop() {
                Some(Mutation::Member { ordinal, previous }) => self.context[ordinal] = previous,
                Some(Mutation::NonEmpty(previous)) => self.non_empty = previous,
                None => break,
            }
        }
    }

    /// A scope whose context changes are undone when it is dropped
    pub fn push(&mut self) -> EvaluatorGuard<'_> {
        let savepoint = self.savepoint();
        EvaluatorGuard {
            evaluator: self,
            savepoint,
        }
    }

    /// Make `member` current on its hierarchy; returns the previous member
    pub fn set_context(&mut self, member: MemberRef) -> MemberRef {
        let ordinal = member.hierarchy_ordinal();
        let previous = std::mem::replace(&mut self.context[ordinal], member);
        self.undo.push(Mutation::Member {
            ordinal,
            previous: previous.clone(),
        });
        previous
    }

    /// Make every member of `tuple` current
    pub fn set_context_tuple(&mut self, tuple: &[MemberRef]) {
        for member in tuple {
            self.set_context(member.clone());
        }
    }

    /// The current member of `hierarchy`
    pub fn get_context(&self, hierarchy: &Hierarchy) -> CalcResult<&MemberRef> {
        self.context.get(hierarchy.ordinal()).ok_or_else(|| {
            CalcError::internal(format!(
                "hierarchy {} is not part of cube {}",
                hierarchy,
                self.cube.name()
            ))
        })
    }

    /// Current members, indexed by hierarchy ordinal
    pub fn current_members(&self) -> &[MemberRef] {
        &self.context
    }

    /// Set the non-empty flag; returns the previous value
    pub fn set_non_empty(&mut self, non_empty: bool) -> bool {
        let previous = std::mem::replace(&mut self.non_empty, non_empty);
        self.undo.push(Mutation::NonEmpty(previous));
        previous
    }

    pub fn is_non_empty(&self) -> bool {
        self.non_empty
    }

    // Cells

    /// Value of the cell at the current context.
    ///
    /// A cell that is not loaded yet is queued with the reader and reads as
    /// null. Once a full batch is queued this fails with `QuantumExceeded`
    /// so the phase can stop and the batch can be loaded.
    pub fn evaluate_current(&self) -> CalcResult<Value> {
        match self.reader.get(&self.context) {
            CellLookup::Ready(value) => Ok(Value::from(value)),
            CellLookup::Pending => {
                if self.reader.pending_count() >= self.config.cell_batch_size.max(1) {
                    Err(CalcError::QuantumExceeded)
                } else {
                    Ok(Value::Null)
                }
            }
        }
    }

    /// Whether the cell at the current context is empty
    pub fn is_empty_cell(&self) -> CalcResult<bool> {
        Ok(self.evaluate_current()?.is_null())
    }

    // Execution

    /// Poll for cancellation and timeout on every configured interval
    pub fn check_cancel_or_timeout<I: IterationCounter>(&self, iteration: I) -> CalcResult<()> {
        self.checker
            .check_cancel_or_timeout(iteration, &self.execution)
    }

    /// Enter a nested calc evaluation
    pub fn enter_calc(&mut self) -> CalcResult<()> {
        if self.depth >= self.config.max_eval_depth {
            return Err(CalcError::RecursionLimit {
                max: self.config.max_eval_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave_calc(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    // Cache and parameters

    pub fn cached_value(&self, key: &CacheKey) -> Option<&Value> {
        self.cache.get(key)
    }

    pub fn cache_value(&mut self, key: CacheKey, value: Value) {
        self.cache.insert(key, value);
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: Value) {
        self.parameters.insert(name.into(), value);
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("cube", &self.cube.name())
            .field("context", &self.context)
            .field("non_empty", &self.non_empty)
            .field("undo", &self.undo.len())
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

/// Restores the evaluator to where it was pushed when dropped
pub struct EvaluatorGuard<'a> {
    evaluator: &'a mut Evaluator,
    savepoint: Savepoint,
}

impl Deref for EvaluatorGuard<'_> {
    type Target = Evaluator;

    fn deref(&self) -> &Evaluator {
        self.evaluator
    }
}

impl DerefMut for EvaluatorGuard<'_> {
    fn deref_mut(&mut self) -> &mut Evaluator {
        self.evaluator
    }
}

impl Drop for EvaluatorGuard<'_> {
    fn drop(&mut self) {
        self.evaluator.restore(self.savepoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_cube, sample_evaluator};
    use pretty_assertions::assert_eq;

    fn member(name: &str) -> MemberRef {
        sample_cube().lookup_member(name).unwrap().clone()
    }

    fn context_names(ev: &Evaluator) -> Vec<String> {
        ev.current_members()
            .iter()
            .map(|m| m.unique_name().to_string())
            .collect()
    }

    #[test]
    fn test_default_context() {
        let ev = sample_evaluator();
        let time = ev.cube().hierarchy("[Time]").unwrap().clone();
        assert_eq!(ev.get_context(&time).unwrap().unique_name(), "[Time].[All Times]");
        assert!(!ev.is_non_empty());
    }

    #[test]
    fn test_savepoint_restore_is_lifo() {
        let mut ev = sample_evaluator();
        let before = context_names(&ev);

        let sp = ev.savepoint();
        ev.set_context(member("[Time].[1997]"));
        ev.set_context(member("[Time].[1997].[Q2]"));
        ev.set_non_empty(true);
        ev.set_context(member("[Store].[USA].[CA]"));
        assert_ne!(context_names(&ev), before);

        ev.restore(sp);
        assert_eq!(context_names(&ev), before);
        assert!(!ev.is_non_empty());
    }

    #[test]
    fn test_nested_savepoints() {
        let mut ev = sample_evaluator();
        ev.set_context(member("[Time].[1997]"));
        let outer = context_names(&ev);
        let sp = ev.savepoint();
        ev.set_context(member("[Time].[1998]"));
        ev.restore(sp);
        assert_eq!(context_names(&ev), outer);
    }

    #[test]
    fn test_guard_restores_on_error_path() {
        fn failing(ev: &mut Evaluator) -> CalcResult<()> {
            let mut scope = ev.push();
            scope.set_context(member("[Time].[1998]"));
            scope.set_non_empty(true);
            Err(CalcError::Cancelled)
        }

        let mut ev = sample_evaluator();
        let before = context_names(&ev);
        assert_eq!(failing(&mut ev), Err(CalcError::Cancelled));
        assert_eq!(context_names(&ev), before);
        assert!(!ev.is_non_empty());
    }

    #[test]
    fn test_evaluate_current_reads_cells() {
        let mut ev = sample_evaluator();
        let mut scope = ev.push();
        scope.set_context(member("[Time].[1997].[Q1]"));
        scope.set_context(member("[Store].[USA].[CA]"));
        assert_eq!(scope.evaluate_current().unwrap(), Value::Double(10.0));
        scope.set_context(member("[Time].[1998]"));
        assert!(scope.is_empty_cell().unwrap());
    }

    #[test]
    fn test_recursion_limit() {
        let mut ev = sample_evaluator();
        let max = ev.config().max_eval_depth;
        for _ in 0..max {
            ev.enter_calc().unwrap();
        }
        assert_eq!(ev.enter_calc(), Err(CalcError::RecursionLimit { max }));
        ev.leave_calc();
        assert!(ev.enter_calc().is_ok());
    }
}
