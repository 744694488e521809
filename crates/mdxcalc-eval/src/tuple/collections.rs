//! Factory and helpers for tuple collections
//!
//! Every list the engine creates goes through `TupleCollections`, which
//! carries the configured result limit so no caller can forget it.

use crate::error::CalcResult;
use crate::evaluator::Evaluator;
use crate::tuple::{CrossJoinIterable, TupleIterable, TupleList};
use mdxcalc_model::MemberRef;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleCollections {
    limit: usize,
}

impl TupleCollections {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// An empty list of the given arity
    pub fn create_list(&self, arity: usize) -> TupleList {
        TupleList::with_arity(arity, self.limit)
    }

    /// An empty list with room for `capacity` tuples
    pub fn create_list_with_capacity(&self, arity: usize, capacity: usize) -> TupleList {
        TupleList::array(arity, capacity, self.limit)
    }

    /// A single-column list of `members`
    pub fn from_members(&self, members: Vec<MemberRef>) -> CalcResult<TupleList> {
        TupleList::from_members(members, self.limit)
    }

    /// A list holding one tuple
    pub fn singleton(&self, tuple: &[MemberRef]) -> CalcResult<TupleList> {
        let mut list = self.create_list_with_capacity(tuple.len(), 1);
        list.add_tuple(tuple)?;
        Ok(list)
    }

    /// Copy an iterable into a list, polling for cancellation as it goes
    pub fn materialize(
        &self,
        iterable: &dyn TupleIterable,
        evaluator: &Evaluator,
    ) -> CalcResult<TupleList> {
        let mut list = self.create_list(iterable.arity());
        let mut cursor = iterable.tuple_cursor();
        let mut iteration: u64 = 0;
        while cursor.forward() {
            evaluator.check_cancel_or_timeout(iteration)?;
            list.add_tuple(cursor.current())?;
            iteration += 1;
        }
        Ok(list)
    }

    /// A lazy cross join of two iterables
    pub fn cross_join(
        &self,
        left: Arc<dyn TupleIterable>,
        right: Arc<dyn TupleIterable>,
    ) -> Arc<dyn TupleIterable> {
        Arc::new(CrossJoinIterable::new(left, right))
    }

    /// Tuples `[start, end)` of `list`
    pub fn sub_list(&self, list: &TupleList, start: usize, end: usize) -> TupleList {
        list.sub_list(start, end)
    }

    /// The members of a single-column iterable
    pub fn member_list(&self, iterable: &dyn TupleIterable) -> Vec<MemberRef> {
        let mut members = Vec::new();
        let mut cursor = iterable.tuple_cursor();
        while cursor.forward() {
            if let Some(m) = cursor.member(0) {
                members.push(m.clone());
            }
        }
        members
    }

    /// Whether two iterables hold the same tuples in the same order
    pub fn equal_tuples(&self, a: &dyn TupleIterable, b: &dyn TupleIterable) -> bool {
        if a.arity() != b.arity() {
            return false;
        }
        let mut ca = a.tuple_cursor();
        let mut cb = b.tuple_cursor();
        loop {
            match (ca.forward(), cb.forward()) {
                (true, true) if ca.current() == cb.current() => continue,
                (false, false) => return true,
                _ => return false,
            }
        }
    }
}
