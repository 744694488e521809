//! Lazy cross join of two tuple iterables

use crate::error::CalcResult;
use crate::tuple::{ColumnSlice, TupleCursor, TupleIterable};
use mdxcalc_model::MemberRef;
use std::sync::Arc;

/// The cartesian product of two iterables, produced on demand.
///
/// The right-hand side is re-scanned once per left tuple, so it should be
/// cheap to iterate (typically a materialized list).
#[derive(Debug, Clone)]
pub struct CrossJoinIterable {
    left: Arc<dyn TupleIterable>,
    right: Arc<dyn TupleIterable>,
}

impl CrossJoinIterable {
    pub fn new(left: Arc<dyn TupleIterable>, right: Arc<dyn TupleIterable>) -> Self {
        Self { left, right }
    }
}

struct CrossJoinCursor<'a> {
    source: &'a CrossJoinIterable,
    left: Box<dyn TupleCursor + 'a>,
    right: Option<Box<dyn TupleCursor + 'a>>,
    current: Vec<MemberRef>,
}

impl TupleCursor for CrossJoinCursor<'_> {
    fn forward(&mut self) -> bool {
        loop {
            if let Some(right) = self.right.as_mut() {
                if right.forward() {
                    self.current.clear();
                    self.current.extend_from_slice(self.left.current());
                    self.current.extend_from_slice(right.current());
                    return true;
                }
            }
            if !self.left.forward() {
                self.right = None;
                self.current.clear();
                return false;
            }
            self.right = Some(self.source.right.tuple_cursor());
        }
    }

    fn arity(&self) -> usize {
        self.source.arity()
    }

    fn current(&self) -> &[MemberRef] {
        &self.current
    }
}

impl TupleIterable for CrossJoinIterable {
    fn arity(&self) -> usize {
        self.left.arity() + self.right.arity()
    }

    fn tuple_cursor(&self) -> Box<dyn TupleCursor + '_> {
        Box::new(CrossJoinCursor {
            source: self,
            left: self.left.tuple_cursor(),
            right: None,
            current: Vec::with_capacity(self.arity()),
        })
    }

    fn slice(self: Arc<Self>, column: usize) -> CalcResult<Arc<dyn TupleIterable>> {
        Ok(Arc::new(ColumnSlice::new(self, column)?))
    }
}
