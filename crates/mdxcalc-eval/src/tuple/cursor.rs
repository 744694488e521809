//! Cursor, iterator and iterable protocols over tuple sequences
//!
//! `TupleCursor` is the minimal protocol: advance with `forward`, then read
//! the current tuple in place. `TupleIterator` wraps a cursor as a standard
//! `Iterator` for callers that want owned tuples. `TupleIterable` is
//! anything that can hand out fresh cursors; cursors are not restartable.

use crate::error::CalcResult;
use crate::tuple::TupleList;
use mdxcalc_model::MemberRef;
use std::fmt;
use std::sync::Arc;

/// Forward-only position over a tuple sequence
pub trait TupleCursor {
    /// Move to the next tuple; false once the sequence is exhausted
    fn forward(&mut self) -> bool;

    /// Number of members per tuple
    fn arity(&self) -> usize;

    /// The current tuple; empty before the first `forward` or after the end
    fn current(&self) -> &[MemberRef];

    /// Member `column` of the current tuple
    fn member(&self, column: usize) -> Option<&MemberRef> {
        self.current().get(column)
    }

    /// Copy the current tuple into a new vector
    fn current_to_vec(&self) -> Vec<MemberRef> {
        self.current().to_vec()
    }

    /// Append the current tuple's members to `dest`
    fn current_to_array(&self, dest: &mut Vec<MemberRef>) {
        dest.extend_from_slice(self.current());
    }
}

/// A source of tuple cursors
pub trait TupleIterable: fmt::Debug + Send + Sync {
    /// Number of members per tuple
    fn arity(&self) -> usize;

    /// A fresh cursor positioned before the first tuple
    fn tuple_cursor(&self) -> Box<dyn TupleCursor + '_>;

    /// A fresh iterator over owned tuples
    fn tuple_iter(&self) -> TupleIterator<'_> {
        TupleIterator::new(self.tuple_cursor())
    }

    /// Project one column as a single-column iterable
    fn slice(self: Arc<Self>, column: usize) -> CalcResult<Arc<dyn TupleIterable>>;
}

/// Iterator adapter over a cursor, with `has_next` look-ahead
pub struct TupleIterator<'a> {
    cursor: Box<dyn TupleCursor + 'a>,
    peeked: Option<bool>,
}

impl<'a> TupleIterator<'a> {
    pub fn new(cursor: Box<dyn TupleCursor + 'a>) -> Self {
        Self {
            cursor,
            peeked: None,
        }
    }

    /// Whether another tuple is available, without consuming it
    pub fn has_next(&mut self) -> bool {
        let cursor = &mut self.cursor;
        *self.peeked.get_or_insert_with(|| cursor.forward())
    }

    pub fn arity(&self) -> usize {
        self.cursor.arity()
    }
}

impl Iterator for TupleIterator<'_> {
    type Item = Vec<MemberRef>;

    fn next(&mut self) -> Option<Self::Item> {
        let available = match self.peeked.take() {
            Some(available) => available,
            None => self.cursor.forward(),
        };
        available.then(|| self.cursor.current_to_vec())
    }
}

impl fmt::Debug for TupleIterator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TupleIterator")
            .field("arity", &self.cursor.arity())
            .field("peeked", &self.peeked)
            .finish()
    }
}

/// Cursor over a `TupleList`
#[derive(Debug)]
pub struct ListCursor<'a> {
    list: &'a TupleList,
    next: usize,
    current: Option<usize>,
}

impl<'a> ListCursor<'a> {
    pub fn new(list: &'a TupleList) -> Self {
        Self {
            list,
            next: 0,
            current: None,
        }
    }
}

impl TupleCursor for ListCursor<'_> {
    fn forward(&mut self) -> bool {
        if self.next < self.list.len() {
            self.current = Some(self.next);
            self.next += 1;
            true
        } else {
            self.current = None;
            false
        }
    }

    fn arity(&self) -> usize {
        self.list.arity()
    }

    fn current(&self) -> &[MemberRef] {
        self.current
            .and_then(|i| self.list.get(i))
            .unwrap_or(&[])
    }
}

impl TupleIterable for TupleList {
    fn arity(&self) -> usize {
        TupleList::arity(self)
    }

    fn tuple_cursor(&self) -> Box<dyn TupleCursor + '_> {
        Box::new(ListCursor::new(self))
    }

    fn slice(self: Arc<Self>, column: usize) -> CalcResult<Arc<dyn TupleIterable>> {
        Ok(Arc::new(self.column(column)?))
    }
}

/// Lazy projection of one column of another iterable
#[derive(Debug)]
pub struct ColumnSlice {
    source: Arc<dyn TupleIterable>,
    column: usize,
}

impl ColumnSlice {
    pub fn new(source: Arc<dyn TupleIterable>, column: usize) -> CalcResult<Self> {
        if column >= source.arity() {
            return Err(crate::error::CalcError::invalid_argument(
                "slice",
                format!("column {} out of range for arity {}", column, source.arity()),
            ));
        }
        Ok(Self { source, column })
    }
}

struct ColumnSliceCursor<'a> {
    inner: Box<dyn TupleCursor + 'a>,
    column: usize,
}

impl TupleCursor for ColumnSliceCursor<'_> {
    fn forward(&mut self) -> bool {
        self.inner.forward()
    }

    fn arity(&self) -> usize {
        1
    }

    fn current(&self) -> &[MemberRef] {
        let current = self.inner.current();
        current.get(self.column..=self.column).unwrap_or(&[])
    }
}

impl TupleIterable for ColumnSlice {
    fn arity(&self) -> usize {
        1
    }

    fn tuple_cursor(&self) -> Box<dyn TupleCursor + '_> {
        Box::new(ColumnSliceCursor {
            inner: self.source.tuple_cursor(),
            column: self.column,
        })
    }

    fn slice(self: Arc<Self>, column: usize) -> CalcResult<Arc<dyn TupleIterable>> {
        if column == 0 {
            Ok(self)
        } else {
            Err(crate::error::CalcError::invalid_argument(
                "slice",
                format!("column {} out of range for arity 1", column),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_cube;
    use pretty_assertions::assert_eq;

    fn quarters() -> TupleList {
        let cube = sample_cube();
        let usa = cube.lookup_member("[Store].[USA]").unwrap().clone();
        let mut list = TupleList::with_arity(2, 0);
        for q in ["Q1", "Q2", "Q3"] {
            let m = cube
                .lookup_member(&format!("[Time].[1997].[{}]", q))
                .unwrap()
                .clone();
            list.add_tuple(&[m, usa.clone()]).unwrap();
        }
        list
    }

    #[test]
    fn test_cursor_matches_get() {
        let list = quarters();
        let mut cursor = list.tuple_cursor();
        assert!(cursor.current().is_empty());
        let mut i = 0;
        while cursor.forward() {
            assert_eq!(cursor.current(), list.get(i).unwrap());
            assert_eq!(cursor.member(1), list.get(i).map(|t| &t[1]));
            i += 1;
        }
        assert_eq!(i, list.len());
        assert!(!cursor.forward());
    }

    #[test]
    fn test_iterator_has_next_does_not_consume() {
        let list = quarters();
        let mut iter = list.tuple_iter();
        assert!(iter.has_next());
        assert!(iter.has_next());
        let first = iter.next().unwrap();
        assert_eq!(first.as_slice(), list.get(0).unwrap());
        assert_eq!(iter.count(), 2);
    }

    #[test]
    fn test_current_to_array_appends() {
        let list = quarters();
        let mut cursor = list.tuple_cursor();
        let mut buf = Vec::new();
        while cursor.forward() {
            cursor.current_to_array(&mut buf);
        }
        assert_eq!(buf.as_slice(), list.members());
    }

    #[test]
    fn test_slice_of_list_is_unary() {
        let list = Arc::new(quarters());
        let slice = list.clone().slice(1).unwrap();
        assert_eq!(slice.arity(), 1);
        let names: Vec<String> = slice
            .tuple_iter()
            .map(|t| t[0].unique_name().to_string())
            .collect();
        assert_eq!(names, vec!["[Store].[USA]"; 3]);
    }

    #[test]
    fn test_column_slice_is_lazy_projection() {
        let list: Arc<dyn TupleIterable> = Arc::new(quarters());
        let slice = Arc::new(ColumnSlice::new(list.clone(), 0).unwrap());
        let tuples: Vec<_> = slice.tuple_iter().collect();
        assert_eq!(tuples.len(), 3);
        assert_eq!(tuples[0][0].unique_name(), "[Time].[1997].[Q1]");
        assert!(ColumnSlice::new(list, 2).is_err());
    }
}
