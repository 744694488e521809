//! Tuple collections: lists, cursors, iterators and iterables

mod collections;
mod crossjoin;
mod cursor;
mod list;

pub use collections::TupleCollections;
pub use crossjoin::CrossJoinIterable;
pub use cursor::{ColumnSlice, ListCursor, TupleCursor, TupleIterable, TupleIterator};
pub use list::TupleList;
