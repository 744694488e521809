//! Tuple collection tests
//!
//! Array growth, result limits, and agreement between cursors and
//! positional access.

mod common;

use common::{cube, member};
use mdxcalc_eval::{CalcError, TupleCollections, TupleIterable, TupleList};
use mdxcalc_model::MemberRef;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn pair() -> (MemberRef, MemberRef) {
    let cube = cube();
    (
        member(&cube, "[Time].[1997]"),
        member(&cube, "[Store].[USA].[CA]"),
    )
}

#[test]
fn test_unbounded_list_grows_past_capacity() {
    let (m1, m2) = pair();
    let mut list = TupleList::array(2, 10, 0);
    for _ in 0..50 {
        list.add_tuple(&[m1.clone(), m2.clone()]).unwrap();
    }
    assert_eq!(list.len(), 50);
    for tuple in list.iter() {
        assert_eq!(tuple[0], m1);
        assert_eq!(tuple[1], m2);
    }
}

#[test]
fn test_limit_reports_attempted_and_limit() {
    let (m1, m2) = pair();
    let mut list = TupleList::array(2, 10, 15);
    for _ in 0..15 {
        list.add_tuple(&[m1.clone(), m2.clone()]).unwrap();
    }
    let err = list.add_tuple(&[m1, m2]).unwrap_err();
    assert_eq!(
        err,
        CalcError::ResourceLimitExceeded {
            attempted: 16,
            limit: 15
        }
    );
    let message = err.to_string();
    assert!(message.contains("16"), "{}", message);
    assert!(message.contains("15"), "{}", message);
    assert_eq!(list.len(), 15);
}

#[test]
fn test_wrong_arity_is_rejected_before_mutation() {
    let (m1, m2) = pair();
    let mut list = TupleList::array(2, 4, 0);
    list.add_tuple(&[m1.clone(), m2]).unwrap();
    let err = list.add_tuple(&[m1]).unwrap_err();
    assert_eq!(
        err,
        CalcError::ArityMismatch {
            expected: 2,
            actual: 1
        }
    );
    assert_eq!(list.len(), 1);
}

/// Every member of the fixture cube's Time and Store hierarchies
fn members() -> Vec<MemberRef> {
    let cube = cube();
    cube.hierarchies()
        .iter()
        .filter(|h| !h.unique_name().starts_with("[Measures"))
        .flat_map(|h| h.members().iter().cloned())
        .collect()
}

fn tuples(arity: usize) -> impl Strategy<Value = Vec<Vec<MemberRef>>> {
    let pool = members();
    let index = 0..pool.len();
    prop::collection::vec(prop::collection::vec(index, arity), 0..60).prop_map(move |rows| {
        rows.into_iter()
            .map(|row| row.into_iter().map(|i| pool[i].clone()).collect())
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_get_returns_tuples_in_insertion_order(rows in tuples(2)) {
        let mut list = TupleList::array(2, 10, 0);
        for row in &rows {
            list.add_tuple(row).unwrap();
        }
        prop_assert_eq!(list.len(), rows.len());
        for (i, row) in rows.iter().enumerate() {
            prop_assert_eq!(list.get(i), Some(row.as_slice()));
        }
    }

    #[test]
    fn prop_cursor_matches_positional_access(rows in tuples(3)) {
        let mut list = TupleList::array(3, 1, 0);
        for row in &rows {
            list.add_tuple(row).unwrap();
        }
        let mut cursor = list.tuple_cursor();
        let mut i = 0;
        while cursor.forward() {
            prop_assert_eq!(Some(cursor.current()), list.get(i));
            i += 1;
        }
        prop_assert_eq!(i, list.len());
    }

    #[test]
    fn prop_limit_is_exact(limit in 1usize..40) {
        let (m1, m2) = pair();
        let mut list = TupleCollections::new(limit).create_list(2);
        for _ in 0..limit {
            prop_assert!(list.add_tuple(&[m1.clone(), m2.clone()]).is_ok());
        }
        let err = list.add_tuple(&[m1, m2]).unwrap_err();
        prop_assert_eq!(err, CalcError::ResourceLimitExceeded { attempted: limit + 1, limit });
    }
}
