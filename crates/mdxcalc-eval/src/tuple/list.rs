//! Materialized tuple lists
//!
//! A `TupleList` stores tuples of one fixed arity in a single dense member
//! buffer. Single-column lists keep one member per entry; wider lists keep
//! `len * arity` members, tuple `i` occupying `[i * arity, (i + 1) * arity)`.

use crate::error::{CalcError, CalcResult};
use mdxcalc_model::MemberRef;

#[derive(Debug, Clone, PartialEq)]
enum Repr {
    /// Arity 1
    Unary(Vec<MemberRef>),
    /// Arity 2 or more
    Array { arity: usize, members: Vec<MemberRef> },
}

/// An ordered list of tuples sharing one arity, bounded by a size limit
#[derive(Debug, Clone, PartialEq)]
pub struct TupleList {
    repr: Repr,
    /// Maximum number of tuples; 0 means unbounded
    limit: usize,
}

/// Default initial capacity, in tuples, of an array-backed list
const DEFAULT_CAPACITY: usize = 10;

impl TupleList {
    /// An empty list of single members
    pub fn unary(limit: usize) -> Self {
        Self {
            repr: Repr::Unary(Vec::new()),
            limit,
        }
    }

    /// An empty array-backed list with room for `capacity` tuples.
    ///
    /// An arity of 1 still produces the single-member representation.
    pub fn array(arity: usize, capacity: usize, limit: usize) -> Self {
        if arity <= 1 {
            return Self {
                repr: Repr::Unary(Vec::with_capacity(capacity)),
                limit,
            };
        }
        Self {
            repr: Repr::Array {
                arity,
                members: Vec::with_capacity(capacity * arity),
            },
            limit,
        }
    }

    /// An empty list of the given arity, with the default capacity
    pub fn with_arity(arity: usize, limit: usize) -> Self {
        Self::array(arity, DEFAULT_CAPACITY, limit)
    }

    /// A single-column list holding `members`
    pub fn from_members(members: Vec<MemberRef>, limit: usize) -> CalcResult<Self> {
        check_limit(members.len(), limit)?;
        Ok(Self {
            repr: Repr::Unary(members),
            limit,
        })
    }

    /// Number of members per tuple
    pub fn arity(&self) -> usize {
        match &self.repr {
            Repr::Unary(_) => 1,
            Repr::Array { arity, .. } => *arity,
        }
    }

    /// Number of tuples
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Unary(members) => members.len(),
            Repr::Array { arity, members } => members.len() / arity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of tuples the list can hold before it reallocates
    pub fn capacity(&self) -> usize {
        match &self.repr {
            Repr::Unary(members) => members.capacity(),
            Repr::Array { arity, members } => members.capacity() / arity,
        }
    }

    /// The flat member buffer
    pub fn members(&self) -> &[MemberRef] {
        match &self.repr {
            Repr::Unary(members) | Repr::Array { members, .. } => members,
        }
    }

    /// Append a tuple.
    ///
    /// Fails without modifying the list if the tuple has the wrong arity or
    /// the list is already at its limit.
    pub fn add_tuple(&mut self, tuple: &[MemberRef]) -> CalcResult<()> {
        let arity = self.arity();
        if tuple.len() != arity {
            return Err(CalcError::ArityMismatch {
                expected: arity,
                actual: tuple.len(),
            });
        }
        check_limit(self.len() + 1, self.limit)?;

        match &mut self.repr {
            Repr::Unary(members) => members.extend_from_slice(tuple),
            Repr::Array { arity, members } => {
                let needed = members.len() + *arity;
                if needed > members.capacity() {
                    let doubled = (members.capacity() * 2).max(needed);
                    members.reserve_exact(doubled - members.len());
                }
                members.extend_from_slice(tuple);
            }
        }
        Ok(())
    }

    /// Append a tuple given as an owned vector
    pub fn add(&mut self, tuple: Vec<MemberRef>) -> CalcResult<()> {
        self.add_tuple(&tuple)
    }

    /// Append every tuple of `other`
    pub fn extend_from(&mut self, other: &TupleList) -> CalcResult<()> {
        for tuple in other.iter() {
            self.add_tuple(tuple)?;
        }
        Ok(())
    }

    /// Tuple `index`, as a view into the list
    pub fn get(&self, index: usize) -> Option<&[MemberRef]> {
        let arity = self.arity();
        let start = index.checked_mul(arity)?;
        self.members().get(start..start + arity)
    }

    /// Iterate over the tuples in order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[MemberRef]> + '_ {
        self.members().chunks_exact(self.arity())
    }

    /// Members of one column, as a single-column list
    pub fn column(&self, column: usize) -> CalcResult<TupleList> {
        let arity = self.arity();
        if column >= arity {
            return Err(CalcError::invalid_argument(
                "slice",
                format!("column {} out of range for arity {}", column, arity),
            ));
        }
        let members = self.iter().map(|t| t[column].clone()).collect();
        Ok(Self {
            repr: Repr::Unary(members),
            limit: self.limit,
        })
    }

    /// Tuples `[start, end)` as a new list
    pub fn sub_list(&self, start: usize, end: usize) -> TupleList {
        let arity = self.arity();
        let end = end.min(self.len());
        let start = start.min(end);
        let members = self.members()[start * arity..end * arity].to_vec();
        let repr = match self.repr {
            Repr::Unary(_) => Repr::Unary(members),
            Repr::Array { arity, .. } => Repr::Array { arity, members },
        };
        Self {
            repr,
            limit: self.limit,
        }
    }

    /// Keep only the first `len` tuples
    pub fn truncate(&mut self, len: usize) {
        let arity = self.arity();
        match &mut self.repr {
            Repr::Unary(members) | Repr::Array { members, .. } => members.truncate(len * arity),
        }
    }

    /// Remove all tuples
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// A copy of the tuples in the order given by `indices`
    pub fn permute(&self, indices: &[usize]) -> CalcResult<TupleList> {
        let mut out = TupleList::array(self.arity(), indices.len(), self.limit);
        for &i in indices {
            let tuple = self.get(i).ok_or_else(|| {
                CalcError::internal(format!("tuple index {} out of range ({})", i, self.len()))
            })?;
            out.add_tuple(tuple)?;
        }
        Ok(out)
    }

    /// Whether the list contains `tuple`
    pub fn contains(&self, tuple: &[MemberRef]) -> bool {
        self.iter().any(|t| t == tuple)
    }
}

fn check_limit(attempted: usize, limit: usize) -> CalcResult<()> {
    if limit > 0 && attempted > limit {
        log::warn!("tuple list size {} exceeds result limit {}", attempted, limit);
        return Err(CalcError::ResourceLimitExceeded { attempted, limit });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_cube;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_growth_preserves_tuples() {
        let cube = sample_cube();
        let m1 = cube.lookup_member("[Time].[1997]").unwrap().clone();
        let m2 = cube.lookup_member("[Store].[USA]").unwrap().clone();

        let mut list = TupleList::array(2, 10, 0);
        for _ in 0..50 {
            list.add_tuple(&[m1.clone(), m2.clone()]).unwrap();
        }
        assert_eq!(list.len(), 50);
        assert!(list.capacity() >= 50);
        for i in 0..50 {
            let tuple = list.get(i).unwrap();
            assert_eq!(tuple[0], m1);
            assert_eq!(tuple[1], m2);
        }
        assert!(list.get(50).is_none());
    }

    #[test]
    fn test_limit_checked_before_growth() {
        let cube = sample_cube();
        let m = cube.lookup_member("[Time].[1997]").unwrap().clone();
        let mut list = TupleList::unary(2);
        list.add_tuple(&[m.clone()]).unwrap();
        list.add_tuple(&[m.clone()]).unwrap();

        let err = list.add_tuple(&[m]).unwrap_err();
        assert_eq!(err, CalcError::ResourceLimitExceeded { attempted: 3, limit: 2 });
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_arity_mismatch_leaves_list_untouched() {
        let cube = sample_cube();
        let m = cube.lookup_member("[Time].[1997]").unwrap().clone();
        let mut list = TupleList::with_arity(2, 0);
        list.add_tuple(&[m.clone(), m.clone()]).unwrap();

        let err = list.add_tuple(&[m]).unwrap_err();
        assert_eq!(err, CalcError::ArityMismatch { expected: 2, actual: 1 });
        assert_eq!(list.len(), 1);
        assert_eq!(list.members().len(), 2);
    }

    #[test]
    fn test_column_and_sub_list() {
        let cube = sample_cube();
        let y = cube.lookup_member("[Time].[1997]").unwrap().clone();
        let q1 = cube.lookup_member("[Time].[1997].[Q1]").unwrap().clone();
        let usa = cube.lookup_member("[Store].[USA]").unwrap().clone();

        let mut list = TupleList::with_arity(2, 0);
        list.add_tuple(&[y.clone(), usa.clone()]).unwrap();
        list.add_tuple(&[q1.clone(), usa.clone()]).unwrap();

        let col = list.column(0).unwrap();
        assert_eq!(col.arity(), 1);
        assert_eq!(col.members(), &[y.clone(), q1.clone()]);
        assert!(list.column(2).is_err());

        let sub = list.sub_list(1, 5);
        assert_eq!(sub.len(), 1);
        assert_eq!(sub.get(0).unwrap(), &[q1, usa]);
    }

    #[test]
    fn test_permute() {
        let cube = sample_cube();
        let a = cube.lookup_member("[Time].[1997]").unwrap().clone();
        let b = cube.lookup_member("[Time].[1998]").unwrap().clone();
        let list = TupleList::from_members(vec![a.clone(), b.clone()], 0).unwrap();
        let reversed = list.permute(&[1, 0]).unwrap();
        assert_eq!(reversed.members(), &[b, a]);
        assert!(list.permute(&[2]).is_err());
    }
}
