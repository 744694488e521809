//! Implicit conversion rules
//!
//! Overload resolution asks, for each argument position, whether the
//! argument's category can be converted to the parameter's category and
//! at what cost. The cheapest candidate wins, so costs encode preference:
//! - exact matches cost nothing
//! - widening a number or wrapping a member as a tuple costs 1
//! - reading a cell value from a member or tuple costs 1 for numbers
//! - reading an untyped value as a number costs 2, as anything else 3
//! - turning a single member into a set, or a dimension into its
//!   hierarchy, costs 2
//! - a dimension standing for its current member costs 3

use crate::DataType;
use thiserror::Error;

/// Coercion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    /// No implicit conversion exists
    #[error("Cannot implicitly convert from {from} to {to}")]
    ImplicitNotAllowed { from: DataType, to: DataType },
}

/// Type coercion result
pub type CoercionResult<T> = Result<T, CoercionError>;

/// What an implicit conversion does to its operand at run time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionKind {
    /// No conversion needed
    Identity,
    /// Integer widened to numeric
    NumericPromotion,
    /// Logical read as a number, or a number tested for truth
    LogicalNumeric,
    /// Null literal typed as a scalar
    NullToScalar,
    /// Scalar viewed as an untyped value
    ScalarToValue,
    /// Untyped value read as a specific scalar at run time
    ValueToScalar,
    /// Member or tuple evaluated as the value of its cell
    CellValue,
    /// Member wrapped as a one-column tuple
    MemberToTuple,
    /// Member or tuple wrapped as a one-element set
    ToSet,
    /// Hierarchy or dimension evaluated as its current member
    CurrentMember,
    /// Dimension resolved to its only hierarchy
    DimensionToHierarchy,
    /// Level resolved to the hierarchy it belongs to
    LevelToHierarchy,
    /// Not convertible
    NotConvertible,
}

/// Implicit conversion rules between type categories
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeCoercer;

impl TypeCoercer {
    /// Create a new type coercer
    pub fn new() -> Self {
        Self
    }

    /// Categorize the conversion between two categories
    pub fn categorize_conversion(&self, from: DataType, to: DataType) -> ConversionKind {
        use DataType as D;

        if from == to {
            return ConversionKind::Identity;
        }

        match (from, to) {
            (D::Integer, D::Numeric) => ConversionKind::NumericPromotion,
            (D::Logical, D::Numeric) | (D::Numeric | D::Integer, D::Logical) => {
                ConversionKind::LogicalNumeric
            }
            (D::Null, t) if t.is_scalar() => ConversionKind::NullToScalar,
            (f, D::Value) if f.is_scalar() => ConversionKind::ScalarToValue,
            (D::Value, D::Numeric | D::Integer | D::String | D::Logical) => {
                ConversionKind::ValueToScalar
            }

            (D::Member | D::Tuple, D::Numeric | D::String | D::Logical | D::Value) => {
                ConversionKind::CellValue
            }
            (D::Member, D::Tuple) => ConversionKind::MemberToTuple,
            (D::Member | D::Tuple, D::Set) => ConversionKind::ToSet,
            (D::Hierarchy | D::Dimension, D::Member) => ConversionKind::CurrentMember,
            (D::Dimension, D::Hierarchy) => ConversionKind::DimensionToHierarchy,
            (D::Level, D::Hierarchy) => ConversionKind::LevelToHierarchy,

            _ => ConversionKind::NotConvertible,
        }
    }

    /// Check if implicit conversion from `from` to `to` is allowed
    pub fn can_implicitly_convert(&self, from: DataType, to: DataType) -> bool {
        self.categorize_conversion(from, to) != ConversionKind::NotConvertible
    }

    /// Calculate the conversion cost for implicit conversion
    ///
    /// Lower cost means more preferred conversion. Returns None if conversion
    /// is not possible. Used for function overload resolution.
    pub fn conversion_cost(&self, from: DataType, to: DataType) -> Option<u32> {
        use DataType as D;

        let cost = match self.categorize_conversion(from, to) {
            ConversionKind::Identity => 0,
            ConversionKind::NumericPromotion => 1,
            ConversionKind::LogicalNumeric => 2,
            ConversionKind::NullToScalar => 1,
            ConversionKind::ScalarToValue => 1,
            ConversionKind::ValueToScalar => match to {
                D::Numeric => 2,
                _ => 3,
            },
            ConversionKind::CellValue => match to {
                D::Numeric | D::Value => 1,
                _ => 2,
            },
            ConversionKind::MemberToTuple => 1,
            ConversionKind::ToSet => 2,
            ConversionKind::CurrentMember => match from {
                D::Hierarchy => 1,
                _ => 3,
            },
            ConversionKind::DimensionToHierarchy => 2,
            ConversionKind::LevelToHierarchy => 2,
            ConversionKind::NotConvertible => return None,
        };
        Some(cost)
    }

    /// Validate that an implicit conversion exists
    pub fn validate_conversion(&self, from: DataType, to: DataType) -> CoercionResult<()> {
        if self.can_implicitly_convert(from, to) {
            Ok(())
        } else {
            Err(CoercionError::ImplicitNotAllowed { from, to })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_free() {
        let coercer = TypeCoercer::new();
        for t in DataType::ALL {
            assert_eq!(coercer.conversion_cost(t, t), Some(0));
        }
    }

    #[test]
    fn test_numeric_promotion() {
        let coercer = TypeCoercer::new();
        assert_eq!(coercer.conversion_cost(DataType::Integer, DataType::Numeric), Some(1));
        assert_eq!(coercer.conversion_cost(DataType::Numeric, DataType::Integer), None);
    }

    #[test]
    fn test_member_prefers_numeric_cell_value() {
        let coercer = TypeCoercer::new();
        let numeric = coercer.conversion_cost(DataType::Member, DataType::Numeric);
        let string = coercer.conversion_cost(DataType::Member, DataType::String);
        assert!(numeric < string);
        assert_eq!(coercer.conversion_cost(DataType::Member, DataType::Integer), None);
    }

    #[test]
    fn test_untyped_value_costs_more_than_cell_value() {
        let coercer = TypeCoercer::new();
        for to in [DataType::Numeric, DataType::String] {
            let value = coercer.conversion_cost(DataType::Value, to);
            let cell = coercer.conversion_cost(DataType::Member, to);
            assert!(value > cell, "{}", to);
        }
        // numbers stay the cheapest reading, so mixed operands are not ambiguous
        assert!(
            coercer.conversion_cost(DataType::Value, DataType::Numeric)
                < coercer.conversion_cost(DataType::Value, DataType::Integer)
        );
    }

    #[test]
    fn test_validate_conversion() {
        let coercer = TypeCoercer::new();
        assert!(coercer.validate_conversion(DataType::Dimension, DataType::Hierarchy).is_ok());
        let err = coercer
            .validate_conversion(DataType::Set, DataType::Member)
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot implicitly convert from Set to Member");
    }
}
