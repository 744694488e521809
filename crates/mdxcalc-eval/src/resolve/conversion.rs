//! Implicit argument conversions recorded during overload matching

use crate::error::ResolutionError;
use crate::expr::{Expression, Literal};
use crate::resolve::definition::scope_of;
use mdxcalc_types::{ConversionKind, DataType, Type};

/// One implicit conversion of one argument.
///
/// Conversions are collected while a candidate is matched, but only the
/// winning candidate's are checked and applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// Argument position
    pub ordinal: usize,
    pub from: Type,
    pub to: DataType,
    pub cost: u32,
    pub kind: ConversionKind,
}

impl Conversion {
    /// Reject conversions that cannot work for this particular operand.
    ///
    /// Costs are assigned by category, so a dimension matches a hierarchy
    /// parameter; but only a dimension with a single hierarchy converts.
    pub fn check_valid(&self) -> Result<(), ResolutionError> {
        if let Type::Dimension(scope) = &self.from {
            if matches!(self.to, DataType::Hierarchy | DataType::Member) && scope.hierarchy.is_none() {
                return Err(ResolutionError::InvalidConversion {
                    from: DataType::Dimension,
                    to: self.to,
                    reason: format!(
                        "dimension {} has more than one hierarchy",
                        scope.dimension.as_deref().unwrap_or("?")
                    ),
                });
            }
        }
        Ok(())
    }

    /// The type the argument has after conversion
    pub fn target_type(&self) -> Type {
        let scope = scope_of(&self.from);
        match (self.to, &self.from) {
            (DataType::Member, _) => Type::member(scope),
            (DataType::Tuple, _) => Type::tuple([scope]),
            (DataType::Set, Type::Tuple(scopes)) => Type::set(Type::Tuple(scopes.clone())),
            (DataType::Set, _) => Type::set(Type::member(scope)),
            (DataType::Hierarchy, _) => Type::Hierarchy(scope),
            (to, _) => Type::from_data_type(to),
        }
    }

    /// Wrap the argument at `ordinal` in a conversion node
    pub fn apply(&self, args: &mut [Expression]) -> Result<(), ResolutionError> {
        let Some(slot) = args.get_mut(self.ordinal) else {
            return Err(ResolutionError::TypeMismatch {
                context: "implicit conversion".to_string(),
                expected: format!("argument {}", self.ordinal),
                found: format!("{} arguments", args.len()),
            });
        };
        let arg = std::mem::replace(slot, Expression::Literal(Literal::Null));
        *slot = Expression::Coerce {
            expr: Box::new(arg),
            to: self.target_type(),
            kind: self.kind,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_cube;
    use mdxcalc_types::MemberScope;
    use pretty_assertions::assert_eq;

    fn conversion(from: Type, to: DataType, kind: ConversionKind) -> Conversion {
        Conversion {
            ordinal: 0,
            from,
            to,
            cost: 2,
            kind,
        }
    }

    #[test]
    fn test_multi_hierarchy_dimension_is_rejected() {
        let cube = sample_cube();
        let time = cube.dimension("Time").unwrap();
        let conv = conversion(
            Type::Dimension(MemberScope::of_dimension(time)),
            DataType::Hierarchy,
            ConversionKind::DimensionToHierarchy,
        );
        assert!(matches!(
            conv.check_valid(),
            Err(ResolutionError::InvalidConversion { .. })
        ));

        let store = cube.dimension("Store").unwrap();
        let conv = conversion(
            Type::Dimension(MemberScope::of_dimension(store)),
            DataType::Hierarchy,
            ConversionKind::DimensionToHierarchy,
        );
        assert!(conv.check_valid().is_ok());
        assert_eq!(conv.target_type().hierarchy(), Some("[Store]"));
    }

    #[test]
    fn test_apply_wraps_argument() {
        let mut args = vec![Expression::integer(1), Expression::numeric(2.0)];
        let conv = conversion(Type::Integer, DataType::Numeric, ConversionKind::NumericPromotion);
        conv.apply(&mut args).unwrap();
        assert!(matches!(
            &args[0],
            Expression::Coerce { to: Type::Numeric, kind: ConversionKind::NumericPromotion, .. }
        ));
        assert_eq!(args[0].get_type(), Type::Numeric);
        assert!(matches!(args[1], Expression::Literal(Literal::Numeric(_))));
    }
}
