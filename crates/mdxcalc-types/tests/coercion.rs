//! Implicit conversion cost table tests

use mdxcalc_types::*;
use rstest::rstest;

#[rstest]
#[case(DataType::Integer, DataType::Numeric, Some(1))]
#[case(DataType::Integer, DataType::Value, Some(1))]
#[case(DataType::Logical, DataType::Numeric, Some(2))]
#[case(DataType::Numeric, DataType::Logical, Some(2))]
#[case(DataType::Null, DataType::String, Some(1))]
#[case(DataType::Member, DataType::Tuple, Some(1))]
#[case(DataType::Member, DataType::Numeric, Some(1))]
#[case(DataType::Tuple, DataType::String, Some(2))]
#[case(DataType::Member, DataType::Set, Some(2))]
#[case(DataType::Tuple, DataType::Set, Some(2))]
#[case(DataType::Hierarchy, DataType::Member, Some(1))]
#[case(DataType::Dimension, DataType::Hierarchy, Some(2))]
#[case(DataType::Dimension, DataType::Member, Some(3))]
#[case(DataType::Level, DataType::Hierarchy, Some(2))]
#[case(DataType::Value, DataType::Numeric, Some(2))]
#[case(DataType::Value, DataType::Integer, Some(3))]
#[case(DataType::Value, DataType::String, Some(3))]
#[case(DataType::Value, DataType::Logical, Some(3))]
#[case(DataType::Value, DataType::Member, None)]
#[case(DataType::String, DataType::Numeric, None)]
#[case(DataType::Set, DataType::Member, None)]
#[case(DataType::Tuple, DataType::Member, None)]
#[case(DataType::Symbol, DataType::String, None)]
fn test_conversion_cost(#[case] from: DataType, #[case] to: DataType, #[case] expected: Option<u32>) {
    assert_eq!(TypeCoercer::new().conversion_cost(from, to), expected);
}

#[rstest]
#[case(DataType::Member, DataType::Tuple, ConversionKind::MemberToTuple)]
#[case(DataType::Dimension, DataType::Member, ConversionKind::CurrentMember)]
#[case(DataType::Tuple, DataType::Value, ConversionKind::CellValue)]
#[case(DataType::Numeric, DataType::Value, ConversionKind::ScalarToValue)]
#[case(DataType::Value, DataType::Logical, ConversionKind::ValueToScalar)]
#[case(DataType::Set, DataType::Tuple, ConversionKind::NotConvertible)]
fn test_conversion_kind(#[case] from: DataType, #[case] to: DataType, #[case] kind: ConversionKind) {
    assert_eq!(TypeCoercer::new().categorize_conversion(from, to), kind);
}

#[test]
fn test_conversions_are_positive_unless_identity() {
    let coercer = TypeCoercer::new();
    for from in DataType::ALL {
        for to in DataType::ALL {
            if let Some(cost) = coercer.conversion_cost(from, to) {
                assert_eq!(cost == 0, from == to, "{} -> {}", from, to);
            }
        }
    }
}
