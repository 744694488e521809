//! mdxcalc type system
//!
//! This crate defines the types the calculation engine reasons about:
//! - `DataType` category tags used in function signatures
//! - `Type`, the rich compile-time type of an expression, which also knows
//!   which hierarchies it is bound to
//! - `TypeCoercer`, the implicit conversion rules and their costs

pub mod coercion;
pub mod data_type;
pub mod type_system;

pub use coercion::{CoercionError, CoercionResult, ConversionKind, TypeCoercer};
pub use data_type::DataType;
pub use type_system::{MemberScope, Type};
