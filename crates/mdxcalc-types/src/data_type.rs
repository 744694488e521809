//! Category tags for expression types
//!
//! A `DataType` is what a function signature declares for each parameter.
//! It is coarser than `Type`: it says "a member" but not of which hierarchy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of an expression's type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Any scalar value
    Value,
    /// Boolean
    Logical,
    /// Floating point number
    Numeric,
    /// Whole number, a narrower kind of numeric
    Integer,
    String,
    /// A reserved word such as `RECURSIVE` used as an argument
    Symbol,
    /// The null literal
    Null,
    Member,
    Tuple,
    Set,
    Level,
    Hierarchy,
    Dimension,
    /// No value; the result type of statements
    Empty,
}

impl DataType {
    /// All categories, in declaration order
    pub const ALL: [DataType; 14] = [
        DataType::Value,
        DataType::Logical,
        DataType::Numeric,
        DataType::Integer,
        DataType::String,
        DataType::Symbol,
        DataType::Null,
        DataType::Member,
        DataType::Tuple,
        DataType::Set,
        DataType::Level,
        DataType::Hierarchy,
        DataType::Dimension,
        DataType::Empty,
    ];

    /// Check if this is a scalar category
    pub const fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Value | Self::Logical | Self::Numeric | Self::Integer | Self::String | Self::Null
        )
    }

    /// Check if this is numeric (including integer)
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric | Self::Integer)
    }

    /// Check if this category is a dimensional object
    pub const fn is_dimensional(&self) -> bool {
        matches!(
            self,
            Self::Member | Self::Tuple | Self::Set | Self::Level | Self::Hierarchy | Self::Dimension
        )
    }

    /// Name used in signature descriptions, e.g. `<Numeric>`
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Value => "Value",
            Self::Logical => "Logical",
            Self::Numeric => "Numeric",
            Self::Integer => "Integer",
            Self::String => "String",
            Self::Symbol => "Symbol",
            Self::Null => "Null",
            Self::Member => "Member",
            Self::Tuple => "Tuple",
            Self::Set => "Set",
            Self::Level => "Level",
            Self::Hierarchy => "Hierarchy",
            Self::Dimension => "Dimension",
            Self::Empty => "Empty",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
