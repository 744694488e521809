//! Runtime values produced by calc nodes
//!
//! Every calc evaluates to a `Value`. The typed accessors on `Calc` use the
//! conversions here, which fail with `CalcError::TypeConversion` naming the
//! runtime kind of the value and the requested target.

use crate::error::{CalcError, CalcResult};
use crate::tuple::{TupleIterable, TupleList};
use mdxcalc_model::{DimensionRef, HierarchyRef, LevelRef, MemberRef};
use std::fmt;
use std::sync::Arc;

/// The result of evaluating a calc
#[derive(Debug, Clone)]
pub enum Value {
    /// Empty cell or missing value
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(Arc<str>),
    /// A reserved word argument
    Symbol(Arc<str>),
    Member(MemberRef),
    Tuple(Vec<MemberRef>),
    /// A materialized set
    List(Arc<TupleList>),
    /// A lazily produced set
    Iterable(Arc<dyn TupleIterable>),
    Level(LevelRef),
    Hierarchy(HierarchyRef),
    Dimension(DimensionRef),
}

impl Value {
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::String(s.into())
    }

    pub fn list(list: TupleList) -> Self {
        Self::List(Arc::new(list))
    }

    /// The runtime kind, used in conversion errors
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Member(_) => "member",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::Iterable(_) => "iterable",
            Self::Level(_) => "level",
            Self::Hierarchy(_) => "hierarchy",
            Self::Dimension(_) => "dimension",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn mismatch(&self, to: &str) -> CalcError {
        CalcError::type_conversion(self.kind(), to)
    }

    /// Truth value; null is false, numbers are true when non-zero
    pub fn to_bool(&self) -> CalcResult<bool> {
        match self {
            Self::Null => Ok(false),
            Self::Bool(b) => Ok(*b),
            Self::Int(i) => Ok(*i != 0),
            Self::Double(d) => Ok(*d != 0.0),
            other => Err(other.mismatch("boolean")),
        }
    }

    /// Integer value; doubles are truncated, null stays null
    pub fn to_integer(&self) -> CalcResult<Option<i64>> {
        match self {
            Self::Null => Ok(None),
            Self::Int(i) => Ok(Some(*i)),
            Self::Double(d) => Ok(Some(d.trunc() as i64)),
            Self::Bool(b) => Ok(Some(i64::from(*b))),
            other => Err(other.mismatch("integer")),
        }
    }

    /// Numeric value; null stays null
    pub fn to_double(&self) -> CalcResult<Option<f64>> {
        match self {
            Self::Null => Ok(None),
            Self::Double(d) => Ok(Some(*d)),
            Self::Int(i) => Ok(Some(*i as f64)),
            Self::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
            other => Err(other.mismatch("double")),
        }
    }

    /// String value; numbers are formatted, null stays null
    pub fn to_string_value(&self) -> CalcResult<Option<Arc<str>>> {
        match self {
            Self::Null => Ok(None),
            Self::String(s) => Ok(Some(s.clone())),
            Self::Int(i) => Ok(Some(i.to_string().into())),
            Self::Double(d) => Ok(Some(d.to_string().into())),
            Self::Bool(b) => Ok(Some(b.to_string().into())),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn into_member(self) -> CalcResult<MemberRef> {
        match self {
            Self::Member(m) => Ok(m),
            Self::Tuple(mut t) if t.len() == 1 => t.pop().ok_or_else(|| self_kind_error("member")),
            other => Err(other.mismatch("member")),
        }
    }

    /// Tuple value; a member is a one-member tuple
    pub fn into_tuple(self) -> CalcResult<Vec<MemberRef>> {
        match self {
            Self::Tuple(t) => Ok(t),
            Self::Member(m) => Ok(vec![m]),
            other => Err(other.mismatch("tuple")),
        }
    }

    /// A set value, viewed as an iterable
    pub fn into_iterable(self) -> CalcResult<Arc<dyn TupleIterable>> {
        match self {
            Self::Iterable(it) => Ok(it),
            Self::List(list) => Ok(list),
            other => Err(other.mismatch("iterable")),
        }
    }

    pub fn into_level(self) -> CalcResult<LevelRef> {
        match self {
            Self::Level(l) => Ok(l),
            other => Err(other.mismatch("level")),
        }
    }

    pub fn into_hierarchy(self) -> CalcResult<HierarchyRef> {
        match self {
            Self::Hierarchy(h) => Ok(h),
            other => Err(other.mismatch("hierarchy")),
        }
    }

    pub fn into_dimension(self) -> CalcResult<DimensionRef> {
        match self {
            Self::Dimension(d) => Ok(d),
            other => Err(other.mismatch("dimension")),
        }
    }

    pub fn into_symbol(self) -> CalcResult<Arc<str>> {
        match self {
            Self::Symbol(s) => Ok(s),
            other => Err(other.mismatch("symbol")),
        }
    }
}

fn self_kind_error(to: &str) -> CalcError {
    CalcError::type_conversion("tuple", to)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<Option<f64>> for Value {
    fn from(d: Option<f64>) -> Self {
        d.map_or(Self::Null, Self::Double)
    }
}

impl From<MemberRef> for Value {
    fn from(m: MemberRef) -> Self {
        Self::Member(m)
    }
}

impl From<TupleList> for Value {
    fn from(list: TupleList) -> Self {
        Self::list(list)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Int(a), Self::Double(b)) | (Self::Double(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::String(a), Self::String(b)) | (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Member(a), Self::Member(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::List(a), Self::List(b)) => a.iter().eq(b.iter()),
            (Self::Iterable(a), Self::Iterable(b)) => Arc::ptr_eq(a, b),
            (Self::Level(a), Self::Level(b)) => a == b,
            (Self::Hierarchy(a), Self::Hierarchy(b)) => a == b,
            (Self::Dimension(a), Self::Dimension(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Double(d) => write!(f, "{}", d),
            Self::String(s) | Self::Symbol(s) => f.write_str(s),
            Self::Member(m) => write!(f, "{}", m),
            Self::Tuple(t) => write_tuple(f, t),
            Self::List(list) => {
                f.write_str("{")?;
                for (i, t) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_tuple(f, t)?;
                }
                f.write_str("}")
            }
            Self::Iterable(it) => write!(f, "<iterable of arity {}>", it.arity()),
            Self::Level(l) => write!(f, "{}", l),
            Self::Hierarchy(h) => write!(f, "{}", h),
            Self::Dimension(d) => write!(f, "{}", d),
        }
    }
}

fn write_tuple(f: &mut fmt::Formatter<'_>, tuple: &[MemberRef]) -> fmt::Result {
    if let [single] = tuple {
        return write!(f, "{}", single);
    }
    f.write_str("(")?;
    for (i, m) in tuple.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", m)?;
    }
    f.write_str(")")
}
