//! Compile-time types of expressions
//!
//! Dimensional types carry a `MemberScope` saying what is statically known
//! about where their members come from. A member of `[Time]` knows its
//! hierarchy; the result of `CurrentMember` over an unknown hierarchy
//! does not. Dependency analysis uses this to decide whether a type
//! definitely (or possibly) uses a hierarchy.

use crate::DataType;
use mdxcalc_model::{Dimension, Hierarchy, Level, Member};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// What is statically known about the origin of a dimensional value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberScope {
    /// Unique name of the dimension, if known
    pub dimension: Option<String>,
    /// Unique name of the hierarchy, if known
    pub hierarchy: Option<String>,
}

impl MemberScope {
    /// Nothing is known
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn of_hierarchy(hierarchy: &Hierarchy) -> Self {
        Self {
            dimension: Some(hierarchy.dimension_unique_name().to_string()),
            hierarchy: Some(hierarchy.unique_name().to_string()),
        }
    }

    pub fn of_dimension(dimension: &Dimension) -> Self {
        Self {
            dimension: Some(dimension.unique_name().to_string()),
            hierarchy: dimension
                .single_hierarchy()
                .map(|h| h.unique_name().to_string()),
        }
    }

    pub fn of_level(level: &Level) -> Self {
        let hierarchy = level.hierarchy_unique_name();
        Self {
            dimension: Some(dimension_prefix(hierarchy).to_string()),
            hierarchy: Some(hierarchy.to_string()),
        }
    }

    pub fn of_member(member: &Member) -> Self {
        Self::of_level(member.level())
    }

    /// Whether a value with this scope uses `hierarchy`.
    ///
    /// With `definitely`, only a scope known to be `hierarchy` answers true;
    /// otherwise any scope that could be `hierarchy` does.
    pub fn uses_hierarchy(&self, hierarchy: &Hierarchy, definitely: bool) -> bool {
        match (&self.hierarchy, &self.dimension) {
            (Some(h), _) => h == hierarchy.unique_name(),
            (None, Some(d)) => !definitely && d == hierarchy.dimension_unique_name(),
            (None, None) => !definitely,
        }
    }
}

/// `[Time].[Fiscal]` -> `[Time]`
fn dimension_prefix(hierarchy_unique_name: &str) -> &str {
    match hierarchy_unique_name.find("].[") {
        Some(pos) => &hierarchy_unique_name[..=pos],
        None => hierarchy_unique_name,
    }
}

/// The compile-time type of an expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "scope")]
pub enum Type {
    /// Any scalar
    Scalar,
    Boolean,
    Numeric,
    Integer,
    String,
    Symbol,
    Null,
    Member(MemberScope),
    Tuple(SmallVec<[MemberScope; 4]>),
    /// A set whose elements have the boxed type (a member or tuple type)
    Set(Box<Type>),
    Level(MemberScope),
    Hierarchy(MemberScope),
    Dimension(MemberScope),
    Empty,
}

impl Type {
    // === Constructors ===

    pub fn member(scope: MemberScope) -> Self {
        Self::Member(scope)
    }

    /// A member of a hierarchy not known at compile time
    pub fn any_member() -> Self {
        Self::Member(MemberScope::unknown())
    }

    pub fn member_of(hierarchy: &Hierarchy) -> Self {
        Self::Member(MemberScope::of_hierarchy(hierarchy))
    }

    pub fn tuple(scopes: impl IntoIterator<Item = MemberScope>) -> Self {
        Self::Tuple(scopes.into_iter().collect())
    }

    /// A set of the given element type
    pub fn set(element: Type) -> Self {
        Self::Set(Box::new(element))
    }

    /// A set of members of `hierarchy`
    pub fn set_of(hierarchy: &Hierarchy) -> Self {
        Self::set(Self::member_of(hierarchy))
    }

    /// Build a type from a category, with nothing known about scope
    pub fn from_data_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Value => Self::Scalar,
            DataType::Logical => Self::Boolean,
            DataType::Numeric => Self::Numeric,
            DataType::Integer => Self::Integer,
            DataType::String => Self::String,
            DataType::Symbol => Self::Symbol,
            DataType::Null => Self::Null,
            DataType::Member => Self::any_member(),
            DataType::Tuple => Self::Tuple(SmallVec::new()),
            DataType::Set => Self::set(Self::any_member()),
            DataType::Level => Self::Level(MemberScope::unknown()),
            DataType::Hierarchy => Self::Hierarchy(MemberScope::unknown()),
            DataType::Dimension => Self::Dimension(MemberScope::unknown()),
            DataType::Empty => Self::Empty,
        }
    }

    // === Properties ===

    /// The category of this type
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Scalar => DataType::Value,
            Self::Boolean => DataType::Logical,
            Self::Numeric => DataType::Numeric,
            Self::Integer => DataType::Integer,
            Self::String => DataType::String,
            Self::Symbol => DataType::Symbol,
            Self::Null => DataType::Null,
            Self::Member(_) => DataType::Member,
            Self::Tuple(_) => DataType::Tuple,
            Self::Set(_) => DataType::Set,
            Self::Level(_) => DataType::Level,
            Self::Hierarchy(_) => DataType::Hierarchy,
            Self::Dimension(_) => DataType::Dimension,
            Self::Empty => DataType::Empty,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.data_type().is_scalar()
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// Element type of a set
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Self::Set(element) => Some(element),
            _ => None,
        }
    }

    /// Number of hierarchies in a member, tuple or set type; 0 for others
    pub fn arity(&self) -> usize {
        match self {
            Self::Member(_) => 1,
            Self::Tuple(scopes) => scopes.len(),
            Self::Set(element) => element.arity(),
            _ => 0,
        }
    }

    /// The scopes of each column of a member, tuple or set type
    pub fn scopes(&self) -> SmallVec<[MemberScope; 4]> {
        match self {
            Self::Member(scope) => SmallVec::from_elem(scope.clone(), 1),
            Self::Tuple(scopes) => scopes.clone(),
            Self::Set(element) => element.scopes(),
            _ => SmallVec::new(),
        }
    }

    /// The single hierarchy this type is bound to, if statically known
    pub fn hierarchy(&self) -> Option<&str> {
        match self {
            Self::Member(s) | Self::Level(s) | Self::Hierarchy(s) | Self::Dimension(s) => {
                s.hierarchy.as_deref()
            }
            Self::Set(element) => element.hierarchy(),
            _ => None,
        }
    }

    /// Whether values of this type are bound to `hierarchy`.
    ///
    /// Scalars never use a hierarchy. With `definitely` false, a dimensional
    /// type whose hierarchy is unknown is assumed to use every hierarchy.
    pub fn uses_hierarchy(&self, hierarchy: &Hierarchy, definitely: bool) -> bool {
        match self {
            Self::Member(s) | Self::Level(s) | Self::Hierarchy(s) | Self::Dimension(s) => {
                s.uses_hierarchy(hierarchy, definitely)
            }
            Self::Tuple(scopes) => {
                if scopes.is_empty() {
                    !definitely
                } else {
                    scopes.iter().any(|s| s.uses_hierarchy(hierarchy, definitely))
                }
            }
            Self::Set(element) => element.uses_hierarchy(hierarchy, definitely),
            _ => false,
        }
    }

    /// Combine two types into one both can be viewed as.
    ///
    /// Used for the result of `IIf` and set constructors whose operands
    /// have different but compatible types.
    pub fn common(&self, other: &Type) -> Option<Type> {
        if self == other {
            return Some(self.clone());
        }
        match (self, other) {
            (Self::Null, t) | (t, Self::Null) if t.is_scalar() => Some(t.clone()),
            (Self::Integer, Self::Numeric) | (Self::Numeric, Self::Integer) => Some(Self::Numeric),
            (a, b) if a.is_scalar() && b.is_scalar() => Some(Self::Scalar),
            (Self::Member(a), Self::Member(b)) => Some(Self::Member(common_scope(a, b))),
            (Self::Tuple(a), Self::Tuple(b)) if a.len() == b.len() => Some(Self::Tuple(
                a.iter().zip(b.iter()).map(|(x, y)| common_scope(x, y)).collect(),
            )),
            (Self::Set(a), Self::Set(b)) => a.common(b).map(Self::set),
            _ => None,
        }
    }
}

fn common_scope(a: &MemberScope, b: &MemberScope) -> MemberScope {
    MemberScope {
        dimension: if a.dimension == b.dimension { a.dimension.clone() } else { None },
        hierarchy: if a.hierarchy == b.hierarchy { a.hierarchy.clone() } else { None },
    }
}

impl fmt::Display for MemberScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.hierarchy, &self.dimension) {
            (Some(h), _) => f.write_str(h),
            (None, Some(d)) => f.write_str(d),
            (None, None) => f.write_str("?"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(s) => write!(f, "Member<{}>", s),
            Self::Level(s) => write!(f, "Level<{}>", s),
            Self::Hierarchy(s) => write!(f, "Hierarchy<{}>", s),
            Self::Dimension(s) => write!(f, "Dimension<{}>", s),
            Self::Tuple(scopes) => {
                f.write_str("Tuple<")?;
                for (i, s) in scopes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", s)?;
                }
                f.write_str(">")
            }
            Self::Set(element) => write!(f, "Set<{}>", element),
            other => f.write_str(other.data_type().name()),
        }
    }
}

impl Default for Type {
    fn default() -> Self {
        Self::Scalar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdxcalc_model::{Cube, CubeBuilder, DimensionType};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn cube() -> Arc<Cube> {
        let mut b = CubeBuilder::new("Sales");
        b.dimension("Time", DimensionType::Time);
        b.hierarchy("Time", None, true, &["Year"]).unwrap();
        b.hierarchy("Time", Some("Fiscal"), true, &["Year"]).unwrap();
        b.member("[Time]", None, "1997").unwrap();
        b.member("[Time].[Fiscal]", None, "FY1997").unwrap();
        b.dimension("Store", DimensionType::Standard);
        b.hierarchy("Store", None, true, &["Country"]).unwrap();
        b.member("[Store]", None, "USA").unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_uses_hierarchy_known_scope() {
        let cube = cube();
        let time = cube.hierarchy("[Time]").unwrap();
        let store = cube.hierarchy("[Store]").unwrap();

        let ty = Type::member_of(time);
        assert!(ty.uses_hierarchy(time, true));
        assert!(!ty.uses_hierarchy(store, false));
    }

    #[test]
    fn test_uses_hierarchy_unknown_scope() {
        let cube = cube();
        let time = cube.hierarchy("[Time]").unwrap();
        let ty = Type::any_member();
        assert!(ty.uses_hierarchy(time, false));
        assert!(!ty.uses_hierarchy(time, true));
    }

    #[test]
    fn test_dimension_scope_is_not_definite() {
        let cube = cube();
        let time_dim = cube.dimension("Time").unwrap();
        let fiscal = cube.hierarchy("[Time].[Fiscal]").unwrap();
        let store = cube.hierarchy("[Store]").unwrap();

        let ty = Type::Dimension(MemberScope::of_dimension(time_dim));
        assert!(ty.uses_hierarchy(fiscal, false));
        assert!(!ty.uses_hierarchy(fiscal, true));
        assert!(!ty.uses_hierarchy(store, false));
    }

    #[test]
    fn test_scalars_use_nothing() {
        let cube = cube();
        let time = cube.hierarchy("[Time]").unwrap();
        assert!(!Type::Numeric.uses_hierarchy(time, false));
        assert!(!Type::Boolean.uses_hierarchy(time, false));
    }

    #[test]
    fn test_level_scope_dimension_prefix() {
        let cube = cube();
        let fiscal = cube.hierarchy("[Time].[Fiscal]").unwrap();
        let scope = MemberScope::of_level(&fiscal.levels()[0]);
        assert_eq!(scope.dimension.as_deref(), Some("[Time]"));
        assert_eq!(scope.hierarchy.as_deref(), Some("[Time].[Fiscal]"));
    }

    #[test]
    fn test_tuple_and_set_types() {
        let cube = cube();
        let time = cube.hierarchy("[Time]").unwrap();
        let store = cube.hierarchy("[Store]").unwrap();
        let tuple = Type::tuple([MemberScope::of_hierarchy(time), MemberScope::of_hierarchy(store)]);
        let set = Type::set(tuple.clone());

        assert_eq!(set.arity(), 2);
        assert_eq!(set.element_type(), Some(&tuple));
        assert!(set.uses_hierarchy(store, true));
        assert_eq!(set.to_string(), "Set<Tuple<[Time], [Store]>>");
    }

    #[test]
    fn test_common_type() {
        assert_eq!(Type::Integer.common(&Type::Numeric), Some(Type::Numeric));
        assert_eq!(Type::Null.common(&Type::String), Some(Type::String));
        assert_eq!(Type::String.common(&Type::Numeric), Some(Type::Scalar));
        assert_eq!(Type::Numeric.common(&Type::any_member()), None);
    }
}
