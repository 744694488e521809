//! Expression trees
//!
//! A parser (outside this crate) produces `Expression` trees whose function
//! applications are `Call` nodes. The validator replaces each `Call` with a
//! `Resolved` node bound to a function definition, wrapping arguments that
//! need an implicit conversion in `Coerce`. Only fully resolved trees can be
//! compiled.

use crate::resolve::{FunctionDefinition, Syntax};
use indexmap::IndexSet;
use mdxcalc_model::{Cube, DimensionRef, HierarchyRef, LevelRef, MemberRef};
use mdxcalc_types::{ConversionKind, MemberScope, Type};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// A literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Numeric(f64),
    Integer(i64),
    String(Arc<str>),
    Boolean(bool),
    Null,
    /// An unquoted word such as `RECURSIVE`
    Symbol(Arc<str>),
}

impl Literal {
    pub fn get_type(&self) -> Type {
        match self {
            Self::Numeric(_) => Type::Numeric,
            Self::Integer(_) => Type::Integer,
            Self::String(_) => Type::String,
            Self::Boolean(_) => Type::Boolean,
            Self::Null => Type::Null,
            Self::Symbol(_) => Type::Symbol,
        }
    }
}

/// A named query parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub default: Literal,
    pub description: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Type, default: Literal) -> Self {
        Self {
            name: name.into(),
            ty,
            default,
            description: None,
        }
    }
}

/// A function application not yet bound to a definition
#[derive(Debug, Clone)]
pub struct UnresolvedCall {
    pub name: String,
    pub syntax: Syntax,
    pub args: Vec<Expression>,
}

/// A function application bound to a definition
#[derive(Debug, Clone)]
pub struct ResolvedFunCall {
    pub def: Arc<dyn FunctionDefinition>,
    pub args: Vec<Expression>,
    pub ty: Type,
}

impl ResolvedFunCall {
    pub fn name(&self) -> &str {
        self.def.name()
    }

    pub fn arg(&self, index: usize) -> Option<&Expression> {
        self.args.get(index)
    }
}

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Literal),
    Member(MemberRef),
    Level(LevelRef),
    Hierarchy(HierarchyRef),
    Dimension(DimensionRef),
    Parameter(Arc<Parameter>),
    Call(UnresolvedCall),
    Resolved(ResolvedFunCall),
    /// An implicit conversion applied during resolution
    Coerce {
        expr: Box<Expression>,
        to: Type,
        kind: ConversionKind,
    },
}

impl Expression {
    pub fn numeric(value: f64) -> Self {
        Self::Literal(Literal::Numeric(value))
    }

    pub fn integer(value: i64) -> Self {
        Self::Literal(Literal::Integer(value))
    }

    pub fn string(value: &str) -> Self {
        Self::Literal(Literal::String(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Self::Literal(Literal::Boolean(value))
    }

    pub fn null() -> Self {
        Self::Literal(Literal::Null)
    }

    pub fn symbol(word: &str) -> Self {
        Self::Literal(Literal::Symbol(word.into()))
    }

    pub fn call(name: &str, syntax: Syntax, args: Vec<Expression>) -> Self {
        Self::Call(UnresolvedCall {
            name: name.to_string(),
            syntax,
            args,
        })
    }

    /// `Name(args)`
    pub fn function(name: &str, args: Vec<Expression>) -> Self {
        Self::call(name, Syntax::Function, args)
    }

    /// `object.Name`
    pub fn property(object: Expression, name: &str) -> Self {
        Self::call(name, Syntax::Property, vec![object])
    }

    /// `object.Name(args)`
    pub fn method(object: Expression, name: &str, args: Vec<Expression>) -> Self {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(object);
        all.extend(args);
        Self::call(name, Syntax::Method, all)
    }

    /// `left op right`
    pub fn infix(op: &str, left: Expression, right: Expression) -> Self {
        Self::call(op, Syntax::Infix, vec![left, right])
    }

    /// `op operand`
    pub fn prefix(op: &str, operand: Expression) -> Self {
        Self::call(op, Syntax::Prefix, vec![operand])
    }

    /// `{ args }`
    pub fn braces(args: Vec<Expression>) -> Self {
        Self::call("{}", Syntax::Braces, args)
    }

    /// `( args )`
    pub fn parens(args: Vec<Expression>) -> Self {
        Self::call("()", Syntax::Parentheses, args)
    }

    /// The static type; an unresolved call has type `Empty`
    pub fn get_type(&self) -> Type {
        match self {
            Self::Literal(l) => l.get_type(),
            Self::Member(m) => Type::member(MemberScope::of_member(m)),
            Self::Level(l) => Type::Level(MemberScope::of_level(l)),
            Self::Hierarchy(h) => Type::Hierarchy(MemberScope::of_hierarchy(h)),
            Self::Dimension(d) => Type::Dimension(MemberScope::of_dimension(d)),
            Self::Parameter(p) => p.ty.clone(),
            Self::Call(_) => Type::Empty,
            Self::Resolved(call) => call.ty.clone(),
            Self::Coerce { to, .. } => to.clone(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            Self::Call(_) => false,
            Self::Resolved(call) => call.args.iter().all(Self::is_resolved),
            Self::Coerce { expr, .. } => expr.is_resolved(),
            _ => true,
        }
    }

    /// The reserved word of a symbol literal
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Literal(Literal::Symbol(s)) => Some(s),
            _ => None,
        }
    }

    /// Function name of a call, resolved or not
    pub fn function_name(&self) -> Option<&str> {
        match self {
            Self::Call(call) => Some(&call.name),
            Self::Resolved(call) => Some(call.name()),
            _ => None,
        }
    }

    /// Arguments of a call, resolved or not
    pub fn args(&self) -> &[Expression] {
        match self {
            Self::Call(call) => &call.args,
            Self::Resolved(call) => &call.args,
            Self::Coerce { expr, .. } => std::slice::from_ref(expr.as_ref()),
            _ => &[],
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(Literal::Numeric(n)) => write!(f, "{}", n),
            Self::Literal(Literal::Integer(i)) => write!(f, "{}", i),
            Self::Literal(Literal::String(s)) => write!(f, "\"{}\"", s),
            Self::Literal(Literal::Boolean(b)) => write!(f, "{}", b),
            Self::Literal(Literal::Null) => f.write_str("NULL"),
            Self::Literal(Literal::Symbol(s)) => f.write_str(s),
            Self::Member(m) => write!(f, "{}", m),
            Self::Level(l) => write!(f, "{}", l),
            Self::Hierarchy(h) => write!(f, "{}", h),
            Self::Dimension(d) => write!(f, "{}", d),
            Self::Parameter(p) => write!(f, "Parameter(\"{}\")", p.name),
            Self::Call(UnresolvedCall { name, syntax, args }) => {
                write_call(f, name, *syntax, args)
            }
            Self::Resolved(call) => write_call(f, call.name(), call.def.syntax(), &call.args),
            Self::Coerce { expr, .. } => write!(f, "{}", expr),
        }
    }
}

fn write_call(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    syntax: Syntax,
    args: &[Expression],
) -> fmt::Result {
    let list = |args: &[Expression]| {
        args.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    match (syntax, args) {
        (Syntax::Infix, [l, r]) => write!(f, "({} {} {})", l, name, r),
        (Syntax::Prefix, [operand]) => write!(f, "{} {}", name, operand),
        (Syntax::Property, [object]) => write!(f, "{}.{}", object, name),
        (Syntax::Method, [object, rest @ ..]) => write!(f, "{}.{}({})", object, name, list(rest)),
        (Syntax::Braces, _) => write!(f, "{{{}}}", list(args)),
        (Syntax::Parentheses, _) => write!(f, "({})", list(args)),
        _ => write!(f, "{}({})", name, list(args)),
    }
}

/// Functions whose member arguments stand for other members of the same
/// hierarchy, so the member itself does not constrain the result
static ALL_MEMBER_FUNCTIONS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "ANCESTOR",
        "ANCESTORS",
        "ASCENDANTS",
        "CHILDREN",
        "CLOSINGPERIOD",
        "COUSIN",
        "DESCENDANTS",
        "DRILLDOWNMEMBER",
        "FIRSTCHILD",
        "FIRSTSIBLING",
        "LAG",
        "LASTCHILD",
        "LASTPERIODS",
        "LASTSIBLING",
        "LEAD",
        "NEXTMEMBER",
        "OPENINGPERIOD",
        "PARALLELPERIOD",
        "PARENT",
        "PERIODSTODATE",
        "PREVMEMBER",
        "SIBLINGS",
        "YTD",
        "QTD",
        "MTD",
        "WTD",
    ]
    .into_iter()
    .collect()
});

/// Whether member arguments of `function` map to their hierarchy's all member
pub fn maps_to_all_member(function: &str) -> bool {
    ALL_MEMBER_FUNCTIONS.contains(function.to_ascii_uppercase().as_str())
}

/// Members referenced by `expr`, in first-seen order without duplicates.
///
/// A member that appears under a navigation function such as `Parent` or
/// `Children` is replaced by the default member of its hierarchy (the all
/// member, when there is one), since the function reaches other members.
pub fn extract_members(expr: &Expression, cube: &Cube) -> Vec<MemberRef> {
    let mut found = IndexSet::new();
    collect_members(expr, cube, false, &mut found);
    found.into_iter().collect()
}

fn collect_members(
    expr: &Expression,
    cube: &Cube,
    map_to_all: bool,
    found: &mut IndexSet<MemberRef>,
) {
    match expr {
        Expression::Member(m) => {
            if map_to_all {
                found.insert(cube.hierarchy_of(m).default_member().clone());
            } else {
                found.insert(m.clone());
            }
        }
        Expression::Call(_) | Expression::Resolved(_) => {
            let map_args = map_to_all || expr.function_name().is_some_and(maps_to_all_member);
            for arg in expr.args() {
                collect_members(arg, cube, map_args, found);
            }
        }
        Expression::Coerce { expr, .. } => collect_members(expr, cube, map_to_all, found),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_cube;
    use pretty_assertions::assert_eq;

    fn member(cube: &Cube, name: &str) -> Expression {
        Expression::Member(cube.lookup_member(name).unwrap().clone())
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(Expression::numeric(1.5).get_type(), Type::Numeric);
        assert_eq!(Expression::integer(2).get_type(), Type::Integer);
        assert_eq!(Expression::symbol("ASC").get_type(), Type::Symbol);
        assert_eq!(Expression::null().get_type(), Type::Null);
    }

    #[test]
    fn test_member_type_knows_hierarchy() {
        let cube = sample_cube();
        let ty = member(&cube, "[Time].[1997]").get_type();
        assert_eq!(ty.hierarchy(), Some("[Time]"));
        assert_eq!(ty.to_string(), "Member<[Time]>");
    }

    #[test]
    fn test_display() {
        let cube = sample_cube();
        let expr = Expression::infix(
            "+",
            Expression::property(member(&cube, "[Time].[1997]"), "Parent"),
            Expression::numeric(1.0),
        );
        assert_eq!(expr.to_string(), "([Time].[1997].Parent + 1)");
        assert!(!expr.is_resolved());
    }

    #[test]
    fn test_extract_members() {
        let cube = sample_cube();
        let expr = Expression::braces(vec![
            member(&cube, "[Store].[USA].[CA]"),
            Expression::property(member(&cube, "[Time].[1997].[Q1]"), "parent"),
            member(&cube, "[Store].[USA].[CA]"),
        ]);
        let names: Vec<String> = extract_members(&expr, &cube)
            .iter()
            .map(|m| m.unique_name().to_string())
            .collect();
        assert_eq!(names, vec!["[Store].[USA].[CA]", "[Time].[All Times]"]);
    }
}
