//! Calc node implementations shared by the compiler and built-in functions

use crate::calc::{Calc, CalcBase, CalcRef, DependencyRule, ResultStyle, dependent_hierarchies};
use crate::error::{CalcError, CalcResult};
use crate::evaluator::{CacheKey, Evaluator};
use crate::value::Value;
use mdxcalc_model::{Cube, DimensionRef, HierarchyRef, LevelRef, MemberRef};
use mdxcalc_types::{MemberScope, Type};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A literal or catalog object fixed at compile time
#[derive(Debug)]
pub struct ConstantCalc {
    base: CalcBase,
    value: Value,
}

impl ConstantCalc {
    pub fn new(value: Value, ty: Type) -> Self {
        let style = match &value {
            Value::Null => ResultStyle::Value,
            Value::List(_) => ResultStyle::List,
            Value::Iterable(_) => ResultStyle::Iterable,
            _ => ResultStyle::ValueNotNull,
        };
        Self {
            base: CalcBase::new("Literal", ty, Vec::new())
                .with_style(style)
                .with_rule(DependencyRule::Never),
            value,
        }
    }

    pub fn null() -> Self {
        Self::new(Value::Null, Type::Null)
    }

    pub fn double(d: f64) -> Self {
        Self::new(Value::Double(d), Type::Numeric)
    }

    pub fn integer(i: i64) -> Self {
        Self::new(Value::Int(i), Type::Integer)
    }

    pub fn boolean(b: bool) -> Self {
        Self::new(Value::Bool(b), Type::Boolean)
    }

    pub fn string(s: &str) -> Self {
        Self::new(Value::string(s), Type::String)
    }

    pub fn symbol(s: &str) -> Self {
        Self::new(Value::Symbol(s.into()), Type::Symbol)
    }

    pub fn member(member: MemberRef) -> Self {
        let ty = Type::member(MemberScope::of_member(&member));
        Self::new(Value::Member(member), ty)
    }

    pub fn level(level: LevelRef) -> Self {
        let ty = Type::Level(MemberScope::of_level(&level));
        Self::new(Value::Level(level), ty)
    }

    pub fn hierarchy(hierarchy: HierarchyRef) -> Self {
        let ty = Type::Hierarchy(MemberScope::of_hierarchy(&hierarchy));
        Self::new(Value::Hierarchy(hierarchy), ty)
    }

    pub fn dimension(dimension: DimensionRef) -> Self {
        let ty = Type::Dimension(MemberScope::of_dimension(&dimension));
        Self::new(Value::Dimension(dimension), ty)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Calc for ConstantCalc {
    fn base(&self) -> &CalcBase {
        &self.base
    }

    fn compute(&self, _evaluator: &mut Evaluator) -> CalcResult<Value> {
        Ok(self.value.clone())
    }
}

/// A node whose behavior is a closure over its children.
///
/// Most built-in functions compile to one of these.
pub struct FnCalc<F> {
    base: CalcBase,
    f: F,
}

impl<F> FnCalc<F>
where
    F: Fn(&[CalcRef], &mut Evaluator) -> CalcResult<Value> + Send + Sync,
{
    pub fn new(base: CalcBase, f: F) -> Self {
        Self { base, f }
    }
}

impl<F> fmt::Debug for FnCalc<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCalc").field("base", &self.base).finish()
    }
}

impl<F> Calc for FnCalc<F>
where
    F: Fn(&[CalcRef], &mut Evaluator) -> CalcResult<Value> + Send + Sync,
{
    fn base(&self) -> &CalcBase {
        &self.base
    }

    fn compute(&self, evaluator: &mut Evaluator) -> CalcResult<Value> {
        (self.f)(self.base.children(), evaluator)
    }
}

/// The cell value with some members overridden
#[derive(Debug)]
pub struct MemberValueCalc {
    base: CalcBase,
}

impl MemberValueCalc {
    /// `members` each yield one member to place in the context
    pub fn new(members: Vec<CalcRef>) -> Self {
        Self {
            base: CalcBase::new("MemberValue", Type::Scalar, members)
                .with_rule(DependencyRule::ButDepends),
        }
    }
}

impl Calc for MemberValueCalc {
    fn base(&self) -> &CalcBase {
        &self.base
    }

    fn compute(&self, evaluator: &mut Evaluator) -> CalcResult<Value> {
        let members = self
            .base
            .children()
            .iter()
            .map(|c| c.evaluate_member(evaluator))
            .collect::<CalcResult<Vec<_>>>()?;
        let mut scope = evaluator.push();
        scope.set_context_tuple(&members);
        scope.evaluate_current()
    }
}

/// The cell value at a tuple
#[derive(Debug)]
pub struct TupleValueCalc {
    base: CalcBase,
}

impl TupleValueCalc {
    pub fn new(tuple: CalcRef) -> Self {
        Self {
            base: CalcBase::new("TupleValue", Type::Scalar, vec![tuple])
                .with_rule(DependencyRule::ButDepends),
        }
    }
}

impl Calc for TupleValueCalc {
    fn base(&self) -> &CalcBase {
        &self.base
    }

    fn compute(&self, evaluator: &mut Evaluator) -> CalcResult<Value> {
        let Some(tuple_calc) = self.base.children().first() else {
            return Err(CalcError::internal("tuple value without tuple"));
        };
        let tuple = tuple_calc.evaluate_tuple(evaluator)?;
        let mut scope = evaluator.push();
        scope.set_context_tuple(&tuple);
        scope.evaluate_current()
    }
}

/// The value of the current cell
#[derive(Debug)]
pub struct CurrentValueCalc {
    base: CalcBase,
}

impl CurrentValueCalc {
    pub fn new() -> Self {
        Self {
            base: CalcBase::new("CurrentValue", Type::Scalar, Vec::new())
                .with_rule(DependencyRule::Always),
        }
    }
}

impl Default for CurrentValueCalc {
    fn default() -> Self {
        Self::new()
    }
}

impl Calc for CurrentValueCalc {
    fn base(&self) -> &CalcBase {
        &self.base
    }

    fn compute(&self, evaluator: &mut Evaluator) -> CalcResult<Value> {
        evaluator.evaluate_current()
    }
}

/// The current member of the hierarchy its child yields
#[derive(Debug)]
pub struct CurrentMemberCalc {
    base: CalcBase,
}

impl CurrentMemberCalc {
    pub fn new(hierarchy: CalcRef) -> Self {
        let ty = match hierarchy.get_type() {
            Type::Hierarchy(scope) => Type::member(scope.clone()),
            _ => Type::any_member(),
        };
        Self {
            base: CalcBase::new("CurrentMember", ty, vec![hierarchy])
                .with_style(ResultStyle::ValueNotNull)
                .with_rule(DependencyRule::CurrentOf),
        }
    }
}

impl Calc for CurrentMemberCalc {
    fn base(&self) -> &CalcBase {
        &self.base
    }

    fn compute(&self, evaluator: &mut Evaluator) -> CalcResult<Value> {
        let Some(child) = self.base.children().first() else {
            return Err(CalcError::internal("current member without hierarchy"));
        };
        let hierarchy = child.evaluate_hierarchy(evaluator)?;
        Ok(Value::Member(evaluator.get_context(&hierarchy)?.clone()))
    }
}

/// Implicit conversions inserted by the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adapter {
    MemberToTuple,
    MemberToSet,
    TupleToSet,
    DimensionToHierarchy,
    LevelToHierarchy,
    /// Iterable to list
    Materialize,
    /// Immutable list to a copy the caller owns
    MutableCopy,
    IntegerToDouble,
}

impl Adapter {
    fn name(self) -> &'static str {
        match self {
            Self::MemberToTuple => "MemberToTuple",
            Self::MemberToSet => "MemberToSet",
            Self::TupleToSet => "TupleToSet",
            Self::DimensionToHierarchy => "DimensionHierarchy",
            Self::LevelToHierarchy => "LevelHierarchy",
            Self::Materialize => "IterableToList",
            Self::MutableCopy => "MutableList",
            Self::IntegerToDouble => "IntegerToDouble",
        }
    }
}

/// Wraps a child calc and converts its value
#[derive(Debug)]
pub struct ConvertCalc {
    base: CalcBase,
    adapter: Adapter,
}

impl ConvertCalc {
    pub fn new(adapter: Adapter, child: CalcRef, ty: Type) -> Self {
        let style = match adapter {
            Adapter::MemberToSet | Adapter::TupleToSet | Adapter::MutableCopy => {
                ResultStyle::MutableList
            }
            Adapter::Materialize => ResultStyle::List,
            _ => ResultStyle::Value,
        };
        Self {
            base: CalcBase::new(adapter.name(), ty, vec![child]).with_style(style),
            adapter,
        }
    }

    pub fn adapter(&self) -> Adapter {
        self.adapter
    }
}

impl Calc for ConvertCalc {
    fn base(&self) -> &CalcBase {
        &self.base
    }

    fn compute(&self, evaluator: &mut Evaluator) -> CalcResult<Value> {
        let Some(child) = self.base.children().first() else {
            return Err(CalcError::internal("conversion without operand"));
        };
        let collections = evaluator.collections();
        match self.adapter {
            Adapter::MemberToTuple => Ok(Value::Tuple(vec![child.evaluate_member(evaluator)?])),
            Adapter::MemberToSet => {
                let member = child.evaluate_member(evaluator)?;
                Ok(Value::list(collections.from_members(vec![member])?))
            }
            Adapter::TupleToSet => {
                let tuple = child.evaluate_tuple(evaluator)?;
                Ok(Value::list(collections.singleton(&tuple)?))
            }
            Adapter::DimensionToHierarchy => {
                let dimension = child.evaluate_dimension(evaluator)?;
                let hierarchy = dimension.single_hierarchy().cloned().ok_or_else(|| {
                    CalcError::invalid_argument(
                        "CurrentMember",
                        format!("dimension {} has more than one hierarchy", dimension),
                    )
                })?;
                Ok(Value::Hierarchy(hierarchy))
            }
            Adapter::LevelToHierarchy => {
                let level = child.evaluate_level(evaluator)?;
                let hierarchy = evaluator
                    .cube()
                    .hierarchy(level.hierarchy_unique_name())?
                    .clone();
                Ok(Value::Hierarchy(hierarchy))
            }
            Adapter::Materialize => match child.evaluate(evaluator)? {
                list @ Value::List(_) => Ok(list),
                other => {
                    let iterable = other.into_iterable()?;
                    Ok(Value::list(
                        collections.materialize(iterable.as_ref(), evaluator)?,
                    ))
                }
            },
            Adapter::MutableCopy => {
                let list = child.evaluate_list(evaluator)?;
                Ok(Value::list(Arc::unwrap_or_clone(list)))
            }
            Adapter::IntegerToDouble => Ok(child
                .evaluate_integer(evaluator)?
                .map_or(Value::Null, |i| Value::Double(i as f64))),
        }
    }
}

static NEXT_CACHE_SLOT: AtomicU64 = AtomicU64::new(1);

/// Identifies a cacheable subtree and the hierarchies its value depends on
#[derive(Debug, Clone)]
pub struct ExpCacheDescriptor {
    slot: u64,
    calc: CalcRef,
    ordinals: Vec<usize>,
}

impl ExpCacheDescriptor {
    pub fn new(calc: CalcRef, cube: &Cube) -> Self {
        let ordinals = dependent_hierarchies(calc.as_ref(), cube)
            .iter()
            .map(|h| h.ordinal())
            .collect();
        Self {
            slot: NEXT_CACHE_SLOT.fetch_add(1, Ordering::Relaxed),
            calc,
            ordinals,
        }
    }

    pub fn calc(&self) -> &CalcRef {
        &self.calc
    }

    /// Ordinals of the hierarchies the cached value depends on
    pub fn dependent_ordinals(&self) -> &[usize] {
        &self.ordinals
    }

    /// Cache key under the evaluator's current context. Set functions filter
    /// differently in non-empty mode, so the flag is part of the key.
    pub fn key(&self, evaluator: &Evaluator) -> CacheKey {
        let context = evaluator.current_members();
        let members = self
            .ordinals
            .iter()
            .filter_map(|&o| context.get(o).cloned())
            .collect();
        (self.slot, evaluator.is_non_empty(), members)
    }
}

/// Caches its child's value per combination of relevant current members
#[derive(Debug)]
pub struct CacheCalc {
    base: CalcBase,
    descriptor: ExpCacheDescriptor,
}

impl CacheCalc {
    pub fn new(descriptor: ExpCacheDescriptor) -> Self {
        let calc = descriptor.calc().clone();
        let style = calc.result_style();
        Self {
            base: CalcBase::new("Cache", calc.get_type().clone(), vec![calc]).with_style(style),
            descriptor,
        }
    }

    pub fn descriptor(&self) -> &ExpCacheDescriptor {
        &self.descriptor
    }
}

impl Calc for CacheCalc {
    fn base(&self) -> &CalcBase {
        &self.base
    }

    fn compute(&self, evaluator: &mut Evaluator) -> CalcResult<Value> {
        let key = self.descriptor.key(evaluator);
        if let Some(value) = evaluator.cached_value(&key) {
            log::trace!("cache hit for slot {}", key.0);
            return Ok(value.clone());
        }
        let value = self.descriptor.calc().evaluate(evaluator)?;
        evaluator.cache_value(key, value.clone());
        Ok(value)
    }
}

/// A query parameter, falling back to its default when not supplied
#[derive(Debug)]
pub struct ParameterCalc {
    base: CalcBase,
    parameter: String,
    default: Value,
}

impl ParameterCalc {
    pub fn new(name: impl Into<String>, ty: Type, default: Value) -> Self {
        Self {
            base: CalcBase::new("Parameter", ty, Vec::new()).with_rule(DependencyRule::Never),
            parameter: name.into(),
            default,
        }
    }
}

impl Calc for ParameterCalc {
    fn base(&self) -> &CalcBase {
        &self.base
    }

    fn compute(&self, evaluator: &mut Evaluator) -> CalcResult<Value> {
        Ok(evaluator
            .parameter(&self.parameter)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}
