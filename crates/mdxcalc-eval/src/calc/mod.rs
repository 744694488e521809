//! Compiled calculation trees
//!
//! A `Calc` is an immutable node produced by the compiler. It is created
//! once and evaluated many times, possibly from several threads, each with
//! its own `Evaluator`. The only state a node mutates while evaluating is
//! its `Profiler`.
//!
//! Every node embeds a `CalcBase` carrying its name, result type, result
//! style, children, dependency rule and profiler. Implementors provide
//! `compute`; `evaluate` wraps it with depth tracking and profiling, and the
//! typed accessors convert the resulting `Value`.

mod dependency;
mod nodes;
mod profile;

pub use dependency::{
    DependencyRule, any_depends, any_depends_but_first, but_depends, dependent_hierarchies,
};
pub use nodes::{
    Adapter, CacheCalc, ConstantCalc, ConvertCalc, CurrentMemberCalc, CurrentValueCalc,
    ExpCacheDescriptor, FnCalc, MemberValueCalc, ParameterCalc, TupleValueCalc,
};
pub use profile::{CalculationProfile, Profiler};

use crate::error::{CalcError, CalcResult};
use crate::evaluator::Evaluator;
use crate::tuple::{TupleIterable, TupleList};
use crate::value::Value;
use mdxcalc_model::{DimensionRef, Hierarchy, HierarchyRef, LevelRef, MemberRef};
use mdxcalc_types::Type;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a compiled node
pub type CalcRef = Arc<dyn Calc>;

/// The shape of value a calc produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultStyle {
    /// A scalar or dimensional value that may be null
    Value,
    /// A value that is never null
    ValueNotNull,
    /// A materialized list the caller must not modify
    List,
    /// A materialized list the caller may modify
    MutableList,
    /// A lazily produced set
    Iterable,
    /// Whatever is cheapest
    Any,
}

impl ResultStyle {
    pub fn is_set(self) -> bool {
        matches!(self, Self::List | Self::MutableList | Self::Iterable)
    }
}

impl fmt::Display for ResultStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Value => "VALUE",
            Self::ValueNotNull => "VALUE_NOT_NULL",
            Self::List => "LIST",
            Self::MutableList => "MUTABLE_LIST",
            Self::Iterable => "ITERABLE",
            Self::Any => "ANY",
        };
        f.write_str(name)
    }
}

/// State common to every calc node
#[derive(Debug)]
pub struct CalcBase {
    name: Cow<'static, str>,
    ty: Type,
    style: ResultStyle,
    children: Vec<CalcRef>,
    rule: DependencyRule,
    profiler: Profiler,
}

impl CalcBase {
    pub fn new(name: impl Into<Cow<'static, str>>, ty: Type, children: Vec<CalcRef>) -> Self {
        let style = if ty.is_set() {
            ResultStyle::List
        } else {
            ResultStyle::Value
        };
        Self {
            name: name.into(),
            ty,
            style,
            children,
            rule: DependencyRule::AnyChild,
            profiler: Profiler::new(),
        }
    }

    pub fn with_style(mut self, style: ResultStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_rule(mut self, rule: DependencyRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn style(&self) -> ResultStyle {
        self.style
    }

    pub fn children(&self) -> &[CalcRef] {
        &self.children
    }

    pub fn rule(&self) -> DependencyRule {
        self.rule
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }
}

/// A compiled expression node
pub trait Calc: fmt::Debug + Send + Sync {
    fn base(&self) -> &CalcBase;

    /// Produce this node's value; called through `evaluate`
    fn compute(&self, evaluator: &mut Evaluator) -> CalcResult<Value>;

    /// Evaluate this node in the evaluator's current context
    fn evaluate(&self, evaluator: &mut Evaluator) -> CalcResult<Value> {
        evaluator.enter_calc()?;
        let result = if evaluator.config().profiling {
            self.base().profiler().record(|| self.compute(evaluator))
        } else {
            self.compute(evaluator)
        };
        evaluator.leave_calc();
        result
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn get_type(&self) -> &Type {
        self.base().ty()
    }

    fn result_style(&self) -> ResultStyle {
        self.base().style()
    }

    fn children(&self) -> &[CalcRef] {
        self.base().children()
    }

    /// Whether the result may change with the current member of `hierarchy`
    fn depends_on(&self, hierarchy: &Hierarchy) -> bool {
        self.base().rule().depends(self.children(), hierarchy)
    }

    /// Profiling counters of this node and its descendants
    fn calculation_profile(&self) -> CalculationProfile {
        let children = self
            .children()
            .iter()
            .map(|c| c.calculation_profile())
            .collect();
        self.base().profiler().snapshot(
            self.name(),
            self.get_type().to_string(),
            self.result_style(),
            children,
        )
    }

    /// Boolean result; null is false
    fn evaluate_boolean(&self, evaluator: &mut Evaluator) -> CalcResult<bool> {
        self.evaluate(evaluator)?.to_bool()
    }

    fn evaluate_integer(&self, evaluator: &mut Evaluator) -> CalcResult<Option<i64>> {
        self.evaluate(evaluator)?.to_integer()
    }

    fn evaluate_double(&self, evaluator: &mut Evaluator) -> CalcResult<Option<f64>> {
        self.evaluate(evaluator)?.to_double()
    }

    fn evaluate_string(&self, evaluator: &mut Evaluator) -> CalcResult<Option<Arc<str>>> {
        self.evaluate(evaluator)?.to_string_value()
    }

    fn evaluate_member(&self, evaluator: &mut Evaluator) -> CalcResult<MemberRef> {
        self.evaluate(evaluator)?.into_member()
    }

    fn evaluate_tuple(&self, evaluator: &mut Evaluator) -> CalcResult<Vec<MemberRef>> {
        self.evaluate(evaluator)?.into_tuple()
    }

    fn evaluate_list(&self, evaluator: &mut Evaluator) -> CalcResult<Arc<TupleList>> {
        match self.evaluate(evaluator)? {
            Value::List(list) => Ok(list),
            other => Err(CalcError::type_conversion(other.kind(), "list")),
        }
    }

    fn evaluate_iterable(&self, evaluator: &mut Evaluator) -> CalcResult<Arc<dyn TupleIterable>> {
        self.evaluate(evaluator)?.into_iterable()
    }

    fn evaluate_level(&self, evaluator: &mut Evaluator) -> CalcResult<LevelRef> {
        self.evaluate(evaluator)?.into_level()
    }

    fn evaluate_hierarchy(&self, evaluator: &mut Evaluator) -> CalcResult<HierarchyRef> {
        self.evaluate(evaluator)?.into_hierarchy()
    }

    fn evaluate_dimension(&self, evaluator: &mut Evaluator) -> CalcResult<DimensionRef> {
        self.evaluate(evaluator)?.into_dimension()
    }
}
