//! Expression compiler
//!
//! Turns a resolved expression tree into a calc tree. Each function
//! definition compiles its own call, asking the compiler for its arguments
//! in the shape it needs (`compile_double`, `compile_list`, ...). The typed
//! entry points insert adapters where the argument has another shape: a
//! hierarchy becomes its current member, a member becomes its cell value or
//! a one-element set, an iterable is materialized into a list.

use crate::calc::{
    Adapter, CalcBase, CalcRef, ConstantCalc, ConvertCalc, CurrentMemberCalc, FnCalc,
    MemberValueCalc, ParameterCalc, ResultStyle, TupleValueCalc,
};
use crate::config::EngineConfig;
use crate::error::{CalcError, CalcResult, ResolutionError};
use crate::expr::{Expression, Literal};
use crate::value::Value;
use mdxcalc_model::Cube;
use mdxcalc_types::{ConversionKind, DataType, MemberScope, Type};
use std::sync::Arc;

/// Result styles a caller accepts when nothing narrower is asked for
const ANY_STYLES: &[ResultStyle] = &[
    ResultStyle::Any,
    ResultStyle::Iterable,
    ResultStyle::List,
    ResultStyle::MutableList,
    ResultStyle::Value,
    ResultStyle::ValueNotNull,
];

#[derive(Debug, Clone)]
pub struct ExpCompiler {
    cube: Arc<Cube>,
    config: Arc<EngineConfig>,
    accepted: Vec<ResultStyle>,
}

impl ExpCompiler {
    pub fn new(cube: Arc<Cube>, config: Arc<EngineConfig>) -> Self {
        Self {
            cube,
            config,
            accepted: ANY_STYLES.to_vec(),
        }
    }

    pub fn cube(&self) -> &Arc<Cube> {
        &self.cube
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Result styles the current caller accepts, most preferred first
    pub fn accepted_result_styles(&self) -> &[ResultStyle] {
        &self.accepted
    }

    pub fn accepts(&self, style: ResultStyle) -> bool {
        self.accepted.contains(&style)
    }

    /// Whether a lazily produced set is acceptable here
    pub fn accepts_iterable(&self) -> bool {
        self.accepts(ResultStyle::Iterable) || self.accepts(ResultStyle::Any)
    }

    fn with_styles(&self, accepted: &[ResultStyle]) -> Self {
        Self {
            cube: self.cube.clone(),
            config: self.config.clone(),
            accepted: accepted.to_vec(),
        }
    }

    /// Compile with whatever result style the expression naturally has
    pub fn compile(&self, expr: &Expression) -> CalcResult<CalcRef> {
        match expr {
            Expression::Literal(literal) => Ok(Arc::new(compile_literal(literal))),
            Expression::Member(m) => Ok(Arc::new(ConstantCalc::member(m.clone()))),
            Expression::Level(l) => Ok(Arc::new(ConstantCalc::level(l.clone()))),
            Expression::Hierarchy(h) => Ok(Arc::new(ConstantCalc::hierarchy(h.clone()))),
            Expression::Dimension(d) => Ok(Arc::new(ConstantCalc::dimension(d.clone()))),
            Expression::Parameter(p) => Ok(Arc::new(ParameterCalc::new(
                p.name.clone(),
                p.ty.clone(),
                literal_value(&p.default),
            ))),
            Expression::Call(call) => Err(ResolutionError::UnresolvedCall {
                name: call.name.clone(),
            }
            .into()),
            Expression::Resolved(call) => call.def.compile_call(call, self),
            Expression::Coerce { expr, to, kind } => self.compile_coerce(expr, to, *kind),
        }
    }

    /// Compile so the result has one of the `accepted` styles
    pub fn compile_as(&self, expr: &Expression, accepted: &[ResultStyle]) -> CalcResult<CalcRef> {
        let calc = self.with_styles(accepted).compile(expr)?;
        let style = calc.result_style();
        if accepted.contains(&style) || accepted.contains(&ResultStyle::Any) {
            return Ok(calc);
        }
        let ty = calc.get_type().clone();
        match style {
            ResultStyle::Iterable if accepted.contains(&ResultStyle::List) => {
                Ok(Arc::new(ConvertCalc::new(Adapter::Materialize, calc, ty)))
            }
            ResultStyle::Iterable if accepted.contains(&ResultStyle::MutableList) => {
                let list: CalcRef = Arc::new(ConvertCalc::new(Adapter::Materialize, calc, ty.clone()));
                Ok(Arc::new(ConvertCalc::new(Adapter::MutableCopy, list, ty)))
            }
            ResultStyle::List if accepted.contains(&ResultStyle::MutableList) => {
                Ok(Arc::new(ConvertCalc::new(Adapter::MutableCopy, calc, ty)))
            }
            ResultStyle::ValueNotNull if accepted.contains(&ResultStyle::Value) => Ok(calc),
            ResultStyle::List | ResultStyle::MutableList
                if accepted.contains(&ResultStyle::Iterable) =>
            {
                Ok(calc)
            }
            _ => Err(CalcError::internal(format!(
                "{} produces {} but caller accepts {:?}",
                calc.name(),
                style,
                accepted
            ))),
        }
    }

    /// An implicit conversion inserted by the validator
    pub fn compile_coerce(
        &self,
        expr: &Expression,
        to: &Type,
        kind: ConversionKind,
    ) -> CalcResult<CalcRef> {
        match kind {
            ConversionKind::Identity | ConversionKind::ScalarToValue => self.compile(expr),
            ConversionKind::NumericPromotion => Ok(Arc::new(ConvertCalc::new(
                Adapter::IntegerToDouble,
                self.compile(expr)?,
                Type::Numeric,
            ))),
            ConversionKind::LogicalNumeric => {
                let inner = self.compile_scalar(expr)?;
                if to.data_type() == DataType::Logical {
                    Ok(boolean_of(inner))
                } else {
                    Ok(number_of(inner))
                }
            }
            ConversionKind::NullToScalar => Ok(Arc::new(ConstantCalc::new(Value::Null, to.clone()))),
            ConversionKind::ValueToScalar => {
                let inner = self.compile_scalar(expr)?;
                Ok(match to.data_type() {
                    DataType::Logical => boolean_of(inner),
                    DataType::Integer => integer_of(inner),
                    DataType::String => string_of(inner),
                    _ => number_of(inner),
                })
            }
            ConversionKind::CellValue => self.compile_scalar(expr),
            ConversionKind::MemberToTuple => self.compile_tuple(expr),
            ConversionKind::ToSet => self.compile_list(expr, false),
            ConversionKind::CurrentMember => self.compile_member(expr),
            ConversionKind::DimensionToHierarchy | ConversionKind::LevelToHierarchy => {
                self.compile_hierarchy(expr)
            }
            ConversionKind::NotConvertible => Err(ResolutionError::TypeMismatch {
                context: "implicit conversion".to_string(),
                expected: to.to_string(),
                found: expr.get_type().to_string(),
            }
            .into()),
        }
    }

    fn mismatch(&self, expr: &Expression, expected: &str) -> CalcError {
        ResolutionError::TypeMismatch {
            context: expr.to_string(),
            expected: expected.to_string(),
            found: expr.get_type().to_string(),
        }
        .into()
    }

    pub fn compile_member(&self, expr: &Expression) -> CalcResult<CalcRef> {
        match expr.get_type() {
            Type::Member(_) => self.compile(expr),
            Type::Hierarchy(_) | Type::Dimension(_) => {
                Ok(Arc::new(CurrentMemberCalc::new(self.compile_hierarchy(expr)?)))
            }
            Type::Tuple(scopes) if scopes.len() == 1 => self.compile(expr),
            _ => Err(self.mismatch(expr, "member")),
        }
    }

    pub fn compile_level(&self, expr: &Expression) -> CalcResult<CalcRef> {
        match expr.get_type() {
            Type::Level(_) => self.compile(expr),
            _ => Err(self.mismatch(expr, "level")),
        }
    }

    pub fn compile_hierarchy(&self, expr: &Expression) -> CalcResult<CalcRef> {
        match expr.get_type() {
            Type::Hierarchy(_) => self.compile(expr),
            Type::Dimension(scope) => Ok(Arc::new(ConvertCalc::new(
                Adapter::DimensionToHierarchy,
                self.compile(expr)?,
                Type::Hierarchy(scope),
            ))),
            Type::Level(scope) => Ok(Arc::new(ConvertCalc::new(
                Adapter::LevelToHierarchy,
                self.compile(expr)?,
                Type::Hierarchy(scope),
            ))),
            Type::Member(scope) => {
                let member = self.compile(expr)?;
                Ok(Arc::new(FnCalc::new(
                    CalcBase::new("Hierarchy", Type::Hierarchy(scope), vec![member]),
                    |children, ev| {
                        let m = children[0].evaluate_member(ev)?;
                        Ok(Value::Hierarchy(ev.cube().hierarchy_of(&m).clone()))
                    },
                )))
            }
            _ => Err(self.mismatch(expr, "hierarchy")),
        }
    }

    pub fn compile_dimension(&self, expr: &Expression) -> CalcResult<CalcRef> {
        match expr.get_type() {
            Type::Dimension(_) => self.compile(expr),
            Type::Hierarchy(scope) | Type::Level(scope) | Type::Member(scope) => {
                let hierarchy = self.compile_hierarchy(expr)?;
                let scope = MemberScope {
                    hierarchy: None,
                    ..scope
                };
                Ok(Arc::new(FnCalc::new(
                    CalcBase::new("Dimension", Type::Dimension(scope), vec![hierarchy]),
                    |children, ev| {
                        let h = children[0].evaluate_hierarchy(ev)?;
                        let d = ev.cube().dimension(h.dimension_unique_name())?.clone();
                        Ok(Value::Dimension(d))
                    },
                )))
            }
            _ => Err(self.mismatch(expr, "dimension")),
        }
    }

    /// A scalar; members and tuples yield their cell value
    pub fn compile_scalar(&self, expr: &Expression) -> CalcResult<CalcRef> {
        match expr.get_type() {
            Type::Member(_) => Ok(Arc::new(MemberValueCalc::new(vec![self.compile(expr)?]))),
            Type::Tuple(_) => Ok(Arc::new(TupleValueCalc::new(self.compile(expr)?))),
            Type::Hierarchy(_) | Type::Dimension(_) => {
                Ok(Arc::new(MemberValueCalc::new(vec![self.compile_member(expr)?])))
            }
            ty if ty.is_scalar() || ty == Type::Symbol => {
                self.compile_as(expr, &[ResultStyle::Value, ResultStyle::ValueNotNull])
            }
            _ => Err(self.mismatch(expr, "scalar")),
        }
    }

    pub fn compile_boolean(&self, expr: &Expression) -> CalcResult<CalcRef> {
        self.compile_scalar(expr)
    }

    pub fn compile_integer(&self, expr: &Expression) -> CalcResult<CalcRef> {
        self.compile_scalar(expr)
    }

    pub fn compile_string(&self, expr: &Expression) -> CalcResult<CalcRef> {
        self.compile_scalar(expr)
    }

    /// A numeric; integers are widened to doubles
    pub fn compile_double(&self, expr: &Expression) -> CalcResult<CalcRef> {
        let calc = self.compile_scalar(expr)?;
        if calc.get_type() == &Type::Integer {
            Ok(Arc::new(ConvertCalc::new(Adapter::IntegerToDouble, calc, Type::Numeric)))
        } else {
            Ok(calc)
        }
    }

    pub fn compile_tuple(&self, expr: &Expression) -> CalcResult<CalcRef> {
        match expr.get_type() {
            Type::Tuple(_) => self.compile(expr),
            Type::Member(scope) => Ok(Arc::new(ConvertCalc::new(
                Adapter::MemberToTuple,
                self.compile(expr)?,
                Type::tuple([scope]),
            ))),
            Type::Hierarchy(scope) | Type::Dimension(scope) => Ok(Arc::new(ConvertCalc::new(
                Adapter::MemberToTuple,
                self.compile_member(expr)?,
                Type::tuple([scope]),
            ))),
            _ => Err(self.mismatch(expr, "tuple")),
        }
    }

    /// A materialized set; with `mutable`, one the caller may modify
    pub fn compile_list(&self, expr: &Expression, mutable: bool) -> CalcResult<CalcRef> {
        match expr.get_type() {
            Type::Set(_) => {
                let styles: &[ResultStyle] = if mutable {
                    &[ResultStyle::MutableList]
                } else {
                    &[ResultStyle::List, ResultStyle::MutableList]
                };
                self.compile_as(expr, styles)
            }
            Type::Member(scope) => Ok(Arc::new(ConvertCalc::new(
                Adapter::MemberToSet,
                self.compile(expr)?,
                Type::set(Type::member(scope)),
            ))),
            Type::Tuple(scopes) => Ok(Arc::new(ConvertCalc::new(
                Adapter::TupleToSet,
                self.compile(expr)?,
                Type::set(Type::Tuple(scopes)),
            ))),
            Type::Hierarchy(scope) | Type::Dimension(scope) => Ok(Arc::new(ConvertCalc::new(
                Adapter::MemberToSet,
                self.compile_member(expr)?,
                Type::set(Type::member(scope)),
            ))),
            _ => Err(self.mismatch(expr, "set")),
        }
    }

    /// A set, lazily produced where the function supports it
    pub fn compile_iterable(&self, expr: &Expression) -> CalcResult<CalcRef> {
        match expr.get_type() {
            Type::Set(_) => self.compile_as(
                expr,
                &[
                    ResultStyle::Iterable,
                    ResultStyle::List,
                    ResultStyle::MutableList,
                ],
            ),
            _ => self.compile_list(expr, false),
        }
    }
}

fn compile_literal(literal: &Literal) -> ConstantCalc {
    match literal {
        Literal::Numeric(n) => ConstantCalc::double(*n),
        Literal::Integer(i) => ConstantCalc::integer(*i),
        Literal::String(s) => ConstantCalc::string(s),
        Literal::Boolean(b) => ConstantCalc::boolean(*b),
        Literal::Null => ConstantCalc::null(),
        Literal::Symbol(s) => ConstantCalc::symbol(s),
    }
}

pub(crate) fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Numeric(n) => Value::Double(*n),
        Literal::Integer(i) => Value::Int(*i),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
        Literal::Symbol(s) => Value::Symbol(s.clone()),
    }
}

fn boolean_of(inner: CalcRef) -> CalcRef {
    Arc::new(FnCalc::new(
        CalcBase::new("ToBoolean", Type::Boolean, vec![inner]),
        |children, ev| match children[0].evaluate(ev)? {
            Value::Null => Ok(Value::Null),
            other => Ok(Value::Bool(other.to_bool()?)),
        },
    ))
}

fn number_of(inner: CalcRef) -> CalcRef {
    Arc::new(FnCalc::new(
        CalcBase::new("ToNumber", Type::Numeric, vec![inner]),
        |children, ev| Ok(Value::from(children[0].evaluate_double(ev)?)),
    ))
}

fn integer_of(inner: CalcRef) -> CalcRef {
    Arc::new(FnCalc::new(
        CalcBase::new("ToInteger", Type::Integer, vec![inner]),
        |children, ev| Ok(children[0].evaluate_integer(ev)?.map_or(Value::Null, Value::Int)),
    ))
}

fn string_of(inner: CalcRef) -> CalcRef {
    Arc::new(FnCalc::new(
        CalcBase::new("ToString", Type::String, vec![inner]),
        |children, ev| Ok(children[0].evaluate_string(ev)?.map_or(Value::Null, Value::String)),
    ))
}
