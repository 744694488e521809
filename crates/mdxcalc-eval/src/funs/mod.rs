//! Built-in MDX functions
//!
//! Functions are grouped by category:
//! - Arithmetic and comparison operators (`+`, `-`, `<`, `=`, ...)
//! - Logical operators and `IIf`
//! - Navigation (`CurrentMember`, `Members`, `Children`, `Parent`,
//!   `Descendants`, `DrilldownMember`)
//! - Set functions (`CrossJoin`, `Filter`, `NonEmpty`, `Head`, `Count`,
//!   `Order`, set and tuple constructors)
//! - Aggregates (`Sum`, `Avg`, `Median`)
//! - `Cache` and `Value`
//!
//! Each module exposes a `register` function adding its resolvers to a
//! `FunctionTable`. Overloads are declared with flag strings; see
//! `FunctionSignature::parse`.

pub mod aggregate;
pub mod arithmetic;
pub mod logical;
pub mod misc;
pub mod navigation;
pub mod set;

use crate::calc::CalcRef;
use crate::error::{CalcError, CalcResult, ResolutionError};
use crate::evaluator::Evaluator;
use crate::expr::{Expression, ResolvedFunCall};
use crate::resolve::FunctionTable;
use crate::tuple::TupleIterable;
use mdxcalc_model::MemberRef;

/// Add every built-in function to `table`
pub fn register_all(table: &mut FunctionTable) -> Result<(), ResolutionError> {
    arithmetic::register(table)?;
    logical::register(table)?;
    navigation::register(table)?;
    set::register(table)?;
    aggregate::register(table)?;
    misc::register(table)?;
    Ok(())
}

/// Argument `index` of a resolved call
pub(crate) fn arg(call: &ResolvedFunCall, index: usize) -> CalcResult<&Expression> {
    call.arg(index).ok_or_else(|| {
        CalcError::internal(format!("{} has no argument {}", call.name(), index))
    })
}

/// The reserved word at argument `index`, upper-cased, if present
pub(crate) fn symbol_arg(call: &ResolvedFunCall, index: usize) -> CalcResult<Option<String>> {
    match call.arg(index) {
        None => Ok(None),
        Some(expr) => expr
            .as_symbol()
            .map(|s| Some(s.to_ascii_uppercase()))
            .ok_or_else(|| {
                CalcError::invalid_argument(
                    call.name(),
                    format!("argument {} must be a reserved word, found {}", index + 1, expr),
                )
            }),
    }
}

/// Evaluate `calc` once per tuple of `set`, with the tuple in the context.
///
/// The context is restored after each tuple, also on error.
pub(crate) fn for_each_tuple<T>(
    set: &dyn TupleIterable,
    evaluator: &mut Evaluator,
    mut f: impl FnMut(&[MemberRef], &mut Evaluator) -> CalcResult<T>,
) -> CalcResult<Vec<T>> {
    let mut out = Vec::new();
    let mut cursor = set.tuple_cursor();
    let mut iteration: u64 = 0;
    while cursor.forward() {
        evaluator.check_cancel_or_timeout(iteration)?;
        let tuple = cursor.current();
        let mut scope = evaluator.push();
        scope.set_context_tuple(tuple);
        out.push(f(tuple, &mut *scope)?);
        iteration += 1;
    }
    Ok(out)
}

/// Evaluate `calc` as a double under each tuple of `set`
pub(crate) fn values_over(
    set: &dyn TupleIterable,
    calc: &CalcRef,
    evaluator: &mut Evaluator,
) -> CalcResult<Vec<Option<f64>>> {
    for_each_tuple(set, evaluator, |_, ev| calc.evaluate_double(ev))
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::calc::CalcRef;
    use crate::compiler::ExpCompiler;
    use crate::config::EngineConfig;
    use crate::error::CalcResult;
    use crate::expr::Expression;
    use crate::resolve::FunctionTable;
    use crate::testing::{sample_cube, sample_evaluator};
    use crate::validator::{ExpValidator, Validator};
    use crate::value::Value;
    use std::sync::Arc;

    pub(crate) fn member(name: &str) -> Expression {
        Expression::Member(sample_cube().lookup_member(name).unwrap().clone())
    }

    pub(crate) fn validate(expr: Expression) -> Expression {
        let table = Arc::new(FunctionTable::builtin().unwrap());
        ExpValidator::new(sample_cube(), table).validate(expr).unwrap()
    }

    pub(crate) fn compiler() -> ExpCompiler {
        ExpCompiler::new(sample_cube(), Arc::new(EngineConfig::default()))
    }

    pub(crate) fn compile(expr: Expression) -> CalcResult<CalcRef> {
        compiler().compile(&validate(expr))
    }

    /// Validate, compile and evaluate in the default context
    pub(crate) fn evaluate(expr: Expression) -> CalcResult<Value> {
        let calc = compile(expr)?;
        calc.evaluate(&mut sample_evaluator())
    }

    /// Unique names of each tuple of a set expression
    pub(crate) fn evaluate_set(expr: Expression) -> CalcResult<Vec<Vec<String>>> {
        let calc = compiler().compile_list(&validate(expr), false)?;
        let list = calc.evaluate_list(&mut sample_evaluator())?;
        Ok(list
            .iter()
            .map(|t| t.iter().map(|m| m.unique_name().to_string()).collect())
            .collect())
    }

    /// Unique names of the members of a single-column set expression
    pub(crate) fn evaluate_members(expr: Expression) -> CalcResult<Vec<String>> {
        Ok(evaluate_set(expr)?
            .into_iter()
            .flatten()
            .collect())
    }
}
