//! Aggregate functions over sets
//!
//! Implements: Sum, Avg, Median
//!
//! The numeric expression is evaluated once per tuple with the tuple in
//! the context; without one, the current cell value is used. Empty values
//! are skipped. An aggregate over nothing but empty values is empty.

use crate::calc::{CalcBase, CalcRef, CurrentValueCalc, DependencyRule, FnCalc};
use crate::compiler::ExpCompiler;
use crate::error::{CalcResult, ResolutionError};
use crate::expr::ResolvedFunCall;
use crate::funs::{arg, values_over};
use crate::resolve::{FunctionTable, MultiResolver};
use crate::value::Value;
use std::sync::Arc;

pub fn register(table: &mut FunctionTable) -> Result<(), ResolutionError> {
    table.register(MultiResolver::new(
        "Sum",
        "Returns the sum of a numeric expression evaluated over a set.",
        &["fnx", "fnxn"],
        compile_sum,
    )?);
    table.register(MultiResolver::new(
        "Avg",
        "Returns the average value of a numeric expression evaluated over a set.",
        &["fnx", "fnxn"],
        compile_avg,
    )?);
    table.register(MultiResolver::new(
        "Median",
        "Returns the median value of a numeric expression evaluated over a set.",
        &["fnx", "fnxn"],
        compile_median,
    )?);
    Ok(())
}

type Aggregator = fn(Vec<f64>) -> Option<f64>;

fn sum(values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum())
}

fn avg(values: Vec<f64>) -> Option<f64> {
    let n = values.len();
    sum(values).map(|total| total / n as f64)
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

fn compile_aggregate(
    call: &ResolvedFunCall,
    compiler: &ExpCompiler,
    aggregator: Aggregator,
) -> CalcResult<CalcRef> {
    let set = compiler.compile_iterable(arg(call, 0)?)?;
    let value: CalcRef = match call.arg(1) {
        Some(expr) => compiler.compile_double(expr)?,
        None => Arc::new(CurrentValueCalc::new()),
    };
    Ok(Arc::new(FnCalc::new(
        CalcBase::new(call.name().to_string(), call.ty.clone(), vec![set, value])
            .with_rule(DependencyRule::AllButFirst),
        move |c, ev| {
            let set = c[0].evaluate_iterable(ev)?;
            let values = values_over(set.as_ref(), &c[1], ev)?;
            let present: Vec<f64> = values.into_iter().flatten().collect();
            Ok(aggregator(present).map_or(Value::Null, Value::Double))
        },
    )))
}

fn compile_sum(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_aggregate(call, compiler, sum)
}

fn compile_avg(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_aggregate(call, compiler, avg)
}

fn compile_median(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_aggregate(call, compiler, median)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expression;
    use crate::funs::testing::{evaluate, member};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn quarters(year: &str) -> Expression {
        Expression::property(member(&format!("[Time].[{}]", year)), "Children")
    }

    #[rstest]
    #[case(vec![1.0, 2.0, 3.0], Some(2.0))]
    #[case(vec![4.0, 1.0, 3.0, 2.0], Some(2.5))]
    #[case(vec![], None)]
    fn test_median(#[case] values: Vec<f64>, #[case] expected: Option<f64>) {
        assert_eq!(median(values), expected);
    }

    #[rstest]
    // Q4 is empty and skipped
    #[case("Sum", Value::Double(42.0))]
    #[case("Avg", Value::Double(14.0))]
    #[case("Median", Value::Double(15.0))]
    fn test_aggregate_of_current_cell(#[case] function: &str, #[case] expected: Value) {
        let expr = Expression::function(function, vec![quarters("1997")]);
        assert_eq!(evaluate(expr).unwrap(), expected);
    }

    #[test]
    fn test_aggregate_with_expression() {
        let doubled = Expression::infix(
            "*",
            member("[Measures].[Unit Sales]"),
            Expression::numeric(2.0),
        );
        let expr = Expression::function("Sum", vec![quarters("1997"), doubled]);
        assert_eq!(evaluate(expr).unwrap(), Value::Double(84.0));
    }

    #[test]
    fn test_all_empty_is_null() {
        let expr = Expression::function("Avg", vec![quarters("1998")]);
        assert_eq!(evaluate(expr).unwrap(), Value::Null);
    }

    #[test]
    fn test_sum_over_store_sales() {
        let expr = Expression::function(
            "Sum",
            vec![
                Expression::property(member("[Store].[USA]"), "Children"),
                member("[Measures].[Store Sales]"),
            ],
        );
        assert_eq!(evaluate(expr).unwrap(), Value::Double(150.0));
    }
}
