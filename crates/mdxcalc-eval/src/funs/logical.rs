//! Logical operators and conditional evaluation
//!
//! Implements: AND, OR, NOT, IIf
//!
//! A null operand reads as false. `AND` and `OR` short-circuit, so the
//! right operand is not evaluated when the left one decides the result.

use crate::calc::{CalcBase, CalcRef, FnCalc};
use crate::compiler::ExpCompiler;
use crate::error::{CalcResult, ResolutionError};
use crate::expr::{Expression, ResolvedFunCall};
use crate::funs::arg;
use crate::resolve::{FunctionTable, MultiResolver};
use crate::value::Value;
use mdxcalc_types::{DataType, Type};
use std::sync::Arc;

pub fn register(table: &mut FunctionTable) -> Result<(), ResolutionError> {
    table.register(MultiResolver::new(
        "AND",
        "Returns the conjunction of two conditions.",
        &["ibbb"],
        compile_and,
    )?);
    table.register(MultiResolver::new(
        "OR",
        "Returns the disjunction of two conditions.",
        &["ibbb"],
        compile_or,
    )?);
    table.register(MultiResolver::new(
        "NOT",
        "Returns the negation of a condition.",
        &["Pbb"],
        compile_not,
    )?);
    table.register(
        MultiResolver::new(
            "IIf",
            "Returns one of two values, depending on a condition.",
            &["fnbnn", "fsbss", "fbbbb", "fmbmm", "fxbxx"],
            compile_iif,
        )?
        .with_result_type(iif_type),
    );
    Ok(())
}

fn compile_and(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let children = vec![
        compiler.compile_boolean(arg(call, 0)?)?,
        compiler.compile_boolean(arg(call, 1)?)?,
    ];
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("AND", Type::Boolean, children),
        |c, ev| Ok(Value::Bool(c[0].evaluate_boolean(ev)? && c[1].evaluate_boolean(ev)?)),
    )))
}

fn compile_or(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let children = vec![
        compiler.compile_boolean(arg(call, 0)?)?,
        compiler.compile_boolean(arg(call, 1)?)?,
    ];
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("OR", Type::Boolean, children),
        |c, ev| Ok(Value::Bool(c[0].evaluate_boolean(ev)? || c[1].evaluate_boolean(ev)?)),
    )))
}

fn compile_not(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let child = compiler.compile_boolean(arg(call, 0)?)?;
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("NOT", Type::Boolean, vec![child]),
        |c, ev| Ok(Value::Bool(!c[0].evaluate_boolean(ev)?)),
    )))
}

/// The type both branches can be viewed as
fn iif_type(args: &[Expression]) -> Type {
    match (args.get(1), args.get(2)) {
        (Some(a), Some(b)) => a
            .get_type()
            .common(&b.get_type())
            .unwrap_or_else(|| a.get_type()),
        _ => Type::Scalar,
    }
}

fn compile_iif(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let condition = compiler.compile_boolean(arg(call, 0)?)?;
    let branch = |expr: &Expression| match call.def.return_category() {
        DataType::Member => compiler.compile_member(expr),
        DataType::Set => compiler.compile_list(expr, false),
        _ => compiler.compile_scalar(expr),
    };
    let children = vec![condition, branch(arg(call, 1)?)?, branch(arg(call, 2)?)?];
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("IIf", call.ty.clone(), children),
        |c, ev| {
            if c[0].evaluate_boolean(ev)? {
                c[1].evaluate(ev)
            } else {
                c[2].evaluate(ev)
            }
        },
    )))
}
