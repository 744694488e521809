//! Implements: Cache, Value

use crate::calc::{CacheCalc, CalcRef, ExpCacheDescriptor};
use crate::compiler::ExpCompiler;
use crate::error::{CalcResult, ResolutionError};
use crate::expr::{Expression, ResolvedFunCall};
use crate::funs::arg;
use crate::resolve::{FunctionTable, MultiResolver};
use mdxcalc_types::Type;
use std::sync::Arc;

pub fn register(table: &mut FunctionTable) -> Result<(), ResolutionError> {
    table.register(
        MultiResolver::new(
            "Cache",
            "Evaluates and returns its sole argument, applying statement-level caching.",
            &["fvv", "fxx"],
            compile_cache,
        )?
        .with_result_type(first_arg_type),
    );
    table.register(MultiResolver::new(
        "Value",
        "Returns the value of the current cell of a member or tuple.",
        &["pvm", "pvt"],
        compile_value,
    )?);
    Ok(())
}

fn first_arg_type(args: &[Expression]) -> Type {
    args.first().map_or(Type::Scalar, Expression::get_type)
}

fn compile_cache(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let expr = arg(call, 0)?;
    let calc = if expr.get_type().is_set() {
        compiler.compile_list(expr, false)?
    } else {
        compiler.compile_scalar(expr)?
    };
    let descriptor = ExpCacheDescriptor::new(calc, compiler.cube());
    Ok(Arc::new(CacheCalc::new(descriptor)))
}

fn compile_value(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compiler.compile_scalar(arg(call, 0)?)
}
