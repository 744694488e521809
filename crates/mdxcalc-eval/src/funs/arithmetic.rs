//! Arithmetic and comparison operators
//!
//! Implements: `+`, `-`, `*`, `/`, unary `-`, `<`, `<=`, `>`, `>=`, `=`, `<>`
//!
//! Null handling follows cell semantics rather than strict propagation:
//!
//! | Operator      | One null        | Both null |
//! |---------------|-----------------|-----------|
//! | `+`, `-`      | null acts as 0  | null      |
//! | `*`, `/`      | null            | null      |
//! | comparisons   | null            | null      |
//!
//! Division by zero yields null. Integer overflow is an error.

use crate::calc::{CalcBase, CalcRef, FnCalc};
use crate::compiler::ExpCompiler;
use crate::error::{CalcError, CalcResult, ResolutionError};
use crate::expr::ResolvedFunCall;
use crate::funs::arg;
use crate::resolve::{CompileFn, FunctionTable, MultiResolver};
use crate::value::Value;
use mdxcalc_types::{DataType, Type};
use std::cmp::Ordering;
use std::sync::Arc;

pub fn register(table: &mut FunctionTable) -> Result<(), ResolutionError> {
    table.register(MultiResolver::new("+", "Adds two numbers.", &["innn", "iiii"], compile_add)?);
    table.register(MultiResolver::new(
        "-",
        "Subtracts two numbers.",
        &["innn", "iiii"],
        compile_subtract,
    )?);
    table.register(MultiResolver::new(
        "*",
        "Multiplies two numbers.",
        &["innn", "iiii"],
        compile_multiply,
    )?);
    table.register(MultiResolver::new("/", "Divides two numbers.", &["innn", "iiii"], compile_divide)?);
    table.register(MultiResolver::new(
        "-",
        "Returns the negative of a number.",
        &["Pnn", "Pii"],
        compile_negate,
    )?);

    let comparisons: [(&str, &str, CompileFn); 6] = [
        ("<", "Returns whether an expression is less than another.", compile_lt),
        ("<=", "Returns whether an expression is less than or equal to another.", compile_le),
        (">", "Returns whether an expression is greater than another.", compile_gt),
        (">=", "Returns whether an expression is greater than or equal to another.", compile_ge),
        ("=", "Returns whether two expressions are equal.", compile_eq),
        ("<>", "Returns whether two expressions are not equal.", compile_ne),
    ];
    for (name, description, compile) in comparisons {
        table.register(MultiResolver::new(name, description, &["ibnn", "ibss"], compile)?);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }

    fn null_as_zero(self) -> bool {
        matches!(self, Self::Add | Self::Subtract)
    }

    /// Operands after null handling; `None` means the result is null
    fn operands<T: Default>(self, a: Option<T>, b: Option<T>) -> Option<(T, T)> {
        match (a, b) {
            (Some(a), Some(b)) => Some((a, b)),
            (None, None) => None,
            (a, b) if self.null_as_zero() => Some((a.unwrap_or_default(), b.unwrap_or_default())),
            _ => None,
        }
    }

    fn apply_double(self, a: f64, b: f64) -> Option<f64> {
        match self {
            Self::Add => Some(a + b),
            Self::Subtract => Some(a - b),
            Self::Multiply => Some(a * b),
            Self::Divide if b == 0.0 => None,
            Self::Divide => Some(a / b),
        }
    }

    fn apply_integer(self, a: i64, b: i64) -> CalcResult<Option<i64>> {
        let result = match self {
            Self::Add => a.checked_add(b),
            Self::Subtract => a.checked_sub(b),
            Self::Multiply => a.checked_mul(b),
            Self::Divide if b == 0 => return Ok(None),
            Self::Divide => a.checked_div(b),
        };
        result
            .map(Some)
            .ok_or_else(|| CalcError::invalid_argument(self.symbol(), "integer overflow"))
    }
}

fn compile_arith(call: &ResolvedFunCall, compiler: &ExpCompiler, op: ArithOp) -> CalcResult<CalcRef> {
    let (left, right) = (arg(call, 0)?, arg(call, 1)?);
    if call.def.return_category() == DataType::Integer {
        let children = vec![compiler.compile_integer(left)?, compiler.compile_integer(right)?];
        return Ok(Arc::new(FnCalc::new(
            CalcBase::new(op.symbol(), Type::Integer, children),
            move |c, ev| {
                let a = c[0].evaluate_integer(ev)?;
                let b = c[1].evaluate_integer(ev)?;
                match op.operands(a, b) {
                    Some((a, b)) => Ok(op.apply_integer(a, b)?.map_or(Value::Null, Value::Int)),
                    None => Ok(Value::Null),
                }
            },
        )));
    }
    let children = vec![compiler.compile_double(left)?, compiler.compile_double(right)?];
    Ok(Arc::new(FnCalc::new(
        CalcBase::new(op.symbol(), Type::Numeric, children),
        move |c, ev| {
            let a = c[0].evaluate_double(ev)?;
            let b = c[1].evaluate_double(ev)?;
            Ok(Value::from(op.operands(a, b).and_then(|(a, b)| op.apply_double(a, b))))
        },
    )))
}

fn compile_add(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_arith(call, compiler, ArithOp::Add)
}

fn compile_subtract(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_arith(call, compiler, ArithOp::Subtract)
}

fn compile_multiply(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_arith(call, compiler, ArithOp::Multiply)
}

fn compile_divide(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_arith(call, compiler, ArithOp::Divide)
}

fn compile_negate(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let operand = arg(call, 0)?;
    if call.def.return_category() == DataType::Integer {
        let child = compiler.compile_integer(operand)?;
        return Ok(Arc::new(FnCalc::new(
            CalcBase::new("-", Type::Integer, vec![child]),
            |c, ev| match c[0].evaluate_integer(ev)? {
                Some(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| CalcError::invalid_argument("-", "integer overflow")),
                None => Ok(Value::Null),
            },
        )));
    }
    let child = compiler.compile_double(operand)?;
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("-", Type::Numeric, vec![child]),
        |c, ev| Ok(Value::from(c[0].evaluate_double(ev)?.map(|d| -d))),
    )))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "=",
            Self::Ne => "<>",
        }
    }

    fn test(self, ordering: Ordering) -> bool {
        match self {
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
        }
    }
}

fn compile_compare(call: &ResolvedFunCall, compiler: &ExpCompiler, op: CompareOp) -> CalcResult<CalcRef> {
    let (left, right) = (arg(call, 0)?, arg(call, 1)?);
    let strings = call.def.parameter_categories().first() == Some(&DataType::String);
    if strings {
        let children = vec![compiler.compile_string(left)?, compiler.compile_string(right)?];
        return Ok(Arc::new(FnCalc::new(
            CalcBase::new(op.symbol(), Type::Boolean, children),
            move |c, ev| {
                let a = c[0].evaluate_string(ev)?;
                let b = c[1].evaluate_string(ev)?;
                Ok(match (a, b) {
                    (Some(a), Some(b)) => Value::Bool(op.test(a.cmp(&b))),
                    _ => Value::Null,
                })
            },
        )));
    }
    let children = vec![compiler.compile_double(left)?, compiler.compile_double(right)?];
    Ok(Arc::new(FnCalc::new(
        CalcBase::new(op.symbol(), Type::Boolean, children),
        move |c, ev| {
            let a = c[0].evaluate_double(ev)?;
            let b = c[1].evaluate_double(ev)?;
            Ok(match (a, b) {
                (Some(a), Some(b)) => Value::Bool(op.test(a.total_cmp(&b))),
                _ => Value::Null,
            })
        },
    )))
}

fn compile_lt(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_compare(call, compiler, CompareOp::Lt)
}

fn compile_le(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_compare(call, compiler, CompareOp::Le)
}

fn compile_gt(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_compare(call, compiler, CompareOp::Gt)
}

fn compile_ge(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_compare(call, compiler, CompareOp::Ge)
}

fn compile_eq(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_compare(call, compiler, CompareOp::Eq)
}

fn compile_ne(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    compile_compare(call, compiler, CompareOp::Ne)
}

#[cfg(test)]
mod tests {
    use crate::expr::Expression;
    use crate::funs::testing::{evaluate, member as cell};
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("+", 7.0, 2.0, Value::Double(9.0))]
    #[case("-", 7.0, 2.0, Value::Double(5.0))]
    #[case("*", 7.0, 2.0, Value::Double(14.0))]
    #[case("/", 7.0, 2.0, Value::Double(3.5))]
    #[case("/", 7.0, 0.0, Value::Null)]
    fn test_numeric_operators(
        #[case] op: &str,
        #[case] a: f64,
        #[case] b: f64,
        #[case] expected: Value,
    ) {
        let expr = Expression::infix(op, Expression::numeric(a), Expression::numeric(b));
        assert_eq!(evaluate(expr).unwrap(), expected);
    }

    #[rstest]
    #[case("+", Value::Int(9))]
    #[case("-", Value::Int(5))]
    #[case("*", Value::Int(14))]
    #[case("/", Value::Int(3))]
    fn test_integer_operators_stay_integer(#[case] op: &str, #[case] expected: Value) {
        let expr = Expression::infix(op, Expression::integer(7), Expression::integer(2));
        let value = evaluate(expr).unwrap();
        assert!(matches!(value, Value::Int(_)));
        assert_eq!(value, expected);
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        let expr = Expression::infix("*", Expression::integer(i64::MAX), Expression::integer(2));
        assert!(evaluate(expr).is_err());
    }

    #[test]
    fn test_empty_cell_acts_as_zero_in_addition() {
        // 1998 has no facts
        let expr = Expression::infix("+", cell("[Time].[1998]"), Expression::numeric(3.0));
        assert_eq!(evaluate(expr).unwrap(), Value::Double(3.0));

        let both = Expression::infix("+", cell("[Time].[1998]"), cell("[Time].[1998].[Q1]"));
        assert_eq!(evaluate(both).unwrap(), Value::Null);
    }

    #[test]
    fn test_empty_cell_nulls_a_product() {
        let expr = Expression::infix("*", cell("[Time].[1998]"), Expression::numeric(3.0));
        assert_eq!(evaluate(expr).unwrap(), Value::Null);
    }

    #[test]
    fn test_cell_arithmetic() {
        // all stores, unit sales: 10 + 20 + 5 + 7
        let expr = Expression::infix("-", cell("[Time].[1997]"), cell("[Time].[1997].[Q1]"));
        assert_eq!(evaluate(expr).unwrap(), Value::Double(27.0));
    }

    #[test]
    fn test_negate() {
        assert_eq!(
            evaluate(Expression::prefix("-", Expression::integer(4))).unwrap(),
            Value::Int(-4)
        );
        assert_eq!(
            evaluate(Expression::prefix("-", Expression::numeric(1.5))).unwrap(),
            Value::Double(-1.5)
        );
    }

    #[rstest]
    #[case("<", false)]
    #[case("<=", false)]
    #[case(">", true)]
    #[case(">=", true)]
    #[case("=", false)]
    #[case("<>", true)]
    fn test_comparisons(#[case] op: &str, #[case] expected: bool) {
        let expr = Expression::infix(op, Expression::numeric(3.0), Expression::integer(2));
        assert_eq!(evaluate(expr).unwrap(), Value::Bool(expected));
    }

    #[test]
    fn test_string_comparison() {
        let expr = Expression::infix("<", Expression::string("abc"), Expression::string("abd"));
        assert_eq!(evaluate(expr).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_comparison_with_empty_cell_is_null() {
        let expr = Expression::infix("=", cell("[Time].[1998]"), Expression::numeric(0.0));
        assert_eq!(evaluate(expr).unwrap(), Value::Null);
    }
}
