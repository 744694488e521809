//! Set functions and constructors
//!
//! Implements: CrossJoin (and the `*` operator on sets), Filter, NonEmpty,
//! Head, Count, Order, the set constructor `{ }` and the tuple constructor
//! `( )`

use crate::calc::{CalcBase, CalcRef, DependencyRule, FnCalc, ResultStyle};
use crate::compiler::ExpCompiler;
use crate::error::{CalcError, CalcResult, ResolutionError};
use crate::evaluator::Evaluator;
use crate::expr::{Expression, ResolvedFunCall};
use crate::funs::{arg, for_each_tuple, symbol_arg};
use crate::resolve::{FunctionTable, MultiResolver, Syntax, VariadicResolver};
use crate::tuple::{TupleIterable, TupleList};
use crate::value::Value;
use mdxcalc_model::MemberRef;
use mdxcalc_types::{DataType, Type};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

pub fn register(table: &mut FunctionTable) -> Result<(), ResolutionError> {
    table.register(
        MultiResolver::new(
            "CrossJoin",
            "Returns the cross product of two sets.",
            &["fxxx"],
            compile_cross_join,
        )?
        .with_result_type(cross_join_type),
    );
    table.register(
        MultiResolver::new(
            "*",
            "Returns the cross product of two sets.",
            &["ixxx"],
            compile_cross_join,
        )?
        .with_result_type(cross_join_type),
    );
    table.register(MultiResolver::new(
        "Filter",
        "Returns the set resulting from filtering a set based on a search condition.",
        &["fxxb"],
        compile_filter,
    )?);
    table.register(MultiResolver::new(
        "NonEmpty",
        "Returns the tuples of a set that have a non-empty cell, optionally crossed with a second set.",
        &["fxx", "fxxx"],
        compile_non_empty,
    )?);
    table.register(MultiResolver::new(
        "Head",
        "Returns the first specified number of elements in a set.",
        &["fxx", "fxxi"],
        compile_head,
    )?);
    table.register(
        MultiResolver::new(
            "Count",
            "Returns the number of tuples in a set, empty cells included unless EXCLUDEEMPTY is specified.",
            &["fix", "fixy"],
            compile_count,
        )?
        .with_reserved_words(&["EXCLUDEEMPTY", "INCLUDEEMPTY"]),
    );
    table.register(
        MultiResolver::new(
            "Order",
            "Arranges members of a set, optionally preserving or breaking the hierarchy.",
            &["fxxn", "fxxny", "fxxs", "fxxsy"],
            compile_order,
        )?
        .with_reserved_words(&["ASC", "DESC", "BASC", "BDESC"]),
    );
    table.register(VariadicResolver::new(
        "{}",
        "Brace operator constructs a set.",
        Syntax::Braces,
        DataType::Set,
        match_set_elements,
        compile_set,
        set_type,
    ));
    table.register(VariadicResolver::new(
        "()",
        "Parenthesis operator constructs a tuple, or groups an expression.",
        Syntax::Parentheses,
        DataType::Tuple,
        match_tuple_elements,
        compile_tuple,
        tuple_type,
    ));
    Ok(())
}

// === CrossJoin ===

fn cross_join_type(args: &[Expression]) -> Type {
    let scopes = args.iter().flat_map(|a| a.get_type().scopes());
    Type::set(Type::tuple(scopes))
}

/// Every tuple of `left` followed by every tuple of `right`.
///
/// With the evaluator in non-empty mode, combinations whose cell is empty
/// are left out.
fn cross_join_lists(
    left: &dyn TupleIterable,
    right: &dyn TupleIterable,
    evaluator: &mut Evaluator,
) -> CalcResult<TupleList> {
    let collections = evaluator.collections();
    let mut out = collections.create_list(left.arity() + right.arity());
    let right = collections.materialize(right, evaluator)?;
    let non_empty = evaluator.is_non_empty();
    let mut tuple = Vec::with_capacity(out.arity());
    let mut iteration: u64 = 0;
    let mut cursor = left.tuple_cursor();
    while cursor.forward() {
        for r in right.iter() {
            evaluator.check_cancel_or_timeout(iteration)?;
            iteration += 1;
            tuple.clear();
            cursor.current_to_array(&mut tuple);
            tuple.extend_from_slice(r);
            if non_empty {
                let mut scope = evaluator.push();
                scope.set_context_tuple(&tuple);
                if scope.is_empty_cell()? {
                    continue;
                }
            }
            out.add_tuple(&tuple)?;
        }
    }
    Ok(out)
}

fn compile_cross_join(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let lazy = compiler.accepts_iterable();
    let children = vec![
        compiler.compile_iterable(arg(call, 0)?)?,
        compiler.compile_iterable(arg(call, 1)?)?,
    ];
    let style = if lazy {
        ResultStyle::Iterable
    } else {
        ResultStyle::List
    };
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("CrossJoin", call.ty.clone(), children).with_style(style),
        move |c, ev| {
            let left = c[0].evaluate_iterable(ev)?;
            let right = c[1].evaluate_iterable(ev)?;
            if lazy && !ev.is_non_empty() {
                return Ok(Value::Iterable(ev.collections().cross_join(left, right)));
            }
            Ok(Value::list(cross_join_lists(left.as_ref(), right.as_ref(), ev)?))
        },
    )))
}

// === Filter and NonEmpty ===

fn compile_filter(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let set = compiler.compile_iterable(arg(call, 0)?)?;
    let condition = compiler.compile_boolean(arg(call, 1)?)?;
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("Filter", call.ty.clone(), vec![set, condition])
            .with_rule(DependencyRule::AllButFirst),
        |c, ev| {
            let set = c[0].evaluate_iterable(ev)?;
            let keep = for_each_tuple(set.as_ref(), ev, |_, ev| c[1].evaluate_boolean(ev))?;
            select(set.as_ref(), &keep, ev)
        },
    )))
}

/// The tuples of `set` whose flag in `keep` is set
fn select(set: &dyn TupleIterable, keep: &[bool], evaluator: &Evaluator) -> CalcResult<Value> {
    let mut out = evaluator.collections().create_list(set.arity());
    let mut cursor = set.tuple_cursor();
    let mut i = 0;
    while cursor.forward() {
        if keep.get(i).copied().unwrap_or(false) {
            out.add_tuple(cursor.current())?;
        }
        i += 1;
    }
    Ok(Value::list(out))
}

fn compile_non_empty(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let mut children = vec![compiler.compile_iterable(arg(call, 0)?)?];
    if call.args.len() > 1 {
        children.push(compiler.compile_list(arg(call, 1)?, false)?);
    }
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("NonEmpty", call.ty.clone(), children).with_rule(DependencyRule::Always),
        |c, ev| {
            let set = c[0].evaluate_iterable(ev)?;
            let filter = match c.get(1) {
                Some(calc) => Some(calc.evaluate_list(ev)?),
                None => None,
            };
            let keep = for_each_tuple(set.as_ref(), ev, |_, ev| match &filter {
                None => Ok(!ev.is_empty_cell()?),
                Some(filter) => {
                    for t in filter.iter() {
                        let mut scope = ev.push();
                        scope.set_context_tuple(t);
                        if !scope.is_empty_cell()? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
            })?;
            select(set.as_ref(), &keep, ev)
        },
    )))
}

// === Head and Count ===

fn compile_head(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let mut children = vec![compiler.compile_list(arg(call, 0)?, false)?];
    if call.args.len() > 1 {
        children.push(compiler.compile_integer(arg(call, 1)?)?);
    }
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("Head", call.ty.clone(), children),
        |c, ev| {
            let list = c[0].evaluate_list(ev)?;
            let count = match c.get(1) {
                Some(calc) => calc.evaluate_integer(ev)?.unwrap_or(0),
                None => 1,
            };
            let count = usize::try_from(count).unwrap_or(0);
            if count >= list.len() {
                return Ok(Value::List(list));
            }
            Ok(Value::list(ev.collections().sub_list(&list, 0, count)))
        },
    )))
}

fn compile_count(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let exclude_empty = symbol_arg(call, 1)?.as_deref() == Some("EXCLUDEEMPTY");
    let set = compiler.compile_iterable(arg(call, 0)?)?;
    let rule = if exclude_empty {
        DependencyRule::Always
    } else {
        DependencyRule::AnyChild
    };
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("Count", Type::Integer, vec![set])
            .with_style(ResultStyle::ValueNotNull)
            .with_rule(rule),
        move |c, ev| {
            let set = c[0].evaluate_iterable(ev)?;
            let count = if exclude_empty {
                for_each_tuple(set.as_ref(), ev, |_, ev| ev.is_empty_cell())?
                    .into_iter()
                    .filter(|empty| !empty)
                    .count()
            } else {
                let mut cursor = set.tuple_cursor();
                let mut n = 0;
                while cursor.forward() {
                    n += 1;
                }
                n
            };
            i64::try_from(count)
                .map(Value::Int)
                .map_err(|_| CalcError::invalid_argument("Count", "count out of range"))
        },
    )))
}

// === Order ===

/// Sort key of one tuple
#[derive(Debug, Clone, PartialEq)]
enum SortValue {
    Number(Option<f64>),
    Text(Option<Arc<str>>),
}

impl SortValue {
    /// Nulls sort lowest
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => match (a, b) {
                (Some(a), Some(b)) => a.total_cmp(b),
                (a, b) => a.is_some().cmp(&b.is_some()),
            },
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OrderFlag {
    descending: bool,
    /// Ignore the hierarchy and sort purely by value
    breaks_hierarchy: bool,
}

impl OrderFlag {
    fn parse(word: Option<&str>) -> CalcResult<Self> {
        let (descending, breaks_hierarchy) = match word {
            None | Some("ASC") => (false, false),
            Some("DESC") => (true, false),
            Some("BASC") => (false, true),
            Some("BDESC") => (true, true),
            Some(other) => {
                return Err(CalcError::invalid_argument(
                    "Order",
                    format!("unknown flag {}", other),
                ));
            }
        };
        Ok(Self {
            descending,
            breaks_hierarchy,
        })
    }
}

/// Sort keys along the leading member's ancestry, root first, ending with the
/// tuple's own key. Each step carries the member's ordinal.
type SortPath = Vec<(usize, SortValue)>;

/// Hierarchical order: at the first ancestor where two paths part, the
/// ancestors' keys decide. An ancestor sorts before its descendants.
fn compare_paths(a: &SortPath, b: &SortPath, descending: bool) -> Ordering {
    let directed = |x: &SortValue, y: &SortValue| {
        let by_value = x.compare(y);
        if descending {
            by_value.reverse()
        } else {
            by_value
        }
    };
    for ((oa, ka), (ob, kb)) in a.iter().zip(b.iter()) {
        if oa != ob {
            return directed(ka, kb).then(oa.cmp(ob));
        }
    }
    match a.len().cmp(&b.len()) {
        Ordering::Equal => match (a.last(), b.last()) {
            (Some((_, ka)), Some((_, kb))) => directed(ka, kb),
            _ => Ordering::Equal,
        },
        shorter_first => shorter_first,
    }
}

fn compile_order(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let flag = OrderFlag::parse(symbol_arg(call, 2)?.as_deref())?;
    let set = compiler.compile_list(arg(call, 0)?, false)?;
    let strings = call.def.parameter_categories().get(1) == Some(&DataType::String);
    let key = if strings {
        compiler.compile_string(arg(call, 1)?)?
    } else {
        compiler.compile_double(arg(call, 1)?)?
    };
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("Order", call.ty.clone(), vec![set, key])
            .with_style(ResultStyle::MutableList)
            .with_rule(DependencyRule::AllButFirst),
        move |c, ev| {
            let sort_value = |ev: &mut Evaluator| -> CalcResult<SortValue> {
                Ok(if strings {
                    SortValue::Text(c[1].evaluate_string(ev)?)
                } else {
                    SortValue::Number(c[1].evaluate_double(ev)?)
                })
            };
            let list = c[0].evaluate_list(ev)?;
            let paths = for_each_tuple(list.as_ref(), ev, |tuple, ev| {
                let own = sort_value(&mut *ev)?;
                let Some(leading) = tuple.first() else {
                    return Ok(vec![(0, own)]);
                };
                let mut path: SortPath = Vec::with_capacity(leading.depth() + 1);
                if !flag.breaks_hierarchy {
                    let ancestors: Vec<MemberRef> = leading.ancestors().cloned().collect();
                    for ancestor in ancestors.into_iter().rev() {
                        let ordinal = ancestor.ordinal();
                        let mut scope = ev.push();
                        scope.set_context(ancestor);
                        path.push((ordinal, sort_value(&mut *scope)?));
                    }
                }
                path.push((leading.ordinal(), own));
                Ok(path)
            })?;
            let mut indices: Vec<usize> = (0..list.len()).collect();
            indices.sort_by(|&a, &b| {
                if flag.breaks_hierarchy {
                    let by_value = paths[a][0].1.compare(&paths[b][0].1);
                    return if flag.descending {
                        by_value.reverse()
                    } else {
                        by_value
                    };
                }
                compare_paths(&paths[a], &paths[b], flag.descending)
            });
            Ok(Value::list(list.permute(&indices)?))
        },
    )))
}

// === Constructors ===

/// `{ }` takes members, tuples and sets, in any mix
fn match_set_elements(args: &[Expression]) -> Option<Vec<DataType>> {
    args.iter()
        .map(|a| match a.get_type().data_type() {
            t @ (DataType::Member | DataType::Tuple | DataType::Set) => Some(t),
            DataType::Hierarchy | DataType::Dimension => Some(DataType::Member),
            _ => None,
        })
        .collect()
}

fn set_type(args: &[Expression]) -> Type {
    let element = |a: &Expression| match a.get_type() {
        Type::Set(element) => *element,
        other => other,
    };
    let mut types = args.iter().map(element);
    let Some(first) = types.next() else {
        return Type::set(Type::any_member());
    };
    let common = types.try_fold(first, |acc, t| acc.common(&t));
    Type::set(common.unwrap_or_else(Type::any_member))
}

fn compile_set(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let children = call
        .args
        .iter()
        .map(|a| match a.get_type() {
            Type::Set(_) => compiler.compile_list(a, false),
            Type::Tuple(_) => compiler.compile_tuple(a),
            _ => compiler.compile_member(a),
        })
        .collect::<CalcResult<Vec<_>>>()?;
    let arity = call.ty.arity().max(1);
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("{}", call.ty.clone(), children).with_style(ResultStyle::MutableList),
        move |c, ev| {
            let mut out = ev.collections().create_list(arity);
            for child in c {
                match child.evaluate(ev)? {
                    Value::Member(m) => out.add_tuple(&[m])?,
                    Value::Tuple(t) => out.add_tuple(&t)?,
                    Value::List(list) => out.extend_from(&list)?,
                    // a member expression that evaluated to nothing, e.g. a root's parent
                    Value::Null => {}
                    other => return Err(CalcError::type_conversion(other.kind(), "set element")),
                }
            }
            Ok(Value::list(out))
        },
    )))
}

/// `( )` groups one expression, or builds a tuple from two or more members
fn match_tuple_elements(args: &[Expression]) -> Option<Vec<DataType>> {
    match args {
        [] => None,
        [single] => Some(vec![single.get_type().data_type()]),
        many => many
            .iter()
            .map(|a| match a.get_type().data_type() {
                DataType::Member | DataType::Hierarchy | DataType::Dimension => {
                    Some(DataType::Member)
                }
                _ => None,
            })
            .collect(),
    }
}

fn tuple_type(args: &[Expression]) -> Type {
    match args {
        [single] => single.get_type(),
        many => Type::tuple(many.iter().flat_map(|a| a.get_type().scopes())),
    }
}

fn compile_tuple(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    if let [single] = call.args.as_slice() {
        return compiler.compile(single);
    }
    let members = call
        .args
        .iter()
        .map(|a| compiler.compile_member(a))
        .collect::<CalcResult<Vec<_>>>()?;
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("()", call.ty.clone(), members).with_style(ResultStyle::ValueNotNull),
        |c, ev| {
            let tuple = c
                .iter()
                .map(|m| m.evaluate_member(ev))
                .collect::<CalcResult<Vec<_>>>()?;
            let mut seen = HashSet::with_capacity(tuple.len());
            if let Some(dup) = tuple.iter().find(|m| !seen.insert(m.hierarchy_ordinal())) {
                return Err(CalcError::invalid_argument(
                    "()",
                    format!("tuple has more than one member of the hierarchy of {}", dup),
                ));
            }
            Ok(Value::Tuple(tuple))
        },
    )))
}
