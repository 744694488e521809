//! Member navigation
//!
//! Implements: CurrentMember, Members, Children, Parent, Descendants,
//! DrilldownMember

use crate::calc::{CalcBase, CalcRef, CurrentMemberCalc, DependencyRule, FnCalc};
use crate::compiler::ExpCompiler;
use crate::error::{CalcError, CalcResult, ResolutionError};
use crate::expr::ResolvedFunCall;
use crate::funs::{arg, symbol_arg};
use crate::resolve::{FunctionTable, MultiResolver};
use crate::value::Value;
use mdxcalc_model::{Cube, Hierarchy, MemberRef};
use mdxcalc_types::DataType;
use std::collections::HashSet;
use std::sync::Arc;

/// Flags accepted by `Descendants`
const DESCENDANTS_FLAGS: &[&str] = &[
    "SELF",
    "AFTER",
    "BEFORE",
    "BEFORE_AND_AFTER",
    "SELF_AND_AFTER",
    "SELF_AND_BEFORE",
    "SELF_BEFORE_AFTER",
    "LEAVES",
];

pub fn register(table: &mut FunctionTable) -> Result<(), ResolutionError> {
    table.register(MultiResolver::new(
        "CurrentMember",
        "Returns the current member along a hierarchy.",
        &["pmh"],
        compile_current_member,
    )?);
    table.register(MultiResolver::new(
        "Members",
        "Returns the set of members in a hierarchy or level.",
        &["pxh", "pxl"],
        compile_members,
    )?);
    table.register(MultiResolver::new(
        "Children",
        "Returns the children of a member.",
        &["pxm"],
        compile_children,
    )?);
    table.register(MultiResolver::new(
        "Parent",
        "Returns the parent of a member.",
        &["pmm"],
        compile_parent,
    )?);
    table.register(
        MultiResolver::new(
            "Descendants",
            "Returns the set of descendants of a member at a specified level or distance.",
            &["fxm", "fxml", "fxmly", "fxmi", "fxmiy"],
            compile_descendants,
        )?
        .with_reserved_words(DESCENDANTS_FLAGS),
    );
    table.register(
        MultiResolver::new(
            "DrilldownMember",
            "Drills down the members in a set that are present in a second set.",
            &["fxxx", "fxxxy"],
            compile_drilldown_member,
        )?
        .with_reserved_words(&["RECURSIVE"]),
    );
    Ok(())
}

fn compile_current_member(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let hierarchy = compiler.compile_hierarchy(arg(call, 0)?)?;
    Ok(Arc::new(CurrentMemberCalc::new(hierarchy)))
}

fn compile_members(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let source = arg(call, 0)?;
    let by_level = call.def.parameter_categories().first() == Some(&DataType::Level);
    let child = if by_level {
        compiler.compile_level(source)?
    } else {
        compiler.compile_hierarchy(source)?
    };
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("Members", call.ty.clone(), vec![child]),
        move |c, ev| {
            let members = if by_level {
                let level = c[0].evaluate_level(ev)?;
                ev.cube()
                    .hierarchy(level.hierarchy_unique_name())?
                    .level_members(&level)
            } else {
                c[0].evaluate_hierarchy(ev)?.members().to_vec()
            };
            Ok(Value::list(ev.collections().from_members(members)?))
        },
    )))
}

fn compile_children(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let member = compiler.compile_member(arg(call, 0)?)?;
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("Children", call.ty.clone(), vec![member]),
        |c, ev| {
            let member = c[0].evaluate_member(ev)?;
            let children = ev.cube().hierarchy_of(&member).children(&member).to_vec();
            Ok(Value::list(ev.collections().from_members(children)?))
        },
    )))
}

fn compile_parent(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let member = compiler.compile_member(arg(call, 0)?)?;
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("Parent", call.ty.clone(), vec![member]),
        |c, ev| {
            Ok(c[0]
                .evaluate_member(ev)?
                .parent()
                .map_or(Value::Null, |p| Value::Member(p.clone())))
        },
    )))
}

/// Which members of a subtree `Descendants` returns, relative to a
/// target depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DescendantsFlag {
    SelfOnly,
    After,
    Before,
    BeforeAndAfter,
    SelfAndAfter,
    SelfAndBefore,
    SelfBeforeAfter,
    Leaves,
}

impl DescendantsFlag {
    fn parse(word: &str) -> CalcResult<Self> {
        Ok(match word {
            "SELF" => Self::SelfOnly,
            "AFTER" => Self::After,
            "BEFORE" => Self::Before,
            "BEFORE_AND_AFTER" => Self::BeforeAndAfter,
            "SELF_AND_AFTER" => Self::SelfAndAfter,
            "SELF_AND_BEFORE" => Self::SelfAndBefore,
            "SELF_BEFORE_AFTER" => Self::SelfBeforeAfter,
            "LEAVES" => Self::Leaves,
            other => {
                return Err(CalcError::invalid_argument(
                    "Descendants",
                    format!("unknown flag {}", other),
                ));
            }
        })
    }

    fn includes(self, depth: usize, target: usize, is_leaf: bool) -> bool {
        match self {
            Self::SelfOnly => depth == target,
            Self::After => depth > target,
            Self::Before => depth < target,
            Self::BeforeAndAfter => depth != target,
            Self::SelfAndAfter => depth >= target,
            Self::SelfAndBefore => depth <= target,
            Self::SelfBeforeAfter => true,
            Self::Leaves => is_leaf && depth <= target,
        }
    }

    /// Whether members below the target depth can be included
    fn goes_below(self) -> bool {
        matches!(
            self,
            Self::After | Self::BeforeAndAfter | Self::SelfAndAfter | Self::SelfBeforeAfter
        )
    }
}

/// Where the target depth of `Descendants` comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    /// Whole subtree, no target
    Unbounded,
    Level,
    Distance,
}

fn compile_descendants(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let member = compiler.compile_member(arg(call, 0)?)?;
    let depth = match call.def.parameter_categories().get(1) {
        Some(DataType::Level) => Depth::Level,
        Some(DataType::Integer) => Depth::Distance,
        _ => Depth::Unbounded,
    };
    let flag = match symbol_arg(call, 2)? {
        Some(word) => DescendantsFlag::parse(&word)?,
        None if depth == Depth::Unbounded => DescendantsFlag::SelfBeforeAfter,
        None => DescendantsFlag::SelfOnly,
    };
    let mut children = vec![member];
    match depth {
        Depth::Level => children.push(compiler.compile_level(arg(call, 1)?)?),
        Depth::Distance => children.push(compiler.compile_integer(arg(call, 1)?)?),
        Depth::Unbounded => {}
    }
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("Descendants", call.ty.clone(), children),
        move |c, ev| {
            let member = c[0].evaluate_member(ev)?;
            let target = match depth {
                Depth::Unbounded => member.depth(),
                Depth::Level => {
                    let level = c[1].evaluate_level(ev)?;
                    if level.hierarchy_unique_name() != member.hierarchy_unique_name() {
                        return Err(CalcError::invalid_argument(
                            "Descendants",
                            format!("level {} is not in the hierarchy of {}", level, member),
                        ));
                    }
                    level.depth()
                }
                Depth::Distance => {
                    let distance = c[1].evaluate_integer(ev)?.unwrap_or(0);
                    let distance = usize::try_from(distance).map_err(|_| {
                        CalcError::invalid_argument("Descendants", "distance must not be negative")
                    })?;
                    member.depth() + distance
                }
            };
            let hierarchy = ev.cube().hierarchy_of(&member).clone();
            let mut out = Vec::new();
            collect_descendants(&hierarchy, &member, target, flag, &mut out);
            Ok(Value::list(ev.collections().from_members(out)?))
        },
    )))
}

/// Pre-order walk of the subtree under `member`
fn collect_descendants(
    hierarchy: &Hierarchy,
    member: &MemberRef,
    target: usize,
    flag: DescendantsFlag,
    out: &mut Vec<MemberRef>,
) {
    let children = hierarchy.children(member);
    let depth = member.depth();
    if flag.includes(depth, target, children.is_empty()) {
        out.push(member.clone());
    }
    if depth >= target && !flag.goes_below() {
        return;
    }
    for child in children {
        collect_descendants(hierarchy, child, target, flag, out);
    }
}

fn compile_drilldown_member(call: &ResolvedFunCall, compiler: &ExpCompiler) -> CalcResult<CalcRef> {
    let set = compiler.compile_list(arg(call, 0)?, false)?;
    let drill = compiler.compile_list(arg(call, 1)?, false)?;
    let recursive = symbol_arg(call, 2)?.is_some();
    Ok(Arc::new(FnCalc::new(
        CalcBase::new("DrilldownMember", call.ty.clone(), vec![set, drill])
            .with_rule(DependencyRule::ButDepends),
        move |c, ev| {
            let set = c[0].evaluate_list(ev)?;
            let drill = c[1].evaluate_list(ev)?;
            if set.arity() != 1 {
                return Err(CalcError::invalid_argument(
                    "DrilldownMember",
                    "only sets of members can be drilled",
                ));
            }
            let targets: HashSet<&MemberRef> = drill.members().iter().collect();
            let cube = ev.cube().clone();
            let mut out = Vec::with_capacity(set.len());
            for (i, member) in set.members().iter().enumerate() {
                ev.check_cancel_or_timeout(i)?;
                drill_down(&cube, member, &targets, recursive, true, &mut out);
            }
            Ok(Value::list(ev.collections().from_members(out)?))
        },
    )))
}

/// Emit `member`, then its children if it is a drill target
fn drill_down(
    cube: &Cube,
    member: &MemberRef,
    targets: &HashSet<&MemberRef>,
    recursive: bool,
    top: bool,
    out: &mut Vec<MemberRef>,
) {
    out.push(member.clone());
    if !(top || recursive) || !targets.contains(member) {
        return;
    }
    for child in cube.hierarchy_of(member).children(member) {
        drill_down(cube, child, targets, recursive, false, out);
    }
}
