//! Hierarchy dependency analysis
//!
//! A calc depends on a hierarchy if its result may change when the current
//! member of that hierarchy changes. Callers use this to decide whether a
//! cached result computed under one context is valid under another.

use crate::calc::{Calc, CalcRef};
use mdxcalc_model::{Cube, Hierarchy, HierarchyRef};
use serde::Serialize;

/// How a calc derives its dependencies from its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DependencyRule {
    /// Depends if any child depends
    AnyChild,
    /// The first child is a set that fixes the context for the rest
    AllButFirst,
    /// Depends unless a child's type pins the hierarchy
    ButDepends,
    /// Depends on the hierarchy the first child yields
    CurrentOf,
    /// Reads the current cell, so depends on every hierarchy
    Always,
    Never,
}

impl DependencyRule {
    pub fn depends(self, children: &[CalcRef], hierarchy: &Hierarchy) -> bool {
        match self {
            Self::AnyChild => any_depends(children, hierarchy),
            Self::AllButFirst => any_depends_but_first(children, hierarchy),
            Self::ButDepends => but_depends(children, hierarchy),
            Self::CurrentOf => children.first().is_some_and(|c| {
                c.depends_on(hierarchy) || c.get_type().uses_hierarchy(hierarchy, false)
            }),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Whether any of `calcs` depends on `hierarchy`
pub fn any_depends(calcs: &[CalcRef], hierarchy: &Hierarchy) -> bool {
    calcs.iter().any(|c| c.depends_on(hierarchy))
}

/// Dependency of a calc whose first child is a set iterated over.
///
/// The set itself may depend on the hierarchy. If it does not, but each of
/// its tuples definitely sets the hierarchy, the remaining children are
/// evaluated with that hierarchy pinned and cannot depend on it.
pub fn any_depends_but_first(calcs: &[CalcRef], hierarchy: &Hierarchy) -> bool {
    let Some((first, rest)) = calcs.split_first() else {
        return false;
    };
    if first.depends_on(hierarchy) {
        return true;
    }
    if first.get_type().uses_hierarchy(hierarchy, true) {
        return false;
    }
    any_depends(rest, hierarchy)
}

/// Dependency of a calc that evaluates the cell at a modified context.
///
/// The cell depends on every hierarchy, except those a child definitely
/// overrides. A child that itself depends on the hierarchy wins.
pub fn but_depends(calcs: &[CalcRef], hierarchy: &Hierarchy) -> bool {
    let mut result = true;
    for calc in calcs {
        if calc.depends_on(hierarchy) {
            return true;
        }
        if calc.get_type().uses_hierarchy(hierarchy, true) {
            result = false;
        }
    }
    result
}

/// Every hierarchy of `cube` that `calc` depends on, in ordinal order
pub fn dependent_hierarchies(calc: &dyn Calc, cube: &Cube) -> Vec<HierarchyRef> {
    cube.hierarchies()
        .iter()
        .filter(|h| calc.depends_on(h))
        .cloned()
        .collect()
}
