//! Dimensional catalog objects
//!
//! A `Cube` owns an ordered list of dimensions; each dimension owns one or
//! more hierarchies; each hierarchy owns its levels and members. Every
//! hierarchy carries an ordinal that is unique within its cube, which the
//! evaluator uses to index its current-member context.
//!
//! All objects are immutable once built and shared through `Arc`. Identity
//! is the unique name.

use crate::error::{CatalogError, CatalogResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub type DimensionRef = Arc<Dimension>;
pub type HierarchyRef = Arc<Hierarchy>;
pub type LevelRef = Arc<Level>;
pub type MemberRef = Arc<Member>;

/// Kind of dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DimensionType {
    Standard,
    Time,
    Measures,
}

/// Kind of member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberType {
    Regular,
    /// The single top member of a hierarchy that has an 'all' level
    All,
    Measure,
}

macro_rules! identity_by_unique_name {
    ($ty:ty) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.unique_name == other.unique_name
            }
        }

        impl Eq for $ty {}

        impl Hash for $ty {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.unique_name.hash(state);
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.unique_name)
            }
        }
    };
}

/// A dimension of a cube
#[derive(Debug)]
pub struct Dimension {
    name: Arc<str>,
    unique_name: Arc<str>,
    dimension_type: DimensionType,
    hierarchies: Vec<HierarchyRef>,
}

identity_by_unique_name!(Dimension);

impl Dimension {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn dimension_type(&self) -> DimensionType {
        self.dimension_type
    }

    pub fn hierarchies(&self) -> &[HierarchyRef] {
        &self.hierarchies
    }

    pub fn is_measures(&self) -> bool {
        self.dimension_type == DimensionType::Measures
    }

    /// The hierarchy a bare reference to this dimension denotes.
    ///
    /// Returns `None` when the dimension has several hierarchies, in which
    /// case the reference is ambiguous.
    pub fn single_hierarchy(&self) -> Option<&HierarchyRef> {
        match self.hierarchies.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// A hierarchy: an ordered tree of members arranged in levels
#[derive(Debug)]
pub struct Hierarchy {
    name: Arc<str>,
    unique_name: Arc<str>,
    dimension_unique_name: Arc<str>,
    dimension_type: DimensionType,
    ordinal: usize,
    has_all: bool,
    levels: Vec<LevelRef>,
    /// All members in hierarchical (pre-order) order
    members: Vec<MemberRef>,
    roots: Vec<MemberRef>,
    children: HashMap<Arc<str>, Vec<MemberRef>>,
    default_member: MemberRef,
}

identity_by_unique_name!(Hierarchy);

impl Hierarchy {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn dimension_unique_name(&self) -> &str {
        &self.dimension_unique_name
    }

    pub fn dimension_type(&self) -> DimensionType {
        self.dimension_type
    }

    /// Position of this hierarchy within its cube
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn has_all(&self) -> bool {
        self.has_all
    }

    pub fn levels(&self) -> &[LevelRef] {
        &self.levels
    }

    pub fn level(&self, name: &str) -> Option<&LevelRef> {
        self.levels
            .iter()
            .find(|l| l.name() == name || l.unique_name() == name)
    }

    pub fn members(&self) -> &[MemberRef] {
        &self.members
    }

    pub fn root_members(&self) -> &[MemberRef] {
        &self.roots
    }

    pub fn children(&self, member: &Member) -> &[MemberRef] {
        self.children
            .get(member.unique_name())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Members of a level, in hierarchical order
    pub fn level_members(&self, level: &Level) -> Vec<MemberRef> {
        self.members
            .iter()
            .filter(|m| m.level().unique_name() == level.unique_name())
            .cloned()
            .collect()
    }

    pub fn default_member(&self) -> &MemberRef {
        &self.default_member
    }

    pub fn lookup_member(&self, unique_name: &str) -> Option<&MemberRef> {
        self.members.iter().find(|m| m.unique_name() == unique_name)
    }
}

/// A level within a hierarchy
#[derive(Debug)]
pub struct Level {
    name: Arc<str>,
    unique_name: Arc<str>,
    hierarchy_unique_name: Arc<str>,
    hierarchy_ordinal: usize,
    depth: usize,
    is_all: bool,
}

identity_by_unique_name!(Level);

impl Level {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn hierarchy_unique_name(&self) -> &str {
        &self.hierarchy_unique_name
    }

    pub fn hierarchy_ordinal(&self) -> usize {
        self.hierarchy_ordinal
    }

    /// Distance from the top level (0 for the top level)
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_all(&self) -> bool {
        self.is_all
    }
}

/// A member: a single coordinate on one hierarchy
#[derive(Debug)]
pub struct Member {
    name: Arc<str>,
    unique_name: Arc<str>,
    level: LevelRef,
    parent: Option<MemberRef>,
    member_type: MemberType,
    ordinal: usize,
}

identity_by_unique_name!(Member);

impl Member {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    /// Shared handle to the unique name, cheap to clone into cache keys
    pub fn unique_name_arc(&self) -> &Arc<str> {
        &self.unique_name
    }

    pub fn level(&self) -> &LevelRef {
        &self.level
    }

    pub fn parent(&self) -> Option<&MemberRef> {
        self.parent.as_ref()
    }

    pub fn member_type(&self) -> MemberType {
        self.member_type
    }

    pub fn is_all(&self) -> bool {
        self.member_type == MemberType::All
    }

    pub fn is_measure(&self) -> bool {
        self.member_type == MemberType::Measure
    }

    pub fn depth(&self) -> usize {
        self.level.depth()
    }

    pub fn hierarchy_unique_name(&self) -> &str {
        self.level.hierarchy_unique_name()
    }

    pub fn hierarchy_ordinal(&self) -> usize {
        self.level.hierarchy_ordinal()
    }

    /// Position of this member in its hierarchy's pre-order traversal
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Whether this member is `other` or one of its descendants
    pub fn is_child_or_equal_to(&self, other: &Member) -> bool {
        let mut current = Some(self);
        while let Some(m) = current {
            if m == other {
                return true;
            }
            if m.depth() < other.depth() {
                return false;
            }
            current = m.parent().map(|p| p.as_ref());
        }
        false
    }

    /// Ancestors from parent up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = &MemberRef> {
        std::iter::successors(self.parent(), |m| (*m).parent())
    }
}

/// An immutable cube: the catalog the engine evaluates against
#[derive(Debug)]
pub struct Cube {
    name: String,
    dimensions: Vec<DimensionRef>,
    hierarchies: Vec<HierarchyRef>,
    members: IndexMap<Arc<str>, MemberRef>,
}

impl Cube {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> &[DimensionRef] {
        &self.dimensions
    }

    /// All hierarchies, indexed by ordinal
    pub fn hierarchies(&self) -> &[HierarchyRef] {
        &self.hierarchies
    }

    pub fn hierarchy_at(&self, ordinal: usize) -> Option<&HierarchyRef> {
        self.hierarchies.get(ordinal)
    }

    /// Find a hierarchy by unique name (`[Time]`, `[Time].[Fiscal]`)
    pub fn hierarchy(&self, unique_name: &str) -> CatalogResult<&HierarchyRef> {
        self.hierarchies
            .iter()
            .find(|h| h.unique_name() == unique_name)
            .ok_or_else(|| CatalogError::HierarchyNotFound(unique_name.to_string()))
    }

    /// Find a dimension by name or unique name
    pub fn dimension(&self, name: &str) -> CatalogResult<&DimensionRef> {
        self.dimensions
            .iter()
            .find(|d| d.name() == name || d.unique_name() == name)
            .ok_or_else(|| CatalogError::DimensionNotFound(name.to_string()))
    }

    /// The hierarchy a member belongs to
    pub fn hierarchy_of(&self, member: &Member) -> &HierarchyRef {
        // Members are only created by CubeBuilder, which assigns ordinals
        // from this cube's hierarchy list.
        &self.hierarchies[member.hierarchy_ordinal()]
    }

    pub fn lookup_member(&self, unique_name: &str) -> CatalogResult<&MemberRef> {
        self.members
            .get(unique_name)
            .ok_or_else(|| CatalogError::MemberNotFound(unique_name.to_string()))
    }

    pub fn measures_hierarchy(&self) -> Option<&HierarchyRef> {
        self.hierarchies
            .iter()
            .find(|h| h.dimension_type() == DimensionType::Measures)
    }

    /// The default member of every hierarchy, indexed by ordinal
    pub fn default_members(&self) -> Vec<MemberRef> {
        self.hierarchies
            .iter()
            .map(|h| h.default_member().clone())
            .collect()
    }
}

#[derive(Debug)]
struct MemberDraft {
    name: String,
    unique_name: String,
    parent: Option<usize>,
    depth: usize,
    member_type: MemberType,
}

#[derive(Debug)]
struct HierarchyDraft {
    name: String,
    unique_name: String,
    has_all: bool,
    levels: Vec<String>,
    members: Vec<MemberDraft>,
    index: HashMap<String, usize>,
}

impl HierarchyDraft {
    fn add_member(
        &mut self,
        parent: Option<usize>,
        name: &str,
        member_type: MemberType,
    ) -> CatalogResult<()> {
        let (depth, prefix) = match parent {
            Some(p) => (
                self.members[p].depth + 1,
                if self.members[p].member_type == MemberType::All {
                    self.unique_name.clone()
                } else {
                    self.members[p].unique_name.clone()
                },
            ),
            None => (0, self.unique_name.clone()),
        };
        if depth >= self.levels.len() {
            return Err(CatalogError::LevelOutOfRange {
                hierarchy: self.unique_name.clone(),
                member: name.to_string(),
                levels: self.levels.len(),
                depth,
            });
        }
        let unique_name = format!("{}.[{}]", prefix, name);
        if self.index.contains_key(&unique_name) {
            return Err(CatalogError::Duplicate(unique_name));
        }
        self.index.insert(unique_name.clone(), self.members.len());
        self.members.push(MemberDraft {
            name: name.to_string(),
            unique_name,
            parent,
            depth,
            member_type,
        });
        Ok(())
    }
}

#[derive(Debug)]
struct DimensionDraft {
    name: String,
    dimension_type: DimensionType,
    hierarchies: Vec<HierarchyDraft>,
}

/// Incrementally assembles a `Cube`
///
/// ```ignore
/// let mut builder = CubeBuilder::new("Sales");
/// builder.dimension("Time", DimensionType::Time);
/// builder.hierarchy("Time", None, true, &["Year", "Quarter"])?;
/// builder.member("[Time]", None, "1997")?;
/// builder.member("[Time]", Some("[Time].[1997]"), "Q1")?;
/// builder.measure("Unit Sales")?;
/// let cube = builder.build()?;
/// ```
#[derive(Debug)]
pub struct CubeBuilder {
    name: String,
    dimensions: IndexMap<String, DimensionDraft>,
}

impl CubeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimensions: IndexMap::new(),
        }
    }

    /// Declare a dimension; declaring an existing dimension is a no-op
    pub fn dimension(&mut self, name: &str, dimension_type: DimensionType) -> &mut Self {
        self.dimensions
            .entry(name.to_string())
            .or_insert_with(|| DimensionDraft {
                name: name.to_string(),
                dimension_type,
                hierarchies: Vec::new(),
            });
        self
    }

    /// Declare a hierarchy of `dimension`.
    ///
    /// A hierarchy without a name is the dimension's default hierarchy and
    /// shares its unique name (`[Time]`); a named one is `[Time].[Fiscal]`.
    pub fn hierarchy(
        &mut self,
        dimension: &str,
        name: Option<&str>,
        has_all: bool,
        levels: &[&str],
    ) -> CatalogResult<&mut Self> {
        let dim = self
            .dimensions
            .get_mut(dimension)
            .ok_or_else(|| CatalogError::DimensionNotFound(dimension.to_string()))?;
        let unique_name = match name {
            Some(n) => format!("[{}].[{}]", dimension, n),
            None => format!("[{}]", dimension),
        };
        if dim.hierarchies.iter().any(|h| h.unique_name == unique_name) {
            return Err(CatalogError::Duplicate(unique_name));
        }

        let display = name.unwrap_or(dimension);
        let mut level_names = Vec::with_capacity(levels.len() + 1);
        if has_all {
            level_names.push("(All)".to_string());
        }
        level_names.extend(levels.iter().map(|l| l.to_string()));

        let mut draft = HierarchyDraft {
            name: display.to_string(),
            unique_name,
            has_all,
            levels: level_names,
            members: Vec::new(),
            index: HashMap::new(),
        };
        if has_all {
            draft.add_member(None, &format!("All {}s", display), MemberType::All)?;
        }
        dim.hierarchies.push(draft);
        Ok(self)
    }

    /// Add a member under `parent` (a unique name), or at the top level.
    ///
    /// In a hierarchy with an 'all' level, top-level members become children
    /// of the all member.
    pub fn member(
        &mut self,
        hierarchy: &str,
        parent: Option<&str>,
        name: &str,
    ) -> CatalogResult<&mut Self> {
        let draft = self.hierarchy_draft(hierarchy)?;
        let parent_index = match parent {
            Some(p) => Some(
                *draft
                    .index
                    .get(p)
                    .ok_or_else(|| CatalogError::MemberNotFound(p.to_string()))?,
            ),
            None if draft.has_all => Some(0),
            None => None,
        };
        draft.add_member(parent_index, name, MemberType::Regular)?;
        Ok(self)
    }

    /// Add a measure, creating the `[Measures]` dimension on first use
    pub fn measure(&mut self, name: &str) -> CatalogResult<&mut Self> {
        if !self.dimensions.contains_key("Measures") {
            self.dimension("Measures", DimensionType::Measures);
            self.hierarchy("Measures", None, false, &["MeasuresLevel"])?;
        }
        let draft = self.hierarchy_draft("[Measures]")?;
        draft.add_member(None, name, MemberType::Measure)?;
        Ok(self)
    }

    fn hierarchy_draft(&mut self, unique_name: &str) -> CatalogResult<&mut HierarchyDraft> {
        self.dimensions
            .values_mut()
            .flat_map(|d| d.hierarchies.iter_mut())
            .find(|h| h.unique_name == unique_name)
            .ok_or_else(|| CatalogError::HierarchyNotFound(unique_name.to_string()))
    }

    pub fn build(self) -> CatalogResult<Arc<Cube>> {
        let mut dimensions = Vec::with_capacity(self.dimensions.len());
        let mut hierarchies = Vec::new();
        let mut members = IndexMap::new();

        for (_, dim_draft) in self.dimensions {
            let dimension_unique: Arc<str> = format!("[{}]", dim_draft.name).into();
            let mut dim_hierarchies = Vec::with_capacity(dim_draft.hierarchies.len());
            for h_draft in dim_draft.hierarchies {
                let hierarchy = build_hierarchy(
                    h_draft,
                    &dimension_unique,
                    dim_draft.dimension_type,
                    hierarchies.len(),
                )?;
                for m in hierarchy.members() {
                    members.insert(m.unique_name_arc().clone(), m.clone());
                }
                hierarchies.push(hierarchy.clone());
                dim_hierarchies.push(hierarchy);
            }
            dimensions.push(Arc::new(Dimension {
                name: dim_draft.name.as_str().into(),
                unique_name: dimension_unique,
                dimension_type: dim_draft.dimension_type,
                hierarchies: dim_hierarchies,
            }));
        }

        log::debug!(
            "built cube '{}' with {} hierarchies and {} members",
            self.name,
            hierarchies.len(),
            members.len()
        );

        Ok(Arc::new(Cube {
            name: self.name,
            dimensions,
            hierarchies,
            members,
        }))
    }
}

fn build_hierarchy(
    draft: HierarchyDraft,
    dimension_unique_name: &Arc<str>,
    dimension_type: DimensionType,
    ordinal: usize,
) -> CatalogResult<HierarchyRef> {
    let hierarchy_unique: Arc<str> = draft.unique_name.as_str().into();
    let levels: Vec<LevelRef> = draft
        .levels
        .iter()
        .enumerate()
        .map(|(depth, name)| {
            Arc::new(Level {
                name: name.as_str().into(),
                unique_name: format!("{}.[{}]", hierarchy_unique, name).into(),
                hierarchy_unique_name: hierarchy_unique.clone(),
                hierarchy_ordinal: ordinal,
                depth,
                is_all: draft.has_all && depth == 0,
            })
        })
        .collect();

    let n = draft.members.len();
    let mut child_index: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut root_index = Vec::new();
    for (i, m) in draft.members.iter().enumerate() {
        match m.parent {
            Some(p) => child_index[p].push(i),
            None => root_index.push(i),
        }
    }

    // Pre-order walk; parents are always created before their children.
    let mut built: Vec<Option<MemberRef>> = vec![None; n];
    let mut ordered: Vec<MemberRef> = Vec::with_capacity(n);
    let mut stack: Vec<usize> = root_index.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        let d = &draft.members[i];
        let member = Arc::new(Member {
            name: d.name.as_str().into(),
            unique_name: d.unique_name.as_str().into(),
            level: levels[d.depth].clone(),
            parent: d.parent.and_then(|p| built[p].clone()),
            member_type: d.member_type,
            ordinal: ordered.len(),
        });
        built[i] = Some(member.clone());
        ordered.push(member);
        stack.extend(child_index[i].iter().rev().copied());
    }

    let mut children: HashMap<Arc<str>, Vec<MemberRef>> = HashMap::new();
    for m in &ordered {
        if let Some(p) = m.parent() {
            children
                .entry(p.unique_name_arc().clone())
                .or_default()
                .push(m.clone());
        }
    }
    let roots: Vec<MemberRef> = ordered.iter().filter(|m| m.parent().is_none()).cloned().collect();
    let default_member = roots
        .first()
        .cloned()
        .ok_or_else(|| CatalogError::EmptyHierarchy(draft.unique_name.clone()))?;

    Ok(Arc::new(Hierarchy {
        name: draft.name.as_str().into(),
        unique_name: hierarchy_unique,
        dimension_unique_name: dimension_unique_name.clone(),
        dimension_type,
        ordinal,
        has_all: draft.has_all,
        levels,
        members: ordered,
        roots,
        children,
        default_member,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_cube() -> Arc<Cube> {
        let mut b = CubeBuilder::new("Sales");
        b.dimension("Time", DimensionType::Time);
        b.hierarchy("Time", None, true, &["Year", "Quarter"]).unwrap();
        b.member("[Time]", None, "1997").unwrap();
        b.member("[Time]", Some("[Time].[1997]"), "Q1").unwrap();
        b.member("[Time]", Some("[Time].[1997]"), "Q2").unwrap();
        b.member("[Time]", None, "1998").unwrap();
        b.measure("Unit Sales").unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_unique_names_and_order() {
        let cube = sample_cube();
        let time = cube.hierarchy("[Time]").unwrap();
        let names: Vec<&str> = time.members().iter().map(|m| m.unique_name()).collect();
        assert_eq!(
            names,
            vec![
                "[Time].[All Times]",
                "[Time].[1997]",
                "[Time].[1997].[Q1]",
                "[Time].[1997].[Q2]",
                "[Time].[1998]",
            ]
        );
        assert!(time.default_member().is_all());
    }

    #[test]
    fn test_navigation() {
        let cube = sample_cube();
        let time = cube.hierarchy("[Time]").unwrap();
        let y1997 = cube.lookup_member("[Time].[1997]").unwrap();
        let q1 = cube.lookup_member("[Time].[1997].[Q1]").unwrap();

        assert_eq!(time.children(y1997).len(), 2);
        assert_eq!(q1.parent().unwrap().as_ref(), y1997.as_ref());
        assert!(q1.is_child_or_equal_to(y1997));
        assert!(!y1997.is_child_or_equal_to(q1));
        assert_eq!(q1.ancestors().count(), 2);

        let quarter = time.level("Quarter").unwrap();
        assert_eq!(time.level_members(quarter).len(), 2);
    }

    #[test]
    fn test_hierarchy_ordinals() {
        let cube = sample_cube();
        for (i, h) in cube.hierarchies().iter().enumerate() {
            assert_eq!(h.ordinal(), i);
        }
        let measures = cube.measures_hierarchy().unwrap();
        assert!(!measures.has_all());
        assert!(measures.default_member().is_measure());
        assert_eq!(cube.default_members().len(), cube.hierarchies().len());
    }

    #[test]
    fn test_member_too_deep_is_rejected() {
        let mut b = CubeBuilder::new("Sales");
        b.dimension("Store", DimensionType::Standard);
        b.hierarchy("Store", None, false, &["Country"]).unwrap();
        b.member("[Store]", None, "USA").unwrap();
        let err = b.member("[Store]", Some("[Store].[USA]"), "CA").unwrap_err();
        assert!(matches!(err, CatalogError::LevelOutOfRange { depth: 1, .. }));
    }

    #[test]
    fn test_unknown_lookups() {
        let cube = sample_cube();
        assert_eq!(
            cube.lookup_member("[Time].[2001]").unwrap_err(),
            CatalogError::MemberNotFound("[Time].[2001]".to_string())
        );
        assert!(cube.hierarchy("[Product]").is_err());
    }
}
