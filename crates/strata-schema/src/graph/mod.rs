mod builder;

pub(crate) use builder::build_graph;

use crate::{
    descriptor::MemberDescriptor,
    manager::DataManager,
    types::{DependencyTag, ROOT_TYPE, TypeKey},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

///
/// TypeId / ManagerId
///
/// Stable arena handles. Edges and ownership are stored as handles, never as
/// live references, so the graph has no ownership cycles.
///

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct TypeId(pub(crate) u32);

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct ManagerId(pub(crate) u32);

impl TypeId {
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl ManagerId {
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

///
/// DependencyMap
///
/// Ordered-insertion mapping from target identity to the set of reasons the
/// dependency exists. Lookup is linear; dependency fan-out per node is small.
///

#[derive(Clone, Debug, Default)]
pub struct DependencyMap {
    entries: Vec<(TypeKey, BTreeSet<DependencyTag>)>,
}

impl DependencyMap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, target: TypeKey, tag: DependencyTag) {
        if let Some((_, tags)) = self.entries.iter_mut().find(|(key, _)| *key == target) {
            tags.insert(tag);
        } else {
            self.entries.push((target, BTreeSet::from([tag])));
        }
    }

    #[must_use]
    pub fn get(&self, target: TypeKey) -> Option<&BTreeSet<DependencyTag>> {
        self.entries
            .iter()
            .find(|(key, _)| *key == target)
            .map(|(_, tags)| tags)
    }

    #[must_use]
    pub fn contains(&self, target: TypeKey) -> bool {
        self.get(target).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeKey, &BTreeSet<DependencyTag>)> {
        self.entries.iter().map(|(key, tags)| (*key, tags))
    }

    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Targets carrying the given tag, insertion order.
    pub fn tagged(&self, tag: DependencyTag) -> impl Iterator<Item = TypeKey> + '_ {
        self.entries
            .iter()
            .filter(move |(_, tags)| tags.contains(&tag))
            .map(|(key, _)| *key)
    }

    /// The single target carrying the given tag, if exactly one exists.
    #[must_use]
    pub fn single_tagged(&self, tag: DependencyTag) -> Option<TypeKey> {
        let mut iter = self.tagged(tag);
        let first = iter.next()?;
        if iter.next().is_some() { None } else { Some(first) }
    }
}

///
/// TypeNode
///

#[derive(Clone, Debug)]
pub struct TypeNode {
    pub ident: TypeKey,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub is_generic: bool,
    pub force_inherit: bool,

    /// Interface constraint of the first generic parameter, generics only.
    pub constraint: Option<TypeKey>,

    pub dependencies: DependencyMap,

    /// Resolved owner. `None` only for the seeded root marker when no
    /// manager claims it.
    pub owner: Option<ManagerId>,

    /// Members carried forward for pyramid/table construction.
    pub members: Vec<MemberDescriptor>,
}

impl TypeNode {
    /// Key under which this type is matched against manager ownership:
    /// itself, or the interface constraint for a generic type.
    #[must_use]
    pub fn lookup_key(&self) -> TypeKey {
        if self.is_generic {
            self.constraint.unwrap_or(self.ident)
        } else {
            self.ident
        }
    }
}

///
/// ManagerNode
///

#[derive(Clone)]
pub struct ManagerNode {
    pub handle: Arc<dyn DataManager>,
    pub is_placeholder: bool,

    /// identity -> node for every owned type. A manager with no owned types
    /// has left the active set.
    pub owned: BTreeMap<TypeKey, TypeId>,

    /// Union of owned types' dependencies on types owned elsewhere.
    /// Recomputed after merging.
    pub dependencies: DependencyMap,
}

impl std::fmt::Debug for ManagerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerNode")
            .field("is_placeholder", &self.is_placeholder)
            .field("owned", &self.owned)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl ManagerNode {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.handle.name()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.owned.is_empty()
    }

    /// True when the only owned type is the universal root marker.
    #[must_use]
    pub fn owns_only_root(&self) -> bool {
        self.owned.len() == 1 && self.owned.contains_key(ROOT_TYPE)
    }
}

///
/// Graph
///
/// Arena of type and manager nodes produced by the dependency graph builder
/// and mutated only by the merge phase. Immutable once the build completes.
///

#[derive(Debug)]
pub struct Graph {
    pub(crate) types: Vec<TypeNode>,
    pub(crate) type_index: BTreeMap<TypeKey, TypeId>,
    pub(crate) managers: Vec<ManagerNode>,
    pub(crate) root: TypeId,
}

impl Graph {
    #[must_use]
    pub fn type_node(&self, id: TypeId) -> &TypeNode {
        &self.types[id.index()]
    }

    #[must_use]
    pub fn manager_node(&self, id: ManagerId) -> &ManagerNode {
        &self.managers[id.index()]
    }

    #[must_use]
    pub fn type_id(&self, key: TypeKey) -> Option<TypeId> {
        self.type_index.get(key).copied()
    }

    #[must_use]
    pub const fn root(&self) -> TypeId {
        self.root
    }

    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// All type ids, arena order (root first).
    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        (0..self.types.len()).map(|i| TypeId(i as u32))
    }

    /// Ids of managers still owning at least one type.
    pub fn active_managers(&self) -> impl Iterator<Item = ManagerId> + '_ {
        (0..self.managers.len())
            .map(|i| ManagerId(i as u32))
            .filter(|id| self.managers[id.index()].is_active())
    }

    /// Owner of the type a key resolves to, if both exist.
    #[must_use]
    pub fn owner_of(&self, key: TypeKey) -> Option<ManagerId> {
        self.type_id(key).and_then(|id| self.type_node(id).owner)
    }

    /// Recompute every manager's external dependency set: the union of its
    /// owned types' dependencies, excluding dependencies satisfied by a type
    /// the same manager owns.
    pub(crate) fn recompute_manager_dependencies(&mut self) {
        for mid in 0..self.managers.len() {
            let mut deps = DependencyMap::new();
            let owned: Vec<TypeId> = self.managers[mid].owned.values().copied().collect();

            for tid in owned {
                let node = &self.types[tid.index()];
                for (target, tags) in node.dependencies.iter() {
                    if self.managers[mid].owned.contains_key(target) {
                        continue;
                    }
                    for tag in tags {
                        deps.insert(target, *tag);
                    }
                }
            }

            // manual dependencies declared by the manager itself survive merging
            let manual: Vec<TypeKey> = self.managers[mid].handle.manual_dependencies();
            for target in manual {
                if !self.managers[mid].owned.contains_key(target) {
                    deps.insert(target, DependencyTag::Manual);
                }
            }

            self.managers[mid].dependencies = deps;
        }
    }
}
