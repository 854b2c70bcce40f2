use crate::{
    config::StorageConfig,
    descriptor::Registry,
    error::BuildError,
    graph::{DependencyMap, Graph, ManagerId, ManagerNode, TypeId, TypeNode},
    trace::{BuildTraceEvent, Tracer},
    types::{DependencyTag, ROOT_TYPE, TypeKey},
};
use std::collections::BTreeMap;

/// Build the full type/manager dependency graph from the registered
/// descriptors. Fail-fast: the first structural violation aborts the build.
pub(crate) fn build_graph(
    registry: &Registry,
    config: &StorageConfig,
    tracer: Tracer<'_>,
) -> Result<Graph, BuildError> {
    let mut builder = GraphBuilder {
        registry,
        config,
        tracer,
        types: Vec::new(),
        type_index: BTreeMap::new(),
        managers: Vec::new(),
        claims: BTreeMap::new(),
        path: Vec::new(),
    };

    let root = builder.seed_root();
    builder.register_managers(root)?;

    for key in registry.type_keys() {
        builder.ensure_type(key)?;
    }

    let mut graph = Graph {
        types: builder.types,
        type_index: builder.type_index,
        managers: builder.managers,
        root,
    };
    graph.recompute_manager_dependencies();

    Ok(graph)
}

///
/// GraphBuilder
///

struct GraphBuilder<'a> {
    registry: &'a Registry,
    config: &'a StorageConfig,
    tracer: Tracer<'a>,

    types: Vec<TypeNode>,
    type_index: BTreeMap<TypeKey, TypeId>,
    managers: Vec<ManagerNode>,

    /// lookup key -> manager that will own types resolving to that key.
    /// Seeded from each manager's main type, extended by placeholder
    /// synthesis so one placeholder serves everything behind one key.
    claims: BTreeMap<TypeKey, ManagerId>,

    /// Chain of identifiers currently being analyzed, for error origins.
    path: Vec<TypeKey>,
}

impl GraphBuilder<'_> {
    fn origin(&self) -> String {
        if self.path.is_empty() {
            "registry".to_string()
        } else {
            self.path.join(" -> ")
        }
    }

    /// Seed the universal root marker before anything else. It is an
    /// interface with no dependencies and no owner until a manager claims it.
    fn seed_root(&mut self) -> TypeId {
        let id = TypeId(0);
        self.types.push(TypeNode {
            ident: ROOT_TYPE,
            is_interface: true,
            is_abstract: true,
            is_generic: false,
            force_inherit: false,
            constraint: None,
            dependencies: DependencyMap::new(),
            owner: None,
            members: Vec::new(),
        });
        self.type_index.insert(ROOT_TYPE, id);
        id
    }

    /// Register every explicit manager: a one-entry main-type claim plus its
    /// manually declared dependencies, each of which must be storable.
    fn register_managers(&mut self, root: TypeId) -> Result<(), BuildError> {
        let registrations: Vec<_> = self.registry.managers().to_vec();

        for handle in registrations {
            let name = handle.name();
            let main = handle.main_type();

            let mut dependencies = DependencyMap::new();
            for manual in handle.manual_dependencies() {
                if !self.registry.contains(manual) && manual != ROOT_TYPE {
                    return Err(BuildError::type_not_storable(
                        name,
                        format!("manual dependency '{manual}' of manager '{name}' is not a storable type"),
                    ));
                }
                dependencies.insert(manual, DependencyTag::Manual);
            }

            let id = ManagerId(self.managers.len() as u32);
            self.managers.push(ManagerNode {
                handle,
                is_placeholder: false,
                owned: BTreeMap::new(),
                dependencies,
            });
            self.claims.insert(main, id);

            self.tracer.emit(BuildTraceEvent::ManagerRegistered {
                name: name.to_string(),
                placeholder: false,
            });

            if main == ROOT_TYPE {
                // the root is already seeded, so the claim resolves here
                self.assign_owner(root, id);
            } else {
                self.ensure_type(main)?;
            }
        }

        Ok(())
    }

    /// Depth-first, memoized registration of one storable type and its whole
    /// dependency cone.
    fn ensure_type(&mut self, key: TypeKey) -> Result<TypeId, BuildError> {
        if let Some(id) = self.type_index.get(key) {
            return Ok(*id);
        }

        let Some(desc) = self.registry.get(key).cloned() else {
            return Err(BuildError::type_not_storable(
                self.origin(),
                format!("type '{key}' is referenced but not registered as storable"),
            ));
        };

        self.path.push(key);

        if desc.is_generic && !desc.is_abstract {
            let err = BuildError::generic_not_abstract(
                self.origin(),
                format!("generic type '{key}' must be abstract"),
            );
            self.path.pop();
            return Err(err);
        }

        // register the node before following edges so a type is analyzed
        // only once and self-references terminate
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeNode {
            ident: desc.ident,
            is_interface: desc.is_interface,
            is_abstract: desc.is_abstract,
            is_generic: desc.is_generic,
            force_inherit: desc.force_inherit,
            constraint: None,
            dependencies: DependencyMap::new(),
            owner: None,
            members: desc.members.clone(),
        });
        self.type_index.insert(key, id);

        let result = self.resolve_edges(id, &desc);
        self.path.pop();
        result?;

        self.resolve_ownership(id)?;

        self.tracer.emit(BuildTraceEvent::TypeRegistered {
            ident: key,
            dependencies: self.types[id.index()].dependencies.len(),
        });

        Ok(id)
    }

    fn resolve_edges(
        &mut self,
        id: TypeId,
        desc: &crate::descriptor::TypeDescriptor,
    ) -> Result<(), BuildError> {
        let key = desc.ident;

        // generic parameter constraint: exactly one storable interface
        if desc.is_generic {
            let candidates: Vec<TypeKey> = desc
                .constraints
                .iter()
                .copied()
                .filter(|candidate| {
                    self.registry
                        .get(candidate)
                        .is_some_and(|d| d.is_interface)
                        || *candidate == ROOT_TYPE
                })
                .collect();

            let constraint = match candidates.as_slice() {
                [] => {
                    return Err(BuildError::type_not_storable(
                        self.origin(),
                        format!(
                            "generic type '{key}' has no storable interface constraint on its first parameter"
                        ),
                    ));
                }
                [single] => *single,
                many => {
                    return Err(BuildError::type_too_much_storable(
                        self.origin(),
                        format!(
                            "generic type '{key}' has {} storable interface constraints, expected exactly one",
                            many.len()
                        ),
                    ));
                }
            };

            self.types[id.index()].constraint = Some(constraint);
            self.types[id.index()]
                .dependencies
                .insert(constraint, DependencyTag::Constraint);
            self.ensure_type(constraint)?;
        }

        // parent edge: interfaces and generic abstracts only
        if let Some(base) = desc.base {
            let Some(base_desc) = self.registry.get(base) else {
                return Err(BuildError::type_not_storable(
                    self.origin(),
                    format!("base type '{base}' of '{key}' is not a storable type"),
                ));
            };

            if base_desc.is_interface || (base_desc.is_abstract && base_desc.is_generic) {
                self.types[id.index()]
                    .dependencies
                    .insert(base, DependencyTag::Parent);
                self.ensure_type(base)?;
            } else if base_desc.is_abstract {
                return Err(BuildError::parent_not_abstract(
                    self.origin(),
                    format!("base type '{base}' of '{key}' is abstract but not generic"),
                ));
            }
        }

        // interface edges, excluding ones reached transitively through
        // another recorded interface
        let direct: Vec<TypeKey> = desc
            .interfaces
            .iter()
            .copied()
            .filter(|iface| {
                self.registry.get(iface).is_some_and(|d| d.is_interface) || *iface == ROOT_TYPE
            })
            .collect();

        for (index, &iface) in direct.iter().enumerate() {
            let covered = direct.iter().enumerate().any(|(other_index, &other)| {
                other_index != index && self.interface_closure_contains(other, iface)
            });
            if covered {
                continue;
            }

            self.types[id.index()]
                .dependencies
                .insert(iface, DependencyTag::Interface);
            self.ensure_type(iface)?;
        }

        // every non-root node must reach the root marker; types with no
        // upward edge implement it directly
        let has_upward = {
            let deps = &self.types[id.index()].dependencies;
            deps.tagged(DependencyTag::Parent).next().is_some()
                || deps.tagged(DependencyTag::Interface).next().is_some()
                || deps.tagged(DependencyTag::Constraint).next().is_some()
        };
        if !has_upward && key != ROOT_TYPE {
            self.types[id.index()]
                .dependencies
                .insert(ROOT_TYPE, DependencyTag::Interface);
        }

        // member edges: non-primitive members must be constructible first
        for member in &desc.members {
            if let Some(target) = member.shape.storable_target() {
                self.types[id.index()]
                    .dependencies
                    .insert(target, DependencyTag::Member(member.ident));
                self.ensure_type(target)?;
            }
        }

        Ok(())
    }

    /// True when `iface`'s transitive interface closure contains `needle`.
    fn interface_closure_contains(&self, iface: TypeKey, needle: TypeKey) -> bool {
        let Some(desc) = self.registry.get(iface) else {
            return false;
        };
        desc.interfaces.iter().any(|implemented| {
            *implemented == needle || self.interface_closure_contains(implemented, needle)
        })
    }

    fn assign_owner(&mut self, id: TypeId, manager: ManagerId) {
        let ident = self.types[id.index()].ident;
        self.managers[manager.index()].owned.insert(ident, id);
        self.types[id.index()].owner = Some(manager);
    }

    /// Find or synthesize the manager owning a freshly registered type.
    fn resolve_ownership(&mut self, id: TypeId) -> Result<(), BuildError> {
        let lookup = self.types[id.index()].lookup_key();

        // a manager already owning the lookup key wins
        for index in 0..self.managers.len() {
            if self.managers[index].owned.contains_key(lookup) {
                self.assign_owner(id, ManagerId(index as u32));
                return Ok(());
            }
        }

        // then a registered claim (main type or prior placeholder)
        if let Some(manager) = self.claims.get(lookup).copied() {
            self.assign_owner(id, manager);
            return Ok(());
        }

        // no owner: synthesize a placeholder parametrized by the lookup key
        let Some(factory) = self.config.default_manager.as_ref() else {
            return Err(BuildError::manager_missing(
                self.origin_or(lookup),
                format!("no default manager kind is configured for unclaimed type '{lookup}'"),
            ));
        };
        let Some(handle) = factory(lookup) else {
            return Err(BuildError::manager_instantiation(
                self.origin_or(lookup),
                format!("default manager kind could not be instantiated for '{lookup}'"),
            ));
        };

        let manager = ManagerId(self.managers.len() as u32);
        let name = handle.name();
        self.managers.push(ManagerNode {
            handle,
            is_placeholder: true,
            owned: BTreeMap::new(),
            dependencies: DependencyMap::new(),
        });
        self.claims.insert(lookup, manager);
        self.assign_owner(id, manager);

        self.tracer.emit(BuildTraceEvent::ManagerRegistered {
            name: name.to_string(),
            placeholder: true,
        });

        Ok(())
    }

    fn origin_or(&self, fallback: TypeKey) -> String {
        if self.path.is_empty() {
            fallback.to_string()
        } else {
            self.origin()
        }
    }
}
