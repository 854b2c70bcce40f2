//! Ownership conflict resolution after type ordering.
//!
//! When an interface and a type implementing it ended up owned by different
//! managers, one manager folds into the other. A real, explicitly registered
//! manager is never replaced by a synthesized placeholder.

use crate::{
    graph::{Graph, ManagerId, TypeId},
    trace::{BuildTraceEvent, Tracer},
    types::DependencyTag,
};
use std::collections::BTreeSet;

/// Resolve split interface/implementer ownership, then recompute every
/// manager's external dependency set.
pub(crate) fn merge_managers(graph: &mut Graph, type_order: &[TypeId], tracer: Tracer<'_>) {
    for position in (0..type_order.len()).rev() {
        let current = type_order[position];

        for interface in implemented_interfaces(graph, current) {
            let Some(current_owner) = graph.type_node(current).owner else {
                continue;
            };
            let Some(interface_owner) = graph.type_node(interface).owner else {
                continue;
            };
            if current_owner == interface_owner {
                continue;
            }
            if !is_mergeable(graph, interface, &mut BTreeSet::new()) {
                continue;
            }

            let interface_is_placeholder = graph.manager_node(interface_owner).is_placeholder;
            let current_is_placeholder = graph.manager_node(current_owner).is_placeholder;

            // the implementer joins the interface's manager, except when
            // that would let a placeholder override a real manager; then the
            // interface folds the other way instead
            let (moved, from, to) = if interface_is_placeholder && !current_is_placeholder {
                (interface, interface_owner, current_owner)
            } else {
                (current, current_owner, interface_owner)
            };

            reassign(graph, moved, from, to, tracer);
        }
    }

    graph.recompute_manager_dependencies();
}

/// Interfaces reachable from a type through parent/interface/constraint
/// edges, excluding the universal root marker.
fn implemented_interfaces(graph: &Graph, id: TypeId) -> Vec<TypeId> {
    let mut found = Vec::new();
    let mut visited = BTreeSet::new();
    let mut stack = vec![id];

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }

        for (target, tags) in graph.type_node(current).dependencies.iter() {
            let upward = tags.iter().any(|tag| {
                matches!(
                    tag,
                    DependencyTag::Parent | DependencyTag::Interface | DependencyTag::Constraint
                )
            });
            if !upward {
                continue;
            }

            let Some(target_id) = graph.type_id(target) else {
                continue;
            };
            if graph.type_node(target_id).is_interface
                && target_id != graph.root()
                && !found.contains(&target_id)
            {
                found.push(target_id);
            }
            stack.push(target_id);
        }
    }

    found
}

/// Whether a type's ownership chain may be folded into another manager.
/// Interfaces defer to the generic type constrained by them; force-inherit
/// types defer to their parent; a force-inherit type with no resolvable
/// parent cannot host a merge.
fn is_mergeable(graph: &Graph, id: TypeId, visited: &mut BTreeSet<TypeId>) -> bool {
    if !visited.insert(id) {
        return false;
    }

    let node = graph.type_node(id);

    if node.is_interface {
        let constrained = graph
            .type_ids()
            .find(|candidate| graph.type_node(*candidate).constraint == Some(node.ident));
        return match constrained {
            Some(generic) => is_mergeable(graph, generic, visited),
            None => true,
        };
    }

    if node.force_inherit {
        let parent = node
            .dependencies
            .tagged(DependencyTag::Parent)
            .next()
            .and_then(|key| graph.type_id(key));
        return match parent {
            Some(parent_id) => is_mergeable(graph, parent_id, visited),
            None => false,
        };
    }

    true
}

fn reassign(graph: &mut Graph, moved: TypeId, from: ManagerId, to: ManagerId, tracer: Tracer<'_>) {
    let ident = graph.type_node(moved).ident;
    let from_name = graph.manager_node(from).name().to_string();
    let to_name = graph.manager_node(to).name().to_string();

    graph.managers[from.index()].owned.remove(ident);
    graph.managers[to.index()].owned.insert(ident, moved);
    graph.types[moved.index()].owner = Some(to);

    tracer.emit(BuildTraceEvent::TypeMerged {
        ident,
        from: from_name.clone(),
        to: to_name,
    });

    if !graph.manager_node(from).is_active() {
        tracer.emit(BuildTraceEvent::ManagerRemoved { name: from_name });
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        build::build_storage,
        test_fixtures::{shapes_registry, test_config, test_manager},
        types::ROOT_TYPE,
    };

    #[test]
    fn implementers_fold_into_the_interface_manager() {
        let mut registry = shapes_registry();
        registry.register_manager(test_manager("shapes", "IShape"));

        let storage = build_storage(&registry, &test_config(), None).unwrap();

        let shapes: Vec<_> = storage
            .managers()
            .iter()
            .filter(|manager| manager.owned.iter().any(|key| *key != ROOT_TYPE))
            .collect();
        assert_eq!(shapes.len(), 1);

        let manager = shapes[0];
        assert_eq!(manager.name, "shapes");
        assert!(!manager.is_placeholder);
        for key in ["IShape", "Shape", "Circle", "Square"] {
            assert!(manager.owned.contains(&key), "missing {key}");
        }
    }

    #[test]
    fn placeholder_never_overrides_a_registered_manager() {
        // the real manager claims the concrete class; the interface side is
        // synthesized, so the interface folds the other way
        let mut registry = shapes_registry();
        registry.register_manager(test_manager("circles", "Circle"));

        let storage = build_storage(&registry, &test_config(), None).unwrap();

        let circles = storage
            .managers()
            .iter()
            .find(|manager| manager.name == "circles")
            .unwrap();
        assert!(!circles.is_placeholder);
        assert!(circles.owned.contains(&"Circle"));
        assert!(circles.owned.contains(&"IShape"));
        assert!(circles.owned.contains(&"Shape"));

        // no placeholder still owns anything from the shape hierarchy
        for manager in storage.managers() {
            if manager.is_placeholder {
                assert!(!manager.owned.contains(&"IShape"));
                assert!(!manager.owned.contains(&"Shape"));
            }
        }
    }

    #[test]
    fn merged_managers_with_nothing_left_are_removed() {
        let mut registry = shapes_registry();
        registry.register_manager(test_manager("shapes", "IShape"));

        let storage = build_storage(&registry, &test_config(), None).unwrap();

        // the placeholders synthesized for Circle/Square were emptied and
        // dropped from the active set
        assert!(
            storage
                .managers()
                .iter()
                .all(|manager| !manager.owned.is_empty())
        );
    }
}
