//! Per-manager inheritance tree, built from the ordered, merged type list.
//!
//! Interfaces contribute no node of their own; a generic abstract node also
//! stands in for its constraint interface through an alias registration.
//! Force-inherit nodes are materialized in the tree but never become tables.

use crate::{
    descriptor::MemberDescriptor,
    error::BuildError,
    graph::{Graph, ManagerId, TypeId},
    trace::{BuildTraceEvent, Tracer},
    types::{DependencyTag, TypeKey},
};
use serde::Serialize;
use std::collections::BTreeMap;

///
/// PyramidNode
///

#[derive(Clone, Debug, Serialize)]
pub struct PyramidNode {
    pub ident: TypeKey,

    /// Interface identity this node also stands in for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<TypeKey>,

    pub parent: Option<usize>,
    pub children: Vec<usize>,

    /// Members declared directly on this type.
    pub members: Vec<MemberDescriptor>,

    pub force_inherit: bool,
    pub is_abstract: bool,
}

///
/// Pyramid
///
/// Index-addressed tree arena. `roots` holds every node without a parent in
/// this manager's tree; the first one is the manager's pyramid root.
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct Pyramid {
    nodes: Vec<PyramidNode>,
    roots: Vec<usize>,
    by_key: BTreeMap<TypeKey, usize>,
}

impl Pyramid {
    #[must_use]
    pub fn node(&self, index: usize) -> &PyramidNode {
        &self.nodes[index]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The first node produced for the manager.
    #[must_use]
    pub fn root(&self) -> Option<usize> {
        self.roots.first().copied()
    }

    #[must_use]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Node registered under a type identity or a constraint alias.
    #[must_use]
    pub fn get(&self, key: TypeKey) -> Option<&PyramidNode> {
        self.by_key.get(key).map(|index| &self.nodes[*index])
    }
}

/// Build one manager's pyramid by walking the global type order.
pub(crate) fn build_pyramid(
    graph: &Graph,
    type_order: &[TypeId],
    manager: ManagerId,
    tracer: Tracer<'_>,
) -> Result<Pyramid, BuildError> {
    let mut pyramid = Pyramid::default();

    for &type_id in type_order {
        let node = graph.type_node(type_id);
        if node.owner != Some(manager) || node.is_interface {
            continue;
        }
        materialize(graph, &mut pyramid, type_id, manager, tracer)?;
    }

    Ok(pyramid)
}

fn materialize(
    graph: &Graph,
    pyramid: &mut Pyramid,
    type_id: TypeId,
    manager: ManagerId,
    tracer: Tracer<'_>,
) -> Result<usize, BuildError> {
    let node = graph.type_node(type_id);

    if let Some(&index) = pyramid.by_key.get(node.ident) {
        return Ok(index);
    }

    // constraint alias must be unique
    let alias = {
        let mut tagged = node.dependencies.tagged(DependencyTag::Constraint);
        let first = tagged.next();
        if tagged.next().is_some() {
            return Err(BuildError::interface_not_unique(
                node.ident,
                format!("type '{}' resolves more than one constraint interface", node.ident),
            ));
        }
        first
    };

    // at most one parent; a force-inherit parent not yet materialized is
    // pulled into the tree first
    let parent_index = match node.dependencies.tagged(DependencyTag::Parent).next() {
        Some(parent_key) => {
            if let Some(&index) = pyramid.by_key.get(parent_key) {
                Some(index)
            } else if let Some(parent_id) = graph.type_id(parent_key) {
                let parent_node = graph.type_node(parent_id);
                if parent_node.force_inherit && !parent_node.is_interface {
                    Some(materialize(graph, pyramid, parent_id, manager, tracer)?)
                } else {
                    None
                }
            } else {
                None
            }
        }
        None => None,
    };

    let index = pyramid.nodes.len();
    pyramid.nodes.push(PyramidNode {
        ident: node.ident,
        alias,
        parent: parent_index,
        children: Vec::new(),
        members: node.members.clone(),
        force_inherit: node.force_inherit,
        is_abstract: node.is_abstract,
    });

    match parent_index {
        Some(parent) => pyramid.nodes[parent].children.push(index),
        None => pyramid.roots.push(index),
    }

    pyramid.by_key.insert(node.ident, index);
    if let Some(alias_key) = alias {
        if pyramid.by_key.contains_key(alias_key) {
            return Err(BuildError::interface_not_unique(
                node.ident,
                format!(
                    "constraint interface '{alias_key}' is claimed by more than one class in manager '{}'",
                    graph.manager_node(manager).name()
                ),
            ));
        }
        pyramid.by_key.insert(alias_key, index);
    }

    tracer.emit(BuildTraceEvent::PyramidNodeBuilt {
        manager: graph.manager_node(manager).name().to_string(),
        ident: node.ident,
        force_inherit: node.force_inherit,
    });

    Ok(index)
}
