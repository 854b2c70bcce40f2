//! Cycle-aware depth-first insertion-sort, shared by the type graph and the
//! manager graph.
//!
//! Contract: every dependency of a node ends up at a strictly earlier index,
//! while each node is inserted as early as its dependencies allow. An
//! immediate self-reference (a node depending on itself) is benign and adds
//! no ordering constraint; any longer cycle aborts the whole build.

use crate::{
    error::BuildError,
    graph::{Graph, ManagerId, TypeId},
};

///
/// OrderGraph
/// Node/edge view shared by both orderable graphs.
///

pub(crate) trait OrderGraph {
    type Id: Copy + Eq;

    /// All nodes, stable arena order.
    fn ids(&self) -> Vec<Self::Id>;

    /// Dependency targets of a node that exist in the graph.
    fn dependencies(&self, id: Self::Id) -> Vec<Self::Id>;

    /// Human-readable identifier for error paths.
    fn label(&self, id: Self::Id) -> String;
}

/// Produce the global order for one graph.
pub(crate) fn order_nodes<G: OrderGraph>(graph: &G) -> Result<Vec<G::Id>, BuildError> {
    let mut orderer = Orderer {
        waiting: Vec::new(),
        ordered: Vec::new(),
    };

    for id in graph.ids() {
        orderer.visit(graph, id)?;
    }

    Ok(orderer.ordered)
}

///
/// Orderer
///

struct Orderer<I> {
    /// Nodes on the active DFS path.
    waiting: Vec<I>,
    /// Accumulating result, valid at every step.
    ordered: Vec<I>,
}

impl<I: Copy + Eq> Orderer<I> {
    /// Insert a node after all of its dependencies and return the resulting
    /// length of `ordered` (a 1-based position for cache hits, 0 for a
    /// benign self-reference).
    fn visit<G: OrderGraph<Id = I>>(&mut self, graph: &G, id: I) -> Result<usize, BuildError> {
        if let Some(position) = self.ordered.iter().position(|node| *node == id) {
            return Ok(position + 1);
        }

        if self.waiting.contains(&id) {
            // only the node currently being processed may refer to itself;
            // anything deeper is a genuine cycle and unrecoverable
            if self.waiting.last() == Some(&id) {
                return Ok(0);
            }

            let mut chain: Vec<String> = self.waiting.iter().map(|node| graph.label(*node)).collect();
            chain.push(graph.label(id));
            let path = chain.join(" -> ");

            return Err(BuildError::infinite_loop(
                path.clone(),
                format!("dependency cycle detected: {path}"),
            ));
        }

        self.waiting.push(id);
        let mut max_index = 0;
        for dependency in graph.dependencies(id) {
            let index = self.visit(graph, dependency)?;
            max_index = max_index.max(index);
        }
        self.waiting.pop();

        if self.ordered.iter().any(|node| *node == id) {
            let label = graph.label(id);
            return Err(BuildError::self_referencing(
                label.clone(),
                format!("node '{label}' was inserted while its own dependencies were being visited"),
            ));
        }

        self.ordered.insert(max_index, id);

        Ok(self.ordered.len())
    }
}

///
/// Type graph adapter
///

struct TypeOrderGraph<'a> {
    graph: &'a Graph,
}

impl OrderGraph for TypeOrderGraph<'_> {
    type Id = TypeId;

    fn ids(&self) -> Vec<TypeId> {
        self.graph.type_ids().collect()
    }

    fn dependencies(&self, id: TypeId) -> Vec<TypeId> {
        self.graph
            .type_node(id)
            .dependencies
            .keys()
            .filter_map(|key| self.graph.type_id(key))
            .collect()
    }

    fn label(&self, id: TypeId) -> String {
        self.graph.type_node(id).ident.to_string()
    }
}

/// Order the type graph. The root marker is force-moved to index 0
/// afterwards: it has no real dependencies and every downstream consumer
/// processes it first.
pub(crate) fn order_types(graph: &Graph) -> Result<Vec<TypeId>, BuildError> {
    let mut ordered = order_nodes(&TypeOrderGraph { graph })?;

    if let Some(position) = ordered.iter().position(|id| *id == graph.root()) {
        let root = ordered.remove(position);
        ordered.insert(0, root);
    }

    Ok(ordered)
}

///
/// Manager graph adapter
///

struct ManagerOrderGraph<'a> {
    graph: &'a Graph,
}

impl OrderGraph for ManagerOrderGraph<'_> {
    type Id = ManagerId;

    fn ids(&self) -> Vec<ManagerId> {
        self.graph.active_managers().collect()
    }

    fn dependencies(&self, id: ManagerId) -> Vec<ManagerId> {
        self.graph
            .manager_node(id)
            .dependencies
            .keys()
            .filter_map(|key| self.graph.owner_of(key))
            .filter(|owner| *owner != id && self.graph.manager_node(*owner).is_active())
            .collect()
    }

    fn label(&self, id: ManagerId) -> String {
        self.graph.manager_node(id).name().to_string()
    }
}

/// Order the active managers after merging.
pub(crate) fn order_managers(graph: &Graph) -> Result<Vec<ManagerId>, BuildError> {
    order_nodes(&ManagerOrderGraph { graph })
}

#[cfg(test)]
mod tests {
    use super::{OrderGraph, order_nodes};
    use crate::error::BuildErrorCode;

    struct FakeGraph {
        labels: Vec<&'static str>,
        edges: Vec<(usize, usize)>,
    }

    impl OrderGraph for FakeGraph {
        type Id = usize;

        fn ids(&self) -> Vec<usize> {
            (0..self.labels.len()).collect()
        }

        fn dependencies(&self, id: usize) -> Vec<usize> {
            self.edges
                .iter()
                .filter(|(from, _)| *from == id)
                .map(|(_, to)| *to)
                .collect()
        }

        fn label(&self, id: usize) -> String {
            self.labels[id].to_string()
        }
    }

    fn assert_before(order: &[usize], earlier: usize, later: usize) {
        let a = order.iter().position(|n| *n == earlier).unwrap();
        let b = order.iter().position(|n| *n == later).unwrap();
        assert!(a < b, "expected {earlier} before {later} in {order:?}");
    }

    #[test]
    fn dependencies_come_first_in_acyclic_graphs() {
        // d -> c -> a, d -> b, b -> a
        let graph = FakeGraph {
            labels: vec!["a", "b", "c", "d"],
            edges: vec![(3, 2), (3, 1), (2, 0), (1, 0)],
        };

        let order = order_nodes(&graph).unwrap();

        assert_eq!(order.len(), 4);
        assert_before(&order, 0, 1);
        assert_before(&order, 0, 2);
        assert_before(&order, 1, 3);
        assert_before(&order, 2, 3);
    }

    #[test]
    fn every_node_appears_exactly_once() {
        let graph = FakeGraph {
            labels: vec!["a", "b", "c", "d", "e"],
            edges: vec![(1, 0), (2, 0), (3, 1), (3, 2), (4, 3)],
        };

        let mut order = order_nodes(&graph).unwrap();
        order.sort_unstable();

        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn direct_cycle_fails_with_infinite_loop() {
        let graph = FakeGraph {
            labels: vec!["a", "b"],
            edges: vec![(0, 1), (1, 0)],
        };

        let err = order_nodes(&graph).unwrap_err();

        assert_eq!(err.code, BuildErrorCode::InfiniteLoop);
        assert!(err.message.contains("a -> b -> a"), "{}", err.message);
    }

    #[test]
    fn immediate_self_reference_is_benign() {
        // a tree node referencing its own type imposes no constraint
        let graph = FakeGraph {
            labels: vec!["node", "tree"],
            edges: vec![(0, 0), (1, 0)],
        };

        let order = order_nodes(&graph).unwrap();

        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn longer_cycle_back_to_an_ancestor_is_still_fatal() {
        // a -> b -> c -> a: returning to a non-adjacent ancestor is a hard
        // error even when the shape resembles a mutual self-reference
        let graph = FakeGraph {
            labels: vec!["a", "b", "c"],
            edges: vec![(0, 1), (1, 2), (2, 0)],
        };

        let err = order_nodes(&graph).unwrap_err();

        assert_eq!(err.code, BuildErrorCode::InfiniteLoop);
    }
}
