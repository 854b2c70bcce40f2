//! One-shot build pipeline: graph -> order -> merge -> pyramid -> schema.
//!
//! The pipeline is synchronous and single-threaded; callers serialize
//! initialization. On success the resulting [`Storage`] is immutable and may
//! be read concurrently. There is no incremental path: re-registration means
//! rebuilding from a fresh [`Registry`].

use crate::{
    Error,
    config::StorageConfig,
    descriptor::Registry,
    error::BuildError,
    graph::{Graph, ManagerId, TypeId, build_graph},
    manager::DataManager,
    merge::merge_managers,
    order::{order_managers, order_types},
    pyramid::{Pyramid, build_pyramid},
    table::{TableDescriptor, build_tables},
    trace::{BuildTraceEvent, BuildTraceSink, Tracer},
    types::{ROOT_TYPE, TypeKey},
};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};

///
/// PyramidInfo
/// Per-manager derivation output: the inheritance tree and the tables
/// emitted from it.
///

#[derive(Clone, Debug, Serialize)]
pub struct PyramidInfo {
    pub pyramid: Pyramid,
    pub tables: Vec<TableDescriptor>,
}

///
/// ManagerInfo
/// One merged, ordered manager with everything its initialization needs.
///

#[derive(Clone)]
pub struct ManagerInfo {
    pub name: &'static str,
    pub handle: Arc<dyn DataManager>,
    pub is_placeholder: bool,

    /// Owned type identities after merging, sorted.
    pub owned: Vec<TypeKey>,

    pub info: PyramidInfo,
}

impl std::fmt::Debug for ManagerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerInfo")
            .field("name", &self.name)
            .field("is_placeholder", &self.is_placeholder)
            .field("owned", &self.owned)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl ManagerInfo {
    /// True when the only owned type is the universal root marker; such a
    /// manager cannot be meaningfully initialized.
    #[must_use]
    pub fn owns_only_root(&self) -> bool {
        self.owned.len() == 1 && self.owned[0] == ROOT_TYPE
    }
}

///
/// Storage
/// Process-wide immutable result of one successful build.
///

#[derive(Debug)]
pub struct Storage {
    managers: Vec<ManagerInfo>,
    type_order: Vec<TypeKey>,
    table_index: BTreeMap<String, (usize, usize)>,
}

impl Storage {
    /// Managers in final merged + ordered sequence.
    #[must_use]
    pub fn managers(&self) -> &[ManagerInfo] {
        &self.managers
    }

    /// Global type order (root marker first).
    #[must_use]
    pub fn type_order(&self) -> &[TypeKey] {
        &self.type_order
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.managers
            .iter()
            .flat_map(|manager| manager.info.tables.iter())
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Result<&TableDescriptor, BuildError> {
        self.table_index
            .get(name)
            .map(|&(manager, table)| &self.managers[manager].info.tables[table])
            .ok_or_else(|| {
                BuildError::type_unknown(name, format!("no table named '{name}' exists in storage"))
            })
    }

    /// Look up a manager's derivation output by manager name.
    pub fn pyramid(&self, manager: &str) -> Result<&PyramidInfo, BuildError> {
        self.managers
            .iter()
            .find(|info| info.name == manager)
            .map(|info| &info.info)
            .ok_or_else(|| {
                BuildError::type_unknown(
                    manager,
                    format!("no manager named '{manager}' exists in storage"),
                )
            })
    }
}

/// Run the whole pipeline once. Any structural violation aborts the build;
/// partial state is never exposed.
pub fn build_storage(
    registry: &Registry,
    config: &StorageConfig,
    sink: Option<&dyn BuildTraceSink>,
) -> Result<Storage, Error> {
    registry.validate().map_err(Error::Registry)?;

    let tracer = Tracer::new(sink, config.trace);

    let mut graph = build_graph(registry, config, tracer)?;

    let type_order = order_types(&graph)?;
    for (index, &type_id) in type_order.iter().enumerate() {
        tracer.emit(BuildTraceEvent::TypeOrdered {
            ident: graph.type_node(type_id).ident,
            index,
        });
    }

    merge_managers(&mut graph, &type_order, tracer);

    let manager_order = order_managers(&graph)?;
    for (index, &manager_id) in manager_order.iter().enumerate() {
        tracer.emit(BuildTraceEvent::ManagerOrdered {
            name: graph.manager_node(manager_id).name().to_string(),
            index,
        });
    }

    let mut managers = Vec::with_capacity(manager_order.len());
    let mut table_index = BTreeMap::new();
    for &manager_id in &manager_order {
        let info = build_manager_info(&graph, &type_order, manager_id, config, tracer)?;

        let manager_slot = managers.len();
        for (table_slot, table) in info.info.tables.iter().enumerate() {
            table_index
                .entry(table.name.clone())
                .or_insert((manager_slot, table_slot));
        }
        managers.push(info);
    }

    let type_order = type_order
        .iter()
        .map(|&type_id| graph.type_node(type_id).ident)
        .collect();

    Ok(Storage {
        managers,
        type_order,
        table_index,
    })
}

fn build_manager_info(
    graph: &Graph,
    type_order: &[TypeId],
    manager_id: ManagerId,
    config: &StorageConfig,
    tracer: Tracer<'_>,
) -> Result<ManagerInfo, BuildError> {
    let pyramid = build_pyramid(graph, type_order, manager_id, tracer)?;
    let tables = build_tables(&pyramid, config, tracer);

    let node = graph.manager_node(manager_id);

    Ok(ManagerInfo {
        name: node.name(),
        handle: node.handle.clone(),
        is_placeholder: node.is_placeholder,
        owned: node.owned.keys().copied().collect(),
        info: PyramidInfo { pyramid, tables },
    })
}
