//! Shared fixtures: a small record domain, a no-op manager, and a
//! recording trace sink.

use crate::{
    build::PyramidInfo,
    config::StorageConfig,
    descriptor::{MemberDescriptor, Registry, TypeDescriptor},
    manager::{DataManager, ManagerError, PlaceholderManager},
    trace::{BuildTraceEvent, BuildTraceSink},
    types::{MemberRole, Primitive, TypeKey},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

///
/// TestManager
///

pub(crate) struct TestManager {
    name: &'static str,
    main: TypeKey,
    manual: Vec<TypeKey>,
}

#[async_trait]
impl DataManager for TestManager {
    fn name(&self) -> &'static str {
        self.name
    }

    fn main_type(&self) -> TypeKey {
        self.main
    }

    fn manual_dependencies(&self) -> Vec<TypeKey> {
        self.manual.clone()
    }

    async fn configure(
        &self,
        _info: &PyramidInfo,
        _config: &StorageConfig,
    ) -> Result<(), ManagerError> {
        Ok(())
    }

    async fn init(&self) -> Result<(), ManagerError> {
        Ok(())
    }
}

pub(crate) fn test_manager(name: &'static str, main: TypeKey) -> Arc<dyn DataManager> {
    Arc::new(TestManager {
        name,
        main,
        manual: Vec::new(),
    })
}

pub(crate) fn test_manager_with_manual(
    name: &'static str,
    main: TypeKey,
    manual: Vec<TypeKey>,
) -> Arc<dyn DataManager> {
    Arc::new(TestManager { name, main, manual })
}

///
/// RecordingSink
///

#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<BuildTraceEvent>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<BuildTraceEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl BuildTraceSink for RecordingSink {
    fn on_event(&self, event: BuildTraceEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Configuration used by most tests: timestamps tracked, placeholders
/// synthesized on demand.
pub(crate) fn test_config() -> StorageConfig {
    StorageConfig::new()
        .with_timestamps()
        .with_default_manager(PlaceholderManager::factory())
}

/// Joined-table inheritance domain: a generic abstract `Shape` (alias
/// `IShape`) with two concrete subclasses.
pub(crate) fn shapes_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_type(TypeDescriptor::interface("IShape"))
        .register_type(
            TypeDescriptor::generic_abstract("Shape")
                .constrained_by("IShape")
                .with_member(MemberDescriptor::primitive("area", Primitive::Float64)),
        )
        .register_type(
            TypeDescriptor::class("Circle")
                .with_base("Shape")
                .with_member(MemberDescriptor::primitive("radius", Primitive::Float64)),
        )
        .register_type(
            TypeDescriptor::class("Square")
                .with_base("Shape")
                .with_member(MemberDescriptor::primitive("side", Primitive::Float64)),
        );
    registry
}

/// Force-inherit domain: a flattened `VersionedData` base (alias `IEntity`)
/// carrying a name plus created/updated timestamps, with concrete record
/// types and reference/collection members.
pub(crate) fn rpg_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_type(TypeDescriptor::interface("IEntity"))
        .register_type(
            TypeDescriptor::generic_abstract("VersionedData")
                .constrained_by("IEntity")
                .force_inherit()
                .with_member(MemberDescriptor::primitive("name", Primitive::Text))
                .with_member(
                    MemberDescriptor::primitive("created_at", Primitive::Timestamp)
                        .with_role(MemberRole::CreatedTimestamp),
                )
                .with_member(
                    MemberDescriptor::primitive("updated_at", Primitive::Timestamp)
                        .with_role(MemberRole::UpdatedTimestamp),
                ),
        )
        .register_type(
            TypeDescriptor::class("Zone")
                .with_base("VersionedData")
                .with_member(MemberDescriptor::primitive("danger", Primitive::Int32)),
        )
        .register_type(
            TypeDescriptor::class("Item")
                .with_base("VersionedData")
                .with_member(MemberDescriptor::primitive("weight", Primitive::Decimal)),
        )
        .register_type(
            TypeDescriptor::class("Character")
                .with_base("VersionedData")
                .with_member(MemberDescriptor::primitive("level", Primitive::Int32))
                .with_member(MemberDescriptor::reference("home", "Zone").optional())
                .with_member(MemberDescriptor::collection("items", "Item")),
        );
    registry
}
