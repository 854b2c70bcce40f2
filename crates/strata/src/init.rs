//! Manager start-up.
//!
//! Runs every manager's `configure`/`init` pair in merged dependency order.
//! Start-up is all-or-nothing: the first manager failure aborts the sequence
//! and is reported with the manager's name attached.

use strata_schema::{
    Error,
    build::{Storage, build_storage},
    config::StorageConfig,
    descriptor::Registry,
    manager::ManagerError,
    trace::{BuildTraceEvent, BuildTraceSink},
};
use thiserror::Error as ThisError;

///
/// InitError
///

#[derive(Debug, ThisError)]
pub enum InitError {
    #[error("manager '{manager}' failed to configure: {source}")]
    Configure {
        manager: &'static str,
        source: ManagerError,
    },

    #[error("manager '{manager}' failed to initialize: {source}")]
    Init {
        manager: &'static str,
        source: ManagerError,
    },
}

///
/// StartError
///

#[derive(Debug, ThisError)]
pub enum StartError {
    #[error(transparent)]
    Build(#[from] Error),

    #[error(transparent)]
    Init(#[from] InitError),
}

/// Build a storage from a registry and initialize its managers in one call.
pub async fn start(
    registry: &Registry,
    config: &StorageConfig,
    sink: Option<&dyn BuildTraceSink>,
) -> Result<Storage, StartError> {
    let storage = build_storage(registry, config, sink)?;
    init_managers(&storage, config, sink).await?;

    Ok(storage)
}

/// Initialize every manager of an already-built storage, in order.
///
/// A manager whose only owned type is the universal root marker has nothing
/// to configure; it is skipped and reported through the trace sink.
pub async fn init_managers(
    storage: &Storage,
    config: &StorageConfig,
    sink: Option<&dyn BuildTraceSink>,
) -> Result<(), InitError> {
    for manager in storage.managers() {
        if manager.owns_only_root() {
            if let Some(sink) = sink {
                let event = BuildTraceEvent::ManagerOnlyRoot {
                    name: manager.name.to_string(),
                };
                if config.trace.enabled(event.phase()) {
                    sink.on_event(event);
                }
            }
            continue;
        }

        manager
            .handle
            .configure(&manager.info, config)
            .await
            .map_err(|source| InitError::Configure {
                manager: manager.name,
                source,
            })?;

        manager
            .handle
            .init()
            .await
            .map_err(|source| InitError::Init {
                manager: manager.name,
                source,
            })?;
    }

    Ok(())
}
