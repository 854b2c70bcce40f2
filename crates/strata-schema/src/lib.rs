//! Storable-type dependency resolution and relational schema derivation.
//!
//! The pipeline turns registered type descriptors and managers into a safe
//! initialization order, resolved ownership, per-manager inheritance
//! pyramids, and concrete table descriptors. SQL generation, query
//! execution, and transports consume these outputs and live elsewhere.

pub mod build;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod manager;
pub mod pyramid;
pub mod table;
pub mod trace;
pub mod types;

mod merge;
mod order;

#[cfg(test)]
pub(crate) mod test_fixtures;

/// Name of every primary key column.
pub const PRIMARY_KEY_COLUMN: &str = "id";

/// Name of the synthesized column recording a row's concrete type.
pub const DISCRIMINATOR_COLUMN: &str = "discriminator";

use crate::error::{BuildError, ErrorTree};
use thiserror::Error as ThisError;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        DISCRIMINATOR_COLUMN, Error, PRIMARY_KEY_COLUMN,
        build::{ManagerInfo, PyramidInfo, Storage, build_storage},
        config::{StorageConfig, TraceConfig},
        descriptor::{MemberDescriptor, Registry, TypeDescriptor},
        error::{BuildError, BuildErrorCode, ErrorTree},
        manager::{DataManager, DefaultManagerFactory, ManagerError, PlaceholderManager},
        table::{ColumnDescriptor, ColumnKind, LinkTableDescriptor, TableDescriptor},
        trace::{BuildTraceEvent, BuildTracePhase, BuildTraceSink},
        types::{Cardinality, DependencyTag, MemberRole, MemberShape, Primitive, ROOT_TYPE, TypeKey},
    };
}

///
/// Error
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("registry validation failed: {0}")]
    Registry(ErrorTree),

    #[error(transparent)]
    Build(#[from] BuildError),
}
