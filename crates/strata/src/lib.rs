//! ## Crate layout
//! - `schema`: type descriptors, dependency graph, ordering, manager
//!   merging, inheritance pyramids, and relational table derivation.
//! - `init`: manager start-up, running `configure`/`init` in dependency
//!   order over a built storage.
//!
//! The `prelude` module mirrors the surface an application registering
//! storable types and managers needs.

pub use strata_schema as schema;

pub mod init;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use init::{InitError, StartError, init_managers, start};
pub use strata_schema::{Error, build::build_storage};

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::init::{InitError, StartError, init_managers, start};
    pub use strata_schema::prelude::*;
}
