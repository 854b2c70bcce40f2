use crate::{build::PyramidInfo, config::StorageConfig, types::TypeKey};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error as ThisError;

///
/// ManagerError
///
/// Failure surfaced by a manager during configure/init. Carried back through
/// the initializer rather than unwound; the whole start-up is considered
/// failed when any manager reports one.
///

#[derive(Clone, Debug, ThisError, Eq, PartialEq)]
#[error("{message}")]
pub struct ManagerError {
    pub message: String,
}

impl ManagerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

///
/// DataManager
///
/// Registration contract for one persistence manager. Replaces the
/// original's by-name `GetInstance` lookup with a typed registry entry:
/// the instance is handed over at registration and queried through this
/// trait only.
///

#[async_trait]
pub trait DataManager: Send + Sync {
    /// Stable manager identifier used in diagnostics and lookups.
    fn name(&self) -> &'static str;

    /// The storable type this manager is registered for.
    fn main_type(&self) -> TypeKey;

    /// Types this manager depends on that are not otherwise reachable from
    /// its own type graph. Each entry must be a registered storable type.
    fn manual_dependencies(&self) -> Vec<TypeKey> {
        Vec::new()
    }

    /// Accept the derived pyramid/tables and the storage configuration.
    /// Invoked once, before `init`, in merged manager order.
    async fn configure(&self, info: &PyramidInfo, config: &StorageConfig)
    -> Result<(), ManagerError>;

    /// Initialize the manager. Invoked once, after `configure`.
    async fn init(&self) -> Result<(), ManagerError>;
}

/// Factory synthesizing a manager for a type no registered manager claims.
/// Returning `None` means the default manager kind cannot be instantiated
/// for that key.
pub type DefaultManagerFactory = Arc<dyn Fn(TypeKey) -> Option<Arc<dyn DataManager>> + Send + Sync>;

///
/// PlaceholderManager
///
/// Synthesized default manager parametrized by the lookup key it was created
/// for. Owns types until (and unless) merging folds them into a real manager.
///

pub struct PlaceholderManager {
    key: TypeKey,
}

impl PlaceholderManager {
    #[must_use]
    pub const fn new(key: TypeKey) -> Self {
        Self { key }
    }

    /// Factory wiring `PlaceholderManager` as the configured default kind.
    #[must_use]
    pub fn factory() -> DefaultManagerFactory {
        Arc::new(|key| Some(Arc::new(PlaceholderManager::new(key)) as Arc<dyn DataManager>))
    }
}

#[async_trait]
impl DataManager for PlaceholderManager {
    fn name(&self) -> &'static str {
        self.key
    }

    fn main_type(&self) -> TypeKey {
        self.key
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
