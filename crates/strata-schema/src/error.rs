use derive_more::Display;
use std::fmt;
use thiserror::Error as ThisError;

///
/// BuildErrorCode
///
/// Stable classification for structural build failures. The code identifies
/// the violated rule; the message carries the offending identifiers.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[remain::sorted]
pub enum BuildErrorCode {
    GenericNotAbstract,
    InfiniteLoop,
    InterfaceNotUnique,
    ManagerInstantiation,
    ManagerMissing,
    ManagerOnlyRoot,
    ParentNotAbstract,
    SelfReferencingDependance,
    TypeNotStorable,
    TypeTooMuchStorable,
    TypeUnknown,
    Unknown,
}

///
/// BuildError
///
/// Structured build error: `{ code, origin, message }`. `origin` is a
/// human-readable path into the graph (the chain of identifiers being
/// processed when the rule was violated).
///

#[derive(Clone, Debug, ThisError, Eq, PartialEq)]
#[error("{origin}:{code}: {message}")]
pub struct BuildError {
    pub code: BuildErrorCode,
    pub origin: String,
    pub message: String,
}

impl BuildError {
    pub fn new(code: BuildErrorCode, origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Construct a not-storable error for a referenced but unregistered type.
    pub(crate) fn type_not_storable(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(BuildErrorCode::TypeNotStorable, origin, message)
    }

    /// Construct an ambiguous-generic-constraint error.
    pub(crate) fn type_too_much_storable(
        origin: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(BuildErrorCode::TypeTooMuchStorable, origin, message)
    }

    /// Construct a shape violation for a concrete generic type.
    pub(crate) fn generic_not_abstract(
        origin: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(BuildErrorCode::GenericNotAbstract, origin, message)
    }

    /// Construct a shape violation for a non-generic abstract base.
    pub(crate) fn parent_not_abstract(
        origin: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(BuildErrorCode::ParentNotAbstract, origin, message)
    }

    /// Construct an unrecoverable dependency-cycle error.
    pub(crate) fn infinite_loop(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(BuildErrorCode::InfiniteLoop, origin, message)
    }

    /// Construct a reentrant-insertion error from the orderer.
    pub(crate) fn self_referencing(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(BuildErrorCode::SelfReferencingDependance, origin, message)
    }

    /// Construct a constraint-alias collision error.
    pub(crate) fn interface_not_unique(
        origin: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(BuildErrorCode::InterfaceNotUnique, origin, message)
    }

    /// Construct a missing-default-manager error.
    pub(crate) fn manager_missing(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(BuildErrorCode::ManagerMissing, origin, message)
    }

    /// Construct a default-manager-instantiation error.
    pub(crate) fn manager_instantiation(
        origin: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(BuildErrorCode::ManagerInstantiation, origin, message)
    }

    /// Construct a post-build lookup miss.
    pub(crate) fn type_unknown(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(BuildErrorCode::TypeUnknown, origin, message)
    }
}

///
/// ErrorTree
///
/// Aggregate of independent validation failures, collected so a single
/// registry pass can report every problem at once.
///

#[derive(Clone, Debug, Default)]
pub struct ErrorTree {
    errors: Vec<String>,
}

impl ErrorTree {
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, err: impl fmt::Display) {
        self.errors.push(err.to_string());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Consume the tree, returning `Err` if any error was collected.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ErrorTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorTree {}

// err
// push a formatted validation error onto an ErrorTree
#[macro_export]
macro_rules! err {
    ($errs:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $errs.add(format!($fmt $(, $arg)*))
    };
}
