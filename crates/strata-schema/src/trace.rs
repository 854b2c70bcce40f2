//! Build diagnostics boundary.
//!
//! Tracing is optional, injected by the caller, and must not affect build
//! semantics. Each phase is toggled independently through
//! [`TraceConfig`](crate::config::TraceConfig).

use crate::types::TypeKey;

///
/// BuildTraceSink
///

pub trait BuildTraceSink: Send + Sync {
    fn on_event(&self, event: BuildTraceEvent);
}

///
/// BuildTracePhase
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildTracePhase {
    Graph,
    Order,
    Merge,
    Pyramid,
    Schema,
    Init,
}

///
/// BuildTraceEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BuildTraceEvent {
    /// A type node was registered with its dependency count.
    TypeRegistered { ident: TypeKey, dependencies: usize },
    /// A manager node was registered or synthesized.
    ManagerRegistered { name: String, placeholder: bool },
    /// A type received its position in the global order.
    TypeOrdered { ident: TypeKey, index: usize },
    /// A manager received its position in the manager order.
    ManagerOrdered { name: String, index: usize },
    /// A type was reassigned between managers during merging.
    TypeMerged {
        ident: TypeKey,
        from: String,
        to: String,
    },
    /// A manager lost its last owned type and left the active set.
    ManagerRemoved { name: String },
    /// A pyramid node was materialized for a manager.
    PyramidNodeBuilt {
        manager: String,
        ident: TypeKey,
        force_inherit: bool,
    },
    /// A table descriptor was emitted.
    TableEmitted { name: String, columns: usize },
    /// A manager owns only the root marker and was skipped by init.
    ManagerOnlyRoot { name: String },
}

impl BuildTraceEvent {
    #[must_use]
    pub const fn phase(&self) -> BuildTracePhase {
        match self {
            Self::TypeRegistered { .. } | Self::ManagerRegistered { .. } => BuildTracePhase::Graph,
            Self::TypeOrdered { .. } | Self::ManagerOrdered { .. } => BuildTracePhase::Order,
            Self::TypeMerged { .. } | Self::ManagerRemoved { .. } => BuildTracePhase::Merge,
            Self::PyramidNodeBuilt { .. } => BuildTracePhase::Pyramid,
            Self::TableEmitted { .. } => BuildTracePhase::Schema,
            Self::ManagerOnlyRoot { .. } => BuildTracePhase::Init,
        }
    }
}

///
/// Tracer
///
/// Internal pairing of an optional sink with the per-phase toggles. Emits
/// nothing when the sink is absent or the phase is disabled.
///

#[derive(Clone, Copy)]
pub(crate) struct Tracer<'a> {
    sink: Option<&'a dyn BuildTraceSink>,
    config: crate::config::TraceConfig,
}

impl<'a> Tracer<'a> {
    pub(crate) const fn new(
        sink: Option<&'a dyn BuildTraceSink>,
        config: crate::config::TraceConfig,
    ) -> Self {
        Self { sink, config }
    }

    pub(crate) fn emit(&self, event: BuildTraceEvent) {
        let Some(sink) = self.sink else {
            return;
        };

        if self.config.enabled(event.phase()) {
            sink.on_event(event);
        }
    }
}
