use crate::{manager::DefaultManagerFactory, trace::BuildTracePhase};

///
/// TraceConfig
///
/// Per-phase toggles for build diagnostics. Purely observational; no flag
/// changes what the pipeline computes.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct TraceConfig {
    pub graph: bool,
    pub order: bool,
    pub merge: bool,
    pub pyramid: bool,
    pub schema: bool,
}

impl TraceConfig {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            graph: true,
            order: true,
            merge: true,
            pyramid: true,
            schema: true,
        }
    }

    /// Whether events of a phase should be delivered. Init diagnostics ride
    /// the merge toggle; they concern ownership.
    #[must_use]
    pub const fn enabled(self, phase: BuildTracePhase) -> bool {
        match phase {
            BuildTracePhase::Graph => self.graph,
            BuildTracePhase::Order => self.order,
            BuildTracePhase::Merge | BuildTracePhase::Init => self.merge,
            BuildTracePhase::Pyramid => self.pyramid,
            BuildTracePhase::Schema => self.schema,
        }
    }
}

///
/// StorageConfig
///
/// Explicit configuration value passed through the pipeline; there is no
/// process-global configuration state.
///

#[derive(Clone, Default)]
pub struct StorageConfig {
    /// Append created/updated timestamp columns last on every materialized
    /// table that inherits them.
    pub track_timestamps: bool,

    /// Default manager kind synthesized when no registered manager claims a
    /// type. Unset means an unclaimed type is a build error.
    pub default_manager: Option<DefaultManagerFactory>,

    pub trace: TraceConfig,
}

impl StorageConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamps(mut self) -> Self {
        self.track_timestamps = true;
        self
    }

    #[must_use]
    pub fn with_default_manager(mut self, factory: DefaultManagerFactory) -> Self {
        self.default_manager = Some(factory);
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace: TraceConfig) -> Self {
        self.trace = trace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::TraceConfig;
    use crate::trace::BuildTracePhase;

    #[test]
    fn each_phase_follows_its_own_toggle() {
        let config = TraceConfig {
            graph: true,
            schema: true,
            ..TraceConfig::default()
        };

        assert!(config.enabled(BuildTracePhase::Graph));
        assert!(config.enabled(BuildTracePhase::Schema));
        assert!(!config.enabled(BuildTracePhase::Order));
        assert!(!config.enabled(BuildTracePhase::Pyramid));
    }

    #[test]
    fn init_diagnostics_ride_the_merge_toggle() {
        let mut config = TraceConfig::default();
        assert!(!config.enabled(BuildTracePhase::Init));

        config.merge = true;
        assert!(config.enabled(BuildTracePhase::Init));
        assert!(!config.enabled(BuildTracePhase::Graph));
    }
}
