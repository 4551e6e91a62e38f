use thiserror::Error;

/// Which plugin slot an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginRole {
    Metric,
    Target,
    Warmer,
    Cooler,
    StopCondition,
}

impl std::fmt::Display for PluginRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PluginRole::Metric => "metric",
            PluginRole::Target => "target",
            PluginRole::Warmer => "warmer",
            PluginRole::Cooler => "cooler",
            PluginRole::StopCondition => "stop-condition",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RelayError {
    #[error("{role} plugin failed: {reason}")]
    Plugin { role: PluginRole, reason: String },
    #[error("{role} plugin is misconfigured: {reason}")]
    PluginConfig { role: PluginRole, reason: String },
    #[error("{role} plugin panicked: {reason}")]
    Panicked { role: PluginRole, reason: String },
    #[error("{role} source is exhausted")]
    Exhausted { role: PluginRole },
    #[error("{role} source produced a non-finite value ({value})")]
    NonFinite { role: PluginRole, value: f64 },
    #[error("error SP - PV is not finite (sp {sp}, pv {pv})")]
    ErrorOverflow { sp: f64, pv: f64 },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

impl RelayError {
    /// The plugin slot involved, if any.
    pub fn role(&self) -> Option<PluginRole> {
        match self {
            RelayError::Plugin { role, .. }
            | RelayError::PluginConfig { role, .. }
            | RelayError::Panicked { role, .. }
            | RelayError::Exhausted { role }
            | RelayError::NonFinite { role, .. } => Some(*role),
            RelayError::ErrorOverflow { .. } | RelayError::Config(_) | RelayError::State(_) => {
                None
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing metric source")]
    MissingMetric,
    #[error("missing target source")]
    MissingTarget,
    #[error("missing action: configure a warmer, a cooler, or both")]
    MissingAction,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
