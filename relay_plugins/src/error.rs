use thiserror::Error;

/// Which capability a plugin identifier is resolved as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Source,
    Action,
    StopCondition,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginKind::Source => write!(f, "source"),
            PluginKind::Action => write!(f, "action"),
            PluginKind::StopCondition => write!(f, "stop-condition"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("unknown {kind} plugin '{name}'")]
    Unknown { kind: PluginKind, name: String },
    #[error("invalid argument for plugin '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },
    #[error("command `{command}` failed: {reason}")]
    Command { command: String, reason: String },
    #[error("could not parse command output '{output}' as a number")]
    Parse { output: String },
    #[error("source exhausted")]
    Exhausted,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PluginError>;
