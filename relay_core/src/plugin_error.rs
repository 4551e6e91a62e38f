//! Maps `Box<dyn Error>` from plugin boundaries to typed `RelayError`.
//!
//! The traits in `relay_traits` use `Box<dyn Error + Send + Sync>` so any
//! plugin can report failures; this module converts those to our typed
//! error enum, with an optional feature-gated path for
//! `relay_plugins::PluginError` downcasting.

use crate::error::{PluginRole, RelayError};

/// Map a plugin-boundary error to a typed `RelayError`.
///
/// Known plugin error types are downcast first, then the message is
/// inspected as a fallback.
pub fn map_plugin_error(role: PluginRole, e: &(dyn std::error::Error + 'static)) -> RelayError {
    #[cfg(feature = "plugin-errors")]
    {
        use relay_plugins::PluginError;
        if let Some(pe) = e.downcast_ref::<PluginError>() {
            return match pe {
                PluginError::Exhausted => RelayError::Exhausted { role },
                PluginError::Unknown { .. } | PluginError::InvalidArgument { .. } => {
                    RelayError::PluginConfig {
                        role,
                        reason: pe.to_string(),
                    }
                }
                other => RelayError::Plugin {
                    role,
                    reason: other.to_string(),
                },
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("exhausted") {
        RelayError::Exhausted { role }
    } else {
        RelayError::Plugin { role, reason: s }
    }
}
