//! Human-readable error descriptions and structured JSON error formatting.

use relay_core::{BuildError, PluginRole, RelayError};
use relay_plugins::PluginError;

/// Exit code for configuration problems found before the first tick.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for plugin and runtime failures.
pub const EXIT_FAILURE: i32 = 1;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingMetric => {
                "What happened: No metric plugin was provided.\nLikely causes: plugins.metric is unset and no --metric/RELAY_METRIC was given.\nHow to fix: Pass a metric (e.g., `relay run -m shell:'wc -l < queue'`).".to_string()
            }
            BuildError::MissingTarget => {
                "What happened: No target plugin was provided.\nLikely causes: plugins.target is unset and no --target/RELAY_TARGET was given.\nHow to fix: Pass a setpoint, either a number or a plugin (e.g., `-t 10`).".to_string()
            }
            BuildError::MissingAction => {
                "What happened: Neither a warmer nor a cooler is configured.\nLikely causes: Both plugins.warmer and plugins.cooler are unset.\nHow to fix: Configure at least one action (e.g., `-w log`).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML or on the command line.\nHow to fix: Edit the config file or flags, then rerun `relay check`."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PluginError>() {
        match pe {
            PluginError::Unknown { kind, name } => {
                return format!(
                    "What happened: Unknown {kind} plugin '{name}'.\nLikely causes: A typo in the identifier or a plugin this build does not ship.\nHow to fix: Run `relay plugins` to list the available identifiers."
                );
            }
            PluginError::InvalidArgument { name, reason } => {
                return format!(
                    "What happened: Plugin '{name}' rejected its argument ({reason}).\nLikely causes: Missing or malformed text after ':' in the identifier.\nHow to fix: Run `relay plugins` to see the expected usage."
                );
            }
            _ => {}
        }
    }

    if let Some(re) = err.downcast_ref::<RelayError>() {
        return match re {
            RelayError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: A missing plugin, an out-of-range value, or a malformed TOML file.\nHow to fix: Fix the config or flags and validate with `relay check`."
            ),
            RelayError::PluginConfig { role, reason } => format!(
                "What happened: The {role} plugin is misconfigured ({reason}).\nLikely causes: A bad identifier or argument.\nHow to fix: Run `relay plugins` and correct plugins.{}.",
                config_key(*role)
            ),
            RelayError::Exhausted { role } => format!(
                "What happened: The {role} source ran out of values.\nLikely causes: A finite trace or script was used where an endless source is expected.\nHow to fix: Use a source that keeps producing readings, or add a stop condition that fires earlier."
            ),
            RelayError::NonFinite { role, value } => format!(
                "What happened: The {role} source returned {value}.\nLikely causes: The command printed something that parsed as NaN or infinity.\nHow to fix: Make the {role} plugin print a finite number."
            ),
            RelayError::Panicked { role, reason } => format!(
                "What happened: The {role} plugin panicked ({reason}).\nLikely causes: A bug in the plugin.\nHow to fix: Re-run with --log-level=debug and fix the plugin."
            ),
            RelayError::Plugin { role, reason } => format!(
                "What happened: The {role} plugin failed ({reason}).\nLikely causes: The command or service behind plugins.{} is unavailable or returned an error.\nHow to fix: Run the plugin command by hand to see its output, then rerun.",
                config_key(*role)
            ),
            RelayError::ErrorOverflow { sp, pv } => format!(
                "What happened: The error between target {sp} and metric {pv} overflowed.\nLikely causes: Readings near the limits of a 64-bit float with opposite signs.\nHow to fix: Rescale the metric and target so their difference fits."
            ),
            RelayError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors that carry no typed cause
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("telemetry file") {
        return format!(
            "What happened: Could not open the telemetry file.\nLikely causes: The directory does not exist or is not writable.\nHow to fix: Point --telemetry / telemetry.jsonl at a writable path. Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

const fn config_key(role: PluginRole) -> &'static str {
    match role {
        PluginRole::Metric => "metric",
        PluginRole::Target => "target",
        PluginRole::Warmer => "warmer",
        PluginRole::Cooler => "cooler",
        PluginRole::StopCondition => "stop_condition",
    }
}

/// Stable name for the JSON `reason` field.
fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Config";
    }
    if let Some(pe) = err.downcast_ref::<PluginError>() {
        return match pe {
            PluginError::Unknown { .. } => "UnknownPlugin",
            PluginError::InvalidArgument { .. } => "InvalidPluginArgument",
            _ => "Plugin",
        };
    }
    match err.downcast_ref::<RelayError>() {
        Some(RelayError::Config(_) | RelayError::PluginConfig { .. }) => "Config",
        Some(RelayError::Plugin { .. }) => "Plugin",
        Some(RelayError::Panicked { .. }) => "PluginPanicked",
        Some(RelayError::Exhausted { .. }) => "SourceExhausted",
        Some(RelayError::NonFinite { .. }) => "NonFiniteSample",
        Some(RelayError::ErrorOverflow { .. }) => "ErrorOverflow",
        Some(RelayError::State(_)) => "State",
        None => "Error",
    }
}

/// Configuration problems exit with 2; everything else with 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return EXIT_CONFIG;
    }
    if let Some(
        PluginError::Unknown { .. } | PluginError::InvalidArgument { .. },
    ) = err.downcast_ref::<PluginError>()
    {
        return EXIT_CONFIG;
    }
    if let Some(RelayError::Config(_) | RelayError::PluginConfig { .. }) =
        err.downcast_ref::<RelayError>()
    {
        return EXIT_CONFIG;
    }
    EXIT_FAILURE
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let role = err
        .downcast_ref::<RelayError>()
        .and_then(RelayError::role)
        .map(|r| r.to_string());
    let obj = match role {
        Some(role) => json!({
            "reason": reason_name(err),
            "role": role,
            "exit_code": exit_code_for_error(err),
            "message": humanize(err),
        }),
        None => json!({
            "reason": reason_name(err),
            "exit_code": exit_code_for_error(err),
            "message": humanize(err),
        }),
    };
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;
    use relay_plugins::PluginKind;
    use rstest::rstest;

    fn unknown_plugin() -> eyre::Report {
        let r: Result<(), PluginError> = Err(PluginError::Unknown {
            kind: PluginKind::Source,
            name: "nope".into(),
        });
        r.wrap_err("resolving metric plugin 'nope'").unwrap_err()
    }

    #[rstest]
    #[case(eyre::Report::new(BuildError::MissingAction), EXIT_CONFIG)]
    #[case(eyre::Report::new(RelayError::Config("x".into())), EXIT_CONFIG)]
    #[case(unknown_plugin(), EXIT_CONFIG)]
    #[case(eyre::Report::new(RelayError::Exhausted { role: PluginRole::Metric }), EXIT_FAILURE)]
    #[case(eyre::Report::new(RelayError::Plugin { role: PluginRole::Warmer, reason: "boom".into() }).wrap_err("dispatching warmer with 3"), EXIT_FAILURE)]
    #[case(eyre::eyre!("something else"), EXIT_FAILURE)]
    fn exit_codes(#[case] err: eyre::Report, #[case] code: i32) {
        assert_eq!(exit_code_for_error(&err), code);
    }

    #[test]
    fn unknown_plugin_points_at_catalog() {
        let text = humanize(&unknown_plugin());
        assert!(text.starts_with("What happened: Unknown source plugin 'nope'"));
        assert!(text.contains("relay plugins"));
    }

    #[test]
    fn json_error_carries_role_and_code() {
        let err = eyre::Report::new(RelayError::NonFinite {
            role: PluginRole::Target,
            value: f64::NAN,
        });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "NonFiniteSample");
        assert_eq!(v["role"], "target");
        assert_eq!(v["exit_code"], 1);
        assert!(v["message"].as_str().unwrap().contains("What happened"));
    }

    #[test]
    fn overflowing_error_has_no_role() {
        let err = eyre::Report::new(RelayError::ErrorOverflow {
            sp: 1e308,
            pv: -1e308,
        });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "ErrorOverflow");
        assert!(v.get("role").is_none());
        assert_eq!(v["exit_code"], 1);
    }
}
