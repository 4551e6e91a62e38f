#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and trace parsing for the relay controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Every section is optional; command-line flags and `RELAY_*` environment
//!   variables are merged on top by the CLI before `validate()` runs.
//! - The trace CSV loader enforces its header and rejects non-finite values.
use serde::Deserialize;

/// Default seconds between ticks.
pub const DEFAULT_DELAY_S: f64 = 1.0;
/// Default error-window capacity.
pub const DEFAULT_LOOKBACK: usize = 1000;
/// Largest accepted error-window capacity.
pub const MAX_LOOKBACK: usize = 1_000_000;
/// Default ramp length in ticks (1 disables ramping).
pub const DEFAULT_RAMP: u32 = 1;

/// Plugin identifiers, resolved by `relay_plugins::registry`.
///
/// Example:
/// ```toml
/// [plugins]
/// metric = "bash_echo_metric"
/// target = "10"
/// warmer = "bash_echo_warmer"
/// cooler = "bash_echo_cooler"
/// stop_condition = "stop_if_mostly_diverging"
/// ```
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Plugins {
    pub metric: Option<String>,
    pub target: Option<String>,
    pub warmer: Option<String>,
    pub cooler: Option<String>,
    pub stop_condition: Option<String>,
}

/// How warmer/cooler calls are scheduled relative to the tick loop.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One fire-and-forget thread per dispatch.
    #[default]
    Detached,
    /// Call the action inline on the loop thread.
    Blocking,
}

/// Post-processing applied to the spectral weight.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeightMode {
    #[default]
    Raw,
    RunningMax,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControlCfg {
    /// Seconds to sleep between ticks. Also accepts alias "delay".
    #[serde(alias = "delay")]
    pub delay_s: f64,
    /// Number of recent errors kept for spectral weighting
    pub lookback: usize,
    /// Spread the initial correction over this many ticks
    pub ramp: u32,
    pub dispatch: DispatchMode,
    pub weight: WeightMode,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            delay_s: DEFAULT_DELAY_S,
            lookback: DEFAULT_LOOKBACK,
            ramp: DEFAULT_RAMP,
            dispatch: DispatchMode::Detached,
            weight: WeightMode::Raw,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Telemetry {
    /// Append one JSON object per tick to this file
    pub jsonl: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub plugins: Plugins,
    pub control: ControlCfg,
    pub logging: Logging,
    pub telemetry: Telemetry,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const ROTATIONS: [&str; 3] = ["never", "daily", "hourly"];

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Plugins
        if is_blank(self.plugins.metric.as_deref()) {
            eyre::bail!("plugins.metric must be set (the process variable source)");
        }
        if is_blank(self.plugins.target.as_deref()) {
            eyre::bail!("plugins.target must be set (the setpoint source)");
        }
        if is_blank(self.plugins.warmer.as_deref()) && is_blank(self.plugins.cooler.as_deref()) {
            eyre::bail!("at least one of plugins.warmer or plugins.cooler must be set");
        }

        // Control
        if !self.control.delay_s.is_finite() || self.control.delay_s < 0.0 {
            eyre::bail!("control.delay_s must be a finite number >= 0");
        }
        if self.control.delay_s > 24.0 * 60.0 * 60.0 {
            eyre::bail!("control.delay_s is unreasonably large (>24h)");
        }
        if self.control.lookback < 2 {
            eyre::bail!("control.lookback must be >= 2");
        }
        if self.control.lookback > MAX_LOOKBACK {
            eyre::bail!("control.lookback must be <= {MAX_LOOKBACK}");
        }
        if self.control.ramp == 0 {
            eyre::bail!("control.ramp must be >= 1");
        }

        // Logging
        if let Some(level) = self.logging.level.as_deref()
            && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
        {
            eyre::bail!("logging.level must be one of {}", LOG_LEVELS.join("|"));
        }
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !ROTATIONS.contains(&rotation.to_ascii_lowercase().as_str())
        {
            eyre::bail!("logging.rotation must be one of {}", ROTATIONS.join("|"));
        }

        Ok(())
    }
}

fn is_blank(v: Option<&str>) -> bool {
    v.is_none_or(|s| s.trim().is_empty())
}

/// One recorded metric sample.
///
/// Expected headers:
/// value
///
/// Example:
/// value
/// 3
/// 4.5
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct TraceRow {
    pub value: f64,
}

/// Load a recorded metric trace for replay.
pub fn load_trace_csv(path: &std::path::Path) -> eyre::Result<Vec<f64>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open trace CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != ["value"] {
        eyre::bail!(
            "trace CSV must have the single header 'value', got: {}",
            actual.join(",")
        );
    }

    let mut values = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        match rec {
            Ok(row) if row.value.is_finite() => values.push(row.value),
            Ok(row) => eyre::bail!("non-finite value {} in CSV row {}", row.value, idx + 2),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    if values.is_empty() {
        eyre::bail!("trace CSV {:?} contains no samples", path);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = load_toml("").unwrap();
        assert_eq!(cfg.control.lookback, DEFAULT_LOOKBACK);
        assert_eq!(cfg.control.ramp, DEFAULT_RAMP);
        assert_eq!(cfg.control.dispatch, DispatchMode::Detached);
        assert_eq!(cfg.control.weight, WeightMode::Raw);
        assert!(cfg.plugins.metric.is_none());
    }

    #[test]
    fn blank_plugin_counts_as_missing() {
        assert!(is_blank(None));
        assert!(is_blank(Some("  ")));
        assert!(!is_blank(Some("zero")));
    }
}
