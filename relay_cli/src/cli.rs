//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use relay_config::Config;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

/// Flushes the log file writer when taken and dropped before exit.
pub static FILE_GUARD: OnceLock<Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>> =
    OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "relay",
    version,
    about = "Closed-loop autoscaler: keeps a metric at its setpoint"
)]
pub struct Cli {
    /// Path to config TOML; flags and RELAY_* variables override it
    #[arg(long, value_name = "FILE", env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", env = "RELAY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop until the stop condition fires or Ctrl-C
    Run(LoopArgs),
    /// Validate the config and resolve every plugin without running a tick
    Check(LoopArgs),
    /// List the built-in plugins
    Plugins,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum DispatchArg {
    /// One fire-and-forget thread per action call
    Detached,
    /// Call actions inline and wait for them
    Blocking,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum WeightArg {
    /// Spectral weight as computed
    Raw,
    /// Divide by the running maximum once it exceeds 1
    #[value(name = "running_max", alias = "running-max")]
    RunningMax,
}

/// Loop overrides shared by `run` and `check`. Unset flags fall back to the
/// matching `RELAY_*` variable, then to the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct LoopArgs {
    /// Metric (process variable) plugin
    #[arg(short = 'm', long, value_name = "PLUGIN", env = "RELAY_METRIC")]
    pub metric: Option<String>,

    /// Target (setpoint) plugin, or a plain number
    #[arg(short = 't', long, value_name = "PLUGIN", env = "RELAY_TARGET")]
    pub target: Option<String>,

    /// Action plugin called with positive corrections
    #[arg(short = 'w', long, value_name = "PLUGIN", env = "RELAY_WARMER")]
    pub warmer: Option<String>,

    /// Action plugin called with negative corrections
    #[arg(short = 'c', long, value_name = "PLUGIN", env = "RELAY_COOLER")]
    pub cooler: Option<String>,

    /// Seconds to sleep between ticks
    #[arg(short = 'd', long, value_name = "SECS", env = "RELAY_DELAY")]
    pub delay: Option<f64>,

    /// Number of recent errors kept for spectral weighting
    #[arg(long, value_name = "N", env = "RELAY_LOOKBACK")]
    pub lookback: Option<usize>,

    /// Spread the initial correction over this many ticks
    #[arg(long, value_name = "TICKS", env = "RELAY_RAMP")]
    pub ramp: Option<u32>,

    /// Stop-condition plugin deciding when to exit and with which code
    #[arg(long, value_name = "PLUGIN", env = "RELAY_STOP_CONDITION")]
    pub stop_condition: Option<String>,

    /// How warmer/cooler calls are scheduled
    #[arg(long, value_enum, value_name = "MODE", env = "RELAY_DISPATCH")]
    pub dispatch: Option<DispatchArg>,

    /// Weight post-processing
    #[arg(long, value_enum, value_name = "MODE", env = "RELAY_WEIGHT")]
    pub weight: Option<WeightArg>,

    /// Append one JSON object per tick to this file
    #[arg(long, value_name = "FILE", env = "RELAY_TELEMETRY")]
    pub telemetry: Option<PathBuf>,
}

impl From<DispatchArg> for relay_config::DispatchMode {
    fn from(a: DispatchArg) -> Self {
        match a {
            DispatchArg::Detached => relay_config::DispatchMode::Detached,
            DispatchArg::Blocking => relay_config::DispatchMode::Blocking,
        }
    }
}

impl From<WeightArg> for relay_config::WeightMode {
    fn from(a: WeightArg) -> Self {
        match a {
            WeightArg::Raw => relay_config::WeightMode::Raw,
            WeightArg::RunningMax => relay_config::WeightMode::RunningMax,
        }
    }
}

impl LoopArgs {
    /// Overlay every flag that was given onto `cfg`.
    pub fn apply(&self, cfg: &mut Config) {
        let p = &mut cfg.plugins;
        overlay(&mut p.metric, self.metric.as_ref());
        overlay(&mut p.target, self.target.as_ref());
        overlay(&mut p.warmer, self.warmer.as_ref());
        overlay(&mut p.cooler, self.cooler.as_ref());
        overlay(&mut p.stop_condition, self.stop_condition.as_ref());

        let c = &mut cfg.control;
        if let Some(d) = self.delay {
            c.delay_s = d;
        }
        if let Some(n) = self.lookback {
            c.lookback = n;
        }
        if let Some(r) = self.ramp {
            c.ramp = r;
        }
        if let Some(m) = self.dispatch {
            c.dispatch = m.into();
        }
        if let Some(w) = self.weight {
            c.weight = w.into();
        }
        if let Some(path) = &self.telemetry {
            cfg.telemetry.jsonl = Some(path.display().to_string());
        }
    }
}

fn overlay(slot: &mut Option<String>, value: Option<&String>) {
    if let Some(v) = value {
        *slot = Some(v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let mut cfg = relay_config::load_toml(
            r#"
            [plugins]
            metric = "zero"
            target = "5"
            warmer = "log"

            [control]
            delay_s = 3.0
            ramp = 4
            "#,
        )
        .unwrap();
        let args = LoopArgs {
            target: Some("9".into()),
            delay: Some(0.0),
            weight: Some(WeightArg::RunningMax),
            ..LoopArgs::default()
        };
        args.apply(&mut cfg);
        assert_eq!(cfg.plugins.metric.as_deref(), Some("zero"));
        assert_eq!(cfg.plugins.target.as_deref(), Some("9"));
        assert_eq!(cfg.control.delay_s, 0.0);
        assert_eq!(cfg.control.ramp, 4);
        assert_eq!(cfg.control.weight, relay_config::WeightMode::RunningMax);
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "relay", "run", "-m", "zero", "-t", "3", "-w", "log", "-d", "0", "--ramp", "2",
            "--dispatch", "blocking",
        ])
        .unwrap();
        let Commands::Run(args) = cli.cmd else {
            panic!("expected run");
        };
        assert_eq!(args.metric.as_deref(), Some("zero"));
        assert_eq!(args.ramp, Some(2));
        assert_eq!(args.dispatch, Some(DispatchArg::Blocking));
    }
}
