//! Config assembly, plugin resolution and the `run` / `check` commands.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use eyre::WrapErr;
use relay_config::Config;
use relay_core::{
    ControlLoop, FanoutSink, JsonlSink, LoopCfg, RelayError, RunOutcome, TelemetrySink,
    TracingSink,
};
use relay_plugins::PluginError;
use relay_traits::{Action, Source, StopCondition};
use serde_json::json;

use crate::cli::LoopArgs;

/// Plugins resolved from their identifiers, ready to hand to the builder.
pub struct Resolved {
    pub metric: Box<dyn Source>,
    pub target: Box<dyn Source>,
    pub warmer: Option<Arc<dyn Action>>,
    pub cooler: Option<Arc<dyn Action>>,
    pub stop_condition: Option<Box<dyn StopCondition>>,
}

fn config_error(msg: String) -> eyre::Report {
    eyre::Report::new(RelayError::Config(msg))
}

fn describe_toml_error(path: &Path, e: &toml::de::Error) -> String {
    match e.span() {
        Some(span) => format!(
            "{}: {} (at byte {})",
            path.display(),
            e.message().trim_end(),
            span.start
        ),
        None => format!("{}: {}", path.display(), e.message().trim_end()),
    }
}

/// Build the effective config: file (if any), then flags/env, then validate.
pub fn load_config(path: Option<&Path>, args: &LoopArgs) -> eyre::Result<Config> {
    let mut cfg = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .map_err(|e| config_error(format!("cannot read {}: {e}", p.display())))?;
            relay_config::load_toml(&text).map_err(|e| config_error(describe_toml_error(p, &e)))?
        }
        None => Config::default(),
    };
    args.apply(&mut cfg);
    cfg.validate().map_err(|e| config_error(e.to_string()))?;
    Ok(cfg)
}

fn required<'a>(slot: Option<&'a str>, key: &str) -> eyre::Result<&'a str> {
    slot.filter(|s| !s.trim().is_empty())
        .ok_or_else(|| config_error(format!("plugins.{key} must be set")))
}

fn resolve<T>(
    role: &str,
    ident: &str,
    factory: fn(&str) -> Result<T, PluginError>,
) -> eyre::Result<T> {
    factory(ident).wrap_err_with(|| format!("resolving {role} plugin '{ident}'"))
}

fn resolve_opt<T>(
    role: &str,
    ident: Option<&str>,
    factory: fn(&str) -> Result<T, PluginError>,
) -> eyre::Result<Option<T>> {
    match ident.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => resolve(role, s, factory).map(Some),
        None => Ok(None),
    }
}

/// Turn every configured identifier into a plugin instance.
pub fn resolve_plugins(cfg: &Config) -> eyre::Result<Resolved> {
    let p = &cfg.plugins;
    let metric = required(p.metric.as_deref(), "metric")?;
    let target = required(p.target.as_deref(), "target")?;
    Ok(Resolved {
        metric: resolve("metric", metric, relay_plugins::resolve_source)?,
        target: resolve("target", target, relay_plugins::resolve_target)?,
        warmer: resolve_opt("warmer", p.warmer.as_deref(), relay_plugins::resolve_action)?,
        cooler: resolve_opt("cooler", p.cooler.as_deref(), relay_plugins::resolve_action)?,
        stop_condition: resolve_opt(
            "stop-condition",
            p.stop_condition.as_deref(),
            relay_plugins::resolve_stop_condition,
        )?,
    })
}

/// Tracing events for every tick, plus the JSONL file when configured.
pub fn telemetry_sink(cfg: &Config) -> eyre::Result<FanoutSink> {
    let mut sink = FanoutSink::new().with(TracingSink);
    if let Some(path) = cfg.telemetry.jsonl.as_deref() {
        sink.push(Box::new(JsonlSink::create(Path::new(path))?));
    }
    Ok(sink)
}

pub fn build_loop(
    cfg: &Config,
    plugins: Resolved,
    telemetry: impl TelemetrySink + 'static,
) -> eyre::Result<ControlLoop> {
    let mut builder = ControlLoop::builder()
        .with_metric(plugins.metric)
        .with_target(plugins.target)
        .with_cfg(LoopCfg::from(&cfg.control))
        .with_telemetry(telemetry);
    if let Some(w) = plugins.warmer {
        builder = builder.with_warmer(w);
    }
    if let Some(c) = plugins.cooler {
        builder = builder.with_cooler(c);
    }
    if let Some(s) = plugins.stop_condition {
        builder = builder.with_stop_condition(s);
    }
    builder.build()
}

/// Run until the stop condition fires or `shutdown` is raised; returns the
/// process exit code.
pub fn run_relay(cfg: &Config, shutdown: &AtomicBool) -> eyre::Result<i32> {
    let plugins = resolve_plugins(cfg)?;
    let mut control = build_loop(cfg, plugins, telemetry_sink(cfg)?)?;
    let outcome = relay_core::run(&mut control, shutdown)?;
    if outcome == RunOutcome::Interrupted {
        tracing::warn!(ticks = control.ticks(), "interrupted");
    }
    Ok(outcome.exit_code())
}

const fn dispatch_name(m: relay_config::DispatchMode) -> &'static str {
    match m {
        relay_config::DispatchMode::Detached => "detached",
        relay_config::DispatchMode::Blocking => "blocking",
    }
}

const fn weight_name(m: relay_config::WeightMode) -> &'static str {
    match m {
        relay_config::WeightMode::Raw => "raw",
        relay_config::WeightMode::RunningMax => "running_max",
    }
}

/// Resolve and build without ticking; prints what would run.
pub fn check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let plugins = resolve_plugins(cfg)?;
    build_loop(cfg, plugins, relay_core::NullSink)?;

    let p = &cfg.plugins;
    let c = &cfg.control;
    if json {
        let obj = json!({
            "ok": true,
            "plugins": {
                "metric": p.metric,
                "target": p.target,
                "warmer": p.warmer,
                "cooler": p.cooler,
                "stop_condition": p.stop_condition,
            },
            "control": {
                "delay_s": c.delay_s,
                "lookback": c.lookback,
                "ramp": c.ramp,
                "dispatch": dispatch_name(c.dispatch),
                "weight": weight_name(c.weight),
            },
        });
        println!("{obj}");
    } else {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        println!("config ok");
        println!("  metric          {}", show(&p.metric));
        println!("  target          {}", show(&p.target));
        println!("  warmer          {}", show(&p.warmer));
        println!("  cooler          {}", show(&p.cooler));
        println!("  stop_condition  {}", show(&p.stop_condition));
        println!(
            "  control         delay_s={} lookback={} ramp={} dispatch={} weight={}",
            c.delay_s,
            c.lookback,
            c.ramp,
            dispatch_name(c.dispatch),
            weight_name(c.weight)
        );
    }
    Ok(())
}

/// Print the registry catalog.
pub fn list_plugins(json: bool) {
    if json {
        let rows: Vec<_> = relay_plugins::catalog()
            .map(|i| json!({ "kind": i.kind.to_string(), "usage": i.usage, "summary": i.summary }))
            .collect();
        println!("{}", serde_json::Value::Array(rows));
        return;
    }
    for i in relay_plugins::catalog() {
        println!("{:<15} {:<36} {}", i.kind.to_string(), i.usage, i.summary);
    }
}
