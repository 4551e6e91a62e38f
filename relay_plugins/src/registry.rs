//! Resolves textual plugin identifiers into capability objects.
//!
//! An identifier is `name` or `name:arg`. A leading `relay.plugins.` prefix is
//! accepted and stripped so identifiers written for older configs keep
//! working. Each name maps to a typed factory; anything else is rejected
//! before the control loop starts.
use std::path::Path;
use std::sync::Arc;

use relay_traits::{Action, Source, StopCondition};

use crate::actions::{BashEchoCooler, BashEchoWarmer, LogAction, ShellAction};
use crate::error::{PluginError, PluginKind, Result};
use crate::sources::{Constant, Replay, ShellMetric, SometimesOne, SquareWave};
use crate::stop::{MostlyDiverging, Never, StopAfter};

const LEGACY_PREFIX: &str = "relay.plugins.";

/// A parsed `name[:arg]` identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginRef<'a> {
    pub name: &'a str,
    pub arg: Option<&'a str>,
}

impl<'a> PluginRef<'a> {
    pub fn parse(ident: &'a str) -> Self {
        let ident = ident.trim();
        let ident = ident.strip_prefix(LEGACY_PREFIX).unwrap_or(ident);
        match ident.split_once(':') {
            Some((name, arg)) => PluginRef {
                name: name.trim(),
                arg: Some(arg.trim()),
            },
            None => PluginRef {
                name: ident,
                arg: None,
            },
        }
    }
}

type SourceFactory = fn(&PluginRef<'_>) -> Result<Box<dyn Source>>;
type ActionFactory = fn(&PluginRef<'_>) -> Result<Arc<dyn Action>>;
type StopFactory = fn(&PluginRef<'_>) -> Result<Box<dyn StopCondition>>;

/// Catalog entry describing one built-in plugin.
#[derive(Debug, Clone, Copy)]
pub struct PluginInfo {
    pub kind: PluginKind,
    pub usage: &'static str,
    pub summary: &'static str,
}

struct Entry<F> {
    name: &'static str,
    info: PluginInfo,
    factory: F,
}

const fn info(kind: PluginKind, usage: &'static str, summary: &'static str) -> PluginInfo {
    PluginInfo {
        kind,
        usage,
        summary,
    }
}

const SOURCES: &[Entry<SourceFactory>] = &[
    Entry {
        name: "zero",
        info: info(PluginKind::Source, "zero", "always 0"),
        factory: |r| {
            no_arg(r)?;
            Ok(Box::new(Constant(0.0)))
        },
    },
    Entry {
        name: "always_1",
        info: info(PluginKind::Source, "always_1", "always 1"),
        factory: |r| {
            no_arg(r)?;
            Ok(Box::new(Constant(1.0)))
        },
    },
    Entry {
        name: "sometimes_1",
        info: info(PluginKind::Source, "sometimes_1", "pseudo-random 0 or 1"),
        factory: |r| {
            no_arg(r)?;
            Ok(Box::new(SometimesOne::from_time()))
        },
    },
    Entry {
        name: "square_wave",
        info: info(PluginKind::Source, "square_wave", "4 samples of 0, then 4 of 1"),
        factory: |r| {
            no_arg(r)?;
            Ok(Box::new(SquareWave::default()))
        },
    },
    Entry {
        name: "constant",
        info: info(PluginKind::Source, "constant:<value>", "repeat one value"),
        factory: |r| Ok(Box::new(Constant(parse_f64(r)?))),
    },
    Entry {
        name: "replay",
        info: info(
            PluginKind::Source,
            "replay:<trace.csv>",
            "cycle through a recorded trace (CSV with a 'value' header)",
        ),
        factory: |r| {
            let path = required_arg(r)?;
            let values = relay_config::load_trace_csv(Path::new(path)).map_err(|e| {
                PluginError::InvalidArgument {
                    name: r.name.to_string(),
                    reason: e.to_string(),
                }
            })?;
            Ok(Box::new(Replay::new(values)?))
        },
    },
    Entry {
        name: "shell",
        info: info(
            PluginKind::Source,
            "shell:<command>",
            "run a bash command per tick and parse its output",
        ),
        factory: |r| Ok(Box::new(ShellMetric::new(required_arg(r)?))),
    },
    Entry {
        name: "bash_echo_metric",
        info: info(
            PluginKind::Source,
            "bash_echo_metric",
            "number of running bash_echo_warmer demo tasks",
        ),
        factory: |r| {
            no_arg(r)?;
            Ok(Box::new(ShellMetric::bash_echo()))
        },
    },
];

const ACTIONS: &[Entry<ActionFactory>] = &[
    Entry {
        name: "log",
        info: info(PluginKind::Action, "log[:<label>]", "log the magnitude, do nothing"),
        factory: |r| {
            Ok(Arc::new(LogAction {
                label: r.arg.unwrap_or("log").to_string(),
            }))
        },
    },
    Entry {
        name: "shell",
        info: info(
            PluginKind::Action,
            "shell:<command>",
            "run a bash command with RELAY_MV set to the signed magnitude",
        ),
        factory: |r| Ok(Arc::new(ShellAction::new(required_arg(r)?))),
    },
    Entry {
        name: "bash_echo_warmer",
        info: info(PluginKind::Action, "bash_echo_warmer", "start n demo tasks"),
        factory: |r| {
            no_arg(r)?;
            Ok(Arc::new(BashEchoWarmer))
        },
    },
    Entry {
        name: "bash_echo_cooler",
        info: info(PluginKind::Action, "bash_echo_cooler", "stop |n| demo tasks"),
        factory: |r| {
            no_arg(r)?;
            Ok(Arc::new(BashEchoCooler))
        },
    },
];

const STOP_CONDITIONS: &[Entry<StopFactory>] = &[
    Entry {
        name: "never",
        info: info(PluginKind::StopCondition, "never", "run until interrupted"),
        factory: |r| {
            no_arg(r)?;
            Ok(Box::new(Never))
        },
    },
    Entry {
        name: "stop_after",
        info: info(
            PluginKind::StopCondition,
            "stop_after:<ticks>[:<code>]",
            "exit with <code> (default 0) after <ticks> ticks",
        ),
        factory: |r| {
            let arg = required_arg(r)?;
            let (ticks, code) = match arg.split_once(':') {
                Some((t, c)) => (t, parse_code(r, c)?),
                None => (arg, 0),
            };
            let ticks = ticks
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|t| *t > 0)
                .ok_or_else(|| invalid(r, "tick count must be a positive integer"))?;
            Ok(Box::new(StopAfter::new(ticks, code)))
        },
    },
    Entry {
        name: "stop_if_mostly_diverging",
        info: info(
            PluginKind::StopCondition,
            "stop_if_mostly_diverging[:<code>]",
            "exit (default code 1) once |error| keeps growing",
        ),
        factory: |r| {
            let code = match r.arg {
                Some(c) => parse_code(r, c)?,
                None => MostlyDiverging::DEFAULT_CODE,
            };
            Ok(Box::new(MostlyDiverging::new(code)))
        },
    },
];

fn lookup<'e, F>(table: &'e [Entry<F>], kind: PluginKind, r: &PluginRef<'_>) -> Result<&'e F> {
    table
        .iter()
        .find(|e| e.name == r.name)
        .map(|e| &e.factory)
        .ok_or_else(|| PluginError::Unknown {
            kind,
            name: r.name.to_string(),
        })
}

/// Resolve a metric (or non-numeric target) identifier.
pub fn resolve_source(ident: &str) -> Result<Box<dyn Source>> {
    let r = PluginRef::parse(ident);
    tracing::debug!(name = r.name, arg = ?r.arg, "resolving source plugin");
    let factory = lookup(SOURCES, PluginKind::Source, &r)?;
    factory(&r)
}

/// Resolve a target: a bare number is a constant setpoint.
pub fn resolve_target(ident: &str) -> Result<Box<dyn Source>> {
    match ident.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Box::new(Constant(v))),
        _ => resolve_source(ident),
    }
}

/// Resolve a warmer or cooler identifier.
pub fn resolve_action(ident: &str) -> Result<Arc<dyn Action>> {
    let r = PluginRef::parse(ident);
    tracing::debug!(name = r.name, arg = ?r.arg, "resolving action plugin");
    let factory = lookup(ACTIONS, PluginKind::Action, &r)?;
    factory(&r)
}

/// Resolve a stop-condition identifier.
pub fn resolve_stop_condition(ident: &str) -> Result<Box<dyn StopCondition>> {
    let r = PluginRef::parse(ident);
    tracing::debug!(name = r.name, arg = ?r.arg, "resolving stop-condition plugin");
    let factory = lookup(STOP_CONDITIONS, PluginKind::StopCondition, &r)?;
    factory(&r)
}

/// Every built-in plugin, grouped by kind.
pub fn catalog() -> impl Iterator<Item = PluginInfo> {
    SOURCES
        .iter()
        .map(|e| e.info)
        .chain(ACTIONS.iter().map(|e| e.info))
        .chain(STOP_CONDITIONS.iter().map(|e| e.info))
}

fn invalid(r: &PluginRef<'_>, reason: &str) -> PluginError {
    PluginError::InvalidArgument {
        name: r.name.to_string(),
        reason: reason.to_string(),
    }
}

fn no_arg(r: &PluginRef<'_>) -> Result<()> {
    match r.arg {
        None => Ok(()),
        Some(_) => Err(invalid(r, "takes no argument")),
    }
}

fn required_arg<'a>(r: &PluginRef<'a>) -> Result<&'a str> {
    r.arg
        .filter(|a| !a.is_empty())
        .ok_or_else(|| invalid(r, "requires an argument"))
}

fn parse_f64(r: &PluginRef<'_>) -> Result<f64> {
    required_arg(r)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(r, "argument must be a finite number"))
}

fn parse_code(r: &PluginRef<'_>, s: &str) -> Result<i32> {
    s.trim()
        .parse::<i32>()
        .map_err(|_| invalid(r, "exit code must be an integer"))
}
