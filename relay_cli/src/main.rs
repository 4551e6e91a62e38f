#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! `relay`: keep a metric at its setpoint by calling a warmer or a cooler.

mod cli;
mod error_fmt;
mod run;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use clap::Parser;
use relay_config::Config;
use relay_core::RelayError;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    // Usage errors exit with 2 from inside clap.
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("warning: could not install error hooks: {e}");
    }

    let code = match real_main(&cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "relay failed");
            report(&e);
            exit_code_for_error(&e)
        }
    };
    flush_file_log();
    std::process::exit(code);
}

fn flush_file_log() {
    if let Some(cell) = FILE_GUARD.get()
        && let Ok(mut slot) = cell.lock()
    {
        drop(slot.take());
    }
}

fn report(err: &eyre::Report) {
    if JSON_MODE.get().copied().unwrap_or(false) {
        eprintln!("{}", format_error_json(err));
    } else {
        eprintln!("{}", humanize(err));
    }
}

fn real_main(cli: &Cli) -> eyre::Result<i32> {
    match &cli.cmd {
        Commands::Plugins => {
            run::list_plugins(cli.json);
            Ok(0)
        }
        Commands::Check(args) => {
            let cfg = run::load_config(cli.config.as_deref(), args)?;
            init_tracing(cli, &cfg)?;
            run::check(&cfg, cli.json)?;
            Ok(0)
        }
        Commands::Run(args) => {
            let cfg = run::load_config(cli.config.as_deref(), args)?;
            init_tracing(cli, &cfg)?;

            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let flag = Arc::clone(&shutdown);
                if let Err(e) = ctrlc::set_handler(move || {
                    flag.store(true, Ordering::Relaxed);
                }) {
                    tracing::warn!(error = %e, "failed to install Ctrl-C handler");
                }
            }
            run::run_relay(&cfg, &shutdown)
        }
    }
}

/// Console logs go to stderr (pretty or JSON); `logging.file` adds a JSON
/// file layer. `RUST_LOG` takes precedence over `--log-level`.
fn init_tracing(cli: &Cli, cfg: &Config) -> eyre::Result<()> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| cfg.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .map_err(|e| {
            eyre::Report::new(RelayError::Config(format!("invalid log level '{level}': {e}")))
        })?;

    let pretty = (!cli.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let json = cli.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });

    let file = match cfg.logging.file.as_deref() {
        Some(path) => {
            let appender = rolling_appender(Path::new(path), cfg.logging.rotation.as_deref());
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(Mutex::new(Some(guard)));
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    Registry::default()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(file)
        .try_init()?;
    Ok(())
}

fn rolling_appender(
    path: &Path,
    rotation: Option<&str>,
) -> tracing_appender::rolling::RollingFileAppender {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map_or_else(|| "relay.log".into(), |n| n.to_os_string());
    match rotation.map(str::to_ascii_lowercase).as_deref() {
        Some("daily") => tracing_appender::rolling::daily(dir, name),
        Some("hourly") => tracing_appender::rolling::hourly(dir, name),
        _ => tracing_appender::rolling::never(dir, name),
    }
}
