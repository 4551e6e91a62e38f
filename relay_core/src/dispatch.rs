//! Warmer/cooler dispatch.
//!
//! In detached mode every dispatch runs on its own short-lived thread that is
//! never joined, so a slow action cannot stall polling. The thread reports a
//! failure (error or panic) over a channel; the loop drains that channel at
//! the start of each tick and treats anything found there as fatal.
//!
//! The spawned thread owns only the magnitude and a clone of the action's
//! `Arc`; it shares no mutable state with the loop.
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use eyre::WrapErr;
use relay_traits::Action;
use serde::Serialize;

use crate::config::DispatchMode;
use crate::error::{PluginRole, RelayError, Result};
use crate::plugin_error::map_plugin_error;

/// What a tick did with its MV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// MV was 0.
    Stabilized,
    Warmer,
    Cooler,
    /// MV > 0 but no warmer is configured.
    NoWarmer,
    /// MV < 0 but no cooler is configured.
    NoCooler,
}

impl DispatchOutcome {
    pub fn invoked_action(self) -> bool {
        matches!(self, DispatchOutcome::Warmer | DispatchOutcome::Cooler)
    }
}

pub struct ActionDispatcher {
    warmer: Option<Arc<dyn Action>>,
    cooler: Option<Arc<dyn Action>>,
    mode: DispatchMode,
    failures_tx: xch::Sender<RelayError>,
    failures_rx: xch::Receiver<RelayError>,
    in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("warmer", &self.warmer.is_some())
            .field("cooler", &self.cooler.is_some())
            .field("mode", &self.mode)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl ActionDispatcher {
    pub fn new(
        warmer: Option<Arc<dyn Action>>,
        cooler: Option<Arc<dyn Action>>,
        mode: DispatchMode,
    ) -> Self {
        let (failures_tx, failures_rx) = xch::unbounded();
        Self {
            warmer,
            cooler,
            mode,
            failures_tx,
            failures_rx,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Detached dispatches that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Route `mv` to the warmer (positive) or cooler (negative). The cooler
    /// receives the signed value.
    pub fn dispatch(&self, mv: i64) -> Result<DispatchOutcome> {
        if mv > 0 {
            match &self.warmer {
                Some(a) => {
                    tracing::debug!(mv, "adding heat");
                    self.invoke(PluginRole::Warmer, a, mv)?;
                    Ok(DispatchOutcome::Warmer)
                }
                None => {
                    tracing::warn!(mv, "too cold, no warmer configured");
                    Ok(DispatchOutcome::NoWarmer)
                }
            }
        } else if mv < 0 {
            match &self.cooler {
                Some(a) => {
                    tracing::debug!(mv, "removing heat");
                    self.invoke(PluginRole::Cooler, a, mv)?;
                    Ok(DispatchOutcome::Cooler)
                }
                None => {
                    tracing::warn!(mv, "too hot, no cooler configured");
                    Ok(DispatchOutcome::NoCooler)
                }
            }
        } else {
            tracing::info!("stabilized PV at setpoint");
            Ok(DispatchOutcome::Stabilized)
        }
    }

    /// Fail with the first failure any detached dispatch has reported.
    pub fn check_failures(&self) -> Result<()> {
        match self.failures_rx.try_recv() {
            Ok(e) => Err(eyre::Report::new(e).wrap_err("detached action failed")),
            Err(_) => Ok(()),
        }
    }

    /// Wait up to `timeout` for detached dispatches to finish, then fail with
    /// the first failure any of them reported.
    pub fn drain(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        let pending = self.in_flight();
        if pending > 0 {
            tracing::warn!(pending, "detached dispatches still running");
        }
        self.check_failures()
    }

    fn invoke(&self, role: PluginRole, action: &Arc<dyn Action>, mv: i64) -> Result<()> {
        match self.mode {
            DispatchMode::Blocking => action
                .apply(mv)
                .map_err(|e| eyre::Report::new(map_plugin_error(role, &*e)))
                .wrap_err_with(|| format!("dispatching {role} with {mv}")),
            DispatchMode::Detached => self.spawn(role, Arc::clone(action), mv),
        }
    }

    fn spawn(&self, role: PluginRole, action: Arc<dyn Action>, mv: i64) -> Result<()> {
        let tx = self.failures_tx.clone();
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::AcqRel);
        let spawned = std::thread::Builder::new()
            .name(format!("relay-{role}"))
            .spawn(move || {
                let failure = match catch_unwind(AssertUnwindSafe(|| action.apply(mv))) {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(map_plugin_error(role, &*e)),
                    Err(payload) => Some(RelayError::Panicked {
                        role,
                        reason: panic_message(payload.as_ref()),
                    }),
                };
                if let Some(f) = failure {
                    tracing::error!(error = %f, mv, "detached dispatch failed");
                    // The loop may already be gone; nothing left to report to.
                    let _ = tx.send(f);
                }
                in_flight.fetch_sub(1, Ordering::AcqRel);
            });
        match spawned {
            Ok(_detached) => Ok(()),
            Err(e) => {
                self.in_flight.fetch_sub(1, Ordering::AcqRel);
                Err(eyre::Report::new(RelayError::State(format!(
                    "could not spawn {role} thread: {e}"
                ))))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
