//! Per-tick telemetry sinks.
//!
//! The loop hands every `TickReport` to one explicitly constructed sink.
//! Sinks are best-effort: a failing sink logs and carries on, it never
//! affects the next tick.
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use eyre::WrapErr;

use crate::error::Result;
use crate::status::TickReport;

pub trait TelemetrySink: Send {
    fn record(&mut self, report: &TickReport);
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    fn record(&mut self, report: &TickReport) {
        (**self).record(report);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&mut self, _report: &TickReport) {}
}

/// Emits one structured `tracing` event per tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&mut self, r: &TickReport) {
        tracing::info!(
            target: "relay::telemetry",
            tick = r.tick,
            phase = ?r.phase,
            pv = r.pv,
            sp = r.sp,
            err = r.err,
            weight = r.weight,
            mean = r.mean,
            mv = r.mv,
            dispatched = ?r.dispatched,
            "tick"
        );
    }
}

/// Writes one JSON object per tick, one per line.
#[derive(Debug)]
pub struct JsonlSink<W: Write> {
    out: W,
    broken: bool,
}

impl JsonlSink<BufWriter<File>> {
    /// Append to `path`, creating it if needed.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("opening telemetry file {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonlSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, broken: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, r: &TickReport) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, r)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write + Send> TelemetrySink for JsonlSink<W> {
    fn record(&mut self, r: &TickReport) {
        if let Err(e) = self.write_line(r) {
            // Warn once; later failures are expected to repeat.
            if !self.broken {
                tracing::warn!(error = %e, "telemetry write failed");
                self.broken = true;
            }
        }
    }
}

/// Forwards every report to each inner sink in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn TelemetrySink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TelemetrySink for FanoutSink {
    fn record(&mut self, report: &TickReport) {
        for s in &mut self.sinks {
            s.record(report);
        }
    }
}
