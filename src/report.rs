//! Presentation of parsing outcomes

use gc_log_parser::{
    gc_events::{DateTimeStamp, JvmEvent, Seconds},
    Diagnostics, EventSink,
};
use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    io::{self, Write},
};

/// EventSink that serializes events as JSON lines
#[derive(Debug, Default)]
pub struct JsonLines {
    /// Serialized events
    buffer: Vec<u8>,

    /// First serialization error, after which events are dropped
    error: Option<serde_json::Error>,
}
//
impl JsonLines {
    /// Serialized events, one per line
    pub fn into_bytes(self) -> Result<Vec<u8>, serde_json::Error> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.buffer),
        }
    }
}
//
impl EventSink for JsonLines {
    fn record(&mut self, event: JvmEvent) {
        if self.error.is_some() {
            return;
        }
        match serde_json::to_writer(&mut self.buffer, &event) {
            Ok(()) => self.buffer.push(b'\n'),
            Err(e) => self.error = Some(e),
        }
    }
}

/// Statistics about one kind of event
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KindStats {
    /// Number of events
    pub count: usize,

    /// Sum of the event durations
    pub total_duration: Seconds,

    /// Longest event
    pub max_duration: Seconds,
}

/// EventSink that only keeps summary statistics
#[derive(Clone, Debug, Default)]
pub struct Summary {
    /// Statistics by kind of event
    kinds: BTreeMap<&'static str, KindStats>,

    /// Time during which the application was stopped
    pause_time: Seconds,

    /// Start of the first event
    first: Option<DateTimeStamp>,

    /// End of the log
    end: Option<DateTimeStamp>,
}
//
impl Summary {
    /// Statistics about one kind of event
    pub fn kind(&self, name: &str) -> Option<&KindStats> {
        self.kinds.get(name)
    }

    /// Time during which the application was stopped
    pub fn pause_time(&self) -> Seconds {
        self.pause_time
    }

    /// Fraction of the logged time during which the application could run
    pub fn throughput(&self) -> Option<f64> {
        let span = self.end?.seconds_since(&self.first?)?;
        (span > 0.0).then(|| 1.0 - self.pause_time / span)
    }
}
//
impl EventSink for Summary {
    fn record(&mut self, event: JvmEvent) {
        self.first.get_or_insert(event.start());
        let duration = match &event {
            JvmEvent::Pause(pause) => {
                self.pause_time += pause.duration;
                pause.duration
            }
            JvmEvent::Concurrent(phase) => phase.duration,
            JvmEvent::Zgc(cycle) => {
                self.pause_time += cycle.total_pause_time();
                cycle.duration
            }
            JvmEvent::Termination(termination) => {
                self.end = Some(termination.at);
                return;
            }
        };
        let stats = self.kinds.entry(event.kind_name()).or_default();
        stats.count += 1;
        stats.total_duration += duration;
        stats.max_duration = stats.max_duration.max(duration);
    }
}
//
impl Display for Summary {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.kinds.is_empty() {
            writeln!(f, "No garbage collection event")?;
        } else {
            writeln!(f, "Events by kind:")?;
            for (name, stats) in &self.kinds {
                writeln!(
                    f,
                    "- {name}: {} event(s), {:.3}s total, {:.3}s max",
                    stats.count, stats.total_duration, stats.max_duration
                )?;
            }
        }
        writeln!(f, "Total pause time: {:.3}s", self.pause_time)?;
        if let Some(throughput) = self.throughput() {
            writeln!(f, "Throughput: {:.2} %", throughput * 100.0)?;
        }
        Ok(())
    }
}

/// Display an overview of what went wrong while parsing a log
pub fn write_diagnostics(
    mut out: impl Write,
    diagnostics: &Diagnostics,
    max_entries: usize,
) -> io::Result<()> {
    let entries = diagnostics.entries();
    writeln!(
        out,
        "Diagnostics: {} problem(s), {} missed line(s), {} ignored line(s)",
        entries.len(),
        diagnostics.missed_lines(),
        diagnostics.ignored_lines()
    )?;
    for entry in entries.iter().take(max_entries) {
        writeln!(out, "- {entry}")?;
    }
    if entries.len() > max_entries {
        writeln!(out, "- ... and {} more", entries.len() - max_entries)?;
    }
    Ok(())
}
