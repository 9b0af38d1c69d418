//! G1 before unified logging
//!
//! With -XX:+PrintGCDetails, a G1 pause is printed as a header line, an
//! indented breakdown of its sub-phases, a `[Eden: ...]` heap report and a
//! CPU breakdown, which terminates the pause.

use super::{
    abandon_end, abandon_start, is_common_ignorable, metadata_pool, metaspace_part, pre_unified_references,
    pre_unified_sub_phases, CPU_LINE,
};
use crate::{
    dispatch::RuleTable,
    forward::{ConcurrentForwardReference, ForwardReference, PauseForwardReference, Slot},
    grammar::{
        before_after, before_after_size, pool_before_after, CPU_BREAKDOWN, DECIMAL, GC_CAUSE,
        PAUSE_TIME, STAMP,
    },
    parser::{rule, Dialect, Handler, HandlerError, ParseContext},
    trace::Trace,
};
use gc_events::{ConcurrentKind, MemoryPool, PauseFlag, PauseKind};
use std::sync::OnceLock;

/// Parser state of the pre-unified G1 dialect
#[derive(Debug)]
pub struct PreUnifiedG1 {
    /// Pause waiting for its breakdown, heap report or CPU breakdown
    pause: Slot<PauseForwardReference>,

    /// Concurrent phase
    concurrent: Slot<ConcurrentForwardReference>,
}
//
impl Default for PreUnifiedG1 {
    fn default() -> Self {
        Self {
            pause: Slot::new("pause"),
            concurrent: Slot::new("concurrent"),
        }
    }
}
//
impl Dialect for PreUnifiedG1 {
    const NAME: &'static str = "pre-unified G1";
    const UNIFIED: bool = false;

    fn rules() -> &'static RuleTable<Handler<Self>> {
        static RULES: OnceLock<RuleTable<Handler<PreUnifiedG1>>> = OnceLock::new();
        RULES.get_or_init(|| {
            let bas = before_after_size();
            let pool = pool_before_after();
            let survivors = before_after();
            let meta = metaspace_part();
            let collection = r"\((young|mixed)\)((?: \([a-z -]+\))*)";
            let phase = "(root-region-scan|mark|cleanup)";
            RuleTable::new([
                rule(
                    "PAUSE_START",
                    format!(r"^{STAMP}\[GC pause(?: {GC_CAUSE})? {collection}, {PAUSE_TIME}\]\s*$"),
                    Self::pause_start,
                ),
                rule(
                    "PAUSE",
                    format!(r"^{STAMP}\[GC pause(?: {GC_CAUSE})? {collection} {bas}, {PAUSE_TIME}\]\s*$"),
                    Self::pause,
                ),
                rule(
                    "PARALLEL_TIME",
                    format!(r"^\s+\[Parallel Time: {DECIMAL} ms, GC Workers: (\d+)\]\s*$"),
                    Self::parallel_time,
                ),
                rule(
                    "WORKER_STATISTICS",
                    format!(
                        r"^\s+\[([A-Z][A-Za-z ]*?) \(ms\): Min: [\d.]+, Avg: {DECIMAL}, Max: [\d.]+, Diff: [\d.]+, Sum: [\d.]+\]\s*$"
                    ),
                    Self::worker_statistics,
                ),
                rule(
                    "WORKER_DETAILS",
                    r"^\s+\[[A-Z][A-Za-z ]*(?: \(ms\))?: (?:Min|skipped)",
                    Self::worker_details,
                ),
                rule(
                    "SUB_PHASE",
                    format!(r"^\s+\[([A-Z][A-Za-z ]*): {DECIMAL} ms\]\s*$"),
                    Self::sub_phase,
                ),
                rule(
                    "HEAP_REPORT",
                    format!(r"^\s+\[Eden: {pool} Survivors: {survivors} Heap: {pool}\]{meta}\s*$"),
                    Self::heap_report,
                ),
                rule(CPU_LINE, format!(r"^\s*{CPU_BREAKDOWN}\s*$"), Self::cpu),
                rule(
                    "FULL",
                    format!(r"^{STAMP}\[Full GC(?: {GC_CAUSE})?\s+{bas}, {PAUSE_TIME}\]\s*$"),
                    Self::full,
                ),
                rule(
                    "REMARK",
                    format!(r"^{STAMP}\[GC remark(.*), {PAUSE_TIME}\]\s*$"),
                    Self::remark,
                ),
                rule(
                    "CLEANUP",
                    format!(r"^{STAMP}\[GC cleanup {bas}, {PAUSE_TIME}\]\s*$"),
                    Self::cleanup,
                ),
                rule(
                    "CONCURRENT_START",
                    format!(r"^{STAMP}\[GC concurrent-{phase}-start\]\s*$"),
                    Self::concurrent_start,
                ),
                rule(
                    "CONCURRENT_END",
                    format!(r"^{STAMP}\[GC concurrent-{phase}-end, {PAUSE_TIME}\]\s*$"),
                    Self::concurrent_end,
                ),
                rule(
                    "CONCURRENT_MARK_ABORT",
                    format!(r"^{STAMP}\[GC concurrent-mark-abort\]\s*$"),
                    Self::mark_abort,
                ),
                rule("COMMAND_LINE", r"^CommandLine flags: (.*)$", Self::command_line),
                rule("HEAP_EXIT", r"^Heap\s*$", Self::exit),
            ])
        })
    }

    fn is_ignorable(body: &str) -> bool {
        is_common_ignorable(body) || body.contains("[GC concurrent-mark-reset-for-overflow]")
    }

    fn abandon(&mut self, rule: &'static str, _trace: &Trace<'_>, ctx: &mut ParseContext<'_>) {
        match rule {
            "PAUSE_START" | "PAUSE" | "FULL" | "REMARK" | "CLEANUP" => {
                abandon_start(&mut self.pause, ctx)
            }
            "PARALLEL_TIME" | "WORKER_STATISTICS" | "WORKER_DETAILS" | "SUB_PHASE"
            | "HEAP_REPORT" => ctx.abandon(&mut self.pause),
            CPU_LINE => abandon_end(&mut self.pause, ctx),
            "CONCURRENT_START" => abandon_start(&mut self.concurrent, ctx),
            "CONCURRENT_END" => abandon_end(&mut self.concurrent, ctx),
            _ => {}
        }
    }

    fn drain_in_flight(&mut self) -> Vec<ForwardReference> {
        self.pause
            .try_take()
            .map(ForwardReference::from)
            .into_iter()
            .chain(self.concurrent.try_take().map(ForwardReference::from))
            .collect()
    }
}
//
impl PreUnifiedG1 {
    /// Header of a detailed young or mixed pause
    fn pause_start(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut pause = new_pause(trace, ctx)?;
        pause.set_duration(trace.decimal(4)?)?;
        ctx.open(&mut self.pause, pause);
        Ok(())
    }

    /// Young or mixed pause on a single line
    fn pause(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut pause = new_pause(trace, ctx)?;
        pause.set_pool(MemoryPool::Heap, trace.occupancy_before_after_size(4)?)?;
        pause.set_duration(trace.decimal(10)?)?;
        self.complete(pause, ctx)
    }

    fn parallel_time(&mut self, trace: &Trace, _ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.pause.get_mut()?;
        pause.add_phase("Parallel Time", trace.milliseconds(1)?)?;
        pause.set_workers(trace.small_integer(2)?)?;
        Ok(())
    }

    /// Per-worker durations, of which the average is kept
    fn worker_statistics(&mut self, trace: &Trace, _ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.pause.get_mut()?;
        pause.add_phase(trace.group(1)?, trace.milliseconds(2)?)?;
        Ok(())
    }

    /// Per-worker timestamps and counters
    fn worker_details(&mut self, _trace: &Trace, _ctx: &mut ParseContext) -> Result<(), HandlerError> {
        self.pause.get_mut()?;
        Ok(())
    }

    fn sub_phase(&mut self, trace: &Trace, _ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.pause.get_mut()?;
        pause.add_phase(trace.group(1)?, trace.milliseconds(2)?)?;
        Ok(())
    }

    /// `[Eden: ... Survivors: ... Heap: ...]` report
    ///
    /// Full collections already reported the heap on their first line, this
    /// report is more precise and takes precedence.
    fn heap_report(&mut self, trace: &Trace, _ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.pause.get_mut()?;
        pause.set_pool(MemoryPool::Eden, trace.memory_pool_before_after(1)?)?;
        pause.set_pool(MemoryPool::Survivor, trace.occupancy_before_after(9)?)?;
        pause.reemit_pool(MemoryPool::Heap, trace.memory_pool_before_after(13)?);
        if let Some(label) = trace.optional_group(21)? {
            pause.set_pool(metadata_pool(label), trace.occupancy_before_after_size(22)?)?;
        }
        Ok(())
    }

    fn cpu(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut pause = self.pause.take()?;
        pause.set_cpu(trace.cpu_summary(1)?)?;
        ctx.emit_pause(pause)
    }

    fn full(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut pause = PauseForwardReference::new(PauseKind::G1Full, None, ctx.now);
        pause.set_cause(trace.gc_cause(1)?)?;
        pause.set_pool(MemoryPool::Heap, trace.occupancy_before_after_size(2)?)?;
        pause.set_duration(trace.decimal(8)?)?;
        self.complete(pause, ctx)
    }

    fn remark(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut pause = PauseForwardReference::new(PauseKind::G1Remark, None, ctx.now);
        let details = trace.group(1)?;
        for (name, duration) in pre_unified_sub_phases(details)? {
            if !name.ends_with("Reference") {
                pause.add_phase(name, duration)?;
            }
        }
        if let Some(references) = pre_unified_references(details)? {
            pause.set_references(references)?;
        }
        pause.set_duration(trace.decimal(2)?)?;
        self.complete(pause, ctx)
    }

    fn cleanup(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut pause = PauseForwardReference::new(PauseKind::G1Cleanup, None, ctx.now);
        pause.set_pool(MemoryPool::Heap, trace.occupancy_before_after_size(1)?)?;
        pause.set_duration(trace.decimal(7)?)?;
        self.complete(pause, ctx)
    }

    fn concurrent_start(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let phase = ConcurrentForwardReference::new(concurrent_kind(trace.group(1)?), None, ctx.now);
        ctx.open(&mut self.concurrent, phase);
        Ok(())
    }

    fn concurrent_end(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let kind = concurrent_kind(trace.group(1)?);
        let mut phase = self.concurrent.take()?;
        if phase.kind() != kind {
            ctx.protocol_violation(self.concurrent.name(), &phase);
            return Err(HandlerError::NoEventInFlight {
                slot: self.concurrent.name(),
                gc_id: None,
            });
        }
        phase.set_duration(trace.decimal(2)?)?;
        ctx.emit_concurrent(phase)
    }

    /// Concurrent marking was aborted, usually by a full collection
    ///
    /// The aborted marking is reported as lasting until the abort.
    fn mark_abort(&mut self, _trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let start = match self.concurrent.try_take() {
            Some(mark) if mark.kind() == ConcurrentKind::G1Mark => mark.start(),
            Some(other) => {
                ctx.protocol_violation(self.concurrent.name(), &other);
                ctx.now
            }
            None => ctx.now,
        };
        let mut abort = ConcurrentForwardReference::new(ConcurrentKind::G1MarkAbort, None, start);
        abort.set_duration(ctx.now.seconds_since(&start).unwrap_or(0.0).max(0.0))?;
        ctx.emit_concurrent(abort)
    }

    fn command_line(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        ctx.config.apply_command_line(trace.group(1)?);
        Ok(())
    }

    fn exit(&mut self, _trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        ctx.terminate();
        Ok(())
    }

    /// Emit a pause, unless a detailed log will say more about it
    fn complete(
        &mut self,
        pause: PauseForwardReference,
        ctx: &mut ParseContext,
    ) -> Result<(), HandlerError> {
        if ctx.config.details {
            ctx.open(&mut self.pause, pause);
            Ok(())
        } else {
            ctx.emit_pause(pause)
        }
    }
}

/// Young or mixed pause from the `(cause) (young|mixed) (modifiers)` header
/// groups 1 to 3
fn new_pause(trace: &Trace, ctx: &ParseContext) -> Result<PauseForwardReference, HandlerError> {
    let modifiers = trace.group(3)?;
    let kind = match trace.group(2)? {
        "mixed" => PauseKind::G1Mixed,
        _ if modifiers.contains("(initial-mark)") => PauseKind::G1ConcurrentStart,
        _ => PauseKind::G1Young,
    };
    let mut pause = PauseForwardReference::new(kind, None, ctx.now);
    pause.set_cause(trace.gc_cause(1)?)?;
    if modifiers.contains("(to-space exhausted)") || modifiers.contains("(to-space overflow)") {
        pause.add_flag(PauseFlag::ToSpaceExhausted);
    }
    Ok(pause)
}

fn concurrent_kind(phase: &str) -> ConcurrentKind {
    match phase {
        "root-region-scan" => ConcurrentKind::G1RootRegionScan,
        "mark" => ConcurrentKind::G1Mark,
        _ => ConcurrentKind::G1Cleanup,
    }
}
