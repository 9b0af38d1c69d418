//! G1 with JDK 9+ unified logging
//!
//! Every line that is about a collection carries its GC id, and a concurrent
//! cycle keeps its own id while young pauses with later ids come and go, so
//! events in progress are keyed by GC id. A pause ends with a summary line
//! that is usually followed by a `gc,cpu` line.

use super::{
    abandon_keyed_end, abandon_keyed_start, is_unified_ignorable, record_unified_metaspace,
    transition, unified_metaspace, AwaitingCpu, CPU_LINE,
};
use crate::{
    dispatch::RuleTable,
    forward::{ConcurrentForwardReference, ForwardReference, KeyedSlots, PauseForwardReference},
    grammar::{before_after_size, DECIMAL, GC_CAUSE, MEMORY_SIZE, UNIFIED_CPU_BREAKDOWN, UNIFIED_PAUSE_TIME},
    parser::{rule, Dialect, Handler, HandlerError, ParseContext},
    trace::Trace,
};
use gc_events::{ConcurrentKind, DateTimeStamp, MemoryPool, PauseFlag, PauseKind};
use phf::phf_map;
use std::sync::OnceLock;

/// Concurrent phases of a G1 marking cycle, by unified log name
static CONCURRENT_PHASES: phf::Map<&'static str, ConcurrentKind> = phf_map! {
    "Concurrent Clear Claimed Marks" => ConcurrentKind::G1ClearClaimedMarks,
    "Concurrent Scan Root Regions" => ConcurrentKind::G1RootRegionScan,
    "Concurrent Mark" => ConcurrentKind::G1Mark,
    "Concurrent Mark From Roots" => ConcurrentKind::G1MarkFromRoots,
    "Concurrent Preclean" => ConcurrentKind::G1Preclean,
    "Concurrent Rebuild Remembered Sets" => ConcurrentKind::G1RebuildRememberedSets,
    "Concurrent Rebuild Remembered Sets and Scrub Regions" => ConcurrentKind::G1RebuildRememberedSets,
    "Concurrent Complete Cleanup" => ConcurrentKind::G1Cleanup,
    "Concurrent Cleanup for Next Mark" => ConcurrentKind::G1CleanupForNextMark,
};

/// Parser state of the unified G1 dialect
#[derive(Debug)]
pub struct UnifiedG1 {
    /// Pauses whose summary line was not seen yet
    pauses: KeyedSlots<PauseForwardReference>,

    /// Concurrent cycles
    cycles: KeyedSlots<ConcurrentForwardReference>,

    /// Concurrent marking, which encloses other concurrent phases
    marks: KeyedSlots<ConcurrentForwardReference>,

    /// Other concurrent phases
    phases: KeyedSlots<ConcurrentForwardReference>,

    /// Finished pause that may still get a CPU breakdown
    awaiting_cpu: AwaitingCpu,
}
//
impl Default for UnifiedG1 {
    fn default() -> Self {
        Self {
            pauses: KeyedSlots::new("pause"),
            cycles: KeyedSlots::new("concurrent cycle"),
            marks: KeyedSlots::new("concurrent mark"),
            phases: KeyedSlots::new("concurrent phase"),
            awaiting_cpu: AwaitingCpu::default(),
        }
    }
}
//
impl Dialect for UnifiedG1 {
    const NAME: &'static str = "unified G1";
    const UNIFIED: bool = true;

    fn rules() -> &'static RuleTable<Handler<Self>> {
        static RULES: OnceLock<RuleTable<Handler<UnifiedG1>>> = OnceLock::new();
        RULES.get_or_init(|| {
            let bas = before_after_size();
            let pause = format!(
                r"^Pause (Young|Full|Remark|Cleanup|Mixed|Initial Mark)(?: \((Normal|Concurrent Start|Prepare Mixed|Mixed|Initial Mark)\))?(?: {GC_CAUSE})?"
            );
            let cycle = r"Concurrent (Mark |Undo )?Cycle";
            let phase = r"(Concurrent [A-Za-z ]+?)";
            RuleTable::new([
                rule("PAUSE_START", format!(r"{pause}\s*$"), Self::pause_start),
                rule(
                    "PAUSE_SUMMARY",
                    format!(r"{pause} {bas} {UNIFIED_PAUSE_TIME}\s*$"),
                    Self::pause_summary,
                ),
                rule(CPU_LINE, format!(r"^{UNIFIED_CPU_BREAKDOWN}\s*$"), Self::cpu),
                rule(
                    "WORKERS",
                    r"^Using (\d+) workers of (\d+) for (evacuation|full compaction|marking)\s*$",
                    Self::workers,
                ),
                rule(
                    "FULL_PHASE_END",
                    format!(r"^(Phase \d+: [A-Za-z ]+?) {UNIFIED_PAUSE_TIME}\s*$"),
                    Self::full_phase_end,
                ),
                rule("FULL_PHASE_START", r"^Phase \d+: [A-Za-z ]+$", Self::full_phase_start),
                rule(
                    "PAUSE_PHASE",
                    format!(r"^\s+([A-Z][A-Za-z ]*?): {DECIMAL}ms\s*$"),
                    Self::pause_phase,
                ),
                rule(
                    "REGIONS",
                    r"^(Eden|Survivor|Old|Humongous|Archive) regions: (\d+)->(\d+)(?:\((\d+)\))?\s*$",
                    Self::regions,
                ),
                rule("METASPACE", unified_metaspace(), Self::metaspace),
                rule(
                    "TO_SPACE_EXHAUSTED",
                    r"^(?:To-space exhausted|Evacuation Failure)",
                    Self::to_space_exhausted,
                ),
                rule(
                    "CYCLE_END",
                    format!(r"^{cycle} {UNIFIED_PAUSE_TIME}\s*$"),
                    Self::cycle_end,
                ),
                rule("CYCLE_START", format!(r"^{cycle}\s*$"), Self::cycle_start),
                rule("MARK_ABORT", r"^Concurrent Mark Abort\s*$", Self::mark_abort),
                rule(
                    "CONCURRENT_END",
                    format!(r"^{phase}(?: \({DECIMAL}s, {DECIMAL}s\))? {UNIFIED_PAUSE_TIME}\s*$"),
                    Self::concurrent_end,
                ),
                rule(
                    "CONCURRENT_START",
                    format!(r"^{phase}(?: \({DECIMAL}s\))?\s*$"),
                    Self::concurrent_start,
                ),
                rule(
                    "REGION_SIZE",
                    format!(r"^Heap [Rr]egion [Ss]ize: {MEMORY_SIZE}\s*$"),
                    Self::region_size,
                ),
                rule(
                    "HEAP_CAPACITY",
                    format!(r"^Heap (Initial|Max) Capacity: {MEMORY_SIZE}\s*$"),
                    Self::heap_capacity,
                ),
                rule("HEAP_EXIT", r"^Heap\s*$", Self::exit),
            ])
        })
    }

    fn is_ignorable(body: &str) -> bool {
        is_unified_ignorable(body) || body.contains("(ms):")
    }

    fn before_line(
        &mut self,
        rule: Option<&'static str>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<(), HandlerError> {
        if rule == Some(CPU_LINE) {
            return Ok(());
        }
        self.awaiting_cpu.flush(ctx)
    }

    fn abandon(&mut self, rule: &'static str, trace: &Trace<'_>, ctx: &mut ParseContext<'_>) {
        let Some(gc_id) = ctx.gc_id else {
            return;
        };
        match rule {
            "PAUSE_START" => abandon_keyed_start(&mut self.pauses, gc_id, ctx),
            "WORKERS" | "FULL_PHASE_START" | "FULL_PHASE_END" | "PAUSE_PHASE" | "REGIONS"
            | "METASPACE" | "TO_SPACE_EXHAUSTED" => ctx.abandon_keyed(&mut self.pauses, gc_id),
            "PAUSE_SUMMARY" => {
                abandon_keyed_end(&mut self.pauses, gc_id, ctx);
                self.awaiting_cpu.abandon(gc_id, ctx);
            }
            CPU_LINE => self.awaiting_cpu.abandon(gc_id, ctx),
            "CYCLE_START" => abandon_keyed_start(&mut self.cycles, gc_id, ctx),
            "CYCLE_END" => {
                abandon_keyed_end(&mut self.cycles, gc_id, ctx);
                ctx.emitter.close_cycle(gc_id);
            }
            "CONCURRENT_START" | "CONCURRENT_END" => {
                let Some(kind) = trace.group(1).ok().and_then(|name| concurrent_kind(name).ok()) else {
                    return;
                };
                let slots = self.slots(kind);
                if rule == "CONCURRENT_START" {
                    abandon_keyed_start(slots, gc_id, ctx);
                } else {
                    abandon_keyed_end(slots, gc_id, ctx);
                }
            }
            _ => {}
        }
    }

    fn drain_in_flight(&mut self) -> Vec<ForwardReference> {
        let mut in_flight = Vec::new();
        in_flight.extend(self.awaiting_cpu.drain());
        in_flight.extend(self.pauses.drain().map(ForwardReference::from));
        in_flight.extend(self.phases.drain().map(ForwardReference::from));
        in_flight.extend(self.marks.drain().map(ForwardReference::from));
        in_flight.extend(self.cycles.drain().map(ForwardReference::from));
        in_flight
    }
}
//
impl UnifiedG1 {
    fn pause_start(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let pause = new_pause(trace, gc_id, ctx.now)?;
        ctx.open_keyed(&mut self.pauses, gc_id, pause);
        Ok(())
    }

    /// `Pause ... before->after(size) t ms`, which completes the pause
    ///
    /// Without -Xlog:gc* this is the only line of the pause, which is then
    /// assumed to have ended when the line was written.
    fn pause_summary(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let duration = trace.pause_time()?;
        let mut pause = match self.pauses.resume(gc_id) {
            Ok(Some(pause)) => pause,
            Ok(None) => new_pause(trace, gc_id, ctx.now.add_seconds(-duration))?,
            Err(e) => {
                self.awaiting_cpu.abandon(gc_id, ctx);
                return Err(e);
            }
        };
        pause.set_pool(MemoryPool::Heap, trace.occupancy_before_after_size(4)?)?;
        pause.set_duration(duration)?;
        self.awaiting_cpu.hold(gc_id, pause, false, ctx)
    }

    fn cpu(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let cpu = trace.cpu_summary(1)?;
        self.awaiting_cpu.attach(gc_id, cpu, ctx)
    }

    /// Worker count of a pause, or of concurrent marking where it is not
    /// recorded
    fn workers(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        if let Some(pause) = self.pauses.peek_mut(gc_id) {
            pause.set_workers(trace.small_integer(1)?)?;
            return Ok(());
        }
        if self.marks.contains(gc_id) || self.phases.contains(gc_id) {
            return Ok(());
        }
        self.pauses.get_mut(gc_id).map(|_| ())
    }

    fn full_phase_start(&mut self, _trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        self.pauses.get_mut(ctx.require_gc_id()?)?;
        Ok(())
    }

    fn full_phase_end(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.pauses.get_mut(ctx.require_gc_id()?)?;
        pause.add_phase(trace.group(1)?, trace.pause_time()?)?;
        Ok(())
    }

    fn pause_phase(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.pauses.get_mut(ctx.require_gc_id()?)?;
        pause.add_phase(trace.group(1)?, trace.milliseconds(2)?)?;
        Ok(())
    }

    /// `<kind> regions: before->after(target)`, converted to kilobytes
    fn regions(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.pauses.get_mut(ctx.require_gc_id()?)?;
        let pool = match trace.group(1)? {
            "Eden" => MemoryPool::Eden,
            "Survivor" => MemoryPool::Survivor,
            "Old" => MemoryPool::Old,
            "Humongous" => MemoryPool::Humongous,
            _ => MemoryPool::Archive,
        };
        let regions = |count| ctx.config.regions(count).ok_or(HandlerError::MissingRegionSize);
        let before = regions(trace.integer(2)?)?;
        let after = regions(trace.integer(3)?)?;
        let size = match trace.optional_group(4)? {
            Some(_) => Some(regions(trace.integer(4)?)?),
            None => None,
        };
        pause.set_pool(pool, transition(before, after, size))?;
        Ok(())
    }

    fn metaspace(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.pauses.get_mut(ctx.require_gc_id()?)?;
        record_unified_metaspace(pause, trace)
    }

    fn to_space_exhausted(&mut self, _trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.pauses.get_mut(ctx.require_gc_id()?)?;
        pause.add_flag(PauseFlag::ToSpaceExhausted);
        Ok(())
    }

    /// Start of a concurrent cycle, whose summary must precede the events of
    /// the pauses that run meanwhile
    fn cycle_start(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let cycle = ConcurrentForwardReference::new(cycle_kind(trace)?, Some(gc_id), ctx.now);
        ctx.open_keyed(&mut self.cycles, gc_id, cycle);
        ctx.emitter.open_cycle(gc_id);
        Ok(())
    }

    fn cycle_end(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let mut cycle = self.cycles.take(gc_id)?;
        if cycle.kind() != cycle_kind(trace)? {
            log::warn!("Concurrent cycle GC({gc_id}) ended as a different kind of cycle");
        }
        let outcome = cycle
            .set_duration(trace.pause_time()?)
            .map_err(HandlerError::from)
            .and_then(|()| ctx.emit_concurrent(cycle));
        ctx.emitter.close_cycle(gc_id);
        outcome
    }

    /// Marking was aborted by a full collection
    fn mark_abort(&mut self, _trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        if let Some(phase) = self.phases.try_take(gc_id) {
            log::debug!("Dropping {:?} GC({gc_id}), interrupted by a mark abort", phase.kind());
        }
        let start = self.marks.try_take(gc_id).map_or(ctx.now, |mark| mark.start());
        let mut abort = ConcurrentForwardReference::new(ConcurrentKind::G1MarkAbort, Some(gc_id), start);
        abort.set_duration(ctx.now.seconds_since(&start).unwrap_or(0.0).max(0.0))?;
        ctx.emit_concurrent(abort)
    }

    fn concurrent_start(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let kind = concurrent_kind(trace.group(1)?)?;
        let phase = ConcurrentForwardReference::new(kind, Some(gc_id), ctx.now);
        let slots = self.slots(kind);
        ctx.open_keyed(slots, gc_id, phase);
        Ok(())
    }

    fn concurrent_end(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let kind = concurrent_kind(trace.group(1)?)?;
        let mut phase = self.slots(kind).take(gc_id)?;
        phase.set_duration(trace.pause_time()?)?;
        ctx.emit_concurrent(phase)
    }

    fn region_size(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        ctx.config.set_region_size(trace.memory(1)?);
        Ok(())
    }

    fn heap_capacity(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let size = trace.memory(2)?;
        match trace.group(1)? {
            "Initial" => ctx.config.set_initial_heap(size),
            _ => ctx.config.set_max_heap(size),
        }
        Ok(())
    }

    fn exit(&mut self, _trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        ctx.terminate();
        Ok(())
    }

    /// Slots where some kind of concurrent phase is tracked
    fn slots(&mut self, kind: ConcurrentKind) -> &mut KeyedSlots<ConcurrentForwardReference> {
        match kind {
            ConcurrentKind::G1Mark => &mut self.marks,
            _ => &mut self.phases,
        }
    }
}

/// Start a pause from the groups of a `Pause <name> (<qualifier>) (<cause>)`
/// prefix
fn new_pause(
    trace: &Trace,
    gc_id: u32,
    start: DateTimeStamp,
) -> Result<PauseForwardReference, HandlerError> {
    let (kind, flag) = pause_kind(trace.group(1)?, trace.optional_group(2)?);
    let mut pause = PauseForwardReference::new(kind, Some(gc_id), start);
    pause.set_cause(trace.gc_cause(3)?)?;
    if let Some(flag) = flag {
        pause.add_flag(flag);
    }
    Ok(pause)
}

/// Kind of pause, given its name and the qualifier that JDK 11+ add to young
/// pauses
fn pause_kind(name: &str, qualifier: Option<&str>) -> (PauseKind, Option<PauseFlag>) {
    match (name, qualifier) {
        ("Full", _) => (PauseKind::G1Full, None),
        ("Remark", _) => (PauseKind::G1Remark, None),
        ("Cleanup", _) => (PauseKind::G1Cleanup, None),
        ("Initial Mark", _) | (_, Some("Concurrent Start" | "Initial Mark")) => {
            (PauseKind::G1ConcurrentStart, None)
        }
        ("Mixed", _) | (_, Some("Mixed")) => (PauseKind::G1Mixed, None),
        (_, Some("Prepare Mixed")) => (PauseKind::G1Young, Some(PauseFlag::PrepareMixed)),
        _ => (PauseKind::G1Young, None),
    }
}

fn cycle_kind(trace: &Trace) -> Result<ConcurrentKind, HandlerError> {
    Ok(match trace.optional_group(1)? {
        Some("Undo ") => ConcurrentKind::G1UndoCycle,
        _ => ConcurrentKind::G1Cycle,
    })
}

fn concurrent_kind(name: &str) -> Result<ConcurrentKind, HandlerError> {
    CONCURRENT_PHASES
        .get(name)
        .copied()
        .ok_or_else(|| HandlerError::UnknownPhase(name.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::{Diagnostic, Diagnostics},
        diary::{CollectorFamily, Diary},
        parser::GcLogParser,
    };
    use assert_matches::assert_matches;
    use gc_events::{CpuSummary, GcCause, JvmEvent, MemoryPoolSummary};
    use maplit::btreeset;
    use more_asserts::assert_lt;
    use pretty_assertions::assert_eq;

    fn parse(lines: &[&str]) -> (Vec<JvmEvent>, Diagnostics) {
        let diary = Diary {
            collector: CollectorFamily::G1,
            unified: true,
            gc_id_tags: true,
            uptime_stamps: true,
            details: true,
            ..Diary::default()
        };
        let mut parser = GcLogParser::<UnifiedG1, _>::new(&diary, Vec::new());
        for line in lines {
            parser.receive(line);
        }
        parser.finish()
    }

    const YOUNG_PAUSE: &[&str] = &[
        "[0.010s][info][gc,init] Heap Region Size: 1M",
        "[0.015s][info][gc     ] Using G1",
        "[1.234s][info][gc,start    ] GC(0) Pause Young (Normal) (G1 Evacuation Pause)",
        "[1.234s][info][gc,task     ] GC(0) Using 8 workers of 8 for evacuation",
        "[1.240s][info][gc,phases   ] GC(0)   Pre Evacuate Collection Set: 0.1ms",
        "[1.240s][info][gc,phases   ] GC(0)   Evacuate Collection Set: 5.0ms",
        "[1.240s][info][gc,phases   ] GC(0)   Post Evacuate Collection Set: 0.3ms",
        "[1.240s][info][gc,phases   ] GC(0)   Other: 0.2ms",
        "[1.240s][info][gc,heap     ] GC(0) Eden regions: 24->0(22)",
        "[1.240s][info][gc,heap     ] GC(0) Survivor regions: 0->3(3)",
        "[1.240s][info][gc,heap     ] GC(0) Old regions: 0->2",
        "[1.240s][info][gc,heap     ] GC(0) Humongous regions: 0->0",
        "[1.240s][info][gc,metaspace] GC(0) Metaspace: 1019K(1216K)->1019K(1216K) NonClass: 925K(1024K)->925K(1024K) Class: 94K(192K)->94K(192K)",
        "[1.240s][info][gc          ] GC(0) Pause Young (Normal) (G1 Evacuation Pause) 24M->4M(256M) 6.123ms",
        "[1.240s][info][gc,cpu      ] GC(0) User=0.02s Sys=0.01s Real=0.01s",
    ];

    #[test]
    fn detailed_young_pause() {
        let (events, diagnostics) = parse(YOUNG_PAUSE);
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        assert_eq!(events.len(), 2);
        let JvmEvent::Pause(pause) = &events[0] else {
            panic!("expected a pause, got {:?}", events[0]);
        };
        assert_eq!(pause.kind, PauseKind::G1Young);
        assert_eq!(pause.gc_id, Some(0));
        assert_eq!(pause.start, DateTimeStamp::from_uptime(1.234));
        assert_eq!(pause.cause, Some(GcCause::G1EvacuationPause));
        assert_eq!(pause.workers, Some(8));
        assert_eq!(pause.phases.len(), 4);
        assert_eq!(
            pause.heap(),
            Some(&MemoryPoolSummary::with_final_size(24 * 1024, 4 * 1024, 256 * 1024))
        );
        assert_eq!(
            pause.pool(MemoryPool::Eden),
            Some(&transition(24 * 1024, 0, Some(22 * 1024)))
        );
        assert_eq!(pause.pool(MemoryPool::Old), Some(&transition(0, 2048, None)));
        assert_eq!(
            pause.pool(MemoryPool::ClassSpace),
            Some(&MemoryPoolSummary::new(94, 192, 94, 192))
        );
        assert_eq!(
            pause.cpu,
            Some(CpuSummary {
                user: 0.02,
                kernel: 0.01,
                wall_clock: 0.01
            })
        );
        assert_lt!((pause.duration - 0.006123).abs(), 1e-9);
        assert_matches!(&events[1], JvmEvent::Termination(_));
    }

    #[test]
    fn summary_only() {
        let (events, diagnostics) = parse(&[
            "[2.000s][info][gc] GC(3) Pause Young (Prepare Mixed) (G1 Evacuation Pause) 40M->10M(256M) 10.000ms",
            "[2.500s][info][gc] GC(4) Pause Full (System.gc()) 20M->5M(256M) 100.000ms",
        ]);
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let [JvmEvent::Pause(young), JvmEvent::Pause(full), JvmEvent::Termination(_)] = &events[..] else {
            panic!("unexpected events {events:?}");
        };
        assert_eq!(young.kind, PauseKind::G1Young);
        assert_eq!(young.flags, btreeset! {PauseFlag::PrepareMixed});
        assert_lt!((young.start.uptime.unwrap() - 1.99).abs(), 1e-9);
        assert_eq!(young.cpu, None);
        assert_eq!(full.kind, PauseKind::G1Full);
        assert_eq!(full.cause, Some(GcCause::SystemGc));
    }

    #[test]
    fn concurrent_cycle_holds_unrelated_pauses() {
        let (events, diagnostics) = parse(&[
            "[3.000s][info][gc,start] GC(5) Pause Young (Concurrent Start) (G1 Humongous Allocation)",
            "[3.010s][info][gc      ] GC(5) Pause Young (Concurrent Start) (G1 Humongous Allocation) 30M->20M(256M) 10.000ms",
            "[3.010s][info][gc,cpu  ] GC(5) User=0.02s Sys=0.00s Real=0.01s",
            "[3.011s][info][gc      ] GC(6) Concurrent Cycle",
            "[3.011s][info][gc,marking] GC(6) Concurrent Clear Claimed Marks",
            "[3.012s][info][gc,marking] GC(6) Concurrent Clear Claimed Marks 1.000ms",
            "[3.012s][info][gc,marking] GC(6) Concurrent Mark (3.012s)",
            "[3.012s][info][gc,marking] GC(6) Concurrent Mark From Roots",
            "[3.012s][info][gc,task   ] GC(6) Using 2 workers of 2 for marking",
            "[3.100s][info][gc,start  ] GC(7) Pause Young (Normal) (G1 Evacuation Pause)",
            "[3.105s][info][gc        ] GC(7) Pause Young (Normal) (G1 Evacuation Pause) 40M->22M(256M) 5.000ms",
            "[3.200s][info][gc,marking] GC(6) Concurrent Mark From Roots 188.000ms",
            "[3.200s][info][gc,marking] GC(6) Concurrent Mark (3.012s, 3.200s) 188.000ms",
            "[3.201s][info][gc,start  ] GC(6) Pause Remark",
            "[3.202s][info][gc        ] GC(6) Pause Remark 25M->25M(256M) 1.000ms",
            "[3.300s][info][gc        ] GC(6) Concurrent Cycle 289.000ms",
        ]);
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let kinds = events.iter().map(JvmEvent::kind_name).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                "G1 Concurrent Start",
                "G1 Concurrent Clear Claimed Marks",
                "G1 Concurrent Mark From Roots",
                "G1 Concurrent Mark",
                "G1 Remark",
                "G1 Concurrent Cycle",
                "G1 Young",
                "JVM Termination",
            ]
        );
        assert_eq!(events[6].gc_id(), Some(7));
    }

    #[test]
    fn aborted_marking() {
        let (events, diagnostics) = parse(&[
            "[1.000s][info][gc] GC(1) Concurrent Cycle",
            "[1.000s][info][gc,marking] GC(1) Concurrent Mark (1.000s)",
            "[1.000s][info][gc,marking] GC(1) Concurrent Mark From Roots",
            "[1.500s][info][gc,start] GC(2) Pause Full (G1 Compaction Pause)",
            "[1.500s][info][gc,phases,start] GC(2) Phase 1: Mark live objects",
            "[1.600s][info][gc,phases] GC(2) Phase 1: Mark live objects 100.000ms",
            "[1.800s][info][gc] GC(2) Pause Full (G1 Compaction Pause) 250M->100M(256M) 300.000ms",
            "[1.800s][info][gc] GC(1) Concurrent Mark Abort",
            "[1.800s][info][gc] GC(1) Concurrent Cycle 800.000ms",
        ]);
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let kinds = events.iter().map(JvmEvent::kind_name).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                "G1 Concurrent Mark Abort",
                "G1 Concurrent Cycle",
                "G1 Full",
                "JVM Termination"
            ]
        );
        assert_matches!(
            &events[0],
            JvmEvent::Concurrent(abort) if abort.start == DateTimeStamp::from_uptime(1.0)
        );
        assert_matches!(
            &events[2],
            JvmEvent::Pause(full) if full.phases.contains_key("Phase 1: Mark live objects")
        );
    }

    #[test]
    fn problems() {
        let (events, diagnostics) = parse(&[
            "[1.000s][info][gc,start] GC(0) Pause Young (Normal) (G1 Evacuation Pause)",
            "[1.001s][info][gc,heap] GC(0) Eden regions: 2->0(3)",
            "[1.002s][info][gc,marking] GC(0) Concurrent Frobnicate",
            "[1.003s][info][gc,cpu] GC(9) User=0.00s Sys=0.00s Real=0.00s",
            "[1.004s][info][gc] Something new",
        ]);
        assert_matches!(
            diagnostics.entries(),
            [
                Diagnostic::MalformedTrace { line_number: 2, rule: Some("REGIONS"), .. },
                Diagnostic::MalformedTrace { line_number: 3, rule: Some("CONCURRENT_START"), .. },
                Diagnostic::MalformedTrace { line_number: 4, rule: Some(CPU_LINE), .. },
                Diagnostic::UnrecognizedLine { line_number: 5, .. },
            ]
        );
        assert_matches!(&events[..], [JvmEvent::Termination(_)]);
    }

    #[test]
    fn regions_without_region_size() {
        // Log starting mid-run, after the Heap Region Size line
        let (events, diagnostics) = parse(&YOUNG_PAUSE[2..]);
        assert_matches!(
            diagnostics.entries(),
            [Diagnostic::MalformedTrace { line_number: 7, rule: Some("REGIONS"), .. }]
        );
        assert_eq!(diagnostics.ignored_lines(), 6);
        assert_matches!(&events[..], [JvmEvent::Termination(_)]);
    }

    #[test]
    fn pause_kinds() {
        assert_eq!(pause_kind("Young", Some("Normal")), (PauseKind::G1Young, None));
        assert_eq!(pause_kind("Young", None), (PauseKind::G1Young, None));
        assert_eq!(
            pause_kind("Young", Some("Concurrent Start")),
            (PauseKind::G1ConcurrentStart, None)
        );
        assert_eq!(pause_kind("Initial Mark", None), (PauseKind::G1ConcurrentStart, None));
        assert_eq!(pause_kind("Mixed", None), (PauseKind::G1Mixed, None));
        assert_eq!(pause_kind("Young", Some("Mixed")), (PauseKind::G1Mixed, None));
        assert_eq!(pause_kind("Full", None), (PauseKind::G1Full, None));
        assert_eq!(concurrent_kind("Concurrent Mark"), Ok(ConcurrentKind::G1Mark));
        assert_matches!(concurrent_kind("Concurrent Nap"), Err(HandlerError::UnknownPhase(_)));
    }
}
