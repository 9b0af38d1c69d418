//! Serial, Parallel and CMS collectors with JDK 9+ unified logging
//!
//! Pauses look like unified G1 pauses, with generation lines instead of
//! region counts. The concurrent phases of CMS carry the GC id of their
//! initial mark, and young pauses run between them.

use super::{
    abandon_keyed_end, abandon_keyed_start, full_kind, is_unified_ignorable, record_unified_metaspace, unified_metaspace, young_kind,
    AwaitingCpu, CPU_LINE,
};
use crate::{
    dispatch::RuleTable,
    forward::{ConcurrentForwardReference, ForwardReference, KeyedSlots, PauseForwardReference},
    grammar::{before_after_size, pool_before_after, DECIMAL, GC_CAUSE, UNIFIED_CPU_BREAKDOWN, UNIFIED_PAUSE_TIME},
    parser::{rule, Dialect, Handler, HandlerError, ParseContext},
    trace::Trace,
};
use gc_events::{ConcurrentKind, DateTimeStamp, MemoryPool, PauseKind};
use phf::phf_map;
use std::sync::OnceLock;

/// Concurrent phases of a CMS cycle, by unified log name
static CMS_PHASES: phf::Map<&'static str, ConcurrentKind> = phf_map! {
    "Concurrent Mark" => ConcurrentKind::CmsMark,
    "Concurrent Preclean" => ConcurrentKind::CmsPreclean,
    "Concurrent Abortable Preclean" => ConcurrentKind::CmsAbortablePreclean,
    "Concurrent Sweep" => ConcurrentKind::CmsSweep,
    "Concurrent Reset" => ConcurrentKind::CmsReset,
};

/// Parser state of the unified generational dialect
#[derive(Debug)]
pub struct UnifiedGenerational {
    /// Pauses whose summary line was not seen yet
    pauses: KeyedSlots<PauseForwardReference>,

    /// CMS concurrent phases
    phases: KeyedSlots<ConcurrentForwardReference>,

    /// GC id of the CMS cycle in progress
    cycle: Option<u32>,

    /// Finished event that may still get a CPU breakdown
    awaiting_cpu: AwaitingCpu,
}
//
impl Default for UnifiedGenerational {
    fn default() -> Self {
        Self {
            pauses: KeyedSlots::new("pause"),
            phases: KeyedSlots::new("concurrent phase"),
            cycle: None,
            awaiting_cpu: AwaitingCpu::default(),
        }
    }
}
//
impl Dialect for UnifiedGenerational {
    const NAME: &'static str = "unified generational";
    const UNIFIED: bool = true;

    fn rules() -> &'static RuleTable<Handler<Self>> {
        static RULES: OnceLock<RuleTable<Handler<UnifiedGenerational>>> = OnceLock::new();
        RULES.get_or_init(|| {
            let bas = before_after_size();
            let pool = pool_before_after();
            let pause = format!(r"^Pause (Young|Full|Initial Mark|Remark)(?: {GC_CAUSE})?");
            let full_phase = r"(Marking Phase|Summary Phase|Adjust Roots|Compaction Phase|Post Compact|Phase \d+: [A-Za-z ]+?)";
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
                    "GENERATION",
                    format!(
                        r"^(DefNew|PSYoungGen|ParNew|Tenured|ParOldGen|PSOldGen|CMS): (?:{bas}|{pool})(?: Eden: {pool} From: {pool})?\s*$"
                    ),
                    Self::generation,
                ),
                rule("METASPACE", unified_metaspace(), Self::metaspace),
                rule(
                    "FULL_PHASE",
                    format!(r"^{full_phase}(?: {UNIFIED_PAUSE_TIME})?\s*$"),
                    Self::full_phase,
                ),
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
                rule("HEAP_EXIT", r"^Heap\s*$", Self::exit),
            ])
        })
    }

    fn is_ignorable(body: &str) -> bool {
        is_unified_ignorable(body)
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
            "GENERATION" | "METASPACE" | "FULL_PHASE" => ctx.abandon_keyed(&mut self.pauses, gc_id),
            "PAUSE_SUMMARY" => {
                abandon_keyed_end(&mut self.pauses, gc_id, ctx);
                self.awaiting_cpu.abandon(gc_id, ctx);
            }
            CPU_LINE => self.awaiting_cpu.abandon(gc_id, ctx),
            "CONCURRENT_START" => abandon_keyed_start(&mut self.phases, gc_id, ctx),
            "CONCURRENT_END" => {
                abandon_keyed_end(&mut self.phases, gc_id, ctx);
                self.awaiting_cpu.abandon(gc_id, ctx);
                // A cycle whose reset phase is lost still ends there
                if trace.group(1) == Ok("Concurrent Reset") && self.cycle == Some(gc_id) {
                    self.cycle = None;
                    ctx.emitter.close_cycle(gc_id);
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
        in_flight
    }
}
//
impl UnifiedGenerational {
    fn pause_start(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let pause = self.new_pause(trace, gc_id, ctx.now, ctx)?;
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
            Ok(None) => self.new_pause(trace, gc_id, ctx.now.add_seconds(-duration), ctx)?,
            Err(e) => {
                self.awaiting_cpu.abandon(gc_id, ctx);
                return Err(e);
            }
        };
        pause.set_pool(MemoryPool::Heap, trace.occupancy_before_after_size(3)?)?;
        pause.set_duration(duration)?;
        self.awaiting_cpu.hold(gc_id, pause, false, ctx)
    }

    fn cpu(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let cpu = trace.cpu_summary(1)?;
        self.awaiting_cpu.attach(gc_id, cpu, ctx)
    }

    /// Occupancy of a generation, with the eden and survivor breakdown that
    /// JDK 17 prints for young generations
    fn generation(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.pauses.get_mut(ctx.require_gc_id()?)?;
        let pool = match trace.group(1)? {
            "DefNew" | "PSYoungGen" | "ParNew" => MemoryPool::Young,
            _ => MemoryPool::Tenured,
        };
        let summary = if trace.has_group(2) {
            trace.occupancy_before_after_size(2)?
        } else {
            trace.memory_pool_before_after(8)?
        };
        pause.set_pool(pool, summary)?;
        if trace.has_group(16) {
            pause.set_pool(MemoryPool::Eden, trace.memory_pool_before_after(16)?)?;
            pause.set_pool(MemoryPool::Survivor, trace.memory_pool_before_after(24)?)?;
        }
        Ok(())
    }

    fn metaspace(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.pauses.get_mut(ctx.require_gc_id()?)?;
        record_unified_metaspace(pause, trace)
    }

    /// Start or end of a phase of a full collection
    fn full_phase(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.pauses.get_mut(ctx.require_gc_id()?)?;
        if trace.has_group(2) {
            pause.add_phase(trace.group(1)?, trace.milliseconds(2)?)?;
        }
        Ok(())
    }

    fn concurrent_start(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let phase = ConcurrentForwardReference::new(cms_phase(trace.group(1)?)?, Some(gc_id), ctx.now);
        ctx.open_keyed(&mut self.phases, gc_id, phase);
        Ok(())
    }

    /// End of a CMS concurrent phase, held for its CPU breakdown
    ///
    /// The reset phase is the last one of a cycle.
    fn concurrent_end(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let mut phase = self.phases.take(gc_id)?;
        let kind = cms_phase(trace.group(1)?)?;
        if phase.kind() != kind {
            let discarded = phase;
            ctx.protocol_violation(self.phases.name(), &discarded);
            return Err(HandlerError::NoEventInFlight {
                slot: self.phases.name(),
                gc_id: Some(gc_id),
            });
        }
        phase.set_duration(trace.pause_time()?)?;
        let closes_cycle = kind == ConcurrentKind::CmsReset && self.cycle == Some(gc_id);
        if closes_cycle {
            self.cycle = None;
        }
        self.awaiting_cpu.hold(gc_id, phase, closes_cycle, ctx)
    }

    fn exit(&mut self, _trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        ctx.terminate();
        Ok(())
    }

    /// Start a pause from the groups of a `Pause <name> (<cause>)` prefix
    ///
    /// An initial mark starts a CMS cycle. A full collection ends the cycle
    /// in progress, if any, since CMS gives up on it.
    fn new_pause(
        &mut self,
        trace: &Trace,
        gc_id: u32,
        start: DateTimeStamp,
        ctx: &mut ParseContext,
    ) -> Result<PauseForwardReference, HandlerError> {
        let cause = trace.gc_cause(2)?;
        let collector = ctx.config.collector;
        let kind = match trace.group(1)? {
            "Young" => young_kind(collector),
            "Full" => full_kind(collector, cause.as_ref()),
            "Initial Mark" => PauseKind::CmsInitialMark,
            _ => PauseKind::CmsRemark,
        };
        let mut pause = PauseForwardReference::new(kind, Some(gc_id), start);
        pause.set_cause(cause)?;
        if kind == PauseKind::CmsInitialMark {
            if let Some(previous) = self.cycle.replace(gc_id) {
                self.abandon_cycle(previous, ctx);
            }
            ctx.emitter.open_cycle(gc_id);
        } else if kind.is_full() {
            if let Some(previous) = self.cycle.take() {
                self.abandon_cycle(previous, ctx);
            }
        }
        Ok(pause)
    }

    /// Stop holding events for a CMS cycle that will not complete
    fn abandon_cycle(&mut self, gc_id: u32, ctx: &mut ParseContext) {
        if let Some(phase) = self.phases.try_take(gc_id) {
            ctx.protocol_violation(self.phases.name(), &phase);
        }
        log::debug!("CMS cycle GC({gc_id}) was abandoned");
        ctx.emitter.close_cycle(gc_id);
    }
}

fn cms_phase(name: &str) -> Result<ConcurrentKind, HandlerError> {
    CMS_PHASES
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
    use gc_events::{GcCause, JvmEvent, MemoryPoolSummary};
    use pretty_assertions::assert_eq;

    fn parse(collector: CollectorFamily, lines: &[&str]) -> (Vec<JvmEvent>, Diagnostics) {
        let diary = Diary {
            collector,
            unified: true,
            gc_id_tags: true,
            uptime_stamps: true,
            details: true,
            ..Diary::default()
        };
        let mut parser = GcLogParser::<UnifiedGenerational, _>::new(&diary, Vec::new());
        for line in lines {
            parser.receive(line);
        }
        parser.finish()
    }

    #[test]
    fn parallel_collections() {
        let (events, diagnostics) = parse(
            CollectorFamily::Parallel,
            &[
                "[0.005s][info][gc] Using Parallel",
                "[1.000s][info][gc,start    ] GC(0) Pause Young (Allocation Failure)",
                "[1.005s][info][gc,heap     ] GC(0) PSYoungGen: 65536K->10720K(76288K)",
                "[1.005s][info][gc,heap     ] GC(0) ParOldGen: 0K->8K(175104K)",
                "[1.005s][info][gc,metaspace] GC(0) Metaspace: 3000K->3000K(1056768K)",
                "[1.005s][info][gc          ] GC(0) Pause Young (Allocation Failure) 64M->10M(245M) 5.123ms",
                "[1.005s][info][gc,cpu      ] GC(0) User=0.01s Sys=0.00s Real=0.01s",
                "[2.000s][info][gc,start    ] GC(1) Pause Full (Ergonomics)",
                "[2.000s][info][gc,phases,start] GC(1) Marking Phase",
                "[2.010s][info][gc,phases   ] GC(1) Marking Phase 10.000ms",
                "[2.010s][info][gc,phases,start] GC(1) Compaction Phase",
                "[2.030s][info][gc,phases   ] GC(1) Compaction Phase 20.000ms",
                "[2.032s][info][gc          ] GC(1) Pause Full (Ergonomics) 176M->58M(245M) 32.000ms",
                "[2.100s][info][gc,heap,exit] Heap",
                "[2.100s][info][gc,heap,exit]  PSYoungGen      total 76288K, used 1000K",
            ],
        );
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let [JvmEvent::Pause(young), JvmEvent::Pause(full), JvmEvent::Termination(exit)] = &events[..] else {
            panic!("unexpected events {events:?}");
        };
        assert_eq!(young.kind, PauseKind::PsYoungGen);
        assert_eq!(young.cause, Some(GcCause::AllocationFailure));
        assert_eq!(
            young.pool(MemoryPool::Young),
            Some(&MemoryPoolSummary::with_final_size(65536, 10720, 76288))
        );
        assert_eq!(
            young.pool(MemoryPool::Metaspace),
            Some(&MemoryPoolSummary::with_final_size(3000, 3000, 1056768))
        );
        assert!(young.cpu.is_some());
        assert_eq!(full.kind, PauseKind::ParallelFull);
        assert_eq!(full.phases.len(), 2);
        assert_eq!(full.cpu, None);
        assert_eq!(exit.at, DateTimeStamp::from_uptime(2.1));
    }

    #[test]
    fn jdk17_serial_generations() {
        let (events, diagnostics) = parse(
            CollectorFamily::Serial,
            &[
                "[0.300s][info][gc,start    ] GC(0) Pause Young (Allocation Failure)",
                "[0.302s][info][gc,heap     ] GC(0) DefNew: 2176K(2432K)->256K(2432K) Eden: 2176K(2176K)->0K(2176K) From: 0K(256K)->256K(256K)",
                "[0.302s][info][gc,heap     ] GC(0) Tenured: 0K(5504K)->1000K(5504K)",
                "[0.302s][info][gc,metaspace] GC(0) Metaspace: 150K(320K)->150K(320K) NonClass: 140K(256K)->140K(256K) Class: 10K(64K)->10K(64K)",
                "[0.302s][info][gc          ] GC(0) Pause Young (Allocation Failure) 2M->1M(7M) 2.000ms",
                "[0.302s][info][gc,cpu      ] GC(0) User=0.00s Sys=0.00s Real=0.00s",
            ],
        );
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let JvmEvent::Pause(young) = &events[0] else {
            panic!("expected a pause, got {:?}", events[0]);
        };
        assert_eq!(young.kind, PauseKind::DefNew);
        assert_eq!(
            young.pool(MemoryPool::Young),
            Some(&MemoryPoolSummary::new(2176, 2432, 256, 2432))
        );
        assert_eq!(
            young.pool(MemoryPool::Survivor),
            Some(&MemoryPoolSummary::new(0, 256, 256, 256))
        );
        assert_eq!(
            young.pool(MemoryPool::Tenured),
            Some(&MemoryPoolSummary::new(0, 5504, 1000, 5504))
        );
        assert!(young.pool(MemoryPool::NonClassSpace).is_some());
    }

    #[test]
    fn cms_cycle_with_young_pause() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            &[
                "[5.000s][info][gc,start] GC(2) Pause Initial Mark",
                "[5.001s][info][gc      ] GC(2) Pause Initial Mark 20M->20M(200M) 1.000ms",
                "[5.001s][info][gc,cpu  ] GC(2) User=0.00s Sys=0.00s Real=0.00s",
                "[5.001s][info][gc      ] GC(2) Concurrent Mark",
                "[5.006s][info][gc      ] GC(2) Concurrent Mark 5.000ms",
                "[5.006s][info][gc,cpu  ] GC(2) User=0.01s Sys=0.00s Real=0.01s",
                "[5.006s][info][gc      ] GC(2) Concurrent Abortable Preclean",
                "[5.050s][info][gc,start] GC(3) Pause Young (Allocation Failure)",
                "[5.050s][info][gc,heap ] GC(3) ParNew: 4416K->512K(4928K)",
                "[5.050s][info][gc,heap ] GC(3) CMS: 1000K->1200K(10944K)",
                "[5.053s][info][gc      ] GC(3) Pause Young (Allocation Failure) 5M->2M(15M) 3.000ms",
                "[5.053s][info][gc,cpu  ] GC(3) User=0.01s Sys=0.00s Real=0.00s",
                "[5.106s][info][gc      ] GC(2) Concurrent Abortable Preclean 100.000ms",
                "[5.106s][info][gc,start] GC(2) Pause Remark",
                "[5.108s][info][gc      ] GC(2) Pause Remark 4M->4M(15M) 2.000ms",
                "[5.108s][info][gc      ] GC(2) Concurrent Sweep",
                "[5.118s][info][gc      ] GC(2) Concurrent Sweep 10.000ms",
                "[5.118s][info][gc      ] GC(2) Concurrent Reset",
                "[5.119s][info][gc      ] GC(2) Concurrent Reset 1.000ms",
                "[5.119s][info][gc,cpu  ] GC(2) User=0.00s Sys=0.00s Real=0.00s",
                "[6.000s][info][gc,start] GC(4) Pause Young (Allocation Failure)",
                "[6.000s][info][gc,heap ] GC(4) ParNew: 4416K->512K(4928K)",
                "[6.000s][info][gc,heap ] GC(4) CMS: 1200K->1400K(10944K)",
                "[6.003s][info][gc      ] GC(4) Pause Young (Allocation Failure) 5M->2M(15M) 3.000ms",
            ],
        );
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let kinds = events.iter().map(JvmEvent::kind_name).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                "CMS Initial Mark",
                "CMS Concurrent Mark",
                "CMS Concurrent Abortable Preclean",
                "CMS Remark",
                "CMS Concurrent Sweep",
                "CMS Concurrent Reset",
                "ParNew",
                "ParNew",
                "JVM Termination",
            ]
        );
        assert_eq!(events[6].gc_id(), Some(3));
        assert_matches!(&events[1], JvmEvent::Concurrent(mark) if mark.cpu.is_some());
        assert_matches!(&events[4], JvmEvent::Concurrent(sweep) if sweep.cpu.is_none());
    }

    #[test]
    fn full_collection_abandons_cms_cycle() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            &[
                "[5.000s][info][gc] GC(2) Pause Initial Mark 20M->20M(200M) 1.000ms",
                "[5.001s][info][gc] GC(2) Concurrent Mark",
                "[5.100s][info][gc,start] GC(3) Pause Young (Allocation Failure)",
                "[5.103s][info][gc] GC(3) Pause Young (Allocation Failure) 190M->180M(200M) 3.000ms",
                "[5.200s][info][gc,start] GC(4) Pause Full (Allocation Failure)",
                "[5.400s][info][gc] GC(4) Pause Full (Allocation Failure) 199M->50M(200M) 200.000ms",
            ],
        );
        let kinds = events.iter().map(JvmEvent::kind_name).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec!["CMS Initial Mark", "ParNew", "Full GC (CMS)", "JVM Termination"]
        );
        assert_eq!(diagnostics.entries().len(), 1);
    }

    #[test]
    fn repeated_generation_abandons_pause() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            &[
                "[1.000s][info][gc,start] GC(0) Pause Young (Allocation Failure)",
                "[1.003s][info][gc,heap ] GC(0) ParNew: 4416K->512K(4928K)",
                "[1.003s][info][gc,heap ] GC(0) ParNew: 4416K->512K(4928K)",
                "[1.003s][info][gc,heap ] GC(0) CMS: 1000K->1200K(10944K)",
                "[1.003s][info][gc      ] GC(0) Pause Young (Allocation Failure) 5M->2M(15M) 3.000ms",
                "[1.003s][info][gc,cpu  ] GC(0) User=0.01s Sys=0.00s Real=0.00s",
                "[2.003s][info][gc      ] GC(1) Pause Young (Allocation Failure) 5M->2M(15M) 3.000ms",
            ],
        );
        assert_matches!(
            diagnostics.entries(),
            [Diagnostic::MalformedTrace { line_number: 3, rule: Some("GENERATION"), .. }]
        );
        assert_eq!(diagnostics.ignored_lines(), 3);
        let [JvmEvent::Pause(young), JvmEvent::Termination(_)] = &events[..] else {
            panic!("unexpected events {events:?}");
        };
        assert_eq!(young.gc_id, Some(1));
        assert_eq!(young.kind, PauseKind::ParNew);
    }

    #[test]
    fn mismatched_phase_end() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            &[
                "[5.000s][info][gc] GC(2) Pause Initial Mark 20M->20M(200M) 1.000ms",
                "[5.108s][info][gc] GC(2) Concurrent Sweep",
                "[5.200s][info][gc] GC(3) Pause Young (Allocation Failure) 5M->2M(15M) 3.000ms",
                "[5.300s][info][gc] GC(2) Concurrent Reset 1.000ms",
                "[5.300s][info][gc,cpu] GC(2) User=0.00s Sys=0.00s Real=0.00s",
                "[6.000s][info][gc] GC(4) Pause Young (Allocation Failure) 5M->2M(15M) 3.000ms",
            ],
        );
        assert_matches!(
            diagnostics.entries(),
            [
                Diagnostic::ProtocolViolation { line_number: 4, .. },
                Diagnostic::MalformedTrace { line_number: 4, rule: Some("CONCURRENT_END"), .. },
            ]
        );
        assert_eq!(diagnostics.ignored_lines(), 1);
        let kinds = events.iter().map(JvmEvent::kind_name).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec!["CMS Initial Mark", "ParNew", "ParNew", "JVM Termination"]
        );
    }
}
