//! Serial, Parallel and CMS collectors, before unified logging
//!
//! These logs carry no GC id, so every kind of event in progress has its own
//! single-flight slot. Most pauses fit on one line, but CMS can split a
//! pause around the output of its concurrent thread, and a promotion failure
//! prints a young collection and the foreground collection that rescued it
//! as a single record.

use super::{
    abandon_end, abandon_start, full_kind, is_common_ignorable, metadata_pool, metaspace_part, pre_unified_references,
    pre_unified_sub_phases, transition, young_kind, CPU_LINE,
};
use crate::{
    dispatch::RuleTable,
    forward::{ConcurrentForwardReference, Describe, ForwardReference, PauseForwardReference, Slot},
    grammar::{before_after_size, CPU_BREAKDOWN, DATE, DECIMAL, GC_CAUSE, MEMORY_SIZE, PAUSE_TIME, STAMP},
    parser::{rule, Dialect, Handler, HandlerError, ParseContext},
    trace::{Trace, TraceError},
};
use gc_events::{
    ConcurrentKind, CpuSummary, DateTimeStamp, GcCause, MemoryPool, MemoryPoolSummary, PauseFlag,
    PauseKind, Seconds,
};
use std::sync::OnceLock;

/// CMS foreground collection whose output was interrupted by the concurrent
/// thread, waiting for its `(concurrent mode failure)` continuation
#[derive(Clone, Debug, PartialEq)]
enum InterruptedCms {
    /// Young collection that failed to promote objects
    AfterPromotionFailure {
        /// The young collection
        young: PauseForwardReference,

        /// When the foreground collection started, if printed
        cms_start: Option<DateTimeStamp>,
    },

    /// Explicit full collection
    Full(PauseForwardReference),
}
//
impl Describe for InterruptedCms {
    fn describe(&self) -> String {
        match self {
            Self::AfterPromotionFailure { young, .. } => {
                format!("{} with promotion failure", young.describe())
            }
            Self::Full(full) => full.describe(),
        }
    }
}

/// Old generation part of a CMS foreground collection
struct CmsCollection {
    /// Kind announced by a `(concurrent mode ...)` marker, if any
    marker: Option<PauseKind>,

    /// Old generation occupancy
    tenured: MemoryPoolSummary,

    /// Duration of the old generation collection
    duration: Seconds,

    /// Whole heap occupancy
    heap: MemoryPoolSummary,

    /// Metaspace or permanent generation occupancy
    metadata: Option<(MemoryPool, MemoryPoolSummary)>,

    /// Duration of the whole record
    total: Seconds,

    /// CPU breakdown of the whole record
    cpu: Option<CpuSummary>,
}
//
impl CmsCollection {
    /// Decode the `(marker): tenured, t secs] heap, [Metaspace], t secs] [Times]`
    /// layout, which spans 25 groups starting at the marker
    fn from_trace(trace: &Trace, offset: usize) -> Result<Self, TraceError> {
        Ok(Self {
            marker: trace.optional_group(offset)?.map(marker_kind),
            tenured: trace.occupancy_before_after_size(offset + 1)?,
            duration: trace.decimal(offset + 7)?,
            heap: trace.occupancy_before_after_size(offset + 8)?,
            metadata: metadata(trace, offset + 14)?,
            total: trace.decimal(offset + 21)?,
            cpu: trace.optional_cpu_summary(offset + 22)?,
        })
    }
}

/// Parser state of the pre-unified generational dialect
#[derive(Debug)]
pub struct Generational {
    /// Pause waiting for a CPU breakdown on the next line
    pending: Slot<PauseForwardReference>,

    /// Young collection whose output is split by tenuring details
    young: Slot<PauseForwardReference>,

    /// Foreground collection waiting for its concurrent mode failure line
    interrupted: Slot<InterruptedCms>,

    /// CMS concurrent phase
    concurrent: Slot<ConcurrentForwardReference>,
}
//
impl Default for Generational {
    fn default() -> Self {
        Self {
            pending: Slot::new("pending pause"),
            young: Slot::new("young"),
            interrupted: Slot::new("concurrent mode failure"),
            concurrent: Slot::new("concurrent"),
        }
    }
}
//
impl Dialect for Generational {
    const NAME: &'static str = "generational";
    const UNIFIED: bool = false;

    fn rules() -> &'static RuleTable<Handler<Self>> {
        static RULES: OnceLock<RuleTable<Handler<Generational>>> = OnceLock::new();
        RULES.get_or_init(|| {
            let bas = before_after_size();
            let meta = metaspace_part();
            let cpu = format!("(?: {CPU_BREAKDOWN})?");
            let stamp = format!("(?:{DATE}: )?(?:{DECIMAL}: )?");
            let phase = "(mark|preclean|abortable-preclean|sweep|reset)";
            let marker = r"\((concurrent mode (?:failure|interrupted))\)";
            RuleTable::new([
                rule(
                    "PROMOTION_FAILURE",
                    format!(
                        r"^{STAMP}\[GC(?: {GC_CAUSE})? {STAMP}\[ParNew \(promotion failed\): {bas}, {PAUSE_TIME}\]{stamp}\[CMS(?: {marker})?: {bas}, {PAUSE_TIME}\] {bas}{meta}, {PAUSE_TIME}\]{cpu}\s*$"
                    ),
                    Self::promotion_failure,
                ),
                rule(
                    "PROMOTION_FAILURE_INTERRUPTED",
                    format!(
                        r"^{STAMP}\[GC(?: {GC_CAUSE})? {STAMP}\[ParNew \(promotion failed\): {bas}, {PAUSE_TIME}\]{stamp}\[CMS{STAMP}\[CMS-concurrent-{phase}: {DECIMAL}/{DECIMAL} secs\]{cpu}\s*$"
                    ),
                    Self::promotion_failure_interrupted,
                ),
                rule(
                    "CONCURRENT_MODE_FAILURE",
                    format!(r"^\s*{marker}: {bas}, {PAUSE_TIME}\] {bas}{meta}, {PAUSE_TIME}\]{cpu}\s*$"),
                    Self::concurrent_mode_failure,
                ),
                rule(
                    "FULL_INTERRUPTED",
                    format!(
                        r"^{STAMP}\[Full GC(?: {GC_CAUSE})?\s*{stamp}\[CMS{STAMP}\[CMS-concurrent-{phase}: {DECIMAL}/{DECIMAL} secs\]{cpu}\s*$"
                    ),
                    Self::full_interrupted,
                ),
                rule(
                    "YOUNG",
                    format!(
                        r"^{STAMP}\[GC(?: {GC_CAUSE})? {STAMP}\[(ParNew|DefNew|PSYoungGen)((?:{STAMP}\[[A-Za-z ]+Reference, [^\]]*\])*)(?: \((promotion failed)\))?: {bas}(?:, {PAUSE_TIME})?\] {bas}, {PAUSE_TIME}\]{cpu}\s*$"
                    ),
                    Self::young,
                ),
                rule(
                    "YOUNG_START",
                    format!(r"^{STAMP}\[GC(?: {GC_CAUSE})?(?: {STAMP}\[(ParNew|DefNew))?\s*$"),
                    Self::young_start,
                ),
                rule(
                    "YOUNG_END",
                    format!(r"^: {bas}, {PAUSE_TIME}\] {bas}, {PAUSE_TIME}\]{cpu}\s*$"),
                    Self::young_end,
                ),
                rule(
                    "PS_YOUNG_END",
                    format!(r"^\s*\[PSYoungGen: {bas}\] {bas}, {PAUSE_TIME}\]{cpu}\s*$"),
                    Self::ps_young_end,
                ),
                rule(
                    "TENURING_THRESHOLD",
                    r"^Desired survivor size (\d+) bytes, new threshold (\d+) \(max (?:threshold )?(\d+)\)",
                    Self::tenuring_threshold,
                ),
                rule(
                    "TENURING_AGE",
                    r"^- age\s+(\d+):\s+(\d+) bytes,\s+(\d+) total",
                    Self::tenuring_age,
                ),
                rule(
                    "CMS_INITIAL_MARK",
                    format!(
                        r"^{STAMP}\[GC(?: {GC_CAUSE})? \[1 CMS-initial-mark: {MEMORY_SIZE}\({MEMORY_SIZE}\)\] {MEMORY_SIZE}\({MEMORY_SIZE}\), {PAUSE_TIME}\]{cpu}\s*$"
                    ),
                    Self::initial_mark,
                ),
                rule(
                    "CMS_REMARK",
                    format!(
                        r"^{STAMP}\[GC(?: {GC_CAUSE})? ?\[YG occupancy: (\d+) K \((\d+) K\)\](.*)\[1 CMS-remark: {MEMORY_SIZE}\({MEMORY_SIZE}\)\] {MEMORY_SIZE}\({MEMORY_SIZE}\), {PAUSE_TIME}\]{cpu}\s*$"
                    ),
                    Self::remark,
                ),
                rule(
                    "CONCURRENT_START",
                    format!(r"^{STAMP}\[CMS-concurrent-{phase}-start\]\s*$"),
                    Self::concurrent_start,
                ),
                rule(
                    "CONCURRENT_END",
                    format!(
                        r"^(?:\s*CMS: abort preclean due to time )?{STAMP}\[CMS-concurrent-{phase}: {DECIMAL}/{DECIMAL} secs\]{cpu}\s*$"
                    ),
                    Self::concurrent_end,
                ),
                rule(
                    "FULL",
                    format!(
                        r"^{STAMP}\[(Full GC|GC)(?: {GC_CAUSE})?\s*{STAMP}(?:\[(?:DefNew|ParNew): {bas}, {PAUSE_TIME}\]{STAMP})?\[(Tenured|CMS)(?: {marker})?: {bas}, {PAUSE_TIME}\] {bas}{meta}, {PAUSE_TIME}\]{cpu}\s*$"
                    ),
                    Self::full,
                ),
                rule(
                    "PARALLEL_FULL",
                    format!(
                        r"^{STAMP}\[Full GC(?: {GC_CAUSE})?\s*\[PSYoungGen: {bas}\] \[(?:ParOldGen|PSOldGen): {bas}\] {bas}{meta}, {PAUSE_TIME}\]{cpu}\s*$"
                    ),
                    Self::parallel_full,
                ),
                rule(
                    "BASIC",
                    format!(r"^{STAMP}\[(Full GC|GC)(?: {GC_CAUSE})?\s+{bas}, {PAUSE_TIME}\]\s*$"),
                    Self::basic,
                ),
                rule(CPU_LINE, format!(r"^\s*{CPU_BREAKDOWN}\s*$"), Self::cpu),
                rule("COMMAND_LINE", r"^CommandLine flags: (.*)$", Self::command_line),
                rule("HEAP_EXIT", r"^Heap\s*$", Self::exit),
            ])
        })
    }

    fn is_ignorable(body: &str) -> bool {
        is_common_ignorable(body)
    }

    fn before_line(
        &mut self,
        rule: Option<&'static str>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<(), HandlerError> {
        if rule == Some(CPU_LINE) {
            return Ok(());
        }
        match self.pending.try_take() {
            Some(pause) => ctx.emit_pause(pause),
            None => Ok(()),
        }
    }

    fn abandon(&mut self, rule: &'static str, _trace: &Trace<'_>, ctx: &mut ParseContext<'_>) {
        match rule {
            "YOUNG_START" => abandon_start(&mut self.young, ctx),
            "TENURING_THRESHOLD" | "TENURING_AGE" => ctx.abandon(&mut self.young),
            "YOUNG_END" | "PS_YOUNG_END" => abandon_end(&mut self.young, ctx),
            "PROMOTION_FAILURE_INTERRUPTED" | "FULL_INTERRUPTED" => {
                abandon_start(&mut self.interrupted, ctx)
            }
            "CONCURRENT_MODE_FAILURE" => abandon_end(&mut self.interrupted, ctx),
            "CONCURRENT_START" => abandon_start(&mut self.concurrent, ctx),
            "CONCURRENT_END" => abandon_end(&mut self.concurrent, ctx),
            CPU_LINE => abandon_end(&mut self.pending, ctx),
            "COMMAND_LINE" | "HEAP_EXIT" => {}
            // Pauses that fit on one line, whose CPU breakdown may follow
            _ => ctx.abandon(&mut self.pending),
        }
    }

    fn drain_in_flight(&mut self) -> Vec<ForwardReference> {
        let interrupted = self.interrupted.try_take().map(|interrupted| match interrupted {
            InterruptedCms::AfterPromotionFailure { young, .. } => young,
            InterruptedCms::Full(full) => full,
        });
        [self.pending.try_take(), self.young.try_take(), interrupted]
            .into_iter()
            .flatten()
            .map(ForwardReference::from)
            .chain(self.concurrent.try_take().map(ForwardReference::from))
            .collect()
    }
}
//
impl Generational {
    /// ParNew promotion failure rescued by a CMS foreground collection, on
    /// one line
    fn promotion_failure(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let young = promoted_young(trace, ctx)?;
        let cms_start = trace.date_time_stamp(9)?;
        let cms = CmsCollection::from_trace(trace, 11)?;
        self.reconcile(young, cms_start, cms, ctx)
    }

    /// ParNew promotion failure whose CMS foreground collection is
    /// interrupted by the end of a concurrent phase
    fn promotion_failure_interrupted(
        &mut self,
        trace: &Trace,
        ctx: &mut ParseContext,
    ) -> Result<(), HandlerError> {
        let young = promoted_young(trace, ctx)?;
        let cms_start = trace.date_time_stamp(9)?;
        self.finish_concurrent(trace, 11, ctx)?;
        ctx.open(
            &mut self.interrupted,
            InterruptedCms::AfterPromotionFailure { young, cms_start },
        );
        Ok(())
    }

    /// Explicit full collection interrupted by the end of a concurrent phase
    fn full_interrupted(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut full = PauseForwardReference::new(PauseKind::CmsFull, None, ctx.now);
        full.set_cause(trace.gc_cause(1)?)?;
        self.finish_concurrent(trace, 4, ctx)?;
        ctx.open(&mut self.interrupted, InterruptedCms::Full(full));
        Ok(())
    }

    /// Continuation of an interrupted CMS foreground collection
    fn concurrent_mode_failure(
        &mut self,
        trace: &Trace,
        ctx: &mut ParseContext,
    ) -> Result<(), HandlerError> {
        let cms = CmsCollection::from_trace(trace, 1)?;
        match self.interrupted.take()? {
            InterruptedCms::AfterPromotionFailure { young, cms_start } => {
                self.reconcile(young, cms_start, cms, ctx)
            }
            InterruptedCms::Full(mut full) => {
                if let Some(kind) = cms.marker {
                    full.set_kind(kind);
                }
                full.set_pool(MemoryPool::Tenured, cms.tenured)?;
                full.set_pool(MemoryPool::Heap, cms.heap)?;
                if let Some((pool, summary)) = cms.metadata {
                    full.set_pool(pool, summary)?;
                }
                full.set_duration(cms.total)?;
                self.complete(full, cms.cpu, ctx)
            }
        }
    }

    /// Split a promotion failure record into the young collection and the
    /// foreground collection that followed it
    ///
    /// The record only reports the heap before the young collection and
    /// after the foreground collection. The heap in between is the old
    /// generation before the foreground collection plus what the young
    /// collection left behind.
    fn reconcile(
        &mut self,
        mut young: PauseForwardReference,
        cms_start: Option<DateTimeStamp>,
        cms: CmsCollection,
        ctx: &mut ParseContext,
    ) -> Result<(), HandlerError> {
        let young_after = young
            .pool(MemoryPool::Young)
            .map(|pool| pool.occupancy_after)
            .ok_or(HandlerError::NoEventInFlight {
                slot: "young",
                gc_id: None,
            })?;
        let intermediate = cms.tenured.occupancy_before + young_after;
        young.set_pool(
            MemoryPool::Heap,
            transition(cms.heap.occupancy_before, intermediate, cms.heap.size_after),
        )?;

        let young_end = young.start().add_seconds(young.duration().unwrap_or(0.0));
        let mut full = PauseForwardReference::new(
            cms.marker.unwrap_or(PauseKind::ConcurrentModeFailure),
            None,
            cms_start.unwrap_or(young_end),
        );
        full.set_cause(young.cause().cloned())?;
        full.set_pool(MemoryPool::Tenured, cms.tenured)?;
        full.set_pool(
            MemoryPool::Heap,
            transition(intermediate, cms.heap.occupancy_after, cms.heap.size_after),
        )?;
        if let Some((pool, summary)) = cms.metadata {
            full.set_pool(pool, summary)?;
        }
        full.set_duration(cms.duration)?;

        ctx.emit_pause(young)?;
        self.complete(full, cms.cpu, ctx)
    }

    /// Young collection on a single line
    fn young(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut pause = PauseForwardReference::new(named_young_kind(trace.group(2)?), None, ctx.now);
        pause.set_cause(trace.gc_cause(1)?)?;
        if let Some(references) = pre_unified_references(trace.group(3)?)? {
            pause.set_references(references)?;
        }
        if trace.has_group(4) {
            pause.add_flag(PauseFlag::PromotionFailed);
        }
        pause.set_pool(MemoryPool::Young, trace.occupancy_before_after_size(5)?)?;
        pause.set_pool(MemoryPool::Heap, trace.occupancy_before_after_size(12)?)?;
        let duration = if trace.has_group(11) {
            trace.decimal(11)?
        } else {
            trace.decimal(18)?
        };
        pause.set_duration(duration)?;
        self.complete(pause, trace.optional_cpu_summary(19)?, ctx)
    }

    /// Young collection whose output continues on later lines
    fn young_start(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let kind = match trace.optional_group(2)? {
            Some(collector) => named_young_kind(collector),
            None => young_kind(ctx.config.collector),
        };
        let mut pause = PauseForwardReference::new(kind, None, ctx.now);
        pause.set_cause(trace.gc_cause(1)?)?;
        ctx.open(&mut self.young, pause);
        Ok(())
    }

    fn young_end(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut pause = self.young.take()?;
        pause.set_pool(MemoryPool::Young, trace.occupancy_before_after_size(1)?)?;
        pause.set_pool(MemoryPool::Heap, trace.occupancy_before_after_size(8)?)?;
        pause.set_duration(trace.decimal(7)?)?;
        self.complete(pause, trace.optional_cpu_summary(15)?, ctx)
    }

    fn ps_young_end(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut pause = self.young.take()?;
        pause.set_kind(PauseKind::PsYoungGen);
        pause.set_pool(MemoryPool::Young, trace.occupancy_before_after_size(1)?)?;
        pause.set_pool(MemoryPool::Heap, trace.occupancy_before_after_size(7)?)?;
        pause.set_duration(trace.decimal(13)?)?;
        self.complete(pause, trace.optional_cpu_summary(14)?, ctx)
    }

    fn tenuring_threshold(&mut self, trace: &Trace, _ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let pause = self.young.get_mut()?;
        pause.set_tenuring_threshold(trace.small_integer(2)?)?;
        Ok(())
    }

    fn tenuring_age(&mut self, _trace: &Trace, _ctx: &mut ParseContext) -> Result<(), HandlerError> {
        self.young.get_mut()?;
        Ok(())
    }

    fn initial_mark(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut pause = PauseForwardReference::new(PauseKind::CmsInitialMark, None, ctx.now);
        pause.set_cause(trace.gc_cause(1)?)?;
        pause.set_pool(MemoryPool::Tenured, occupancy(trace, 2)?)?;
        pause.set_pool(MemoryPool::Heap, occupancy(trace, 6)?)?;
        pause.set_duration(trace.decimal(10)?)?;
        self.complete(pause, trace.optional_cpu_summary(11)?, ctx)
    }

    fn remark(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut pause = PauseForwardReference::new(PauseKind::CmsRemark, None, ctx.now);
        pause.set_cause(trace.gc_cause(1)?)?;
        let (young, young_size) = (trace.integer(2)?, trace.integer(3)?);
        pause.set_pool(
            MemoryPool::Young,
            MemoryPoolSummary::new(young, young_size, young, young_size),
        )?;
        let details = trace.group(4)?;
        for (name, duration) in pre_unified_sub_phases(details)? {
            // JNI weak references have the shape of a sub-phase
            if !name.ends_with("Reference") {
                pause.add_phase(name, duration)?;
            }
        }
        if let Some(references) = pre_unified_references(details)? {
            pause.set_references(references)?;
        }
        pause.set_pool(MemoryPool::Tenured, occupancy(trace, 5)?)?;
        pause.set_pool(MemoryPool::Heap, occupancy(trace, 9)?)?;
        pause.set_duration(trace.decimal(13)?)?;
        self.complete(pause, trace.optional_cpu_summary(14)?, ctx)
    }

    fn concurrent_start(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let kind = concurrent_kind(trace.group(1)?);
        let phase = ConcurrentForwardReference::new(kind, None, ctx.now);
        ctx.open(&mut self.concurrent, phase);
        Ok(())
    }

    fn concurrent_end(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        self.finish_concurrent(trace, 1, ctx)
    }

    /// Complete the concurrent phase in progress from a
    /// `[CMS-concurrent-phase: cpu/wall secs] [Times]` layout starting at some
    /// group
    fn finish_concurrent(
        &mut self,
        trace: &Trace,
        offset: usize,
        ctx: &mut ParseContext,
    ) -> Result<(), HandlerError> {
        let kind = concurrent_kind(trace.group(offset)?);
        let mut phase = self.concurrent.take()?;
        if phase.kind() != kind {
            ctx.protocol_violation(self.concurrent.name(), &phase);
            return Err(HandlerError::NoEventInFlight {
                slot: self.concurrent.name(),
                gc_id: None,
            });
        }
        phase.set_cpu_time(trace.decimal(offset + 1)?)?;
        phase.set_duration(trace.decimal(offset + 2)?)?;
        if let Some(cpu) = trace.optional_cpu_summary(offset + 3)? {
            phase.set_cpu(cpu)?;
        }
        ctx.emit_concurrent(phase)
    }

    fn full(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let cause = trace.gc_cause(2)?;
        let kind = match trace.optional_group(11)? {
            Some(marker) => marker_kind(marker),
            None if cause == Some(GcCause::SystemGc) => PauseKind::SystemGc,
            None if trace.group(10)? == "Tenured" => PauseKind::SerialFull,
            None => PauseKind::CmsFull,
        };
        let mut pause = PauseForwardReference::new(kind, None, ctx.now);
        pause.set_cause(cause)?;
        if trace.has_group(3) {
            pause.set_pool(MemoryPool::Young, trace.occupancy_before_after_size(3)?)?;
        }
        pause.set_pool(MemoryPool::Tenured, trace.occupancy_before_after_size(12)?)?;
        pause.set_pool(MemoryPool::Heap, trace.occupancy_before_after_size(19)?)?;
        if let Some((pool, summary)) = metadata(trace, 25)? {
            pause.set_pool(pool, summary)?;
        }
        pause.set_duration(trace.decimal(32)?)?;
        self.complete(pause, trace.optional_cpu_summary(33)?, ctx)
    }

    fn parallel_full(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let cause = trace.gc_cause(1)?;
        let kind = if cause == Some(GcCause::SystemGc) {
            PauseKind::SystemGc
        } else {
            PauseKind::ParallelFull
        };
        let mut pause = PauseForwardReference::new(kind, None, ctx.now);
        pause.set_cause(cause)?;
        pause.set_pool(MemoryPool::Young, trace.occupancy_before_after_size(2)?)?;
        pause.set_pool(MemoryPool::Tenured, trace.occupancy_before_after_size(8)?)?;
        pause.set_pool(MemoryPool::Heap, trace.occupancy_before_after_size(14)?)?;
        if let Some((pool, summary)) = metadata(trace, 20)? {
            pause.set_pool(pool, summary)?;
        }
        pause.set_duration(trace.decimal(27)?)?;
        self.complete(pause, trace.optional_cpu_summary(28)?, ctx)
    }

    /// Collection logged without -XX:+PrintGCDetails
    fn basic(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let cause = trace.gc_cause(2)?;
        let kind = match trace.group(1)? {
            "GC" => young_kind(ctx.config.collector),
            _ => full_kind(ctx.config.collector, cause.as_ref()),
        };
        let mut pause = PauseForwardReference::new(kind, None, ctx.now);
        pause.set_cause(cause)?;
        pause.set_pool(MemoryPool::Heap, trace.occupancy_before_after_size(3)?)?;
        pause.set_duration(trace.decimal(9)?)?;
        self.complete(pause, None, ctx)
    }

    fn cpu(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let mut pause = self.pending.take()?;
        pause.set_cpu(trace.cpu_summary(1)?)?;
        ctx.emit_pause(pause)
    }

    fn command_line(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        ctx.config.apply_command_line(trace.group(1)?);
        Ok(())
    }

    fn exit(&mut self, _trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        ctx.terminate();
        Ok(())
    }

    /// Emit a pause, unless its CPU breakdown may still come on the next line
    fn complete(
        &mut self,
        mut pause: PauseForwardReference,
        cpu: Option<CpuSummary>,
        ctx: &mut ParseContext,
    ) -> Result<(), HandlerError> {
        match cpu {
            Some(cpu) => {
                pause.set_cpu(cpu)?;
                ctx.emit_pause(pause)
            }
            None if ctx.config.details => {
                ctx.open(&mut self.pending, pause);
                Ok(())
            }
            None => ctx.emit_pause(pause),
        }
    }
}

/// Young part of a ParNew promotion failure record (groups 1 to 8)
fn promoted_young(trace: &Trace, ctx: &ParseContext) -> Result<PauseForwardReference, HandlerError> {
    let mut young = PauseForwardReference::new(PauseKind::ParNew, None, ctx.now);
    young.set_cause(trace.gc_cause(1)?)?;
    young.add_flag(PauseFlag::PromotionFailed);
    young.set_pool(MemoryPool::Young, trace.occupancy_before_after_size(2)?)?;
    young.set_duration(trace.decimal(8)?)?;
    Ok(young)
}

/// `occupancy(size)` snapshot, 4 groups
fn occupancy(trace: &Trace, offset: usize) -> Result<MemoryPoolSummary, TraceError> {
    let (used, size) = (trace.memory(offset)?, trace.memory(offset + 2)?);
    Ok(MemoryPoolSummary::new(used, size, used, size))
}

/// Optional metadata pool from a [`metaspace_part`] starting at some group
fn metadata(
    trace: &Trace,
    offset: usize,
) -> Result<Option<(MemoryPool, MemoryPoolSummary)>, TraceError> {
    match trace.optional_group(offset)? {
        Some(label) => Ok(Some((
            metadata_pool(label),
            trace.occupancy_before_after_size(offset + 1)?,
        ))),
        None => Ok(None),
    }
}

fn named_young_kind(collector: &str) -> PauseKind {
    match collector {
        "ParNew" => PauseKind::ParNew,
        "DefNew" => PauseKind::DefNew,
        _ => PauseKind::PsYoungGen,
    }
}

fn marker_kind(marker: &str) -> PauseKind {
    if marker.ends_with("interrupted") {
        PauseKind::ConcurrentModeInterrupted
    } else {
        PauseKind::ConcurrentModeFailure
    }
}

fn concurrent_kind(phase: &str) -> ConcurrentKind {
    match phase {
        "mark" => ConcurrentKind::CmsMark,
        "preclean" => ConcurrentKind::CmsPreclean,
        "abortable-preclean" => ConcurrentKind::CmsAbortablePreclean,
        "sweep" => ConcurrentKind::CmsSweep,
        _ => ConcurrentKind::CmsReset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::{Diagnostic, Diagnostics},
        diary::{CollectorFamily, Diary},
        parser::GcLogParser,
        sink::END_OF_DATA_SENTINEL,
    };
    use assert_matches::assert_matches;
    use gc_events::{GcPause, JvmEvent};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn parse(collector: CollectorFamily, details: bool, lines: &[&str]) -> (Vec<JvmEvent>, Diagnostics) {
        let diary = Diary {
            collector,
            details,
            uptime_stamps: true,
            ..Diary::default()
        };
        let mut parser = GcLogParser::<Generational, _>::new(&diary, Vec::new());
        for line in lines {
            parser.receive(line);
        }
        parser.finish()
    }

    fn pauses(events: &[JvmEvent]) -> Vec<&GcPause> {
        events
            .iter()
            .filter_map(|event| match event {
                JvmEvent::Pause(pause) => Some(pause),
                _ => None,
            })
            .collect()
    }

    const PAR_NEW: &str = "62.616: [GC 62.616: [ParNew: 5033216K->129451K(5662336K), 0.2536590 secs] 5097075K->193310K(24536704K), 0.2538510 secs]";

    #[test]
    fn single_line_young_collection() {
        let (events, diagnostics) = parse(CollectorFamily::Cms, false, &[PAR_NEW]);
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        assert_eq!(events.len(), 2);
        let pause = pauses(&events)[0];
        assert_eq!(pause.kind, PauseKind::ParNew);
        assert_eq!(pause.start, DateTimeStamp::from_uptime(62.616));
        assert_eq!(
            pause.pool(MemoryPool::Young),
            Some(&MemoryPoolSummary::with_final_size(5033216, 129451, 5662336))
        );
        assert_eq!(
            pause.heap(),
            Some(&MemoryPoolSummary::with_final_size(5097075, 193310, 24536704))
        );
        assert_eq!(pause.duration, 0.2536590);
        assert_eq!(pause.cause, None);
    }

    #[test]
    fn cpu_breakdown_on_the_next_line() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            true,
            &[
                PAR_NEW,
                " [Times: user=1.35 sys=0.03, real=0.25 secs] ",
                PAR_NEW,
                "Heap",
            ],
        );
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let pauses = pauses(&events);
        assert_eq!(pauses.len(), 2);
        assert_eq!(pauses[0].cpu.map(|cpu| cpu.user), Some(1.35));
        assert_eq!(pauses[1].cpu, None);
    }

    #[test]
    fn promotion_failure_across_lines() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            true,
            &[
                "4.800: [CMS-concurrent-mark-start]",
                "5.123: [GC (Allocation Failure) 5.123: [ParNew (promotion failed): 306688K->306688K(306688K), 0.1234567 secs]5.300: [CMS5.400: [CMS-concurrent-mark: 0.500/0.600 secs] [Times: user=1.00 sys=0.01, real=0.60 secs] ",
                " (concurrent mode failure): 1234567K->987654K(2097152K), 3.4567890 secs] 1541255K->987654K(2403840K), [Metaspace: 54321K->54321K(1097728K)], 3.5812345 secs] [Times: user=3.72 sys=0.02, real=3.58 secs] ",
            ],
        );
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        assert_matches!(&events[0], JvmEvent::Concurrent(phase) if phase.kind == ConcurrentKind::CmsMark && phase.duration == 0.6);

        let pauses = pauses(&events);
        assert_eq!(pauses.len(), 2);
        let (young, failure) = (pauses[0], pauses[1]);
        assert_eq!(young.kind, PauseKind::ParNew);
        assert!(young.flags.contains(&PauseFlag::PromotionFailed));
        assert_eq!(young.duration, 0.1234567);
        assert_eq!(failure.kind, PauseKind::ConcurrentModeFailure);
        assert_eq!(failure.start, DateTimeStamp::from_uptime(5.3));
        assert_eq!(failure.duration, 3.4567890);
        assert_eq!(failure.cause, Some(GcCause::AllocationFailure));
        assert_eq!(failure.cpu.map(|cpu| cpu.wall_clock), Some(3.58));
        assert!(failure.pool(MemoryPool::Metaspace).is_some());

        let (young_heap, failure_heap) = (young.heap().unwrap(), failure.heap().unwrap());
        assert_eq!(young_heap.occupancy_before, 1541255);
        assert_eq!(young_heap.occupancy_after, 1234567 + 306688);
        assert_eq!(young_heap.occupancy_after, failure_heap.occupancy_before);
        assert_eq!(failure_heap.occupancy_after, 987654);
        assert_eq!(failure_heap.size_after, Some(2403840));
    }

    #[test]
    fn promotion_failure_on_one_line() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            true,
            &["12.345: [GC (Allocation Failure) 12.345: [ParNew (promotion failed): 306688K->306688K(306688K), 0.1234567 secs]12.468: [CMS: 1234567K->987654K(2097152K), 3.4567890 secs] 1541255K->987654K(2403840K), [Metaspace: 54321K->54321K(1097728K)], 3.5812345 secs] [Times: user=3.72 sys=0.02, real=3.58 secs] "],
        );
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let pauses = pauses(&events);
        assert_eq!(pauses.len(), 2);
        assert_eq!(pauses[1].kind, PauseKind::ConcurrentModeFailure);
        assert_eq!(pauses[1].start, DateTimeStamp::from_uptime(12.468));
        assert_eq!(
            pauses[0].heap().unwrap().occupancy_after,
            pauses[1].heap().unwrap().occupancy_before
        );
    }

    #[test]
    fn cms_cycle() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            true,
            &[
                "2.000: [GC (CMS Initial Mark) [1 CMS-initial-mark: 10812086K(11901376K)] 10887844K(12514816K), 0.0001997 secs] [Times: user=0.00 sys=0.00, real=0.00 secs] ",
                "2.001: [CMS-concurrent-mark-start]",
                "2.101: [CMS-concurrent-mark: 0.090/0.100 secs] [Times: user=0.20 sys=0.01, real=0.10 secs] ",
                "2.101: [CMS-concurrent-preclean-start]",
                "2.105: [CMS-concurrent-preclean: 0.004/0.004 secs] [Times: user=0.01 sys=0.00, real=0.01 secs] ",
                "2.110: [GC (CMS Final Remark) [YG occupancy: 40000 K (471872 K)]2.110: [Rescan (parallel) , 0.0100000 secs]2.120: [weak refs processing, 0.0001000 secs]2.120: [class unloading, 0.0010000 secs]2.121: [scrub symbol table, 0.0020000 secs]2.123: [scrub string table, 0.0003000 secs][1 CMS-remark: 10812086K(11901376K)] 10852086K(12373248K), 0.0150000 secs] [Times: user=0.05 sys=0.00, real=0.02 secs] ",
                "2.124: [CMS-concurrent-sweep-start]",
                "2.200: [CMS-concurrent-sweep: 0.070/0.076 secs] [Times: user=0.08 sys=0.00, real=0.08 secs] ",
                "2.200: [CMS-concurrent-reset-start]",
                "2.210: [CMS-concurrent-reset: 0.010/0.010 secs] [Times: user=0.01 sys=0.00, real=0.01 secs] ",
            ],
        );
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let names = events.iter().map(JvmEvent::kind_name).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "CMS Initial Mark",
                "CMS Concurrent Mark",
                "CMS Concurrent Preclean",
                "CMS Remark",
                "CMS Concurrent Sweep",
                "CMS Concurrent Reset",
                "JVM Termination",
            ]
        );
        let remark = pauses(&events)[1];
        assert_eq!(remark.phases.len(), 5);
        assert_eq!(remark.phases.get("Rescan"), Some(&0.01));
        assert_eq!(remark.cause, Some(GcCause::CmsFinalRemark));
        assert_matches!(&events[1], JvmEvent::Concurrent(mark) if mark.cpu_time == Some(0.09));
    }

    #[test]
    fn split_young_collection() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            true,
            &[
                "3.000: [GC (Allocation Failure) 3.000: [ParNew",
                "Desired survivor size 53673984 bytes, new threshold 1 (max 15)",
                "- age   1:   68407800 bytes,   68407800 total",
                ": 471872K->52416K(471872K), 0.0400000 secs] 1000000K->600000K(1520448K), 0.0401000 secs] [Times: user=0.10 sys=0.01, real=0.04 secs] ",
            ],
        );
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let pause = pauses(&events)[0];
        assert_eq!(pause.kind, PauseKind::ParNew);
        assert_eq!(pause.tenuring_threshold, Some(1));
        assert_eq!(pause.duration, 0.04);
        assert_eq!(pause.start, DateTimeStamp::from_uptime(3.0));
    }

    #[test]
    fn malformed_tenuring_abandons_young_collection() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            true,
            &[
                "3.000: [GC (Allocation Failure) 3.000: [ParNew",
                "Desired survivor size 53673984 bytes, new threshold 99999999999 (max 15)",
                "- age   1:   68407800 bytes,   68407800 total",
                ": 471872K->52416K(471872K), 0.0400000 secs] 1000000K->600000K(1520448K), 0.0401000 secs] [Times: user=0.10 sys=0.01, real=0.04 secs] ",
                "4.000: [GC (Allocation Failure) 4.000: [ParNew: 5033216K->129451K(5662336K), 0.2536590 secs] 5097075K->193310K(24536704K), 0.2538510 secs] [Times: user=0.10 sys=0.01, real=0.25 secs] ",
            ],
        );
        let pauses = pauses(&events);
        assert_eq!(pauses.len(), 1);
        assert_eq!(pauses[0].start, DateTimeStamp::from_uptime(4.0));
        assert_matches!(
            diagnostics.entries(),
            [Diagnostic::MalformedTrace { line_number: 2, rule: Some("TENURING_THRESHOLD"), .. }]
        );
        assert_eq!(diagnostics.ignored_lines(), 2);
    }

    #[test]
    fn interrupted_promotion_failure_without_concurrent_phase() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            true,
            &[
                "5.123: [GC (Allocation Failure) 5.123: [ParNew (promotion failed): 306688K->306688K(306688K), 0.1234567 secs]5.300: [CMS5.400: [CMS-concurrent-mark: 0.500/0.600 secs] [Times: user=1.00 sys=0.01, real=0.60 secs] ",
                " (concurrent mode failure): 1234567K->987654K(2097152K), 3.4567890 secs] 1541255K->987654K(2403840K), [Metaspace: 54321K->54321K(1097728K)], 3.5812345 secs] [Times: user=3.72 sys=0.02, real=3.58 secs] ",
                "10.000: [CMS-concurrent-mark-start]",
                "10.123: [GC (Allocation Failure) 10.123: [ParNew (promotion failed): 306688K->306688K(306688K), 0.1234567 secs]10.300: [CMS10.400: [CMS-concurrent-mark: 0.300/0.400 secs] [Times: user=1.00 sys=0.01, real=0.40 secs] ",
                " (concurrent mode failure): 1234567K->987654K(2097152K), 3.4567890 secs] 1541255K->987654K(2403840K), [Metaspace: 54321K->54321K(1097728K)], 3.5812345 secs] [Times: user=3.72 sys=0.02, real=3.58 secs] ",
            ],
        );
        assert_matches!(
            diagnostics.entries(),
            [Diagnostic::MalformedTrace {
                line_number: 1,
                rule: Some("PROMOTION_FAILURE_INTERRUPTED"),
                ..
            }]
        );
        assert_eq!(diagnostics.ignored_lines(), 1);
        assert_matches!(&events[0], JvmEvent::Concurrent(phase) if phase.kind == ConcurrentKind::CmsMark);
        let pauses = pauses(&events);
        assert_eq!(pauses.len(), 2);
        assert_eq!(pauses[0].start, DateTimeStamp::from_uptime(10.123));
        assert_eq!(pauses[1].kind, PauseKind::ConcurrentModeFailure);
        assert_eq!(pauses[1].start, DateTimeStamp::from_uptime(10.3));
    }

    #[test]
    fn full_collections() {
        let (events, diagnostics) = parse(
            CollectorFamily::Parallel,
            true,
            &[
                "15.000: [GC (Allocation Failure) [PSYoungGen: 65536K->10720K(76288K)] 65536K->10744K(251392K), 0.0101209 secs] [Times: user=0.03 sys=0.01, real=0.01 secs] ",
                "20.000: [Full GC (Ergonomics) [PSYoungGen: 10720K->0K(76288K)] [ParOldGen: 150000K->100000K(175104K)] 160720K->100000K(251392K), [Metaspace: 3000K->3000K(1056768K)], 0.0900000 secs] [Times: user=0.30 sys=0.00, real=0.09 secs] ",
                "30.000: [Full GC (System.gc()) 30.000: [Tenured: 1000K->900K(2000K), 0.5000000 secs] 3000K->900K(4000K), [Metaspace: 3000K->3000K(1056768K)], 0.5010000 secs] [Times: user=0.50 sys=0.00, real=0.50 secs] ",
            ],
        );
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let pauses = pauses(&events);
        assert_eq!(pauses[0].kind, PauseKind::PsYoungGen);
        assert_eq!(pauses[0].duration, 0.0101209);
        assert_eq!(pauses[1].kind, PauseKind::ParallelFull);
        assert_eq!(pauses[1].cause, Some(GcCause::Ergonomics));
        assert_eq!(
            pauses[1].pool(MemoryPool::Tenured),
            Some(&MemoryPoolSummary::with_final_size(150000, 100000, 175104))
        );
        assert_eq!(pauses[2].kind, PauseKind::SystemGc);
        assert_eq!(pauses[2].duration, 0.501);
        assert!(pauses[2].pool(MemoryPool::Metaspace).is_some());
    }

    #[test]
    fn permanent_generation() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            true,
            &["100.000: [Full GC 100.000: [CMS: 1000K->900K(2000K), 0.5000000 secs] 3000K->900K(4000K), [CMS Perm : 20000K->19000K(40000K)], 0.5010000 secs] [Times: user=0.50 sys=0.00, real=0.50 secs] "],
        );
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let pauses = pauses(&events);
        assert_eq!(pauses[0].kind, PauseKind::CmsFull);
        assert_eq!(
            pauses[0].pool(MemoryPool::Perm),
            Some(&MemoryPoolSummary::with_final_size(20000, 19000, 40000))
        );
        assert!(pauses[0].pool(MemoryPool::Metaspace).is_none());
    }

    #[test]
    fn without_details() {
        let (events, diagnostics) = parse(
            CollectorFamily::Serial,
            false,
            &[
                "1.000: [GC (Allocation Failure)  8192K->1024K(31744K), 0.0050000 secs]",
                "2.000: [Full GC (Metadata GC Threshold)  9000K->2000K(31744K), 0.0300000 secs]",
            ],
        );
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        let pauses = pauses(&events);
        assert_eq!(pauses[0].kind, PauseKind::DefNew);
        assert_eq!(pauses[1].kind, PauseKind::SerialFull);
        assert_eq!(pauses[1].cause, Some(GcCause::MetadataGcThreshold));
    }

    #[test]
    fn protocol_violations_and_exit() {
        let (events, diagnostics) = parse(
            CollectorFamily::Cms,
            true,
            &[
                "Java HotSpot(TM) 64-Bit Server VM (25.181-b13) for linux-amd64 JRE (1.8.0_181-b13)",
                "1.000: [CMS-concurrent-mark-start]",
                "2.000: [CMS-concurrent-mark-start]",
                "2.500: [CMS-concurrent-mark: 0.400/0.500 secs]",
                "3.000: [CMS-concurrent-sweep: 0.070/0.076 secs]",
                "Heap",
                " par new generation   total 471872K, used 40000K [0x0000000080000000, 0x000000009e000000, 0x000000009e000000)",
                END_OF_DATA_SENTINEL,
            ],
        );
        let names = events.iter().map(JvmEvent::kind_name).collect::<Vec<_>>();
        assert_eq!(names, vec!["CMS Concurrent Mark", "JVM Termination"]);
        assert_matches!(&events[1], JvmEvent::Termination(t) if t.at.uptime == Some(3.0));
        assert_matches!(
            diagnostics.entries(),
            [
                Diagnostic::ProtocolViolation { line_number: 3, slot: "concurrent", .. },
                Diagnostic::MalformedTrace { line_number: 5, rule: Some("CONCURRENT_END"), .. },
            ]
        );
        assert_eq!(diagnostics.ignored_lines(), 2);
    }

    proptest! {
        #[test]
        fn parsing_is_deterministic(
            uptime in 0u32..1_000_000,
            young in (1u64..1_000_000, 1u64..1_000_000, 1u64..1_000_000),
            millis in 0u32..10_000,
        ) {
            let line = format!(
                "{}.{:03}: [GC (Allocation Failure) {0}.{1:03}: [ParNew: {}K->{}K({}K), 0.{:07} secs] {2}K->{3}K({4}K), 0.{5:07} secs]",
                uptime / 1000,
                uptime % 1000,
                young.0,
                young.1,
                young.2,
                millis,
            );
            let (first, first_diagnostics) = parse(CollectorFamily::Cms, false, &[&line]);
            let (second, _) = parse(CollectorFamily::Cms, false, &[&line]);
            prop_assert!(first_diagnostics.is_clean());
            prop_assert_eq!(first.len(), 2);
            prop_assert_eq!(first, second);
        }
    }
}
