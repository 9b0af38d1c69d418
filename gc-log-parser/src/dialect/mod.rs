//! Rule tables and handlers of the supported log formats

mod generational;
mod preunified_g1;
mod unified_g1;
mod unified_generational;
mod zgc;

pub use self::{
    generational::Generational, preunified_g1::PreUnifiedG1, unified_g1::UnifiedG1,
    unified_generational::UnifiedGenerational, zgc::Zgc,
};

use crate::{
    diary::CollectorFamily,
    forward::{Describe, ForwardReference, KeyedSlots, PauseForwardReference, Slot},
    grammar::{before_after_size, pool_before_after, DECIMAL, MEMORY_SIZE, STAMP},
    parser::{HandlerError, ParseContext},
    trace::Trace,
};
use gc_events::{
    memory::kilobytes, parse_decimal, parse_integer, CpuSummary, GcCause, Kilobytes, MemoryPool,
    MemoryPoolSummary, PauseKind, ReferenceGcSummary, ReferenceStat, Seconds, TokenError,
};
use regex::Regex;
use std::sync::OnceLock;

/// Name of the rule for CPU breakdown lines in every dialect
const CPU_LINE: &str = "CPU_BREAKDOWN";

/// Young collection kind of a generational collector, for lines that do not
/// name the young generation
fn young_kind(collector: CollectorFamily) -> PauseKind {
    match collector {
        CollectorFamily::Serial => PauseKind::DefNew,
        CollectorFamily::Cms => PauseKind::ParNew,
        _ => PauseKind::PsYoungGen,
    }
}

/// Full collection kind of a generational collector
fn full_kind(collector: CollectorFamily, cause: Option<&GcCause>) -> PauseKind {
    if cause == Some(&GcCause::SystemGc) {
        return PauseKind::SystemGc;
    }
    match collector {
        CollectorFamily::Serial => PauseKind::SerialFull,
        CollectorFamily::Cms => PauseKind::CmsFull,
        _ => PauseKind::ParallelFull,
    }
}

/// Give up an event whose first line is malformed, reporting the event that
/// it would have replaced
fn abandon_start<T: Describe>(slot: &mut Slot<T>, ctx: &mut ParseContext) {
    if let Some(previous) = slot.try_take() {
        ctx.protocol_violation(slot.name(), &previous);
    }
    ctx.abandon(slot);
}

/// Give up an event whose last line is malformed
fn abandon_end<T: Describe>(slot: &mut Slot<T>, ctx: &mut ParseContext) {
    if let Some(event) = slot.try_take() {
        ctx.discard(&event);
    }
}

/// Give up an event keyed by GC id whose first line is malformed, reporting
/// the event with the same id that it would have replaced
fn abandon_keyed_start<T: Describe>(slots: &mut KeyedSlots<T>, gc_id: u32, ctx: &mut ParseContext) {
    if let Some(previous) = slots.try_take(gc_id) {
        ctx.protocol_violation(slots.name(), &previous);
    }
    ctx.abandon_keyed(slots, gc_id);
}

/// Give up an event keyed by GC id whose last line is malformed
fn abandon_keyed_end<T: Describe>(slots: &mut KeyedSlots<T>, gc_id: u32, ctx: &mut ParseContext) {
    if let Some(event) = slots.try_take(gc_id) {
        ctx.discard(&event);
    }
}

/// Optional `, [Metaspace: before->after(size)]` part of a pre-unified full
/// collection (7 groups: pool name, then memory transition)
fn metaspace_part() -> String {
    format!(
        r"(?:, \[(Metaspace|CMS Perm|Perm|PSPermGen)\s?: {}\])?",
        before_after_size()
    )
}

/// Memory pool named by a pre-unified metadata pool label
fn metadata_pool(label: &str) -> MemoryPool {
    match label {
        "Metaspace" => MemoryPool::Metaspace,
        _ => MemoryPool::Perm,
    }
}

/// Decode the `[SoftReference, n refs, t secs]...` blocks that
/// -XX:+PrintReferenceGC inserts in pre-unified logs
fn pre_unified_references(text: &str) -> Result<Option<ReferenceGcSummary>, TokenError> {
    static REFERENCE: OnceLock<Regex> = OnceLock::new();
    let reference = REFERENCE.get_or_init(|| {
        Regex::new(
            r"\[(Soft|Weak|Final|Phantom|JNI Weak )Reference, (?:(\d+) refs(?:, \d+ refs)?, )?(\d+[.,]\d+) secs\]",
        )
        .expect("reference grammar is valid")
    });
    let mut summary = ReferenceGcSummary::default();
    let mut found = false;
    for captures in reference.captures_iter(text) {
        let stat = ReferenceStat {
            count: captures
                .get(2)
                .map(|count| parse_integer(count.as_str()))
                .transpose()?,
            pause_time: Some(parse_decimal(&captures[3])?),
            ..ReferenceStat::default()
        };
        let target = match &captures[1] {
            "Soft" => &mut summary.soft,
            "Weak" => &mut summary.weak,
            "Final" => &mut summary.final_,
            "Phantom" => &mut summary.phantom,
            _ => &mut summary.jni_weak,
        };
        *target = Some(stat);
        found = true;
    }
    Ok(found.then_some(summary))
}

/// Decode the `STAMP: [name (detail), t secs]` sub-phases of a pre-unified
/// CMS remark or full collection
fn pre_unified_sub_phases(text: &str) -> Result<Vec<(&str, Seconds)>, TokenError> {
    static SUB_PHASE: OnceLock<Regex> = OnceLock::new();
    let sub_phase = SUB_PHASE.get_or_init(|| {
        Regex::new(&format!(
            r"{STAMP}\[([a-zA-Z][a-zA-Z ]*?)\s*(?:\(\w+\)\s*)?, {DECIMAL} secs\]"
        ))
        .expect("sub-phase grammar is valid")
    });
    sub_phase
        .captures_iter(text)
        .map(|captures| {
            let name = captures.get(1).map_or("", |m| m.as_str());
            Ok((name, parse_decimal(&captures[2])?))
        })
        .collect()
}

/// Decode a `size (percent%)` or bare `size` ZGC or unified quantity
fn memory_token(token: &str) -> Result<Kilobytes, TokenError> {
    static MEMORY: OnceLock<Regex> = OnceLock::new();
    let memory = MEMORY
        .get_or_init(|| Regex::new(&format!("^{MEMORY_SIZE}$")).expect("memory grammar is valid"));
    let captures = memory
        .captures(token.trim())
        .ok_or_else(|| TokenError::UnknownUnit(token.into()))?;
    kilobytes(&captures[1], &captures[2])
}

/// Memory transition of a unified `before->after(size)` line where the size
/// only refers to the state after the collection
fn transition(before: Kilobytes, after: Kilobytes, size: Option<Kilobytes>) -> MemoryPoolSummary {
    MemoryPoolSummary {
        occupancy_before: before,
        size_before: None,
        occupancy_after: after,
        size_after: size,
    }
}

/// Unified `Metaspace: ...` line, either in the JDK 9 to 15 `before->after(size)`
/// notation (groups 1 to 6) or in the later notation that also breaks down
/// class space (groups 7 to 30)
fn unified_metaspace() -> String {
    let (bas, pool) = (before_after_size(), pool_before_after());
    format!(r"^Metaspace: (?:{bas}|{pool}(?: NonClass: {pool} Class: {pool})?)\s*$")
}

/// Record the pools of a [`unified_metaspace`] line
fn record_unified_metaspace(
    pause: &mut PauseForwardReference,
    trace: &Trace,
) -> Result<(), HandlerError> {
    if trace.has_group(1) {
        pause.set_pool(MemoryPool::Metaspace, trace.occupancy_before_after_size(1)?)?;
        return Ok(());
    }
    pause.set_pool(MemoryPool::Metaspace, trace.memory_pool_before_after(7)?)?;
    if trace.has_group(15) {
        pause.set_pool(MemoryPool::NonClassSpace, trace.memory_pool_before_after(15)?)?;
        pause.set_pool(MemoryPool::ClassSpace, trace.memory_pool_before_after(23)?)?;
    }
    Ok(())
}

/// Unified event whose summary line was seen, and which may still receive
/// the `gc,cpu` line that usually follows
///
/// The event is emitted when the CPU breakdown arrives, or when any other
/// line does.
#[derive(Debug, Default)]
struct AwaitingCpu {
    /// GC id, event, and truth that emitting the event completes the
    /// concurrent cycle with that id
    event: Option<(u32, ForwardReference, bool)>,

    /// GC id of an abandoned event, whose CPU breakdown may still come
    abandoned: Option<u32>,
}
//
impl AwaitingCpu {
    /// Hold a finished event, emitting the one that was held before, if any
    fn hold(
        &mut self,
        gc_id: u32,
        event: impl Into<ForwardReference>,
        closes_cycle: bool,
        ctx: &mut ParseContext,
    ) -> Result<(), HandlerError> {
        self.abandoned = None;
        match self.event.replace((gc_id, event.into(), closes_cycle)) {
            Some(previous) => Self::emit(previous, ctx),
            None => Ok(()),
        }
    }

    /// Emit the held event, if any
    fn flush(&mut self, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        self.abandoned = None;
        match self.event.take() {
            Some(held) => Self::emit(held, ctx),
            None => Ok(()),
        }
    }

    /// Attach a CPU breakdown to the held event and emit it
    fn attach(
        &mut self,
        gc_id: u32,
        cpu: CpuSummary,
        ctx: &mut ParseContext,
    ) -> Result<(), HandlerError> {
        match self.event.take() {
            Some((id, mut event, closes_cycle)) if id == gc_id => {
                let outcome = event.set_cpu(cpu);
                Self::emit((id, event, closes_cycle), ctx)?;
                Ok(outcome?)
            }
            other => {
                if let Some(held) = other {
                    Self::emit(held, ctx)?;
                }
                if self.abandoned.take() == Some(gc_id) {
                    return Err(HandlerError::Abandoned {
                        slot: "finished",
                        gc_id: Some(gc_id),
                    });
                }
                Err(HandlerError::NoEventInFlight {
                    slot: "finished",
                    gc_id: Some(gc_id),
                })
            }
        }
    }

    /// Give up the event with some GC id, whether it is held or its summary
    /// line was malformed
    fn abandon(&mut self, gc_id: u32, ctx: &mut ParseContext) {
        match self.event.take() {
            Some((id, event, closes_cycle)) if id == gc_id => {
                ctx.discard(&event);
                if closes_cycle {
                    ctx.emitter.close_cycle(gc_id);
                }
            }
            other => self.event = other,
        }
        self.abandoned = Some(gc_id);
    }

    /// Give up the held event, at the end of the log
    fn drain(&mut self) -> Option<ForwardReference> {
        self.event.take().map(|(_, event, _)| event)
    }

    fn emit(
        (gc_id, event, closes_cycle): (u32, ForwardReference, bool),
        ctx: &mut ParseContext,
    ) -> Result<(), HandlerError> {
        let outcome = ctx.emit_forward(event);
        if closes_cycle {
            ctx.emitter.close_cycle(gc_id);
        }
        outcome
    }
}

/// Lines of the heap printout that HotSpot writes at exit and around
/// collections with -XX:+PrintHeapAtGC
const HEAP_PRINTOUT_PREFIXES: &[&str] = &[
    " par new generation",
    " def new generation",
    " PSYoungGen",
    " ParOldGen",
    " PSOldGen",
    " PSPermGen",
    " tenured generation",
    " concurrent mark-sweep generation",
    " concurrent-mark-sweep perm gen",
    " compacting perm gen",
    " garbage-first heap",
    " ZHeap",
    " Metaspace",
    " class space",
    "  eden space",
    "  from space",
    "  to space",
    "  object space",
    "   the space",
    "  region size",
    "{Heap before GC",
    "Heap after GC",
    "}",
];

/// Banner and environment lines
const BANNER_PREFIXES: &[&str] = &[
    "Java HotSpot",
    "OpenJDK",
    "Memory: ",
    "CommandLine flags: ",
    "Total time for which application threads were stopped",
    "Application time: ",
];

/// Configuration report that unified logging prints at startup
const UNIFIED_BANNER_PREFIXES: &[&str] = &[
    "Using ",
    "Version: ",
    "CPUs: ",
    "Memory: ",
    "Large Page Support: ",
    "NUMA Support: ",
    "Compressed Oops: ",
    "Heap Min Capacity: ",
    "Pre-touch: ",
    "Parallel Workers: ",
    "Concurrent Workers: ",
    "Concurrent Refinement Workers: ",
    "Periodic GC: ",
    "Heap address: ",
    "CardTable entry size: ",
    "Alignments: ",
    "Initializing The Z Garbage Collector",
    "Medium Page Size: ",
    "Workers: ",
    "Runtime Workers: ",
    "Address Space Type: ",
    "Address Space Size: ",
    "Heap Backing ",
    "Min Capacity: ",
    "Uncommit: ",
    "Probing address space",
    "Allocation Stall ",
    "Narrow klass ",
    "Compressed class space ",
    "Mark Stack Size",
    "Initialize mark stack",
    "Heap before GC",
    "class space ",
];

/// Truth that a line is one of the banners or heap printouts that carry no
/// event information
fn is_common_ignorable(line: &str) -> bool {
    HEAP_PRINTOUT_PREFIXES
        .iter()
        .chain(BANNER_PREFIXES)
        .any(|prefix| line.starts_with(prefix))
}

/// Truth that the body of a unified line carries no event information
fn is_unified_ignorable(body: &str) -> bool {
    let trimmed = body.trim_start();
    is_common_ignorable(body)
        || UNIFIED_BANNER_PREFIXES
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
}
