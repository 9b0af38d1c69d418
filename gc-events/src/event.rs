//! Events that a GC log parser reconstructs

use crate::{
    CpuSummary, DateTimeStamp, GcCause, Kilobytes, MemoryPool, MemoryPoolSummary,
    ReferenceGcSummary, Seconds,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Something noteworthy that the JVM did
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum JvmEvent {
    /// Stop-the-world pause
    Pause(GcPause),

    /// Phase of a collection that ran concurrently with the application
    Concurrent(ConcurrentPhase),

    /// Complete ZGC collection cycle
    Zgc(ZgcCycle),

    /// The JVM exited, or the log ended
    Termination(JvmTermination),
}
//
impl JvmEvent {
    /// When the event started
    pub fn start(&self) -> DateTimeStamp {
        match self {
            JvmEvent::Pause(pause) => pause.start,
            JvmEvent::Concurrent(phase) => phase.start,
            JvmEvent::Zgc(cycle) => cycle.start,
            JvmEvent::Termination(termination) => termination.at,
        }
    }

    /// GC identifier, for logs that carry one
    pub fn gc_id(&self) -> Option<u32> {
        match self {
            JvmEvent::Pause(pause) => pause.gc_id,
            JvmEvent::Concurrent(phase) => phase.gc_id,
            JvmEvent::Zgc(cycle) => cycle.gc_id,
            JvmEvent::Termination(_) => None,
        }
    }

    /// Human-readable name of the event kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            JvmEvent::Pause(pause) => pause.kind.into(),
            JvmEvent::Concurrent(phase) => phase.kind.into(),
            JvmEvent::Zgc(_) => "ZGC Cycle",
            JvmEvent::Termination(_) => "JVM Termination",
        }
    }
}

/// Kind of stop-the-world pause
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, strum::IntoStaticStr)]
pub enum PauseKind {
    /// Serial young collection
    #[strum(serialize = "DefNew")]
    DefNew,

    /// CMS young collection
    #[strum(serialize = "ParNew")]
    ParNew,

    /// Parallel young collection
    #[strum(serialize = "PSYoungGen")]
    PsYoungGen,

    /// Serial full collection
    #[strum(serialize = "Full GC (Serial)")]
    SerialFull,

    /// Parallel full collection
    #[strum(serialize = "Full GC (Parallel)")]
    ParallelFull,

    /// CMS foreground full collection
    #[strum(serialize = "Full GC (CMS)")]
    CmsFull,

    /// Full collection requested through System.gc()
    #[strum(serialize = "System.gc()")]
    SystemGc,

    /// CMS fell back to a full collection while a concurrent cycle was running
    #[strum(serialize = "Concurrent Mode Failure")]
    ConcurrentModeFailure,

    /// CMS concurrent cycle was interrupted by an explicit full collection
    #[strum(serialize = "Concurrent Mode Interrupted")]
    ConcurrentModeInterrupted,

    /// CMS initial mark
    #[strum(serialize = "CMS Initial Mark")]
    CmsInitialMark,

    /// CMS remark
    #[strum(serialize = "CMS Remark")]
    CmsRemark,

    /// G1 young collection
    #[strum(serialize = "G1 Young")]
    G1Young,

    /// G1 young collection that also starts a concurrent cycle
    #[strum(serialize = "G1 Concurrent Start")]
    G1ConcurrentStart,

    /// G1 mixed collection
    #[strum(serialize = "G1 Mixed")]
    G1Mixed,

    /// G1 full collection
    #[strum(serialize = "G1 Full")]
    G1Full,

    /// G1 remark
    #[strum(serialize = "G1 Remark")]
    G1Remark,

    /// G1 cleanup
    #[strum(serialize = "G1 Cleanup")]
    G1Cleanup,
}
//
impl PauseKind {
    /// Truth that this pause collects memory, and must thus report on the heap
    pub fn is_collection(self) -> bool {
        !matches!(
            self,
            PauseKind::CmsInitialMark
                | PauseKind::CmsRemark
                | PauseKind::G1Remark
                | PauseKind::G1Cleanup
        )
    }

    /// Truth that this pause collects the whole heap
    pub fn is_full(self) -> bool {
        matches!(
            self,
            PauseKind::SerialFull
                | PauseKind::ParallelFull
                | PauseKind::CmsFull
                | PauseKind::SystemGc
                | PauseKind::ConcurrentModeFailure
                | PauseKind::ConcurrentModeInterrupted
                | PauseKind::G1Full
        )
    }
}

/// Noteworthy circumstances of a pause
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
pub enum PauseFlag {
    /// Objects could not be promoted to the old generation
    PromotionFailed,

    /// G1 ran out of space to evacuate objects to
    ToSpaceExhausted,

    /// G1 young collection that prepares for mixed collections
    PrepareMixed,
}

/// Stop-the-world garbage collection pause
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GcPause {
    /// What kind of pause this was
    pub kind: PauseKind,

    /// GC identifier, for logs that carry one
    pub gc_id: Option<u32>,

    /// When the pause started
    pub start: DateTimeStamp,

    /// How long the application was stopped
    pub duration: Seconds,

    /// Why the pause happened, if the log says
    pub cause: Option<GcCause>,

    /// Memory pool occupancy around the pause
    pub pools: BTreeMap<MemoryPool, MemoryPoolSummary>,

    /// CPU time breakdown
    pub cpu: Option<CpuSummary>,

    /// Reference processing statistics
    pub references: Option<ReferenceGcSummary>,

    /// Durations of named sub-phases of the pause
    pub phases: BTreeMap<Box<str>, Seconds>,

    /// Number of GC worker threads
    pub workers: Option<u32>,

    /// Tenuring threshold computed at the end of a young collection
    pub tenuring_threshold: Option<u32>,

    /// Noteworthy circumstances
    pub flags: BTreeSet<PauseFlag>,
}
//
impl GcPause {
    /// Occupancy of a memory pool around the pause, if reported
    pub fn pool(&self, pool: MemoryPool) -> Option<&MemoryPoolSummary> {
        self.pools.get(&pool)
    }

    /// Occupancy of the whole heap around the pause, if reported
    pub fn heap(&self) -> Option<&MemoryPoolSummary> {
        self.pool(MemoryPool::Heap)
    }
}

/// Kind of concurrent phase
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, strum::IntoStaticStr)]
pub enum ConcurrentKind {
    /// CMS concurrent marking
    #[strum(serialize = "CMS Concurrent Mark")]
    CmsMark,

    /// CMS concurrent precleaning
    #[strum(serialize = "CMS Concurrent Preclean")]
    CmsPreclean,

    /// CMS abortable precleaning
    #[strum(serialize = "CMS Concurrent Abortable Preclean")]
    CmsAbortablePreclean,

    /// CMS concurrent sweeping
    #[strum(serialize = "CMS Concurrent Sweep")]
    CmsSweep,

    /// CMS concurrent reset
    #[strum(serialize = "CMS Concurrent Reset")]
    CmsReset,

    /// Complete G1 concurrent cycle
    #[strum(serialize = "G1 Concurrent Cycle")]
    G1Cycle,

    /// G1 concurrent cycle that was undone because marking became useless
    #[strum(serialize = "G1 Concurrent Undo Cycle")]
    G1UndoCycle,

    /// G1 claimed marks clearing
    #[strum(serialize = "G1 Concurrent Clear Claimed Marks")]
    G1ClearClaimedMarks,

    /// G1 root region scanning
    #[strum(serialize = "G1 Concurrent Root Region Scan")]
    G1RootRegionScan,

    /// G1 concurrent marking, as a whole
    #[strum(serialize = "G1 Concurrent Mark")]
    G1Mark,

    /// G1 marking from roots
    #[strum(serialize = "G1 Concurrent Mark From Roots")]
    G1MarkFromRoots,

    /// G1 concurrent precleaning
    #[strum(serialize = "G1 Concurrent Preclean")]
    G1Preclean,

    /// G1 concurrent marking was aborted by a full collection
    #[strum(serialize = "G1 Concurrent Mark Abort")]
    G1MarkAbort,

    /// G1 remembered set rebuilding
    #[strum(serialize = "G1 Concurrent Rebuild Remembered Sets")]
    G1RebuildRememberedSets,

    /// G1 cleanup after the cleanup pause (pre-unified logs)
    #[strum(serialize = "G1 Concurrent Cleanup")]
    G1Cleanup,

    /// G1 preparation of the next marking cycle
    #[strum(serialize = "G1 Concurrent Cleanup For Next Mark")]
    G1CleanupForNextMark,
}

/// Phase of a collection that ran concurrently with the application
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConcurrentPhase {
    /// What kind of phase this was
    pub kind: ConcurrentKind,

    /// GC identifier, for logs that carry one
    pub gc_id: Option<u32>,

    /// When the phase started
    pub start: DateTimeStamp,

    /// Wall-clock duration of the phase
    pub duration: Seconds,

    /// CPU time spent by the phase, when reported separately (CMS)
    pub cpu_time: Option<Seconds>,

    /// CPU time breakdown, when reported
    pub cpu: Option<CpuSummary>,
}

/// Rows of the ZGC heap statistics table
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, strum::EnumString,
)]
pub enum ZgcMemoryRow {
    /// Heap capacity
    Capacity,

    /// Reserved memory (JDK 11 to 15)
    Reserve,

    /// Free memory
    Free,

    /// Used memory
    Used,

    /// Live objects
    Live,

    /// Allocated memory
    Allocated,

    /// Garbage objects
    Garbage,

    /// Reclaimed memory
    Reclaimed,
}

/// Columns of the ZGC heap statistics table
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ZgcMemoryColumn {
    /// At the start of marking
    MarkStart,

    /// At the end of marking
    MarkEnd,

    /// At the start of relocation
    RelocateStart,

    /// At the end of relocation
    RelocateEnd,

    /// Highest value observed during the cycle
    High,

    /// Lowest value observed during the cycle
    Low,
}
//
impl ZgcMemoryColumn {
    /// Columns in the order where ZGC prints them
    pub const ALL: [Self; 6] = [
        Self::MarkStart,
        Self::MarkEnd,
        Self::RelocateStart,
        Self::RelocateEnd,
        Self::High,
        Self::Low,
    ];
}

/// One sample of the ZGC minimum mutator utilization report
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ZgcMmuSample {
    /// Time window in milliseconds
    pub window_ms: u32,

    /// Fraction of the window available to the application, in percent
    pub utilization_percent: f64,
}

/// ZGC metaspace report
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ZgcMetaspace {
    /// Used metaspace
    pub used: Kilobytes,

    /// Metaspace capacity
    pub capacity: Kilobytes,

    /// Committed metaspace
    pub committed: Kilobytes,

    /// Reserved metaspace
    pub reserved: Kilobytes,
}

/// Complete ZGC collection cycle
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ZgcCycle {
    /// GC identifier
    pub gc_id: Option<u32>,

    /// When the cycle started
    pub start: DateTimeStamp,

    /// Time from the start of the cycle to its summary line
    pub duration: Seconds,

    /// Why the cycle happened
    pub cause: GcCause,

    /// Durations of the pause and concurrent phases
    pub phases: BTreeMap<Box<str>, Seconds>,

    /// Used heap before and after the cycle
    pub heap: MemoryPoolSummary,

    /// Used heap before and after the cycle, in percent of capacity
    pub heap_percent: (u8, u8),

    /// System load averages over 1, 5 and 15 minutes
    pub load_average: Option<[f64; 3]>,

    /// Minimum mutator utilization
    pub mmu: Vec<ZgcMmuSample>,

    /// Metaspace report
    pub metaspace: Option<ZgcMetaspace>,

    /// Reference processing statistics
    pub references: Option<ReferenceGcSummary>,

    /// Memory relocated by the cycle
    pub relocated: Option<Kilobytes>,

    /// Heap statistics table
    pub memory: BTreeMap<ZgcMemoryRow, BTreeMap<ZgcMemoryColumn, Kilobytes>>,
}
//
impl ZgcCycle {
    /// Sum of the durations of the pause phases
    pub fn total_pause_time(&self) -> Seconds {
        self.phases
            .iter()
            .filter(|(name, _)| name.starts_with("Pause"))
            .map(|(_, duration)| duration)
            .sum()
    }
}

/// End of the JVM's life, or of the log
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct JvmTermination {
    /// Last known point in time
    pub at: DateTimeStamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn young_pause() -> GcPause {
        GcPause {
            kind: PauseKind::ParNew,
            gc_id: None,
            start: DateTimeStamp::from_uptime(62.616),
            duration: 0.253659,
            cause: None,
            pools: BTreeMap::from([(
                MemoryPool::Heap,
                MemoryPoolSummary::with_final_size(5097075, 193310, 24536704),
            )]),
            cpu: None,
            references: None,
            phases: BTreeMap::new(),
            workers: None,
            tenuring_threshold: None,
            flags: BTreeSet::new(),
        }
    }

    #[test]
    fn event_accessors() {
        let event = JvmEvent::Pause(young_pause());
        assert_eq!(event.start(), DateTimeStamp::from_uptime(62.616));
        assert_eq!(event.gc_id(), None);
        assert_eq!(event.kind_name(), "ParNew");
        if let JvmEvent::Pause(pause) = &event {
            assert_eq!(pause.heap().map(|heap| heap.occupancy_after), Some(193310));
            assert_eq!(pause.pool(MemoryPool::Young), None);
        }

        let termination = JvmEvent::Termination(JvmTermination {
            at: DateTimeStamp::from_uptime(1.0),
        });
        assert_eq!(termination.kind_name(), "JVM Termination");
    }

    #[test]
    fn pause_kinds() {
        assert!(PauseKind::ParNew.is_collection());
        assert!(!PauseKind::ParNew.is_full());
        assert!(PauseKind::ConcurrentModeFailure.is_full());
        assert!(!PauseKind::G1Remark.is_collection());
        let name: &'static str = ConcurrentKind::G1Mark.into();
        assert_eq!(name, "G1 Concurrent Mark");
    }

    #[test]
    fn serialization() {
        let json = serde_json::to_value(JvmEvent::Pause(young_pause())).unwrap();
        assert_eq!(json["type"], "Pause");
        assert_eq!(json["kind"], "ParNew");
        assert_eq!(json["pools"]["heap"]["occupancy_before"], 5097075);
        assert_eq!(json["start"]["uptime"], 62.616);
    }

    #[test]
    fn zgc_pause_time() {
        let cycle = ZgcCycle {
            gc_id: Some(0),
            start: DateTimeStamp::from_uptime(0.5),
            duration: 0.02,
            cause: GcCause::Warmup,
            phases: BTreeMap::from([
                ("Pause Mark Start".into(), 0.25),
                ("Concurrent Mark".into(), 8.0),
                ("Pause Mark End".into(), 0.5),
            ]),
            heap: MemoryPoolSummary::without_size(96 * 1024, 46 * 1024),
            heap_percent: (2, 1),
            load_average: None,
            mmu: Vec::new(),
            metaspace: None,
            references: None,
            relocated: None,
            memory: BTreeMap::new(),
        };
        assert_eq!(cycle.total_pause_time(), 0.75);
    }
}
