//! Accumulators for events whose description spans several lines
//!
//! A forward reference is created when the start of an event is recognized,
//! filled by the handlers of every continuation line, and materialized into
//! an immutable event exactly once, when its terminal line is recognized.

use crate::parser::HandlerError;
use gc_events::{
    ConcurrentKind, ConcurrentPhase, CpuSummary, DateTimeStamp, GcCause, GcPause, JvmEvent,
    Kilobytes, MemoryPool, MemoryPoolSummary, PauseFlag, PauseKind, ReferenceGcSummary, Seconds,
    ZgcCycle, ZgcMemoryColumn, ZgcMemoryRow, ZgcMetaspace, ZgcMmuSample,
};
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};
use thiserror::Error;

/// Field that may only be set once per event
#[derive(Clone, Debug, PartialEq)]
pub struct SetOnce<T>(Option<T>);
//
impl<T> SetOnce<T> {
    /// Set the field, failing if it was already set
    pub fn set(&mut self, field: &'static str, value: T) -> Result<(), ForwardReferenceError> {
        if self.0.is_some() {
            return Err(ForwardReferenceError::FieldAlreadySet(field));
        }
        self.0 = Some(value);
        Ok(())
    }

    /// Set the field, replacing any previous value
    ///
    /// Only meant for fields that some dialects legitimately print twice.
    pub fn overwrite(&mut self, value: T) {
        self.0 = Some(value);
    }

    /// Current value
    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    /// Truth that the field was set
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Extract the value
    pub fn into_inner(self) -> Option<T> {
        self.0
    }

    /// Extract a value that materialization cannot do without
    pub fn require(
        self,
        event: &'static str,
        field: &'static str,
    ) -> Result<T, ForwardReferenceError> {
        self.0
            .ok_or(ForwardReferenceError::MissingField { event, field })
    }
}
//
impl<T> Default for SetOnce<T> {
    fn default() -> Self {
        Self(None)
    }
}

/// Describe an in-flight event in diagnostics
pub trait Describe {
    /// Short human-readable description
    fn describe(&self) -> String;
}

/// Insert a sub-phase duration, failing if that sub-phase was already seen
fn add_phase(
    phases: &mut BTreeMap<Box<str>, Seconds>,
    name: &str,
    duration: Seconds,
) -> Result<(), ForwardReferenceError> {
    match phases.entry(name.trim().into()) {
        Entry::Vacant(vacant) => {
            vacant.insert(duration);
            Ok(())
        }
        Entry::Occupied(occupied) => Err(ForwardReferenceError::PhaseAlreadySet(
            occupied.key().clone(),
        )),
    }
}

/// Stop-the-world pause in progress
#[derive(Clone, Debug, PartialEq)]
pub struct PauseForwardReference {
    kind: PauseKind,
    gc_id: Option<u32>,
    start: DateTimeStamp,
    cause: SetOnce<GcCause>,
    pools: BTreeMap<MemoryPool, MemoryPoolSummary>,
    cpu: SetOnce<CpuSummary>,
    references: SetOnce<ReferenceGcSummary>,
    phases: BTreeMap<Box<str>, Seconds>,
    workers: SetOnce<u32>,
    tenuring_threshold: SetOnce<u32>,
    duration: SetOnce<Seconds>,
    flags: BTreeSet<PauseFlag>,
}
//
impl PauseForwardReference {
    /// Start accumulating a pause
    pub fn new(kind: PauseKind, gc_id: Option<u32>, start: DateTimeStamp) -> Self {
        Self {
            kind,
            gc_id,
            start,
            cause: SetOnce::default(),
            pools: BTreeMap::new(),
            cpu: SetOnce::default(),
            references: SetOnce::default(),
            phases: BTreeMap::new(),
            workers: SetOnce::default(),
            tenuring_threshold: SetOnce::default(),
            duration: SetOnce::default(),
            flags: BTreeSet::new(),
        }
    }

    /// Kind of pause
    pub fn kind(&self) -> PauseKind {
        self.kind
    }

    /// Refine the kind of pause once the log has said more about it
    pub fn set_kind(&mut self, kind: PauseKind) {
        self.kind = kind;
    }

    /// GC identifier
    pub fn gc_id(&self) -> Option<u32> {
        self.gc_id
    }

    /// When the pause started
    pub fn start(&self) -> DateTimeStamp {
        self.start
    }

    /// Record the cause, if the line had one
    pub fn set_cause(&mut self, cause: Option<GcCause>) -> Result<(), ForwardReferenceError> {
        match cause {
            Some(cause) => self.cause.set("cause", cause),
            None => Ok(()),
        }
    }

    /// Cause of the pause, if known
    pub fn cause(&self) -> Option<&GcCause> {
        self.cause.get()
    }

    /// Record the occupancy of a memory pool
    pub fn set_pool(
        &mut self,
        pool: MemoryPool,
        summary: MemoryPoolSummary,
    ) -> Result<(), ForwardReferenceError> {
        match self.pools.entry(pool) {
            Entry::Vacant(vacant) => {
                vacant.insert(summary);
                Ok(())
            }
            Entry::Occupied(_) => Err(ForwardReferenceError::FieldAlreadySet(pool.into())),
        }
    }

    /// Record the occupancy of a memory pool that the log prints twice
    pub fn reemit_pool(&mut self, pool: MemoryPool, summary: MemoryPoolSummary) {
        self.pools.insert(pool, summary);
    }

    /// Occupancy of a memory pool, if known
    pub fn pool(&self, pool: MemoryPool) -> Option<&MemoryPoolSummary> {
        self.pools.get(&pool)
    }

    /// Record the CPU breakdown
    pub fn set_cpu(&mut self, cpu: CpuSummary) -> Result<(), ForwardReferenceError> {
        self.cpu.set("cpu", cpu)
    }

    /// Truth that the CPU breakdown is known
    pub fn has_cpu(&self) -> bool {
        self.cpu.is_set()
    }

    /// Record reference processing statistics
    pub fn set_references(
        &mut self,
        references: ReferenceGcSummary,
    ) -> Result<(), ForwardReferenceError> {
        self.references.set("references", references)
    }

    /// Record the duration of a sub-phase
    pub fn add_phase(&mut self, name: &str, duration: Seconds) -> Result<(), ForwardReferenceError> {
        add_phase(&mut self.phases, name, duration)
    }

    /// Record the number of GC worker threads
    pub fn set_workers(&mut self, workers: u32) -> Result<(), ForwardReferenceError> {
        self.workers.set("workers", workers)
    }

    /// Record the tenuring threshold
    pub fn set_tenuring_threshold(&mut self, threshold: u32) -> Result<(), ForwardReferenceError> {
        self.tenuring_threshold.set("tenuring threshold", threshold)
    }

    /// Record the pause duration
    pub fn set_duration(&mut self, duration: Seconds) -> Result<(), ForwardReferenceError> {
        self.duration.set("duration", duration)
    }

    /// Pause duration, if known
    pub fn duration(&self) -> Option<Seconds> {
        self.duration.get().copied()
    }

    /// Record a noteworthy circumstance
    pub fn add_flag(&mut self, flag: PauseFlag) {
        self.flags.insert(flag);
    }

    /// Turn into an immutable pause event
    pub fn materialize(self) -> Result<GcPause, ForwardReferenceError> {
        let event = self.kind.into();
        if self.kind.is_collection() && !self.pools.contains_key(&MemoryPool::Heap) {
            return Err(ForwardReferenceError::MissingField {
                event,
                field: "heap",
            });
        }
        Ok(GcPause {
            kind: self.kind,
            gc_id: self.gc_id,
            start: self.start,
            duration: self.duration.require(event, "duration")?,
            cause: self.cause.into_inner(),
            pools: self.pools,
            cpu: self.cpu.into_inner(),
            references: self.references.into_inner(),
            phases: self.phases,
            workers: self.workers.into_inner(),
            tenuring_threshold: self.tenuring_threshold.into_inner(),
            flags: self.flags,
        })
    }
}
//
impl Describe for PauseForwardReference {
    fn describe(&self) -> String {
        let kind: &str = self.kind.into();
        match self.gc_id {
            Some(id) => format!("{kind} GC({id}) started at {}", self.start),
            None => format!("{kind} started at {}", self.start),
        }
    }
}

/// Concurrent phase in progress
#[derive(Clone, Debug, PartialEq)]
pub struct ConcurrentForwardReference {
    kind: ConcurrentKind,
    gc_id: Option<u32>,
    start: DateTimeStamp,
    duration: SetOnce<Seconds>,
    cpu_time: SetOnce<Seconds>,
    cpu: SetOnce<CpuSummary>,
}
//
impl ConcurrentForwardReference {
    /// Start accumulating a concurrent phase
    pub fn new(kind: ConcurrentKind, gc_id: Option<u32>, start: DateTimeStamp) -> Self {
        Self {
            kind,
            gc_id,
            start,
            duration: SetOnce::default(),
            cpu_time: SetOnce::default(),
            cpu: SetOnce::default(),
        }
    }

    /// Kind of phase
    pub fn kind(&self) -> ConcurrentKind {
        self.kind
    }

    /// When the phase started
    pub fn start(&self) -> DateTimeStamp {
        self.start
    }

    /// Record the wall-clock duration
    pub fn set_duration(&mut self, duration: Seconds) -> Result<(), ForwardReferenceError> {
        self.duration.set("duration", duration)
    }

    /// Record the CPU time of the phase
    pub fn set_cpu_time(&mut self, cpu_time: Seconds) -> Result<(), ForwardReferenceError> {
        self.cpu_time.set("cpu time", cpu_time)
    }

    /// Record the CPU breakdown
    pub fn set_cpu(&mut self, cpu: CpuSummary) -> Result<(), ForwardReferenceError> {
        self.cpu.set("cpu", cpu)
    }

    /// Turn into an immutable concurrent phase event
    pub fn materialize(self) -> Result<ConcurrentPhase, ForwardReferenceError> {
        Ok(ConcurrentPhase {
            kind: self.kind,
            gc_id: self.gc_id,
            start: self.start,
            duration: self.duration.require(self.kind.into(), "duration")?,
            cpu_time: self.cpu_time.into_inner(),
            cpu: self.cpu.into_inner(),
        })
    }
}
//
impl Describe for ConcurrentForwardReference {
    fn describe(&self) -> String {
        let kind: &str = self.kind.into();
        format!("{kind} started at {}", self.start)
    }
}

/// ZGC cycle in progress
#[derive(Clone, Debug, PartialEq)]
pub struct ZgcCycleForwardReference {
    gc_id: Option<u32>,
    start: DateTimeStamp,
    cause: GcCause,
    phases: BTreeMap<Box<str>, Seconds>,
    heap: SetOnce<(MemoryPoolSummary, (u8, u8))>,
    load_average: SetOnce<[f64; 3]>,
    mmu: SetOnce<Vec<ZgcMmuSample>>,
    metaspace: SetOnce<ZgcMetaspace>,
    references: ReferenceGcSummary,
    has_references: bool,
    relocated: SetOnce<Kilobytes>,
    memory: BTreeMap<ZgcMemoryRow, BTreeMap<ZgcMemoryColumn, Kilobytes>>,
}
//
impl ZgcCycleForwardReference {
    /// Start accumulating a ZGC cycle
    pub fn new(gc_id: Option<u32>, start: DateTimeStamp, cause: GcCause) -> Self {
        Self {
            gc_id,
            start,
            cause,
            phases: BTreeMap::new(),
            heap: SetOnce::default(),
            load_average: SetOnce::default(),
            mmu: SetOnce::default(),
            metaspace: SetOnce::default(),
            references: ReferenceGcSummary::default(),
            has_references: false,
            relocated: SetOnce::default(),
            memory: BTreeMap::new(),
        }
    }

    /// Record the duration of a pause or concurrent phase
    pub fn add_phase(&mut self, name: &str, duration: Seconds) -> Result<(), ForwardReferenceError> {
        add_phase(&mut self.phases, name, duration)
    }

    /// Record the used heap before and after the cycle
    pub fn set_heap(
        &mut self,
        heap: MemoryPoolSummary,
        percent: (u8, u8),
    ) -> Result<(), ForwardReferenceError> {
        self.heap.set("heap", (heap, percent))
    }

    /// Record the load averages
    pub fn set_load_average(&mut self, load: [f64; 3]) -> Result<(), ForwardReferenceError> {
        self.load_average.set("load average", load)
    }

    /// Record the minimum mutator utilization
    pub fn set_mmu(&mut self, mmu: Vec<ZgcMmuSample>) -> Result<(), ForwardReferenceError> {
        self.mmu.set("mmu", mmu)
    }

    /// Record the metaspace report
    pub fn set_metaspace(&mut self, metaspace: ZgcMetaspace) -> Result<(), ForwardReferenceError> {
        self.metaspace.set("metaspace", metaspace)
    }

    /// Access reference processing statistics for update
    pub fn references_mut(&mut self) -> &mut ReferenceGcSummary {
        self.has_references = true;
        &mut self.references
    }

    /// Record the amount of relocated memory
    pub fn set_relocated(&mut self, relocated: Kilobytes) -> Result<(), ForwardReferenceError> {
        self.relocated.set("relocated", relocated)
    }

    /// Record a row of the heap statistics table
    pub fn set_memory_row(
        &mut self,
        row: ZgcMemoryRow,
        values: BTreeMap<ZgcMemoryColumn, Kilobytes>,
    ) -> Result<(), ForwardReferenceError> {
        match self.memory.entry(row) {
            Entry::Vacant(vacant) => {
                vacant.insert(values);
                Ok(())
            }
            Entry::Occupied(_) => Err(ForwardReferenceError::FieldAlreadySet("memory table row")),
        }
    }

    /// Turn into an immutable ZGC cycle event, given the time of the end of
    /// the cycle
    pub fn materialize(self, end: DateTimeStamp) -> Result<ZgcCycle, ForwardReferenceError> {
        const EVENT: &str = "ZGC Cycle";
        let (heap, heap_percent) = self.heap.require(EVENT, "heap")?;
        Ok(ZgcCycle {
            gc_id: self.gc_id,
            start: self.start,
            duration: end.seconds_since(&self.start).unwrap_or(0.0).max(0.0),
            cause: self.cause,
            phases: self.phases,
            heap,
            heap_percent,
            load_average: self.load_average.into_inner(),
            mmu: self.mmu.into_inner().unwrap_or_default(),
            metaspace: self.metaspace.into_inner(),
            references: self.has_references.then_some(self.references),
            relocated: self.relocated.into_inner(),
            memory: self.memory,
        })
    }
}
//
impl Describe for ZgcCycleForwardReference {
    fn describe(&self) -> String {
        match self.gc_id {
            Some(id) => format!("ZGC cycle GC({id}) started at {}", self.start),
            None => format!("ZGC cycle started at {}", self.start),
        }
    }
}

/// Any event in progress
#[derive(Clone, Debug, PartialEq)]
pub enum ForwardReference {
    /// Stop-the-world pause
    Pause(PauseForwardReference),

    /// Concurrent phase
    Concurrent(ConcurrentForwardReference),

    /// ZGC cycle
    Zgc(ZgcCycleForwardReference),
}
//
impl ForwardReference {
    /// When the event started
    pub fn start(&self) -> DateTimeStamp {
        match self {
            Self::Pause(pause) => pause.start,
            Self::Concurrent(phase) => phase.start,
            Self::Zgc(cycle) => cycle.start,
        }
    }

    /// GC identifier
    pub fn gc_id(&self) -> Option<u32> {
        match self {
            Self::Pause(pause) => pause.gc_id,
            Self::Concurrent(phase) => phase.gc_id,
            Self::Zgc(cycle) => cycle.gc_id,
        }
    }

    /// Record the CPU breakdown that unified logs print after an event
    pub fn set_cpu(&mut self, cpu: CpuSummary) -> Result<(), ForwardReferenceError> {
        match self {
            Self::Pause(pause) => pause.set_cpu(cpu),
            Self::Concurrent(phase) => phase.set_cpu(cpu),
            Self::Zgc(_) => Err(ForwardReferenceError::UnexpectedField {
                event: "ZGC Cycle",
                field: "cpu",
            }),
        }
    }

    /// Turn into an immutable event, given the current time
    pub fn materialize(self, now: DateTimeStamp) -> Result<JvmEvent, ForwardReferenceError> {
        Ok(match self {
            Self::Pause(pause) => JvmEvent::Pause(pause.materialize()?),
            Self::Concurrent(phase) => JvmEvent::Concurrent(phase.materialize()?),
            Self::Zgc(cycle) => JvmEvent::Zgc(cycle.materialize(now)?),
        })
    }
}
//
impl Describe for ForwardReference {
    fn describe(&self) -> String {
        match self {
            Self::Pause(pause) => pause.describe(),
            Self::Concurrent(phase) => phase.describe(),
            Self::Zgc(cycle) => cycle.describe(),
        }
    }
}
//
impl From<PauseForwardReference> for ForwardReference {
    fn from(pause: PauseForwardReference) -> Self {
        Self::Pause(pause)
    }
}
//
impl From<ConcurrentForwardReference> for ForwardReference {
    fn from(phase: ConcurrentForwardReference) -> Self {
        Self::Concurrent(phase)
    }
}
//
impl From<ZgcCycleForwardReference> for ForwardReference {
    fn from(cycle: ZgcCycleForwardReference) -> Self {
        Self::Zgc(cycle)
    }
}

/// What can go wrong while accumulating an event
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForwardReferenceError {
    /// A field was reported twice for the same event
    #[error("{0} was already set for this event")]
    FieldAlreadySet(&'static str),

    /// A sub-phase was reported twice for the same event
    #[error("phase {0:?} was already recorded for this event")]
    PhaseAlreadySet(Box<str>),

    /// This kind of event does not have this field
    #[error("{event} events have no {field}")]
    UnexpectedField {
        /// Kind of event
        event: &'static str,

        /// Unexpected field
        field: &'static str,
    },

    /// An event cannot be materialized without this field
    #[error("{event} event is missing its {field}")]
    MissingField {
        /// Kind of event
        event: &'static str,

        /// Missing field
        field: &'static str,
    },
}

/// Single-flight slot for an event in progress
///
/// An event can be abandoned when one of its lines is malformed. The slot
/// then remembers it until the event would have ended, so that its remaining
/// lines are recognized as such instead of being reported again.
#[derive(Clone, Debug, PartialEq)]
pub struct Slot<T> {
    /// Name used in diagnostics
    name: &'static str,

    /// Event in progress, if any
    value: Option<T>,

    /// The event in progress was abandoned
    abandoned: bool,
}
//
impl<T> Slot<T> {
    /// Empty slot
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            value: None,
            abandoned: false,
        }
    }

    /// Name used in diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Truth that an event is in progress
    pub fn is_open(&self) -> bool {
        self.value.is_some()
    }

    /// Truth that the event in progress was abandoned
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// Start a new event, returning the one that was in progress, if any
    #[must_use]
    pub fn open(&mut self, value: T) -> Option<T> {
        self.abandoned = false;
        self.value.replace(value)
    }

    /// Event in progress
    pub fn get_mut(&mut self) -> Result<&mut T, HandlerError> {
        let error = self.missing();
        self.value.as_mut().ok_or(error)
    }

    /// Event in progress, if any
    pub fn peek_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    /// Finish the event in progress
    pub fn take(&mut self) -> Result<T, HandlerError> {
        let error = self.missing();
        self.abandoned = false;
        self.value.take().ok_or(error)
    }

    /// Finish the event in progress, if any
    pub fn try_take(&mut self) -> Option<T> {
        self.abandoned = false;
        self.value.take()
    }

    /// Give up the event in progress, returning what was known about it
    pub fn abandon(&mut self) -> Option<T> {
        self.abandoned = true;
        self.value.take()
    }

    /// Error for a line that needs an event which is not in progress
    fn missing(&self) -> HandlerError {
        if self.abandoned {
            HandlerError::Abandoned {
                slot: self.name,
                gc_id: None,
            }
        } else {
            HandlerError::NoEventInFlight {
                slot: self.name,
                gc_id: None,
            }
        }
    }
}

/// Slots for events in progress, keyed by GC id
///
/// Like [`Slot`], this remembers the GC ids of abandoned events until their
/// final line.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyedSlots<T> {
    /// Name used in diagnostics
    name: &'static str,

    /// Events in progress
    values: BTreeMap<u32, T>,

    /// GC ids of the abandoned events
    abandoned: BTreeSet<u32>,
}
//
impl<T> KeyedSlots<T> {
    /// No event in progress
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            values: BTreeMap::new(),
            abandoned: BTreeSet::new(),
        }
    }

    /// Name used in diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Truth that an event with this id is in progress
    pub fn contains(&self, gc_id: u32) -> bool {
        self.values.contains_key(&gc_id)
    }

    /// Truth that the event with this id was abandoned
    pub fn is_abandoned(&self, gc_id: u32) -> bool {
        self.abandoned.contains(&gc_id)
    }

    /// Start a new event, returning the one with the same id that was in
    /// progress, if any
    #[must_use]
    pub fn open(&mut self, gc_id: u32, value: T) -> Option<T> {
        self.abandoned.remove(&gc_id);
        self.values.insert(gc_id, value)
    }

    /// Event in progress with this id
    pub fn get_mut(&mut self, gc_id: u32) -> Result<&mut T, HandlerError> {
        let error = self.missing(gc_id);
        self.values.get_mut(&gc_id).ok_or(error)
    }

    /// Event in progress with this id, if any
    pub fn peek_mut(&mut self, gc_id: u32) -> Option<&mut T> {
        self.values.get_mut(&gc_id)
    }

    /// Finish the event in progress with this id
    pub fn take(&mut self, gc_id: u32) -> Result<T, HandlerError> {
        let error = self.missing(gc_id);
        self.abandoned.remove(&gc_id);
        self.values.remove(&gc_id).ok_or(error)
    }

    /// Finish the event in progress with this id, if any
    pub fn try_take(&mut self, gc_id: u32) -> Option<T> {
        self.abandoned.remove(&gc_id);
        self.values.remove(&gc_id)
    }

    /// Finish the event with this id on a line that may also describe it
    /// entirely, in which case no event was in progress
    ///
    /// Fails if the event was abandoned, since the line cannot stand for all
    /// of it then.
    pub fn resume(&mut self, gc_id: u32) -> Result<Option<T>, HandlerError> {
        if self.abandoned.remove(&gc_id) {
            return Err(HandlerError::Abandoned {
                slot: self.name,
                gc_id: Some(gc_id),
            });
        }
        Ok(self.values.remove(&gc_id))
    }

    /// Give up the event in progress with this id, returning what was known
    /// about it
    pub fn abandon(&mut self, gc_id: u32) -> Option<T> {
        self.abandoned.insert(gc_id);
        self.values.remove(&gc_id)
    }

    /// Finish every event in progress, by increasing GC id
    pub fn drain(&mut self) -> impl Iterator<Item = T> {
        self.abandoned.clear();
        std::mem::take(&mut self.values).into_values()
    }

    /// Error for a line that needs an event which is not in progress
    fn missing(&self, gc_id: u32) -> HandlerError {
        if self.abandoned.contains(&gc_id) {
            HandlerError::Abandoned {
                slot: self.name,
                gc_id: Some(gc_id),
            }
        } else {
            HandlerError::NoEventInFlight {
                slot: self.name,
                gc_id: Some(gc_id),
            }
        }
    }
}
