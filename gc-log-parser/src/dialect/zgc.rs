//! Z Garbage Collector
//!
//! ZGC reports a whole collection cycle under one GC id: the durations of
//! its pause and concurrent phases, then a batch of statistics, and finally
//! a `Garbage Collection (cause) before(p%)->after(q%)` summary line.

use super::{abandon_keyed_end, abandon_keyed_start, is_unified_ignorable, memory_token};
use crate::{
    dispatch::RuleTable,
    forward::{ForwardReference, KeyedSlots, ZgcCycleForwardReference},
    grammar::{DECIMAL, GC_CAUSE, MEMORY_SIZE, UNIFIED_PAUSE_TIME},
    parser::{rule, Dialect, Handler, HandlerError, ParseContext},
    trace::Trace,
};
use gc_events::{
    parse_decimal, parse_integer, GcCause, JvmEvent, MemoryPoolSummary, ReferenceStat,
    TokenError, ZgcMemoryColumn, ZgcMemoryRow, ZgcMetaspace, ZgcMmuSample,
};
use regex::Regex;
use std::{collections::BTreeMap, sync::OnceLock};

/// Parser state of the ZGC dialect
#[derive(Debug)]
pub struct Zgc {
    /// Collection cycles whose summary line was not seen yet
    cycles: KeyedSlots<ZgcCycleForwardReference>,
}
//
impl Default for Zgc {
    fn default() -> Self {
        Self {
            cycles: KeyedSlots::new("ZGC cycle"),
        }
    }
}
//
impl Dialect for Zgc {
    const NAME: &'static str = "ZGC";
    const UNIFIED: bool = true;

    fn rules() -> &'static RuleTable<Handler<Self>> {
        static RULES: OnceLock<RuleTable<Handler<Zgc>>> = OnceLock::new();
        RULES.get_or_init(|| {
            let percent_size = format!(r"{MEMORY_SIZE}\((\d+)%\)");
            RuleTable::new([
                rule(
                    "CYCLE_START",
                    format!(r"^Garbage Collection {GC_CAUSE}\s*$"),
                    Self::cycle_start,
                ),
                rule(
                    "CYCLE_END",
                    format!(r"^Garbage Collection {GC_CAUSE} {percent_size}->{percent_size}\s*$"),
                    Self::cycle_end,
                ),
                rule(
                    "PHASE",
                    format!(r"^((?:Pause|Concurrent|Subphase) [A-Za-z -]+?) {UNIFIED_PAUSE_TIME}\s*$"),
                    Self::phase,
                ),
                rule(
                    "LOAD",
                    format!(r"^Load: {DECIMAL}/{DECIMAL}/{DECIMAL}\s*$"),
                    Self::load,
                ),
                rule("MMU", r"^MMU: (.*\d+ms/.*)$", Self::mmu),
                rule(
                    "RELOCATION",
                    format!(r"^Relocation: (?:Successful|Incomplete)(?:, {MEMORY_SIZE} relocated)?\s*$"),
                    Self::relocation,
                ),
                rule(
                    "METASPACE",
                    format!(
                        r"^Metaspace: {MEMORY_SIZE} used, (?:{MEMORY_SIZE} capacity, )?{MEMORY_SIZE} committed, {MEMORY_SIZE} reserved\s*$"
                    ),
                    Self::metaspace,
                ),
                rule(
                    "REFERENCES",
                    r"^(Soft|Weak|Final|Phantom): (\d+) encountered, (\d+) discovered, (\d+) enqueued\s*$",
                    Self::references,
                ),
                rule(
                    "TABLE_HEADER",
                    r"^\s*Mark Start\s+Mark End\s+Relocate Start\s+Relocate End\s+High\s+Low\s*$",
                    Self::statistics,
                ),
                rule(
                    "TABLE_ROW",
                    r"^\s*(Capacity|Reserve|Free|Used|Live|Allocated|Garbage|Reclaimed):\s+(.+?)\s*$",
                    Self::table_row,
                ),
                rule(
                    "HEAP_CAPACITY",
                    format!(r"^(Initial|Max) Capacity: {MEMORY_SIZE}\s*$"),
                    Self::heap_capacity,
                ),
                rule(
                    "STATISTICS",
                    format!(
                        r"^(?:Using \d+ workers|Mark: |Mark Stack Usage: |NMethods: |(?:Small|Medium|Large) Pages: |Forwarding Usage: |(?:Min|Max|Soft Max) Capacity: {MEMORY_SIZE}\(\d+%\))"
                    ),
                    Self::statistics,
                ),
                rule("HEAP_EXIT", r"^Heap\s*$", Self::exit),
            ])
        })
    }

    fn is_ignorable(body: &str) -> bool {
        is_unified_ignorable(body)
    }

    fn abandon(&mut self, rule: &'static str, _trace: &Trace<'_>, ctx: &mut ParseContext<'_>) {
        let Some(gc_id) = ctx.gc_id else {
            return;
        };
        match rule {
            "CYCLE_START" => abandon_keyed_start(&mut self.cycles, gc_id, ctx),
            "CYCLE_END" => abandon_keyed_end(&mut self.cycles, gc_id, ctx),
            "HEAP_CAPACITY" | "HEAP_EXIT" => {}
            _ => ctx.abandon_keyed(&mut self.cycles, gc_id),
        }
    }

    fn drain_in_flight(&mut self) -> Vec<ForwardReference> {
        self.cycles.drain().map(ForwardReference::from).collect()
    }
}
//
impl Zgc {
    fn cycle_start(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let cause = GcCause::from_label(trace.group(1)?);
        let cycle = ZgcCycleForwardReference::new(Some(gc_id), ctx.now, cause);
        ctx.open_keyed(&mut self.cycles, gc_id, cycle);
        Ok(())
    }

    /// Summary line, which completes the cycle
    ///
    /// Without -Xlog:gc* this is the only line of the cycle.
    fn cycle_end(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let gc_id = ctx.require_gc_id()?;
        let mut cycle = match self.cycles.resume(gc_id)? {
            Some(cycle) => cycle,
            None => {
                let cause = GcCause::from_label(trace.group(1)?);
                ZgcCycleForwardReference::new(Some(gc_id), ctx.now, cause)
            }
        };
        let heap = MemoryPoolSummary::without_size(trace.memory(2)?, trace.memory(5)?);
        cycle.set_heap(heap, (percent(trace, 4)?, percent(trace, 7)?))?;
        ctx.emit(JvmEvent::Zgc(cycle.materialize(ctx.now)?));
        Ok(())
    }

    fn phase(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let cycle = self.cycles.get_mut(ctx.require_gc_id()?)?;
        cycle.add_phase(trace.group(1)?, trace.pause_time()?)?;
        Ok(())
    }

    fn load(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let cycle = self.cycles.get_mut(ctx.require_gc_id()?)?;
        cycle.set_load_average([trace.decimal(1)?, trace.decimal(2)?, trace.decimal(3)?])?;
        Ok(())
    }

    /// `MMU: 2ms/98.5%, 5ms/99.4%, ...`
    fn mmu(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        static SAMPLE: OnceLock<Regex> = OnceLock::new();
        let sample = SAMPLE.get_or_init(|| {
            Regex::new(&format!(r"(\d+)ms/{DECIMAL}%")).expect("MMU grammar is valid")
        });
        let cycle = self.cycles.get_mut(ctx.require_gc_id()?)?;
        let samples = sample
            .captures_iter(trace.group(1)?)
            .map(|captures| {
                let window = &captures[1];
                Ok(ZgcMmuSample {
                    window_ms: parse_integer(window)?
                        .try_into()
                        .map_err(|_| TokenError::BadNumber(window.into()))?,
                    utilization_percent: parse_decimal(&captures[2])?,
                })
            })
            .collect::<Result<Vec<_>, TokenError>>()?;
        cycle.set_mmu(samples)?;
        Ok(())
    }

    fn relocation(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let cycle = self.cycles.get_mut(ctx.require_gc_id()?)?;
        if trace.has_group(1) {
            cycle.set_relocated(trace.memory(1)?)?;
        }
        Ok(())
    }

    /// Metaspace report, whose capacity JDK 17 stopped printing
    fn metaspace(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let cycle = self.cycles.get_mut(ctx.require_gc_id()?)?;
        let committed = trace.memory(5)?;
        let capacity = if trace.has_group(3) {
            trace.memory(3)?
        } else {
            committed
        };
        cycle.set_metaspace(ZgcMetaspace {
            used: trace.memory(1)?,
            capacity,
            committed,
            reserved: trace.memory(7)?,
        })?;
        Ok(())
    }

    fn references(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        let cycle = self.cycles.get_mut(ctx.require_gc_id()?)?;
        let stat = ReferenceStat {
            count: Some(trace.integer(2)?),
            discovered: Some(trace.integer(3)?),
            enqueued: Some(trace.integer(4)?),
            pause_time: None,
        };
        let references = cycle.references_mut();
        let target = match trace.group(1)? {
            "Soft" => &mut references.soft,
            "Weak" => &mut references.weak,
            "Final" => &mut references.final_,
            _ => &mut references.phantom,
        };
        *target = Some(stat);
        Ok(())
    }

    /// Row of the heap statistics table, with one cell per column where `-`
    /// stands for a value that is not reported
    fn table_row(&mut self, trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        static CELL: OnceLock<Regex> = OnceLock::new();
        let cell = CELL.get_or_init(|| {
            Regex::new(r"(-|\d+(?:[.,]\d+)?\s?[BKMG])(?:\s*\(\d+%\))?").expect("cell grammar is valid")
        });
        let cycle = self.cycles.get_mut(ctx.require_gc_id()?)?;
        let name = trace.group(1)?;
        let row = name
            .parse::<ZgcMemoryRow>()
            .map_err(|_| HandlerError::UnknownRow(name.into()))?;
        let cells = cell
            .captures_iter(trace.group(2)?)
            .map(|captures| captures.get(1).map_or("-", |m| m.as_str()))
            .collect::<Vec<_>>();
        if cells.len() != ZgcMemoryColumn::ALL.len() {
            return Err(HandlerError::CellCount {
                row: name.into(),
                expected: ZgcMemoryColumn::ALL.len(),
                found: cells.len(),
            });
        }
        let mut values = BTreeMap::new();
        for (column, cell) in ZgcMemoryColumn::ALL.into_iter().zip(cells) {
            if cell != "-" {
                values.insert(column, memory_token(cell)?);
            }
        }
        cycle.set_memory_row(row, values)?;
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

    /// Cycle statistics that are not recorded
    fn statistics(&mut self, _trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        self.cycles.get_mut(ctx.require_gc_id()?)?;
        Ok(())
    }

    fn exit(&mut self, _trace: &Trace, ctx: &mut ParseContext) -> Result<(), HandlerError> {
        ctx.terminate();
        Ok(())
    }
}

/// Heap occupancy percentage from a capture group
fn percent(trace: &Trace, group: usize) -> Result<u8, HandlerError> {
    let value = trace.small_integer(group)?;
    Ok(u8::try_from(value).map_err(|_| TokenError::BadNumber(value.to_string().into()))?)
}
