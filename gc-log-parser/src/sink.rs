//! Delivery of finished events, in order

use gc_events::{DateTimeStamp, JvmEvent, JvmTermination};
use std::collections::{BTreeSet, VecDeque};

/// Line that signals the end of a log
pub const END_OF_DATA_SENTINEL: &str = "END_OF_DATA_SENTINEL";

/// Receiver of finished events
pub trait EventSink {
    /// Accept the next event
    fn record(&mut self, event: JvmEvent);
}
//
impl EventSink for Vec<JvmEvent> {
    fn record(&mut self, event: JvmEvent) {
        self.push(event);
    }
}
//
impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn record(&mut self, event: JvmEvent) {
        (**self).record(event)
    }
}
//
impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn record(&mut self, event: JvmEvent) {
        (**self).record(event)
    }
}

/// EventSink that hands events to a closure
pub struct FnSink<F: FnMut(JvmEvent)>(pub F);
//
impl<F: FnMut(JvmEvent)> EventSink for FnSink<F> {
    fn record(&mut self, event: JvmEvent) {
        (self.0)(event)
    }
}

/// Emission queue between handlers and the EventSink
///
/// Events are released in start order. Unified logs print the lines of a
/// concurrent cycle interleaved with those of unrelated pauses, which
/// therefore complete before the cycle does even though they started after
/// it. While a cycle is open, events that belong to another GC id are held,
/// and released in completion order right after the cycle itself.
#[derive(Clone, Debug, Default)]
pub struct Emitter {
    /// Events that can be delivered
    ready: VecDeque<JvmEvent>,

    /// GC ids of the concurrent cycles in progress
    open_cycles: BTreeSet<u32>,

    /// Events waiting for the open cycles to complete
    held: Vec<JvmEvent>,

    /// A termination event was emitted
    terminated: bool,
}
//
impl Emitter {
    /// Set up an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a finished event
    pub fn record(&mut self, event: JvmEvent) {
        let unrelated = match event.gc_id() {
            Some(id) => !self.open_cycles.contains(&id),
            None => true,
        };
        if unrelated && !self.open_cycles.is_empty() {
            log::trace!(
                "Holding {} until concurrent cycles {:?} complete",
                event.kind_name(),
                self.open_cycles
            );
            self.held.push(event);
        } else {
            self.ready.push_back(event);
        }
    }

    /// Start holding events that do not belong to some concurrent cycle
    pub fn open_cycle(&mut self, gc_id: u32) {
        self.open_cycles.insert(gc_id);
    }

    /// Truth that a concurrent cycle is in progress
    pub fn is_cycle_open(&self, gc_id: u32) -> bool {
        self.open_cycles.contains(&gc_id)
    }

    /// Mark a concurrent cycle as complete, releasing held events once no
    /// cycle remains open
    ///
    /// The cycle's own summary event, if any, must be recorded before this is
    /// called so that it precedes the events that were held.
    pub fn close_cycle(&mut self, gc_id: u32) {
        self.open_cycles.remove(&gc_id);
        if self.open_cycles.is_empty() {
            self.ready.extend(self.held.drain(..));
        }
    }

    /// Mark every concurrent cycle as complete
    pub fn close_all(&mut self) {
        self.open_cycles.clear();
        self.ready.extend(self.held.drain(..));
    }

    /// Emit the termination event, unless that was already done
    ///
    /// Held events are released first. Returns whether an event was emitted.
    pub fn terminate(&mut self, at: DateTimeStamp) -> bool {
        if self.terminated {
            return false;
        }
        self.close_all();
        self.ready.push_back(JvmEvent::Termination(JvmTermination { at }));
        self.terminated = true;
        true
    }

    /// Truth that the termination event was emitted
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Events that can be delivered, in order
    pub fn drain(&mut self) -> impl Iterator<Item = JvmEvent> + '_ {
        self.ready.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use gc_events::{ConcurrentKind, ConcurrentPhase};

    fn phase(gc_id: u32, start: f64) -> JvmEvent {
        JvmEvent::Concurrent(ConcurrentPhase {
            kind: ConcurrentKind::G1Mark,
            gc_id: Some(gc_id),
            start: DateTimeStamp::from_uptime(start),
            duration: 0.1,
            cpu_time: None,
            cpu: None,
        })
    }

    fn starts(events: impl Iterator<Item = JvmEvent>) -> Vec<(Option<u32>, Option<f64>)> {
        events.map(|e| (e.gc_id(), e.start().uptime)).collect()
    }

    #[test]
    fn holds_unrelated_events_while_a_cycle_is_open() {
        let mut emitter = Emitter::new();
        emitter.record(phase(0, 1.0));
        assert_eq!(starts(emitter.drain()), vec![(Some(0), Some(1.0))]);

        emitter.open_cycle(1);
        assert!(emitter.is_cycle_open(1));
        emitter.record(phase(1, 2.0));
        emitter.record(phase(2, 3.0));
        emitter.record(phase(3, 4.0));
        assert_eq!(starts(emitter.drain()), vec![(Some(1), Some(2.0))]);

        emitter.record(phase(1, 2.0));
        emitter.close_cycle(1);
        assert_eq!(
            starts(emitter.drain()),
            vec![(Some(1), Some(2.0)), (Some(2), Some(3.0)), (Some(3), Some(4.0))]
        );
    }

    #[test]
    fn terminates_once() {
        let mut emitter = Emitter::new();
        emitter.open_cycle(1);
        emitter.record(phase(2, 3.0));
        assert!(emitter.terminate(DateTimeStamp::from_uptime(5.0)));
        assert!(!emitter.terminate(DateTimeStamp::from_uptime(6.0)));
        assert!(emitter.is_terminated());
        let events = emitter.drain().collect::<Vec<_>>();
        assert_eq!(events.len(), 2);
        assert_matches!(&events[1], JvmEvent::Termination(t) if t.at.uptime == Some(5.0));
    }

    #[test]
    fn sinks() {
        let mut events: Vec<JvmEvent> = Vec::new();
        (&mut events).record(phase(0, 1.0));
        let mut count = 0;
        FnSink(|_: JvmEvent| count += 1).record(phase(0, 1.0));
        assert_eq!(events.len(), 1);
        assert_eq!(count, 1);
    }
}
