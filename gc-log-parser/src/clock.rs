//! Logical time of a parser

use gc_events::DateTimeStamp;

/// Logical time of a parser, i.e. the newest stamp seen so far
///
/// Lines that carry no stamp inherit the current time. Time is not expected
/// to go backwards, but it does happen in logs that were written by several
/// threads or went through buffering. A backward step is reported, and then
/// followed anyway.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Clock {
    /// Current logical time
    current: DateTimeStamp,
}
//
impl Clock {
    /// Clock that does not know what time it is yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time
    pub fn now(&self) -> DateTimeStamp {
        self.current
    }

    /// Move to the stamp of a new line
    ///
    /// Components that the new stamp lacks are carried over from the current
    /// time, so that a log mixing dated and undated lines keeps a full stamp.
    /// If the new stamp is earlier than the current time, the clock still
    /// moves, but the backward step is returned to the caller.
    pub fn advance(&mut self, stamp: DateTimeStamp) -> Option<CausalityViolation> {
        let previous = self.current;
        let next = DateTimeStamp {
            date: stamp.date.or(previous.date),
            uptime: stamp.uptime.or(previous.uptime),
        };
        self.current = next;
        (next < previous).then_some(CausalityViolation { previous, next })
    }
}

/// Time went backwards
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CausalityViolation {
    /// Time before the offending line
    pub previous: DateTimeStamp,

    /// Time of the offending line
    pub next: DateTimeStamp,
}
