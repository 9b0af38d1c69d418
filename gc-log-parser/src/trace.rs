//! Typed access to the outcome of a successful rule match

use gc_events::{
    memory::kilobytes, parse_decimal, parse_integer, CpuSummary, DateTimeStamp, GcCause,
    Kilobytes, MemoryPoolSummary, Seconds, TokenError,
};
use regex::Captures;
use thiserror::Error;

/// Line that matched a rule, with its capture groups
///
/// Group indices are specific to the rule that produced the trace. Some
/// grammars have optional parts, so handlers that interpret group positions
/// differently depending on the shape of the line must check which groups
/// participated in the match first. Accessors never guess: asking for a
/// group that did not participate is an error.
#[derive(Debug)]
pub struct Trace<'l> {
    /// Name of the rule that matched
    rule: &'static str,

    /// Line that was matched
    line: &'l str,

    /// Capture groups
    captures: Captures<'l>,
}
//
impl<'l> Trace<'l> {
    /// Wrap the captures of a successful match
    pub(crate) fn new(rule: &'static str, line: &'l str, captures: Captures<'l>) -> Self {
        Self {
            rule,
            line,
            captures,
        }
    }

    /// Name of the rule that matched
    pub fn rule(&self) -> &'static str {
        self.rule
    }

    /// Line that was matched
    pub fn line(&self) -> &'l str {
        self.line
    }

    /// Number of capture groups in the rule's grammar
    pub fn group_count(&self) -> usize {
        self.captures.len() - 1
    }

    /// Truth that a capture group participated in the match
    pub fn has_group(&self, group: usize) -> bool {
        self.captures.get(group).is_some()
    }

    /// Text of a capture group
    pub fn group(&self, group: usize) -> Result<&'l str, TraceError> {
        if group > self.group_count() {
            return Err(TraceError::NoSuchGroup {
                rule: self.rule,
                group,
                group_count: self.group_count(),
            });
        }
        self.captures
            .get(group)
            .map(|m| m.as_str())
            .ok_or(TraceError::MissingGroup {
                rule: self.rule,
                group,
            })
    }

    /// Text of a capture group that may legitimately not participate
    pub fn optional_group(&self, group: usize) -> Result<Option<&'l str>, TraceError> {
        match self.group(group) {
            Ok(text) => Ok(Some(text)),
            Err(TraceError::MissingGroup { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Decode a token from a capture group
    fn decode<T>(
        &self,
        group: usize,
        decoder: impl FnOnce(&str) -> Result<T, TokenError>,
    ) -> Result<T, TraceError> {
        decoder(self.group(group)?).map_err(|source| TraceError::BadToken {
            rule: self.rule,
            group,
            source,
        })
    }

    /// Integer from a capture group
    pub fn integer(&self, group: usize) -> Result<u64, TraceError> {
        self.decode(group, parse_integer)
    }

    /// Small integer from a capture group, such as a GC id or thread count
    pub fn small_integer(&self, group: usize) -> Result<u32, TraceError> {
        self.decode(group, |token| {
            parse_integer(token)?
                .try_into()
                .map_err(|_| TokenError::BadNumber(token.into()))
        })
    }

    /// Decimal number from a capture group
    pub fn decimal(&self, group: usize) -> Result<f64, TraceError> {
        self.decode(group, parse_decimal)
    }

    /// Duration printed in milliseconds, converted to seconds
    pub fn milliseconds(&self, group: usize) -> Result<Seconds, TraceError> {
        Ok(self.decimal(group)? / 1000.0)
    }

    /// Duration printed in seconds, from the last capture group
    ///
    /// This is where pre-unified grammars put the `t secs` of an event.
    pub fn duration(&self) -> Result<Seconds, TraceError> {
        self.decimal(self.group_count())
    }

    /// Pause time printed in milliseconds, from the last capture group,
    /// converted to seconds
    ///
    /// This is where unified grammars put the `t ms` of an event.
    pub fn pause_time(&self) -> Result<Seconds, TraceError> {
        self.milliseconds(self.group_count())
    }

    /// Memory quantity from a [`MEMORY_SIZE`](crate::grammar::MEMORY_SIZE)
    /// starting at some group
    pub fn memory(&self, offset: usize) -> Result<Kilobytes, TraceError> {
        let unit = self.group(offset + 1)?;
        self.decode(offset, |magnitude| kilobytes(magnitude, unit))
    }

    /// Memory transition in `before->after(size)` notation (6 groups)
    pub fn occupancy_before_after_size(
        &self,
        offset: usize,
    ) -> Result<MemoryPoolSummary, TraceError> {
        Ok(MemoryPoolSummary::with_final_size(
            self.memory(offset)?,
            self.memory(offset + 2)?,
            self.memory(offset + 4)?,
        ))
    }

    /// Memory transition in `before(size)->after(size)` notation (8 groups)
    pub fn memory_pool_before_after(&self, offset: usize) -> Result<MemoryPoolSummary, TraceError> {
        Ok(MemoryPoolSummary::new(
            self.memory(offset)?,
            self.memory(offset + 2)?,
            self.memory(offset + 4)?,
            self.memory(offset + 6)?,
        ))
    }

    /// Memory transition in `before->after` notation (4 groups)
    pub fn occupancy_before_after(&self, offset: usize) -> Result<MemoryPoolSummary, TraceError> {
        Ok(MemoryPoolSummary::without_size(
            self.memory(offset)?,
            self.memory(offset + 2)?,
        ))
    }

    /// GC cause from a [`GC_CAUSE`](crate::grammar::GC_CAUSE) group, if the
    /// line has one
    pub fn gc_cause(&self, group: usize) -> Result<Option<GcCause>, TraceError> {
        Ok(self.optional_group(group)?.map(GcCause::from_label))
    }

    /// Date and uptime from two consecutive groups, either of which may be
    /// absent, or `None` if the line has no stamp there
    pub fn date_time_stamp(&self, group: usize) -> Result<Option<DateTimeStamp>, TraceError> {
        let date = self.optional_group(group)?;
        let uptime = self.optional_group(group + 1)?;
        if date.is_none() && uptime.is_none() {
            return Ok(None);
        }
        let stamp = DateTimeStamp::parse(date, uptime).map_err(|source| TraceError::BadToken {
            rule: self.rule,
            group,
            source,
        })?;
        Ok(Some(stamp))
    }

    /// CPU breakdown from three consecutive groups
    pub fn cpu_summary(&self, offset: usize) -> Result<CpuSummary, TraceError> {
        Ok(CpuSummary {
            user: self.decimal(offset)?,
            kernel: self.decimal(offset + 1)?,
            wall_clock: self.decimal(offset + 2)?,
        })
    }

    /// CPU breakdown from three consecutive groups that may not participate
    pub fn optional_cpu_summary(&self, offset: usize) -> Result<Option<CpuSummary>, TraceError> {
        if self.has_group(offset) {
            self.cpu_summary(offset).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// What can go wrong while interpreting a trace
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraceError {
    /// Requested a group that the rule's grammar does not have
    #[error("rule {rule} has {group_count} groups, but group {group} was requested")]
    NoSuchGroup {
        /// Rule that matched
        rule: &'static str,

        /// Requested group
        group: usize,

        /// Number of groups in the grammar
        group_count: usize,
    },

    /// Requested a group that did not participate in this match
    #[error("group {group} of rule {rule} did not participate in the match")]
    MissingGroup {
        /// Rule that matched
        rule: &'static str,

        /// Requested group
        group: usize,
    },

    /// A group could not be decoded
    #[error("group {group} of rule {rule} could not be decoded ({source})")]
    BadToken {
        /// Rule that matched
        rule: &'static str,

        /// Requested group
        group: usize,

        /// Decoding error
        source: TokenError,
    },
}
