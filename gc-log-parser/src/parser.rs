//! Line-by-line reconstruction of GC events, shared by every dialect
//!
//! A [`GcLogParser`] owns everything that is specific to one log: its clock,
//! its rule evaluation order, the events in progress and the diagnostics.
//! What differs from one log format to another is provided by a [`Dialect`]:
//! a rule table, the handlers associated with the rules, and the state that
//! these handlers share.

use crate::{
    clock::Clock,
    decorators::Decorators,
    diagnostics::{Diagnostic, Diagnostics},
    diary::{DialectConfig, DialectKind, Diary, DiaryError},
    dialect::{Generational, PreUnifiedG1, UnifiedG1, UnifiedGenerational, Zgc},
    dispatch::{Dispatch, Dispatcher, RuleTable},
    forward::{
        ConcurrentForwardReference, Describe, ForwardReference, ForwardReferenceError,
        KeyedSlots, PauseForwardReference, Slot,
    },
    grammar,
    rule::Rule,
    sink::{Emitter, EventSink, END_OF_DATA_SENTINEL},
    trace::{Trace, TraceError},
};
use gc_events::{DateTimeStamp, JvmEvent, TokenError};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};
use thiserror::Error;

/// Handler of a rule, for some dialect
pub type Handler<D> = fn(&mut D, &Trace<'_>, &mut ParseContext<'_>) -> Result<(), HandlerError>;

/// Pair a rule with its handler, for building rule tables
pub fn rule<D>(
    name: &'static str,
    pattern: impl AsRef<str>,
    handler: Handler<D>,
) -> (Rule, Handler<D>) {
    (Rule::new(name, pattern), handler)
}

/// What a handler may need besides the trace and its dialect's state
pub struct ParseContext<'p> {
    /// Number of the line being handled, starting at 1
    pub line_number: usize,

    /// Time of the line being handled
    pub now: DateTimeStamp,

    /// GC id decoration of the line, in unified logs
    pub gc_id: Option<u32>,

    /// Facts that the log announced so far
    pub config: &'p mut DialectConfig,

    /// Emission queue
    pub emitter: &'p mut Emitter,

    /// Problems encountered so far
    pub diagnostics: &'p mut Diagnostics,
}
//
impl ParseContext<'_> {
    /// GC id of the line, which the handler cannot do without
    pub fn require_gc_id(&self) -> Result<u32, HandlerError> {
        self.gc_id.ok_or(HandlerError::MissingGcId)
    }

    /// Start a new event in a single-flight slot, reporting any event that
    /// was still in progress there
    pub fn open<T: Describe>(&mut self, slot: &mut Slot<T>, value: T) {
        if let Some(discarded) = slot.open(value) {
            self.protocol_violation(slot.name(), &discarded);
        }
    }

    /// Start a new event in a slot keyed by GC id, reporting any event that
    /// was still in progress there
    pub fn open_keyed<T: Describe>(&mut self, slots: &mut KeyedSlots<T>, gc_id: u32, value: T) {
        if let Some(discarded) = slots.open(gc_id, value) {
            self.protocol_violation(slots.name(), &discarded);
        }
    }

    /// Give up the event in progress in a single-flight slot after a
    /// malformed line, and expect its remaining lines
    pub fn abandon<T: Describe>(&mut self, slot: &mut Slot<T>) {
        if let Some(event) = slot.abandon() {
            self.discard(&event);
        }
    }

    /// Give up the event in progress in a slot keyed by GC id after a
    /// malformed line, and expect its remaining lines
    pub fn abandon_keyed<T: Describe>(&mut self, slots: &mut KeyedSlots<T>, gc_id: u32) {
        if let Some(event) = slots.abandon(gc_id) {
            self.discard(&event);
        }
    }

    /// Log an event that is dropped because of a malformed line
    pub fn discard(&self, event: &impl Describe) {
        log::debug!(
            "Abandoning {} after malformed line {}",
            event.describe(),
            self.line_number
        );
    }

    /// Report an event that was abandoned because another one took its place
    pub fn protocol_violation(&mut self, slot: &'static str, discarded: &impl Describe) {
        self.diagnostics.record(Diagnostic::ProtocolViolation {
            line_number: self.line_number,
            slot,
            discarded: discarded.describe().into(),
        });
    }

    /// Queue a finished event
    pub fn emit(&mut self, event: JvmEvent) {
        self.emitter.record(event);
    }

    /// Materialize a pause and queue it
    pub fn emit_pause(&mut self, pause: PauseForwardReference) -> Result<(), HandlerError> {
        self.emit(JvmEvent::Pause(pause.materialize()?));
        Ok(())
    }

    /// Materialize a concurrent phase and queue it
    pub fn emit_concurrent(&mut self, phase: ConcurrentForwardReference) -> Result<(), HandlerError> {
        self.emit(JvmEvent::Concurrent(phase.materialize()?));
        Ok(())
    }

    /// Materialize any event in progress and queue it
    pub fn emit_forward(&mut self, forward: ForwardReference) -> Result<(), HandlerError> {
        self.emit(forward.materialize(self.now)?);
        Ok(())
    }

    /// Emit the termination event, if that was not done yet
    pub fn terminate(&mut self) {
        if !self.emitter.terminate(self.now) {
            log::debug!("JVM termination at line {} was already reported", self.line_number);
        }
    }
}

/// What can go wrong while handling a line
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HandlerError {
    /// The trace could not be interpreted
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// A value of the line could not be decoded
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The event in progress could not be updated or completed
    #[error(transparent)]
    ForwardReference(#[from] ForwardReferenceError),

    /// The line continues an event that was never started
    #[error("no {slot} event is in progress{}", for_gc_id(.gc_id))]
    NoEventInFlight {
        /// Slot where the event was expected
        slot: &'static str,

        /// GC id of the expected event, in unified logs
        gc_id: Option<u32>,
    },

    /// The line continues an event that was abandoned because of an earlier
    /// malformed line
    #[error("{slot} event{} was abandoned", for_gc_id(.gc_id))]
    Abandoned {
        /// Slot where the event was
        slot: &'static str,

        /// GC id of the event, in unified logs
        gc_id: Option<u32>,
    },

    /// A unified line lacks the GC id decoration that it needs
    #[error("line has no GC id decoration")]
    MissingGcId,

    /// Region counts cannot be converted because the region size is unknown
    #[error("heap region size is unknown")]
    MissingRegionSize,

    /// The line names a phase that this dialect does not know about
    #[error("unknown phase {0:?}")]
    UnknownPhase(Box<str>),

    /// A row of the ZGC heap statistics table has an unknown name
    #[error("unknown heap statistics row {0:?}")]
    UnknownRow(Box<str>),

    /// A row of the ZGC heap statistics table does not have one cell per
    /// column
    #[error("heap statistics row {row:?} has {found} cells instead of {expected}")]
    CellCount {
        /// Name of the row
        row: Box<str>,

        /// Number of cells that were expected
        expected: usize,

        /// Number of cells that were found
        found: usize,
    },
}

fn for_gc_id(gc_id: &Option<u32>) -> String {
    gc_id.map(|id| format!(" for GC({id})")).unwrap_or_default()
}

/// Log format specific parts of a parser
pub trait Dialect: Default + 'static {
    /// Name used in diagnostics and logs
    const NAME: &'static str;

    /// Truth that lines carry unified logging decorations
    const UNIFIED: bool;

    /// Rules of this dialect, by decreasing priority
    fn rules() -> &'static RuleTable<Handler<Self>>;

    /// Truth that an unrecognized line is known to carry no useful
    /// information (banners, headers, heap printouts...)
    fn is_ignorable(body: &str) -> bool;

    /// Hook called on every line before its handler, with the name of the
    /// rule that matched it, if any
    fn before_line(
        &mut self,
        _rule: Option<&'static str>,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Give up the event that a malformed line belongs to, so that it is not
    /// emitted without what the line should have told about it
    ///
    /// Called with the rule that matched the line after its handler failed.
    /// Lines of the event that come later are then counted as ignored.
    fn abandon(&mut self, rule: &'static str, trace: &Trace<'_>, ctx: &mut ParseContext<'_>);

    /// Give up every event in progress, at the end of the log
    fn drain_in_flight(&mut self) -> Vec<ForwardReference>;
}

/// Parser of one GC log
pub struct GcLogParser<D: Dialect, S: EventSink> {
    /// Format specific state
    dialect: D,

    /// Rule evaluation order
    dispatcher: Dispatcher,

    /// Logical time
    clock: Clock,

    /// Facts that the log announced so far
    config: DialectConfig,

    /// Emission queue
    emitter: Emitter,

    /// Problems encountered so far
    diagnostics: Diagnostics,

    /// Where finished events go
    sink: S,

    /// Number of lines received so far
    line_number: usize,

    /// The end of the log was reached
    finished: bool,
}
//
impl<D: Dialect, S: EventSink> GcLogParser<D, S> {
    /// Set up a parser for a log described by some diary
    pub fn new(diary: &Diary, sink: S) -> Self {
        log::debug!("Setting up a {} parser", D::NAME);
        Self {
            dialect: D::default(),
            dispatcher: Dispatcher::new(D::rules()),
            clock: Clock::new(),
            config: DialectConfig::new(diary),
            emitter: Emitter::new(),
            diagnostics: Diagnostics::default(),
            sink,
            line_number: 0,
            finished: false,
        }
    }

    /// Process the next line of the log
    pub fn receive(&mut self, line: &str) {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim() == END_OF_DATA_SENTINEL {
            self.end_of_data();
            return;
        }
        if self.finished {
            log::warn!("Ignoring line received after the end of data: {line:?}");
            return;
        }
        self.line_number += 1;
        if line.trim().is_empty() {
            return;
        }

        // Figure out when the line was written and what it is about
        let (stamp, gc_id, body) = match Self::decorations(line) {
            Ok(decorations) => decorations,
            Err(e) => {
                self.diagnostics.record(Diagnostic::MalformedTrace {
                    line_number: self.line_number,
                    rule: None,
                    line: line.into(),
                    reason: e.to_string().into(),
                });
                return;
            }
        };
        if let Some(violation) = self.clock.advance(stamp) {
            self.diagnostics.record(Diagnostic::CausalityViolation {
                line_number: self.line_number,
                previous: violation.previous,
                next: violation.next,
            });
        }

        // Find the rule and run its handler
        let dispatch = self.dispatcher.dispatch(D::rules(), body);
        let mut ctx = ParseContext {
            line_number: self.line_number,
            now: self.clock.now(),
            gc_id,
            config: &mut self.config,
            emitter: &mut self.emitter,
            diagnostics: &mut self.diagnostics,
        };
        let rule = dispatch.as_ref().map(|dispatch| dispatch.rule.name());
        if let Err(e) = self.dialect.before_line(rule, &mut ctx) {
            ctx.diagnostics.record(Diagnostic::MalformedTrace {
                line_number: self.line_number,
                rule: None,
                line: line.into(),
                reason: e.to_string().into(),
            });
        }
        match dispatch {
            Some(Dispatch {
                rule,
                handler,
                trace,
            }) => {
                let dialect = &mut self.dialect;
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| handler(dialect, &trace, &mut ctx)));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e @ HandlerError::Abandoned { .. })) => {
                        log::debug!("Line {} belongs to an abandoned event: {e}", self.line_number);
                        ctx.diagnostics.ignore(self.line_number, line);
                    }
                    Ok(Err(e)) => {
                        ctx.diagnostics.record(Diagnostic::MalformedTrace {
                            line_number: self.line_number,
                            rule: Some(rule.name()),
                            line: line.into(),
                            reason: e.to_string().into(),
                        });
                        self.dialect.abandon(rule.name(), &trace, &mut ctx);
                    }
                    Err(payload) => ctx.diagnostics.record(Diagnostic::HandlerFailure {
                        line_number: self.line_number,
                        rule: rule.name(),
                        line: line.into(),
                        message: panic_message(payload.as_ref()).into(),
                    }),
                }
            }
            None if D::is_ignorable(body) => ctx.diagnostics.ignore(self.line_number, line),
            None => ctx.diagnostics.record(Diagnostic::UnrecognizedLine {
                line_number: self.line_number,
                line: line.into(),
            }),
        }
        self.flush();
    }

    /// Process the end of the log
    ///
    /// Events that are still in progress are emitted if they can be, pending
    /// concurrent cycles are released, and the termination event is emitted
    /// if no JVM exit was seen.
    pub fn end_of_data(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let now = self.clock.now();
        for forward in self.dialect.drain_in_flight() {
            let description = forward.describe();
            match forward.materialize(now) {
                Ok(event) => self.emitter.record(event),
                Err(e) => self.diagnostics.record(Diagnostic::MalformedTrace {
                    line_number: self.line_number,
                    rule: None,
                    line: description.into(),
                    reason: format!("incomplete at end of data, {e}").into(),
                }),
            }
        }
        self.emitter.close_all();
        self.emitter.terminate(now);
        self.flush();
    }

    /// Account for a line that is not text, as an unrecognized line
    ///
    /// `line` is what could be made of it, for display.
    pub fn reject(&mut self, line: &str) {
        if self.finished {
            log::warn!("Ignoring line received after the end of data: {line:?}");
            return;
        }
        self.line_number += 1;
        self.diagnostics.record(Diagnostic::UnrecognizedLine {
            line_number: self.line_number,
            line: line.into(),
        });
    }

    /// Truth that the end of the log was reached
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Current logical time
    pub fn now(&self) -> DateTimeStamp {
        self.clock.now()
    }

    /// Problems encountered so far
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Facts that the log announced so far
    pub fn config(&self) -> &DialectConfig {
        &self.config
    }

    /// Where finished events go
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Process the end of the log if needed, and hand over the outcome
    pub fn finish(mut self) -> (S, Diagnostics) {
        self.end_of_data();
        (self.sink, self.diagnostics)
    }

    /// Split a line into its time, GC id and message body
    fn decorations(line: &str) -> Result<(DateTimeStamp, Option<u32>, &str), TokenError> {
        if D::UNIFIED {
            let decorators = Decorators::decode(line)?;
            Ok((decorators.stamp, decorators.gc_id, decorators.body))
        } else {
            let Some(captures) = grammar::leading_stamp().captures(line) else {
                return Ok((DateTimeStamp::default(), None, line));
            };
            let date = captures.get(1).map(|m| m.as_str());
            let uptime = captures.get(2).map(|m| m.as_str());
            Ok((DateTimeStamp::parse(date, uptime)?, None, line))
        }
    }

    /// Hand the events that are ready over to the sink
    fn flush(&mut self) {
        for event in self.emitter.drain() {
            self.sink.record(event);
        }
    }
}

/// Extract the message of a handler panic
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Parser for whichever dialect a diary calls for
pub enum AnyGcLogParser<S: EventSink> {
    /// Serial, Parallel and CMS, before JDK 9
    Generational(GcLogParser<Generational, S>),

    /// G1, before JDK 9
    PreUnifiedG1(GcLogParser<PreUnifiedG1, S>),

    /// G1 with unified logging
    UnifiedG1(GcLogParser<UnifiedG1, S>),

    /// Serial, Parallel and CMS with unified logging
    UnifiedGenerational(GcLogParser<UnifiedGenerational, S>),

    /// ZGC
    Zgc(GcLogParser<Zgc, S>),
}
//
macro_rules! for_each_dialect {
    ($self:expr, $parser:ident => $body:expr) => {
        match $self {
            AnyGcLogParser::Generational($parser) => $body,
            AnyGcLogParser::PreUnifiedG1($parser) => $body,
            AnyGcLogParser::UnifiedG1($parser) => $body,
            AnyGcLogParser::UnifiedGenerational($parser) => $body,
            AnyGcLogParser::Zgc($parser) => $body,
        }
    };
}
//
impl<S: EventSink> AnyGcLogParser<S> {
    /// Set up the parser that a diary calls for
    pub fn new(diary: &Diary, sink: S) -> Result<Self, DiaryError> {
        Ok(match diary.dialect()? {
            DialectKind::Generational => Self::Generational(GcLogParser::new(diary, sink)),
            DialectKind::PreUnifiedG1 => Self::PreUnifiedG1(GcLogParser::new(diary, sink)),
            DialectKind::UnifiedG1 => Self::UnifiedG1(GcLogParser::new(diary, sink)),
            DialectKind::UnifiedGenerational => {
                Self::UnifiedGenerational(GcLogParser::new(diary, sink))
            }
            DialectKind::Zgc => Self::Zgc(GcLogParser::new(diary, sink)),
        })
    }

    /// Name of the dialect
    pub fn dialect_name(&self) -> &'static str {
        match self {
            Self::Generational(_) => Generational::NAME,
            Self::PreUnifiedG1(_) => PreUnifiedG1::NAME,
            Self::UnifiedG1(_) => UnifiedG1::NAME,
            Self::UnifiedGenerational(_) => UnifiedGenerational::NAME,
            Self::Zgc(_) => Zgc::NAME,
        }
    }

    /// Process the next line of the log
    pub fn receive(&mut self, line: &str) {
        for_each_dialect!(self, parser => parser.receive(line))
    }

    /// Account for a line that is not text
    pub fn reject(&mut self, line: &str) {
        for_each_dialect!(self, parser => parser.reject(line))
    }

    /// Process the end of the log
    pub fn end_of_data(&mut self) {
        for_each_dialect!(self, parser => parser.end_of_data())
    }

    /// Problems encountered so far
    pub fn diagnostics(&self) -> &Diagnostics {
        for_each_dialect!(self, parser => parser.diagnostics())
    }

    /// Process the end of the log if needed, and hand over the outcome
    pub fn finish(self) -> (S, Diagnostics) {
        for_each_dialect!(self, parser => parser.finish())
    }
}
