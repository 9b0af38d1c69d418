//! Record of everything that a parser could not confidently reconstruct

use gc_events::DateTimeStamp;
use std::fmt::{self, Display, Formatter};

/// Something that went wrong on one line of a log
///
/// None of these stops the parse. They are collected so that users know
/// which parts of the event stream are incomplete, and so that the rule
/// catalog can be improved.
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// No rule recognized a line, and it is not a known banner or header
    UnrecognizedLine {
        /// Line number, starting at 1
        line_number: usize,

        /// Offending line
        line: Box<str>,
    },

    /// A rule matched, but its handler could not make sense of the line
    ///
    /// The event that the line belongs to is abandoned, and its remaining
    /// lines are counted as ignored. Without a rule, either the decorations
    /// of the line could not be decoded, or an event could not be completed
    /// before the line or at the end of the log.
    MalformedTrace {
        /// Line number, starting at 1
        line_number: usize,

        /// Rule that matched, if any
        rule: Option<&'static str>,

        /// Offending line
        line: Box<str>,

        /// What went wrong
        reason: Box<str>,
    },

    /// Time went backwards
    CausalityViolation {
        /// Line number, starting at 1
        line_number: usize,

        /// Time before the offending line
        previous: DateTimeStamp,

        /// Time of the offending line
        next: DateTimeStamp,
    },

    /// An event started while another one was still in progress in the same
    /// slot. The older event was discarded.
    ProtocolViolation {
        /// Line number, starting at 1
        line_number: usize,

        /// Slot where the conflict occurred
        slot: &'static str,

        /// Description of the discarded event
        discarded: Box<str>,
    },

    /// A handler failed unexpectedly. The line was treated as unrecognized.
    HandlerFailure {
        /// Line number, starting at 1
        line_number: usize,

        /// Rule whose handler failed
        rule: &'static str,

        /// Offending line
        line: Box<str>,

        /// Failure message
        message: Box<str>,
    },
}
//
impl Diagnostic {
    /// Line where the problem was detected
    pub fn line_number(&self) -> usize {
        match self {
            Self::UnrecognizedLine { line_number, .. }
            | Self::MalformedTrace { line_number, .. }
            | Self::CausalityViolation { line_number, .. }
            | Self::ProtocolViolation { line_number, .. }
            | Self::HandlerFailure { line_number, .. } => *line_number,
        }
    }

    /// Log this diagnostic at the appropriate level
    fn log(&self) {
        match self {
            Self::UnrecognizedLine { .. }
            | Self::MalformedTrace { .. }
            | Self::HandlerFailure { .. } => log::error!("{self}"),
            Self::CausalityViolation { .. } | Self::ProtocolViolation { .. } => {
                log::warn!("{self}")
            }
        }
    }
}
//
impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::UnrecognizedLine { line_number, line } => {
                write!(f, "Missed line {line_number}: {line:?}")
            }
            Self::MalformedTrace {
                line_number,
                rule,
                line,
                reason,
            } => {
                write!(f, "Malformed line {line_number}")?;
                if let Some(rule) = rule {
                    write!(f, " (rule {rule})")?;
                }
                write!(f, ": {reason} in {line:?}")
            }
            Self::CausalityViolation {
                line_number,
                previous,
                next,
            } => write!(
                f,
                "Time went backwards at line {line_number}, from {previous} to {next}"
            ),
            Self::ProtocolViolation {
                line_number,
                slot,
                discarded,
            } => write!(
                f,
                "New {slot} event started at line {line_number} while another one was \
                in progress, discarding {discarded}"
            ),
            Self::HandlerFailure {
                line_number,
                rule,
                line,
                message,
            } => write!(
                f,
                "Handler of rule {rule} failed at line {line_number} ({message}) on {line:?}"
            ),
        }
    }
}

/// Diagnostics of one parser
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Diagnostics {
    /// Everything that went wrong, in order
    entries: Vec<Diagnostic>,

    /// Number of lines that were recognized as ignorable
    ignored_lines: usize,
}
//
impl Diagnostics {
    /// Record and log a diagnostic
    pub fn record(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.entries.push(diagnostic);
    }

    /// Account for a known-ignorable line
    pub fn ignore(&mut self, line_number: usize, line: &str) {
        log::debug!("Ignoring line {line_number}: {line:?}");
        self.ignored_lines += 1;
    }

    /// Everything that went wrong, in order
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Number of lines that were recognized as ignorable
    pub fn ignored_lines(&self) -> usize {
        self.ignored_lines
    }

    /// Number of lines that no rule recognized
    pub fn missed_lines(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| matches!(d, Diagnostic::UnrecognizedLine { .. }))
            .count()
    }

    /// Truth that nothing went wrong
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }
}
