//! Reconstruction of structured garbage collection events from JVM GC logs
//!
//! Logs are fed to a [`GcLogParser`] one line at a time. Each line is matched
//! against the ordered rule table of the log's dialect, and the handler of
//! the first matching rule updates the events in progress. Finished events
//! are handed to an [`EventSink`] in start order, and everything that could
//! not be reconstructed confidently ends up in the [`Diagnostics`].

#![deny(missing_docs)]

pub mod clock;
pub mod decorators;
pub mod diagnostics;
pub mod dialect;
pub mod diary;
pub mod dispatch;
pub mod forward;
pub mod grammar;
pub mod parser;
pub mod rule;
pub mod sink;
pub mod trace;

// Reexport types which appear in the public interface
pub use self::{
    diagnostics::{Diagnostic, Diagnostics},
    diary::{CollectorFamily, DialectConfig, DialectKind, Diarizer, Diary, DiaryError},
    parser::{AnyGcLogParser, Dialect, GcLogParser, HandlerError},
    sink::{EventSink, FnSink, END_OF_DATA_SENTINEL},
};

/// Re-export gc-events version in use
pub use gc_events;
