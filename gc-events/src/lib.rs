//! Structured representation of the events that a JVM garbage collector
//! reports in its logs, along with the decoding of the elementary tokens
//! (memory sizes, date stamps, GC causes) that these logs are made of.

#![deny(missing_docs)]

pub mod cause;
pub mod cpu;
pub mod event;
pub mod memory;
pub mod reference;
pub mod stamp;

use thiserror::Error;

// Reexport types which appear in the public interface
pub use self::{
    cause::GcCause,
    cpu::CpuSummary,
    event::{
        ConcurrentKind, ConcurrentPhase, GcPause, JvmEvent, JvmTermination, PauseFlag, PauseKind,
        ZgcCycle, ZgcMemoryColumn, ZgcMemoryRow, ZgcMetaspace, ZgcMmuSample,
    },
    memory::{MemoryPool, MemoryPoolSummary},
    reference::{ReferenceGcSummary, ReferenceStat},
    stamp::DateTimeStamp,
};

/// Durations are expressed in seconds throughout this crate
pub type Seconds = f64;

/// Memory quantities are expressed in kilobytes throughout this crate
pub type Kilobytes = u64;

/// What can go wrong while decoding an elementary log token
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    /// A number could not be decoded
    #[error("{0:?} is not a valid number")]
    BadNumber(Box<str>),

    /// A memory size came with an unsupported unit suffix
    #[error("{0:?} is not a known memory unit")]
    UnknownUnit(Box<str>),

    /// A date stamp did not follow the JVM's ISO-8601 flavor
    #[error("{0:?} is not a valid JVM date stamp")]
    BadDate(Box<str>),
}

/// Decode a decimal number, accepting both `.` and `,` as decimal separator
///
/// Some locales make the JVM print `0,0123` instead of `0.0123`.
pub fn parse_decimal(token: &str) -> Result<f64, TokenError> {
    let normalized;
    let token = if token.contains(',') {
        normalized = token.replace(',', ".");
        &normalized
    } else {
        token
    };
    token
        .trim()
        .parse()
        .map_err(|_| TokenError::BadNumber(token.into()))
}

/// Decode an unsigned integer
pub fn parse_integer(token: &str) -> Result<u64, TokenError> {
    token
        .trim()
        .parse()
        .map_err(|_| TokenError::BadNumber(token.into()))
}
