//! Points in time as the JVM reports them

use crate::{parse_decimal, Seconds, TokenError};
use serde::Serialize;
use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};

/// Layout of JVM date stamps, e.g. `2019-05-07T10:02:37.123+0200`
const JVM_DATE: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3][offset_hour sign:mandatory][offset_minute]"
);

/// Point in time, identified by a wall-clock date, JVM uptime, or both
///
/// GC logs may be decorated with either or both, depending on JVM flags. When
/// two stamps are compared, uptime is preferred since it is immune to wall
/// clock adjustments. Stamps that share no common component are unordered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct DateTimeStamp {
    /// Wall-clock date
    #[serde(with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,

    /// Seconds elapsed since JVM startup
    pub uptime: Option<Seconds>,
}
//
impl DateTimeStamp {
    /// Stamp with only an uptime component
    pub fn from_uptime(uptime: Seconds) -> Self {
        Self {
            date: None,
            uptime: Some(uptime),
        }
    }

    /// Stamp with only a date component
    pub fn from_date(date: OffsetDateTime) -> Self {
        Self {
            date: Some(date),
            uptime: None,
        }
    }

    /// Decode the textual date and uptime components of a log line
    pub fn parse(date: Option<&str>, uptime: Option<&str>) -> Result<Self, TokenError> {
        Ok(Self {
            date: date.map(Self::parse_date).transpose()?,
            uptime: uptime.map(parse_decimal).transpose()?,
        })
    }

    /// Decode a JVM date stamp
    pub fn parse_date(date: &str) -> Result<OffsetDateTime, TokenError> {
        OffsetDateTime::parse(&date.replace(',', "."), JVM_DATE)
            .map_err(|_| TokenError::BadDate(date.into()))
    }

    /// Truth that neither component is known
    pub fn is_unknown(&self) -> bool {
        self.date.is_none() && self.uptime.is_none()
    }

    /// Seconds elapsed between an earlier stamp and this one, if comparable
    pub fn seconds_since(&self, earlier: &Self) -> Option<Seconds> {
        if let (Some(now), Some(then)) = (self.uptime, earlier.uptime) {
            Some(now - then)
        } else if let (Some(now), Some(then)) = (self.date, earlier.date) {
            Some((now - then).as_seconds_f64())
        } else {
            None
        }
    }

    /// Shift this stamp forward by some amount of seconds
    pub fn add_seconds(self, seconds: Seconds) -> Self {
        Self {
            date: self
                .date
                .map(|date| date + time::Duration::seconds_f64(seconds)),
            uptime: self.uptime.map(|uptime| uptime + seconds),
        }
    }
}
//
impl PartialOrd for DateTimeStamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if let (Some(mine), Some(theirs)) = (self.uptime, other.uptime) {
            mine.partial_cmp(&theirs)
        } else if let (Some(mine), Some(theirs)) = (self.date, other.date) {
            Some(mine.cmp(&theirs))
        } else {
            None
        }
    }
}
//
impl Display for DateTimeStamp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match (self.date, self.uptime) {
            (Some(date), Some(uptime)) => write!(f, "{date} ({uptime:.3}s)"),
            (Some(date), None) => write!(f, "{date}"),
            (None, Some(uptime)) => write!(f, "{uptime:.3}s"),
            (None, None) => write!(f, "<unknown time>"),
        }
    }
}
