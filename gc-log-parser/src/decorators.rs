//! Decorations that unified logging puts in front of every message

use crate::grammar::DATE;
use gc_events::{parse_decimal, parse_integer, DateTimeStamp, Seconds, TokenError};
use regex::Regex;
use std::sync::OnceLock;

/// Log level of a unified logging message
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    /// `trace`
    Trace,
    /// `debug`
    Debug,
    /// `info`
    Info,
    /// `warning`
    Warning,
    /// `error`
    Error,
}

/// Decoded `[date][uptime][level][tags] GC(n) ` prefix of a unified line
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decorators<'l> {
    /// Point in time of the message
    pub stamp: DateTimeStamp,

    /// Log level, if decorated
    pub level: Option<Level>,

    /// Tag set, e.g. `["gc", "phases"]`
    pub tags: Vec<&'l str>,

    /// GC identifier, for messages that are about a specific collection
    pub gc_id: Option<u32>,

    /// Undecorated message
    pub body: &'l str,
}
//
impl<'l> Decorators<'l> {
    /// Split a unified logging line into its decorations and message body
    ///
    /// Decorations are recognized by shape, so any subset of the decorators
    /// that the JVM supports can be configured, in any order. Unknown
    /// decorations (pid, tid, hostname...) are skipped.
    pub fn decode(line: &'l str) -> Result<Self, TokenError> {
        let mut decorators = Self::default();
        let mut rest = line;
        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(end) = stripped.find(']') else {
                break;
            };
            let decoration = stripped[..end].trim();
            decorators.apply(decoration)?;
            rest = &stripped[end + 1..];
        }
        rest = rest.strip_prefix(' ').unwrap_or(rest);

        if let Some(captures) = gc_id_prefix().captures(rest) {
            let id = parse_integer(&captures[1])?;
            decorators.gc_id =
                Some(u32::try_from(id).map_err(|_| TokenError::BadNumber(captures[1].into()))?);
            rest = &rest[captures[0].len()..];
        }
        decorators.body = rest;
        Ok(decorators)
    }

    /// Truth that the message carries some tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag)
    }

    /// Interpret one decoration
    fn apply(&mut self, decoration: &'l str) -> Result<(), TokenError> {
        if decoration_date().is_match(decoration) {
            self.stamp.date = Some(DateTimeStamp::parse_date(decoration)?);
        } else if let Some(seconds) = decoration.strip_suffix('s').filter(|s| is_decimal(s)) {
            self.stamp.uptime = Some(parse_decimal(seconds)?);
        } else if let Some(millis) = decoration.strip_suffix("ms").filter(|s| is_integer(s)) {
            // uptimemillis and timemillis share a shape, but the latter is an
            // epoch timestamp in the trillions
            let millis = parse_integer(millis)?;
            if millis < UPTIME_MILLIS_LIMIT && self.stamp.uptime.is_none() {
                self.stamp.uptime = Some(millis as Seconds / 1000.0);
            }
        } else if let Ok(level) = decoration.parse::<Level>() {
            self.level = Some(level);
        } else if decoration_tags().is_match(decoration) {
            self.tags = decoration.split(',').map(str::trim).collect();
        } else {
            log::trace!("Skipping unknown decoration {decoration:?}");
        }
        Ok(())
    }
}

/// Larger millisecond decorations are epoch-based
const UPTIME_MILLIS_LIMIT: u64 = 100_000_000_000;

fn is_decimal(s: &str) -> bool {
    let mut parts = s.splitn(2, ['.', ',']);
    matches!(
        (parts.next(), parts.next()),
        (Some(int), Some(frac)) if is_integer(int) && is_integer(frac)
    )
}

fn is_integer(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn decoration_date() -> &'static Regex {
    static DECORATION_DATE: OnceLock<Regex> = OnceLock::new();
    DECORATION_DATE
        .get_or_init(|| Regex::new(&format!("^{DATE}$")).expect("date grammar is valid"))
}

fn decoration_tags() -> &'static Regex {
    static DECORATION_TAGS: OnceLock<Regex> = OnceLock::new();
    DECORATION_TAGS.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9]*(?:\s*,\s*[a-z][a-z0-9]*)*$").expect("tag grammar is valid")
    })
}

fn gc_id_prefix() -> &'static Regex {
    static GC_ID_PREFIX: OnceLock<Regex> = OnceLock::new();
    GC_ID_PREFIX.get_or_init(|| Regex::new(r"^GC\((\d+)\) ").expect("GC id grammar is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn full_decorations() {
        let decorators = Decorators::decode(
            "[2019-05-07T10:02:37.123+0200][1.234s][info][gc,start     ] GC(0) Pause Young (Normal) (G1 Evacuation Pause)",
        )
        .unwrap();
        assert_eq!(decorators.stamp.uptime, Some(1.234));
        assert!(decorators.stamp.date.is_some());
        assert_eq!(decorators.level, Some(Level::Info));
        assert_eq!(decorators.tags, vec!["gc", "start"]);
        assert!(decorators.has_tag("start"));
        assert_eq!(decorators.gc_id, Some(0));
        assert_eq!(decorators.body, "Pause Young (Normal) (G1 Evacuation Pause)");
    }

    #[test]
    fn sparse_decorations() {
        let decorators = Decorators::decode("[0.015s][info][gc,heap] Heap region size: 1M").unwrap();
        assert_eq!(decorators.stamp, DateTimeStamp::from_uptime(0.015));
        assert_eq!(decorators.gc_id, None);
        assert_eq!(decorators.body, "Heap region size: 1M");

        let decorators = Decorators::decode("[1557216157123ms][45ms][gc] GC(12) Concurrent Cycle").unwrap();
        assert_eq!(decorators.stamp.uptime, Some(0.045));
        assert_eq!(decorators.gc_id, Some(12));
        assert_eq!(decorators.body, "Concurrent Cycle");

        let decorators = Decorators::decode("[0.520s][info][gc,heap     ] GC(0)      Free:     4000M (98%)").unwrap();
        assert_eq!(decorators.body, "     Free:     4000M (98%)");
    }

    #[test]
    fn undecorated() {
        let decorators = Decorators::decode("Heap").unwrap();
        assert!(decorators.stamp.is_unknown());
        assert!(decorators.tags.is_empty());
        assert_eq!(decorators.body, "Heap");
    }

    #[test]
    fn bad_decorations() {
        assert_matches!(
            Decorators::decode("[2019-13-45T10:02:37.123+0200][gc] Heap"),
            Err(TokenError::BadDate(_))
        );
    }
}
