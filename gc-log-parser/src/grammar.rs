//! Sub-grammars that line rules are assembled from
//!
//! Every constant documents the number of capture groups that it contributes,
//! since handlers address captures by position.

use regex::Regex;
use std::sync::OnceLock;

/// JVM date stamp, e.g. `2019-05-07T10:02:37.123+0200` (1 group)
pub const DATE: &str = r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}[.,]\d{3}[-+]\d{4})";

/// Decimal number with `.` or `,` separator (1 group)
pub const DECIMAL: &str = r"(\d+[.,]\d+)";

/// Unsigned integer (1 group)
pub const INTEGER: &str = r"(\d+)";

/// Memory quantity with its unit suffix, e.g. `5557.6K` or `24.0M` (2 groups)
pub const MEMORY_SIZE: &str = r"(\d+(?:[.,]\d+)?)\s?([BKMG])";

/// Optional leading `DATE: UPTIME: ` stamp of a pre-unified line, without
/// captures. The same shape also prefixes nested sub-events.
pub const STAMP: &str = r"(?:\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}[.,]\d{3}[-+]\d{4}: )?(?:\d+[.,]\d+: )?";

/// Pre-unified pause time, e.g. `0.2536590 secs` (1 group)
pub const PAUSE_TIME: &str = r"(\d+[.,]\d+) secs";

/// Unified pause time, e.g. `6.123ms` (1 group)
pub const UNIFIED_PAUSE_TIME: &str = r"(\d+[.,]\d+)ms";

/// Pre-unified CPU breakdown (3 groups)
pub const CPU_BREAKDOWN: &str =
    r"\[Times: user=(\d+[.,]\d+) sys=(\d+[.,]\d+), real=(\d+[.,]\d+) secs\]";

/// Unified CPU breakdown (3 groups)
pub const UNIFIED_CPU_BREAKDOWN: &str = r"User=(\d+[.,]\d+)s Sys=(\d+[.,]\d+)s Real=(\d+[.,]\d+)s";

/// GC cause between parentheses, tolerating the `()` of `System.gc()`
/// (1 group, excluding the parentheses)
pub const GC_CAUSE: &str = r"\(((?:[^()]|\(\))+)\)";

/// `before->after(size)` memory transition (6 groups)
pub fn before_after_size() -> String {
    format!(r"{MEMORY_SIZE}->{MEMORY_SIZE}\({MEMORY_SIZE}\)")
}

/// `before(size)->after(size)` memory transition (8 groups)
pub fn pool_before_after() -> String {
    format!(r"{MEMORY_SIZE}\({MEMORY_SIZE}\)->{MEMORY_SIZE}\({MEMORY_SIZE}\)")
}

/// `before->after` memory transition (4 groups)
pub fn before_after() -> String {
    format!(r"{MEMORY_SIZE}->{MEMORY_SIZE}")
}

/// Leading `DATE: UPTIME: ` stamp of a pre-unified line (2 groups)
pub fn leading_stamp() -> &'static Regex {
    static LEADING_STAMP: OnceLock<Regex> = OnceLock::new();
    LEADING_STAMP.get_or_init(|| {
        Regex::new(&format!(r"^(?:{DATE}: ?)?(?:{DECIMAL}: )?"))
            .expect("leading stamp grammar is valid")
    })
}
