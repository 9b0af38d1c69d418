//! Named line grammars

use crate::trace::Trace;
use regex::Regex;
use std::fmt::{self, Debug, Formatter};

/// Named line grammar
///
/// Rules are immutable and built once per dialect, so a given line always
/// gets the same answer from a given rule.
#[derive(Clone)]
pub struct Rule {
    /// Name used in diagnostics
    name: &'static str,

    /// Grammar of the lines that this rule recognizes
    pattern: Regex,
}
//
impl Rule {
    /// Build a rule from a regular expression
    ///
    /// # Panics
    ///
    /// Panics if the pattern is not a valid regex. Rule patterns are
    /// assembled from constants, so this is a programming error.
    pub fn new(name: &'static str, pattern: impl AsRef<str>) -> Self {
        let pattern = pattern.as_ref();
        Self {
            name,
            pattern: Regex::new(pattern)
                .unwrap_or_else(|e| panic!("rule {name} has an invalid pattern: {e}")),
        }
    }

    /// Name of this rule
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of capture groups in the grammar, excluding the whole match
    pub fn group_count(&self) -> usize {
        self.pattern.captures_len() - 1
    }

    /// Truth that a line follows this rule's grammar
    ///
    /// Cheaper than `try_match()` as capture positions are not computed.
    pub fn is_match(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    /// Match a line against this rule
    pub fn try_match<'l>(&self, line: &'l str) -> Option<Trace<'l>> {
        self.pattern
            .captures(line)
            .map(|captures| Trace::new(self.name, line, captures))
    }
}
//
impl Debug for Rule {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Rule({} = {:?})", self.name, self.pattern.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::PAUSE_TIME;

    #[test]
    fn matching() {
        let rule = Rule::new("PAUSE", format!("^pause, {PAUSE_TIME}$"));
        assert_eq!(rule.name(), "PAUSE");
        assert_eq!(rule.group_count(), 1);
        assert!(rule.is_match("pause, 0.0123 secs"));
        assert!(!rule.is_match("pause, 0.0123 secs]"));

        let trace = rule.try_match("pause, 0.0123 secs").unwrap();
        assert_eq!(trace.rule(), "PAUSE");
        assert_eq!(trace.duration(), Ok(0.0123));
        assert!(rule.try_match("no pause").is_none());
    }

    #[test]
    fn purity() {
        let rule = Rule::new("WORD", r"^(\w+)");
        for _ in 0..3 {
            assert_eq!(rule.try_match("hello world").unwrap().group(1), Ok("hello"));
        }
    }

    #[test]
    #[should_panic]
    fn invalid_pattern() {
        Rule::new("BROKEN", "(unclosed");
    }
}
