//! Selection of the rule that handles a line

use crate::{rule::Rule, trace::Trace};

/// Ordered catalog of rules and the handlers associated with them
///
/// Order matters: many rules are deliberately broad and only give the right
/// answer because more specific rules are tried before them. Tables are
/// immutable once built, and meant to be shared by every parser of a dialect.
#[derive(Debug)]
pub struct RuleTable<H> {
    /// Rules, by decreasing priority
    rules: Box<[Rule]>,

    /// Handler of each rule
    handlers: Box<[H]>,
}
//
impl<H> RuleTable<H> {
    /// Build a table from (rule, handler) pairs, by decreasing priority
    pub fn new(entries: impl IntoIterator<Item = (Rule, H)>) -> Self {
        let (rules, handlers): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
        Self {
            rules: rules.into(),
            handlers: handlers.into(),
        }
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Truth that there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules, by decreasing priority
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// First rule that matches a line, by straightforward linear search
    pub fn first_match<'l>(&self, line: &'l str) -> Option<(usize, Trace<'l>)> {
        self.rules
            .iter()
            .enumerate()
            .find_map(|(idx, rule)| rule.try_match(line).map(|trace| (idx, trace)))
    }
}

/// Outcome of dispatching a line
#[derive(Debug)]
pub struct Dispatch<'t, 'l, H> {
    /// Rule that won
    pub rule: &'t Rule,

    /// Handler of that rule
    pub handler: &'t H,

    /// Match of the line against that rule
    pub trace: Trace<'l>,
}

/// Per-parser rule selection state
///
/// GC logs are very repetitive, so the rule that matched last is likely to
/// match again. The dispatcher keeps the rule indices in most-recently-used
/// order and evaluates them in that order, but it only uses this order to
/// find a match early: once some rule has matched, every rule of higher
/// priority is still checked, and rules of lower priority are skipped. The
/// outcome is thus always the first match in table order, whatever the
/// history of the dispatcher.
#[derive(Clone, Debug, Default)]
pub struct Dispatcher {
    /// Rule indices, most recently used first
    order: Vec<usize>,
}
//
impl Dispatcher {
    /// Set up a dispatcher for some rule table
    pub fn new<H>(table: &RuleTable<H>) -> Self {
        Self {
            order: (0..table.len()).collect(),
        }
    }

    /// Current evaluation order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Find the highest-priority rule that matches a line
    pub fn dispatch<'t, 'l, H>(
        &mut self,
        table: &'t RuleTable<H>,
        line: &'l str,
    ) -> Option<Dispatch<'t, 'l, H>> {
        if self.order.len() != table.len() {
            *self = Self::new(table);
        }

        // Evaluate rules in MRU order, skipping those that cannot beat the
        // best match found so far
        let mut best: Option<(usize, usize)> = None;
        for (position, &idx) in self.order.iter().enumerate() {
            if best.map_or(false, |(_, best_idx)| idx >= best_idx) {
                continue;
            }
            if table.rules[idx].is_match(line) {
                best = Some((position, idx));
                if idx == 0 {
                    break;
                }
            }
        }
        let (position, idx) = best?;

        // Report grammars that overlap with the winner
        if log::log_enabled!(log::Level::Trace) {
            for shadowed in table.rules[idx + 1..].iter().filter(|rule| rule.is_match(line)) {
                log::trace!(
                    "{line:?} also matches lower-priority rule {}",
                    shadowed.name()
                );
            }
        }

        // Promote the winner to the front
        self.order[..=position].rotate_right(1);
        debug_assert_eq!(self.order[0], idx);

        let rule = &table.rules[idx];
        let trace = rule.try_match(line)?;
        Some(Dispatch {
            rule,
            handler: &table.handlers[idx],
            trace,
        })
    }
}
