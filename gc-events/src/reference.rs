//! Reference processing statistics

use crate::Seconds;
use serde::Serialize;

/// Statistics about one kind of java.lang.ref.Reference
///
/// Pre-unified logs report a reference count and a processing time, ZGC
/// reports encountered/discovered/enqueued counts. Whatever the log does not
/// say is left as `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ReferenceStat {
    /// Number of references that were processed or encountered
    pub count: Option<u64>,

    /// Number of references that were discovered
    pub discovered: Option<u64>,

    /// Number of references that were enqueued
    pub enqueued: Option<u64>,

    /// Time spent processing these references
    pub pause_time: Option<Seconds>,
}

/// Reference processing summary of one collection
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ReferenceGcSummary {
    /// Soft references
    pub soft: Option<ReferenceStat>,

    /// Weak references
    pub weak: Option<ReferenceStat>,

    /// Final references
    #[serde(rename = "final")]
    pub final_: Option<ReferenceStat>,

    /// Phantom references
    pub phantom: Option<ReferenceStat>,

    /// JNI weak global references
    pub jni_weak: Option<ReferenceStat>,
}
//
impl ReferenceGcSummary {
    /// Total time spent processing references, if any was reported
    pub fn total_pause_time(&self) -> Option<Seconds> {
        [self.soft, self.weak, self.final_, self.phantom, self.jni_weak]
            .iter()
            .flatten()
            .filter_map(|stat| stat.pause_time)
            .fold(None, |acc, time| Some(acc.unwrap_or(0.0) + time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pause_time() {
        assert_eq!(ReferenceGcSummary::default().total_pause_time(), None);

        let stat = |pause_time| ReferenceStat {
            count: Some(1),
            pause_time: Some(pause_time),
            ..ReferenceStat::default()
        };
        let summary = ReferenceGcSummary {
            soft: Some(stat(0.25)),
            jni_weak: Some(stat(0.5)),
            ..ReferenceGcSummary::default()
        };
        assert_eq!(summary.total_pause_time(), Some(0.75));
    }
}
