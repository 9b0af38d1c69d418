//! Reasons why the JVM started a garbage collection

use phf::phf_map;
use serde::{Serialize, Serializer};
use std::fmt::{self, Display, Formatter};

/// Generate the GcCause enum along with a PHF that maps the labels printed by
/// HotSpot to the matching GcCause.
macro_rules! generate_causes {
    ($($string:literal => $enum:ident),* $(,)?) => {
        /// Reason for a garbage collection, as printed between parentheses
        #[derive(Clone, Debug, Hash, Eq, PartialEq, strum::AsRefStr)]
        pub enum GcCause {
            /// Cause label that this crate does not know about
            //
            // Double boxing keeps the enum down to a single machine word
            #[strum(to_string = "Unknown")]
            Unknown(Box<Box<str>>),

            $(
                #[doc = $string]
                #[strum(to_string = $string)]
                $enum
            ),*
        }
        //
        impl GcCause {
            /// Label of the cause, as featured in GC logs
            pub fn label(&self) -> &str {
                if let GcCause::Unknown(label) = self {
                    label
                } else {
                    self.as_ref()
                }
            }
        }

        /// Map from a HotSpot cause label to its identifier
        static CAUSES: phf::Map<&'static str, GcCause> = phf_map! {
            $(
                $string => GcCause::$enum
            ),*
        };
    };
}
//
generate_causes! {
    "Adaptive Size Policy" => AdaptiveSizePolicy,
    "Allocation Failure" => AllocationFailure,
    "Allocation Profiler" => AllocationProfiler,
    "Allocation Rate" => AllocationRate,
    "Allocation Stall" => AllocationStall,
    "CMS Concurrent Mark" => CmsConcurrentMark,
    "CMS Final Remark" => CmsFinalRemark,
    "CMS Initial Mark" => CmsInitialMark,
    "CodeCache GC Aggressive" => CodeCacheGcAggressive,
    "CodeCache GC Threshold" => CodeCacheGcThreshold,
    "Diagnostic Command" => DiagnosticCommand,
    "Ergonomics" => Ergonomics,
    "Full GC Alot" => FullGcAlot,
    "G1 Compaction Pause" => G1CompactionPause,
    "G1 Evacuation Pause" => G1EvacuationPause,
    "G1 Humongous Allocation" => G1HumongousAllocation,
    "G1 Periodic Collection" => G1PeriodicCollection,
    "G1 Preventive Collection" => G1PreventiveCollection,
    "GCLocker Initiated GC" => GcLockerInitiatedGc,
    "Heap Dump Initiated GC" => HeapDumpInitiatedGc,
    "Heap Inspection Initiated GC" => HeapInspectionInitiatedGc,
    "High Usage" => HighUsage,
    "JvmtiEnv ForceGarbageCollection" => JvmtiForceGc,
    "Last ditch collection" => LastDitchCollection,
    "Metadata GC Clear Soft References" => MetadataGcClearSoftReferences,
    "Metadata GC Threshold" => MetadataGcThreshold,
    "No GC" => NoGc,
    "Proactive" => Proactive,
    "ScavengeAlot" => ScavengeAlot,
    "System.gc()" => SystemGc,
    "Timer" => Timer,
    "Update Allocation Context Stats" => UpdateAllocationContextStats,
    "Warmup" => Warmup,
    "WhiteBox Initiated Concurrent Mark" => WhiteBoxConcurrentMark,
    "WhiteBox Initiated Full GC" => WhiteBoxFullGc,
    "WhiteBox Initiated Young GC" => WhiteBoxYoungGc,
}
//
impl GcCause {
    /// Identify a cause from its label
    ///
    /// Labels that are not known yet are kept around as `Unknown`, so that
    /// the GC cause catalog can be extended without losing information.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        CAUSES
            .get(label)
            .cloned()
            .unwrap_or_else(|| GcCause::Unknown(Box::new(label.into())))
    }

    /// Truth that the application explicitly requested this collection
    pub fn is_explicit(&self) -> bool {
        matches!(
            self,
            GcCause::SystemGc
                | GcCause::DiagnosticCommand
                | GcCause::JvmtiForceGc
                | GcCause::HeapDumpInitiatedGc
                | GcCause::HeapInspectionInitiatedGc
        )
    }
}
//
impl Display for GcCause {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
//
impl Serialize for GcCause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn known_causes() {
        assert_eq!(GcCause::from_label("System.gc()"), GcCause::SystemGc);
        assert_eq!(
            GcCause::from_label(" G1 Evacuation Pause "),
            GcCause::G1EvacuationPause
        );
        assert!(GcCause::SystemGc.is_explicit());
        assert!(!GcCause::AllocationFailure.is_explicit());
        assert_eq!(GcCause::Warmup.label(), "Warmup");
        assert_eq!(GcCause::GcLockerInitiatedGc.to_string(), "GCLocker Initiated GC");
    }

    #[test]
    fn unknown_cause() {
        let cause = GcCause::from_label("Shiny New Reason");
        assert_matches!(&cause, GcCause::Unknown(label) if &***label == "Shiny New Reason");
        assert_eq!(cause.label(), "Shiny New Reason");
        assert_eq!(
            serde_json::to_string(&cause).unwrap(),
            r#""Shiny New Reason""#
        );
    }
}
