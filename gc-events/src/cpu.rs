//! CPU time accounting of a GC activity

use crate::Seconds;
use serde::Serialize;

/// CPU time breakdown, as in `[Times: user=1.35 sys=0.03, real=0.25 secs]`
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CpuSummary {
    /// CPU time spent in user mode, summed over all GC threads
    pub user: Seconds,

    /// CPU time spent in kernel mode, summed over all GC threads
    pub kernel: Seconds,

    /// Elapsed wall-clock time
    pub wall_clock: Seconds,
}
//
impl CpuSummary {
    /// Effective parallelism of the GC threads
    pub fn parallelism(&self) -> Option<f64> {
        (self.wall_clock > 0.0).then(|| (self.user + self.kernel) / self.wall_clock)
    }
}
