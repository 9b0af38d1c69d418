//! Memory pools and their occupancy

use crate::{parse_decimal, Kilobytes, TokenError};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Decode a memory quantity with a `B`, `K`, `M` or `G` unit suffix
///
/// Fractional quantities such as `5557.6K` are rounded to the nearest
/// kilobyte.
pub fn kilobytes(magnitude: &str, unit: &str) -> Result<Kilobytes, TokenError> {
    let magnitude = parse_decimal(magnitude)?;
    let scale = match unit.trim() {
        "B" | "b" => 1.0 / 1024.0,
        "K" | "k" | "KB" => 1.0,
        "M" | "m" | "MB" => 1024.0,
        "G" | "g" | "GB" => 1024.0 * 1024.0,
        other => return Err(TokenError::UnknownUnit(other.into())),
    };
    Ok((magnitude * scale).round() as Kilobytes)
}

/// Memory pools that GC logs report on
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPool {
    /// Young generation of the generational collectors
    Young,

    /// Old generation of the generational collectors
    Tenured,

    /// Whole Java heap
    Heap,

    /// G1 eden regions
    Eden,

    /// G1 survivor regions
    Survivor,

    /// G1 old regions
    Old,

    /// G1 humongous regions
    Humongous,

    /// G1 archive regions
    Archive,

    /// Class metadata (JDK 8+)
    Metaspace,

    /// Non-class part of the metaspace (JDK 16+)
    NonClassSpace,

    /// Compressed class space part of the metaspace
    ClassSpace,

    /// Permanent generation (JDK 7 and older)
    Perm,
}

/// Occupancy and capacity of a memory pool around a collection
///
/// Logs do not always report the pool capacity before the collection, and
/// G1 survivor regions are reported without any capacity.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MemoryPoolSummary {
    /// Occupancy before the collection
    pub occupancy_before: Kilobytes,

    /// Capacity before the collection
    pub size_before: Option<Kilobytes>,

    /// Occupancy after the collection
    pub occupancy_after: Kilobytes,

    /// Capacity after the collection
    pub size_after: Option<Kilobytes>,
}
//
impl MemoryPoolSummary {
    /// Summary from the `before(size)->after(size)` notation
    pub fn new(
        occupancy_before: Kilobytes,
        size_before: Kilobytes,
        occupancy_after: Kilobytes,
        size_after: Kilobytes,
    ) -> Self {
        Self {
            occupancy_before,
            size_before: Some(size_before),
            occupancy_after,
            size_after: Some(size_after),
        }
    }

    /// Summary from the `before->after(size)` notation
    pub fn with_final_size(
        occupancy_before: Kilobytes,
        occupancy_after: Kilobytes,
        size_after: Kilobytes,
    ) -> Self {
        Self {
            occupancy_before,
            size_before: None,
            occupancy_after,
            size_after: Some(size_after),
        }
    }

    /// Summary from the `before->after` notation
    pub fn without_size(occupancy_before: Kilobytes, occupancy_after: Kilobytes) -> Self {
        Self {
            occupancy_before,
            size_before: None,
            occupancy_after,
            size_after: None,
        }
    }

    /// Amount of memory that the collection released
    pub fn reclaimed(&self) -> i64 {
        self.occupancy_before as i64 - self.occupancy_after as i64
    }
}
//
impl Display for MemoryPoolSummary {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}K", self.occupancy_before)?;
        if let Some(size) = self.size_before {
            write!(f, "({size}K)")?;
        }
        write!(f, "->{}K", self.occupancy_after)?;
        if let Some(size) = self.size_after {
            write!(f, "({size}K)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn units() {
        assert_eq!(kilobytes("5033216", "K"), Ok(5033216));
        assert_eq!(kilobytes("24.0", "M"), Ok(24 * 1024));
        assert_eq!(kilobytes("4", "G"), Ok(4 * 1024 * 1024));
        assert_eq!(kilobytes("0.0", "B"), Ok(0));
        assert_eq!(kilobytes("2048", "B"), Ok(2));
        assert_eq!(kilobytes("5557.6", "K"), Ok(5558));
        assert_eq!(kilobytes("4120,5", "K"), Ok(4121));
        assert_matches!(kilobytes("12", "T"), Err(TokenError::UnknownUnit(_)));
    }

    #[test]
    fn summaries() {
        let young = MemoryPoolSummary::with_final_size(5033216, 129451, 5662336);
        assert_eq!(young.reclaimed(), 5033216 - 129451);
        assert_eq!(young.to_string(), "5033216K->129451K(5662336K)");

        let eden = MemoryPoolSummary::new(24576, 24576, 0, 21504);
        assert_eq!(eden.to_string(), "24576K(24576K)->0K(21504K)");

        let survivors = MemoryPoolSummary::without_size(0, 3072);
        assert_eq!(survivors.reclaimed(), -3072);
        assert_eq!(survivors.size_after, None);
    }
}
