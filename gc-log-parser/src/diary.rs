//! Description of how a GC log was configured, and its inference from the
//! first lines of the log

use crate::{decorators::Decorators, grammar};
use gc_events::{memory::kilobytes, Kilobytes};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Family of garbage collector that wrote a log
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, strum::IntoStaticStr)]
pub enum CollectorFamily {
    /// Not known yet
    #[default]
    Unknown,

    /// Serial collector (DefNew + Tenured)
    Serial,

    /// Parallel collector (PSYoungGen + ParOldGen)
    Parallel,

    /// Concurrent Mark Sweep (ParNew + CMS)
    Cms,

    /// Garbage First
    G1,

    /// Z Garbage Collector
    Zgc,
}
//
impl CollectorFamily {
    /// Truth that this is one of the young/old generational collectors
    pub fn is_generational(self) -> bool {
        matches!(self, Self::Serial | Self::Parallel | Self::Cms)
    }
}

/// Grammar family that a parser must understand
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::IntoStaticStr)]
pub enum DialectKind {
    /// Serial, Parallel and CMS collectors, before JDK 9
    Generational,

    /// G1, before JDK 9
    PreUnifiedG1,

    /// G1 with unified logging
    UnifiedG1,

    /// Serial, Parallel and CMS collectors with unified logging
    UnifiedGenerational,

    /// ZGC (always uses unified logging)
    Zgc,
}

/// How a GC log was configured
///
/// This decides which grammar is used to parse the log, and never changes
/// while a log is being parsed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Diary {
    /// Collector that wrote the log
    pub collector: CollectorFamily,

    /// Log written through JDK 9+ unified logging (-Xlog)
    pub unified: bool,

    /// Lines carry `GC(n)` identifiers
    pub gc_id_tags: bool,

    /// Lines carry wall-clock dates
    pub date_stamps: bool,

    /// Lines carry JVM uptime
    pub uptime_stamps: bool,

    /// Log was written with -XX:+PrintGCDetails or -Xlog:gc*
    pub details: bool,

    /// Log contains tenuring distributions
    pub tenuring_distribution: bool,

    /// G1 region size, if the log announces it
    pub region_size: Option<Kilobytes>,
}
//
impl Diary {
    /// Select the grammar family for this log
    pub fn dialect(&self) -> Result<DialectKind, DiaryError> {
        match (self.unified, self.collector) {
            (_, CollectorFamily::Unknown) => Err(DiaryError::UnknownCollector),
            (false, CollectorFamily::G1) => Ok(DialectKind::PreUnifiedG1),
            (false, CollectorFamily::Zgc) => Err(DiaryError::Unsupported {
                collector: CollectorFamily::Zgc,
                unified: false,
            }),
            (false, _) => Ok(DialectKind::Generational),
            (true, CollectorFamily::G1) => Ok(DialectKind::UnifiedG1),
            (true, CollectorFamily::Zgc) => Ok(DialectKind::Zgc),
            (true, _) => Ok(DialectKind::UnifiedGenerational),
        }
    }
}

/// What can go wrong while selecting a grammar
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiaryError {
    /// Could not figure out which collector wrote the log
    #[error("could not identify the garbage collector that wrote this log")]
    UnknownCollector,

    /// This collector/logging combination does not exist
    #[error("{collector:?} collector cannot write logs of this format (unified logging: {unified})")]
    Unsupported {
        /// Collector that was identified
        collector: CollectorFamily,

        /// Whether unified logging was identified
        unified: bool,
    },
}

/// Maximal number of lines that a Diarizer looks at by default
pub const DEFAULT_SNIFF_LIMIT: usize = 1000;

/// Infers a Diary from the first lines of a log
#[derive(Clone, Debug)]
pub struct Diarizer {
    /// Diary inferred so far
    diary: Diary,

    /// Votes for unified vs pre-unified logging
    unified_votes: isize,

    /// Number of lines that were looked at
    lines_seen: usize,

    /// Number of lines to look at before giving up
    limit: usize,

    /// A line identifying the collector with certainty was seen
    collector_certain: bool,

    /// Logging flavor imposed by the user
    unified_override: Option<bool>,
}
//
impl Default for Diarizer {
    fn default() -> Self {
        Self::new(DEFAULT_SNIFF_LIMIT)
    }
}
//
impl Diarizer {
    /// Prepare to look at up to `limit` lines
    pub fn new(limit: usize) -> Self {
        Self {
            diary: Diary::default(),
            unified_votes: 0,
            lines_seen: 0,
            limit,
            collector_certain: false,
            unified_override: None,
        }
    }

    /// Settle the collector family, whatever the log says
    pub fn assume_collector(&mut self, collector: CollectorFamily) {
        self.diary.collector = collector;
        self.collector_certain = true;
    }

    /// Settle between unified and pre-unified logging, whatever the log
    /// looks like
    pub fn assume_unified(&mut self, unified: bool) {
        self.unified_override = Some(unified);
    }

    /// Look at one more line, tell if more lines would be useful
    pub fn observe(&mut self, line: &str) -> bool {
        self.lines_seen += 1;
        let line = line.trim_end();
        if line.is_empty() {
            return !self.is_complete();
        }

        if line.starts_with('[') && !line.starts_with("[Times") {
            if let Ok(decorators) = Decorators::decode(line) {
                if !decorators.tags.is_empty() || !decorators.stamp.is_unknown() {
                    self.unified_votes += 1;
                    self.observe_unified(&decorators);
                    return !self.is_complete();
                }
            }
        }
        self.observe_pre_unified(line);
        !self.is_complete()
    }

    /// Truth that enough was seen to settle on a diary
    pub fn is_complete(&self) -> bool {
        self.lines_seen >= self.limit
            || (self.collector_certain && self.unified_votes.abs() >= 3 && self.saw_events())
    }

    /// Settle on a diary
    pub fn diary(mut self) -> Result<Diary, DiaryError> {
        self.diary.unified = self.unified_override.unwrap_or(self.unified_votes > 0);
        self.diary.dialect()?;
        log::info!("Inferred log configuration {:?}", self.diary);
        Ok(self.diary)
    }

    fn saw_events(&self) -> bool {
        self.diary.uptime_stamps || self.diary.date_stamps
    }

    fn set_collector(&mut self, collector: CollectorFamily, certain: bool) {
        if self.collector_certain {
            return;
        }
        if certain || self.diary.collector == CollectorFamily::Unknown {
            self.diary.collector = collector;
            self.collector_certain = certain;
        }
    }

    fn observe_unified(&mut self, decorators: &Decorators) {
        let diary = &mut self.diary;
        diary.date_stamps |= decorators.stamp.date.is_some();
        diary.uptime_stamps |= decorators.stamp.uptime.is_some();
        diary.gc_id_tags |= decorators.gc_id.is_some();
        diary.details |= decorators.tags.len() > 1;

        let body = decorators.body.trim();
        if let Some(captures) = sniffers().region_size.captures(body) {
            diary.region_size = kilobytes(&captures[1], &captures[2]).ok();
        }
        diary.tenuring_distribution |= body.starts_with("Desired survivor size");

        let certain = [
            ("Using G1", CollectorFamily::G1),
            ("Using Serial", CollectorFamily::Serial),
            ("Using Parallel", CollectorFamily::Parallel),
            ("Using Concurrent Mark Sweep", CollectorFamily::Cms),
            ("Using The Z Garbage Collector", CollectorFamily::Zgc),
            ("Initializing The Z Garbage Collector", CollectorFamily::Zgc),
        ];
        if let Some((_, collector)) = certain.iter().find(|(banner, _)| body.starts_with(banner)) {
            self.set_collector(*collector, true);
            return;
        }

        let hints = [
            ("Pause Young (Normal)", CollectorFamily::G1),
            ("Pause Young (Concurrent Start)", CollectorFamily::G1),
            ("Eden regions:", CollectorFamily::G1),
            ("Garbage Collection (", CollectorFamily::Zgc),
            ("DefNew:", CollectorFamily::Serial),
            ("PSYoungGen:", CollectorFamily::Parallel),
            ("ParNew:", CollectorFamily::Cms),
        ];
        if let Some((_, collector)) = hints.iter().find(|(hint, _)| body.starts_with(hint)) {
            self.set_collector(*collector, false);
        }
    }

    fn observe_pre_unified(&mut self, line: &str) {
        self.unified_votes -= 1;
        let diary = &mut self.diary;
        if let Some(captures) = grammar::leading_stamp().captures(line) {
            diary.date_stamps |= captures.get(1).is_some();
            diary.uptime_stamps |= captures.get(2).is_some();
        }
        diary.details |= ["[Times:", "[Eden:", "[Parallel Time", "[ParNew", "[DefNew", "[PSYoungGen"]
            .iter()
            .any(|marker| line.contains(marker));
        diary.tenuring_distribution |= line.starts_with("Desired survivor size");
        if let Some(captures) = sniffers().pre_unified_region_size.captures(line) {
            diary.region_size = kilobytes(&captures[1], &captures[2]).ok();
        }

        let flags = [
            ("-XX:+UseG1GC", CollectorFamily::G1),
            ("-XX:+UseConcMarkSweepGC", CollectorFamily::Cms),
            ("-XX:+UseParallelGC", CollectorFamily::Parallel),
            ("-XX:+UseParallelOldGC", CollectorFamily::Parallel),
            ("-XX:+UseSerialGC", CollectorFamily::Serial),
        ];
        if line.starts_with("CommandLine flags:") {
            if let Some((_, collector)) = flags.iter().find(|(flag, _)| line.contains(flag)) {
                self.set_collector(*collector, true);
            }
            return;
        }

        let hints = [
            ("ParNew", CollectorFamily::Cms),
            ("CMS-", CollectorFamily::Cms),
            ("PSYoungGen", CollectorFamily::Parallel),
            ("DefNew", CollectorFamily::Serial),
            ("GC pause (", CollectorFamily::G1),
            ("GC concurrent-root-region-scan", CollectorFamily::G1),
            ("garbage-first heap", CollectorFamily::G1),
        ];
        if let Some((_, collector)) = hints.iter().find(|(hint, _)| line.contains(hint)) {
            // Young collector names identify the collector unambiguously
            self.set_collector(*collector, true);
        }
    }
}

/// Facts about the JVM that the log announces along the way
///
/// Owned by one parser and handed to its handlers, so that lines which only
/// make sense given an earlier announcement (G1 region counts, for instance)
/// can be interpreted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DialectConfig {
    /// Collector that wrote the log
    pub collector: CollectorFamily,

    /// Log was written with detailed output
    pub details: bool,

    /// G1 region size
    pub region_size: Option<Kilobytes>,

    /// Initial heap size
    pub initial_heap: Option<Kilobytes>,

    /// Maximal heap size
    pub max_heap: Option<Kilobytes>,
}
//
impl DialectConfig {
    /// Start from what was inferred about the log
    pub fn new(diary: &Diary) -> Self {
        Self {
            collector: diary.collector,
            details: diary.details,
            region_size: diary.region_size,
            initial_heap: None,
            max_heap: None,
        }
    }

    /// Record the announced G1 region size
    pub fn set_region_size(&mut self, region_size: Kilobytes) {
        if self.region_size != Some(region_size) {
            log::info!("Heap region size is {region_size}K");
            self.region_size = Some(region_size);
        }
    }

    /// Record the announced initial heap size
    pub fn set_initial_heap(&mut self, size: Kilobytes) {
        log::info!("Initial heap size is {size}K");
        self.initial_heap = Some(size);
    }

    /// Record the announced maximal heap size
    pub fn set_max_heap(&mut self, size: Kilobytes) {
        log::info!("Maximal heap size is {size}K");
        self.max_heap = Some(size);
    }

    /// Convert a G1 region count to kilobytes, if the region size is known
    pub fn regions(&self, count: u64) -> Option<Kilobytes> {
        self.region_size.map(|size| size * count)
    }

    /// Interpret the `-XX:` sizing flags of a `CommandLine flags:` line
    pub fn apply_command_line(&mut self, flags: &str) {
        for flag in flags.split_whitespace() {
            let Some((name, value)) = flag.strip_prefix("-XX:").and_then(|f| f.split_once('=')) else {
                continue;
            };
            let Ok(bytes) = value.parse::<u64>() else {
                continue;
            };
            match name {
                "InitialHeapSize" => self.set_initial_heap(bytes / 1024),
                "MaxHeapSize" => self.set_max_heap(bytes / 1024),
                "G1HeapRegionSize" => self.set_region_size(bytes / 1024),
                _ => {}
            }
        }
    }
}

/// Regexes used by the Diarizer
struct Sniffers {
    region_size: Regex,
    pre_unified_region_size: Regex,
}

fn sniffers() -> &'static Sniffers {
    static SNIFFERS: OnceLock<Sniffers> = OnceLock::new();
    SNIFFERS.get_or_init(|| Sniffers {
        region_size: Regex::new(r"^Heap [Rr]egion [Ss]ize: (\d+)([BKMG])$")
            .expect("region size grammar is valid"),
        pre_unified_region_size: Regex::new(r"^\s+region size (\d+)([BKMG]),")
            .expect("region size grammar is valid"),
    })
}
