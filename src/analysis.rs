//! Parsing of one GC log file

use gc_log_parser::{AnyGcLogParser, CollectorFamily, Diagnostics, Diarizer, DiaryError, EventSink};
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};
use thiserror::Error;

/// What the user knows about the logs better than the log sniffer
#[derive(Clone, Copy, Debug)]
pub struct Assumptions {
    /// Collector that wrote the logs
    pub collector: Option<CollectorFamily>,

    /// Logs were written through unified logging
    pub unified: Option<bool>,

    /// Number of leading lines that are looked at to figure out the log
    /// configuration
    pub sniff_lines: usize,
}

/// Outcome of parsing one log
#[derive(Debug)]
pub struct Analysis<S> {
    /// Dialect that the log was parsed with
    pub dialect: &'static str,

    /// Where events went
    pub sink: S,

    /// What went wrong
    pub diagnostics: Diagnostics,

    /// Number of lines in the log
    pub lines: usize,
}

/// Parse a GC log file
pub fn analyze<S: EventSink>(
    path: &Path,
    assumptions: &Assumptions,
    sink: S,
) -> Result<Analysis<S>, GclensError> {
    let file = File::open(path).map_err(|source| GclensError::Open {
        path: path.to_owned(),
        source,
    })?;
    analyze_reader(path, BufReader::new(file), assumptions, sink)
}

/// Parse a GC log from some reader, `path` is only used for error reporting
pub fn analyze_reader<S: EventSink>(
    path: &Path,
    reader: impl BufRead,
    assumptions: &Assumptions,
    sink: S,
) -> Result<Analysis<S>, GclensError> {
    let read_error = |source| GclensError::Read {
        path: path.to_owned(),
        source,
    };
    let mut lines = LogLines { reader };

    // Figure out the log configuration from its first lines
    let mut diarizer = Diarizer::new(assumptions.sniff_lines);
    if let Some(collector) = assumptions.collector {
        diarizer.assume_collector(collector);
    }
    if let Some(unified) = assumptions.unified {
        diarizer.assume_unified(unified);
    }
    let mut sniffed = Vec::new();
    for line in lines.by_ref() {
        let line = line.map_err(read_error)?;
        let wants_more = match &line {
            LogLine::Text(text) => diarizer.observe(text),
            LogLine::Garbled(_) => true,
        };
        sniffed.push(line);
        if !wants_more {
            break;
        }
    }
    let diary_error = |source| GclensError::Diary {
        path: path.to_owned(),
        source,
    };
    let diary = diarizer.diary().map_err(diary_error)?;

    // Parse the whole log, starting with the lines that were sniffed
    let mut parser = AnyGcLogParser::new(&diary, sink).map_err(diary_error)?;
    let dialect = parser.dialect_name();
    log::info!("Parsing {} as a {dialect} log", path.display());
    let mut num_lines = 0;
    for line in sniffed.into_iter().map(Ok).chain(lines) {
        match line.map_err(read_error)? {
            LogLine::Text(text) => parser.receive(&text),
            LogLine::Garbled(text) => parser.reject(&text),
        }
        num_lines += 1;
    }
    let (sink, diagnostics) = parser.finish();
    Ok(Analysis {
        dialect,
        sink,
        diagnostics,
        lines: num_lines,
    })
}

/// Line of a log file
#[derive(Debug, PartialEq)]
enum LogLine {
    /// Valid UTF-8
    Text(String),

    /// Anything else, with invalid sequences replaced for display
    Garbled(String),
}

/// Lines of a log, which unlike [`BufRead::lines()`] go on after a line that
/// is not valid UTF-8
struct LogLines<R> {
    /// Underlying reader
    reader: R,
}
//
impl<R: BufRead> Iterator for LogLines<R> {
    type Item = io::Result<LogLine>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut bytes = Vec::new();
        match self.reader.read_until(b'\n', &mut bytes) {
            Ok(0) => None,
            Ok(_) => {
                if bytes.last() == Some(&b'\n') {
                    bytes.pop();
                    if bytes.last() == Some(&b'\r') {
                        bytes.pop();
                    }
                }
                Some(Ok(match String::from_utf8(bytes) {
                    Ok(text) => LogLine::Text(text),
                    Err(e) => {
                        LogLine::Garbled(String::from_utf8_lossy(e.as_bytes()).into_owned())
                    }
                }))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// What can go wrong while analyzing GC logs
#[derive(Debug, Error)]
pub enum GclensError {
    /// Failed to open a log file
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        /// Log file
        path: PathBuf,

        /// Underlying I/O error
        source: io::Error,
    },

    /// Failed to read a log file
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Log file
        path: PathBuf,

        /// Underlying I/O error
        source: io::Error,
    },

    /// Could not figure out how to parse a log
    #[error("cannot parse {}: {source}", .path.display())]
    Diary {
        /// Log file
        path: PathBuf,

        /// Reason why no dialect fits
        source: DiaryError,
    },

    /// Failed to serialize events
    #[error("failed to serialize events of {}: {source}", .path.display())]
    Serialize {
        /// Log file
        path: PathBuf,

        /// Underlying serialization error
        source: serde_json::Error,
    },

    /// Failed to write the results
    #[error("failed to write results: {0}")]
    Write(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use gc_log_parser::{gc_events::JvmEvent, Diagnostic};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DEFAULTS: Assumptions = Assumptions {
        collector: None,
        unified: None,
        sniff_lines: 1000,
    };

    fn log_file(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temporary file");
        for line in lines {
            writeln!(file, "{line}").expect("Failed to write log");
        }
        file
    }

    #[test]
    fn sniffed_log() {
        let log = log_file(&[
            "[0.015s][info][gc,heap] Heap region size: 1M",
            "[0.020s][info][gc     ] Using G1",
            "[1.234s][info][gc,start     ] GC(0) Pause Young (Normal) (G1 Evacuation Pause)",
            "[1.240s][info][gc           ] GC(0) Pause Young (Normal) (G1 Evacuation Pause) 24M->5M(256M) 6.000ms",
            "[1.240s][info][gc,cpu       ] GC(0) User=0.01s Sys=0.00s Real=0.01s",
        ]);
        let analysis = analyze(log.path(), &DEFAULTS, Vec::new()).unwrap();
        assert_eq!(analysis.dialect, "unified G1");
        assert_eq!(analysis.lines, 5);
        assert!(analysis.diagnostics.is_clean());
        assert_matches!(
            &analysis.sink[..],
            [JvmEvent::Pause(_), JvmEvent::Termination(_)]
        );
    }

    #[test]
    fn assumed_collector() {
        let log = log_file(&["10.000: [GC (Allocation Failure)  1000K->600K(5000K), 0.0010000 secs]"]);
        assert_matches!(
            analyze(log.path(), &DEFAULTS, Vec::new()),
            Err(GclensError::Diary {
                source: DiaryError::UnknownCollector,
                ..
            })
        );
        let assumptions = Assumptions {
            collector: Some(CollectorFamily::Parallel),
            unified: Some(false),
            ..DEFAULTS
        };
        let analysis = analyze(log.path(), &assumptions, Vec::new()).unwrap();
        assert_eq!(analysis.dialect, "generational");
        assert_eq!(analysis.sink.len(), 2);
    }

    #[test]
    fn log_lines() {
        let lines = LogLines {
            reader: &b"first\r\nsec\xffond\nlast"[..],
        };
        assert_eq!(
            lines.map(Result::unwrap).collect::<Vec<_>>(),
            vec![
                LogLine::Text("first".into()),
                LogLine::Garbled("sec\u{FFFD}ond".into()),
                LogLine::Text("last".into()),
            ]
        );
    }

    #[test]
    fn garbled_line() {
        let mut log = log_file(&[
            "[0.020s][info][gc     ] Using G1",
            "[1.234s][info][gc,start     ] GC(0) Pause Young (Normal) (G1 Evacuation Pause)",
        ]);
        log.write_all(b"[1.235s][info][gc\xc3\x28] GC(0) Eden\n")
            .expect("Failed to write log");
        writeln!(
            log,
            "[1.240s][info][gc           ] GC(0) Pause Young (Normal) (G1 Evacuation Pause) 24M->5M(256M) 6.000ms"
        )
        .expect("Failed to write log");
        let analysis = analyze(log.path(), &DEFAULTS, Vec::new()).unwrap();
        assert_eq!(analysis.lines, 4);
        assert_matches!(
            analysis.diagnostics.entries(),
            [Diagnostic::UnrecognizedLine { line_number: 3, .. }]
        );
        assert_matches!(
            &analysis.sink[..],
            [JvmEvent::Pause(_), JvmEvent::Termination(_)]
        );
    }

    #[test]
    fn missing_file() {
        let log = log_file(&[]);
        let path = log.path().to_owned();
        drop(log);
        assert_matches!(
            analyze(&path, &DEFAULTS, Vec::new()),
            Err(GclensError::Open { .. })
        );
    }
}
