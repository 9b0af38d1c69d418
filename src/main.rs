//! Structured events out of JVM garbage collection logs

#![deny(missing_docs)]

mod analysis;
mod report;

use crate::{
    analysis::{Analysis, Assumptions, GclensError},
    report::{JsonLines, Summary},
};
use clap::{Parser, ValueEnum};
use gc_log_parser::CollectorFamily;
use std::{
    io::{self, Write},
    panic,
    path::{Path, PathBuf},
    process::ExitCode,
    thread,
};

/// Turn JVM garbage collection logs into a stream of structured events
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Print every event as a line of JSON instead of a summary
    #[clap(short, long)]
    json: bool,

    /// Collector that wrote the logs, when it cannot be inferred
    #[clap(short, long, value_enum)]
    collector: Option<Collector>,

    /// Logging flavor of the logs, when it cannot be inferred
    #[clap(short, long, value_enum)]
    format: Option<Format>,

    /// Number of leading lines used to infer the log configuration
    #[clap(long, default_value = "1000")]
    sniff_lines: usize,

    /// Maximal number of problems displayed per log
    #[clap(short = 'd', long, default_value = "10")]
    max_diagnostics: usize,

    /// GC logs to be analyzed
    #[clap(required = true)]
    inputs: Vec<PathBuf>,
}

/// Garbage collectors that write GC logs
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Collector {
    /// Serial collector (-XX:+UseSerialGC)
    Serial,

    /// Parallel collector (-XX:+UseParallelGC)
    Parallel,

    /// Concurrent Mark Sweep (-XX:+UseConcMarkSweepGC)
    Cms,

    /// Garbage First (-XX:+UseG1GC)
    G1,

    /// Z Garbage Collector (-XX:+UseZGC)
    Zgc,
}
//
impl From<Collector> for CollectorFamily {
    fn from(collector: Collector) -> Self {
        match collector {
            Collector::Serial => Self::Serial,
            Collector::Parallel => Self::Parallel,
            Collector::Cms => Self::Cms,
            Collector::G1 => Self::G1,
            Collector::Zgc => Self::Zgc,
        }
    }
}

/// Ways a JVM can write GC logs
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// JDK 9+ unified logging (-Xlog:gc*)
    Unified,

    /// Legacy logging (-XX:+PrintGCDetails and friends)
    PreUnified,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let assumptions = Assumptions {
        collector: args.collector.map(CollectorFamily::from),
        unified: args.format.map(|format| matches!(format, Format::Unified)),
        sniff_lines: args.sniff_lines,
    };

    // Parse every log on its own thread, then report in command line order
    let renders = thread::scope(|scope| {
        let workers = args
            .inputs
            .iter()
            .map(|path| scope.spawn(|| render(path, &assumptions, &args)))
            .collect::<Vec<_>>();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
            .collect::<Vec<_>>()
    });

    let mut status = ExitCode::SUCCESS;
    let mut stdout = io::stdout().lock();
    for render in renders {
        let outcome = render.and_then(|text| Ok(stdout.write_all(&text)?));
        if let Err(e) = outcome {
            eprintln!("error: {e}");
            status = ExitCode::FAILURE;
        }
    }
    status
}

/// Parse one log and render what should be printed about it
fn render(path: &Path, assumptions: &Assumptions, args: &Args) -> Result<Vec<u8>, GclensError> {
    if args.json {
        let Analysis {
            sink, diagnostics, ..
        } = analysis::analyze(path, assumptions, JsonLines::default())?;
        if !diagnostics.is_clean() {
            log::warn!(
                "{} problem(s) while parsing {}",
                diagnostics.entries().len(),
                path.display()
            );
        }
        sink.into_bytes().map_err(|source| GclensError::Serialize {
            path: path.to_owned(),
            source,
        })
    } else {
        let Analysis {
            dialect,
            sink,
            diagnostics,
            lines,
        } = analysis::analyze(path, assumptions, Summary::default())?;
        let mut text = Vec::new();
        writeln!(
            text,
            "=== {} ({dialect} log, {lines} lines) ===",
            path.display()
        )?;
        write!(text, "{sink}")?;
        report::write_diagnostics(&mut text, &diagnostics, args.max_diagnostics)?;
        writeln!(text)?;
        Ok(text)
    }
}
