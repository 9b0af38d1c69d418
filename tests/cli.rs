//! Tests of the gclens command line interface

use std::{
    io::Write,
    process::{Command, Output},
};
use tempfile::NamedTempFile;

/// Write a GC log to a temporary file
fn log_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temporary file");
    for line in lines {
        writeln!(file, "{line}").expect("Failed to write log");
    }
    file
}

/// Run gclens with some arguments
fn gclens(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gclens"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to run gclens")
}

const CMS_LOG: &[&str] = &[
    "62.616: [GC 62.616: [ParNew: 5033216K->129451K(5662336K), 0.2536590 secs] 5097075K->193310K(24536704K), 0.2538510 secs]",
    "63.000: [GC 63.000: [ParNew: 5033216K->129451K(5662336K), 0.1000000 secs] 5097075K->193310K(24536704K), 0.1001000 secs]",
];

#[test]
fn json_lines() {
    let log = log_file(CMS_LOG);
    let path = log.path().to_str().expect("Temporary path is not UTF-8");
    let output = gclens(&["--json", path]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("Output is not UTF-8");
    let types = stdout
        .lines()
        .map(|line| {
            let event = serde_json::from_str::<serde_json::Value>(line).expect("Bad JSON line");
            event["type"].as_str().map(str::to_owned)
        })
        .collect::<Vec<_>>();
    assert_eq!(
        types,
        vec![
            Some("Pause".to_owned()),
            Some("Pause".to_owned()),
            Some("Termination".to_owned())
        ]
    );
}

#[test]
fn summaries_in_command_line_order() {
    let cms = log_file(CMS_LOG);
    let unknown = log_file(&["this is not a GC log"]);
    let zgc = log_file(&[
        "[0.020s][info][gc,init] Initializing The Z Garbage Collector",
        "[2.000s][info][gc      ] GC(1) Garbage Collection (Timer) 50M(1%)->30M(1%)",
    ]);
    let paths = [&cms, &unknown, &zgc].map(|file| {
        file.path()
            .to_str()
            .expect("Temporary path is not UTF-8")
            .to_owned()
    });
    let output = gclens(&[&paths[0], &paths[1], &paths[2]]);
    assert!(!output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("Output is not UTF-8");
    let cms_header = stdout
        .find("(generational log, 2 lines)")
        .expect("Missing CMS log summary");
    let zgc_header = stdout
        .find("(ZGC log, 2 lines)")
        .expect("Missing ZGC log summary");
    assert!(cms_header < zgc_header);
    assert!(stdout.contains("- ParNew: 2 event(s), 0.354s total, 0.254s max"));
    assert!(stdout.contains("- ZGC Cycle: 1 event(s)"));

    let stderr = String::from_utf8(output.stderr).expect("Errors are not UTF-8");
    assert!(stderr.contains("could not identify the garbage collector"));
}

#[test]
fn collector_override() {
    let log = log_file(&["1.000: [GC (Allocation Failure)  8192K->1024K(31744K), 0.0050000 secs]"]);
    let path = log.path().to_str().expect("Temporary path is not UTF-8");
    assert!(!gclens(&[path]).status.success());

    let output = gclens(&["--collector", "serial", "--format", "pre-unified", path]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("Output is not UTF-8");
    assert!(stdout.contains("- DefNew: 1 event(s)"));
    assert!(stdout.contains("Diagnostics: 0 problem(s)"));
}

#[test]
fn missing_input() {
    let output = gclens(&["/this/log/does/not/exist.log"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("Errors are not UTF-8");
    assert!(stderr.contains("failed to open /this/log/does/not/exist.log"));
}
