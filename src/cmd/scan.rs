//! Scan command: report versioned comments without rewriting anything.

use crate::compression::Compression;
use crate::reassembler::LineAssembler;
use crate::scanner::unwrap::should_unwrap;
use crate::scanner::{CommentKind, Scanner, Segment};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use super::glob_util::resolve_inputs;

#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub version_threshold: u32,
    pub lines: u64,
    pub total_comments: u64,
    pub would_unwrap: u64,
    pub would_keep: u64,
    /// Block count per version.
    pub versions: BTreeMap<u32, u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unterminated: Vec<UnterminatedBlock>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UnterminatedBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    pub line: u64,
}

#[derive(Serialize)]
struct ScanJsonOutput {
    input_file: String,
    compression: String,
    #[serde(flatten)]
    report: ScanReport,
}

pub fn collect_report<R: Read>(mut reader: R, threshold: u32) -> io::Result<ScanReport> {
    let mut report = ScanReport {
        version_threshold: threshold,
        ..Default::default()
    };
    let mut lines = LineAssembler::new();
    let mut scanner = Scanner::new();

    let mut record = |seg: Segment<'_>| {
        if let Segment::Versioned(comment) = seg {
            report.total_comments += 1;
            *report.versions.entry(comment.version()).or_insert(0) += 1;
            if should_unwrap(comment.version(), threshold) {
                report.would_unwrap += 1;
            } else {
                report.would_keep += 1;
            }
        }
    };

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        lines.push(&buf[..n], |text| {
            scanner.feed(text, &mut record);
            Ok(())
        })?;
    }
    lines.finish(|text| {
        scanner.feed(text, &mut record);
        Ok(())
    })?;

    let open = scanner.finish(&mut record);
    report.lines = lines.lines();
    if let Some(open) = open {
        report.unterminated.push(UnterminatedBlock {
            version: match open.kind {
                CommentKind::Versioned(v) => Some(v),
                CommentKind::Plain => None,
            },
            line: open.line,
        });
    }
    Ok(report)
}

pub fn run(file: PathBuf, threshold: u32, json: bool) -> anyhow::Result<()> {
    let inputs = resolve_inputs(&file)?;
    let mut outputs = Vec::new();

    for path in &inputs.paths {
        let compression = Compression::from_path(path);
        let reader = compression.wrap_reader(Box::new(File::open(path)?))?;
        let report = collect_report(reader, threshold)?;

        if json {
            outputs.push(ScanJsonOutput {
                input_file: path.display().to_string(),
                compression: compression.to_string(),
                report,
            });
        } else {
            print_report(path, &report);
        }
    }

    if json {
        if inputs.from_glob {
            println!("{}", serde_json::to_string_pretty(&outputs)?);
        } else if let Some(output) = outputs.first() {
            println!("{}", serde_json::to_string_pretty(output)?);
        }
    }
    Ok(())
}

fn print_report(path: &std::path::Path, report: &ScanReport) {
    println!("{}:", path.display());
    println!("  Lines: {}", report.lines);
    println!("  Versioned comments: {}", report.total_comments);
    println!(
        "  Would unwrap (< {}): {}",
        report.version_threshold, report.would_unwrap
    );
    println!("  Would keep: {}", report.would_keep);

    if !report.versions.is_empty() {
        println!("\n  By version:");
        for (version, count) in &report.versions {
            let action = if should_unwrap(*version, report.version_threshold) {
                "unwrap"
            } else {
                "keep"
            };
            println!("    {:>6}  {:>8}  {}", version, count, action);
        }
    }

    for block in &report.unterminated {
        match block.version {
            Some(v) => println!("\n  ⚠ Unterminated versioned comment {} opened at line {}", v, block.line),
            None => println!("\n  ⚠ Unterminated comment opened at line {}", block.line),
        }
    }
    println!();
}
