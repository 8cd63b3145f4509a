//! Stream driver.
//!
//! [`CleanSession`] is the push-based core: feed it byte chunks of any size
//! and it writes cleaned SQL as soon as each statement is complete.
//! [`Cleaner`] drives a session over a dump file, handling decompression,
//! progress, the optional prelude and cancellation.

pub mod config;

use crate::compression::Compression;
use crate::metadata::TableMetadata;
use crate::progress::{Progress, ProgressReader, ProgressReporter};
use crate::reassembler::{LineAssembler, StatementAssembler};
use crate::rewrite::{
    CreateTableAugment, DdlSanitize, DropSuppress, Pipeline, PipelineState, TimeZoneNormalize,
};
use crate::scanner::unwrap::{CollapseMode, Unwrapper, DEFAULT_VERSION_THRESHOLD};
use crate::scanner::{CommentKind, Scanner};
use crate::warnings::CleanWarning;
use crate::writer::DumpWriter;
use serde::Serialize;
use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const SMALL_BUFFER_SIZE: usize = 64 * 1024;
pub const MEDIUM_BUFFER_SIZE: usize = 256 * 1024;

pub fn determine_buffer_size(file_size: u64) -> usize {
    if file_size > 1024 * 1024 * 1024 {
        MEDIUM_BUFFER_SIZE
    } else {
        SMALL_BUFFER_SIZE
    }
}

/// Values that control a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOptions {
    /// Versioned comments below this are unwrapped.
    pub version_threshold: u32,
    /// Remove DROP statements.
    pub no_drop: bool,
    /// Reset AUTO_INCREMENT counters and dump timestamps.
    pub ddl_sanitize: bool,
    /// Schema used for metadata lookups until a `USE` is seen.
    pub default_schema: Option<String>,
    pub collapse: CollapseMode,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            version_threshold: DEFAULT_VERSION_THRESHOLD,
            no_drop: false,
            ddl_sanitize: false,
            default_schema: None,
            collapse: CollapseMode::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub lines: u64,
    pub statements: u64,
    pub comments_unwrapped: u64,
    pub comments_kept: u64,
    pub semicolons_reattached: u64,
    pub tables_augmented: u64,
    pub time_zones_normalized: u64,
    pub drops_suppressed: u64,
    pub values_sanitized: u64,
    pub cancelled: bool,
    pub warnings: Vec<CleanWarning>,
    /// Warnings beyond the collector limit, counted but not listed.
    pub warnings_truncated: usize,
}

/// Scanner, unwrapper, statement assembler and rewrite pipeline in series.
struct Stages {
    scanner: Scanner,
    unwrapper: Unwrapper,
    statements: StatementAssembler,
    pipeline: Pipeline,
    /// Unwrapper output not yet handed to the statement assembler.
    scratch: String,
    bytes_written: u64,
}

impl Stages {
    fn feed<W: Write>(&mut self, text: &str, out: &mut W) -> io::Result<()> {
        let Self {
            scanner,
            unwrapper,
            scratch,
            ..
        } = self;
        scanner.feed(text, |seg| unwrapper.accept(seg, scratch));
        self.drain(out)
    }

    fn drain<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let Self {
            statements,
            pipeline,
            scratch,
            bytes_written,
            ..
        } = self;
        statements.push(scratch, |unit| {
            let text = pipeline.process(unit);
            *bytes_written += text.len() as u64;
            out.write_all(text.as_bytes())
        })?;
        scratch.clear();
        Ok(())
    }

    fn finish<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let Self {
            scanner,
            unwrapper,
            scratch,
            ..
        } = self;
        let open = scanner.finish(|seg| unwrapper.accept(seg, scratch));
        unwrapper.finish(scratch);
        self.drain(out)?;

        let Self {
            statements,
            pipeline,
            bytes_written,
            ..
        } = self;
        let unterminated = statements.finish(|unit| {
            let text = pipeline.process(unit);
            *bytes_written += text.len() as u64;
            out.write_all(text.as_bytes())
        })?;

        let warnings = &mut pipeline.state_mut().warnings;
        if let Some(open) = open {
            let version = match open.kind {
                CommentKind::Versioned(v) => Some(v),
                CommentKind::Plain => None,
            };
            warnings.add(CleanWarning::UnterminatedComment {
                version,
                line: open.line,
            });
        }
        if let Some(preview) = unterminated {
            warnings.add(CleanWarning::UnterminatedStatement { preview });
        }
        Ok(())
    }
}

/// Push-based cleaning of one stream.
pub struct CleanSession<W: Write> {
    lines: LineAssembler,
    stages: Stages,
    out: W,
    bytes_read: u64,
}

impl<W: Write> CleanSession<W> {
    pub fn new(options: &CleanOptions, metadata: Arc<TableMetadata>, out: W) -> Self {
        let state = PipelineState::new(metadata, options.default_schema.clone());
        let mut pipeline = Pipeline::new(state)
            .with_stage(CreateTableAugment::new())
            .with_stage(TimeZoneNormalize::new());
        if options.no_drop {
            pipeline = pipeline.with_stage(DropSuppress::new());
        }
        if options.ddl_sanitize {
            pipeline = pipeline.with_stage(DdlSanitize::new());
        }

        Self {
            lines: LineAssembler::new(),
            stages: Stages {
                scanner: Scanner::new(),
                unwrapper: Unwrapper::new(options.version_threshold)
                    .with_collapse(options.collapse),
                statements: StatementAssembler::new(),
                pipeline,
                scratch: String::new(),
                bytes_written: 0,
            },
            out,
            bytes_read: 0,
        }
    }

    /// Names of the active rewrite stages, in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.pipeline.stage_names()
    }

    /// Record a warning raised outside the stream itself.
    pub fn warn(&mut self, warning: CleanWarning) {
        self.stages.pipeline.state_mut().warnings.add(warning);
    }

    /// Write text verbatim ahead of the cleaned stream.
    pub fn write_prelude(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.stages.bytes_written += text.len() as u64;
        Ok(())
    }

    pub fn push(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.bytes_read += chunk.len() as u64;
        let Self {
            lines, stages, out, ..
        } = self;
        lines.push(chunk, |text| stages.feed(text, out))
    }

    /// Flush everything still buffered and return the stats and the sink.
    pub fn finish(mut self) -> io::Result<(CleanStats, W)> {
        let Self {
            lines, stages, out, ..
        } = &mut self;
        lines.finish(|text| stages.feed(text, out))?;
        stages.finish(out)?;
        self.out.flush()?;

        let unwrap = self.stages.unwrapper.stats();
        let statements = self.stages.statements.statements();
        let state = self.stages.pipeline.into_state();
        let stats = CleanStats {
            bytes_read: self.bytes_read,
            bytes_written: self.stages.bytes_written,
            lines: self.lines.lines(),
            statements,
            comments_unwrapped: unwrap.unwrapped,
            comments_kept: unwrap.kept,
            semicolons_reattached: unwrap.reattached,
            tables_augmented: state.stats.tables_augmented,
            time_zones_normalized: state.stats.time_zones_normalized,
            drops_suppressed: state.stats.drops_suppressed,
            values_sanitized: state.stats.values_sanitized,
            cancelled: false,
            warnings_truncated: state.warnings.dropped(),
            warnings: state.warnings.into_warnings(),
        };
        Ok((stats, self.out))
    }
}

/// Clean an in-memory dump.
pub fn clean_bytes(
    input: &[u8],
    options: &CleanOptions,
    metadata: Arc<TableMetadata>,
) -> io::Result<(Vec<u8>, CleanStats)> {
    let mut session = CleanSession::new(options, metadata, Vec::with_capacity(input.len()));
    session.push(input)?;
    let (stats, out) = session.finish()?;
    Ok((out, stats))
}

#[derive(Default)]
pub struct CleanerConfig {
    pub options: CleanOptions,
    pub metadata: Option<Arc<TableMetadata>>,
    pub metadata_file: Option<PathBuf>,
    pub db_name: Option<String>,
    pub prepend_file: Option<PathBuf>,
    pub dry_run: bool,
    pub chunk_size: Option<usize>,
    pub progress_fn: Option<Box<dyn FnMut(Progress)>>,
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Cleans one dump file.
pub struct Cleaner {
    input: PathBuf,
    /// `None` writes to stdout.
    output: Option<PathBuf>,
    config: CleanerConfig,
}

impl Cleaner {
    pub fn new(input: PathBuf, output: Option<PathBuf>) -> Self {
        Self {
            input,
            output,
            config: CleanerConfig::default(),
        }
    }

    pub fn with_options(mut self, options: CleanOptions) -> Self {
        self.config.options = options;
        self
    }

    pub fn with_metadata(mut self, metadata: Arc<TableMetadata>) -> Self {
        self.config.metadata = Some(metadata);
        self
    }

    /// Load metadata from a TSV file when the run starts. A missing file only
    /// produces a warning.
    pub fn with_metadata_file(mut self, path: PathBuf) -> Self {
        self.config.metadata_file = Some(path);
        self
    }

    /// Start the output with ``USE `name`;``.
    pub fn with_db_name(mut self, name: String) -> Self {
        self.config.db_name = Some(name);
        self
    }

    pub fn with_prepend_file(mut self, path: PathBuf) -> Self {
        self.config.prepend_file = Some(path);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = Some(size.max(1));
        self
    }

    pub fn with_progress<F: FnMut(Progress) + 'static>(mut self, f: F) -> Self {
        self.config.progress_fn = Some(Box::new(f));
        self
    }

    /// Checked between reads; once set the run flushes and stops.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.config.cancel = Some(flag);
        self
    }

    pub fn clean(mut self) -> anyhow::Result<CleanStats> {
        let file = File::open(&self.input)?;
        let file_size = file.metadata()?.len();
        let chunk_size = self
            .config
            .chunk_size
            .unwrap_or_else(|| determine_buffer_size(file_size));

        let mut warnings = Vec::new();
        let metadata = self.load_metadata(&mut warnings)?;

        let mut options = self.config.options.clone();
        if options.default_schema.is_none() {
            options.default_schema = self
                .config
                .db_name
                .clone()
                .or_else(|| metadata.single_schema().map(String::from));
        }

        let compression = Compression::from_path(&self.input);
        let reporter = self
            .config
            .progress_fn
            .take()
            .map(|cb| Rc::new(RefCell::new(ProgressReporter::new(file_size, cb))));
        let mut reader: Box<dyn Read> = match &reporter {
            Some(reporter) => {
                let reporter = Rc::clone(reporter);
                let progress_reader =
                    ProgressReader::new(file, move |bytes| reporter.borrow_mut().report(bytes));
                compression.wrap_reader(Box::new(progress_reader))?
            }
            None => compression.wrap_reader(Box::new(file))?,
        };

        let writer = if self.config.dry_run {
            DumpWriter::sink()
        } else {
            match &self.output {
                Some(path) => DumpWriter::to_file(path)?,
                None => DumpWriter::to_stdout(),
            }
        };

        let mut session = CleanSession::new(&options, metadata, writer);
        for warning in warnings {
            session.warn(warning);
        }
        if let Some(db) = &self.config.db_name {
            session.write_prelude(&format!("USE `{}`;\n\n", db))?;
        }
        if let Some(path) = &self.config.prepend_file {
            let mut content = fs::read_to_string(path)?;
            if !content.ends_with('\n') {
                content.push('\n');
            }
            session.write_prelude(&content)?;
        }

        let mut buf = vec![0u8; chunk_size];
        let mut cancelled = false;
        loop {
            if let Some(flag) = &self.config.cancel {
                if flag.load(Ordering::Relaxed) {
                    cancelled = true;
                    break;
                }
            }
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            session.push(&buf[..n])?;
        }

        let (mut stats, writer) = session.finish()?;
        stats.bytes_written = writer.finish()?;
        stats.cancelled = cancelled;
        if !cancelled {
            if let Some(reporter) = &reporter {
                reporter.borrow_mut().complete();
            }
        }
        Ok(stats)
    }

    fn load_metadata(&mut self, warnings: &mut Vec<CleanWarning>) -> anyhow::Result<Arc<TableMetadata>> {
        if let Some(metadata) = self.config.metadata.take() {
            return Ok(metadata);
        }
        match &self.config.metadata_file {
            Some(path) if path.is_file() => Ok(Arc::new(TableMetadata::load_tsv(path)?)),
            Some(path) => {
                warnings.push(CleanWarning::MetadataFileMissing {
                    path: path.display().to_string(),
                });
                Ok(Arc::new(TableMetadata::new()))
            }
            None => Ok(Arc::new(TableMetadata::new())),
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }
}
