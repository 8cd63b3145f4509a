//! Clean command CLI handler.

use crate::cleaner::config::CleanYamlConfig;
use crate::cleaner::{CleanOptions, CleanStats, Cleaner};
use crate::compression::Compression;
use crate::scanner::unwrap::CollapseMode;
use crate::warnings;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::glob_util::{output_path_for, resolve_inputs, BatchSummary};

#[derive(Args, Debug)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m
  sql-cleaner clean dump.sql -o clean.sql
  sql-cleaner clean dump.sql.gz -o clean.sql --db-name shop -m tables-meta.tsv
  sql-cleaner clean dump.sql --no-drop --ddl-sanitize > clean.sql
  sql-cleaner clean \"dumps/*.sql\" -o cleaned/ --fail-fast
  sql-cleaner clean dump.sql -c clean.yaml --dry-run --json")]
pub struct CleanArgs {
    /// Input SQL file or glob pattern (e.g., *.sql, dumps/**/*.sql)
    /// Supports .gz, .bz2, .xz, .zst compression
    pub file: PathBuf,

    /// Output file, or output directory for glob patterns (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// YAML config file; command line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Versioned comments below this version are unwrapped [default: 80000]
    #[arg(long)]
    pub version_threshold: Option<u32>,

    /// Remove DROP statements
    #[arg(long)]
    pub no_drop: bool,

    /// Reset AUTO_INCREMENT counters and strip dump timestamps
    #[arg(long)]
    pub ddl_sanitize: bool,

    /// Schema used for metadata lookups until a USE statement is seen
    #[arg(long)]
    pub default_schema: Option<String>,

    /// Start the output with USE `<name>`;
    #[arg(long, visible_alias = "db")]
    pub db_name: Option<String>,

    /// Table metadata TSV (TABLE_SCHEMA, TABLE_NAME, ENGINE, ROW_FORMAT, TABLE_COLLATION)
    #[arg(short, long)]
    pub metadata: Option<PathBuf>,

    /// SQL file copied verbatim to the top of the output
    #[arg(long)]
    pub prepend_file: Option<PathBuf>,

    /// Blank-line collapse after a reattached semicolon: off, lf, any
    #[arg(long)]
    pub collapse: Option<String>,

    /// Show progress bar
    #[arg(short, long)]
    pub progress: bool,

    /// Process the input but write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Output statistics as JSON
    #[arg(long)]
    pub json: bool,

    /// Stop on first error (for glob patterns)
    #[arg(long)]
    pub fail_fast: bool,
}

/// JSON output for a clean run.
#[derive(Serialize)]
struct CleanJsonOutput {
    input_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_file: Option<String>,
    compression: String,
    dry_run: bool,
    elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    throughput_mb_per_sec: Option<f64>,
    statistics: CleanStats,
}

/// Everything a single file run needs, after merging flags with the config file.
#[derive(Debug, Clone)]
struct Settings {
    options: CleanOptions,
    db_name: Option<String>,
    metadata: Option<PathBuf>,
    prepend_file: Option<PathBuf>,
}

impl Settings {
    fn resolve(args: &CleanArgs) -> anyhow::Result<Self> {
        let yaml = match &args.config {
            Some(path) => CleanYamlConfig::load(path)
                .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", path.display(), e))?,
            None => CleanYamlConfig::default(),
        };

        let mut options = yaml.options();
        if let Some(threshold) = args.version_threshold {
            options.version_threshold = threshold;
        }
        options.no_drop |= args.no_drop;
        options.ddl_sanitize |= args.ddl_sanitize;
        if args.default_schema.is_some() {
            options.default_schema = args.default_schema.clone();
        }
        if let Some(mode) = &args.collapse {
            options.collapse = mode
                .parse::<CollapseMode>()
                .map_err(|e| anyhow::anyhow!("{}", e))?;
        }

        Ok(Self {
            options,
            db_name: args.db_name.clone().or(yaml.db_name),
            metadata: args.metadata.clone().or(yaml.metadata),
            prepend_file: args.prepend_file.clone().or(yaml.prepend_file),
        })
    }

    fn cleaner(&self, input: PathBuf, output: Option<PathBuf>, dry_run: bool) -> Cleaner {
        let mut cleaner = Cleaner::new(input, output)
            .with_options(self.options.clone())
            .with_dry_run(dry_run);
        if let Some(path) = &self.metadata {
            cleaner = cleaner.with_metadata_file(path.clone());
        }
        if let Some(db) = &self.db_name {
            cleaner = cleaner.with_db_name(db.clone());
        }
        if let Some(path) = &self.prepend_file {
            cleaner = cleaner.with_prepend_file(path.clone());
        }
        cleaner
    }
}

pub fn run(args: CleanArgs) -> anyhow::Result<()> {
    let settings = Settings::resolve(&args)?;
    let inputs = resolve_inputs(&args.file)?;

    if inputs.is_single() {
        return run_single(args.file.clone(), &args, &settings);
    }

    let output_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => {
            anyhow::bail!("Output directory required when using glob patterns. Use --output <dir>");
        }
    };
    run_multi(inputs.paths, output_dir, &args, &settings)
}

fn run_single(file: PathBuf, args: &CleanArgs, settings: &Settings) -> anyhow::Result<()> {
    let file_size = std::fs::metadata(&file)?.len();
    let compression = Compression::from_path(&file);
    let mut cleaner = settings.cleaner(file.clone(), args.output.clone(), args.dry_run);

    let start_time = Instant::now();

    let stats = if args.progress && !args.json {
        let pb = ProgressBar::new(file_size);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {msg}",
            )
            .unwrap()
            .progress_chars("█▓▒░  ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        let pb_clone = pb.clone();
        cleaner = cleaner.with_progress(move |p| pb_clone.set_position(p.bytes));

        let stats = cleaner.clean()?;
        pb.finish_with_message("done");
        stats
    } else {
        cleaner.clean()?
    };

    let elapsed = start_time.elapsed();

    if args.json {
        let throughput = if elapsed.as_secs_f64() > 0.0 {
            Some(stats.bytes_read as f64 / (1024.0 * 1024.0) / elapsed.as_secs_f64())
        } else {
            None
        };
        let output = CleanJsonOutput {
            input_file: file.display().to_string(),
            output_file: args.output.as_ref().map(|p| p.display().to_string()),
            compression: compression.to_string(),
            dry_run: args.dry_run,
            elapsed_secs: elapsed.as_secs_f64(),
            throughput_mb_per_sec: throughput,
            statistics: stats,
        };
        let text = serde_json::to_string_pretty(&output)?;
        // Stdout carries the SQL when there is no output file.
        if args.output.is_none() && !args.dry_run {
            eprintln!("{}", text);
        } else {
            println!("{}", text);
        }
        return Ok(());
    }

    print_stats(&stats, args.dry_run, args.progress, elapsed.as_secs_f64());
    Ok(())
}

fn run_multi(
    files: Vec<PathBuf>,
    output_dir: PathBuf,
    args: &CleanArgs,
    settings: &Settings,
) -> anyhow::Result<()> {
    let total = files.len();
    let mut summary = BatchSummary::new(total);
    let mut json_results = Vec::new();

    if !args.dry_run {
        std::fs::create_dir_all(&output_dir)?;
    }

    if !args.json {
        eprintln!("Cleaning {} files...\n", total);
    }

    for (idx, file) in files.iter().enumerate() {
        if !args.json {
            eprintln!("[{}/{}] Cleaning: {}", idx + 1, total, file.display());
        }

        let output_file = output_path_for(file, &output_dir, idx);
        let start_time = Instant::now();

        match clean_one(file, &output_file, args, settings) {
            Ok(stats) => {
                if args.json {
                    json_results.push(CleanJsonOutput {
                        input_file: file.display().to_string(),
                        output_file: (!args.dry_run).then(|| output_file.display().to_string()),
                        compression: Compression::from_path(file).to_string(),
                        dry_run: args.dry_run,
                        elapsed_secs: start_time.elapsed().as_secs_f64(),
                        throughput_mb_per_sec: None,
                        statistics: stats,
                    });
                } else {
                    let warning_str = if stats.warnings.is_empty() {
                        String::new()
                    } else {
                        format!(" ({} warnings)", stats.warnings.len())
                    };
                    eprintln!(
                        "  {:.2} MB → {} unwrapped, {} kept, {} tables augmented{}",
                        stats.bytes_read as f64 / (1024.0 * 1024.0),
                        stats.comments_unwrapped,
                        stats.comments_kept,
                        stats.tables_augmented,
                        warning_str
                    );
                    if !args.dry_run {
                        eprintln!("  → {}", output_file.display());
                    }
                    eprintln!();
                }
                summary.succeeded();
            }
            Err(e) => {
                eprintln!("  Error: {}\n", e);
                summary.failed(file, &e);
                if args.fail_fast {
                    break;
                }
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&json_results)?);
    } else {
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Clean Summary:");
        eprintln!("  Total files: {}", summary.total);
        eprintln!("  Succeeded: {}", summary.ok);
        eprintln!("  Failed: {}", summary.failed_count());
        if args.dry_run {
            eprintln!();
            eprintln!("(Dry run - no output written)");
        }
    }

    if summary.failed_count() > 0 {
        eprintln!();
        eprintln!("Failed files:");
        for (path, error) in &summary.failures {
            eprintln!("  - {}: {}", path.display(), error);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn clean_one(
    file: &Path,
    output_file: &Path,
    args: &CleanArgs,
    settings: &Settings,
) -> anyhow::Result<CleanStats> {
    settings
        .cleaner(file.to_path_buf(), Some(output_file.to_path_buf()), args.dry_run)
        .clean()
}

fn print_stats(stats: &CleanStats, dry_run: bool, progress: bool, elapsed_secs: f64) {
    if progress || dry_run {
        eprintln!();
        eprintln!("Clean Statistics:");
        eprintln!("  Lines read: {}", stats.lines);
        eprintln!("  Statements: {}", stats.statements);
        eprintln!("  Comments unwrapped: {}", stats.comments_unwrapped);
        eprintln!("  Comments kept: {}", stats.comments_kept);
        eprintln!("  Semicolons reattached: {}", stats.semicolons_reattached);
        eprintln!("  Tables augmented: {}", stats.tables_augmented);
        eprintln!("  Time zones normalized: {}", stats.time_zones_normalized);
        eprintln!("  DROP statements removed: {}", stats.drops_suppressed);
        eprintln!("  Values sanitized: {}", stats.values_sanitized);
        eprintln!(
            "  Bytes: {:.2} MB in, {:.2} MB out",
            stats.bytes_read as f64 / (1024.0 * 1024.0),
            stats.bytes_written as f64 / (1024.0 * 1024.0)
        );
        eprintln!("  Elapsed time: {:.3}s", elapsed_secs);
    }

    warnings::print_summary(&stats.warnings, stats.warnings_truncated);

    if dry_run {
        eprintln!();
        eprintln!("(Dry run - no output written)");
    }
}
