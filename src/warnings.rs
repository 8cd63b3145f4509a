//! Warnings raised while cleaning a dump.
//!
//! None of these stop a run. The affected text passes through unchanged and
//! the warning is collected for the end-of-run summary.

use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CleanWarning {
    /// A block comment was still open at end of input
    UnterminatedComment {
        /// Version of the open block; `None` for a plain comment
        version: Option<u32>,
        line: u64,
    },
    /// Input ended in the middle of a statement
    UnterminatedStatement { preview: String },
    /// No metadata row for a CREATE TABLE
    MissingTableMetadata {
        schema: Option<String>,
        table: String,
    },
    /// Metadata row lacks engine or collation
    IncompleteTableMetadata {
        schema: String,
        table: String,
        missing: Vec<&'static str>,
    },
    /// Unqualified table name found in several schemas
    AmbiguousTable { table: String, candidates: usize },
    /// The metadata side file could not be found
    MetadataFileMissing { path: String },
}

impl std::fmt::Display for CleanWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleanWarning::UnterminatedComment { version, line } => match version {
                Some(v) => write!(
                    f,
                    "Unterminated versioned comment /*!{} opened on line {}; flushed as-is",
                    v, line
                ),
                None => write!(
                    f,
                    "Unterminated comment opened on line {}; flushed as-is",
                    line
                ),
            },
            CleanWarning::UnterminatedStatement { preview } => {
                write!(f, "Input ended inside a statement ({})", preview)
            }
            CleanWarning::MissingTableMetadata { schema, table } => match schema {
                Some(s) => write!(f, "No table metadata for {}.{}", s, table),
                None => write!(f, "No table metadata for {} (no schema selected)", table),
            },
            CleanWarning::IncompleteTableMetadata {
                schema,
                table,
                missing,
            } => write!(
                f,
                "Incomplete table metadata for {}.{} (missing {})",
                schema,
                table,
                missing.join(", ")
            ),
            CleanWarning::AmbiguousTable { table, candidates } => write!(
                f,
                "Table {} exists in {} schemas; use --default-schema to pick one",
                table, candidates
            ),
            CleanWarning::MetadataFileMissing { path } => {
                write!(f, "Table metadata file not found: {}", path)
            }
        }
    }
}

/// Collects warnings during a run
#[derive(Debug)]
pub struct WarningCollector {
    warnings: Vec<CleanWarning>,
    max_warnings: usize,
    dropped: usize,
}

impl Default for WarningCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl WarningCollector {
    pub fn new() -> Self {
        Self::with_limit(100)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            warnings: Vec::new(),
            max_warnings: limit,
            dropped: 0,
        }
    }

    /// Add a warning; exact duplicates are ignored
    pub fn add(&mut self, warning: CleanWarning) {
        if self.warnings.contains(&warning) {
            return;
        }
        if self.warnings.len() < self.max_warnings {
            self.warnings.push(warning);
        } else {
            self.dropped += 1;
        }
    }

    pub fn warnings(&self) -> &[CleanWarning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn count(&self) -> usize {
        self.warnings.len()
    }

    /// Warnings not kept because the limit was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn into_warnings(self) -> Vec<CleanWarning> {
        self.warnings
    }
}

/// Write the end-of-run warning list. `truncated` counts warnings that did
/// not fit under the collector limit.
pub fn write_summary<W: Write>(
    out: &mut W,
    warnings: &[CleanWarning],
    truncated: usize,
) -> io::Result<()> {
    if warnings.is_empty() {
        return Ok(());
    }

    writeln!(out, "\nWarnings ({}):", warnings.len())?;
    for warning in warnings {
        writeln!(out, "  ⚠ {}", warning)?;
    }

    if truncated > 0 {
        writeln!(out, "  ... ({} additional warnings truncated)", truncated)?;
    }
    Ok(())
}

pub fn print_summary(warnings: &[CleanWarning], truncated: usize) {
    let _ = write_summary(&mut io::stderr().lock(), warnings, truncated);
}
