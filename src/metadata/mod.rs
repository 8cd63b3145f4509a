//! Table metadata used to complete CREATE TABLE options.
//!
//! The side file is a tab-separated export of `information_schema.TABLES`:
//!
//! ```text
//! TABLE_SCHEMA  TABLE_NAME  ENGINE  ROW_FORMAT  TABLE_COLLATION
//! shop          orders      InnoDB  Dynamic     utf8mb4_unicode_ci
//! ```
//!
//! The header row is optional and extra columns are ignored. Empty cells and
//! `NULL` mean "unknown".

use ahash::AHashMap;
use smallvec::SmallVec;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableInfo {
    pub engine: Option<String>,
    pub row_format: Option<String>,
    pub collation: Option<String>,
}

impl TableInfo {
    /// Character set implied by the collation (`utf8mb4_unicode_ci` -> `utf8mb4`).
    pub fn charset(&self) -> Option<&str> {
        let collation = self.collation.as_deref()?;
        Some(collation.split('_').next().unwrap_or(collation))
    }

    /// Names of the fields augmentation cannot do without.
    pub fn missing_required(&self) -> SmallVec<[&'static str; 2]> {
        let mut missing = SmallVec::new();
        if self.engine.is_none() {
            missing.push("engine");
        }
        if self.collation.is_none() {
            missing.push("collation");
        }
        missing
    }
}

/// Result of looking up a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found { schema: &'a str, info: &'a TableInfo },
    Missing,
    /// Unqualified name present in this many schemas.
    Ambiguous(usize),
}

/// Read-only `(schema, table) -> TableInfo` map.
#[derive(Debug, Clone, Default)]
pub struct TableMetadata {
    schemas: AHashMap<String, AHashMap<String, TableInfo>>,
    tables: usize,
}

impl TableMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, schema: &str, table: &str, info: TableInfo) {
        let previous = self
            .schemas
            .entry(schema.to_string())
            .or_default()
            .insert(table.to_string(), info);
        if previous.is_none() {
            self.tables += 1;
        }
    }

    pub fn get(&self, schema: &str, table: &str) -> Option<&TableInfo> {
        self.schemas.get(schema)?.get(table)
    }

    /// Look a table up in `schema`, or across all schemas when none is known.
    pub fn resolve(&self, schema: Option<&str>, table: &str) -> Lookup<'_> {
        if let Some(schema) = schema {
            return match self.schemas.get_key_value(schema) {
                Some((name, tables)) => match tables.get(table) {
                    Some(info) => Lookup::Found { schema: name, info },
                    None => Lookup::Missing,
                },
                None => Lookup::Missing,
            };
        }

        let mut hits = self
            .schemas
            .iter()
            .filter_map(|(name, tables)| tables.get(table).map(|info| (name, info)));
        match (hits.next(), hits.count()) {
            (None, _) => Lookup::Missing,
            (Some((schema, info)), 0) => Lookup::Found { schema, info },
            (Some(_), more) => Lookup::Ambiguous(more + 1),
        }
    }

    /// The schema shared by every row, if there is exactly one.
    pub fn single_schema(&self) -> Option<&str> {
        if self.schemas.len() == 1 {
            self.schemas.keys().next().map(String::as_str)
        } else {
            None
        }
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables
    }

    pub fn is_empty(&self) -> bool {
        self.tables == 0
    }

    pub fn load_tsv(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_tsv_reader(BufReader::new(file))?)
    }

    pub fn from_tsv_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut metadata = Self::new();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 5 || cols[0].eq_ignore_ascii_case("TABLE_SCHEMA") {
                continue;
            }

            let info = TableInfo {
                engine: cell(cols[2]),
                row_format: cell(cols[3]).map(|v| v.to_uppercase()),
                collation: cell(cols[4]),
            };
            metadata.insert(cols[0].trim(), cols[1].trim(), info);
        }

        Ok(metadata)
    }
}

fn cell(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("NULL") {
        None
    } else {
        Some(value.to_string())
    }
}
