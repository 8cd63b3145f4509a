//! CREATE TABLE option augmentation.
//!
//! Adds `ENGINE=`, `ROW_FORMAT=`, `DEFAULT CHARSET=` and `COLLATE=` from the
//! table metadata when a statement lacks them. Existing options are never
//! touched. The options looked at are the ones on the line holding the
//! parenthesis that closes the column list; anything after that line (for
//! example an unwrapped `PARTITION BY`) stays where it is.

use super::{find_top_level, matching_paren, skip_guards, PipelineState, RewriteStage};
use crate::lexer;
use crate::metadata::{Lookup, TableInfo};
use crate::reassembler::UnitMeta;
use crate::warnings::CleanWarning;
use ahash::AHashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static USE_DB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\AUSE\s+(?:`([^`]+)`|([A-Za-z0-9_$]+))\s*;").unwrap()
});

static DROP_VIEW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\ADROP\s+VIEW\s+IF\s+EXISTS\s+`([^`]+)`").unwrap());

static CREATE_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\ACREATE\s+(?:TEMPORARY\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:(?:`([^`]+)`|(\w+))\s*\.\s*)?(?:`([^`]+)`|(\w+))",
    )
    .unwrap()
});

static ENGINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bENGINE\s*=").unwrap());

static ROW_FORMAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bROW_FORMAT\s*=").unwrap());

static CHARSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:CHARSET|CHARACTER\s+SET)\b").unwrap());

static COLLATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bCOLLATE\b").unwrap());

/// What the create-table stage carries from one statement to the next.
/// Statement text is gathered by the statement assembler, so only the view
/// placeholder marks outlive a unit.
#[derive(Debug, Default)]
pub struct CreateTableAccumulator {
    /// Names seen in `DROP VIEW IF EXISTS`; the next CREATE TABLE of each is
    /// the placeholder mysqldump writes before the real view.
    pub view_shadow_tables: AHashSet<String>,
}

impl CreateTableAccumulator {
    fn mark_view_shadow(&mut self, table: &str) {
        self.view_shadow_tables.insert(table.to_string());
    }

    /// Consume a pending placeholder mark for `table`.
    fn take_view_shadow(&mut self, table: &str) -> bool {
        self.view_shadow_tables.remove(table)
    }
}

#[derive(Debug, Default)]
pub struct CreateTableAugment;

impl CreateTableAugment {
    pub fn new() -> Self {
        Self
    }
}

impl RewriteStage for CreateTableAugment {
    fn name(&self) -> &'static str {
        "create-table"
    }

    fn rewrite<'a>(
        &mut self,
        text: Cow<'a, str>,
        _unit: UnitMeta,
        state: &mut PipelineState,
    ) -> Cow<'a, str> {
        let offset = skip_guards(&text, lexer::statement_offset(&text));
        let body = &text[offset..];

        if let Some(caps) = USE_DB_RE.captures(body) {
            let name = caps.get(1).or_else(|| caps.get(2));
            state.current_schema = name.map(|m| m.as_str().to_string());
            return text;
        }

        if let Some(caps) = DROP_VIEW_RE.captures(body) {
            state.accumulator.mark_view_shadow(&caps[1]);
            return text;
        }

        let Some(caps) = CREATE_TABLE_RE.captures(body) else {
            return text;
        };
        let schema = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
        let Some(table) = caps.get(3).or_else(|| caps.get(4)).map(|m| m.as_str()) else {
            return text;
        };

        if state.accumulator.take_view_shadow(table) || state.metadata.is_empty() {
            return text;
        }

        let schema = schema.map(str::to_string).or_else(|| state.current_schema.clone());
        let metadata = state.metadata.clone();
        let info = match metadata.resolve(schema.as_deref(), table) {
            Lookup::Found { info, .. } => info,
            Lookup::Missing => {
                state.warnings.add(CleanWarning::MissingTableMetadata {
                    schema,
                    table: table.to_string(),
                });
                return text;
            }
            Lookup::Ambiguous(candidates) => {
                state.warnings.add(CleanWarning::AmbiguousTable {
                    table: table.to_string(),
                    candidates,
                });
                return text;
            }
        };

        let missing = info.missing_required();
        if !missing.is_empty() {
            state.warnings.add(CleanWarning::IncompleteTableMetadata {
                schema: schema.unwrap_or_default(),
                table: table.to_string(),
                missing: missing.into_vec(),
            });
            return text;
        }

        let Some((at, additions)) = plan_additions(body, caps.get(0).map_or(0, |m| m.end()), info)
        else {
            return text;
        };

        let mut out = String::with_capacity(text.len() + additions.len());
        out.push_str(&text[..offset + at]);
        out.push_str(&additions);
        out.push_str(&text[offset + at..]);
        state.stats.tables_augmented += 1;
        Cow::Owned(out)
    }
}

/// Where to insert which options, or `None` when nothing is missing or the
/// statement has no column list.
fn plan_additions(body: &str, name_end: usize, info: &TableInfo) -> Option<(usize, String)> {
    let after_name = &body[name_end..];
    let open = name_end + (after_name.len() - after_name.trim_start().len());
    if body.as_bytes().get(open) != Some(&b'(') {
        return None;
    }
    let close = matching_paren(body, open)?;

    let options_start = close + 1;
    let line_end = memchr::memchr(b'\n', &body.as_bytes()[options_start..])
        .map_or(body.len(), |n| options_start + n);
    let line = &body[options_start..line_end];
    let options = match find_top_level(line, b';') {
        Some(semi) => &line[..semi],
        None => line,
    };

    let mut additions = String::new();
    if !ENGINE_RE.is_match(options) {
        if let Some(engine) = &info.engine {
            additions.push_str(&format!(" ENGINE={}", engine));
        }
    }
    if !ROW_FORMAT_RE.is_match(options) {
        if let Some(row_format) = &info.row_format {
            additions.push_str(&format!(" ROW_FORMAT={}", row_format));
        }
    }
    if !CHARSET_RE.is_match(options) {
        if let Some(charset) = info.charset() {
            additions.push_str(&format!(" DEFAULT CHARSET={}", charset));
        }
    }
    if !COLLATE_RE.is_match(options) {
        if let Some(collation) = &info.collation {
            additions.push_str(&format!(" COLLATE={}", collation));
        }
    }

    if additions.is_empty() {
        return None;
    }
    Some((options_start + options.trim_end().len(), additions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TableMetadata;
    use crate::reassembler::UnitKind;
    use std::sync::Arc;

    const META: UnitMeta = UnitMeta {
        kind: UnitKind::Statement,
        at_line_start: true,
    };

    fn state(default_schema: Option<&str>) -> PipelineState {
        let mut meta = TableMetadata::new();
        meta.insert(
            "db",
            "t",
            TableInfo {
                engine: Some("InnoDB".into()),
                row_format: None,
                collation: Some("utf8mb4_unicode_ci".into()),
            },
        );
        meta.insert(
            "db",
            "r",
            TableInfo {
                engine: Some("InnoDB".into()),
                row_format: Some("DYNAMIC".into()),
                collation: Some("latin1_swedish_ci".into()),
            },
        );
        meta.insert(
            "db",
            "broken",
            TableInfo {
                engine: None,
                row_format: None,
                collation: None,
            },
        );
        PipelineState::new(Arc::new(meta), default_schema.map(String::from))
    }

    fn run(text: &str, state: &mut PipelineState) -> String {
        CreateTableAugment::new()
            .rewrite(Cow::Borrowed(text), META, state)
            .into_owned()
    }

    #[test]
    fn test_adds_missing_options_before_terminator() {
        let mut st = state(Some("db"));
        let out = run("CREATE TABLE `t` (`id` int\n) ENGINE=InnoDB;\n", &mut st);
        assert_eq!(
            out,
            "CREATE TABLE `t` (`id` int\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;\n"
        );
        assert_eq!(st.stats.tables_augmented, 1);
        assert_eq!(run(&out, &mut st), out);
        assert_eq!(st.stats.tables_augmented, 1);
    }

    #[test]
    fn test_column_collations_do_not_count() {
        let mut st = state(Some("db"));
        let out = run(
            "CREATE TABLE `r` (\n  `a` varchar(3) COLLATE utf8_bin\n) ENGINE=MyISAM COMMENT='x;y';\n",
            &mut st,
        );
        assert!(out.ends_with(
            ") ENGINE=MyISAM COMMENT='x;y' ROW_FORMAT=DYNAMIC DEFAULT CHARSET=latin1 COLLATE=latin1_swedish_ci;\n"
        ));
    }

    #[test]
    fn test_use_statement_and_qualified_names() {
        let mut st = state(None);
        run("USE `db`;\n", &mut st);
        assert_eq!(st.current_schema.as_deref(), Some("db"));

        let mut st = state(Some("other"));
        let out = run("CREATE TABLE `db`.`t` (a int);\n", &mut st);
        assert!(out.contains("(a int) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"));
    }

    #[test]
    fn test_statements_after_kept_guard() {
        let mut st = state(None);
        run("/*!80000 SET x=1 */\nUSE `db`;\n", &mut st);
        assert_eq!(st.current_schema.as_deref(), Some("db"));

        let out = run(
            "/*!80000 SET x=1 */\nCREATE TABLE `t` (`id` int\n) ENGINE=InnoDB;\n",
            &mut st,
        );
        assert_eq!(
            out,
            "/*!80000 SET x=1 */\nCREATE TABLE `t` (`id` int\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;\n"
        );
    }

    #[test]
    fn test_view_placeholder_exempt_once() {
        let mut st = state(Some("db"));
        let create = "CREATE TABLE `t` (\n  `id` tinyint\n) ENGINE=MyISAM;\n";
        run("DROP VIEW IF EXISTS `t`;\n", &mut st);
        assert_eq!(run(create, &mut st), create);
        assert_ne!(run(create, &mut st), create);
    }

    #[test]
    fn test_missing_and_incomplete_metadata_warn() {
        let mut st = state(Some("db"));
        let missing = "CREATE TABLE `nope` (a int);\n";
        assert_eq!(run(missing, &mut st), missing);
        let broken = "CREATE TABLE `broken` (a int);\n";
        assert_eq!(run(broken, &mut st), broken);
        assert_eq!(st.warnings.count(), 2);
        assert!(matches!(
            st.warnings.warnings()[1],
            CleanWarning::IncompleteTableMetadata { .. }
        ));
    }

    #[test]
    fn test_without_metadata_nothing_happens() {
        let mut st = PipelineState::new(Arc::new(TableMetadata::new()), None);
        let text = "CREATE TABLE `t` (a int);\n";
        assert_eq!(run(text, &mut st), text);
        assert!(!st.warnings.has_warnings());
    }

    #[test]
    fn test_partition_clause_stays_after_options() {
        let mut st = state(Some("db"));
        let out = run(
            "CREATE TABLE `t` (\n  `id` int\n) ENGINE=InnoDB\nPARTITION BY HASH (id);\n",
            &mut st,
        );
        assert_eq!(
            out,
            "CREATE TABLE `t` (\n  `id` int\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci\nPARTITION BY HASH (id);\n"
        );
    }
}
