//! Rewrite pipeline applied to every statement unit.
//!
//! Stages run in order and share one [`PipelineState`]. Each stage gets the
//! text produced by the previous one and returns it untouched (borrowed) when
//! it has nothing to change.

mod create_table;
mod drop;
mod sanitize;
mod time_zone;

pub use create_table::{CreateTableAccumulator, CreateTableAugment};
pub use drop::DropSuppress;
pub use sanitize::DdlSanitize;
pub use time_zone::TimeZoneNormalize;

use crate::lexer::{self, Lexer};
use crate::metadata::TableMetadata;
use crate::reassembler::{Unit, UnitKind, UnitMeta};
use crate::scanner::{scan_versioned_comment, ScanOutcome};
use crate::warnings::WarningCollector;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;

/// A single text transformation.
pub trait RewriteStage {
    fn name(&self) -> &'static str;

    fn rewrite<'a>(
        &mut self,
        text: Cow<'a, str>,
        unit: UnitMeta,
        state: &mut PipelineState,
    ) -> Cow<'a, str>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    pub tables_augmented: u64,
    pub time_zones_normalized: u64,
    pub drops_suppressed: u64,
    pub values_sanitized: u64,
}

/// State owned by one run and lent to every stage.
#[derive(Debug)]
pub struct PipelineState {
    pub metadata: Arc<TableMetadata>,
    /// Schema selected by the last `USE`, or the configured default.
    pub current_schema: Option<String>,
    pub accumulator: CreateTableAccumulator,
    pub warnings: WarningCollector,
    pub stats: RewriteStats,
}

impl PipelineState {
    pub fn new(metadata: Arc<TableMetadata>, default_schema: Option<String>) -> Self {
        Self {
            metadata,
            current_schema: default_schema,
            accumulator: CreateTableAccumulator::default(),
            warnings: WarningCollector::new(),
            stats: RewriteStats::default(),
        }
    }
}

pub struct Pipeline {
    stages: Vec<Box<dyn RewriteStage>>,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(state: PipelineState) -> Self {
        Self {
            stages: Vec::new(),
            state,
        }
    }

    pub fn with_stage<S: RewriteStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PipelineState {
        &mut self.state
    }

    pub fn into_state(self) -> PipelineState {
        self.state
    }

    /// Run a unit through every stage. `DELIMITER` directives pass unchanged.
    pub fn process<'a>(&mut self, unit: Unit<'a>) -> Cow<'a, str> {
        let mut text = Cow::Borrowed(unit.text);
        if unit.meta.kind == UnitKind::Directive {
            return text;
        }

        for stage in &mut self.stages {
            if text.is_empty() {
                break;
            }
            text = stage.rewrite(text, unit.meta, &mut self.state);
        }
        text
    }
}

/// First keyword of a statement body, looking through a versioned guard.
/// The flag is set when the keyword sits inside a guard.
pub(crate) fn first_keyword(body: &str) -> (&str, bool) {
    if let ScanOutcome::Complete { inner, .. } = scan_versioned_comment(body) {
        let inner = &body[inner];
        let inner = &inner[lexer::statement_offset(inner)..];
        return (lexer::leading_word(inner), true);
    }
    (lexer::leading_word(body), false)
}

/// Offset of the first token after a complete versioned guard at `offset`.
pub(crate) fn skip_guard(text: &str, offset: usize) -> Option<usize> {
    match scan_versioned_comment(&text[offset..]) {
        ScanOutcome::Complete { end, .. } => {
            let after = offset + end;
            Some(after + lexer::statement_offset(&text[after..]))
        }
        _ => None,
    }
}

/// Offset of the statement behind any leading versioned guards. A kept guard
/// with no terminator of its own shares its unit with the next statement.
pub(crate) fn skip_guards(text: &str, mut offset: usize) -> usize {
    while let Some(next) = skip_guard(text, offset) {
        offset = next;
    }
    offset
}

/// Replace every match of `re` that starts in top-level code. Matches inside
/// literals and comments are left alone.
pub(crate) fn replace_top_level<'a>(text: &'a str, re: &Regex, with: &str) -> Cow<'a, str> {
    let bytes = text.as_bytes();
    let mut lexer = Lexer::new();
    let mut i = 0;
    let mut copied = 0;
    let mut out: Option<String> = None;

    for m in re.find_iter(text) {
        while i < m.start() {
            i += lexer.step(bytes, i, true).consumed();
        }
        if i != m.start() || !lexer.at_top_level_code() {
            continue;
        }
        let out = out.get_or_insert_with(|| String::with_capacity(text.len()));
        out.push_str(&text[copied..m.start()]);
        out.push_str(with);
        copied = m.end();
    }

    match out {
        Some(mut out) => {
            out.push_str(&text[copied..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(text),
    }
}

/// True when the token at `offset` is the first thing on its line, apart from
/// spaces and tabs.
pub(crate) fn starts_line(text: &str, offset: usize, unit: UnitMeta) -> bool {
    let before = text[..offset].trim_end_matches([' ', '\t']);
    if before.is_empty() {
        unit.at_line_start
    } else {
        before.ends_with('\n')
    }
}

/// Offset of the first `target` byte in `text` that sits in top-level code.
pub(crate) fn find_top_level(text: &str, target: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut lexer = Lexer::new();
    let mut i = 0;
    while i < bytes.len() {
        if lexer.at_top_level_code() && bytes[i] == target {
            return Some(i);
        }
        i += lexer.step(bytes, i, true).consumed();
    }
    None
}

/// Offset of the parenthesis closing the one at `open`, skipping quoted text
/// and comments.
pub(crate) fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut lexer = Lexer::new();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        if lexer.at_top_level_code() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += lexer.step(bytes, i, true).consumed();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const AT_START: UnitMeta = UnitMeta {
        kind: UnitKind::Statement,
        at_line_start: true,
    };

    struct Upper;

    impl RewriteStage for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn rewrite<'a>(
            &mut self,
            text: Cow<'a, str>,
            _unit: UnitMeta,
            _state: &mut PipelineState,
        ) -> Cow<'a, str> {
            Cow::Owned(text.to_uppercase())
        }
    }

    #[test]
    fn test_pipeline_runs_stages_in_order_and_skips_directives() {
        let state = PipelineState::new(Arc::new(TableMetadata::new()), None);
        let mut pipeline = Pipeline::new(state).with_stage(Upper);
        assert_eq!(pipeline.stage_names(), vec!["upper"]);

        let out = pipeline.process(Unit {
            text: "set a=1;\n",
            meta: AT_START,
        });
        assert_eq!(out, "SET A=1;\n");

        let directive = pipeline.process(Unit {
            text: "delimiter ;;\n",
            meta: UnitMeta {
                kind: UnitKind::Directive,
                at_line_start: true,
            },
        });
        assert!(matches!(directive, Cow::Borrowed("delimiter ;;\n")));
    }

    #[test]
    fn test_first_keyword_sees_through_guard() {
        assert_eq!(first_keyword("DROP TABLE t;"), ("DROP", false));
        assert_eq!(
            first_keyword("/*!50001 DROP VIEW IF EXISTS `v`*/;"),
            ("DROP", true)
        );
        assert_eq!(first_keyword("`x`"), ("", false));
    }

    #[test]
    fn test_paren_and_top_level_search() {
        let text = "t (a varchar(3) DEFAULT ')', b int) x;";
        let close = matching_paren(text, 2).unwrap();
        assert_eq!(&text[close..], ") x;");
        assert_eq!(find_top_level("COMMENT='a;b';", b';'), Some(13));
    }

    #[test]
    fn test_skip_guards_reaches_following_statement() {
        let text = "/*!80000 SET x=1 */\n/*!80000 SET y=2 */ -- c\nSET z=3;\n";
        assert_eq!(&text[skip_guards(text, 0)..], "SET z=3;\n");
        assert_eq!(skip_guards("SET z=3;", 0), 0);
        assert_eq!(skip_guard("/*!80000 SET x=1", 0), None);
    }

    #[test]
    fn test_replace_top_level_skips_literals() {
        let re = Regex::new(r"x=\d").unwrap();
        assert_eq!(
            replace_top_level("x=1 'x=2' /* x=3 */ x=4", &re, "x=0"),
            "x=0 'x=2' /* x=3 */ x=0"
        );
        assert!(matches!(
            replace_top_level("'x=1'", &re, "x=0"),
            Cow::Borrowed("'x=1'")
        ));
    }

    #[test]
    fn test_starts_line() {
        assert!(starts_line("-- c\n  SET", 7, AT_START));
        assert!(!starts_line(" x SET", 3, AT_START));
        let mid = UnitMeta {
            kind: UnitKind::Statement,
            at_line_start: false,
        };
        assert!(!starts_line(" SET", 1, mid));
    }
}
