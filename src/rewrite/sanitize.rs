//! Removes values that change between otherwise identical schema exports.

use super::{replace_top_level, skip_guards, PipelineState, RewriteStage};
use crate::lexer;
use crate::reassembler::UnitMeta;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static AUTO_INCREMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bAUTO_INCREMENT\s*=\s*\d+").unwrap());

static CREATE_TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\ACREATE\s+(?:TEMPORARY\s+)?TABLE\b").unwrap());

static DUMP_COMPLETED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^-- Dump completed on [^\r\n]*").unwrap());

pub const DUMP_COMPLETED: &str = "-- Dump completed";

#[derive(Debug, Default)]
pub struct DdlSanitize;

impl DdlSanitize {
    pub fn new() -> Self {
        Self
    }
}

impl RewriteStage for DdlSanitize {
    fn name(&self) -> &'static str {
        "ddl-sanitize"
    }

    fn rewrite<'a>(
        &mut self,
        text: Cow<'a, str>,
        _unit: UnitMeta,
        state: &mut PipelineState,
    ) -> Cow<'a, str> {
        let offset = skip_guards(&text, lexer::statement_offset(&text));
        let (lead, body) = text.split_at(offset);

        let new_lead = DUMP_COMPLETED_RE.replace_all(lead, DUMP_COMPLETED);
        let new_body = if CREATE_TABLE_RE.is_match(body) {
            replace_top_level(body, &AUTO_INCREMENT_RE, "AUTO_INCREMENT=0")
        } else {
            Cow::Borrowed(body)
        };

        let mut changed = 0;
        if new_lead != lead {
            changed += 1;
        }
        if new_body != body {
            changed += 1;
        }
        if changed == 0 {
            return text;
        }

        state.stats.values_sanitized += changed;
        Cow::Owned(format!("{}{}", new_lead, new_body))
    }
}
