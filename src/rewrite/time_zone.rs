//! `SET time_zone = 'UTC'` normalization.
//!
//! Servers without time zone tables reject the named zone, so a standalone
//! statement setting it is rewritten to the equivalent offset.

use super::{skip_guards, starts_line, PipelineState, RewriteStage};
use crate::lexer;
use crate::reassembler::UnitMeta;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static TIME_ZONE_UTC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\A(SET\s+time_zone\s*=\s*)(?:'UTC'|"UTC")(\s*;+\s*)\z"#).unwrap()
});

#[derive(Debug, Default)]
pub struct TimeZoneNormalize;

impl TimeZoneNormalize {
    pub fn new() -> Self {
        Self
    }
}

impl RewriteStage for TimeZoneNormalize {
    fn name(&self) -> &'static str {
        "time-zone"
    }

    fn rewrite<'a>(
        &mut self,
        text: Cow<'a, str>,
        unit: UnitMeta,
        state: &mut PipelineState,
    ) -> Cow<'a, str> {
        let offset = skip_guards(&text, lexer::statement_offset(&text));
        if !starts_line(&text, offset, unit) {
            return text;
        }

        let body = &text[offset..];
        let Some(caps) = TIME_ZONE_UTC_RE.captures(body) else {
            return text;
        };

        let mut out = String::with_capacity(text.len() + 3);
        out.push_str(&text[..offset]);
        out.push_str(&caps[1]);
        out.push_str("'+00:00'");
        out.push_str(&caps[2]);
        state.stats.time_zones_normalized += 1;
        Cow::Owned(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TableMetadata;
    use crate::reassembler::UnitKind;
    use std::sync::Arc;

    fn run(text: &str, at_line_start: bool) -> String {
        let mut state = PipelineState::new(Arc::new(TableMetadata::new()), None);
        let unit = UnitMeta {
            kind: UnitKind::Statement,
            at_line_start,
        };
        TimeZoneNormalize::new()
            .rewrite(Cow::Borrowed(text), unit, &mut state)
            .into_owned()
    }

    #[test]
    fn test_rewrites_standalone_statement() {
        assert_eq!(run("SET time_zone = 'UTC';\n", true), "SET time_zone = '+00:00';\n");
        assert_eq!(
            run("-- tz\nset TIME_ZONE=\"UTC\" ;\n", false),
            "-- tz\nset TIME_ZONE='+00:00' ;\n"
        );
    }

    #[test]
    fn test_leaves_data_and_mid_line_statements() {
        let insert = "INSERT INTO t VALUES ('SET time_zone = ''UTC'';');\n";
        assert_eq!(run(insert, true), insert);
        assert_eq!(run(" SET time_zone = 'UTC';\n", false), " SET time_zone = 'UTC';\n");
        let other = "SET time_zone = 'Europe/Oslo';\n";
        assert_eq!(run(other, true), other);
    }

    #[test]
    fn test_statement_after_kept_guard() {
        assert_eq!(
            run("/*!80000 SET x=1 */\nSET time_zone = 'UTC';\n", true),
            "/*!80000 SET x=1 */\nSET time_zone = '+00:00';\n"
        );
        let same_line = "/*!80000 SET x=1 */ SET time_zone = 'UTC';\n";
        assert_eq!(run(same_line, true), same_line);
    }
}
