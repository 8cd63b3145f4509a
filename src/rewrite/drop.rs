//! DROP statement suppression.
//!
//! Removes every statement whose first keyword is `DROP`, whether it is
//! plain SQL or still inside a versioned guard. Comments in front of the
//! statement stay.

use super::{first_keyword, skip_guard, starts_line, PipelineState, RewriteStage};
use crate::lexer;
use crate::reassembler::UnitMeta;
use crate::scanner::{scan_versioned_comment, ScanOutcome};
use std::borrow::Cow;

#[derive(Debug, Default)]
pub struct DropSuppress;

impl DropSuppress {
    pub fn new() -> Self {
        Self
    }
}

impl RewriteStage for DropSuppress {
    fn name(&self) -> &'static str {
        "drop"
    }

    fn rewrite<'a>(
        &mut self,
        text: Cow<'a, str>,
        unit: UnitMeta,
        state: &mut PipelineState,
    ) -> Cow<'a, str> {
        // Kept guards in front of the DROP stay.
        let mut offset = lexer::statement_offset(&text);
        let guarded = loop {
            let (keyword, guarded) = first_keyword(&text[offset..]);
            if keyword.eq_ignore_ascii_case("DROP") {
                break guarded;
            }
            match guarded.then(|| skip_guard(&text, offset)).flatten() {
                Some(next) => offset = next,
                None => return text,
            }
        };
        let body = &text[offset..];
        let own_line = starts_line(&text, offset, unit);

        // A guarded DROP loses the guard and the terminator after it; a
        // plain one loses everything from its first token on.
        let mut rest = "";
        if guarded {
            if let ScanOutcome::Complete { end, .. } = scan_versioned_comment(body) {
                rest = body[end..].trim_start_matches(';');
                if own_line {
                    rest = strip_line_break(rest);
                }
            }
        }
        let line_break = line_break_of(body);
        let keep_from = text[..offset].trim_end_matches([' ', '\t']).len();

        let mut out = String::with_capacity(keep_from + rest.len());
        out.push_str(&text[..keep_from]);
        if rest.trim().is_empty() {
            if !own_line {
                out.push_str(line_break);
            }
        } else {
            out.push_str(rest);
        }

        state.stats.drops_suppressed += 1;
        Cow::Owned(out)
    }
}

/// `text` without its first line break, if only spaces and tabs precede it.
fn strip_line_break(text: &str) -> &str {
    let trimmed = text.trim_start_matches([' ', '\t']);
    trimmed
        .strip_prefix("\r\n")
        .or_else(|| trimmed.strip_prefix('\n'))
        .unwrap_or(text)
}

fn line_break_of(text: &str) -> &str {
    if text.ends_with("\r\n") {
        "\r\n"
    } else if text.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}
