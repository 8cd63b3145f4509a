//! Unwrap decision and semicolon reattachment.
//!
//! [`Unwrapper`] consumes scanner segments in order and writes the resulting
//! text. Blocks below the version threshold lose their guard; everything else
//! is copied verbatim. An unwrapped body is held back until the next piece of
//! text arrives, because a `;` right after the closing `*/` belongs to it.

use super::{Segment, VersionedComment};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Versions below this are unwrapped ("MySQL 8.0").
pub const DEFAULT_VERSION_THRESHOLD: u32 = 80000;

/// `true` when a block with `version` should lose its guard.
#[inline]
pub fn should_unwrap(version: u32, threshold: u32) -> bool {
    version < threshold
}

/// Blank-line collapse after a terminator was moved onto an unwrapped body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollapseMode {
    /// Leave the following text alone.
    Off,
    /// Drop one `\n` right after the moved terminator.
    Lf,
    /// Drop one `\n` or `\r\n`.
    #[default]
    Any,
}

impl FromStr for CollapseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "none" => Ok(CollapseMode::Off),
            "lf" => Ok(CollapseMode::Lf),
            "any" | "crlf" => Ok(CollapseMode::Any),
            _ => Err(format!(
                "Unknown collapse mode: {}. Valid options: off, lf, any",
                s
            )),
        }
    }
}

impl fmt::Display for CollapseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollapseMode::Off => write!(f, "off"),
            CollapseMode::Lf => write!(f, "lf"),
            CollapseMode::Any => write!(f, "any"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnwrapStats {
    pub unwrapped: u64,
    pub kept: u64,
    pub reattached: u64,
}

#[derive(Debug, Default)]
enum Pending {
    #[default]
    None,
    /// Unwrapped body waiting to see whether a `;` follows.
    Body(String),
    /// A line break at the start of the next text is redundant.
    Collapse,
    /// Saw a lone `\r` while collapsing; still need the `\n`.
    CollapseCr,
}

#[derive(Debug)]
pub struct Unwrapper {
    threshold: u32,
    collapse: CollapseMode,
    pending: Pending,
    stats: UnwrapStats,
}

impl Unwrapper {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            collapse: CollapseMode::default(),
            pending: Pending::None,
            stats: UnwrapStats::default(),
        }
    }

    pub fn with_collapse(mut self, collapse: CollapseMode) -> Self {
        self.collapse = collapse;
        self
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn stats(&self) -> UnwrapStats {
        self.stats
    }

    /// Handle one scanner segment, appending output text to `out`.
    pub fn accept(&mut self, segment: Segment<'_>, out: &mut String) {
        match segment {
            Segment::Versioned(comment) => self.accept_block(comment, out),
            Segment::Text(text) => self.accept_text(text, out),
        }
    }

    /// Release anything still held back.
    pub fn finish(&mut self, out: &mut String) {
        match std::mem::take(&mut self.pending) {
            Pending::Body(body) => out.push_str(&body),
            Pending::CollapseCr => out.push('\r'),
            Pending::None | Pending::Collapse => {}
        }
    }

    fn accept_block(&mut self, comment: &VersionedComment, out: &mut String) {
        self.finish(out);
        if should_unwrap(comment.version(), self.threshold) {
            self.stats.unwrapped += 1;
            self.pending = Pending::Body(strip_guard_padding(comment.inner()).to_string());
        } else {
            self.stats.kept += 1;
            out.push_str(comment.raw());
        }
    }

    fn accept_text(&mut self, text: &str, out: &mut String) {
        if text.is_empty() {
            return;
        }

        let rest = match std::mem::take(&mut self.pending) {
            Pending::None => text,
            Pending::Body(body) => match text.strip_prefix(';') {
                Some(rest) => self.reattach(&body, rest, out),
                None => {
                    out.push_str(&body);
                    text
                }
            },
            Pending::Collapse => self.collapse_line_break(text),
            Pending::CollapseCr => match text.strip_prefix('\n') {
                Some(rest) => rest,
                None => {
                    out.push('\r');
                    text
                }
            },
        };
        out.push_str(rest);
    }

    /// Move the `;` that followed the block onto its body. Returns what is
    /// left of the following text.
    fn reattach<'t>(&mut self, body: &str, rest: &'t str, out: &mut String) -> &'t str {
        self.stats.reattached += 1;

        let code = body.trim_end();
        let trailing = &body[code.len()..];
        if code.ends_with(';') {
            out.push_str(body);
        } else {
            out.push_str(code);
            out.push(';');
            out.push_str(trailing);
        }

        if self.collapse == CollapseMode::Off || !trailing.ends_with('\n') {
            return rest;
        }
        if rest.is_empty() {
            self.pending = Pending::Collapse;
            return rest;
        }
        self.collapse_line_break(rest)
    }

    fn collapse_line_break<'t>(&mut self, text: &'t str) -> &'t str {
        if let Some(rest) = text.strip_prefix('\n') {
            return rest;
        }
        if self.collapse == CollapseMode::Any {
            if let Some(rest) = text.strip_prefix("\r\n") {
                return rest;
            }
            if text == "\r" {
                self.pending = Pending::CollapseCr;
                return "";
            }
        }
        text
    }
}

/// Inner text without the spaces/tabs that pad it against the guard.
fn strip_guard_padding(inner: &str) -> &str {
    inner
        .trim_start_matches([' ', '\t'])
        .trim_end_matches([' ', '\t'])
}
