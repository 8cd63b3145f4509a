//! Versioned comment scanner.
//!
//! Finds `/*!<digits> ... */` blocks in a stream of text. The scanner is
//! resumable: it keeps its cursor state between [`Scanner::feed`] calls, so a
//! block can span any number of chunks and nothing is ever rescanned. Text
//! outside versioned blocks (including plain comments and line comments) is
//! passed through in order.

pub mod unwrap;

use crate::lexer::{Lexer, Step};
use std::ops::Range;

/// Opening marker of a versioned comment.
pub const MARKER: &str = "/*!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Clean,
    InVersionedComment,
    InPlainComment,
}

/// Position of the scanner relative to block comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestingState {
    pub mode: Mode,
    pub depth: u32,
}

/// A complete versioned comment block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedComment {
    raw: String,
    version: u32,
    inner: Range<usize>,
    line: u64,
}

impl VersionedComment {
    /// Full block text, marker to closing `*/`.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Text between the version digits and the closing `*/`.
    pub fn inner(&self) -> &str {
        &self.raw[self.inner.clone()]
    }

    /// 1-based line on which the block opened.
    pub fn line(&self) -> u64 {
        self.line
    }
}

/// A piece of scanner output.
#[derive(Debug, Clone, Copy)]
pub enum Segment<'a> {
    Text(&'a str),
    Versioned(&'a VersionedComment),
}

/// Result of scanning a buffer that starts at a candidate marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The buffer does not start with `/*!` followed by a digit.
    NotVersioned,
    /// The block (or its digit run) is not closed yet; retry with more data.
    Incomplete,
    Complete {
        inner: Range<usize>,
        version: u32,
        end: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Versioned(u32),
    Plain,
}

/// A block comment still open at end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unterminated {
    pub kind: CommentKind,
    pub line: u64,
}

/// Scan one versioned comment at the start of `buf`.
pub fn scan_versioned_comment(buf: &str) -> ScanOutcome {
    let bytes = buf.as_bytes();
    if !buf.starts_with(MARKER) {
        return ScanOutcome::NotVersioned;
    }

    let mut lexer = Lexer::new();
    let start = match lexer.step(bytes, 0, false) {
        Step::OpenVersioned { len } => len,
        Step::NeedMore => return ScanOutcome::Incomplete,
        _ => return ScanOutcome::NotVersioned,
    };
    let version = parse_version(&buf[MARKER.len()..start]);

    let mut i = start;
    while i < bytes.len() {
        match lexer.step(bytes, i, false) {
            Step::NeedMore => break,
            Step::Close if lexer.depth() == 0 => {
                return ScanOutcome::Complete {
                    inner: start..i,
                    version,
                    end: i + 2,
                };
            }
            step => i += step.consumed(),
        }
    }

    ScanOutcome::Incomplete
}

/// Version digits never exceed `u32`; longer runs saturate.
fn parse_version(digits: &str) -> u32 {
    digits.parse().unwrap_or(u32::MAX)
}

/// Resumable versioned comment scanner.
#[derive(Debug)]
pub struct Scanner {
    lexer: Lexer,
    /// Input held back because a decision needed more bytes.
    carry: String,
    /// Raw text of the open versioned block.
    block: String,
    inner_start: usize,
    version: u32,
    block_line: u64,
    line: u64,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            lexer: Lexer::new(),
            carry: String::new(),
            block: String::new(),
            inner_start: 0,
            version: 0,
            block_line: 0,
            line: 1,
        }
    }

    pub fn state(&self) -> NestingState {
        let depth = self.lexer.depth();
        let mode = if depth == 0 {
            Mode::Clean
        } else if self.lexer.in_versioned() {
            Mode::InVersionedComment
        } else {
            Mode::InPlainComment
        };
        NestingState { mode, depth }
    }

    /// Bytes currently buffered for an open versioned block.
    pub fn buffered(&self) -> usize {
        self.block.len() + self.carry.len()
    }

    /// Scan the next chunk of input.
    pub fn feed<F>(&mut self, chunk: &str, mut emit: F)
    where
        F: FnMut(Segment<'_>),
    {
        if self.carry.is_empty() {
            self.scan(chunk, false, &mut emit);
        } else {
            let mut input = std::mem::take(&mut self.carry);
            input.push_str(chunk);
            self.scan(&input, false, &mut emit);
        }
    }

    /// Flush held-back input at end of stream. An unterminated versioned block
    /// is emitted verbatim as text and reported.
    pub fn finish<F>(&mut self, mut emit: F) -> Option<Unterminated>
    where
        F: FnMut(Segment<'_>),
    {
        let input = std::mem::take(&mut self.carry);
        self.scan(&input, true, &mut emit);

        let open = match self.state().mode {
            Mode::Clean => None,
            Mode::InVersionedComment => {
                emit(Segment::Text(&self.block));
                Some(Unterminated {
                    kind: CommentKind::Versioned(self.version),
                    line: self.block_line,
                })
            }
            Mode::InPlainComment => Some(Unterminated {
                kind: CommentKind::Plain,
                line: self.block_line,
            }),
        };

        self.lexer = Lexer::new();
        self.block.clear();
        self.line = 1;
        open
    }

    fn scan<F>(&mut self, input: &str, at_eof: bool, emit: &mut F)
    where
        F: FnMut(Segment<'_>),
    {
        let bytes = input.as_bytes();
        let mut mark = 0;
        let mut i = 0;

        while i < bytes.len() {
            let was_versioned = self.lexer.in_versioned();
            let depth_before = self.lexer.depth();

            match self.lexer.step(bytes, i, at_eof) {
                Step::NeedMore => break,
                Step::OpenVersioned { len } => {
                    if i > mark {
                        emit(Segment::Text(&input[mark..i]));
                    }
                    self.block.clear();
                    self.inner_start = len;
                    self.version = parse_version(&input[i + MARKER.len()..i + len]);
                    self.block_line = self.line;
                    mark = i;
                    i += len;
                }
                Step::Close if was_versioned && self.lexer.depth() == 0 => {
                    let end = i + 2;
                    self.block.push_str(&input[mark..end]);
                    let inner = self.inner_start..self.block.len() - 2;
                    let comment = VersionedComment {
                        raw: std::mem::take(&mut self.block),
                        version: self.version,
                        inner,
                        line: self.block_line,
                    };
                    emit(Segment::Versioned(&comment));
                    self.block = comment.raw;
                    self.block.clear();
                    mark = end;
                    i = end;
                }
                Step::Open if depth_before == 0 => {
                    self.block_line = self.line;
                    i += 2;
                }
                step => {
                    if bytes[i] == b'\n' {
                        self.line += 1;
                    }
                    i += step.consumed();
                }
            }
        }

        if self.lexer.in_versioned() {
            self.block.push_str(&input[mark..i]);
        } else if i > mark {
            emit(Segment::Text(&input[mark..i]));
        }
        if i < bytes.len() {
            self.carry.push_str(&input[i..]);
        }
    }
}
