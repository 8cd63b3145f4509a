//! Byte-level SQL lexer shared by the comment scanner, the statement
//! reassembler and the rewrite stages.
//!
//! The lexer knows just enough SQL to tell code apart from string literals
//! and comments. It never allocates and resumes across input boundaries:
//! whenever a decision needs bytes that have not arrived yet it returns
//! [`Step::NeedMore`] without touching its state, so the caller can retry the
//! same position once more input is available.
//!
//! Rules:
//! - `'...'` and `"..."` are literals with backslash escapes, `` `...` `` is a
//!   quoted identifier without escapes.
//! - `-- ` (dash dash whitespace) and `#` start a line comment.
//! - `/*!<digits>` at the top level opens a versioned comment whose content is
//!   lexed as code. `/*!` without digits is literal text.
//! - Any other `/*` opens a plain block comment. Block comments nest; inside a
//!   plain comment only `/*` and `*/` are significant.

/// Lexical state at the current code level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lex {
    #[default]
    Code,
    Quoted(u8),
    Escaped(u8),
    LineComment,
}

/// One lexing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Ordinary bytes with no structural meaning.
    Skip(usize),
    /// `/*!<digits>` opened a versioned comment; `len` covers marker and digits.
    OpenVersioned { len: usize },
    /// `/*` opened a (possibly nested) plain block comment.
    Open,
    /// `*/` closed the innermost block comment.
    Close,
    /// The byte at the cursor cannot be classified without more input.
    NeedMore,
}

impl Step {
    /// Number of bytes the step consumed.
    #[inline]
    pub fn consumed(&self) -> usize {
        match *self {
            Step::Skip(n) => n,
            Step::OpenVersioned { len } => len,
            Step::Open | Step::Close => 2,
            Step::NeedMore => 0,
        }
    }
}

enum Marker {
    Versioned(usize),
    Bare,
    Plain,
    NeedMore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lexer {
    depth: u32,
    versioned: bool,
    lex: Lex,
}

impl Lexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block comment nesting depth; 0 outside every comment.
    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// True while the outermost open block is a versioned comment.
    #[inline]
    pub fn in_versioned(&self) -> bool {
        self.versioned
    }

    #[inline]
    pub fn lex(&self) -> Lex {
        self.lex
    }

    /// True when the cursor sits in code outside every comment and literal.
    #[inline]
    pub fn at_top_level_code(&self) -> bool {
        self.depth == 0 && self.lex == Lex::Code
    }

    #[inline]
    fn code_level(&self) -> bool {
        self.depth == 0 || (self.versioned && self.depth == 1)
    }

    /// Classify the byte at `buf[i]`. `i` must be in bounds.
    pub fn step(&mut self, buf: &[u8], i: usize, at_eof: bool) -> Step {
        let b = buf[i];
        match self.lex {
            Lex::Quoted(q) => {
                if b == q {
                    self.lex = Lex::Code;
                } else if b == b'\\' && q != b'`' {
                    self.lex = Lex::Escaped(q);
                }
                return Step::Skip(1);
            }
            Lex::Escaped(q) => {
                self.lex = Lex::Quoted(q);
                return Step::Skip(1);
            }
            Lex::Code | Lex::LineComment => {}
        }

        let next = buf.get(i + 1).copied();
        let code = self.lex == Lex::Code && self.code_level();

        match b {
            b'*' if self.depth > 0 => match next {
                None if !at_eof => Step::NeedMore,
                Some(b'/') => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        self.versioned = false;
                    }
                    self.lex = Lex::Code;
                    Step::Close
                }
                _ => Step::Skip(1),
            },
            b'/' if self.lex != Lex::LineComment => match next {
                None if !at_eof => Step::NeedMore,
                Some(b'*') => {
                    if self.depth == 0 {
                        match classify_marker(buf, i, at_eof) {
                            Marker::NeedMore => return Step::NeedMore,
                            Marker::Versioned(len) => {
                                self.depth = 1;
                                self.versioned = true;
                                return Step::OpenVersioned { len };
                            }
                            Marker::Bare => return Step::Skip(3),
                            Marker::Plain => {}
                        }
                    }
                    self.depth += 1;
                    Step::Open
                }
                _ => Step::Skip(1),
            },
            b'\'' | b'"' | b'`' if code => {
                self.lex = Lex::Quoted(b);
                Step::Skip(1)
            }
            b'#' if code => {
                self.lex = Lex::LineComment;
                Step::Skip(1)
            }
            b'-' if code => match next {
                None if !at_eof => Step::NeedMore,
                Some(b'-') => match buf.get(i + 2) {
                    None if !at_eof => Step::NeedMore,
                    None | Some(b' ' | b'\t' | b'\r' | b'\n') => {
                        self.lex = Lex::LineComment;
                        Step::Skip(2)
                    }
                    Some(_) => Step::Skip(1),
                },
                _ => Step::Skip(1),
            },
            b'\n' if self.lex == Lex::LineComment => {
                self.lex = Lex::Code;
                Step::Skip(1)
            }
            _ => Step::Skip(1),
        }
    }
}

/// Classify `/*` at `buf[i]` when it appears outside every comment.
fn classify_marker(buf: &[u8], i: usize, at_eof: bool) -> Marker {
    match buf.get(i + 2) {
        None if !at_eof => Marker::NeedMore,
        Some(b'!') => {
            let digits = buf[i + 3..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            if i + 3 + digits == buf.len() && !at_eof {
                Marker::NeedMore
            } else if digits == 0 {
                Marker::Bare
            } else {
                Marker::Versioned(3 + digits)
            }
        }
        _ => Marker::Plain,
    }
}

/// Byte offset of the first token in `text`, skipping whitespace, line
/// comments and plain block comments. A versioned comment counts as a token.
/// Returns `text.len()` when the text holds no token at all.
pub fn statement_offset(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut lexer = Lexer::new();
    let mut i = 0;

    while i < bytes.len() {
        let top = lexer.at_top_level_code();
        if top && bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let step = lexer.step(bytes, i, true);
        if top {
            match step {
                Step::Open => {}
                Step::Skip(_) if lexer.lex() == Lex::LineComment => {}
                _ => return i,
            }
        }
        i += step.consumed();
    }

    bytes.len()
}

/// Leading keyword of `text` (ASCII letters and underscores), if any.
pub fn leading_word(text: &str) -> &str {
    let end = text
        .bytes()
        .position(|b| !(b.is_ascii_alphabetic() || b == b'_'))
        .unwrap_or(text.len());
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &str) -> Vec<Step> {
        let bytes = input.as_bytes();
        let mut lexer = Lexer::new();
        let mut steps = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let step = lexer.step(bytes, i, true);
            i += step.consumed();
            steps.push(step);
        }
        steps
    }

    #[test]
    fn test_versioned_marker() {
        let steps = run("/*!40101 x */");
        assert_eq!(steps[0], Step::OpenVersioned { len: 8 });
        assert_eq!(*steps.last().unwrap(), Step::Close);
    }

    #[test]
    fn test_bare_marker_is_text() {
        let steps = run("/*! x */");
        assert_eq!(steps[0], Step::Skip(3));
        assert!(!steps.contains(&Step::Close));
    }

    #[test]
    fn test_marker_inside_string_is_text() {
        let steps = run("'/*!40101 x */'");
        assert!(steps.iter().all(|s| matches!(s, Step::Skip(_))));
    }

    #[test]
    fn test_marker_inside_line_comment_is_text() {
        let steps = run("-- /*!40101 x */\n");
        assert!(steps.iter().all(|s| matches!(s, Step::Skip(_))));
    }

    #[test]
    fn test_nested_plain_inside_versioned() {
        let bytes = b"/*!50003 a /* b /* c */ */ d */";
        let mut lexer = Lexer::new();
        let mut i = 0;
        let mut closes = 0;
        while i < bytes.len() {
            let step = lexer.step(bytes, i, true);
            if step == Step::Close {
                closes += 1;
            }
            i += step.consumed();
        }
        assert_eq!(closes, 3);
        assert_eq!(lexer.depth(), 0);
        assert!(!lexer.in_versioned());
    }

    #[test]
    fn test_need_more_on_partial_digits() {
        let mut lexer = Lexer::new();
        assert_eq!(lexer.step(b"/*!401", 0, false), Step::NeedMore);
        assert_eq!(lexer, Lexer::new());
        assert_eq!(
            lexer.step(b"/*!40101 ", 0, false),
            Step::OpenVersioned { len: 8 }
        );
    }

    #[test]
    fn test_statement_offset_skips_comments() {
        let text = "\n-- header\n/* note */\n# x\nDROP TABLE t;";
        assert_eq!(&text[statement_offset(text)..], "DROP TABLE t;");
        assert_eq!(statement_offset("  /*!40101 SET x */"), 2);
        assert_eq!(statement_offset("-- only\n"), 8);
    }

    #[test]
    fn test_leading_word() {
        assert_eq!(leading_word("DROP TABLE"), "DROP");
        assert_eq!(leading_word("`t`"), "");
    }
}
