//! Statement and line reassembly.
//!
//! Input arrives in chunks of arbitrary size. [`LineAssembler`] turns raw
//! bytes into text made of complete lines, so a multi-byte character or a
//! comment marker is never cut in half. [`StatementAssembler`] turns that
//! text into complete statement units for the rewrite pipeline. Both keep
//! only the unfinished tail between calls.

use crate::lexer::{Lex, Lexer, Step};
use std::io;

/// Default statement terminator.
pub const DEFAULT_DELIMITER: &str = ";";

/// Longest statement prefix kept for diagnostics.
const PREVIEW_LEN: usize = 60;

/// Splits a byte stream into runs of complete lines.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
    lines: u64,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of complete lines seen so far.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Push a chunk; `emit` receives every complete line it finishes.
    /// Invalid UTF-8 is replaced with U+FFFD.
    pub fn push<F>(&mut self, chunk: &[u8], mut emit: F) -> io::Result<()>
    where
        F: FnMut(&str) -> io::Result<()>,
    {
        let Some(last) = memchr::memrchr(b'\n', chunk) else {
            self.pending.extend_from_slice(chunk);
            return Ok(());
        };

        let (complete, rest) = chunk.split_at(last + 1);
        self.lines += memchr::memchr_iter(b'\n', complete).count() as u64;

        if self.pending.is_empty() {
            emit(&String::from_utf8_lossy(complete))?;
        } else {
            self.pending.extend_from_slice(complete);
            emit(&String::from_utf8_lossy(&self.pending))?;
            self.pending.clear();
        }
        self.pending.extend_from_slice(rest);
        Ok(())
    }

    /// Emit the final line if the input did not end with a line break.
    pub fn finish<F>(&mut self, mut emit: F) -> io::Result<()>
    where
        F: FnMut(&str) -> io::Result<()>,
    {
        if !self.pending.is_empty() {
            self.lines += 1;
            emit(&String::from_utf8_lossy(&self.pending))?;
            self.pending.clear();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Text up to and including a terminator.
    Statement,
    /// A client-side `DELIMITER` line.
    Directive,
    /// Whatever remained at end of input without a terminator.
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitMeta {
    pub kind: UnitKind,
    /// The unit begins at the start of a line.
    pub at_line_start: bool,
}

/// A complete unit handed to the rewrite pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Unit<'a> {
    pub text: &'a str,
    pub meta: UnitMeta,
}

enum Probe {
    Found(usize),
    Absent,
    NeedMore,
}

/// Groups text into terminator-delimited statements.
///
/// A unit runs from the end of the previous unit through the terminator,
/// plus trailing spaces and one line break when the line ends there. Leading
/// comments therefore belong to the statement that follows them.
#[derive(Debug)]
pub struct StatementAssembler {
    pending: String,
    /// Resume offset into `pending`; everything before it was lexed.
    scan_pos: usize,
    lexer: Lexer,
    delimiter: String,
    token_seen: bool,
    line_start: bool,
    statements: u64,
}

impl Default for StatementAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementAssembler {
    pub fn new() -> Self {
        Self {
            pending: String::new(),
            scan_pos: 0,
            lexer: Lexer::new(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            token_seen: false,
            line_start: true,
            statements: 0,
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Terminated statements emitted so far.
    pub fn statements(&self) -> u64 {
        self.statements
    }

    /// Bytes held waiting for a terminator.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn push<F>(&mut self, text: &str, mut emit: F) -> io::Result<()>
    where
        F: FnMut(Unit<'_>) -> io::Result<()>,
    {
        self.pending.push_str(text);
        self.drain(false, &mut emit)
    }

    /// Flush the remainder as a trailing unit. Returns a preview of the text
    /// when it held an unterminated statement.
    pub fn finish<F>(&mut self, mut emit: F) -> io::Result<Option<String>>
    where
        F: FnMut(Unit<'_>) -> io::Result<()>,
    {
        self.drain(true, &mut emit)?;

        let pending = std::mem::take(&mut self.pending);
        let unterminated = self.token_seen.then(|| preview(&pending));
        if !pending.is_empty() {
            emit(Unit {
                text: &pending,
                meta: UnitMeta {
                    kind: UnitKind::Trailing,
                    at_line_start: self.line_start,
                },
            })?;
        }

        self.scan_pos = 0;
        self.lexer = Lexer::new();
        self.token_seen = false;
        self.line_start = true;
        Ok(unterminated)
    }

    fn drain<F>(&mut self, at_eof: bool, emit: &mut F) -> io::Result<()>
    where
        F: FnMut(Unit<'_>) -> io::Result<()>,
    {
        let pending = std::mem::take(&mut self.pending);
        let result = self.drain_buffer(&pending, at_eof, emit);
        self.pending = pending;

        let start = result?;
        if start > 0 {
            self.pending.drain(..start);
            self.scan_pos -= start;
        }
        Ok(())
    }

    /// Emit every unit completed in `buf`. Returns the offset of the first
    /// byte not yet emitted.
    fn drain_buffer<F>(&mut self, buf: &str, at_eof: bool, emit: &mut F) -> io::Result<usize>
    where
        F: FnMut(Unit<'_>) -> io::Result<()>,
    {
        let bytes = buf.as_bytes();
        let mut start = 0;
        let mut i = self.scan_pos;

        while i < bytes.len() {
            let top = self.lexer.at_top_level_code();
            let ws = bytes[i].is_ascii_whitespace();

            if top && !ws && !self.token_seen && bytes[i].eq_ignore_ascii_case(&b'd') {
                match directive_end(&buf[i..], at_eof) {
                    Probe::NeedMore => break,
                    Probe::Found(len) => {
                        let end = i + len;
                        let args = &buf[i + "DELIMITER".len()..end];
                        if let Some(delim) = args.split_whitespace().next() {
                            self.delimiter = delim.to_string();
                        }
                        self.emit_unit(buf, start, end, UnitKind::Directive, emit)?;
                        start = end;
                        i = end;
                        continue;
                    }
                    Probe::Absent => {}
                }
            }

            if top && bytes[i..].starts_with(self.delimiter.as_bytes()) {
                let Some(end) = unit_end(bytes, i + self.delimiter.len(), at_eof) else {
                    break;
                };
                self.statements += 1;
                self.emit_unit(buf, start, end, UnitKind::Statement, emit)?;
                start = end;
                i = end;
                continue;
            }

            if top
                && !at_eof
                && bytes.len() - i < self.delimiter.len()
                && self.delimiter.as_bytes().starts_with(&bytes[i..])
            {
                break;
            }

            let step = self.lexer.step(bytes, i, at_eof);
            if step == Step::NeedMore {
                break;
            }
            if top && !ws && step != Step::Open && self.lexer.lex() != Lex::LineComment {
                self.token_seen = true;
            }
            i += step.consumed();
        }

        self.scan_pos = i;
        Ok(start)
    }

    fn emit_unit<F>(
        &mut self,
        buf: &str,
        start: usize,
        end: usize,
        kind: UnitKind,
        emit: &mut F,
    ) -> io::Result<()>
    where
        F: FnMut(Unit<'_>) -> io::Result<()>,
    {
        let text = &buf[start..end];
        emit(Unit {
            text,
            meta: UnitMeta {
                kind,
                at_line_start: self.line_start,
            },
        })?;
        self.line_start = text.ends_with('\n');
        self.token_seen = false;
        Ok(())
    }
}

/// End of a unit whose terminator ends at `pos`: swallow trailing spaces and
/// tabs plus one line break, if the line ends there. `None` means the answer
/// depends on bytes not yet received.
fn unit_end(bytes: &[u8], pos: usize, at_eof: bool) -> Option<usize> {
    let mut j = pos;
    while j < bytes.len() && matches!(bytes[j], b' ' | b'\t') {
        j += 1;
    }
    match bytes.get(j) {
        None if at_eof => Some(j),
        None => None,
        Some(b'\n') => Some(j + 1),
        Some(b'\r') => match bytes.get(j + 1) {
            None if !at_eof => None,
            Some(b'\n') => Some(j + 2),
            _ => Some(pos),
        },
        Some(_) => Some(pos),
    }
}

/// Length of a `DELIMITER x` line at the start of `text`, including its line
/// break.
fn directive_end(text: &str, at_eof: bool) -> Probe {
    const KEYWORD: &str = "DELIMITER";

    let bytes = text.as_bytes();
    if bytes.len() <= KEYWORD.len() {
        let partial = KEYWORD.as_bytes()[..bytes.len()].eq_ignore_ascii_case(bytes);
        return if partial && !at_eof {
            Probe::NeedMore
        } else {
            Probe::Absent
        };
    }
    if !bytes[..KEYWORD.len()].eq_ignore_ascii_case(KEYWORD.as_bytes())
        || !matches!(bytes[KEYWORD.len()], b' ' | b'\t')
    {
        return Probe::Absent;
    }

    match memchr::memchr(b'\n', bytes) {
        Some(nl) => Probe::Found(nl + 1),
        None if at_eof => Probe::Found(bytes.len()),
        None => Probe::NeedMore,
    }
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(PREVIEW_LEN) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(chunks: &[&str]) -> Vec<(String, UnitKind, bool)> {
        let mut asm = StatementAssembler::new();
        let mut out = Vec::new();
        let mut collect = |u: Unit<'_>| {
            out.push((u.text.to_string(), u.meta.kind, u.meta.at_line_start));
            Ok(())
        };
        for chunk in chunks {
            asm.push(chunk, &mut collect).unwrap();
        }
        asm.finish(&mut collect).unwrap();
        out
    }

    #[test]
    fn test_line_assembler_holds_partial_line() {
        let mut asm = LineAssembler::new();
        let mut seen = Vec::new();
        asm.push(b"ab\ncd", |t| {
            seen.push(t.to_string());
            Ok(())
        })
        .unwrap();
        asm.push(b"e\nf", |t| {
            seen.push(t.to_string());
            Ok(())
        })
        .unwrap();
        asm.finish(|t| {
            seen.push(t.to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["ab\n", "cde\n", "f"]);
        assert_eq!(asm.lines(), 3);
    }

    #[test]
    fn test_line_assembler_keeps_split_utf8_intact() {
        let bytes = "caf\u{e9}\n".as_bytes();
        let mut asm = LineAssembler::new();
        let mut text = String::new();
        for b in bytes {
            asm.push(std::slice::from_ref(b), |t| {
                text.push_str(t);
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(text, "caf\u{e9}\n");
    }

    #[test]
    fn test_statement_units_are_line_aligned() {
        let out = units(&["-- c\nSET a=1;\nINSERT INTO t VALUES (';');  \n"]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, "-- c\nSET a=1;\n");
        assert_eq!(out[1].0, "INSERT INTO t VALUES (';');  \n");
        assert!(out.iter().all(|u| u.1 == UnitKind::Statement && u.2));
    }

    #[test]
    fn test_terminator_mid_line() {
        let out = units(&["SET a=1; SET b=2;\n"]);
        assert_eq!(out[0].0, "SET a=1;");
        assert_eq!(out[1].0, " SET b=2;\n");
        assert!(!out[1].2);
    }

    #[test]
    fn test_chunking_is_invisible() {
        let input = "CREATE TABLE `t` (\n  `a` int -- x;\n) ENGINE=InnoDB;\n/*!50001 x; */;\r\nDELIMITER ;;\nCREATE TRIGGER x BEGIN SET a=1; END;;\nDELIMITER ;\ntail";
        let whole = units(&[input]);
        let pieces: Vec<String> = input.chars().map(String::from).collect();
        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        assert_eq!(units(&refs), whole);
        assert_eq!(whole.len(), 6);
        assert_eq!(whole[2].1, UnitKind::Directive);
        assert_eq!(whole[3].0, "CREATE TRIGGER x BEGIN SET a=1; END;;\n");
        assert_eq!(whole[5].1, UnitKind::Trailing);
    }

    #[test]
    fn test_unterminated_statement_reported() {
        let mut asm = StatementAssembler::new();
        asm.push("INSERT INTO t VALUES (1", |_| Ok(())).unwrap();
        let preview = asm.finish(|_| Ok(())).unwrap();
        assert_eq!(preview.as_deref(), Some("INSERT INTO t VALUES (1"));

        let mut asm = StatementAssembler::new();
        asm.push("-- Dump completed\n", |_| Ok(())).unwrap();
        assert_eq!(asm.finish(|_| Ok(())).unwrap(), None);
    }

    #[test]
    fn test_pending_is_compacted() {
        let mut asm = StatementAssembler::new();
        asm.push("SET a=1;\nSET b", |_| Ok(())).unwrap();
        assert_eq!(asm.buffered(), "SET b".len());
    }
}
