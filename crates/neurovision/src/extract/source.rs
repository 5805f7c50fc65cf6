//! Source text preparation shared by the language pattern sets.

use std::path::Path;
use xxhash_rust::xxh64::xxh64;

use crate::error::ParseWarning;

/// Comment syntax of a language family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommentStyle {
    /// `#` line comments; string contents are blanked (Python)
    Hash,
    /// `//` and `/* */` comments; strings delimited by the given quotes are
    /// kept verbatim
    Slash(&'static [char]),
}

/// A decoded source file.
#[derive(Debug, Clone)]
pub struct SourceText {
    /// UTF-8 content
    pub content: String,
    /// xxHash64 of the raw bytes
    pub content_hash: u64,
}

/// Read a file as UTF-8 and hash its bytes.
///
/// # Errors
///
/// Returns a `ParseWarning` if the file cannot be read or is not valid UTF-8.
pub fn load_source(path: &Path) -> Result<SourceText, ParseWarning> {
    let bytes = std::fs::read(path).map_err(|e| ParseWarning::io_error(path.to_path_buf(), &e))?;
    let content_hash = xxh64(&bytes, 0);
    let content =
        String::from_utf8(bytes).map_err(|_| ParseWarning::encoding_error(path.to_path_buf()))?;
    Ok(SourceText {
        content,
        content_hash,
    })
}

#[derive(Clone, Copy)]
enum State {
    Code,
    LineComment,
    BlockComment,
    Str(char),
    TripleStr(char),
}

/// Replace comments with spaces, keeping newlines so line numbers survive.
///
/// With [`CommentStyle::Hash`] string literal contents are blanked too, so
/// docstrings never look like import statements.
pub(crate) fn strip_comments(content: &str, style: CommentStyle) -> String {
    let mut out = String::with_capacity(content.len());
    let mut state = State::Code;
    let mut chars = content.chars().peekable();
    let blank = |c: char| if c == '\n' { '\n' } else { ' ' };

    while let Some(c) = chars.next() {
        match state {
            State::Code => match (style, c) {
                (CommentStyle::Hash, '#') => {
                    state = State::LineComment;
                    out.push(' ');
                }
                (CommentStyle::Hash, '"' | '\'') => {
                    let mut run = 1;
                    while run < 3 && chars.peek() == Some(&c) {
                        chars.next();
                        run += 1;
                    }
                    for _ in 0..run {
                        out.push(c);
                    }
                    state = match run {
                        3 => State::TripleStr(c),
                        2 => State::Code,
                        _ => State::Str(c),
                    };
                }
                (CommentStyle::Slash(_), '/') if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                    out.push_str("  ");
                }
                (CommentStyle::Slash(_), '/') if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                (CommentStyle::Slash(quotes), q) if quotes.contains(&q) => {
                    state = State::Str(q);
                    out.push(q);
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                }
                out.push(blank(c));
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else {
                    out.push(blank(c));
                }
            }
            State::Str(q) => {
                let keep = matches!(style, CommentStyle::Slash(_));
                if c == '\\' {
                    out.push(if keep { c } else { ' ' });
                    if let Some(next) = chars.next() {
                        out.push(if keep { next } else { blank(next) });
                    }
                } else if c == q {
                    state = State::Code;
                    out.push(c);
                } else if c == '\n' && style == CommentStyle::Hash {
                    // Unterminated single-line string; resync at end of line.
                    state = State::Code;
                    out.push('\n');
                } else {
                    out.push(if keep { c } else { blank(c) });
                }
            }
            State::TripleStr(q) => {
                if c == '\\' {
                    out.push(' ');
                    if let Some(next) = chars.next() {
                        out.push(blank(next));
                    }
                } else if c == q && chars.peek() == Some(&q) {
                    chars.next();
                    if chars.peek() == Some(&q) {
                        chars.next();
                        state = State::Code;
                        out.push(q);
                        out.push(q);
                        out.push(q);
                    } else {
                        out.push_str("  ");
                    }
                } else {
                    out.push(blank(c));
                }
            }
        }
    }
    out
}

/// Maps byte offsets to 1-based line numbers.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub(crate) fn new(text: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    pub(crate) fn line(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}
