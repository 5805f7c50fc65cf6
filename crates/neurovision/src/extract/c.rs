//! C and C++ `#include` directives.
//!
//! Quoted includes keep their path; system includes keep the angle brackets
//! so the resolver can tell them apart.

use regex::Regex;

use super::source::{CommentStyle, LineIndex, strip_comments};
use super::RawReference;
use crate::types::EdgeKind;

const QUOTES: &[char] = &['\''];

pub(crate) struct IncludePatterns {
    include: Regex,
}

impl IncludePatterns {
    pub(crate) fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            include: Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*(<[^>\n]+>|"[^"\n]+")"#)?,
        })
    }

    pub(crate) fn references(&self, content: &str) -> Vec<RawReference> {
        // Double quotes are left out of the string set so `#include "x.h"`
        // is visible to the pattern.
        let text = strip_comments(content, CommentStyle::Slash(QUOTES));
        let lines = LineIndex::new(&text);
        self.include
            .captures_iter(&text)
            .filter_map(|caps| caps.get(1))
            .map(|m| {
                let spec = m.as_str();
                let spec = spec.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(spec);
                RawReference::new(spec, EdgeKind::Include, lines.line(m.start()))
            })
            .collect()
    }
}
