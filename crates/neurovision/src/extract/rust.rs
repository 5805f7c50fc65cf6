//! Rust `mod` declarations and `use` paths.
//!
//! One level of braces is expanded: `use crate::{a, b::c, d::{e, f}}` yields
//! `crate::a`, `crate::b::c` and `crate::d`. Paths into other crates are
//! reduced to the crate name.

use regex::Regex;

use super::source::{CommentStyle, LineIndex, strip_comments};
use super::RawReference;
use crate::types::EdgeKind;

const QUOTES: &[char] = &['"'];

pub(crate) struct RustPatterns {
    module: Regex,
    use_path: Regex,
}

impl RustPatterns {
    pub(crate) fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            module: Regex::new(
                r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?mod[ \t]+([A-Za-z_]\w*)[ \t]*;",
            )?,
            use_path: Regex::new(
                r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?use[ \t]+((?:::)?[A-Za-z_]\w*(?:::[A-Za-z_]\w*)*)",
            )?,
        })
    }

    pub(crate) fn references(&self, content: &str) -> Vec<RawReference> {
        let text = strip_comments(content, CommentStyle::Slash(QUOTES));
        let lines = LineIndex::new(&text);
        let mut refs = Vec::new();

        for caps in self.module.captures_iter(&text) {
            if let Some(name) = caps.get(1) {
                refs.push(RawReference::new(
                    name.as_str(),
                    EdgeKind::Module,
                    lines.line(name.start()),
                ));
            }
        }

        for caps in self.use_path.captures_iter(&text) {
            let Some(prefix) = caps.get(1) else { continue };
            let line = lines.line(prefix.start());
            let prefix_str = prefix.as_str().trim_start_matches("::");
            match brace_group(&text[prefix.end()..]) {
                Some(group) => {
                    for item in split_top_level(group) {
                        let path = match item.split_whitespace().next().unwrap_or_default() {
                            "" => continue,
                            "self" | "*" => prefix_str.to_string(),
                            nested => {
                                let head = nested.split("::{").next().unwrap_or(nested);
                                format!("{prefix_str}::{}", head.trim_end_matches("::*"))
                            }
                        };
                        refs.push(reference(&path, line));
                    }
                }
                None => refs.push(reference(prefix_str, line)),
            }
        }

        refs
    }
}

/// Contents of a `::{ ... }` group directly after a use prefix.
fn brace_group(rest: &str) -> Option<&str> {
    let body = rest.strip_prefix("::{")?;
    let mut depth = 1usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[..i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on commas that are not inside nested braces.
fn split_top_level(group: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in group.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(group[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(group[start..].trim());
    items
}

/// Local paths stay whole; external paths shrink to the crate name.
fn reference(path: &str, line: usize) -> RawReference {
    let first = path.split("::").next().unwrap_or(path);
    let spec = match first {
        "crate" | "self" | "super" => path,
        other => other,
    };
    RawReference::new(spec, EdgeKind::Import, line)
}
