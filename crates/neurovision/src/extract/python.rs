//! Python import statements.
//!
//! Recognized forms:
//! - `import a.b`, `import a as x, b`
//! - `from a.b import c`, `from .x import y`, `from .. import (y, z)`
//!
//! A `from` import whose module part is only dots (`from . import y`)
//! references each imported name as a submodule (`.y`). When no such
//! submodule exists the name is taken from the package's `__init__.py`.

use regex::Regex;

use super::source::{CommentStyle, LineIndex, strip_comments};
use super::RawReference;
use crate::types::EdgeKind;

pub(crate) struct PythonPatterns {
    import: Regex,
    from_import: Regex,
}

impl PythonPatterns {
    pub(crate) fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            import: Regex::new(r"(?m)^[ \t]*import[ \t]+([^\n;]+)")?,
            from_import: Regex::new(
                r"(?m)^[ \t]*from[ \t]+(\.*[A-Za-z_0-9.]*)[ \t]+import[ \t]*(\([^)]*\)|[^\n;]+)",
            )?,
        })
    }

    pub(crate) fn references(&self, content: &str) -> Vec<RawReference> {
        let text = strip_comments(content, CommentStyle::Hash);
        let lines = LineIndex::new(&text);
        let mut refs = Vec::new();

        for caps in self.import.captures_iter(&text) {
            let Some(list) = caps.get(1) else { continue };
            let line = lines.line(list.start());
            for module in list.as_str().split(',').filter_map(first_word) {
                if is_dotted_name(module) {
                    refs.push(RawReference::new(module, EdgeKind::Import, line));
                }
            }
        }

        for caps in self.from_import.captures_iter(&text) {
            let (Some(module), Some(names)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let line = lines.line(module.start());
            let module = module.as_str();
            if module.is_empty() {
                continue;
            }
            if module.chars().all(|c| c == '.') {
                let names = names.as_str().trim_matches(|c| c == '(' || c == ')');
                for name in names.split(',').filter_map(first_word) {
                    if name != "*" && is_dotted_name(name) {
                        refs.push(RawReference::member(
                            format!("{module}{name}"),
                            EdgeKind::Import,
                            line,
                        ));
                    }
                }
            } else {
                refs.push(RawReference::new(module, EdgeKind::Import, line));
            }
        }

        refs
    }
}

fn first_word(item: &str) -> Option<&str> {
    item.split_whitespace().next()
}

fn is_dotted_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(content: &str) -> Vec<String> {
        PythonPatterns::new()
            .unwrap()
            .references(content)
            .into_iter()
            .map(|r| r.spec)
            .collect()
    }

    #[test]
    fn plain_imports() {
        assert_eq!(
            specs("import os\nimport a.b as ab, c\n"),
            vec!["os", "a.b", "c"]
        );
    }

    #[test]
    fn from_imports() {
        assert_eq!(
            specs("from a.b import c\nfrom .x import y\nfrom ..pkg.mod import z\n"),
            vec!["a.b", ".x", "..pkg.mod"]
        );
    }

    #[test]
    fn bare_relative_imports_expand_names() {
        assert_eq!(
            specs("from . import (alpha,\n    beta as b)\nfrom .. import *\n"),
            vec![".alpha", ".beta"]
        );
    }

    #[test]
    fn bare_relative_names_are_member_references() {
        let refs = PythonPatterns::new()
            .unwrap()
            .references("from . import helper
from .core import run
");
        assert!(refs[0].member);
        assert!(!refs[1].member);
    }

    #[test]
    fn comments_and_docstrings_are_ignored() {
        let content = "\"\"\"Module doc.\n\nimport fake\n\"\"\"\n# import hidden\nimport real  # import trailing\n";
        assert_eq!(specs(content), vec!["real"]);
    }

    #[test]
    fn indented_imports_are_found_with_line_numbers() {
        let refs = PythonPatterns::new()
            .unwrap()
            .references("def f():\n    import json\n");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].spec, "json");
        assert_eq!(refs[0].line, 2);
    }

    #[test]
    fn identifiers_containing_import_are_not_statements() {
        assert!(specs("important = 1\nreimport(x)\n").is_empty());
    }
}
