//! JavaScript and TypeScript module references.

use regex::Regex;

use super::source::{CommentStyle, LineIndex, strip_comments};
use super::RawReference;
use crate::types::EdgeKind;

const QUOTES: &[char] = &['"', '\'', '`'];

pub(crate) struct JsPatterns {
    import: Regex,
    export_from: Regex,
    require: Regex,
    dynamic_import: Regex,
}

impl JsPatterns {
    pub(crate) fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            import: Regex::new(
                r#"(?m)^[ \t]*import[ \t]+(?:[\w*\s{},$]*?\s*from\s*)?['"]([^'"\n]+)['"]"#,
            )?,
            export_from: Regex::new(
                r#"(?m)^[ \t]*export\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s*['"]([^'"\n]+)['"]"#,
            )?,
            require: Regex::new(r#"\brequire\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#)?,
            dynamic_import: Regex::new(r#"\bimport\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#)?,
        })
    }

    pub(crate) fn references(&self, content: &str) -> Vec<RawReference> {
        let text = strip_comments(content, CommentStyle::Slash(QUOTES));
        let lines = LineIndex::new(&text);
        let mut refs = Vec::new();

        let patterns = [
            (&self.import, EdgeKind::Import),
            (&self.export_from, EdgeKind::Import),
            (&self.require, EdgeKind::Require),
            (&self.dynamic_import, EdgeKind::Require),
        ];
        for (pattern, kind) in patterns {
            for caps in pattern.captures_iter(&text) {
                if let Some(spec) = caps.get(1) {
                    refs.push(RawReference::new(
                        spec.as_str(),
                        kind,
                        lines.line(spec.start()),
                    ));
                }
            }
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn refs(content: &str) -> Vec<(String, EdgeKind)> {
        JsPatterns::new()
            .unwrap()
            .references(content)
            .into_iter()
            .map(|r| (r.spec, r.kind))
            .collect()
    }

    #[rstest]
    #[case::default_import("import React from 'react';", "react")]
    #[case::named_import("import { a, b as c } from \"./util\";", "./util")]
    #[case::namespace_import("import * as fs from 'node:fs'", "node:fs")]
    #[case::side_effect("import './styles.css';", "./styles.css")]
    #[case::type_import("import type { Props } from '../types'", "../types")]
    #[case::no_space_before_brace("import {x} from'./x'", "./x")]
    fn import_forms(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(refs(source), vec![(expected.to_string(), EdgeKind::Import)]);
    }

    #[test]
    fn multi_line_named_import() {
        let source = "import {\n  alpha,\n  beta,\n} from './letters';\n";
        let found = JsPatterns::new().unwrap().references(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].spec, "./letters");
        assert_eq!(found[0].line, 4);
    }

    #[test]
    fn re_exports() {
        assert_eq!(
            refs("export * from './a';\nexport { b } from './b';\nexport const c = 1;\n"),
            vec![
                ("./a".to_string(), EdgeKind::Import),
                ("./b".to_string(), EdgeKind::Import),
            ]
        );
    }

    #[test]
    fn require_and_dynamic_import() {
        assert_eq!(
            refs("const x = require('./x');\nconst y = await import(\"./y\");\n"),
            vec![
                ("./x".to_string(), EdgeKind::Require),
                ("./y".to_string(), EdgeKind::Require),
            ]
        );
    }

    #[test]
    fn commented_imports_are_ignored() {
        let source = "// import a from './a';\n/*\nimport b from './b';\n*/\nimport c from 'http://cdn/c.js';\n";
        assert_eq!(
            refs(source),
            vec![("http://cdn/c.js".to_string(), EdgeKind::Import)]
        );
    }
}
