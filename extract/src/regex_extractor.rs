//! Line-oriented extraction strategy.
//!
//! Always available and used as the fallback when the syntax-tree
//! strategy is unavailable or fails. Lower fidelity than a real parse
//! (it will happily read pragmas inside `#if 0` blocks) but it never
//! rejects textual input.

use crate::scan;
use crate::types::Directive;
use crate::types::ExtractionResult;
use crate::Extract;
use crate::ExtractResult;

/// Regex/line-scan implementation of [`Extract`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexExtractor;

impl RegexExtractor {
    pub const fn new() -> Self {
        Self
    }
}

impl Extract for RegexExtractor {
    fn extract(&self, source: &str) -> ExtractResult<ExtractionResult> {
        let lines: Vec<&str> = source.lines().collect();

        // Directive pass: pragma lines with `\` continuations joined.
        let mut directives: Vec<Directive> = Vec::new();
        let mut idx = 0usize;
        while idx < lines.len() {
            let line = lines[idx];
            let line_no = (idx + 1) as u32;
            if let Some(body) = scan::pragma_body(line) {
                let mut body = body.trim_end().to_string();
                let mut raw = line.trim().to_string();
                while body.ends_with('\\') && idx + 1 < lines.len() {
                    body.pop();
                    idx += 1;
                    let cont = lines[idx].trim();
                    body.push(' ');
                    body.push_str(cont.trim_end_matches('\\').trim_end());
                    if cont.ends_with('\\') {
                        body.push('\\');
                    }
                    raw.push(' ');
                    raw.push_str(cont);
                }
                let (name, clauses) = scan::tokenize_pragma(&body);
                if !name.is_empty() {
                    directives.push(Directive {
                        name,
                        clauses,
                        line: line_no,
                        raw,
                    });
                }
            }
            idx += 1;
        }

        // Annotation pass is shared with the syntax-tree strategy and
        // runs over every line, so diagnostics trailing a pragma are
        // still captured.
        let (error_patterns, run_commands) = scan::scan_annotations(&lines);

        Ok(ExtractionResult {
            directives,
            error_patterns,
            run_commands,
        })
    }
}
