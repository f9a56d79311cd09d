//! Shared low-level scanners.
//!
//! Both extraction strategies funnel through the tokenizers in this
//! module: the regex strategy feeds it whole source lines, the
//! syntax-tree strategy feeds it pragma and comment node text. That is
//! what keeps the two strategies emitting identical record shapes.

use crate::types::Clause;
use crate::types::ErrorPattern;
use crate::types::RunCommand;
use crate::types::Severity;
use once_cell::sync::Lazy;
use regex::Regex;

/// Construct keywords that may continue a composite directive name
/// (`parallel for simd`, `target teams distribute`). A token outside
/// this set, or any token carrying parenthesized arguments, starts the
/// clause list instead.
const NAME_CONTINUATIONS: &[&str] = &[
    "data",
    "distribute",
    "do",
    "enter",
    "exit",
    "for",
    "loop",
    "masked",
    "master",
    "parallel",
    "sections",
    "simd",
    "target",
    "taskloop",
    "teams",
    "update",
    "workshare",
];

static PRAGMA_LINE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^\s*#\s*pragma\s+omp\s+(.*)$").unwrap()
});

static EXPECTED_DIAG: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"expected-(error|warning|note)(?:@[+\-]?[\w.]+)?(?:\s+\d+)?\s*\{\{(.*?)\}\}")
        .unwrap()
});

static EXPECTED_DIAG_LEGACY: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"expected-(error|warning|note)[^:{\n]*:\s*(.+)").unwrap()
});

static RUN_LINE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"//\s*RUN:\s*(.+)").unwrap()
});

static CHECK_LINE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^\s*//\s*([A-Z][A-Z0-9_-]{1,40}):\s*(.+)$").unwrap()
});

/// FileCheck suffixes that do not change which prefix a line belongs to.
static CHECK_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(-NEXT|-SAME|-DAG|-NOT|-LABEL|-EMPTY|-COUNT-\d+)$").unwrap()
});

/// Text of a pragma body if the line is an OpenMP pragma.
pub(crate) fn pragma_body(line: &str) -> Option<&str> {
    PRAGMA_LINE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Tokenize the body of an `omp` pragma into a composite construct name
/// and its ordered clause list.
///
/// Recovery is local: an unmatched `(` captures everything to the end of
/// the text as that clause's arguments and the scan stops there, so a
/// malformed clause list yields a best-effort partial record rather than
/// an error.
pub(crate) fn tokenize_pragma(body: &str) -> (String, Vec<Clause>) {
    let bytes = body.as_bytes();
    let mut pos = 0usize;
    let mut name_parts: Vec<&str> = Vec::new();
    let mut clauses: Vec<Clause> = Vec::new();
    let mut in_name = true;

    while pos < bytes.len() {
        // Skip separators between tokens. Commas are legal between
        // clauses in OpenMP 5.x.
        while pos < bytes.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b',') {
            pos += 1;
        }
        // A trailing comment ends the clause list; diagnostics in it are
        // the annotation scan's business.
        if pos + 1 < bytes.len()
            && bytes[pos] == b'/'
            && (bytes[pos + 1] == b'/' || bytes[pos + 1] == b'*')
        {
            break;
        }
        let start = pos;
        while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
            pos += 1;
        }
        if pos == start {
            // Not an identifier; stray delimiter or trailing backslash.
            pos += 1;
            continue;
        }
        let ident = &body[start..pos];

        // Peek for an argument list.
        let mut peek = pos;
        while peek < bytes.len() && bytes[peek].is_ascii_whitespace() {
            peek += 1;
        }
        let has_args = peek < bytes.len() && bytes[peek] == b'(';

        if in_name {
            if name_parts.is_empty() {
                name_parts.push(ident);
                continue;
            }
            if !has_args && NAME_CONTINUATIONS.contains(&ident) {
                name_parts.push(ident);
                continue;
            }
            in_name = false;
        }

        if !has_args {
            clauses.push(Clause::bare(ident));
            continue;
        }

        // Balanced-paren argument capture; arguments may themselves be
        // comma- or colon-delimited lists with nested parentheses.
        pos = peek + 1;
        let args_start = pos;
        let mut depth = 1usize;
        while pos < bytes.len() && depth > 0 {
            match bytes[pos] {
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ => {}
            }
            pos += 1;
        }
        let args_end = if depth == 0 { pos - 1 } else { bytes.len() };
        let args = body[args_start..args_end].trim();
        clauses.push(Clause::with_args(ident, args));
        if depth > 0 {
            // Unmatched delimiter: the rest of the text went into this
            // clause's arguments.
            break;
        }
    }

    (name_parts.join(" "), clauses)
}

/// Expected-diagnostic annotations found in a single comment's text.
///
/// The modern `{{message}}` form wins; the legacy `expected-error: msg`
/// form is only consulted when no braced annotation is present on the
/// line.
pub(crate) fn parse_expected_diagnostics(text: &str, line: u32) -> Vec<ErrorPattern> {
    let mut out = Vec::new();
    for caps in EXPECTED_DIAG.captures_iter(text) {
        let severity = match &caps[1] {
            "error" => Severity::Error,
            "warning" => Severity::Warning,
            _ => Severity::Note,
        };
        out.push(ErrorPattern {
            message: caps[2].trim().to_string(),
            severity,
            line,
        });
    }
    if out.is_empty() {
        if let Some(caps) = EXPECTED_DIAG_LEGACY.captures(text) {
            let severity = match &caps[1] {
                "error" => Severity::Error,
                "warning" => Severity::Warning,
                _ => Severity::Note,
            };
            out.push(ErrorPattern {
                message: caps[2].trim().to_string(),
                severity,
                line,
            });
        }
    }
    out
}

/// Content of a `RUN:` comment line, if any.
pub(crate) fn run_body(line: &str) -> Option<&str> {
    RUN_LINE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// A FileCheck-style assertion line: `(prefix, text)`. `RUN:` and lit
/// bookkeeping prefixes are never check lines.
pub(crate) fn check_parts(line: &str) -> Option<(&str, &str)> {
    let caps = CHECK_LINE.captures(line)?;
    let prefix = caps.get(1)?.as_str();
    let base = base_check_prefix(prefix);
    if matches!(base, "RUN" | "REQUIRES" | "UNSUPPORTED" | "XFAIL" | "DEFINE") {
        return None;
    }
    Some((prefix, caps.get(2)?.as_str()))
}

/// Strip `-NEXT`/`-DAG`/... suffixes down to the FileCheck prefix the
/// run command names.
pub(crate) fn base_check_prefix(prefix: &str) -> &str {
    match CHECK_SUFFIX.find(prefix) {
        Some(m) => &prefix[..m.start()],
        None => prefix,
    }
}

/// Attach collected check lines to their owning run commands.
///
/// A run command owns the lines whose base prefix it names via
/// `--check-prefix(es)`; default `CHECK` lines (and any prefix no run
/// names) go to the first FileCheck-invoking run. Orphan checks with no
/// FileCheck run at all are dropped.
pub(crate) fn associate_checks(runs: &mut [RunCommand], checks: Vec<(String, String)>) {
    if checks.is_empty() {
        return;
    }
    let first_filecheck = runs.iter().position(RunCommand::invokes_filecheck);
    for (prefix, text) in checks {
        let base = base_check_prefix(&prefix).to_string();
        let owner = runs
            .iter()
            .position(|run| run_names_prefix(&run.command, &base))
            .or(first_filecheck);
        if let Some(idx) = owner {
            runs[idx].checks.push(format!("{prefix}: {text}"));
        }
    }
}

/// Annotation pass shared by both strategies: expected diagnostics, run
/// commands (with `RUN:` continuation segments joined), and FileCheck
/// lines already attached to their owning runs.
///
/// Directive recovery is what differs between strategies; annotations
/// live in comments either way, so they always come from this scan.
pub(crate) fn scan_annotations(lines: &[&str]) -> (Vec<ErrorPattern>, Vec<RunCommand>) {
    let mut error_patterns: Vec<ErrorPattern> = Vec::new();
    let mut runs: Vec<RunCommand> = Vec::new();
    let mut checks: Vec<(String, String)> = Vec::new();

    let mut idx = 0usize;
    while idx < lines.len() {
        let line = lines[idx];
        let line_no = (idx + 1) as u32;

        error_patterns.extend(parse_expected_diagnostics(line, line_no));

        if let Some(cmd) = run_body(line) {
            let mut command = cmd.trim_end().to_string();
            while command.ends_with('\\') && idx + 1 < lines.len() {
                match run_body(lines[idx + 1]) {
                    Some(next) => {
                        command.pop();
                        command = format!("{} {}", command.trim_end(), next.trim_end());
                        idx += 1;
                    }
                    None => break,
                }
            }
            runs.push(RunCommand {
                command,
                line: line_no,
                checks: Vec::new(),
            });
        } else if let Some((prefix, text)) = check_parts(line) {
            checks.push((prefix.to_string(), text.to_string()));
        }
        idx += 1;
    }

    associate_checks(&mut runs, checks);
    (error_patterns, runs)
}

fn run_names_prefix(command: &str, base: &str) -> bool {
    command.split_whitespace().any(|tok| {
        tok.strip_prefix("--check-prefix=")
            .or_else(|| tok.strip_prefix("-check-prefix="))
            .is_some_and(|p| p == base)
            || tok
                .strip_prefix("--check-prefixes=")
                .or_else(|| tok.strip_prefix("-check-prefixes="))
                .is_some_and(|list| list.split(',').any(|p| p == base))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn composite_name_absorbs_construct_keywords() {
        let (name, clauses) = tokenize_pragma("target teams distribute parallel for simd");
        assert_eq!(name, "target teams distribute parallel for simd");
        assert!(clauses.is_empty());
    }

    #[test]
    fn clause_args_keep_colon_and_comma_lists() {
        let (name, clauses) =
            tokenize_pragma("parallel for reduction(+:sum) schedule(dynamic, 4) nowait");
        assert_eq!(name, "parallel for");
        assert_eq!(
            clauses,
            vec![
                Clause::with_args("reduction", "+:sum"),
                Clause::with_args("schedule", "dynamic, 4"),
                Clause::bare("nowait"),
            ]
        );
    }

    #[test]
    fn nested_parens_stay_balanced() {
        let (_, clauses) = tokenize_pragma("task if(omp_get_thread_num() > 0)");
        assert_eq!(
            clauses,
            vec![Clause::with_args("if", "omp_get_thread_num() > 0")]
        );
    }

    #[test]
    fn unmatched_paren_yields_partial_clause_not_panic() {
        let (name, clauses) = tokenize_pragma("parallel private(a, b");
        assert_eq!(name, "parallel");
        assert_eq!(clauses, vec![Clause::with_args("private", "a, b")]);
    }

    #[test]
    fn keyword_with_args_is_a_clause_not_a_name_part() {
        // `ordered(2)` trails `for`, so it must parse as a clause.
        let (name, clauses) = tokenize_pragma("for ordered(2) collapse(2)");
        assert_eq!(name, "for");
        assert_eq!(clauses[0], Clause::with_args("ordered", "2"));
    }

    #[test]
    fn trailing_comment_ends_clause_list() {
        let (name, clauses) =
            tokenize_pragma("parallel num_threads(4) // expected-error {{msg}}");
        assert_eq!(name, "parallel");
        assert_eq!(clauses, vec![Clause::with_args("num_threads", "4")]);
    }

    #[test]
    fn braced_diagnostic_wins_over_legacy_form() {
        let diags = parse_expected_diagnostics(
            "// expected-error {{unexpected OpenMP clause 'foo'}}",
            7,
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].message, "unexpected OpenMP clause 'foo'");
        assert_eq!(diags[0].line, 7);
    }

    #[test]
    fn line_offset_annotations_are_tolerated() {
        let diags =
            parse_expected_diagnostics("// expected-warning@+1 {{extra tokens at end}}", 3);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
    }

    #[test]
    fn multiple_annotations_on_one_line() {
        let diags = parse_expected_diagnostics(
            "// expected-error {{first}} expected-note {{second}}",
            9,
        );
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[1].severity, Severity::Note);
    }

    #[test]
    fn check_lines_exclude_lit_bookkeeping() {
        assert!(check_parts("// RUN: %clang %s").is_none());
        assert!(check_parts("// REQUIRES: x86-registered-target").is_none());
        let (prefix, text) = check_parts("// CHECK-NEXT: ret void").unwrap();
        assert_eq!(prefix, "CHECK-NEXT");
        assert_eq!(text, "ret void");
        assert_eq!(base_check_prefix(prefix), "CHECK");
    }

    #[test]
    fn checks_attach_to_prefix_naming_run() {
        let mut runs = vec![
            RunCommand {
                command: "%clang_cc1 -emit-llvm %s | FileCheck %s".to_string(),
                line: 1,
                checks: Vec::new(),
            },
            RunCommand {
                command: "%clang_cc1 -emit-llvm %s | FileCheck --check-prefix=OMP51 %s"
                    .to_string(),
                line: 2,
                checks: Vec::new(),
            },
        ];
        associate_checks(
            &mut runs,
            vec![
                ("CHECK".to_string(), "call void @__kmpc_fork_call".to_string()),
                ("OMP51-NEXT".to_string(), "ret void".to_string()),
            ],
        );
        assert_eq!(runs[0].checks, vec!["CHECK: call void @__kmpc_fork_call"]);
        assert_eq!(runs[1].checks, vec!["OMP51-NEXT: ret void"]);
    }
}
