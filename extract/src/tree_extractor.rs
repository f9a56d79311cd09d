//! Syntax-tree extraction strategy.
//!
//! Parses the test source with tree-sitter (C or C++ grammar) and walks
//! preprocessor nodes for directive/clause recovery. Authoritative for
//! well-formed code: pragmas inside disabled `#if` regions or string
//! literals are not misread the way a line scan can misread them.
//! Annotations live in comments either way, so those still come from
//! the shared annotation scan.

use crate::scan;
use crate::types::Directive;
use crate::types::ExtractionResult;
use crate::Extract;
use crate::ExtractError;
use crate::ExtractResult;
use tree_sitter::Node;
use tree_sitter::Parser;

/// Source dialect hint, normally derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceLang {
    C,
    #[default]
    Cpp,
}

impl SourceLang {
    /// Dialect for a file extension; compiler regression corpora are
    /// C/C++ only, anything else gets the more permissive C++ grammar.
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "c" | "h" => Self::C,
            _ => Self::Cpp,
        }
    }

    fn grammar(self) -> tree_sitter::Language {
        match self {
            Self::C => tree_sitter_c::LANGUAGE.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }
}

/// Tree-sitter implementation of [`Extract`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeExtractor {
    lang: SourceLang,
}

impl TreeExtractor {
    pub const fn new(lang: SourceLang) -> Self {
        Self { lang }
    }

    fn parse_tree(&self, source: &str) -> ExtractResult<tree_sitter::Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.lang.grammar())
            .map_err(|e| ExtractError::GrammarUnavailable(e.to_string()))?;
        parser.parse(source, None).ok_or(ExtractError::ParseFailed)
    }

    fn collect_pragmas(node: Node<'_>, source: &str, directives: &mut Vec<Directive>) {
        if node.kind() == "preproc_call" {
            if let Some(directive) = pragma_from_preproc(node, source) {
                directives.push(directive);
            }
            // Pragmas do not nest; no need to descend further.
            return;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            Self::collect_pragmas(child, source, directives);
        }
    }
}

impl Extract for TreeExtractor {
    fn extract(&self, source: &str) -> ExtractResult<ExtractionResult> {
        let tree = self.parse_tree(source)?;

        let mut directives: Vec<Directive> = Vec::new();
        Self::collect_pragmas(tree.root_node(), source, &mut directives);
        // The per-test monotonic line invariant must hold regardless of
        // tree visit order.
        directives.sort_by_key(|d| d.line);

        let lines: Vec<&str> = source.lines().collect();
        let (error_patterns, run_commands) = scan::scan_annotations(&lines);

        Ok(ExtractionResult {
            directives,
            error_patterns,
            run_commands,
        })
    }
}

/// Build a [`Directive`] from a `preproc_call` node if it is an OpenMP
/// pragma. tree-sitter models `#pragma omp ...` as a `preproc_directive`
/// child (`#pragma`) plus a `preproc_arg` child carrying the rest of the
/// logical line, continuations already folded in.
fn pragma_from_preproc(node: Node<'_>, source: &str) -> Option<Directive> {
    let directive_kw = node.child_by_field_name("directive")?;
    if directive_kw.utf8_text(source.as_bytes()).ok()? != "#pragma" {
        return None;
    }
    let arg = node.child_by_field_name("argument")?;
    let arg_text = arg.utf8_text(source.as_bytes()).ok()?;
    let rest = arg_text.trim().strip_prefix("omp")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        // `ompx` and friends are not OpenMP pragmas.
        return None;
    }
    let body = rest.trim_start();

    // Physical continuations appear as `\` + newline inside the arg
    // text; fold them so the tokenizer sees one logical line.
    let folded = body.replace("\\\n", " ").replace("\\\r\n", " ");
    let (name, clauses) = scan::tokenize_pragma(&folded);
    if name.is_empty() {
        return None;
    }

    let raw = node
        .utf8_text(source.as_bytes())
        .ok()?
        .split('\n')
        .map(|l| l.trim().trim_end_matches('\\').trim_end())
        .collect::<Vec<_>>()
        .join(" ");

    Some(Directive {
        name,
        clauses,
        line: node.start_position().row as u32 + 1,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex_extractor::RegexExtractor;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"// RUN: %clang_cc1 -fopenmp -emit-llvm %s -o - | FileCheck %s

void work(int n) {
  int sum = 0;
#pragma omp parallel for reduction(+:sum)
  for (int i = 0; i < n; ++i)
    sum += i;
}
// CHECK: call void @__kmpc_fork_call
"#;

    #[test]
    fn recovers_directive_from_tree() {
        let result = TreeExtractor::new(SourceLang::C).extract(SAMPLE).unwrap();
        assert_eq!(result.directives.len(), 1);
        assert_eq!(result.directives[0].name, "parallel for");
        assert_eq!(result.directives[0].line, 5);
        assert_eq!(result.directives[0].clauses[0].shape(), "reduction(+:sum)");
        assert_eq!(result.run_commands.len(), 1);
        assert_eq!(
            result.run_commands[0].checks,
            vec!["CHECK: call void @__kmpc_fork_call"]
        );
    }

    #[test]
    fn non_omp_pragmas_are_ignored() {
        let src = "#pragma once\n#pragma GCC diagnostic push\n#pragma omp barrier\n";
        let result = TreeExtractor::new(SourceLang::Cpp).extract(src).unwrap();
        assert_eq!(result.directives.len(), 1);
        assert_eq!(result.directives[0].name, "barrier");
    }

    #[test]
    fn strategies_agree_on_well_formed_input() {
        let tree = TreeExtractor::new(SourceLang::C).extract(SAMPLE).unwrap();
        let rx = RegexExtractor::new().extract(SAMPLE).unwrap();
        let names = |r: &ExtractionResult| {
            r.directives
                .iter()
                .map(|d| (d.name.clone(), d.line))
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&tree), names(&rx));
        assert_eq!(tree.error_patterns, rx.error_patterns);
        assert_eq!(tree.run_commands, rx.run_commands);
    }
}
