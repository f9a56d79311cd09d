//! Pattern extraction from compiler regression-test sources.
//!
//! Parses loosely structured, comment-embedded test annotations —
//! OpenMP pragmas, expected-diagnostic comments, lit `RUN:` lines and
//! FileCheck assertions — into one structured [`ExtractionResult`]
//! shape, then classifies each test by compiler stage and category and
//! scores its structural complexity.
//!
//! Two interchangeable strategies share the output contract: a
//! tree-sitter based strategy (precise on well-formed code) and a
//! regex/line-scan strategy (always available). [`Extractor`] selects
//! between them and falls back silently when the syntax tree is
//! unavailable.

pub mod classifier;
pub mod error;
pub mod finder;
pub mod regex_extractor;
mod scan;
pub mod scorer;
pub mod tree_extractor;
pub mod types;

pub use error::ExtractError;
pub use error::ExtractResult;
pub use regex_extractor::RegexExtractor;
pub use tree_extractor::SourceLang;
pub use tree_extractor::TreeExtractor;
pub use types::Classification;
pub use types::Clause;
pub use types::Directive;
pub use types::ErrorPattern;
pub use types::ExtractionResult;
pub use types::RunCommand;
pub use types::Severity;
pub use types::Stage;
pub use types::TestCase;

use std::path::Path;
use tracing::debug;

/// The single capability both strategies implement: produce an
/// [`ExtractionResult`] from source text. Pure with respect to external
/// state.
pub trait Extract {
    fn extract(&self, source: &str) -> ExtractResult<ExtractionResult>;
}

/// Extraction strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Try the syntax tree, fall back to the line scan on failure.
    #[default]
    Auto,
    SyntaxTree,
    Regex,
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "tree" => Ok(Self::SyntaxTree),
            "regex" => Ok(Self::Regex),
            other => Err(format!("unknown strategy: {other} (auto|tree|regex)")),
        }
    }
}

/// Strategy-selecting facade over the two [`Extract`] implementations.
#[derive(Debug, Default, Clone, Copy)]
pub struct Extractor {
    kind: StrategyKind,
}

impl Extractor {
    pub const fn new(kind: StrategyKind) -> Self {
        Self { kind }
    }

    /// Extract from source text, `lang` hinting the grammar for the
    /// syntax-tree strategy.
    pub fn extract(&self, source: &str, lang: SourceLang) -> ExtractResult<ExtractionResult> {
        match self.kind {
            StrategyKind::Regex => RegexExtractor::new().extract(source),
            StrategyKind::SyntaxTree => TreeExtractor::new(lang).extract(source),
            StrategyKind::Auto => match TreeExtractor::new(lang).extract(source) {
                Ok(result) => Ok(result),
                Err(err) => {
                    // Missing-backend/parse failure is not an error in
                    // auto mode; the line scan handles anything textual.
                    debug!("syntax-tree strategy unavailable ({err}), falling back to regex");
                    RegexExtractor::new().extract(source)
                }
            },
        }
    }

    /// Full single-file analysis: read, extract, classify, score.
    ///
    /// The identity is the path relative to `corpus_root` (stable across
    /// re-ingestion from the same corpus). Returns `Unreadable` for
    /// non-text input; malformed directive syntax never errors.
    pub fn process_file(&self, path: &Path, corpus_root: &Path) -> ExtractResult<TestCase> {
        let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let source = String::from_utf8(bytes)
            .map_err(|_| ExtractError::Unreadable(path.display().to_string()))?;

        let identity = path
            .strip_prefix(corpus_root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| identity.clone());
        let lang = path
            .extension()
            .and_then(|e| e.to_str())
            .map(SourceLang::from_extension)
            .unwrap_or_default();

        Ok(self.process_source(identity, file_name, &source, lang))
    }

    /// Analysis over already-read source text.
    pub fn process_source(
        &self,
        identity: String,
        file_name: String,
        source: &str,
        lang: SourceLang,
    ) -> TestCase {
        // A frontend failure degrades to the line scan even when the
        // syntax-tree strategy was selected explicitly; the line scan
        // always produces a result for textual input.
        let extraction = match self.extract(source, lang) {
            Ok(extraction) => extraction,
            Err(err) => {
                debug!("extraction failed for {identity} ({err}), falling back to line scan");
                RegexExtractor::new().extract(source).unwrap_or_default()
            }
        };

        let classification = classifier::classify(&extraction);
        let complexity = scorer::score(&extraction);
        let compiler_flags = extraction.compiler_flags();
        let openmp_version = extraction.openmp_version();

        TestCase {
            identity,
            file_name,
            source: source.to_string(),
            stage: classification.stage,
            category: classification.category,
            complexity,
            line_count: source.lines().count() as u32,
            compiler_flags,
            openmp_version,
            extraction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn auto_strategy_produces_a_result_for_any_text() {
        let extractor = Extractor::new(StrategyKind::Auto);
        let result = extractor
            .extract("#pragma omp parallel\n", SourceLang::C)
            .unwrap();
        assert_eq!(result.directives.len(), 1);
    }

    #[test]
    fn process_file_uses_corpus_relative_identity() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("OpenMP");
        fs::create_dir(&sub).unwrap();
        let path = sub.join("parallel_ast_print.cpp");
        fs::write(&path, "#pragma omp parallel\n").unwrap();

        let case = Extractor::default().process_file(&path, dir.path()).unwrap();
        assert_eq!(case.identity, "OpenMP/parallel_ast_print.cpp");
        assert_eq!(case.file_name, "parallel_ast_print.cpp");
        assert_eq!(case.stage, Stage::Parse);
        assert!(case.complexity > 0.0);
    }

    #[test]
    fn every_strategy_recovers_directives_from_text() {
        // Pragma-bearing text must never ingest as an empty extraction,
        // whichever strategy the caller pinned.
        for kind in [StrategyKind::Auto, StrategyKind::SyntaxTree, StrategyKind::Regex] {
            let case = Extractor::new(kind).process_source(
                "t.c".to_string(),
                "t.c".to_string(),
                "#pragma omp parallel num_threads(2)\n",
                SourceLang::C,
            );
            assert_eq!(case.extraction.directives.len(), 1, "{kind:?}");
        }
    }

    #[test]
    fn binary_input_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.c");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let err = Extractor::default().process_file(&path, dir.path());
        assert!(matches!(err, Err(ExtractError::Unreadable(_))));
    }

    #[test]
    fn reduction_conflict_classifies_as_sema_via_regex_strategy() {
        let src = "\nvoid f() {\n int s = 0;\n#pragma omp parallel for reduction(+:s) private(s)\n for (int i = 0; i < 4; ++i)\n  s += i;\n // expected-error {{private variable cannot be reduction}}\n}\n";
        let case = Extractor::new(StrategyKind::Regex).process_source(
            "t.cpp".to_string(),
            "t.cpp".to_string(),
            src,
            SourceLang::Cpp,
        );
        assert_eq!(case.extraction.directives.len(), 1);
        assert_eq!(case.extraction.directives[0].clauses.len(), 2);
        assert_eq!(case.extraction.error_patterns.len(), 1);
        assert_eq!(case.extraction.error_patterns[0].line, 7);
        assert_eq!(case.stage, Stage::Sema);
        assert!(case.complexity > 0.0);
    }
}
