//! Retrieval engine: ranked "top-N patterns for stage S" queries.
//!
//! Ranking is exact stage match, then complexity descending, then
//! ingestion order ascending, so identical repository state always
//! yields the identical ordered sequence. Summaries are compact,
//! prompt-ready renderings, never the full raw source.

use crate::error::StoreResult;
use crate::repository::PatternRepository;
use crate::repository::TestSummary;
use ompgen_extract::Stage;
use ompgen_extract::TestCase;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Compact textual rendering of a stored test, suitable for embedding
/// into a downstream generation prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub identity: String,
    pub stage: Stage,
    pub category: String,
    pub complexity: f64,
    /// Directive renderings: name plus clause shapes.
    pub directives: Vec<String>,
    /// Expected diagnostic messages with their severities.
    pub diagnostics: Vec<String>,
    /// Run command count, kept as a number; commands themselves are too
    /// corpus-specific to be useful prompt material.
    pub run_count: usize,
}

impl PatternSummary {
    fn from_case(case: &TestCase) -> Self {
        let directives = case
            .extraction
            .directives
            .iter()
            .map(|d| {
                if d.clauses.is_empty() {
                    d.name.clone()
                } else {
                    let shapes: Vec<String> = d.clauses.iter().map(|c| c.shape()).collect();
                    format!("{} [{}]", d.name, shapes.join(", "))
                }
            })
            .collect();
        let diagnostics = case
            .extraction
            .error_patterns
            .iter()
            .map(|p| format!("{}: {}", p.severity, p.message))
            .collect();
        Self {
            identity: case.identity.clone(),
            stage: case.stage,
            category: case.category.clone(),
            complexity: case.complexity,
            directives,
            diagnostics,
            run_count: case.extraction.run_commands.len(),
        }
    }
}

impl fmt::Display for PatternSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "# {} (stage={}, category={}, complexity={:.1})",
            self.identity, self.stage, self.category, self.complexity
        )?;
        for directive in &self.directives {
            writeln!(f, "  directive: {directive}")?;
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "  expects {diagnostic}")?;
        }
        write!(f, "  run lines: {}", self.run_count)
    }
}

/// Read-side engine over a [`PatternRepository`].
#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    repository: PatternRepository,
}

impl RetrievalEngine {
    pub const fn new(repository: PatternRepository) -> Self {
        Self { repository }
    }

    /// Top `limit` patterns for a stage. Asking for more than exists
    /// returns everything that matches; an empty corpus returns an
    /// empty vector.
    pub fn retrieve_similar(&self, stage: Stage, limit: usize) -> StoreResult<Vec<PatternSummary>> {
        let summaries: Vec<TestSummary> = self.repository.query(stage, None, limit)?;

        let mut patterns = Vec::with_capacity(summaries.len());
        for summary in summaries {
            match self.repository.load(&summary.identity)? {
                Some(case) => patterns.push(PatternSummary::from_case(&case)),
                None => {
                    // Deleted between query and load, or malformed;
                    // skip rather than failing the whole query.
                    warn!("stored record vanished during retrieval: {}", summary.identity);
                }
            }
        }
        Ok(patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ompgen_extract::Extractor;
    use ompgen_extract::SourceLang;
    use ompgen_extract::StrategyKind;
    use ompgen_extract::TestCase;
    use pretty_assertions::assert_eq;

    fn case(identity: &str, src: &str) -> TestCase {
        Extractor::new(StrategyKind::Regex).process_source(
            identity.to_string(),
            identity.to_string(),
            src,
            SourceLang::Cpp,
        )
    }

    fn codegen_src(extra_clauses: &str) -> String {
        format!(
            "// RUN: %clang_cc1 -fopenmp -emit-llvm %s -o - | FileCheck %s\n#pragma omp parallel for{extra_clauses}\n// CHECK: call void @__kmpc_fork_call\n"
        )
    }

    fn seeded_engine() -> RetrievalEngine {
        let repo = PatternRepository::open_in_memory().unwrap();
        // Two CodeGen tests of different complexity, several Sema tests.
        repo.ingest(&case("cg_simple.cpp", &codegen_src(""))).unwrap();
        repo.ingest(&case(
            "cg_rich.cpp",
            &codegen_src(" private(a) reduction(+:s) schedule(static, 2)"),
        ))
        .unwrap();
        for i in 0..10 {
            repo.ingest(&case(
                &format!("sema_{i}.cpp"),
                "#pragma omp parallel bad // expected-error {{unexpected token}}\n",
            ))
            .unwrap();
        }
        RetrievalEngine::new(repo)
    }

    #[test]
    fn retrieval_filters_stage_and_truncates() {
        let engine = seeded_engine();
        let results = engine.retrieve_similar(Stage::CodeGen, 5).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|p| p.stage == Stage::CodeGen));
        // Richer clause mix scores higher.
        assert_eq!(results[0].identity, "cg_rich.cpp");
        assert!(results[0].complexity > results[1].complexity);

        let capped = engine.retrieve_similar(Stage::Sema, 3).unwrap();
        assert_eq!(capped.len(), 3);
    }

    #[test]
    fn zero_limit_yields_an_empty_sequence() {
        let engine = seeded_engine();
        assert!(engine.retrieve_similar(Stage::Sema, 0).unwrap().is_empty());
    }

    #[test]
    fn repeated_queries_return_identical_sequences() {
        let engine = seeded_engine();
        let a = engine.retrieve_similar(Stage::Sema, 10).unwrap();
        let b = engine.retrieve_similar(Stage::Sema, 10).unwrap();
        assert_eq!(a, b);
        // Equal complexity ties break by ingestion order.
        let ids: Vec<&str> = a.iter().map(|p| p.identity.as_str()).collect();
        assert_eq!(ids[0], "sema_0.cpp");
        assert_eq!(ids[9], "sema_9.cpp");
    }

    #[test]
    fn empty_corpus_returns_empty_not_error() {
        let repo = PatternRepository::open_in_memory().unwrap();
        let engine = RetrievalEngine::new(repo);
        assert!(engine.retrieve_similar(Stage::CodeGen, 5).unwrap().is_empty());
    }

    #[test]
    fn summaries_render_directives_and_diagnostics_not_source() {
        let engine = seeded_engine();
        let results = engine.retrieve_similar(Stage::CodeGen, 1).unwrap();
        let rendered = results[0].to_string();
        assert!(rendered.contains("parallel for"));
        assert!(rendered.contains("reduction(+:s)"));
        assert!(!rendered.contains("#pragma"));
    }
}
