//! End-to-end ingest → retrieve coverage over a file-backed
//! repository: extraction output survives a disk round trip and the
//! ranking contract holds across reopen.

use ompgen_extract::Extractor;
use ompgen_extract::SourceLang;
use ompgen_extract::Stage;
use ompgen_extract::StrategyKind;
use ompgen_extract::TestCase;
use ompgen_store::PatternRepository;
use ompgen_store::RetrievalEngine;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn case(identity: &str, src: &str) -> TestCase {
    Extractor::new(StrategyKind::Regex).process_source(
        identity.to_string(),
        identity.to_string(),
        src,
        SourceLang::Cpp,
    )
}

const SEMA_SRC: &str = "// RUN: %clang_cc1 -fopenmp -verify %s\n#pragma omp parallel for collapse(2) ordered(1) // expected-error {{the parameter of the 'ordered' clause must be greater than or equal to the parameter of the 'collapse' clause}}\nvoid f();\n";

#[test]
fn repository_survives_reopen_with_identical_ranking() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("patterns.db");

    let before = {
        let repo = PatternRepository::open(&db).unwrap();
        repo.ingest(&case("sema_collapse.cpp", SEMA_SRC)).unwrap();
        repo.ingest(&case(
            "sema_plain.cpp",
            "#pragma omp single // expected-error {{bad}}\n",
        ))
        .unwrap();
        RetrievalEngine::new(repo)
            .retrieve_similar(Stage::Sema, 10)
            .unwrap()
    };

    let repo = PatternRepository::open(&db).unwrap();
    let after = RetrievalEngine::new(repo)
        .retrieve_similar(Stage::Sema, 10)
        .unwrap();

    assert_eq!(before, after);
    assert_eq!(after[0].identity, "sema_collapse.cpp");
}

#[test]
fn round_trip_preserves_directive_names_and_messages() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("patterns.db");
    let repo = PatternRepository::open(&db).unwrap();

    let original = case("sema_collapse.cpp", SEMA_SRC);
    repo.ingest(&original).unwrap();

    let loaded = repo.load("sema_collapse.cpp").unwrap().unwrap();
    assert_eq!(loaded.extraction.directives, original.extraction.directives);
    assert_eq!(
        loaded.extraction.error_patterns,
        original.extraction.error_patterns
    );
    assert_eq!(
        loaded.extraction.run_commands,
        original.extraction.run_commands
    );
}

#[test]
fn idempotent_reingest_leaves_results_unchanged() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("patterns.db");
    let repo = PatternRepository::open(&db).unwrap();

    repo.ingest(&case("a.cpp", SEMA_SRC)).unwrap();
    repo.ingest(&case("b.cpp", SEMA_SRC)).unwrap();
    let engine = RetrievalEngine::new(repo.clone());
    let before = engine.retrieve_similar(Stage::Sema, 10).unwrap();

    repo.ingest(&case("a.cpp", SEMA_SRC)).unwrap();
    let after = engine.retrieve_similar(Stage::Sema, 10).unwrap();

    assert_eq!(before, after);
}

#[test]
fn parallel_ingest_of_distinct_identities_is_complete() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("patterns.db");
    let repo = PatternRepository::open(&db).unwrap();

    std::thread::scope(|scope| {
        for chunk in 0..4 {
            let repo = repo.clone();
            scope.spawn(move || {
                for i in 0..8 {
                    let identity = format!("t_{chunk}_{i}.cpp");
                    repo.ingest(&case(&identity, "#pragma omp parallel\n"))
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(repo.count().unwrap(), 32);
}
