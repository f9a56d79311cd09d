//! Batch ingestion pipeline.
//!
//! Extraction, classification, and scoring are pure, so files run in
//! parallel on the rayon pool; the repository's write path serializes
//! per identity internally. Failures are file-granular: one unreadable
//! file logs and continues, only storage failures abort the batch.

use ompgen_extract::finder;
use ompgen_extract::Extractor;
use ompgen_extract::StrategyKind;
use ompgen_store::PatternRepository;
use ompgen_store::StoreResult;
use rayon::prelude::*;
use std::path::Path;
use tracing::info;
use tracing::warn;

/// Outcome counters for a batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub ingested: usize,
    pub failed: usize,
}

/// Analyze every test file under `corpus` and ingest the results.
///
/// Returns an error only for batch-fatal conditions: an unreadable
/// corpus root or an unavailable/failed store.
pub fn ingest_corpus(
    corpus: &Path,
    repository: &PatternRepository,
    strategy: StrategyKind,
    extensions: &[&str],
) -> anyhow::Result<IngestReport> {
    let files = finder::find_test_files(corpus, extensions)?;
    info!("found {} candidate test files under {}", files.len(), corpus.display());

    let extractor = Extractor::new(strategy);
    let results: Vec<StoreResult<bool>> = files
        .par_iter()
        .map(|path| {
            let case = match extractor.process_file(path, corpus) {
                Ok(case) => case,
                Err(err) => {
                    warn!("skipping {}: {err}", path.display());
                    return Ok(false);
                }
            };
            repository.ingest(&case)?;
            Ok(true)
        })
        .collect();

    let mut report = IngestReport::default();
    for result in results {
        // Store errors are batch-fatal; extraction failures were already
        // folded into `false` above.
        match result? {
            true => report.ingested += 1,
            false => report.failed += 1,
        }
    }

    info!(
        "ingest complete: {} stored, {} skipped",
        report.ingested, report.failed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ompgen_extract::finder::DEFAULT_EXTENSIONS;
    use ompgen_extract::Stage;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn batch_continues_past_unreadable_files() {
        let corpus = tempdir().unwrap();
        fs::write(
            corpus.path().join("good.cpp"),
            "#pragma omp parallel // expected-error {{bad}}\n",
        )
        .unwrap();
        // Starts with an OpenMP marker so the finder picks it up, but
        // the rest is not valid UTF-8.
        let mut bad = b"// omp_ marker\n".to_vec();
        bad.extend_from_slice(&[0xff, 0xfe, 0x80]);
        fs::write(corpus.path().join("bad.cpp"), bad).unwrap();

        let repo = PatternRepository::open_in_memory().unwrap();
        let report =
            ingest_corpus(corpus.path(), &repo, StrategyKind::Regex, DEFAULT_EXTENSIONS).unwrap();

        assert_eq!(report, IngestReport { ingested: 1, failed: 1 });
        assert_eq!(repo.query(Stage::Sema, None, 10).unwrap().len(), 1);
    }

    #[test]
    fn missing_corpus_root_is_fatal() {
        let dir = tempdir().unwrap();
        let repo = PatternRepository::open_in_memory().unwrap();
        let result = ingest_corpus(
            &dir.path().join("missing"),
            &repo,
            StrategyKind::Regex,
            DEFAULT_EXTENSIONS,
        );
        assert!(result.is_err());
    }
}
