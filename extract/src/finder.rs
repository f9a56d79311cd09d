//! Corpus discovery: find candidate test files under a directory tree.

use crate::ExtractError;
use crate::ExtractResult;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use walkdir::WalkDir;

/// Extensions scanned by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["c", "cpp", "cc", "cxx"];

/// Content markers that identify a file as an OpenMP test. The sniff is
/// case-insensitive, mirroring how the corpus mixes `OpenMP` and
/// `openmp` spellings.
const OPENMP_MARKERS: &[&str] = &["#pragma omp", "-fopenmp", "openmp", "__kmpc_", "omp_"];

/// Walk `root` and return the sorted list of OpenMP test files.
///
/// Unreadable individual files are skipped with a debug log (batch
/// ingestion is file-granular); an unreadable root is an error.
pub fn find_test_files(root: &Path, extensions: &[&str]) -> ExtractResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(ExtractError::Io {
            path: root.display().to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "corpus root is not a directory",
            ),
        });
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e));
        if !ext_matches {
            continue;
        }
        if looks_like_openmp_test(path) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn looks_like_openmp_test(path: &Path) -> bool {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let lower = content.to_ascii_lowercase();
            OPENMP_MARKERS.iter().any(|marker| lower.contains(marker))
        }
        // Keep unreadable candidates; ingestion reports them per file
        // instead of the sniff hiding them.
        Err(err) => {
            debug!("cannot sniff {}: {err}", path.display());
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_openmp_files_and_skips_others() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("parallel_messages.cpp"),
            "#pragma omp parallel\n",
        )
        .unwrap();
        fs::write(dir.path().join("plain.cpp"), "int main() { return 0; }\n").unwrap();
        fs::write(dir.path().join("notes.md"), "#pragma omp parallel\n").unwrap();

        let files = find_test_files(dir.path(), DEFAULT_EXTENSIONS).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("parallel_messages.cpp"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no-such-dir");
        assert!(find_test_files(&missing, DEFAULT_EXTENSIONS).is_err());
    }

    #[test]
    fn results_are_sorted_for_determinism() {
        let dir = tempdir().unwrap();
        for name in ["b.c", "a.c", "c.c"] {
            fs::write(dir.path().join(name), "#pragma omp barrier\n").unwrap();
        }
        let files = find_test_files(dir.path(), DEFAULT_EXTENSIONS).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.c", "b.c", "c.c"]);
    }
}
