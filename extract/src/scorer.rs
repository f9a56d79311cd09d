//! Complexity scoring.
//!
//! A deterministic weighted sum over structural features. The weights
//! are fixed constants so re-scoring the same extraction is always
//! bit-identical; retrieval ranking relies on that.

use crate::types::ExtractionResult;
use std::collections::BTreeSet;

/// Weight of the distinct-directive-name count.
pub const W_DIRECTIVES: f64 = 2.0;
/// Weight of the distinct-clause-name count across all directives.
pub const W_CLAUSES: f64 = 1.0;
/// Weight of the maximum nesting depth.
pub const W_NESTING: f64 = 1.5;
/// Weight of the expected-diagnostic count.
pub const W_ERRORS: f64 = 2.0;

/// Directives whose lines are at most this far apart are considered
/// adjacent for nesting-depth inference.
const ADJACENCY_WINDOW: u32 = 2;

/// Score an extraction. Pure; an extraction with zero directives and
/// zero error patterns scores exactly 0.0.
pub fn score(extraction: &ExtractionResult) -> f64 {
    let distinct_directives: BTreeSet<&str> = extraction
        .directives
        .iter()
        .map(|d| d.name.as_str())
        .collect();

    let distinct_clauses: BTreeSet<&str> = extraction
        .directives
        .iter()
        .flat_map(|d| d.clauses.iter())
        .map(|c| c.name.as_str())
        .collect();

    W_DIRECTIVES * distinct_directives.len() as f64
        + W_CLAUSES * distinct_clauses.len() as f64
        + W_NESTING * f64::from(max_nesting_depth(extraction))
        + W_ERRORS * extraction.error_patterns.len() as f64
}

/// Nesting depth inferred from directive line adjacency: the longest
/// run of directives each within [`ADJACENCY_WINDOW`] lines of the
/// previous one. Extraction does not see braces, so adjacency is the
/// proxy for lexical nesting.
fn max_nesting_depth(extraction: &ExtractionResult) -> u32 {
    let mut max_depth = 0u32;
    let mut depth = 0u32;
    let mut prev_line: Option<u32> = None;

    for directive in &extraction.directives {
        depth = match prev_line {
            Some(prev) if directive.line.saturating_sub(prev) <= ADJACENCY_WINDOW => depth + 1,
            _ => 1,
        };
        max_depth = max_depth.max(depth);
        prev_line = Some(directive.line);
    }

    max_depth
}
