//! Stage and category classification.
//!
//! Deliberately table-driven rather than learned: the precedence order
//! is auditable and downstream retrieval ranking depends on it staying
//! fixed.

use crate::types::Classification;
use crate::types::ExtractionResult;
use crate::types::Severity;
use crate::types::Stage;

/// Category assigned when no table entry matches any directive.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Message fragments associated with semantic checking. Any
/// expected-error annotation counts as a Sema signal regardless of
/// wording; warnings and notes only count when their message hits one
/// of these.
const SEMA_VOCABULARY: &[&str] = &[
    "cannot",
    "expected",
    "incompatible",
    "invalid",
    "must be",
    "not allowed",
    "not declared",
    "redefinition",
    "undeclared",
];

/// Priority-ordered category table: first matching substring wins
/// within a directive name. Order is load-bearing; `parallel for`
/// classifies as `parallel`, not `worksharing`.
const CATEGORY_TABLE: &[(&str, &str)] = &[
    ("parallel", "parallel"),
    ("for", "worksharing"),
    ("sections", "worksharing"),
    ("section", "worksharing"),
    ("single", "worksharing"),
    ("workshare", "worksharing"),
    ("target", "target"),
    ("atomic", "synchronization"),
    ("barrier", "synchronization"),
    ("critical", "synchronization"),
    ("flush", "synchronization"),
    ("ordered", "synchronization"),
    ("simd", "simd"),
    ("task", "task"),
    ("threadprivate", "data-sharing"),
    ("declare", "data-sharing"),
];

/// Classify an extraction into `(stage, category)`. Total and
/// deterministic; an extraction with no distinguishing feature yields
/// `Parse` / `"uncategorized"`.
pub fn classify(extraction: &ExtractionResult) -> Classification {
    Classification {
        stage: infer_stage(extraction),
        category: infer_category(extraction),
    }
}

/// Stage precedence: Sema diagnostic vocabulary beats IR-emission run
/// lines beats the Parse default.
fn infer_stage(extraction: &ExtractionResult) -> Stage {
    let sema_hit = extraction.error_patterns.iter().any(|p| {
        p.severity == Severity::Error || {
            let msg = p.message.to_ascii_lowercase();
            SEMA_VOCABULARY.iter().any(|term| msg.contains(term))
        }
    });
    if sema_hit {
        return Stage::Sema;
    }

    let codegen_hit = extraction.run_commands.iter().any(|run| {
        run.invokes_filecheck() || run.command.contains("-emit-llvm")
    });
    if codegen_hit {
        return Stage::CodeGen;
    }

    Stage::Parse
}

/// First directive in source order that matches any table entry decides
/// the category. This is a documented tie-break: a file mixing
/// `parallel` and `task` directives classifies by whichever comes
/// first in the source.
fn infer_category(extraction: &ExtractionResult) -> String {
    for directive in &extraction.directives {
        if let Some(category) = category_for(&directive.name) {
            return category.to_string();
        }
    }
    UNCATEGORIZED.to_string()
}

fn category_for(name: &str) -> Option<&'static str> {
    CATEGORY_TABLE
        .iter()
        .find(|(needle, _)| name.contains(needle))
        .map(|(_, category)| *category)
}
