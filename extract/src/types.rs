//! Core types shared by both extraction strategies.
//!
//! Every strategy produces the same [`ExtractionResult`] shape so the
//! classifier, scorer, and repository never need to know which strategy
//! ran. Line numbers are 1-based and non-decreasing within each record
//! list, matching source order.

use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A named modifier attached to a directive, optionally carrying a
/// verbatim argument list (commas/colons inside the parentheses are kept
/// as written).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub name: String,
    pub args: Option<String>,
}

impl Clause {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
        }
    }

    pub fn with_args(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Some(args.into()),
        }
    }

    /// Render as `name` or `name(args)` for prompt summaries.
    pub fn shape(&self) -> String {
        match &self.args {
            Some(args) => format!("{}({})", self.name, args),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shape())
    }
}

/// A structured compiler annotation: a (possibly composite) construct
/// name plus an ordered clause list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    /// Construct name, e.g. `parallel` or `target teams distribute`.
    pub name: String,
    pub clauses: Vec<Clause>,
    /// 1-based source line of the pragma.
    pub line: u32,
    /// Verbatim pragma text, continuations joined.
    pub raw: String,
}

/// Severity keyword of an expected-diagnostic annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Note => "note",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            "note" => Ok(Self::Note),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// An inline annotation declaring an expected diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPattern {
    /// Literal expected message text, `{{ }}` delimiters stripped.
    pub message: String,
    pub severity: Severity,
    /// 1-based line of the annotation comment.
    pub line: u32,
}

/// A literal test-invocation line plus its associated FileCheck
/// assertion lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCommand {
    /// The invocation with `\` continuations joined into one line.
    pub command: String,
    /// 1-based line of the first `RUN:` segment.
    pub line: u32,
    /// CHECK lines owned by this run, verbatim.
    pub checks: Vec<String>,
}

impl RunCommand {
    /// Whether this run pipes output through FileCheck.
    pub fn invokes_filecheck(&self) -> bool {
        self.command.contains("FileCheck")
    }

    /// Distinct `-`-prefixed flags appearing in the command.
    pub fn flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = self
            .command
            .split_whitespace()
            .filter(|tok| tok.starts_with('-') && tok.len() > 1)
            .map(str::to_string)
            .collect();
        flags.sort();
        flags.dedup();
        flags
    }
}

/// Output contract shared by the syntax-tree and regex strategies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub directives: Vec<Directive>,
    pub error_patterns: Vec<ErrorPattern>,
    pub run_commands: Vec<RunCommand>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
            && self.error_patterns.is_empty()
            && self.run_commands.is_empty()
    }

    /// Distinct compiler flags across all run commands, sorted.
    pub fn compiler_flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = self
            .run_commands
            .iter()
            .flat_map(RunCommand::flags)
            .collect();
        flags.sort();
        flags.dedup();
        flags
    }

    /// OpenMP version requested by a `-fopenmp-version=NN` run flag,
    /// if any run carries one.
    pub fn openmp_version(&self) -> Option<String> {
        for cmd in &self.run_commands {
            if let Some(rest) = cmd
                .command
                .split_whitespace()
                .find_map(|tok| tok.strip_prefix("-fopenmp-version="))
            {
                return Some(rest.to_string());
            }
        }
        None
    }
}

/// The compiler phase a test targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Parse,
    Sema,
    CodeGen,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Sema => "sema",
            Self::CodeGen => "codegen",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parse" => Ok(Self::Parse),
            "sema" => Ok(Self::Sema),
            "codegen" => Ok(Self::CodeGen),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

/// Stage plus category label assigned by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub stage: Stage,
    /// Never empty; `"uncategorized"` when no table entry matched.
    pub category: String,
}

/// A fully analyzed test file, ready for ingestion. Immutable once
/// handed to the repository; re-ingesting the same identity replaces
/// the stored record wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Stable identity, normally the corpus-relative path.
    pub identity: String,
    pub file_name: String,
    /// Raw source text the extraction was produced from.
    pub source: String,
    pub stage: Stage,
    pub category: String,
    pub complexity: f64,
    pub line_count: u32,
    pub compiler_flags: Vec<String>,
    pub openmp_version: Option<String>,
    pub extraction: ExtractionResult,
}
