//! Normalized pattern repository and retrieval engine.
//!
//! Stores analyzed test cases in an embedded SQLite database with a
//! fully normalized schema (tests, directives, shared clause
//! vocabulary, error patterns, run commands) and answers ranked
//! stage-similarity queries over it.

pub mod error;
pub mod repository;
pub mod retrieval;
pub mod schema;

pub use error::StoreError;
pub use error::StoreResult;
pub use repository::PatternRepository;
pub use repository::RepositoryStats;
pub use repository::TestSummary;
pub use retrieval::PatternSummary;
pub use retrieval::RetrievalEngine;
