//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define document storage contracts.
//! - Isolate SQLite query details from editing services.
//!
//! # Invariants
//! - Repositories store wire JSON; they never interpret scene semantics
//!   beyond the partition check and scene index.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod document_repo;
