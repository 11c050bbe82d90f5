//! Core domain logic for Scenebook.
//!
//! A scene-segmented document tree with a weak entity reference layer:
//! - `model`: node, scene and entity types with allowed-content contracts.
//! - `tree`: positions, atomic transactions, history, wire format, migration.
//! - `service`: the single-writer `SceneEditor` and its command surface.
//! - `registry`: the external entity store capability.
//! - `db`/`repo`: SQLite reference persistence.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod service;
pub mod tree;

pub use config::{ConfigError, EditorConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{
    EntityDraft, EntityId, EntityKind, EntityMarkAttrs, EntityRecord, MentionAttrs,
};
pub use model::node::{Mark, Node, NodeType, OpaqueNode, SceneNode, SchemaViolation, TextRun};
pub use model::scene::{SceneAttrs, SceneId, ScenePatch, SceneStatus, ValidationError};
pub use registry::{EntityRegistry, InMemoryRegistry, RegistryError, RegistryResult};
pub use repo::document_repo::{
    DocumentId, DocumentRepoError, DocumentRepoResult, DocumentRepository, DocumentSummary,
    LoadedDocument, SceneIndexEntry, SqliteDocumentRepository,
};
pub use service::{
    Command, CommandOutcome, EditorError, EditorResult, MentionTrigger, NotFoundTarget,
    SceneEditor, SceneSummary, SplitOutcome,
};
pub use tree::migration::{migrate, MigrationReport};
pub use tree::transaction::{NodeAttrs, Step, Transaction};
pub use tree::wire::WireError;
pub use tree::{Document, PositionError, TreeError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
