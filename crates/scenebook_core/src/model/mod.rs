//! Domain model for scene-segmented documents.
//!
//! # Responsibility
//! - Define the node tree, scene metadata and entity reference payloads.
//! - Declare allowed-content contracts used by every tree edit.
//!
//! # Invariants
//! - Every scene is identified by a stable `SceneId`.
//! - Entity references are weak: ids plus cached labels, never owned records.

pub mod entity;
pub mod node;
pub mod scene;
