//! Editing session over one document tree.
//!
//! # Responsibility
//! - Hold the installed tree, its undo history and the registry capability.
//! - Commit transactions: compute the new tree, check the scene partition,
//!   then install.
//! - Track lookup generations and in-flight location creations.
//!
//! # Invariants
//! - The installed tree is partitioned into scenes or empty.
//! - The tree is only replaced by `commit`, `undo`, `redo` and `replace_document`.
//! - Registry futures never hold a borrow of the editor.
//! - Undo and redo keep the current `collapsed` and `metaExpanded` flags of
//!   scenes present in both trees.

use super::{EditorError, EditorResult};
use crate::config::EditorConfig;
use crate::model::node::Node;
use crate::model::scene::{SceneAttrs, SceneId};
use crate::registry::EntityRegistry;
use crate::tree::history::History;
use crate::tree::migration::migrate_with_report;
use crate::tree::transaction::{NodeAttrs, Transaction};
use crate::tree::{Document, ScenePlacement};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Independent lookup channels; a new query supersedes only its own slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupSlot {
    Mention,
    Location,
}

impl LookupSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mention => "mention",
            Self::Location => "location",
        }
    }
}

/// Single-writer editing session.
pub struct SceneEditor {
    doc: Document,
    history: History,
    config: EditorConfig,
    registry: Arc<dyn EntityRegistry>,
    mention_generation: u64,
    location_generation: u64,
    pub(crate) pending_locations: HashSet<SceneId>,
}

impl SceneEditor {
    /// Starts a session over an empty document.
    pub fn new(registry: Arc<dyn EntityRegistry>, config: EditorConfig) -> Self {
        Self::with_document(Document::empty(), registry, config)
    }

    /// Starts a session over `doc`, migrating legacy content first.
    pub fn with_document(
        doc: Document,
        registry: Arc<dyn EntityRegistry>,
        config: EditorConfig,
    ) -> Self {
        let (doc, _) = migrate_with_report(&doc);
        info!(
            "event=editor_open module=service status=ok scene_count={} history_limit={}",
            doc.scene_count(),
            config.history_limit
        );
        Self {
            doc,
            history: History::new(config.history_limit),
            config,
            registry,
            mention_generation: 0,
            location_generation: 0,
            pending_locations: HashSet::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<dyn EntityRegistry> {
        Arc::clone(&self.registry)
    }

    /// Installs a different document, migrating it and clearing history.
    pub fn replace_document(&mut self, doc: Document) {
        let (doc, _) = migrate_with_report(&doc);
        self.doc = doc;
        self.history.clear();
        self.pending_locations.clear();
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Applies `tx` atomically and installs the result.
    ///
    /// # Errors
    /// - Step failures surface as `Position`/`Schema`.
    /// - A result that breaks the scene partition is rejected as `Schema`.
    pub fn apply_transaction(&mut self, tx: Transaction) -> EditorResult<()> {
        if tx.is_empty() {
            return Ok(());
        }
        let next = self.doc.apply(&tx)?;
        if let Some(violation) = next.partition_violation() {
            warn!(
                "event=tx_commit module=service status=error label={} reason=partition",
                tx.label()
            );
            return Err(violation.into());
        }
        let previous = std::mem::replace(&mut self.doc, next);
        if tx.adds_to_history() {
            self.history.record(previous);
        }
        debug!(
            "event=tx_commit module=service status=ok label={} steps={} history={}",
            tx.label(),
            tx.steps().len(),
            tx.adds_to_history()
        );
        Ok(())
    }

    /// Restores the state before the last recorded transaction.
    pub fn undo(&mut self) -> EditorResult<()> {
        let previous = self
            .history
            .undo(&self.doc)
            .ok_or(EditorError::HistoryEmpty)?;
        self.install_snapshot(previous);
        debug!("event=history_undo module=service status=ok");
        Ok(())
    }

    /// Re-applies the last undone transaction.
    pub fn redo(&mut self) -> EditorResult<()> {
        let next = self
            .history
            .redo(&self.doc)
            .ok_or(EditorError::HistoryEmpty)?;
        self.install_snapshot(next);
        debug!("event=history_redo module=service status=ok");
        Ok(())
    }

    /// Installs a history snapshot, keeping the current view flags.
    ///
    /// `collapsed` and `metaExpanded` are not recorded in history, so scenes
    /// present in both trees keep the flags they have now.
    fn install_snapshot(&mut self, mut snapshot: Document) {
        let flags: HashMap<SceneId, (bool, bool)> = self
            .doc
            .content()
            .iter()
            .filter_map(Node::as_scene)
            .map(|scene| (scene.id(), (scene.attrs.collapsed, scene.attrs.meta_expanded)))
            .collect();
        for node in snapshot.content_mut() {
            if let Node::Scene(scene) = node {
                if let Some(&(collapsed, meta_expanded)) = flags.get(&scene.id()) {
                    scene.attrs.collapsed = collapsed;
                    scene.attrs.meta_expanded = meta_expanded;
                }
            }
        }
        self.doc = snapshot;
    }

    pub(crate) fn placement(&self, id: SceneId) -> EditorResult<ScenePlacement<'_>> {
        self.doc
            .find_scene(id)
            .ok_or_else(|| EditorError::scene_not_found(id))
    }

    /// Rewrites one scene's attributes in a single transaction.
    ///
    /// Returns `false` without committing when `edit` leaves the attributes
    /// unchanged.
    pub(crate) fn edit_scene_attrs(
        &mut self,
        id: SceneId,
        label: &'static str,
        record_history: bool,
        edit: impl FnOnce(&mut SceneAttrs),
    ) -> EditorResult<bool> {
        let placement = self.placement(id)?;
        let mut attrs = placement.scene.attrs.clone();
        edit(&mut attrs);
        if attrs == placement.scene.attrs {
            return Ok(false);
        }
        let mut tx = Transaction::new(label).set_attrs(placement.from, NodeAttrs::Scene(attrs));
        if !record_history {
            tx = tx.without_history();
        }
        self.apply_transaction(tx)?;
        Ok(true)
    }

    /// Issues a new generation for `slot`, superseding older lookups.
    pub(crate) fn next_generation(&mut self, slot: LookupSlot) -> u64 {
        let generation = match slot {
            LookupSlot::Mention => &mut self.mention_generation,
            LookupSlot::Location => &mut self.location_generation,
        };
        *generation += 1;
        *generation
    }

    pub(crate) fn is_current(&self, slot: LookupSlot, generation: u64) -> bool {
        let current = match slot {
            LookupSlot::Mention => self.mention_generation,
            LookupSlot::Location => self.location_generation,
        };
        current == generation
    }
}

impl std::fmt::Debug for SceneEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneEditor")
            .field("scene_count", &self.doc.scene_count())
            .field("can_undo", &self.history.can_undo())
            .field("pending_locations", &self.pending_locations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::SceneEditor;
    use crate::config::EditorConfig;
    use crate::model::node::{Node, SchemaViolation};
    use crate::registry::InMemoryRegistry;
    use crate::service::EditorError;
    use crate::tree::transaction::Transaction;
    use crate::tree::Document;
    use std::sync::Arc;

    fn editor() -> SceneEditor {
        SceneEditor::new(Arc::new(InMemoryRegistry::new()), EditorConfig::default())
    }

    #[test]
    fn legacy_document_is_migrated_on_open() {
        let legacy = Document::from_nodes(vec![Node::paragraph("old")]).expect("legacy doc");
        let editor = SceneEditor::with_document(
            legacy,
            Arc::new(InMemoryRegistry::new()),
            EditorConfig::default(),
        );
        assert_eq!(editor.document().scene_count(), 1);
        assert!(!editor.can_undo());
    }

    #[test]
    fn commit_rejects_loose_top_level_blocks() {
        let mut editor = editor();
        let err = editor
            .apply_transaction(Transaction::new("test").insert(0, vec![Node::paragraph("x")]))
            .expect_err("loose block must be rejected");
        assert!(matches!(
            err,
            EditorError::Schema(SchemaViolation::LooseTopLevelBlock { .. })
        ));
        assert!(editor.document().is_empty());
        assert!(!editor.can_undo());
    }

    #[test]
    fn undo_on_fresh_editor_reports_empty_history() {
        let mut editor = editor();
        assert_eq!(editor.undo(), Err(EditorError::HistoryEmpty));
        assert_eq!(editor.redo(), Err(EditorError::HistoryEmpty));
        assert_eq!(EditorError::HistoryEmpty.kind(), "HistoryEmpty");
    }
}
