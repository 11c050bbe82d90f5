//! Legacy document migration and load repairs.
//!
//! # Responsibility
//! - Wrap scene-less (legacy) content into one fresh draft scene.
//! - Repair partially partitioned trees so the scene invariants hold.
//!
//! # Invariants
//! - `migrate(migrate(doc)) == migrate(doc)`.
//! - An empty document stays empty.
//! - Text content and document order are preserved.

use super::Document;
use crate::model::node::{Node, SceneNode};
use crate::model::scene::SceneAttrs;
use log::info;
use std::collections::HashSet;
use uuid::Uuid;

/// What a migration pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Runs of loose top-level blocks wrapped into new scenes.
    pub wrapped_runs: usize,
    /// Scenes whose empty content received a placeholder paragraph.
    pub filled_scenes: usize,
    /// Scenes given a fresh id because an earlier scene already used theirs.
    pub reminted_ids: usize,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self == &Self::default()
    }
}

/// Returns the partitioned form of `doc`.
pub fn migrate(doc: &Document) -> Document {
    migrate_with_report(doc).0
}

/// Same as [`migrate`], also reporting which repairs were applied.
pub fn migrate_with_report(doc: &Document) -> (Document, MigrationReport) {
    let mut report = MigrationReport::default();
    if doc.is_empty() {
        return (doc.clone(), report);
    }

    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut out: Vec<Node> = Vec::with_capacity(doc.content().len());
    let mut loose: Vec<Node> = Vec::new();

    for node in doc.content() {
        match node {
            Node::Scene(scene) => {
                if !loose.is_empty() {
                    out.push(wrap(std::mem::take(&mut loose), &mut seen));
                    report.wrapped_runs += 1;
                }
                let mut scene = scene.clone();
                if !seen.insert(scene.id()) {
                    scene.attrs.id = fresh_id(&seen);
                    seen.insert(scene.id());
                    report.reminted_ids += 1;
                }
                if scene.content.is_empty() {
                    scene.content.push(Node::empty_paragraph());
                    report.filled_scenes += 1;
                }
                out.push(Node::Scene(scene));
            }
            other => loose.push(other.clone()),
        }
    }
    if !loose.is_empty() {
        out.push(wrap(loose, &mut seen));
        report.wrapped_runs += 1;
    }

    if report.is_noop() {
        return (doc.clone(), report);
    }
    info!(
        "event=doc_migrate module=tree status=ok wrapped_runs={} filled_scenes={} reminted_ids={} scene_count={}",
        report.wrapped_runs,
        report.filled_scenes,
        report.reminted_ids,
        out.len()
    );
    (Document::from_nodes_unchecked(out), report)
}

fn wrap(blocks: Vec<Node>, seen: &mut HashSet<Uuid>) -> Node {
    let attrs = SceneAttrs::with_id(fresh_id(seen));
    seen.insert(attrs.id);
    Node::Scene(SceneNode::new(attrs, blocks))
}

fn fresh_id(seen: &HashSet<Uuid>) -> Uuid {
    loop {
        let id = Uuid::new_v4();
        if !seen.contains(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{migrate, migrate_with_report};
    use crate::model::node::{Node, SceneNode};
    use crate::model::scene::{SceneAttrs, SceneStatus};
    use crate::tree::Document;

    fn legacy() -> Document {
        Document::from_nodes(vec![Node::paragraph("one"), Node::paragraph("two")])
            .expect("root accepts legacy blocks")
    }

    #[test]
    fn wraps_legacy_content_into_one_draft_scene() {
        let migrated = migrate(&legacy());
        assert_eq!(migrated.scene_count(), 1);
        assert!(migrated.partition_violation().is_none());
        let scene = migrated.content()[0].as_scene().expect("scene");
        assert_eq!(scene.attrs.status, SceneStatus::Draft);
        assert!(!scene.attrs.collapsed);
        assert_eq!(migrated.text_content(), "one\ntwo");
    }

    #[test]
    fn migration_is_idempotent() {
        let once = migrate(&legacy());
        let twice = migrate(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_document_is_left_alone() {
        let (migrated, report) = migrate_with_report(&Document::empty());
        assert!(migrated.is_empty());
        assert!(report.is_noop());
    }

    #[test]
    fn repairs_mixed_documents() {
        let shared = SceneAttrs::new();
        let doc = Document::from_nodes_unchecked(vec![
            Node::paragraph("before"),
            Node::Scene(SceneNode::new(shared.clone(), vec![Node::paragraph("a")])),
            Node::Scene(SceneNode::new(shared.clone(), Vec::new())),
            Node::HorizontalRule,
        ]);
        let (migrated, report) = migrate_with_report(&doc);
        assert_eq!(report.wrapped_runs, 2);
        assert_eq!(report.filled_scenes, 1);
        assert_eq!(report.reminted_ids, 1);
        assert_eq!(migrated.scene_count(), 4);
        assert!(migrated.partition_violation().is_none());
        assert_eq!(migrated.content()[1].as_scene().map(SceneNode::id), Some(shared.id));
    }
}
