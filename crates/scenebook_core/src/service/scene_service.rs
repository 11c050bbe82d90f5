//! Scene partition operations.
//!
//! # Responsibility
//! - Insert, split, merge, move and delete scene containers.
//! - Update scene metadata through validated patches.
//! - Answer derived queries (numbering, summaries, scene text).
//!
//! # Invariants
//! - New scenes always receive fresh ids; existing ids never change.
//! - Every scene keeps at least one block of content.
//! - Scene numbers are derived from document order and never stored.
//!
//! # See also
//! - `crate::model::scene`

use super::editor::SceneEditor;
use super::{EditorError, EditorResult};
use crate::model::node::{Node, SceneNode};
use crate::model::scene::{SceneAttrs, SceneId, ScenePatch, SceneStatus};
use crate::tree::fragment::{plain_text, split_fragment};
use crate::tree::transaction::Transaction;
use crate::tree::PositionError;
use log::info;
use serde::Serialize;
use serde_json::Value;

/// Ids of both halves of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitOutcome {
    /// Original scene, keeping its id and attributes.
    pub left_id: SceneId,
    /// New scene holding the content after the cursor.
    pub right_id: SceneId,
}

/// Read model of one scene for list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneSummary {
    /// 1-based number in document order.
    pub number: usize,
    pub id: SceneId,
    pub title: String,
    pub status: SceneStatus,
    pub collapsed: bool,
    pub location: String,
    pub participant_count: usize,
    /// Position before the scene's open token.
    pub from: usize,
    /// Position after the scene's close token.
    pub to: usize,
}

impl SceneEditor {
    /// Inserts a fresh draft scene holding one empty paragraph.
    ///
    /// `at` must be a top-level boundary; `None` appends after the last
    /// scene.
    pub fn insert_scene(
        &mut self,
        at: Option<usize>,
        initial: ScenePatch,
    ) -> EditorResult<SceneId> {
        let pos = at.unwrap_or_else(|| self.document().size());
        let resolved = self.document().resolve(pos)?;
        if resolved.depth() != 0 {
            return Err(PositionError::NotSceneBoundary { pos }.into());
        }

        let mut attrs = SceneAttrs::new();
        initial.apply_to(&mut attrs);
        let id = attrs.id;
        let node = Node::Scene(SceneNode::blank(attrs));
        self.apply_transaction(Transaction::new("insert_scene").insert(pos, vec![node]))?;
        info!(
            "event=scene_insert module=service status=ok scene_id={} pos={} scene_count={}",
            id,
            pos,
            self.document().scene_count()
        );
        Ok(id)
    }

    /// Splits the scene containing `pos` into two adjacent scenes.
    ///
    /// The left scene keeps its id and attributes. The right scene gets a
    /// fresh id and inherits only the location. A side left without content
    /// receives an empty paragraph.
    pub fn split_scene(&mut self, pos: usize) -> EditorResult<SplitOutcome> {
        self.document().resolve(pos)?;
        let placement = self
            .document()
            .scene_at(pos)
            .ok_or(PositionError::NotInScene { pos })?;

        let offset = pos - placement.content_start();
        let (mut head, mut tail) = split_fragment(&placement.scene.content, offset);
        if head.is_empty() {
            head.push(Node::empty_paragraph());
        }
        if tail.is_empty() {
            tail.push(Node::empty_paragraph());
        }

        let left_attrs = placement.scene.attrs.clone();
        let right_attrs = left_attrs.continuation();
        let outcome = SplitOutcome {
            left_id: left_attrs.id,
            right_id: right_attrs.id,
        };
        let (from, to) = (placement.from, placement.to);
        let nodes = vec![
            Node::Scene(SceneNode::new(left_attrs, head)),
            Node::Scene(SceneNode::new(right_attrs, tail)),
        ];
        self.apply_transaction(Transaction::new("split_scene").replace(from, to, nodes))?;
        info!(
            "event=scene_split module=service status=ok scene_id={} new_scene_id={} offset={}",
            outcome.left_id, outcome.right_id, offset
        );
        Ok(outcome)
    }

    /// Removes a scene and its content.
    pub fn delete_scene(&mut self, id: SceneId) -> EditorResult<()> {
        let placement = self.placement(id)?;
        let (from, to) = (placement.from, placement.to);
        self.apply_transaction(Transaction::new("delete_scene").delete(from, to))?;
        self.pending_locations.remove(&id);
        info!(
            "event=scene_delete module=service status=ok scene_id={} scene_count={}",
            id,
            self.document().scene_count()
        );
        Ok(())
    }

    /// Appends a scene's content to the preceding scene.
    ///
    /// The preceding scene keeps its id and attributes and gains the merged
    /// scene's participants. Returns the surviving id.
    pub fn merge_with_previous(&mut self, id: SceneId) -> EditorResult<SceneId> {
        let placement = self.placement(id)?;
        let previous = match placement.ordinal {
            1 => return Err(PositionError::NoPreviousScene(id).into()),
            ordinal => self
                .document()
                .scenes()
                .nth(ordinal - 2)
                .ok_or(PositionError::NoPreviousScene(id))?,
        };

        let mut attrs = previous.scene.attrs.clone();
        attrs
            .participants
            .extend(placement.scene.attrs.participants.iter().cloned());
        let mut content = previous.scene.content.clone();
        content.extend(placement.scene.content.iter().cloned());
        let survivor = attrs.id;
        let (from, to) = (previous.from, placement.to);
        let merged = Node::Scene(SceneNode::new(attrs, content));
        self.apply_transaction(Transaction::new("merge_scene").replace(from, to, vec![merged]))?;
        self.pending_locations.remove(&id);
        info!(
            "event=scene_merge module=service status=ok scene_id={} merged_scene_id={}",
            survivor, id
        );
        Ok(survivor)
    }

    /// Moves a scene to `target` (0-based, clamped). Returns the final index.
    pub fn move_scene(&mut self, id: SceneId, target: usize) -> EditorResult<usize> {
        let placement = self.placement(id)?;
        let source = placement.index;
        let mut nodes = self.document().content().to_vec();
        let target = target.min(nodes.len().saturating_sub(1));
        if source == target {
            return Ok(target);
        }

        let node = nodes.remove(source);
        nodes.insert(target, node);
        let size = self.document().size();
        self.apply_transaction(Transaction::new("move_scene").replace(0, size, nodes))?;
        info!(
            "event=scene_move module=service status=ok scene_id={} from_index={} to_index={}",
            id, source, target
        );
        Ok(target)
    }

    /// Flips the collapsed flag and returns the new value.
    ///
    /// View state only; not recorded in undo history.
    pub fn toggle_collapse(&mut self, id: SceneId) -> EditorResult<bool> {
        let collapsed = !self.placement(id)?.scene.attrs.collapsed;
        self.edit_scene_attrs(id, "toggle_collapse", false, |attrs| {
            attrs.collapsed = collapsed;
        })?;
        Ok(collapsed)
    }

    /// Merges a validated patch into a scene's attributes.
    pub fn update_attrs(&mut self, id: SceneId, patch: &ScenePatch) -> EditorResult<()> {
        if patch.is_empty() {
            self.placement(id)?;
            return Ok(());
        }
        let record_history = !patch.is_view_only();
        self.edit_scene_attrs(id, "update_attrs", record_history, |attrs| {
            patch.apply_to(attrs)
        })?;
        Ok(())
    }

    /// Parses a wire-shaped partial attrs object and merges it.
    ///
    /// Any invalid field rejects the whole patch before the tree is touched.
    pub fn update_attrs_json(&mut self, id: SceneId, value: &Value) -> EditorResult<()> {
        let patch = ScenePatch::from_json(value)?;
        self.update_attrs(id, &patch)
    }

    /// Moves status one step along `draft -> review -> final -> draft`.
    pub fn advance_status(&mut self, id: SceneId) -> EditorResult<SceneStatus> {
        let next = self.placement(id)?.scene.attrs.status.next();
        self.edit_scene_attrs(id, "advance_status", true, |attrs| attrs.status = next)?;
        info!(
            "event=scene_status module=service status=ok scene_id={} scene_status={}",
            id,
            next.as_str()
        );
        Ok(next)
    }

    pub fn scene_count(&self) -> usize {
        self.document().scene_count()
    }

    pub fn scene_number(&self, id: SceneId) -> Option<usize> {
        self.document().find_scene(id).map(|placement| placement.ordinal)
    }

    /// Id of the scene whose content contains `pos`.
    pub fn scene_at(&self, pos: usize) -> Option<SceneId> {
        self.document()
            .scene_at(pos)
            .map(|placement| placement.scene.id())
    }

    pub fn scene_attrs(&self, id: SceneId) -> EditorResult<SceneAttrs> {
        Ok(self.placement(id)?.scene.attrs.clone())
    }

    /// Plain text of one scene, one line per textblock.
    pub fn scene_text(&self, id: SceneId) -> EditorResult<String> {
        Ok(plain_text(&self.placement(id)?.scene.content))
    }

    pub fn scenes(&self) -> Vec<SceneSummary> {
        self.document()
            .scenes()
            .map(|placement| {
                let attrs = &placement.scene.attrs;
                SceneSummary {
                    number: placement.ordinal,
                    id: attrs.id,
                    title: attrs.title.clone(),
                    status: attrs.status,
                    collapsed: attrs.collapsed,
                    location: attrs.location.clone(),
                    participant_count: attrs.participants.len(),
                    from: placement.from,
                    to: placement.to,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EditorConfig;
    use crate::model::scene::{ScenePatch, SceneStatus};
    use crate::registry::InMemoryRegistry;
    use crate::service::{EditorError, SceneEditor};
    use crate::tree::PositionError;
    use std::sync::Arc;

    fn editor() -> SceneEditor {
        SceneEditor::new(Arc::new(InMemoryRegistry::new()), EditorConfig::default())
    }

    #[test]
    fn insert_rejects_interior_positions() {
        let mut editor = editor();
        editor
            .insert_scene(None, ScenePatch::default())
            .expect("first scene should insert");
        let err = editor
            .insert_scene(Some(1), ScenePatch::default())
            .expect_err("interior position must fail");
        assert_eq!(
            err,
            EditorError::Position(PositionError::NotSceneBoundary { pos: 1 })
        );
        assert_eq!(editor.scene_count(), 1);
    }

    #[test]
    fn insert_between_scenes_renumbers() {
        let mut editor = editor();
        let first = editor
            .insert_scene(None, ScenePatch::default())
            .expect("first scene");
        let last = editor
            .insert_scene(None, ScenePatch::default())
            .expect("second scene");
        let boundary = editor.scenes()[0].to;
        let middle = editor
            .insert_scene(Some(boundary), ScenePatch::default().title("Middle"))
            .expect("middle scene");
        assert_eq!(editor.scene_number(first), Some(1));
        assert_eq!(editor.scene_number(middle), Some(2));
        assert_eq!(editor.scene_number(last), Some(3));
        assert_eq!(editor.scenes()[1].title, "Middle");
    }

    #[test]
    fn move_scene_clamps_target() {
        let mut editor = editor();
        let a = editor.insert_scene(None, ScenePatch::default()).expect("a");
        let b = editor.insert_scene(None, ScenePatch::default()).expect("b");
        assert_eq!(editor.move_scene(a, 99).expect("move should succeed"), 1);
        assert_eq!(editor.scene_number(b), Some(1));
        assert_eq!(editor.scene_number(a), Some(2));
    }

    #[test]
    fn merge_first_scene_is_a_position_error() {
        let mut editor = editor();
        let a = editor.insert_scene(None, ScenePatch::default()).expect("a");
        let err = editor.merge_with_previous(a).expect_err("no previous scene");
        assert_eq!(err, EditorError::Position(PositionError::NoPreviousScene(a)));
    }

    #[test]
    fn view_only_changes_skip_history() {
        let mut editor = editor();
        let a = editor.insert_scene(None, ScenePatch::default()).expect("a");
        editor.undo().expect("insert is undoable");
        editor.redo().expect("insert is redoable");

        editor.toggle_collapse(a).expect("toggle");
        let patch = ScenePatch {
            meta_expanded: Some(true),
            ..ScenePatch::default()
        };
        editor.update_attrs(a, &patch).expect("expand meta");
        editor.undo().expect("undo reaches the insert");
        assert_eq!(editor.scene_count(), 0);
    }

    #[test]
    fn advance_status_cycles() {
        let mut editor = editor();
        let a = editor.insert_scene(None, ScenePatch::default()).expect("a");
        assert_eq!(editor.advance_status(a), Ok(SceneStatus::Review));
        assert_eq!(editor.advance_status(a), Ok(SceneStatus::Final));
        assert_eq!(editor.advance_status(a), Ok(SceneStatus::Draft));
    }
}
