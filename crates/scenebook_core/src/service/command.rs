//! Serializable editor commands for rendering-layer callers.
//!
//! # Responsibility
//! - Mirror every synchronous editor operation as one tagged JSON command.
//! - Map each command onto exactly one editor call.
//!
//! # Invariants
//! - Dispatching a command has the same effect as the direct method call.
//! - Registry round trips are not commands; callers use the pending
//!   lookup/creation API and then dispatch the chosen record.

use super::editor::SceneEditor;
use super::scene_service::SplitOutcome;
use super::EditorResult;
use crate::model::entity::{EntityId, EntityRecord};
use crate::model::scene::{SceneId, ScenePatch, SceneStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One editor operation in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    InsertScene {
        #[serde(default)]
        at: Option<usize>,
        #[serde(default)]
        attrs: Option<Value>,
    },
    SplitScene {
        pos: usize,
    },
    MergeScene {
        id: SceneId,
    },
    MoveScene {
        id: SceneId,
        index: usize,
    },
    DeleteScene {
        id: SceneId,
    },
    ToggleCollapse {
        id: SceneId,
    },
    UpdateAttrs {
        id: SceneId,
        attrs: Value,
    },
    AdvanceStatus {
        id: SceneId,
    },
    AddParticipant {
        id: SceneId,
        entity_id: EntityId,
    },
    RemoveParticipant {
        id: SceneId,
        entity_id: EntityId,
    },
    AssignLocation {
        id: SceneId,
        entity: EntityRecord,
    },
    ClearLocation {
        id: SceneId,
    },
    InsertMention {
        pos: usize,
        entity: EntityRecord,
    },
    ApplyEntityMark {
        from: usize,
        to: usize,
        entity: EntityRecord,
    },
    RemoveEntityMark {
        from: usize,
        to: usize,
        entity_id: EntityId,
    },
    Undo,
    Redo,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InsertScene { .. } => "insert_scene",
            Self::SplitScene { .. } => "split_scene",
            Self::MergeScene { .. } => "merge_scene",
            Self::MoveScene { .. } => "move_scene",
            Self::DeleteScene { .. } => "delete_scene",
            Self::ToggleCollapse { .. } => "toggle_collapse",
            Self::UpdateAttrs { .. } => "update_attrs",
            Self::AdvanceStatus { .. } => "advance_status",
            Self::AddParticipant { .. } => "add_participant",
            Self::RemoveParticipant { .. } => "remove_participant",
            Self::AssignLocation { .. } => "assign_location",
            Self::ClearLocation { .. } => "clear_location",
            Self::InsertMention { .. } => "insert_mention",
            Self::ApplyEntityMark { .. } => "apply_entity_mark",
            Self::RemoveEntityMark { .. } => "remove_entity_mark",
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

/// Result payload of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Done,
    SceneCreated { id: SceneId },
    Split { left_id: SceneId, right_id: SceneId },
    Merged { id: SceneId },
    Moved { index: usize },
    Collapsed { collapsed: bool },
    Status { status: SceneStatus },
    Changed { changed: bool },
}

impl From<SplitOutcome> for CommandOutcome {
    fn from(value: SplitOutcome) -> Self {
        Self::Split {
            left_id: value.left_id,
            right_id: value.right_id,
        }
    }
}

impl SceneEditor {
    /// Runs one command against this editor.
    pub fn dispatch(&mut self, command: Command) -> EditorResult<CommandOutcome> {
        let outcome = match command {
            Command::InsertScene { at, attrs } => {
                let patch = match attrs {
                    Some(value) => ScenePatch::from_json(&value)?,
                    None => ScenePatch::default(),
                };
                CommandOutcome::SceneCreated {
                    id: self.insert_scene(at, patch)?,
                }
            }
            Command::SplitScene { pos } => self.split_scene(pos)?.into(),
            Command::MergeScene { id } => CommandOutcome::Merged {
                id: self.merge_with_previous(id)?,
            },
            Command::MoveScene { id, index } => CommandOutcome::Moved {
                index: self.move_scene(id, index)?,
            },
            Command::DeleteScene { id } => {
                self.delete_scene(id)?;
                CommandOutcome::Done
            }
            Command::ToggleCollapse { id } => CommandOutcome::Collapsed {
                collapsed: self.toggle_collapse(id)?,
            },
            Command::UpdateAttrs { id, attrs } => {
                self.update_attrs_json(id, &attrs)?;
                CommandOutcome::Done
            }
            Command::AdvanceStatus { id } => CommandOutcome::Status {
                status: self.advance_status(id)?,
            },
            Command::AddParticipant { id, entity_id } => CommandOutcome::Changed {
                changed: self.add_participant(id, &entity_id)?,
            },
            Command::RemoveParticipant { id, entity_id } => CommandOutcome::Changed {
                changed: self.remove_participant(id, &entity_id)?,
            },
            Command::AssignLocation { id, entity } => {
                self.assign_location(id, &entity)?;
                CommandOutcome::Done
            }
            Command::ClearLocation { id } => {
                self.clear_location(id)?;
                CommandOutcome::Done
            }
            Command::InsertMention { pos, entity } => {
                self.insert_mention(pos, &entity)?;
                CommandOutcome::Done
            }
            Command::ApplyEntityMark { from, to, entity } => {
                self.apply_entity_mark(from, to, &entity)?;
                CommandOutcome::Done
            }
            Command::RemoveEntityMark {
                from,
                to,
                entity_id,
            } => {
                self.remove_entity_mark(from, to, &entity_id)?;
                CommandOutcome::Done
            }
            Command::Undo => {
                self.undo()?;
                CommandOutcome::Done
            }
            Command::Redo => {
                self.redo()?;
                CommandOutcome::Done
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, CommandOutcome};
    use crate::config::EditorConfig;
    use crate::registry::InMemoryRegistry;
    use crate::service::SceneEditor;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn commands_decode_from_tagged_json() {
        let command: Command = serde_json::from_value(json!({
            "command": "insert_scene",
            "attrs": { "slug": "Opening" }
        }))
        .expect("command should decode");
        assert_eq!(command.name(), "insert_scene");

        let command: Command =
            serde_json::from_value(json!({ "command": "undo" })).expect("unit command decodes");
        assert_eq!(command, Command::Undo);
    }

    #[test]
    fn dispatch_matches_direct_calls() {
        let mut editor =
            SceneEditor::new(Arc::new(InMemoryRegistry::new()), EditorConfig::default());
        let outcome = editor
            .dispatch(Command::InsertScene {
                at: None,
                attrs: Some(json!({ "slug": "Opening", "status": "review" })),
            })
            .expect("insert should dispatch");
        let CommandOutcome::SceneCreated { id } = outcome else {
            panic!("unexpected outcome: {outcome:?}");
        };
        let attrs = editor.scene_attrs(id).expect("scene exists");
        assert_eq!(attrs.title, "Opening");

        let outcome = editor
            .dispatch(Command::ToggleCollapse { id })
            .expect("toggle should dispatch");
        assert_eq!(outcome, CommandOutcome::Collapsed { collapsed: true });
        let value = serde_json::to_value(&outcome).expect("outcome serializes");
        assert_eq!(value, json!({ "outcome": "collapsed", "collapsed": true }));
    }

    #[test]
    fn invalid_attrs_fail_with_validation_kind() {
        let mut editor =
            SceneEditor::new(Arc::new(InMemoryRegistry::new()), EditorConfig::default());
        let err = editor
            .dispatch(Command::InsertScene {
                at: None,
                attrs: Some(json!({ "status": "published" })),
            })
            .expect_err("unknown status must fail");
        assert_eq!(err.kind(), "ValidationError");
        assert_eq!(editor.scene_count(), 0);
    }
}
