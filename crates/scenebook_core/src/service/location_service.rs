//! Scene location assignment.
//!
//! # Responsibility
//! - Bind a scene to one place entity, either picked or newly created.
//! - Guard against concurrent creations for the same scene.
//!
//! # Invariants
//! - `location` and `location_id` change together in one transaction.
//! - At most one creation is in flight per scene.
//! - A failed creation leaves the location unchanged.

use super::editor::{LookupSlot, SceneEditor};
use super::reference_service::PendingLookup;
use super::{EditorError, EditorResult};
use crate::model::entity::{EntityDraft, EntityKind, EntityRecord};
use crate::model::scene::SceneId;
use crate::registry::{EntityRegistry, RegistryResult};
use log::{info, warn};
use std::sync::Arc;

/// Registry creation issued for one scene, not yet awaited.
pub struct PendingCreation {
    scene_id: SceneId,
    draft: EntityDraft,
    registry: Arc<dyn EntityRegistry>,
}

impl PendingCreation {
    pub fn scene_id(&self) -> SceneId {
        self.scene_id
    }

    /// Awaits the registry. Does not touch the editor.
    pub async fn run(self) -> CompletedCreation {
        let result = self.registry.create(self.draft).await;
        CompletedCreation {
            scene_id: self.scene_id,
            result,
        }
    }
}

/// Registry creation result waiting to be handed back to the editor.
#[derive(Debug)]
pub struct CompletedCreation {
    scene_id: SceneId,
    result: RegistryResult<EntityRecord>,
}

impl SceneEditor {
    /// Binds an existing registry record as the scene's location.
    pub fn assign_location(&mut self, id: SceneId, record: &EntityRecord) -> EditorResult<()> {
        let changed = self.edit_scene_attrs(id, "assign_location", true, |attrs| {
            attrs.set_location(record)
        })?;
        info!(
            "event=location_assign module=service status=ok scene_id={} entity_id={} changed={}",
            id, record.id, changed
        );
        Ok(())
    }

    /// Empties both location fields.
    pub fn clear_location(&mut self, id: SceneId) -> EditorResult<()> {
        let changed =
            self.edit_scene_attrs(id, "clear_location", true, |attrs| attrs.clear_location())?;
        info!(
            "event=location_clear module=service status=ok scene_id={} changed={}",
            id, changed
        );
        Ok(())
    }

    /// Starts a place lookup, superseding any earlier location lookup.
    pub fn begin_location_lookup(&mut self, query: &str) -> PendingLookup {
        self.begin_lookup(LookupSlot::Location, query, Some(EntityKind::Location))
    }

    pub fn is_creation_pending(&self, id: SceneId) -> bool {
        self.pending_locations.contains(&id)
    }

    /// Starts creating a place entity for a scene.
    ///
    /// # Errors
    /// - `NotFound` when the scene does not exist.
    /// - `Validation` when the draft name is blank.
    /// - `CreationPending` when a creation for this scene is in flight.
    pub fn begin_location_creation(
        &mut self,
        id: SceneId,
        draft: EntityDraft,
    ) -> EditorResult<PendingCreation> {
        self.placement(id)?;
        draft.validate()?;
        if !self.pending_locations.insert(id) {
            return Err(EditorError::CreationPending(id));
        }
        info!(
            "event=location_create module=service status=pending scene_id={}",
            id
        );
        Ok(PendingCreation {
            scene_id: id,
            draft,
            registry: self.registry(),
        })
    }

    /// Assigns the created record to its scene in one transaction.
    ///
    /// # Errors
    /// - `Transport` when the registry failed; the location is unchanged.
    /// - `NotFound` when the scene was deleted while the call was in flight.
    pub fn finish_location_creation(
        &mut self,
        completed: CompletedCreation,
    ) -> EditorResult<EntityRecord> {
        let scene_id = completed.scene_id;
        self.pending_locations.remove(&scene_id);
        let record = match completed.result {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    "event=location_create module=service status=error scene_id={} error={}",
                    scene_id, err
                );
                return Err(err.into());
            }
        };
        self.assign_location(scene_id, &record)?;
        Ok(record)
    }
}
