//! Entity reference layer.
//!
//! # Responsibility
//! - Maintain scene participant sets.
//! - Run mention lookups with last-query-wins supersession.
//! - Insert mentions and entity marks carrying weak references.
//!
//! # Invariants
//! - References are weak: registry deletes never touch the tree.
//! - Lookup completion never mutates the tree; only an explicit insert does.
//! - A superseded lookup result is dropped, including its errors.
//!
//! # See also
//! - `crate::registry`

use super::editor::{LookupSlot, SceneEditor};
use super::EditorResult;
use crate::model::entity::{EntityId, EntityKind, EntityMarkAttrs, EntityRecord};
use crate::model::node::{Mark, Node};
use crate::model::scene::SceneId;
use crate::registry::{EntityRegistry, RegistryResult};
use crate::tree::position::PathStep;
use crate::tree::transaction::Transaction;
use crate::tree::PositionError;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;

static TRAILING_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\S+)$").expect("valid trailing word regex"));

/// Registry lookup issued by the editor, not yet awaited.
pub struct PendingLookup {
    slot: LookupSlot,
    generation: u64,
    query: String,
    limit: usize,
    kind: Option<EntityKind>,
    registry: Arc<dyn EntityRegistry>,
}

impl PendingLookup {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Awaits the registry. Does not touch the editor.
    pub async fn run(self) -> CompletedLookup {
        let result = self.registry.lookup(&self.query).await;
        CompletedLookup {
            slot: self.slot,
            generation: self.generation,
            query: self.query,
            limit: self.limit,
            kind: self.kind,
            result,
        }
    }
}

/// Registry answer waiting to be handed back to the editor.
#[derive(Debug)]
pub struct CompletedLookup {
    slot: LookupSlot,
    generation: u64,
    query: String,
    limit: usize,
    kind: Option<EntityKind>,
    result: RegistryResult<Vec<EntityRecord>>,
}

/// Trigger character plus query text found before a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionTrigger {
    /// Position of the trigger character.
    pub from: usize,
    /// Cursor position ending the query.
    pub to: usize,
    pub trigger: char,
    pub query: String,
}

/// Keeps records matching `query` in registry order, capped at `limit`.
pub fn filter_candidates(
    records: Vec<EntityRecord>,
    query: &str,
    limit: usize,
    kind: Option<EntityKind>,
) -> Vec<EntityRecord> {
    records
        .into_iter()
        .filter(|record| kind.as_ref().map_or(true, |kind| &record.kind == kind))
        .filter(|record| record.matches_query(query))
        .take(limit)
        .collect()
}

impl SceneEditor {
    /// Adds an entity to a scene's participant set. Returns `false` when it
    /// was already present.
    pub fn add_participant(&mut self, id: SceneId, entity_id: &str) -> EditorResult<bool> {
        let changed = self.edit_scene_attrs(id, "add_participant", true, |attrs| {
            attrs.participants.insert(entity_id.to_string());
        })?;
        debug!(
            "event=participant_add module=service status=ok scene_id={} entity_id={} changed={}",
            id, entity_id, changed
        );
        Ok(changed)
    }

    /// Removes an entity from a scene's participant set. Absent ids succeed
    /// with `false`.
    pub fn remove_participant(&mut self, id: SceneId, entity_id: &str) -> EditorResult<bool> {
        let changed = self.edit_scene_attrs(id, "remove_participant", true, |attrs| {
            attrs.participants.remove(entity_id);
        })?;
        debug!(
            "event=participant_remove module=service status=ok scene_id={} entity_id={} changed={}",
            id, entity_id, changed
        );
        Ok(changed)
    }

    /// Starts a mention lookup, superseding any earlier mention lookup.
    pub fn begin_mention_lookup(&mut self, query: &str) -> PendingLookup {
        self.begin_lookup(LookupSlot::Mention, query, None)
    }

    pub(crate) fn begin_lookup(
        &mut self,
        slot: LookupSlot,
        query: &str,
        kind: Option<EntityKind>,
    ) -> PendingLookup {
        let generation = self.next_generation(slot);
        debug!(
            "event=lookup_begin module=service status=ok slot={} generation={}",
            slot.as_str(),
            generation
        );
        PendingLookup {
            slot,
            generation,
            query: query.to_string(),
            limit: self.config().mention_result_limit,
            kind,
            registry: self.registry(),
        }
    }

    /// Hands a lookup result back to the editor.
    ///
    /// Returns `Ok(None)` when a newer lookup for the same slot was issued in
    /// the meantime; otherwise the filtered candidates.
    ///
    /// # Errors
    /// - `Transport` when the current lookup failed at the registry.
    pub fn finish_lookup(
        &mut self,
        completed: CompletedLookup,
    ) -> EditorResult<Option<Vec<EntityRecord>>> {
        if !self.is_current(completed.slot, completed.generation) {
            debug!(
                "event=lookup_finish module=service status=skipped slot={} generation={}",
                completed.slot.as_str(),
                completed.generation
            );
            return Ok(None);
        }
        let records = completed.result?;
        let candidates = filter_candidates(
            records,
            &completed.query,
            completed.limit,
            completed.kind,
        );
        debug!(
            "event=lookup_finish module=service status=ok slot={} generation={} candidates={}",
            completed.slot.as_str(),
            completed.generation,
            candidates.len()
        );
        Ok(Some(candidates))
    }

    /// Finds `<trigger><query>` immediately before `pos` in a textblock.
    pub fn mention_trigger_at(&self, pos: usize) -> EditorResult<Option<MentionTrigger>> {
        let resolved = self.document().resolve(pos)?;
        if !resolved.parent_type(self.document()).is_textblock() {
            return Err(PositionError::NotInTextblock { pos }.into());
        }
        let siblings = children_at(self.document().content(), &resolved.path);

        let mut before = String::new();
        for node in &siblings[..resolved.index.min(siblings.len())] {
            match node {
                Node::Text(run) => before.push_str(&run.text),
                _ => before.clear(),
            }
        }
        if let Some(Node::Text(run)) = siblings.get(resolved.index) {
            before.push_str(&run.split_at(resolved.text_offset).0.text);
        }

        let Some(word) = TRAILING_WORD_RE
            .captures(&before)
            .and_then(|captures| captures.get(1))
        else {
            return Ok(None);
        };
        let word = word.as_str();
        let Some(trigger) = word.chars().next() else {
            return Ok(None);
        };
        let triggers = &self.config().mention_triggers;
        if !triggers.contains(&trigger) {
            return Ok(None);
        }
        let query: String = word.chars().skip(1).collect();
        if query.chars().count() > self.config().max_mention_query_chars
            || query.chars().any(|c| triggers.contains(&c))
        {
            return Ok(None);
        }
        Ok(Some(MentionTrigger {
            from: pos - word.chars().count(),
            to: pos,
            trigger,
            query,
        }))
    }

    /// Inserts a mention of `record` at `pos`.
    pub fn insert_mention(&mut self, pos: usize, record: &EntityRecord) -> EditorResult<()> {
        let resolved = self.document().resolve(pos)?;
        if !resolved.parent_type(self.document()).is_textblock() {
            return Err(PositionError::NotInTextblock { pos }.into());
        }
        let mention = Node::Mention(record.mention_attrs());
        self.apply_transaction(Transaction::new("insert_mention").insert(pos, vec![mention]))?;
        info!(
            "event=mention_insert module=service status=ok entity_id={} pos={}",
            record.id, pos
        );
        Ok(())
    }

    /// Replaces a detected trigger with a mention and a trailing space.
    pub fn complete_mention(
        &mut self,
        trigger: &MentionTrigger,
        record: &EntityRecord,
    ) -> EditorResult<()> {
        let resolved = self.document().resolve(trigger.from)?;
        if !resolved.parent_type(self.document()).is_textblock() {
            return Err(PositionError::NotInTextblock { pos: trigger.from }.into());
        }
        let nodes = vec![Node::Mention(record.mention_attrs()), Node::text(" ")];
        self.apply_transaction(
            Transaction::new("complete_mention").replace(trigger.from, trigger.to, nodes),
        )?;
        info!(
            "event=mention_complete module=service status=ok entity_id={} pos={}",
            record.id, trigger.from
        );
        Ok(())
    }

    /// Marks every text run in `from..to` as referring to `record`.
    pub fn apply_entity_mark(
        &mut self,
        from: usize,
        to: usize,
        record: &EntityRecord,
    ) -> EditorResult<()> {
        let mark = Mark::Entity(record.mark_attrs());
        self.apply_transaction(Transaction::new("apply_entity_mark").add_mark(from, to, mark))
    }

    /// Removes marks referring to `entity_id` from `from..to`.
    pub fn remove_entity_mark(
        &mut self,
        from: usize,
        to: usize,
        entity_id: &str,
    ) -> EditorResult<()> {
        let mark = Mark::Entity(EntityMarkAttrs {
            entity_id: entity_id.to_string(),
            kind: EntityKind::default(),
        });
        self.apply_transaction(Transaction::new("remove_entity_mark").remove_mark(from, to, mark))
    }

    /// Every entity id referenced anywhere in the document.
    ///
    /// Covers participants, locations, mentions and entity marks. Ids may
    /// dangle; callers compare against the registry to report them.
    pub fn referenced_entities(&self) -> BTreeSet<EntityId> {
        let mut ids = BTreeSet::new();
        for placement in self.document().scenes() {
            let attrs = &placement.scene.attrs;
            ids.extend(attrs.participants.iter().cloned());
            if let Some(location_id) = &attrs.location_id {
                ids.insert(location_id.clone());
            }
        }
        for node in self.document().content() {
            node.walk(&mut |node| match node {
                Node::Mention(attrs) => {
                    ids.insert(attrs.id.clone());
                }
                Node::Text(run) => {
                    ids.extend(run.marks.iter().filter_map(Mark::entity_id).cloned());
                }
                _ => {}
            });
        }
        ids
    }
}

fn children_at<'a>(root: &'a [Node], path: &[PathStep]) -> &'a [Node] {
    let mut nodes = root;
    for step in path {
        nodes = nodes
            .get(step.index)
            .and_then(Node::children)
            .unwrap_or_default();
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::filter_candidates;
    use crate::model::entity::{EntityKind, EntityRecord};

    fn records(count: usize) -> Vec<EntityRecord> {
        (0..count)
            .map(|i| {
                EntityRecord::new(format!("e{i}"), format!("Name {i}"), "", EntityKind::Character)
            })
            .collect()
    }

    #[test]
    fn filter_caps_results_in_registry_order() {
        let hits = filter_candidates(records(15), "name", 10, None);
        assert_eq!(hits.len(), 10);
        assert_eq!(hits[0].id, "e0");
        assert_eq!(hits[9].id, "e9");
    }

    #[test]
    fn filter_respects_kind() {
        let mut all = records(2);
        all.push(EntityRecord::new("l1", "Name harbor", "", EntityKind::Location));
        let hits = filter_candidates(all, "name", 10, Some(EntityKind::Location));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "l1");
    }
}
