//! Entity reference model.
//!
//! # Responsibility
//! - Define registry-facing entity records and creation drafts.
//! - Define the attribute payloads of weak references embedded in documents.
//!
//! # Invariants
//! - Entity ids are owned by the external registry and treated as opaque.
//! - Embedded references carry a denormalized label so documents stay renderable
//!   when the registry entry disappears.

use crate::model::scene::ValidationError;
use serde::{Deserialize, Serialize};

/// Registry-assigned entity identifier.
///
/// Kept as a type alias: ids are opaque strings minted by the registry.
pub type EntityId = String;

/// Category of a story entity.
///
/// Registry types this crate does not interpret are kept verbatim in
/// `Other` so they survive a decode/encode cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Character,
    Location,
    Item,
    Event,
    Other(String),
}

impl EntityKind {
    /// Stable wire value.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Character => "character",
            Self::Location => "location",
            Self::Item => "item",
            Self::Event => "event",
            Self::Other(raw) => raw,
        }
    }
}

impl Default for EntityKind {
    fn default() -> Self {
        Self::Other("other".to_string())
    }
}

impl From<String> for EntityKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "character" => Self::Character,
            "location" => Self::Location,
            "item" => Self::Item,
            "event" => Self::Event,
            _ => Self::Other(value),
        }
    }
}

impl From<EntityKind> for String {
    fn from(value: EntityKind) -> Self {
        match value {
            EntityKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

/// Entity record as returned by registry lookup/create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
}

impl EntityRecord {
    pub fn new(
        id: impl Into<EntityId>,
        name: impl Into<String>,
        description: impl Into<String>,
        kind: EntityKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            kind,
        }
    }

    /// Case-insensitive substring match on name or description.
    ///
    /// A blank query matches every record.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }

    /// Builds the inline mention payload with a cached copy of the label.
    pub fn mention_attrs(&self) -> MentionAttrs {
        MentionAttrs {
            id: self.id.clone(),
            label: self.name.clone(),
            kind: self.kind.clone(),
        }
    }

    /// Builds the text mark payload referencing this entity.
    pub fn mark_attrs(&self) -> EntityMarkAttrs {
        EntityMarkAttrs {
            entity_id: self.id.clone(),
            kind: self.kind.clone(),
        }
    }
}

/// Input for registry-side entity creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
}

impl EntityDraft {
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Rejects drafts the registry could never accept.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankField("name"));
        }
        Ok(())
    }
}

/// Attributes of an inline mention node.
///
/// `label` is the denormalized display name captured at insertion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionAttrs {
    pub id: EntityId,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "entityType", default)]
    pub kind: EntityKind,
}

/// Attributes of an entity text mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMarkAttrs {
    #[serde(rename = "entityId")]
    pub entity_id: EntityId,
    #[serde(rename = "entityType", default)]
    pub kind: EntityKind,
}
