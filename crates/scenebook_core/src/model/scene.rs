//! Scene container model.
//!
//! # Responsibility
//! - Define the narrative metadata carried by every scene container.
//! - Define the partial-update patch accepted from command callers.
//!
//! # Invariants
//! - `id` is minted once and never reassigned.
//! - `location` and `location_id` are written together.
//! - `participants` is a set: no duplicates, no meaningful order.
//!
//! # See also
//! - `crate::service::scene_service`

use crate::model::entity::{EntityId, EntityRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable scene identifier.
pub type SceneId = Uuid;

/// Review state of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneStatus {
    #[default]
    Draft,
    Review,
    Final,
}

impl SceneStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Final => "final",
        }
    }

    /// Next state of the manual cycle `draft -> review -> final -> draft`.
    pub fn next(self) -> Self {
        match self {
            Self::Draft => Self::Review,
            Self::Review => Self::Final,
            Self::Final => Self::Draft,
        }
    }

    /// Parses one status wire value.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "draft" => Ok(Self::Draft),
            "review" => Ok(Self::Review),
            "final" => Ok(Self::Final),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Attribute value outside its allowed domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Status is not one of `draft|review|final`.
    UnknownStatus(String),
    /// Field has the wrong JSON type.
    InvalidField {
        field: String,
        expected: &'static str,
    },
    /// Field exists but may only change through a dedicated operation.
    ReadOnlyField(String),
    /// Field is not a scene attribute.
    UnknownField(String),
    /// Patch payload is not a JSON object.
    NotAnObject,
    /// Required text is blank after trim.
    BlankField(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownStatus(value) => {
                write!(f, "unknown scene status `{value}`; expected draft|review|final")
            }
            Self::InvalidField { field, expected } => {
                write!(f, "scene attribute `{field}` must be {expected}")
            }
            Self::ReadOnlyField(field) => {
                write!(f, "scene attribute `{field}` cannot be patched directly")
            }
            Self::UnknownField(field) => write!(f, "unknown scene attribute `{field}`"),
            Self::NotAnObject => write!(f, "scene attribute patch must be a JSON object"),
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
        }
    }
}

impl Error for ValidationError {}

/// Narrative metadata of one scene container.
///
/// Field names follow the persisted wire attrs: `slug` carries the title and
/// `characters` carries the participant set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneAttrs {
    pub id: SceneId,
    #[serde(rename = "slug", default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub location_id: Option<EntityId>,
    #[serde(default)]
    pub status: SceneStatus,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(rename = "characters", default)]
    pub participants: BTreeSet<EntityId>,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub change: String,
    #[serde(default)]
    pub meta_expanded: bool,
}

impl SceneAttrs {
    /// Creates default attributes with a freshly minted id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    /// Creates default attributes for a caller-provided id.
    pub fn with_id(id: SceneId) -> Self {
        Self {
            id,
            title: String::new(),
            location: String::new(),
            location_id: None,
            status: SceneStatus::Draft,
            collapsed: false,
            participants: BTreeSet::new(),
            goal: String::new(),
            event: String::new(),
            change: String::new(),
            meta_expanded: false,
        }
    }

    /// Attributes for the right-hand half of a split.
    ///
    /// Only the location pair carries over; everything else starts fresh
    /// under a new id.
    pub fn continuation(&self) -> Self {
        let mut next = Self::new();
        next.location = self.location.clone();
        next.location_id = self.location_id.clone();
        next
    }

    /// Sets both location fields from one registry record.
    pub fn set_location(&mut self, record: &EntityRecord) {
        self.location = record.name.clone();
        self.location_id = Some(record.id.clone());
    }

    /// Clears both location fields.
    pub fn clear_location(&mut self) {
        self.location.clear();
        self.location_id = None;
    }
}

impl Default for SceneAttrs {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial scene attribute update.
///
/// `None` leaves the field untouched. Identity, participants, location and
/// collapse state have dedicated operations and are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenePatch {
    pub title: Option<String>,
    pub status: Option<SceneStatus>,
    pub goal: Option<String>,
    pub event: Option<String>,
    pub change: Option<String>,
    pub meta_expanded: Option<bool>,
}

impl ScenePatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn status(mut self, status: SceneStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    /// Parses a wire-shaped partial attrs object.
    ///
    /// Parsing is all-or-nothing: the first invalid field fails the whole
    /// patch.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or(ValidationError::NotAnObject)?;
        let mut patch = Self::default();
        for (key, field) in object {
            match key.as_str() {
                "slug" | "title" => patch.title = Some(expect_string(key, field)?),
                "status" => {
                    let raw = expect_string(key, field)?;
                    patch.status = Some(SceneStatus::parse(raw.as_str())?);
                }
                "goal" => patch.goal = Some(expect_string(key, field)?),
                "event" => patch.event = Some(expect_string(key, field)?),
                "change" => patch.change = Some(expect_string(key, field)?),
                "metaExpanded" => patch.meta_expanded = Some(expect_bool(key, field)?),
                "id" | "location" | "locationId" | "characters" | "collapsed" => {
                    return Err(ValidationError::ReadOnlyField(key.clone()))
                }
                other => return Err(ValidationError::UnknownField(other.to_string())),
            }
        }
        Ok(patch)
    }

    /// Serializes set fields using wire names.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        if let Some(title) = &self.title {
            object.insert("slug".to_string(), Value::from(title.as_str()));
        }
        if let Some(status) = self.status {
            object.insert("status".to_string(), Value::from(status.as_str()));
        }
        if let Some(goal) = &self.goal {
            object.insert("goal".to_string(), Value::from(goal.as_str()));
        }
        if let Some(event) = &self.event {
            object.insert("event".to_string(), Value::from(event.as_str()));
        }
        if let Some(change) = &self.change {
            object.insert("change".to_string(), Value::from(change.as_str()));
        }
        if let Some(meta_expanded) = self.meta_expanded {
            object.insert("metaExpanded".to_string(), Value::from(meta_expanded));
        }
        Value::Object(object)
    }

    /// Merges set fields into `attrs`.
    pub fn apply_to(&self, attrs: &mut SceneAttrs) {
        if let Some(title) = &self.title {
            attrs.title = title.clone();
        }
        if let Some(status) = self.status {
            attrs.status = status;
        }
        if let Some(goal) = &self.goal {
            attrs.goal = goal.clone();
        }
        if let Some(event) = &self.event {
            attrs.event = event.clone();
        }
        if let Some(change) = &self.change {
            attrs.change = change.clone();
        }
        if let Some(meta_expanded) = self.meta_expanded {
            attrs.meta_expanded = meta_expanded;
        }
    }

    /// Returns true when only view-state fields are set.
    pub fn is_view_only(&self) -> bool {
        self.meta_expanded.is_some()
            && self.title.is_none()
            && self.status.is_none()
            && self.goal.is_none()
            && self.event.is_none()
            && self.change.is_none()
    }
}

fn expect_string(field: &str, value: &Value) -> Result<String, ValidationError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ValidationError::InvalidField {
            field: field.to_string(),
            expected: "a string",
        })
}

fn expect_bool(field: &str, value: &Value) -> Result<bool, ValidationError> {
    value.as_bool().ok_or_else(|| ValidationError::InvalidField {
        field: field.to_string(),
        expected: "a boolean",
    })
}
