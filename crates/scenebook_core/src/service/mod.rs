//! Editing use-case services.
//!
//! # Responsibility
//! - Own one editing session over a document tree (`SceneEditor`).
//! - Expose scene partition, reference and location operations as
//!   all-or-nothing commands.
//! - Keep rendering/command callers decoupled from tree internals.
//!
//! # Invariants
//! - Every successful operation leaves the tree partitioned into scenes
//!   (or empty).
//! - Failed operations leave the tree and history untouched.
//!
//! # See also
//! - `crate::tree::transaction`

use crate::model::node::SchemaViolation;
use crate::model::scene::{SceneId, ValidationError};
use crate::registry::RegistryError;
use crate::tree::{PositionError, TreeError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod command;
pub mod editor;
pub mod location_service;
pub mod reference_service;
pub mod scene_service;

pub use command::{Command, CommandOutcome};
pub use editor::{LookupSlot, SceneEditor};
pub use location_service::{CompletedCreation, PendingCreation};
pub use reference_service::{filter_candidates, CompletedLookup, MentionTrigger, PendingLookup};
pub use scene_service::{SceneSummary, SplitOutcome};

pub type EditorResult<T> = Result<T, EditorError>;

/// Object a failed lookup was addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundTarget {
    Scene(SceneId),
}

impl Display for NotFoundTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scene(id) => write!(f, "scene {id}"),
        }
    }
}

/// Failure of an editor operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    Position(PositionError),
    Schema(SchemaViolation),
    NotFound(NotFoundTarget),
    Validation(ValidationError),
    Transport(RegistryError),
    /// A location creation for this scene is already in flight.
    CreationPending(SceneId),
    /// Nothing to undo or redo.
    HistoryEmpty,
}

impl EditorError {
    /// Error category name reported to command callers.
    ///
    /// `HistoryEmpty` reports its own category rather than `NotFound`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Position(_) => "PositionError",
            Self::Schema(_) => "SchemaViolation",
            Self::NotFound(_) => "NotFound",
            Self::HistoryEmpty => "HistoryEmpty",
            Self::Validation(_) | Self::CreationPending(_) => "ValidationError",
            Self::Transport(_) => "TransportError",
        }
    }

    pub(crate) fn scene_not_found(id: SceneId) -> Self {
        Self::NotFound(NotFoundTarget::Scene(id))
    }
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Position(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::NotFound(target) => write!(f, "{target} not found"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Transport(err) => write!(f, "{err}"),
            Self::CreationPending(id) => {
                write!(f, "a location is already being created for scene {id}")
            }
            Self::HistoryEmpty => write!(f, "no history entry available"),
        }
    }
}

impl Error for EditorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Position(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Transport(err) => Some(err),
            Self::NotFound(_) | Self::CreationPending(_) | Self::HistoryEmpty => None,
        }
    }
}

impl From<TreeError> for EditorError {
    fn from(value: TreeError) -> Self {
        match value {
            TreeError::Position(err) => Self::Position(err),
            TreeError::Schema(err) => Self::Schema(err),
        }
    }
}

impl From<PositionError> for EditorError {
    fn from(value: PositionError) -> Self {
        Self::Position(value)
    }
}

impl From<SchemaViolation> for EditorError {
    fn from(value: SchemaViolation) -> Self {
        Self::Schema(value)
    }
}

impl From<ValidationError> for EditorError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RegistryError> for EditorError {
    fn from(value: RegistryError) -> Self {
        Self::Transport(value)
    }
}
