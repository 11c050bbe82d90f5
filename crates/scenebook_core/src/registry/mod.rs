//! Entity registry capability.
//!
//! # Responsibility
//! - Define the async lookup/create contract of the external entity store.
//! - Keep the editor independent of where entities actually live.
//!
//! # Invariants
//! - Implementations never touch document trees.
//! - Lookup results keep registry order; callers filter and cap them.
//!
//! # See also
//! - `crate::service::reference_service`
//! - `crate::service::location_service`

use crate::model::entity::{EntityDraft, EntityRecord};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;

pub use memory::InMemoryRegistry;

/// Registry call failure, surfaced to the initiating caller as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Registry could not be reached or did not answer.
    Transport(String),
    /// Registry answered but refused the request.
    Rejected(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "entity registry unavailable: {message}"),
            Self::Rejected(message) => write!(f, "entity registry rejected request: {message}"),
        }
    }
}

impl Error for RegistryError {}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// External store of story entities.
#[async_trait]
pub trait EntityRegistry: Send + Sync {
    /// Returns candidate records for `query` in registry order.
    async fn lookup(&self, query: &str) -> RegistryResult<Vec<EntityRecord>>;

    /// Creates one record and returns it with its registry-assigned id.
    async fn create(&self, draft: EntityDraft) -> RegistryResult<EntityRecord>;
}
