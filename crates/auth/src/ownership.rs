//! Ownership gate for content mutations.
//!
//! - No IO
//! - No panics
//! - Pure policy check: the requester must be the entity's author.
//!
//! Like toggles and reads are not gated.

use thiserror::Error;

use quill_core::{DomainError, UserId};

/// Content that has a single owning author.
pub trait Owned {
    /// Human-readable entity kind used in error messages (e.g. "blog").
    const KIND: &'static str;

    fn owner_id(&self) -> UserId;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authorized to {action} this {entity}")]
    NotOwner {
        action: &'static str,
        entity: &'static str,
    },
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::NotOwner { action, entity } => DomainError::unauthorized(action, entity),
        }
    }
}

pub fn is_authorized<E: Owned + ?Sized>(entity: &E, requester: UserId) -> bool {
    entity.owner_id() == requester
}

/// Require `requester` to own `entity` before performing `action` on it.
pub fn authorize_owner<E: Owned + ?Sized>(
    entity: &E,
    requester: UserId,
    action: &'static str,
) -> Result<(), AuthzError> {
    if is_authorized(entity, requester) {
        Ok(())
    } else {
        tracing::warn!(
            entity = E::KIND,
            action,
            requester = %requester,
            owner = %entity.owner_id(),
            "ownership check failed"
        );
        Err(AuthzError::NotOwner {
            action,
            entity: E::KIND,
        })
    }
}
