//! Capability checks for the boundary layer.
//!
//! The identity provider authenticates the caller and hands over a
//! [`Principal`]. Handlers run these checks before calling into
//! [`crate::AvailabilityManager`], which never looks at identities itself.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{PrincipalId, Service};

/// What an authenticated caller is allowed to act as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Publishes services and declares their availability.
    Provider,
    /// Browses services and books slots.
    Consumer,
}

/// An authenticated caller, as asserted by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub role: Role,
}

impl Principal {
    pub fn provider(id: PrincipalId) -> Self {
        Self {
            id,
            role: Role::Provider,
        }
    }

    pub fn consumer(id: PrincipalId) -> Self {
        Self {
            id,
            role: Role::Consumer,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

/// Only providers may publish services or declare windows.
///
/// # Errors
/// Returns `AccessError::Forbidden` for any other role.
pub fn require_provider(principal: &Principal) -> Result<(), AccessError> {
    match principal.role {
        Role::Provider => Ok(()),
        Role::Consumer => Err(AccessError::Forbidden(format!(
            "principal {} is not a provider",
            principal.id
        ))),
    }
}

/// Windows of a service may only be changed by the provider that owns it.
///
/// # Errors
/// Returns `AccessError::Forbidden` if the principal is not a provider or does
/// not own `service`.
pub fn require_owner(principal: &Principal, service: &Service) -> Result<(), AccessError> {
    require_provider(principal)?;
    if service.provider_id != principal.id {
        return Err(AccessError::Forbidden(format!(
            "principal {} does not own service {}",
            principal.id, service.id
        )));
    }
    Ok(())
}
