//! Authorization rules for administrative actions.
//!
//! The policy is pure: callers resolve membership from the store and ask the
//! policy whether an actor may grant or revoke.

use thiserror::Error;

use crate::domain::identity::Identity;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("identity {actor} is not authorized to {action}")]
    Unauthorized { actor: Identity, action: &'static str },
    #[error("identity {0} is the super-admin and cannot be removed")]
    ProtectedPrincipal(Identity),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessPolicy {
    super_admin: Identity,
}

impl AccessPolicy {
    pub fn new(super_admin: Identity) -> Self {
        Self { super_admin }
    }

    pub fn super_admin(&self) -> Identity {
        self.super_admin
    }

    pub fn is_super_admin(&self, identity: Identity) -> bool {
        identity == self.super_admin
    }

    pub fn authorize_admin_panel(
        &self,
        actor: Identity,
        actor_is_admin: bool,
    ) -> Result<(), AccessError> {
        if actor_is_admin || self.is_super_admin(actor) {
            Ok(())
        } else {
            Err(AccessError::Unauthorized { actor, action: "open the admin panel" })
        }
    }

    pub fn authorize_grant(
        &self,
        actor: Identity,
        actor_is_admin: bool,
    ) -> Result<(), AccessError> {
        if actor_is_admin || self.is_super_admin(actor) {
            Ok(())
        } else {
            Err(AccessError::Unauthorized { actor, action: "grant admin rights" })
        }
    }

    /// The actor check runs first: a non-super-admin is refused before the
    /// target is looked at.
    pub fn authorize_revoke(&self, actor: Identity, target: Identity) -> Result<(), AccessError> {
        if !self.is_super_admin(actor) {
            return Err(AccessError::Unauthorized { actor, action: "revoke admin rights" });
        }
        if self.is_super_admin(target) {
            return Err(AccessError::ProtectedPrincipal(target));
        }
        Ok(())
    }
}
