//! Admin membership backed by the admins relation.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use gradedesk_core::access::{AccessError, AccessPolicy};
use gradedesk_core::domain::admin::AdminRecord;
use gradedesk_core::domain::identity::Identity;

use crate::repositories::{AdminRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum AccessControlError {
    #[error(transparent)]
    Denied(#[from] AccessError),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

#[derive(Clone)]
pub struct AccessControl {
    admins: Arc<dyn AdminRepository>,
    policy: AccessPolicy,
}

impl AccessControl {
    pub fn new(admins: Arc<dyn AdminRepository>, policy: AccessPolicy) -> Self {
        Self { admins, policy }
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    pub async fn is_admin(&self, identity: Identity) -> Result<bool, RepositoryError> {
        if self.policy.is_super_admin(identity) {
            return Ok(true);
        }
        self.admins.contains(identity).await
    }

    /// Duplicate grants succeed without changing anything; the result says
    /// whether a new row was written.
    pub async fn grant_admin(
        &self,
        actor: Identity,
        target: Identity,
    ) -> Result<bool, AccessControlError> {
        let actor_is_admin = self.is_admin(actor).await?;
        self.policy.authorize_grant(actor, actor_is_admin)?;

        let inserted = self.admins.insert_if_absent(target, Utc::now()).await?;
        info!(
            event_name = "access.admin.granted",
            actor = %actor,
            target = %target,
            inserted,
            "admin grant applied"
        );
        Ok(inserted)
    }

    pub async fn revoke_admin(
        &self,
        actor: Identity,
        target: Identity,
    ) -> Result<bool, AccessControlError> {
        self.policy.authorize_revoke(actor, target)?;

        let removed = self.admins.remove(target).await?;
        info!(
            event_name = "access.admin.revoked",
            actor = %actor,
            target = %target,
            removed,
            "admin revoke applied"
        );
        Ok(removed)
    }

    /// Ensures the configured super-admin is present. Safe on every start.
    pub async fn bootstrap(&self) -> Result<bool, RepositoryError> {
        let super_admin = self.policy.super_admin();
        let inserted = self.admins.insert_if_absent(super_admin, Utc::now()).await?;
        info!(
            event_name = "system.bootstrap.super_admin_ensured",
            super_admin = %super_admin,
            inserted,
            "super admin ensured"
        );
        Ok(inserted)
    }

    pub async fn list_admins(&self) -> Result<Vec<AdminRecord>, RepositoryError> {
        self.admins.list().await
    }
}
