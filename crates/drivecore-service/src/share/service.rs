//! Issuing, resolving, and revoking share tokens and user grants.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use drivecore_core::config::ShareConfig;
use drivecore_core::error::AppError;
use drivecore_core::result::AppResult;
use drivecore_database::TreeStore;
use drivecore_entity::permission::{AccessLevel, GrantPermission, Operation, Permission};
use drivecore_entity::share::{CreateShare, Share};
use drivecore_entity::user::model::normalize_email;
use drivecore_entity::{Resource, ResourceRef};

use crate::context::RequestContext;
use crate::permission::PermissionEngine;
use crate::share::link::generate_token;
use crate::share::password::SharePasswordHasher;

/// A share token resolved to the resource it grants.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedShare {
    /// The share record.
    pub share: Share,
    /// The live resource the token grants.
    pub resource: Resource,
    /// Level carried by the token.
    pub access_level: AccessLevel,
}

/// A resource another user has granted the caller access to.
#[derive(Debug, Clone, Serialize)]
pub struct SharedResource {
    /// The resource.
    pub resource: Resource,
    /// The granted level.
    pub level: AccessLevel,
    /// Who granted it.
    pub granted_by: Uuid,
    /// When the grant lapses.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Issues share tokens and user grants.
#[derive(Debug, Clone)]
pub struct ShareService {
    /// Tree store.
    store: Arc<dyn TreeStore>,
    /// Permission engine.
    engine: Arc<PermissionEngine>,
    /// Password hasher.
    hasher: Arc<SharePasswordHasher>,
    /// Token settings.
    config: ShareConfig,
}

impl ShareService {
    /// Creates a new share service.
    pub fn new(
        store: Arc<dyn TreeStore>,
        engine: Arc<PermissionEngine>,
        hasher: Arc<SharePasswordHasher>,
        config: ShareConfig,
    ) -> Self {
        Self {
            store,
            engine,
            hasher,
            config,
        }
    }

    /// Creates a public share token for a resource.
    pub async fn create_public_share(
        &self,
        ctx: &RequestContext,
        target: ResourceRef,
        access_level: AccessLevel,
        expires_at: Option<DateTime<Utc>>,
        password: Option<&str>,
    ) -> AppResult<Share> {
        let (resource, _) = self
            .engine
            .authorize(ctx, target, Operation::ManageShares)
            .await?;
        let created_by = ctx.require_user()?;

        if !access_level.is_shareable() {
            return Err(AppError::validation(format!(
                "Share tokens may carry read or write access, not {access_level}"
            )));
        }
        ensure_future(expires_at, ctx.request_time)?;

        let password_hash = password.map(|p| self.hasher.hash(p)).transpose()?;

        let share = self
            .store
            .insert_share(&CreateShare {
                resource_id: resource.id(),
                resource_type: resource.resource_type(),
                token: generate_token(self.config.token_bytes),
                access_level,
                password_hash,
                expires_at,
                created_by,
            })
            .await?;

        info!(
            user_id = %created_by,
            share_id = %share.id,
            resource_id = %share.resource_id,
            level = %share.access_level,
            has_password = share.has_password(),
            "Share created"
        );
        Ok(share)
    }

    /// Deactivates a share token.
    ///
    /// Revoking an already inactive share succeeds.
    pub async fn revoke_share(&self, ctx: &RequestContext, share_id: Uuid) -> AppResult<()> {
        let share = self
            .store
            .find_share(share_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Share not found: {share_id}")))?;

        let target = ResourceRef {
            resource_type: share.resource_type,
            id: share.resource_id,
        };
        self.engine
            .authorize(ctx, target, Operation::ManageShares)
            .await?;

        let changed = self.store.deactivate_share(share_id).await?;
        info!(share_id = %share_id, changed, "Share revoked");
        Ok(())
    }

    /// Resolves a token to its resource.
    ///
    /// Reports `NotFound`, `Expired`, and `PermissionDenied` distinctly.
    /// Responses to anonymous callers should pass through
    /// [`AppError::conceal`].
    pub async fn resolve_share(
        &self,
        token: &str,
        password: Option<&str>,
    ) -> AppResult<ResolvedShare> {
        let share = self.engine.verify_share(token, password, Utc::now()).await?;

        let target = ResourceRef {
            resource_type: share.resource_type,
            id: share.resource_id,
        };
        let resource = self
            .engine
            .load(target)
            .await?
            .filter(|r| !r.is_deleted())
            .ok_or_else(|| AppError::not_found("Share not found"))?;

        Ok(ResolvedShare {
            access_level: share.access_level,
            share,
            resource,
        })
    }

    /// Lists the share tokens issued for a resource.
    pub async fn list_shares(
        &self,
        ctx: &RequestContext,
        target: ResourceRef,
    ) -> AppResult<Vec<Share>> {
        self.engine
            .authorize(ctx, target, Operation::ManageShares)
            .await?;
        self.store.list_shares(target).await
    }

    /// Grants a user access to a resource, replacing any earlier grant.
    ///
    /// Callers cannot grant more than they hold, and never `Owner`.
    pub async fn grant_user_permission(
        &self,
        ctx: &RequestContext,
        target: ResourceRef,
        grantee_email: &str,
        level: AccessLevel,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Permission> {
        let (resource, access) = self
            .engine
            .authorize(ctx, target, Operation::ManagePermissions)
            .await?;
        let granted_by = ctx.require_user()?;

        if !level.is_grantable() {
            return Err(AppError::validation(format!("Access level {level} cannot be granted")));
        }
        if !access.level.has_at_least(level) {
            return Err(AppError::permission_denied(format!(
                "Cannot grant {level} access while holding {}",
                access.level
            )));
        }
        ensure_future(expires_at, ctx.request_time)?;

        let email = normalize_email(grantee_email);
        let grantee = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::user_not_found(format!("No user with email {email}")))?;
        if grantee.id == resource.owner_id() {
            return Err(AppError::validation("The owner already has full access"));
        }

        let permission = self
            .store
            .upsert_permission(&GrantPermission {
                user_id: grantee.id,
                resource_id: resource.id(),
                resource_type: resource.resource_type(),
                level,
                granted_by,
                expires_at,
            })
            .await?;

        info!(
            granted_by = %granted_by,
            grantee = %grantee.id,
            resource_id = %permission.resource_id,
            level = %permission.level,
            "Permission granted"
        );
        Ok(permission)
    }

    /// Removes a user's grant on a resource. Absent grants are ignored.
    pub async fn revoke_user_permission(
        &self,
        ctx: &RequestContext,
        target: ResourceRef,
        user_id: Uuid,
    ) -> AppResult<()> {
        self.engine
            .authorize(ctx, target, Operation::ManagePermissions)
            .await?;
        let removed = self.store.delete_permission(user_id, target).await?;
        info!(
            user_id = %user_id,
            resource_id = %target.id,
            removed,
            "Permission revoked"
        );
        Ok(())
    }

    /// Lists the explicit grants on a resource.
    pub async fn list_permissions(
        &self,
        ctx: &RequestContext,
        target: ResourceRef,
    ) -> AppResult<Vec<Permission>> {
        self.engine
            .authorize(ctx, target, Operation::ManagePermissions)
            .await?;
        self.store.list_permissions(target).await
    }

    /// Live resources the caller holds an unexpired grant on.
    pub async fn shared_with_me(&self, ctx: &RequestContext) -> AppResult<Vec<SharedResource>> {
        let user_id = ctx.require_user()?;
        let grants = self.store.list_permissions_for_user(user_id).await?;

        let mut shared = Vec::with_capacity(grants.len());
        for grant in grants {
            if grant.is_expired_at(ctx.request_time) {
                continue;
            }
            let target = ResourceRef {
                resource_type: grant.resource_type,
                id: grant.resource_id,
            };
            let Some(resource) = self.engine.load(target).await? else {
                continue;
            };
            if resource.is_deleted() {
                continue;
            }
            shared.push(SharedResource {
                resource,
                level: grant.level,
                granted_by: grant.granted_by,
                expires_at: grant.expires_at,
            });
        }
        Ok(shared)
    }

    /// Deletes expired grants and expired or revoked shares.
    ///
    /// Returns `(permissions, shares)` removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<(u64, u64)> {
        let permissions = self.store.delete_expired_permissions(now).await?;
        let shares = self.store.delete_expired_shares(now).await?;
        info!(permissions, shares, "Purged expired grants and shares");
        Ok((permissions, shares))
    }
}

fn ensure_future(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> AppResult<()> {
    match expires_at {
        Some(at) if at <= now => Err(AppError::validation("Expiry must be in the future")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_ensure_future() {
        let now = Utc::now();
        assert!(ensure_future(None, now).is_ok());
        assert!(ensure_future(Some(now + Duration::hours(1)), now).is_ok());
        assert!(ensure_future(Some(now), now).is_err());
        assert!(ensure_future(Some(now - Duration::seconds(1)), now).is_err());
    }
}
