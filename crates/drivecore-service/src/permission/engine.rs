//! Permission engine: decides whether a caller may perform an operation.
//!
//! Effective access is the highest of
//!
//! 1. ownership (implicit `Owner`),
//! 2. a non-expired explicit grant on the exact resource,
//! 3. a usable share token presented for the exact resource.
//!
//! Grants and shares never cascade from a folder to its contents.
//! Callers that lack access receive the same `NotFound` error as for a
//! resource that does not exist.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use drivecore_core::error::{AppError, ErrorKind};
use drivecore_core::result::AppResult;
use drivecore_database::TreeStore;
use drivecore_entity::permission::{AccessLevel, Operation, ResourceType};
use drivecore_entity::share::Share;
use drivecore_entity::{Resource, ResourceRef};

use crate::context::RequestContext;
use crate::share::password::SharePasswordHasher;

/// Where a caller's effective access comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessSource {
    /// The caller owns the resource.
    Owner,
    /// An explicit per-user grant.
    Grant,
    /// A share token.
    Share,
}

/// The effective access a caller holds on one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Access {
    /// The highest level the caller holds.
    pub level: AccessLevel,
    /// The source of that level.
    pub source: AccessSource,
}

impl Access {
    fn max(self, other: Access) -> Access {
        if other.level > self.level { other } else { self }
    }
}

/// Resolves effective access from ownership, grants, and share tokens.
#[derive(Debug, Clone)]
pub struct PermissionEngine {
    store: Arc<dyn TreeStore>,
    hasher: Arc<SharePasswordHasher>,
}

impl PermissionEngine {
    /// Creates a new permission engine.
    pub fn new(store: Arc<dyn TreeStore>, hasher: Arc<SharePasswordHasher>) -> Self {
        Self { store, hasher }
    }

    /// Authorize `operation` on `target`, returning the loaded resource.
    ///
    /// Errors for share-only callers are concealed as `NotFound`.
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        target: ResourceRef,
        operation: Operation,
    ) -> AppResult<(Resource, Access)> {
        let result = self.authorize_inner(ctx, target, operation).await;
        if ctx.is_share_only() {
            result.map_err(AppError::conceal)
        } else {
            result
        }
    }

    async fn authorize_inner(
        &self,
        ctx: &RequestContext,
        target: ResourceRef,
        operation: Operation,
    ) -> AppResult<(Resource, Access)> {
        let resource = self
            .load(target)
            .await?
            .ok_or_else(|| not_found(target))?;

        let access = self
            .effective_access(ctx, &resource)
            .await?
            .ok_or_else(|| not_found(target))?;

        if resource.is_deleted() && !operation.applies_to_trashed() {
            let owner_view = access.source == AccessSource::Owner && operation == Operation::View;
            if !owner_view {
                return Err(not_found(target));
            }
        }

        let required = operation.required_level();
        if !access.level.has_at_least(required) {
            debug!(
                resource_id = %target.id,
                operation = operation.as_str(),
                held = access.level.as_str(),
                required = required.as_str(),
                "Access denied"
            );
            return Err(AppError::permission_denied(format!(
                "Operation '{}' requires {} access",
                operation.as_str(),
                required.as_str()
            )));
        }

        Ok((resource, access))
    }

    /// The caller's effective access on `resource`, or `None` for no access.
    ///
    /// Fails with `PermissionDenied` when the caller presents a valid token
    /// for this resource with a wrong or missing password and holds no
    /// grant on it.
    pub async fn effective_access(
        &self,
        ctx: &RequestContext,
        resource: &Resource,
    ) -> AppResult<Option<Access>> {
        let mut best: Option<Access> = None;

        if let Some(user_id) = ctx.user_id {
            if resource.owner_id() == user_id {
                return Ok(Some(Access {
                    level: AccessLevel::Owner,
                    source: AccessSource::Owner,
                }));
            }

            if let Some(grant) = self
                .store
                .find_permission(user_id, resource.to_ref())
                .await?
                .filter(|p| !p.is_expired_at(ctx.request_time))
            {
                best = Some(Access {
                    level: grant.level,
                    source: AccessSource::Grant,
                });
            }
        }

        match self.share_level(ctx, resource).await {
            Ok(Some(level)) => {
                let share = Access {
                    level,
                    source: AccessSource::Share,
                };
                best = Some(best.map_or(share, |b| b.max(share)));
            }
            Ok(None) => {}
            // A bad share password adds nothing on top of a valid grant.
            Err(e) if e.kind == ErrorKind::PermissionDenied && best.is_some() => {
                debug!(resource_id = %resource.id(), "Share password rejected; using grant");
            }
            Err(e) => return Err(e),
        }

        Ok(best)
    }

    /// Level carried by the request's share token for `resource`, if any.
    async fn share_level(
        &self,
        ctx: &RequestContext,
        resource: &Resource,
    ) -> AppResult<Option<AccessLevel>> {
        let Some(credential) = &ctx.share else {
            return Ok(None);
        };
        let Some(share) = self.store.find_share_by_token(&credential.token).await? else {
            return Ok(None);
        };
        if share.resource_id != resource.id() || share.resource_type != resource.resource_type() {
            return Ok(None);
        }
        if !share.is_usable_at(ctx.request_time) {
            return Ok(None);
        }
        self.check_share_password(&share, credential.password.as_deref())?;
        Ok(Some(share.access_level))
    }

    /// Look up a share by token and check it is usable.
    ///
    /// Unlike [`authorize`](Self::authorize) this reports `Expired` and
    /// `PermissionDenied` distinctly; transports decide what to reveal.
    pub async fn verify_share(
        &self,
        token: &str,
        password: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Share> {
        let share = self
            .store
            .find_share_by_token(token)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| AppError::not_found("Share not found"))?;

        if share.is_expired_at(now) {
            return Err(AppError::expired("Share has expired"));
        }
        self.check_share_password(&share, password)?;
        Ok(share)
    }

    fn check_share_password(&self, share: &Share, password: Option<&str>) -> AppResult<()> {
        let Some(hash) = &share.password_hash else {
            return Ok(());
        };
        let supplied = password
            .ok_or_else(|| AppError::permission_denied("Share requires a password"))?;
        if !self.hasher.verify(supplied, hash)? {
            return Err(AppError::permission_denied("Invalid share password"));
        }
        Ok(())
    }

    /// Load a resource in or out of the trash.
    pub async fn load(&self, target: ResourceRef) -> AppResult<Option<Resource>> {
        Ok(match target.resource_type {
            ResourceType::File => self.store.find_file(target.id).await?.map(Resource::File),
            ResourceType::Folder => self
                .store
                .find_folder(target.id)
                .await?
                .map(Resource::Folder),
        })
    }
}

fn not_found(target: ResourceRef) -> AppError {
    let label = match target.resource_type {
        ResourceType::File => "File",
        ResourceType::Folder => "Folder",
    };
    AppError::not_found(format!("{label} not found: {}", target.id))
}
