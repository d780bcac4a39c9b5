//! Caller identity resolution.
//!
//! Authentication happens elsewhere; this crate only needs "which user is
//! calling" and maps that user to a student profile.

use async_trait::async_trait;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};
use tower_sessions::Session;
use tracing::warn;

use crate::entity::student;
use crate::error::{RescheduleError, Result};

/// Session key holding the authenticated user id.
pub const SESSION_USER_ID_KEY: &str = "user_id";

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// The authenticated user id, or `None` for anonymous callers.
    async fn resolve_current_user(&self) -> Result<Option<String>>;
}

/// Reads the user id stored under [`SESSION_USER_ID_KEY`].
#[async_trait]
impl IdentityResolver for Session {
    async fn resolve_current_user(&self) -> Result<Option<String>> {
        match self.get::<String>(SESSION_USER_ID_KEY).await {
            Ok(user_id) => Ok(user_id),
            Err(err) => {
                // An unreadable session is an unauthenticated one.
                warn!("failed to read user id from session: {}", err);
                Ok(None)
            }
        }
    }
}

/// An identity already resolved by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    user_id: Option<String>,
}

impl CallerIdentity {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityResolver for CallerIdentity {
    async fn resolve_current_user(&self) -> Result<Option<String>> {
        Ok(self.user_id.clone())
    }
}

pub async fn find_student_by_user_id<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> std::result::Result<Option<student::Model>, DbErr> {
    student::Entity::find()
        .filter(student::Column::UserId.eq(user_id))
        .one(conn)
        .await
}

/// Resolves the caller to exactly one student.
pub async fn resolve_student<C: ConnectionTrait>(
    conn: &C,
    caller: &dyn IdentityResolver,
) -> Result<student::Model> {
    let user_id = caller
        .resolve_current_user()
        .await?
        .ok_or(RescheduleError::Unauthorized)?;
    find_student_by_user_id(conn, &user_id)
        .await?
        .ok_or(RescheduleError::StudentNotFound)
}
