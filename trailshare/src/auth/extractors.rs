use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{
    entities::{account, user_role, user_role::Role},
    errors::ApiError,
    state::AppState,
};

/// The authenticated caller. Rejects the request with 401 when there is no valid token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<Role>,
}

impl CurrentUser {
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// # Errors
    /// `Forbidden` unless the caller is an admin.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        self.require_role(&[Role::Admin])
    }

    /// # Errors
    /// `Forbidden` unless the caller holds at least one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.iter().any(|role| self.has_role(*role)) {
            Ok(())
        } else {
            Err(ApiError::forbidden("You do not have permission to do this"))
        }
    }

    /// Row-level check: the caller owns the row or is an admin
    ///
    /// # Errors
    /// `Forbidden` otherwise.
    pub fn require_owner_or_admin(&self, owner_id: Uuid) -> Result<(), ApiError> {
        if self.id == owner_id || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Only the owner can do this"))
        }
    }
}

/// The caller if a valid token was sent. Invalid tokens are treated as anonymous.
#[derive(Debug, Clone, Default)]
pub struct MaybeUser(pub Option<CurrentUser>);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Roles granted to `user_id`, sorted
///
/// # Errors
/// Database errors.
pub async fn load_roles(db: &DatabaseConnection, user_id: Uuid) -> Result<Vec<Role>, DbErr> {
    let rows = user_role::Entity::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .order_by_asc(user_role::Column::Role)
        .all(db)
        .await?;
    let mut roles: Vec<Role> = rows.into_iter().map(|row| row.role).collect();
    roles.sort();
    roles.dedup();
    Ok(roles)
}

async fn authenticate(token: &str, state: &AppState) -> Result<CurrentUser, ApiError> {
    let claims = state.tokens.verify(token)?;
    let account = account::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;
    let roles = load_roles(&state.db, account.id).await?;
    Ok(CurrentUser {
        id: account.id,
        email: account.email,
        roles,
    })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
        authenticate(token, state).await
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(Self(None));
        };
        match authenticate(token, state).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(ApiError::Unauthorized { .. }) => Ok(Self(None)),
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(roles: Vec<Role>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "a@b.co".to_string(),
            roles,
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_role_checks() {
        let editor = user(vec![Role::User, Role::Editor]);
        assert!(editor.require_role(&[Role::Editor, Role::Admin]).is_ok());
        assert!(editor.require_admin().is_err());

        let admin = user(vec![Role::User, Role::Admin]);
        assert!(admin.require_admin().is_ok());
        assert!(admin.require_owner_or_admin(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_owner_check() {
        let owner = user(vec![Role::User]);
        assert!(owner.require_owner_or_admin(owner.id).is_ok());
        let err = owner.require_owner_or_admin(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }
}
