use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

use crate::{
    auth::{CurrentUser, hash_password, load_roles, verify_password},
    entities::{
        account, profile,
        user_role::{self, Role},
    },
    errors::ApiError,
    resources::profile::UserAccount,
    state::AppState,
    validation::{Validatable, ValidationErrors, validators},
};

const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 128;

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(signup))
        .routes(routes!(login))
        .routes(routes!(me))
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

impl Validatable for SignupRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(validators::validate_email("email", self.email.trim()));
        errors.check(validators::validate_length(
            "password",
            &self.password,
            Some(PASSWORD_MIN),
            Some(PASSWORD_MAX),
        ));
        errors.check(validators::validate_required("display_name", &self.display_name));
        errors.check(validators::validate_length("display_name", &self.display_name, None, Some(80)));
        errors.result()
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthResponse {
    /// Bearer token for the `Authorization` header
    pub token: String,
    pub user: UserAccount,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Account, roles and profile of `account` as shown to its owner and admins
///
/// # Errors
/// Database errors.
pub async fn user_account(db: &DatabaseConnection, account: account::Model) -> Result<UserAccount, ApiError> {
    let roles = load_roles(db, account.id).await?;
    let profile = profile::Entity::find_by_id(account.id).one(db).await?;
    Ok(UserAccount {
        id: account.id,
        email: account.email,
        roles,
        profile: profile.map(Into::into),
    })
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation failed"),
    ),
    summary = "Create an account"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.validate()?;
    let email = normalize_email(&payload.email);

    let taken = account::Entity::find()
        .filter(account::Column::Email.eq(email.as_str()))
        .count(&state.db)
        .await?;
    if taken > 0 {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let password_hash = hash_password(payload.password.clone()).await?;
    let now = Utc::now();
    let id = Uuid::new_v4();

    let txn = state.db.begin().await?;
    let account = account::ActiveModel {
        id: Set(id),
        email: Set(email),
        password_hash: Set(password_hash),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;
    profile::ActiveModel {
        id: Set(id),
        display_name: Set(payload.display_name.trim().to_string()),
        bio: Set(None),
        avatar_url: Set(None),
        location: Set(None),
        phone: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;
    user_role::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(id),
        role: Set(Role::User),
        granted_at: Set(now),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(account_id = %id, "Account created");
    let token = state.tokens.issue(account.id, &account.email)?;
    let user = user_account(&state.db, account).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid email or password"),
    ),
    summary = "Sign in"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let invalid = || ApiError::unauthorized("Invalid email or password");
    let account = account::Entity::find()
        .filter(account::Column::Email.eq(normalize_email(&payload.email)))
        .one(&state.db)
        .await?;
    let stored_hash = account.as_ref().map(|account| account.password_hash.clone());
    let valid = verify_password(payload.password, stored_hash).await?;
    let Some(account) = account.filter(|_| valid) else {
        return Err(invalid());
    };

    let token = state.tokens.issue(account.id, &account.email)?;
    let user = user_account(&state.db, account).await?;
    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "The signed-in user", body = UserAccount),
        (status = 401, description = "Not signed in"),
    ),
    security(("bearer" = [])),
    summary = "Current user"
)]
pub async fn me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UserAccount>, ApiError> {
    let account = account::Entity::find_by_id(user.id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;
    Ok(Json(user_account(&state.db, account).await?))
}
