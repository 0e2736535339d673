use anyhow::Context;
use tracing::info;

use crate::auth::{self, MIN_PASSWORD_LEN};
use crate::clock;
use crate::context::AppContext;
use crate::db::{self, queries, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::user::{normalize_email, User};

#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub user: User,
}

pub async fn signup(
    ctx: &AppContext,
    email: Option<String>,
    password: Option<String>,
) -> ApiResult<Session> {
    let (email, password) = credentials(email, password)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {} chars",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .context("hashing task panicked")??;

    let now = clock::now();
    let user = sqlx::query_as::<_, User>(queries::INSERT_USER)
        .bind(&email)
        .bind(&password_hash)
        .bind(now)
        .fetch_one(&ctx.pool)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                ApiError::conflict("Email already exists")
            } else {
                e.into()
            }
        })?;

    info!("New household admin {} ({})", user.id, user.email);
    let token = ctx.tokens.issue(user.id, &user.email, now)?;
    Ok(Session { token, user })
}

pub async fn login(
    ctx: &AppContext,
    email: Option<String>,
    password: Option<String>,
) -> ApiResult<Session> {
    let (email, password) = credentials(email, password)?;

    let user = sqlx::query_as::<_, User>(queries::SELECT_USER_BY_EMAIL)
        .bind(&email)
        .fetch_optional(&ctx.pool)
        .await?
        .ok_or_else(|| ApiError::auth("Invalid credentials"))?;

    let stored = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || auth::verify_password(&password, &stored))
        .await
        .context("verification task panicked")?;
    if !valid {
        return Err(ApiError::auth("Invalid credentials"));
    }
    if user.is_disabled {
        return Err(ApiError::forbidden("Account disabled"));
    }

    let token = ctx.tokens.issue(user.id, &user.email, clock::now())?;
    Ok(Session { token, user })
}

/// Resolves a bearer token to a live, enabled user.
pub async fn authenticate(ctx: &AppContext, token: &str) -> ApiResult<User> {
    let claims = ctx
        .tokens
        .verify(token)
        .map_err(|_| ApiError::auth("Invalid or expired token"))?;

    let user = sqlx::query_as::<_, User>(queries::SELECT_USER_BY_ID)
        .bind(claims.user_id)
        .fetch_optional(&ctx.pool)
        .await?
        .ok_or_else(|| ApiError::auth("Invalid or expired token"))?;

    if user.is_disabled {
        return Err(ApiError::forbidden("Account disabled"));
    }
    Ok(user)
}

pub async fn list_users(pool: &DbPool) -> ApiResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(queries::SELECT_USERS)
        .fetch_all(pool)
        .await?;
    Ok(users)
}

pub async fn set_disabled(pool: &DbPool, user_id: i64, disabled: bool) -> ApiResult<User> {
    let user = sqlx::query_as::<_, User>(queries::UPDATE_USER_DISABLED)
        .bind(user_id)
        .bind(disabled)
        .bind(clock::now())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!("User {} disabled={}", user.id, user.is_disabled);
    Ok(user)
}

fn credentials(email: Option<String>, password: Option<String>) -> ApiResult<(String, String)> {
    let email = email.map(|e| normalize_email(&e)).filter(|e| !e.is_empty());
    let password = password.filter(|p| !p.is_empty());
    match (email, password) {
        (Some(e), Some(p)) => Ok((e, p)),
        _ => Err(ApiError::validation("email and password required")),
    }
}
