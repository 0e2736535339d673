//! Request guards and body extractors. Every rejection is an [`ApiError`],
//! so clients always get the `{ok:false, error}` shape.

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::auth::bearer_token;
use crate::context::AppContext;
use crate::error::ApiError;
use crate::models::subscription::Subscription;
use crate::models::user::User;
use crate::service::{accounts, subscriptions};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Caller presented the configured `x-api-key`.
pub struct ApiKey;

#[async_trait]
impl FromRequestParts<AppContext> for ApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let given = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        match given {
            Some(key) if key == ctx.config.api_key => Ok(ApiKey),
            _ => Err(ApiError::auth("Unauthorized")),
        }
    }
}

/// Household admin behind a valid bearer token.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| ApiError::auth("Missing token"))?;
        let user = accounts::authenticate(ctx, token).await?;
        Ok(AuthUser(user))
    }
}

/// Authenticated user whose subscription allows the app surface.
pub struct AppUser {
    pub user: User,
    pub subscription: Subscription,
}

#[async_trait]
impl FromRequestParts<AppContext> for AppUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, ctx).await?;
        let subscription = subscriptions::require_usable(&ctx.pool, user.id).await?;
        Ok(AppUser { user, subscription })
    }
}

/// Positive integer `:id` path segment.
pub struct Id(pub i64);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Id {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state).await?;
        if id < 1 {
            return Err(ApiError::validation("Invalid id"));
        }
        Ok(Id(id))
    }
}

/// `Json` with rejections mapped to a 400 in the usual body shape.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}
