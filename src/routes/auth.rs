//! Auth routes — registration, password login, demo accounts, sessions.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;
use uuid::Uuid;

use crate::routes::ApiError;
use crate::services::auth::{self as auth_svc, AuthError, Registration};
use crate::services::{session, stall};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";
const SESSION_DAYS: i64 = 30;

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: session::SessionUser,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::new(StatusCode::UNAUTHORIZED, "not signed in"));
        }

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, token)
            .await?
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "session expired"))?;

        Ok(Self { user, token: token.to_owned() })
    }
}

#[cfg(test)]
impl AuthUser {
    /// Signed-in user without a database-backed session.
    pub(crate) fn for_tests(user_id: Uuid) -> Self {
        Self {
            user: session::SessionUser {
                id: user_id,
                name: "Ah Seng".into(),
                email: "seng@example.com".into(),
                is_demo: false,
            },
            token: "test-token".into(),
        }
    }
}

// =============================================================================
// COOKIES
// =============================================================================

pub(crate) fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::days(SESSION_DAYS))
        .build()
}

pub(crate) fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

pub(crate) fn auth_error_to_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidEmail | AuthError::BlankName | AuthError::WeakPassword | AuthError::InvalidStall(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::from_error(auth_error_to_status(&err), &err)
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct RegisterBody {
    pub name: String,
    pub email: String,
    pub password: String,
    pub stall_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: session::SessionUser,
    pub stall_id: Option<Uuid>,
}

/// `POST /api/auth/register` — create owner + stall, sign in.
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError> {
    let account = auth_svc::register(
        &state.pool,
        Registration { name: body.name, email: body.email, password: body.password, stall_name: body.stall_name },
    )
    .await?;
    let token = session::create_session(&state.pool, account.user.id).await?;

    let jar = jar.add(session_cookie(token, state.config.cookie_secure));
    let body = MeResponse { user: account.user, stall_id: Some(account.stall_id) };
    Ok((StatusCode::CREATED, jar, Json(body)))
}

/// `POST /api/auth/login` — verify password, set session cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user = auth_svc::login(&state.pool, &body.email, &body.password).await?;
    let token = session::create_session(&state.pool, user.id).await?;
    let stall_id = stall::find_stall_for_owner(&state, user.id).await?;

    let jar = jar.add(session_cookie(token, state.config.cookie_secure));
    Ok((jar, Json(MeResponse { user, stall_id })))
}

/// `POST /api/auth/demo` — create a throwaway demo account and sign in.
pub async fn demo(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse, ApiError> {
    let account = auth_svc::create_demo_account(&state.pool).await?;
    let token = session::create_session(&state.pool, account.user.id).await?;

    let jar = jar.add(session_cookie(token, state.config.cookie_secure));
    let body = MeResponse { user: account.user, stall_id: Some(account.stall_id) };
    Ok((StatusCode::CREATED, jar, Json(body)))
}

/// `GET /api/auth/me` — return current user and their stall.
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<MeResponse>, ApiError> {
    let stall_id = stall::find_stall_for_owner(&state, auth.user.id).await?;
    Ok(Json(MeResponse { user: auth.user, stall_id }))
}

/// `POST /api/auth/logout` — delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, user_id = %auth.user.id, "session delete failed");
    }

    let jar = CookieJar::new().add(clear_session_cookie(state.config.cookie_secure));
    (jar, StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
