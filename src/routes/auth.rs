//! Authentication routes
//!
//! These routes proxy credential sign-in to the external identity
//! provider and expose the current session. Provider error codes are
//! already folded into canonical user-facing messages by the client.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::auth::{
    AuthResponse, SessionResponse, SignInErrorKind, SignInRequest, User,
};
use crate::error::ApiError;

/// POST /auth/signin
///
/// Sign in with email and password.
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    let auth_response = state
        .identity
        .sign_in(&req.email, &req.password)
        .await
        .map_err(|failure| {
            tracing::warn!(kind = ?failure.kind, "Sign-in rejected");
            match failure.kind {
                SignInErrorKind::NetworkFailure => {
                    ApiError::bad_request(failure.kind.user_message())
                }
                _ => ApiError::unauthorized(failure.kind.user_message()),
            }
        })?;

    let user: User = auth_response.user.into();
    let response = AuthResponse {
        access_token: auth_response.access_token,
        refresh_token: auth_response.refresh_token,
        expires_in: auth_response.expires_in,
        user,
    };

    Ok(Json(DataResponse::new(response)))
}

/// POST /auth/signout
///
/// Sign out the current user.
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    state.identity.sign_out(auth.token()).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/session
///
/// Get the current session/user info.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let claims = auth.claims();

    let provider_user = state
        .identity
        .get_user(auth.token())
        .await
        .map_err(|_| ApiError::unauthorized("Invalid session"))?;

    let session = SessionResponse {
        user: provider_user.into(),
        access_token: auth.token().to_string(),
        expires_at: claims.exp,
    };

    Ok(Json(DataResponse::new(session)))
}
