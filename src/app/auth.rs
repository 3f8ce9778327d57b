use crate::error::{AppError, ErrorBody};
use crate::ports::push::PushSender;
use crate::state::AppState;
use crate::types::identity::AdminIdentity;

use axum::Json;
use axum::extract::{FromRequestParts, State};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

pub(crate) const LOGIN_PAGE: &str = "/admin/login";

/// Extractor that requires a valid admin session.
///
/// Anonymous API requests get `401`; page requests are redirected to the
/// login page.
pub(crate) struct RequireSession(pub(crate) AdminIdentity);

pub(crate) enum SessionRejection {
    RedirectToLogin,
    Unauthorized,
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PAGE).into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody {
                    error: "unauthorized".to_string(),
                }),
            )
                .into_response(),
        }
    }
}

impl<P: PushSender> FromRequestParts<AppState<P>> for RequireSession {
    type Rejection = SessionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<P>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(identity) = state.sessions.resolve(&parts.headers).await {
            return Ok(Self(identity));
        }
        if is_api_path(parts.uri.path()) {
            Err(SessionRejection::Unauthorized)
        } else {
            Err(SessionRejection::RedirectToLogin)
        }
    }
}

fn is_api_path(path: &str) -> bool {
    path.starts_with("/admin/api/") || path.starts_with("/api/")
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    email: String,
    secret: String,
}

pub(crate) async fn login<P: PushSender>(
    State(state): State<AppState<P>>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let identity = state
        .credentials
        .authenticate(&request.email, &request.secret)
        .await
        .map_err(|_| AppError::InvalidCredentials)?;

    let cookie = state
        .sessions
        .issue(&identity)
        .map_err(|err| AppError::Internal(format!("failed to issue session: {err}")))?;
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|err| AppError::Internal(format!("invalid session cookie: {err}")))?;

    let mut response = Json(identity).into_response();
    response.headers_mut().append(SET_COOKIE, cookie);
    Ok(response)
}

pub(crate) async fn logout<P: PushSender>(
    State(state): State<AppState<P>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(session) = state.sessions.resolve_verified(&headers).await {
        state.sessions.revoke(&session).await;
    }
    let cookie = HeaderValue::from_str(&state.sessions.clear_cookie())
        .map_err(|err| AppError::Internal(format!("invalid logout cookie: {err}")))?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    response.headers_mut().append(SET_COOKIE, cookie);
    Ok(response)
}

pub(crate) async fn session_check(RequireSession(identity): RequireSession) -> Json<AdminIdentity> {
    Json(identity)
}
