use crate::app::auth::RequireSession;
use crate::error::AppError;
use crate::ports::push::PushSender;
use crate::push as push_service;
use crate::push::DeliveryOutcome;
use crate::state::AppState;
use crate::types::notification::NotificationEvent;
use crate::types::push::PushEndpoint;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

#[derive(Serialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: &'static str,
}

const NOT_CONFIGURED: &str = "push notifications are not configured";

pub(crate) async fn push_public_key<P: PushSender>(
    State(state): State<AppState<P>>,
    RequireSession(_): RequireSession,
) -> Result<Json<PublicKeyResponse>, AppError> {
    match push_service::load_vapid_config(&state.config.push) {
        push_service::VapidConfigStatus::Ready(vapid) => Ok(Json(PublicKeyResponse {
            public_key: vapid.public_key,
        })),
        push_service::VapidConfigStatus::Incomplete | push_service::VapidConfigStatus::Missing => {
            Err(AppError::Unavailable(NOT_CONFIGURED))
        }
    }
}

pub(crate) async fn push_subscribe<P: PushSender>(
    State(state): State<AppState<P>>,
    RequireSession(identity): RequireSession,
    Json(endpoint): Json<PushEndpoint>,
) -> Result<Json<StatusResponse>, AppError> {
    if !endpoint.is_complete() {
        return Err(AppError::Validation(
            "endpoint, keys.p256dh and keys.auth are required".to_string(),
        ));
    }
    if !endpoint.endpoint.starts_with("https://") {
        return Err(AppError::Validation(
            "endpoint must be an https URL".to_string(),
        ));
    }

    state.subscriptions.subscribe(&identity.id, endpoint).await?;
    Ok(Json(StatusResponse {
        status: "subscribed",
    }))
}

pub(crate) async fn push_unsubscribe<P: PushSender>(
    State(state): State<AppState<P>>,
    RequireSession(identity): RequireSession,
) -> Result<Json<StatusResponse>, AppError> {
    state.subscriptions.unsubscribe(&identity.id).await?;
    Ok(Json(StatusResponse {
        status: "unsubscribed",
    }))
}

/// Sends a test notification to the caller's own endpoint.
pub(crate) async fn push_test<P: PushSender>(
    State(state): State<AppState<P>>,
    RequireSession(identity): RequireSession,
) -> Result<Json<StatusResponse>, AppError> {
    let sender = state
        .push_sender
        .as_ref()
        .ok_or(AppError::Unavailable(NOT_CONFIGURED))?;
    let event = NotificationEvent::test(&state.config.app_name, &identity.name);

    let report = state
        .subscriptions
        .notify_one(sender, &identity.id, &event)
        .await
        .ok_or(AppError::NotFound)?;

    match report.outcome {
        DeliveryOutcome::Delivered => Ok(Json(StatusResponse { status: "sent" })),
        DeliveryOutcome::Gone => Err(AppError::Conflict(
            "push subscription expired; subscribe again".to_string(),
        )),
        DeliveryOutcome::Failed(_) => Err(AppError::BadGateway(
            "failed to send test notification",
        )),
    }
}
