use crate::adapters::WebPushSender;
use crate::auth as auth_service;
use crate::config;
use crate::ports::push::PushSender;
use crate::push as push_service;
use crate::records::{self, RecordStore};
use crate::state::AppState;
use crate::storage::StoreError;

use axum::Router;
use axum::routing::{get, patch, post};
use tower_http::trace::TraceLayer;

use std::path::PathBuf;
use std::sync::Arc;

mod admin;
mod auth;
mod contact;
mod push;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid session configuration: {0}")]
    Auth(#[from] auth_service::AuthError),
    #[error("failed to load administrators: {0}")]
    Credentials(#[from] auth_service::credentials::CredentialError),
    #[error("failed to load stored data: {0}")]
    Store(#[from] StoreError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Loads every durable store under `config.data_dir` and wires them into one
/// shared state, using `sender` for push delivery.
pub async fn build_state_with<P: PushSender>(
    config: config::AppConfig,
    sender: Option<P>,
) -> Result<AppState<P>, StartupError> {
    let data_dir = config.data_dir.clone();
    std::fs::create_dir_all(&data_dir).map_err(|source| StartupError::DataDir {
        path: data_dir.clone(),
        source,
    })?;

    let sessions = auth_service::SessionGuard::from_config(&config)?;
    let credentials =
        auth_service::CredentialStore::load(data_dir.join(auth_service::credentials::ADMINS_FILE))?;
    let subscriptions = push_service::SubscriptionRegistry::open(push_service::JsonFileStore::new(
        data_dir.join(push_service::SUBSCRIPTIONS_FILE),
    ))
    .await?;
    let leads = RecordStore::load(data_dir.join(records::LEADS_FILE))?;
    let projects = RecordStore::load(data_dir.join(records::PROJECTS_FILE))?;

    tracing::info!(
        data_dir = %data_dir.display(),
        admins = credentials.len().await,
        push_subscribers = subscriptions.len().await,
        push_enabled = sender.is_some(),
        session_revocation = sessions.revocation_enabled(),
        "back-office state loaded"
    );

    Ok(AppState {
        config: Arc::new(config),
        sessions: Arc::new(sessions),
        credentials: Arc::new(credentials),
        subscriptions: Arc::new(subscriptions),
        push_sender: sender,
        leads: Arc::new(leads),
        projects: Arc::new(projects),
    })
}

pub async fn build_state(
    config: config::AppConfig,
) -> Result<AppState<WebPushSender>, StartupError> {
    let sender = push_service::build_sender(&config.push);
    build_state_with(config, sender).await
}

pub fn router<P: PushSender>(state: AppState<P>) -> Router {
    Router::new()
        .route("/admin", get(admin::dashboard::<P>))
        .route("/admin/api/login", post(auth::login::<P>))
        .route("/admin/api/logout", post(auth::logout::<P>))
        .route("/admin/api/session", get(auth::session_check))
        .route(
            "/admin/api/push/public-key",
            get(push::push_public_key::<P>),
        )
        .route(
            "/admin/api/push/subscribe",
            post(push::push_subscribe::<P>).delete(push::push_unsubscribe::<P>),
        )
        .route("/admin/api/push/test", post(push::push_test::<P>))
        .route("/admin/api/leads", get(admin::lead_list::<P>))
        .route("/admin/api/leads/{id}", patch(admin::lead_update::<P>))
        .route(
            "/admin/api/projects",
            get(admin::project_list::<P>).post(admin::project_create::<P>),
        )
        .route(
            "/admin/api/projects/{id}",
            get(admin::project_get::<P>)
                .put(admin::project_update::<P>)
                .delete(admin::project_delete::<P>),
        )
        .route("/api/contact", post(contact::contact_submit::<P>))
        .route("/api/projects", get(admin::public_projects::<P>))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) async fn health() -> &'static str {
    "ok"
}
