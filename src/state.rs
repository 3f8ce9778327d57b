use crate::adapters::WebPushSender;
use crate::auth::{CredentialStore, SessionGuard};
use crate::config::AppConfig;
use crate::push::{JsonFileStore, SubscriptionRegistry};
use crate::records::RecordStore;
use crate::types::records::{Lead, Project};

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState<P = WebPushSender> {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionGuard>,
    pub credentials: Arc<CredentialStore>,
    pub subscriptions: Arc<SubscriptionRegistry<JsonFileStore>>,
    /// `None` when push notifications are not configured.
    pub push_sender: Option<P>,
    pub leads: Arc<RecordStore<Lead>>,
    pub projects: Arc<RecordStore<Project>>,
}
