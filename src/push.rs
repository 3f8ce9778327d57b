use crate::adapters::WebPushSender;
use crate::config;

pub mod registry;
pub mod store;
pub(crate) mod vapid;

pub use registry::{DeliveryOutcome, DeliveryReport, RegistryError, SubscriptionRegistry};
pub use store::{JsonFileStore, SUBSCRIPTIONS_FILE, SubscriptionStore};
pub(crate) use vapid::{VapidConfigStatus, load_vapid_config};
pub use vapid::{VapidCredentials, generate_vapid_credentials};

/// Builds the web-push sender, or `None` when notifications are disabled.
/// Missing credentials are not an error: notifications are optional.
pub fn build_sender(config: &config::PushConfig) -> Option<WebPushSender> {
    let vapid = match load_vapid_config(config) {
        VapidConfigStatus::Ready(vapid) => vapid,
        VapidConfigStatus::Incomplete => {
            tracing::warn!("push notifications disabled: incomplete VAPID configuration");
            return None;
        }
        VapidConfigStatus::Missing => {
            tracing::info!("push notifications disabled: no VAPID configuration");
            return None;
        }
    };

    match WebPushSender::new(vapid, config.timeout) {
        Ok(sender) => Some(sender),
        Err(err) => {
            tracing::warn!(error = %err, "push notifications disabled: failed to init web-push");
            None
        }
    }
}
