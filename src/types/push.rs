use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One browser's consent to receive notifications, in the shape produced by
/// `PushSubscription.toJSON()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEndpoint {
    pub endpoint: String,
    pub keys: PushKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

impl PushEndpoint {
    pub fn is_complete(&self) -> bool {
        !self.endpoint.trim().is_empty()
            && !self.keys.p256dh.trim().is_empty()
            && !self.keys.auth.trim().is_empty()
    }
}

/// Admin id to endpoint. At most one endpoint per admin.
pub type SubscriptionMap = BTreeMap<String, PushEndpoint>;

#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub private_key: String,
    pub public_key: String,
    pub subject: String,
}
