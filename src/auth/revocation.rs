use super::CLOCK_SKEW_SECS;
use std::collections::HashMap;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

/// Token ids invalidated before their natural expiry. Entries are kept until
/// verification would reject the token anyway (expiry plus the clock skew
/// tolerance), so the list stays bounded by the number of logouts within one
/// session horizon.
///
/// Process-local: another server instance does not see these entries.
#[derive(Debug, Default)]
pub(crate) struct RevocationList {
    revoked: RwLock<HashMap<String, OffsetDateTime>>,
}

impl RevocationList {
    pub(crate) async fn revoke(
        &self,
        token_id: &str,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) {
        let until = expires_at + Duration::seconds(CLOCK_SKEW_SECS as i64);
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, kept_until| *kept_until > now);
        if until > now {
            revoked.insert(token_id.to_string(), until);
        }
    }

    pub(crate) async fn is_revoked(&self, token_id: &str) -> bool {
        self.revoked.read().await.contains_key(token_id)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.revoked.read().await.len()
    }
}
