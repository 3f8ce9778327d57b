use crate::ports::push::{DeliveryError, PushSender};
use crate::push::store::SubscriptionStore;
use crate::storage::StoreError;
use crate::types::notification::NotificationEvent;
use crate::types::push::{PushEndpoint, SubscriptionMap};

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to persist push subscriptions: {0}")]
    Persistence(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The provider reported the endpoint gone; the entry was pruned.
    Gone,
    Failed(String),
}

/// What happened to one recipient during a fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub identity_key: String,
    pub endpoint: String,
    pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
    fn new(identity_key: String, endpoint: String, result: Result<(), DeliveryError>) -> Self {
        let outcome = match result {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(DeliveryError::EndpointGone(_)) => DeliveryOutcome::Gone,
            Err(DeliveryError::Transient(reason)) => DeliveryOutcome::Failed(reason),
        };
        Self {
            identity_key,
            endpoint,
            outcome,
        }
    }
}

/// Admin id to push endpoint, mirrored to the injected store.
pub struct SubscriptionRegistry<S> {
    store: S,
    entries: RwLock<SubscriptionMap>,
}

impl<S: SubscriptionStore> SubscriptionRegistry<S> {
    pub async fn open(store: S) -> Result<Self, StoreError> {
        let entries = store.load().await?;
        tracing::info!(subscriptions = entries.len(), "push registry loaded");
        Ok(Self {
            store,
            entries: RwLock::new(entries),
        })
    }

    pub async fn get(&self, identity_key: &str) -> Option<PushEndpoint> {
        self.entries.read().await.get(identity_key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Stores `endpoint` for `identity_key`, replacing any previous one, and
    /// persists before returning. On a failed write the in-memory entry is
    /// kept and the error returned.
    pub async fn subscribe(
        &self,
        identity_key: &str,
        endpoint: PushEndpoint,
    ) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().await;
        let replaced = entries
            .insert(identity_key.to_string(), endpoint)
            .is_some();
        self.persist(&entries).await?;
        tracing::info!(identity_key, replaced, "push endpoint subscribed");
        Ok(())
    }

    /// Removes the endpoint for `identity_key`. Returns whether one existed;
    /// an absent key is not an error and causes no write.
    pub async fn unsubscribe(&self, identity_key: &str) -> Result<bool, RegistryError> {
        let mut entries = self.entries.write().await;
        if entries.remove(identity_key).is_none() {
            return Ok(false);
        }
        self.persist(&entries).await?;
        tracing::info!(identity_key, "push endpoint unsubscribed");
        Ok(true)
    }

    /// Delivers `event` to every registered endpoint. Never fails: a missing
    /// sender or empty registry is a logged no-op, gone endpoints are pruned
    /// and other errors are logged and dropped.
    pub async fn notify_all<P: PushSender>(
        &self,
        sender: Option<&P>,
        event: &NotificationEvent,
    ) -> Vec<DeliveryReport> {
        let category = event.payload.category();
        let Some(sender) = sender else {
            tracing::info!(category, "push not configured, notification skipped");
            return Vec::new();
        };
        let recipients: Vec<(String, PushEndpoint)> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(key, endpoint)| (key.clone(), endpoint.clone()))
            .collect();
        if recipients.is_empty() {
            tracing::info!(category, "no push subscribers, notification skipped");
            return Vec::new();
        }
        self.fan_out(sender, recipients, event).await
    }

    /// Delivers `event` to a single admin's endpoint, if they have one.
    pub async fn notify_one<P: PushSender>(
        &self,
        sender: &P,
        identity_key: &str,
        event: &NotificationEvent,
    ) -> Option<DeliveryReport> {
        let endpoint = self.get(identity_key).await?;
        self.fan_out(sender, vec![(identity_key.to_string(), endpoint)], event)
            .await
            .pop()
    }

    async fn fan_out<P: PushSender>(
        &self,
        sender: &P,
        recipients: Vec<(String, PushEndpoint)>,
        event: &NotificationEvent,
    ) -> Vec<DeliveryReport> {
        let message: Arc<str> = Arc::from(event.to_message());
        let mut deliveries = JoinSet::new();
        for (identity_key, endpoint) in recipients {
            let sender = sender.clone();
            let message = Arc::clone(&message);
            deliveries.spawn(async move {
                let result = sender.send(&endpoint, &message).await;
                DeliveryReport::new(identity_key, endpoint.endpoint, result)
            });
        }

        let mut reports = Vec::with_capacity(deliveries.len());
        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(err) => tracing::error!(error = %err, "push delivery task aborted"),
            }
        }

        let category = event.payload.category();
        for report in &reports {
            match &report.outcome {
                DeliveryOutcome::Delivered => {
                    tracing::debug!(identity_key = %report.identity_key, category, "push delivered");
                }
                DeliveryOutcome::Gone => {
                    tracing::info!(
                        identity_key = %report.identity_key,
                        endpoint = %report.endpoint,
                        "push endpoint gone"
                    );
                }
                DeliveryOutcome::Failed(reason) => {
                    tracing::warn!(
                        identity_key = %report.identity_key,
                        category,
                        error = %reason,
                        "push delivery failed"
                    );
                }
            }
        }

        self.prune(&reports).await;
        reports
    }

    async fn prune(&self, reports: &[DeliveryReport]) {
        let gone: Vec<&DeliveryReport> = reports
            .iter()
            .filter(|report| report.outcome == DeliveryOutcome::Gone)
            .collect();
        if gone.is_empty() {
            return;
        }

        let mut entries = self.entries.write().await;
        let mut removed = 0usize;
        for report in gone {
            // A fresh subscription may have replaced the dead one meanwhile.
            let still_current = entries
                .get(&report.identity_key)
                .is_some_and(|current| current.endpoint == report.endpoint);
            if still_current {
                entries.remove(&report.identity_key);
                removed += 1;
            }
        }
        if removed == 0 {
            return;
        }
        if self.persist(&entries).await.is_ok() {
            tracing::info!(removed, "pruned gone push endpoints");
        }
    }

    async fn persist(&self, entries: &SubscriptionMap) -> Result<(), RegistryError> {
        self.store.save(entries).await.map_err(|err| {
            tracing::error!(error = %err, "failed to persist push subscriptions");
            RegistryError::Persistence(err)
        })
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::push::store::{JsonFileStore, MemoryStore, SUBSCRIPTIONS_FILE};
    use crate::push::testing::{RecordingSender, endpoint};
    use crate::storage::create_temp_root;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use uuid::Uuid;

    fn lead_event() -> NotificationEvent {
        NotificationEvent::new_lead(Uuid::nil(), "Ada", "ada@example.com", "Need a website")
    }

    async fn registry_with(keys: &[&str]) -> (SubscriptionRegistry<MemoryStore>, MemoryStore) {
        let store = MemoryStore::default();
        let registry = SubscriptionRegistry::open(store.clone())
            .await
            .expect("open registry");
        for key in keys {
            registry
                .subscribe(key, endpoint(&format!("https://push.example/{key}")))
                .await
                .expect("subscribe");
        }
        (registry, store)
    }

    #[tokio::test]
    async fn subscribe__should_keep_one_endpoint_per_identity() {
        // Given
        let (registry, store) = registry_with(&[]).await;

        // When
        registry
            .subscribe("admin-1", endpoint("https://push.example/a"))
            .await
            .expect("subscribe");
        registry
            .subscribe("admin-1", endpoint("https://push.example/a"))
            .await
            .expect("subscribe again");
        registry
            .subscribe("admin-1", endpoint("https://push.example/b"))
            .await
            .expect("resubscribe");

        // Then
        assert_eq!(registry.len().await, 1);
        assert_eq!(
            registry.get("admin-1").await.map(|found| found.endpoint),
            Some("https://push.example/b".to_string())
        );
        assert_eq!(store.saved().len(), 1);
        assert_eq!(store.writes(), 3);
    }

    #[tokio::test]
    async fn unsubscribe__should_remove_entry_and_ignore_absent_keys() {
        // Given
        let (registry, store) = registry_with(&["admin-1"]).await;

        // When
        let removed = registry.unsubscribe("admin-1").await.expect("unsubscribe");
        let removed_again = registry.unsubscribe("admin-1").await.expect("unsubscribe");

        // Then
        assert!(removed);
        assert!(!removed_again);
        assert!(registry.get("admin-1").await.is_none());
        assert!(store.saved().is_empty());
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn subscribe__should_report_persistence_failure() {
        // Given
        let (registry, store) = registry_with(&[]).await;
        store.fail_writes.store(true, Ordering::SeqCst);

        // When
        let result = registry
            .subscribe("admin-1", endpoint("https://push.example/a"))
            .await;

        // Then
        assert!(matches!(result, Err(RegistryError::Persistence(_))));
        assert!(store.saved().is_empty());
        assert!(registry.get("admin-1").await.is_some());
    }

    #[tokio::test]
    async fn notify_all__should_do_nothing_without_subscribers() {
        // Given
        let (registry, _store) = registry_with(&[]).await;
        let sender = RecordingSender::default();

        // When
        let reports = registry.notify_all(Some(&sender), &lead_event()).await;

        // Then
        assert!(reports.is_empty());
        assert!(sender.attempts().is_empty());
    }

    #[tokio::test]
    async fn notify_all__should_do_nothing_without_provider_credentials() {
        // Given
        let (registry, store) = registry_with(&["admin-1", "admin-2"]).await;

        // When
        let reports = registry
            .notify_all(None::<&RecordingSender>, &lead_event())
            .await;

        // Then
        assert!(reports.is_empty());
        assert_eq!(registry.len().await, 2);
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn notify_all__should_prune_only_gone_endpoint_and_still_reach_others() {
        // Given
        let (registry, store) = registry_with(&["admin-1", "admin-2", "admin-3"]).await;
        let sender = RecordingSender::default().with_gone("https://push.example/admin-1");

        // When
        let reports = registry.notify_all(Some(&sender), &lead_event()).await;

        // Then
        let mut attempted = sender.attempts();
        attempted.sort();
        assert_eq!(
            attempted,
            vec![
                "https://push.example/admin-1".to_string(),
                "https://push.example/admin-2".to_string(),
                "https://push.example/admin-3".to_string(),
            ]
        );
        assert_eq!(reports.len(), 3);
        assert_eq!(
            reports
                .iter()
                .filter(|report| report.outcome == DeliveryOutcome::Gone)
                .count(),
            1
        );
        assert!(registry.get("admin-1").await.is_none());
        assert!(registry.get("admin-2").await.is_some());
        assert!(registry.get("admin-3").await.is_some());
        assert!(!store.saved().contains_key("admin-1"));
        assert_eq!(store.saved().len(), 2);
    }

    #[tokio::test]
    async fn notify_all__should_keep_endpoint_after_transient_failure() {
        // Given
        let (registry, store) = registry_with(&["admin-1", "admin-2"]).await;
        let sender = RecordingSender::default().with_failing("https://push.example/admin-2");

        // When
        let reports = registry.notify_all(Some(&sender), &lead_event()).await;

        // Then
        let failed = reports
            .iter()
            .find(|report| report.identity_key == "admin-2")
            .expect("admin-2 report");
        assert!(matches!(failed.outcome, DeliveryOutcome::Failed(_)));
        let delivered = reports
            .iter()
            .find(|report| report.identity_key == "admin-1")
            .expect("admin-1 report");
        assert_eq!(delivered.outcome, DeliveryOutcome::Delivered);
        assert_eq!(registry.len().await, 2);
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn notify_all__should_deliver_to_recipients_concurrently() {
        // Given
        let (registry, _store) = registry_with(&["admin-1", "admin-2", "admin-3"]).await;
        let sender = RecordingSender::default().with_barrier(3);

        // When
        let reports = tokio::time::timeout(
            Duration::from_secs(5),
            registry.notify_all(Some(&sender), &lead_event()),
        )
        .await
        .expect("deliveries should not wait on each other");

        // Then
        assert_eq!(reports.len(), 3);
        assert!(
            reports
                .iter()
                .all(|report| report.outcome == DeliveryOutcome::Delivered)
        );
    }

    #[tokio::test]
    async fn notify_one__should_only_reach_the_requested_identity() {
        // Given
        let (registry, _store) = registry_with(&["admin-1", "admin-2"]).await;
        let sender = RecordingSender::default();

        // When
        let report = registry
            .notify_one(&sender, "admin-2", &lead_event())
            .await
            .expect("report");
        let missing = registry.notify_one(&sender, "admin-9", &lead_event()).await;

        // Then
        assert_eq!(report.outcome, DeliveryOutcome::Delivered);
        assert!(missing.is_none());
        assert_eq!(sender.attempts(), vec!["https://push.example/admin-2".to_string()]);
    }

    #[tokio::test]
    async fn open__should_give_each_instance_its_own_view_of_the_file() {
        // Given
        let root = create_temp_root("registry-instances");
        let path = root.join(SUBSCRIPTIONS_FILE);
        let first = SubscriptionRegistry::open(JsonFileStore::new(path.clone()))
            .await
            .expect("open first");
        let second = SubscriptionRegistry::open(JsonFileStore::new(path.clone()))
            .await
            .expect("open second");

        // When
        first
            .subscribe("admin-1", endpoint("https://push.example/a"))
            .await
            .expect("subscribe");

        // Then
        assert!(second.get("admin-1").await.is_none());
        let reopened = SubscriptionRegistry::open(JsonFileStore::new(path))
            .await
            .expect("reopen");
        assert_eq!(
            reopened.get("admin-1").await,
            Some(endpoint("https://push.example/a"))
        );

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn notify_all__should_prune_from_a_detached_task() {
        // Given
        let (registry, store) = registry_with(&["admin-1", "admin-2"]).await;
        let registry = Arc::new(registry);
        let sender = RecordingSender::default().with_gone("https://push.example/admin-2");
        let event = lead_event();

        // When
        let task = tokio::spawn({
            let registry = Arc::clone(&registry);
            let sender = Some(sender.clone());
            async move { registry.notify_all(sender.as_ref(), &event).await }
        });
        let reports = task.await.expect("fan-out task");

        // Then
        assert_eq!(reports.len(), 2);
        assert!(registry.get("admin-2").await.is_none());
        assert!(registry.get("admin-1").await.is_some());
        assert_eq!(store.saved().len(), 1);
    }
}
