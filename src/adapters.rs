use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::ports::push::{DeliveryError, PushSender};
use crate::types::push::{PushEndpoint, VapidConfig};

/// Seconds a push service keeps an undelivered message.
const MESSAGE_TTL: u32 = 24 * 60 * 60;

#[derive(Clone)]
pub struct WebPushSender {
    vapid: VapidConfig,
    client: Arc<web_push::WebPushClient>,
    timeout: Duration,
}

impl WebPushSender {
    pub fn new(vapid: VapidConfig, timeout: Duration) -> Result<Self, web_push::WebPushError> {
        let client = web_push::WebPushClient::new()?;
        Ok(Self {
            vapid,
            client: Arc::new(client),
            timeout,
        })
    }

    async fn deliver(
        &self,
        endpoint: &PushEndpoint,
        message: &str,
    ) -> Result<(), web_push::WebPushError> {
        let subscription_info = web_push::SubscriptionInfo::new(
            endpoint.endpoint.clone(),
            endpoint.keys.p256dh.clone(),
            endpoint.keys.auth.clone(),
        );
        let mut builder = web_push::WebPushMessageBuilder::new(&subscription_info)?;
        builder.set_payload(web_push::ContentEncoding::Aes128Gcm, message.as_bytes());
        builder.set_ttl(MESSAGE_TTL);
        let mut signature_builder = web_push::VapidSignatureBuilder::from_base64(
            &self.vapid.private_key,
            web_push::URL_SAFE_NO_PAD,
            &subscription_info,
        )?;
        signature_builder.add_claim("sub", self.vapid.subject.as_str());
        builder.set_vapid_signature(signature_builder.build()?);
        self.client.send(builder.build()?).await
    }
}

fn classify(err: web_push::WebPushError) -> DeliveryError {
    match err {
        web_push::WebPushError::EndpointNotValid | web_push::WebPushError::EndpointNotFound => {
            DeliveryError::EndpointGone(err.to_string())
        }
        other => DeliveryError::Transient(other.to_string()),
    }
}

impl PushSender for WebPushSender {
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>
    where
        Self: 'a;

    fn send<'a>(&'a self, endpoint: &'a PushEndpoint, message: &'a str) -> Self::Fut<'a> {
        Box::pin(bounded(self.timeout, self.deliver(endpoint, message)))
    }
}

/// Runs one delivery attempt, giving up after `timeout`.
async fn bounded<F>(timeout: Duration, delivery: F) -> Result<(), DeliveryError>
where
    F: Future<Output = Result<(), web_push::WebPushError>>,
{
    match tokio::time::timeout(timeout, delivery).await {
        Ok(result) => result.map_err(classify),
        Err(_) => Err(DeliveryError::Transient(format!(
            "timed out after {}s",
            timeout.as_secs()
        ))),
    }
}
