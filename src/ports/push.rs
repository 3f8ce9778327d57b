use crate::types::push::PushEndpoint;

/// How a single delivery attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The provider reports the subscription no longer exists.
    #[error("endpoint gone: {0}")]
    EndpointGone(String),
    #[error("delivery failed: {0}")]
    Transient(String),
}

pub trait PushSender: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Result<(), DeliveryError>> + Send + 'a
    where
        Self: 'a;

    fn send<'a>(&'a self, endpoint: &'a PushEndpoint, message: &'a str) -> Self::Fut<'a>;
}
