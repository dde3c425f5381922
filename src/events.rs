//! Domain event publishing.
//!
//! Every event is logged. With a NATS connection it is also published as JSON
//! on `DomainEvent::subject()`. Publishing never fails the request that raised
//! the event.

use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn is_connected(&self) -> bool { self.nats.is_some() }

    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = event.subject();
            tracing::info!(%subject, "domain event");
            let Some(nats) = &self.nats else { continue };
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(%subject, error = %e, "failed to encode event");
                    continue;
                }
            };
            if let Err(e) = nats.publish(subject.clone(), payload.into()).await {
                tracing::warn!(%subject, error = %e, "failed to publish event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::CustomerEvent;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_without_nats_only_logs() {
        let publisher = EventPublisher::default();
        assert!(!publisher.is_connected());
        publisher
            .publish(vec![DomainEvent::Customer(CustomerEvent::Deleted { customer_id: Uuid::new_v4() })])
            .await;
    }
}
