//! Domain event publishing over NATS

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::domain::events::DomainEvent;

const SUBJECT_PREFIX: &str = "storefront";

#[derive(Serialize)]
struct Envelope<'a> { id: Uuid, occurred_at: DateTime<Utc>, session: &'a str, event: &'a DomainEvent }

impl<'a> Envelope<'a> {
    fn new(session: &'a str, event: &'a DomainEvent) -> Self { Self { id: Uuid::now_v7(), occurred_at: Utc::now(), session, event } }
}

/// Publishes events for a session. Failures are logged; events are best-effort.
pub async fn publish(nats: Option<&async_nats::Client>, session: &str, events: Vec<DomainEvent>) {
    let Some(client) = nats else { return };
    for event in &events {
        let payload = match serde_json::to_vec(&Envelope::new(session, event)) {
            Ok(p) => p,
            Err(e) => { warn!(error = %e, "failed to encode event"); continue; }
        };
        let subject = format!("{}.{}", SUBJECT_PREFIX, event.subject());
        if let Err(e) = client.publish(subject, payload.into()).await {
            warn!(error = %e, session, "failed to publish event");
        }
    }
}
