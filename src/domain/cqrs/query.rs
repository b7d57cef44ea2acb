//! CQRS query handler for iteration log event projection.
//!
//! The LogViewQuery applies events to the IterationLogView projection
//! and broadcasts them to subscribers via tokio channels.

use super::IterationLogAggregate;
use crate::domain::view::{IterationLogView, LogEventEnvelope};
use async_trait::async_trait;
use cqrs_es::Query;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};

/// CQRS query handler that maintains the IterationLogView projection.
pub struct LogViewQuery {
    /// In-memory projection of the log state.
    pub projection: Arc<RwLock<IterationLogView>>,
    /// Watch channel for snapshot updates (latest view).
    pub snapshot_tx: watch::Sender<IterationLogView>,
    /// Broadcast channel for event streaming.
    pub event_tx: broadcast::Sender<LogEventEnvelope>,
}

impl LogViewQuery {
    /// Creates a new log view query handler.
    pub fn new(
        projection: Arc<RwLock<IterationLogView>>,
        snapshot_tx: watch::Sender<IterationLogView>,
        event_tx: broadcast::Sender<LogEventEnvelope>,
    ) -> Self {
        Self {
            projection,
            snapshot_tx,
            event_tx,
        }
    }
}

#[async_trait]
impl Query<IterationLogAggregate> for LogViewQuery {
    async fn dispatch(
        &self,
        aggregate_id: &str,
        events: &[cqrs_es::EventEnvelope<IterationLogAggregate>],
    ) {
        let mut view = self.projection.write().await;

        for event in events {
            view.apply_event(aggregate_id, &event.payload, event.sequence as u64);

            let envelope = LogEventEnvelope::from(event);
            if let Err(e) = self.event_tx.send(envelope) {
                tracing::warn!("Failed to broadcast event: {:?}", e);
            }
        }

        // Send updated view snapshot
        let _ = self.snapshot_tx.send(view.clone());
    }
}
