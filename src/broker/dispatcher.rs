//! Broadcast dispatcher
//!
//! `Broker::publish` is the only way events enter the broker. Upstream code
//! calls it after the triggering write is committed. The subscriber set is
//! snapshotted under the state lock, the lock is released, and the frame is
//! delivered to every subscriber in parallel. Each delivery is bounded by the
//! configured delivery timeout; a subscriber that cannot take the frame is
//! treated as disconnected and cleaned up, without affecting the others.
//!
//! Ordering: frames from one caller's sequential publishes reach a given
//! subscriber in call order. Concurrent publishers to the same chat are not
//! ordered against each other.

use tracing::{debug, error, warn};

use crate::broker::engine::Broker;
use crate::broker::event::Event;
use crate::broker::fanout::fan_out;
use crate::broker::topic::ChatId;
use crate::connection::Connection;

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

impl PublishReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

impl Broker {
    /// Deliver `event` to every current subscriber of `topic` and wait for
    /// all deliveries to finish. Publishing to a chat nobody subscribed to
    /// is a no-op.
    pub async fn publish(&self, topic: ChatId, event: &Event) -> PublishReport {
        let subscribers = self.snapshot_subscribers(topic);
        if subscribers.is_empty() {
            debug!(chat_id = topic, event = event.kind(), "no subscribers");
            return PublishReport::default();
        }

        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(chat_id = topic, "failed to serialize event: {e}");
                return PublishReport::default();
            }
        };

        let timeout = self.delivery_timeout();
        let outcomes = fan_out(subscribers, |connection: Connection| {
            let frame = frame.clone();
            async move { connection.deliver(frame, timeout).await }
        })
        .await;

        let mut report = PublishReport::default();
        for (connection, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(chat_id = topic, "dropping subscriber: {e}");
                    self.on_connection_closed(&connection);
                    report.failed += 1;
                }
            }
        }

        debug!(
            chat_id = topic,
            event = event.kind(),
            delivered = report.delivered,
            failed = report.failed,
            "published"
        );
        report
    }
}
