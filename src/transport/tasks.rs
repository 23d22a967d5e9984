//! Background tasks owned by a transport.
//!
//! Two tasks per transport: the heartbeat ticker and the change-feed
//! consumer. Both hold only the shared inner state, are aborted on
//! destroy, and re-check the state after every suspension point.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;

use super::{ChangeAction, Inner, classify};
use crate::store::ChangeSubscription;

/// Refreshes the listener record and collects garbage every interval.
pub(super) async fn heartbeat(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(inner.config.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; registration already happened.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if !inner.is_active() {
            break;
        }
        inner.heartbeat();
    }

    tracing::debug!(target_id = %inner.target_id, "heartbeat stopped");
}

/// Consumes the change feed and runs the deferred pass for each change.
pub(super) async fn notifications(inner: Arc<Inner>, mut feed: ChangeSubscription) {
    loop {
        let action = match feed.recv().await {
            Ok(event) => classify(&event),
            Err(RecvError::Lagged(n)) => {
                tracing::warn!(
                    target_id = %inner.target_id,
                    lagged = n,
                    "change feed lagged, scanning for messages"
                );
                ChangeAction::Deliver
            }
            Err(RecvError::Closed) => break,
        };
        if action == ChangeAction::Ignore {
            continue;
        }

        // Never touch the store from inside the notification itself.
        tokio::task::yield_now().await;
        if !inner.is_active() {
            break;
        }
        inner.apply(action);
    }

    tracing::debug!(target_id = %inner.target_id, "change feed closed");
}
