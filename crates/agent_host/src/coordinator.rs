//! Delivery of lookup results to the page that asked for them.
//!
//! One delivery runs through a fixed sequence:
//!
//! 1. check the surface still exists
//! 2. send directly; an acknowledgement ends the delivery
//! 3. otherwise check presence again, install a receiver, wait for it to
//!    settle and check presence once more
//! 4. send one last time
//!
//! A delivery installs at most one receiver. A failed presence check ends it
//! immediately.

use chrono::Utc;
use services::HistoryStore;
use shared::messages::PageMessage;
use shared::outcome::TranslationOutcome;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::surface::{HostError, SurfaceHost, SurfaceId};

/// Time given to a freshly installed receiver before the retry.
pub const SETTLE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryFailed {
    #[error("{0} no longer exists")]
    SurfaceGone(SurfaceId),

    #[error(transparent)]
    Injection(HostError),

    #[error("{0} did not acknowledge the result")]
    NoAcknowledgment(SurfaceId),
}

pub struct DeliveryCoordinator {
    host: Arc<dyn SurfaceHost>,
    history: Arc<HistoryStore>,
    settle_delay: Duration,
}

impl DeliveryCoordinator {
    pub fn new(host: Arc<dyn SurfaceHost>, history: Arc<HistoryStore>) -> Self {
        Self {
            host,
            history,
            settle_delay: SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Deliver `outcome` to `target`. Failures are logged, never raised.
    pub async fn deliver(&self, target: SurfaceId, outcome: &TranslationOutcome) -> bool {
        match self.try_deliver(target, outcome).await {
            Ok(()) => true,
            Err(e) => {
                warn!(surface = %target, error = %e, "result not delivered");
                false
            }
        }
    }

    pub async fn try_deliver(&self, target: SurfaceId, outcome: &TranslationOutcome) -> Result<(), DeliveryFailed> {
        let message = PageMessage::from_outcome(outcome);

        self.ensure_present(target).await?;
        if self.send(target, &message).await {
            self.acknowledged(target, outcome).await;
            return Ok(());
        }

        debug!(surface = %target, "no receiver answered, installing one");
        self.ensure_present(target).await?;
        self.host
            .inject_receiver(target)
            .await
            .map_err(|e| match e {
                HostError::SurfaceGone(id) => DeliveryFailed::SurfaceGone(id),
                other => DeliveryFailed::Injection(other),
            })?;
        tokio::time::sleep(self.settle_delay).await;
        self.ensure_present(target).await?;

        if self.send(target, &message).await {
            self.acknowledged(target, outcome).await;
            return Ok(());
        }
        Err(DeliveryFailed::NoAcknowledgment(target))
    }

    async fn ensure_present(&self, target: SurfaceId) -> Result<(), DeliveryFailed> {
        if self.host.exists(target).await {
            Ok(())
        } else {
            Err(DeliveryFailed::SurfaceGone(target))
        }
    }

    async fn send(&self, target: SurfaceId, message: &PageMessage) -> bool {
        self.host
            .send(target, message)
            .await
            .is_some_and(|ack| ack.received)
    }

    async fn acknowledged(&self, target: SurfaceId, outcome: &TranslationOutcome) {
        info!(surface = %target, success = outcome.is_success(), "result delivered");
        if let TranslationOutcome::Success {
            original_text,
            explanation,
        } = outcome
        {
            if let Err(e) = self.history.upsert(original_text, explanation, Utc::now()).await {
                warn!(error = %e, "failed to record lookup in history");
            }
        }
    }
}
