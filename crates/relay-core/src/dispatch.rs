//! Fan-out of one payload over a recipient snapshot.

use std::{collections::HashSet, time::Duration};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    domain::Recipient,
    messaging::{
        port::Transport,
        types::{Outcome, Payload},
    },
};

pub const DEFAULT_SEND_PACING: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug)]
pub struct DispatchConfig {
    /// Delay after each successful send, before the next recipient.
    pub pacing: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_SEND_PACING,
        }
    }
}

/// Aggregate of one pass over a snapshot.
///
/// `delivered + failed.len() + purge.len() == total` always holds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub total: usize,
    pub delivered: usize,
    /// Transient failures, in snapshot order. These recipients are kept.
    pub failed: Vec<Recipient>,
    /// Permanently unreachable recipients, in snapshot order.
    pub purge: Vec<Recipient>,
    /// Rate-limit retries performed (at most one per recipient).
    pub retries: usize,
}

impl DispatchResult {
    pub fn purge_set(&self) -> HashSet<Recipient> {
        self.purge.iter().copied().collect()
    }

    fn record(&mut self, recipient: Recipient, outcome: &Outcome) {
        match outcome {
            Outcome::Delivered => self.delivered += 1,
            Outcome::PermanentlyUnreachable { .. } => self.purge.push(recipient),
            Outcome::TransientFailure { .. } | Outcome::RateLimited(_) => {
                self.failed.push(recipient)
            }
        }
    }
}

pub struct DispatchLoop<'a> {
    transport: &'a dyn Transport,
    cfg: DispatchConfig,
}

impl<'a> DispatchLoop<'a> {
    pub fn new(transport: &'a dyn Transport, cfg: DispatchConfig) -> Self {
        Self { transport, cfg }
    }

    /// Sends `payload` to every recipient of `snapshot`, in order.
    ///
    /// Per-recipient failures never abort the pass. A rate-limit signal
    /// suspends only the current recipient and earns exactly one retry.
    pub async fn dispatch(&self, payload: &Payload, snapshot: &[Recipient]) -> DispatchResult {
        let mut result = DispatchResult {
            total: snapshot.len(),
            ..DispatchResult::default()
        };

        for (idx, &recipient) in snapshot.iter().enumerate() {
            let outcome = self.send_with_retry(recipient, payload, &mut result).await;
            log_outcome(recipient, &outcome);
            result.record(recipient, &outcome);

            let is_last = idx + 1 == snapshot.len();
            if outcome.is_delivered() && !is_last && !self.cfg.pacing.is_zero() {
                sleep(self.cfg.pacing).await;
            }
        }

        info!(
            kind = %payload.kind(),
            total = result.total,
            delivered = result.delivered,
            failed = result.failed.len(),
            purge = result.purge.len(),
            retries = result.retries,
            "dispatch finished"
        );
        result
    }

    async fn send_with_retry(
        &self,
        recipient: Recipient,
        payload: &Payload,
        result: &mut DispatchResult,
    ) -> Outcome {
        let retry_after = match self.transport.send(recipient, payload).await {
            Outcome::RateLimited(d) => d,
            other => return other,
        };

        debug!(%recipient, retry_after_ms = retry_after.as_millis() as u64, "rate limited, retrying once");
        sleep(retry_after).await;
        result.retries += 1;

        match self.transport.send(recipient, payload).await {
            // A second back-off signal is not evidence that the recipient is gone.
            Outcome::RateLimited(again) => Outcome::transient(format!(
                "still rate limited after retry (retry after {}s)",
                again.as_secs()
            )),
            other => other,
        }
    }
}

fn log_outcome(recipient: Recipient, outcome: &Outcome) {
    match outcome {
        Outcome::Delivered => debug!(%recipient, "delivered"),
        Outcome::PermanentlyUnreachable { reason } => {
            warn!(%recipient, "recipient unreachable, scheduling purge: {reason}")
        }
        Outcome::TransientFailure { reason } => warn!(%recipient, "send failed: {reason}"),
        Outcome::RateLimited(d) => warn!(%recipient, "rate limited ({}s)", d.as_secs()),
    }
}
