use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use evhop_core::payment::{PaymentGateway, PaymentOutcome};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Pause after a paid status before reporting success, so the confirmation screen lands
/// after the backend has finished its own bookkeeping.
pub const SUCCESS_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Delay before the `poll_number`-th status check (1-based).
///
/// Polls 1-3 wait 5s, 4-6 wait 10s, 7-9 wait 20s, then every 30s.
pub fn backoff_delay(poll_number: u32) -> Duration {
    let secs = match poll_number {
        0..=3 => 5,
        4..=6 => 10,
        7..=9 => 20,
        _ => 30,
    };
    Duration::from_secs(secs)
}

/// Watches one order's payment until it resolves, expires or is cancelled
pub struct PaymentPoller {
    gateway: Arc<dyn PaymentGateway>,
    success_delay: Duration,
}

impl PaymentPoller {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            gateway,
            success_delay: SUCCESS_SETTLE_DELAY,
        }
    }

    pub fn with_success_delay(mut self, delay: Duration) -> Self {
        self.success_delay = delay;
        self
    }

    /// Start polling and, when `expires_at` is known, the countdown.
    ///
    /// Both tasks share one cancellation token; whichever resolves first wins.
    pub fn spawn(&self, order_id: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> PollHandle {
        let order_id = order_id.into();
        let token = CancellationToken::new();
        let (outcome_tx, outcome_rx) = mpsc::channel(1);

        let deadline = expires_at.map(|at| {
            let left = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            Instant::now() + left
        });
        let (remaining_tx, remaining_rx) = watch::channel(deadline.map(seconds_until));

        tokio::spawn(poll_loop(
            self.gateway.clone(),
            order_id.clone(),
            self.success_delay,
            token.clone(),
            outcome_tx.clone(),
        ));

        if let Some(deadline) = deadline {
            tokio::spawn(countdown(order_id, deadline, token.clone(), outcome_tx, remaining_tx));
        }

        PollHandle {
            token,
            outcome_rx,
            remaining: remaining_rx,
        }
    }
}

fn seconds_until(deadline: Instant) -> u64 {
    deadline.saturating_duration_since(Instant::now()).as_secs()
}

fn resolve(token: &CancellationToken, tx: &mpsc::Sender<PaymentOutcome>, outcome: PaymentOutcome) {
    // First outcome wins; a full channel means the other task already resolved
    let _ = tx.try_send(outcome);
    token.cancel();
}

async fn poll_loop(
    gateway: Arc<dyn PaymentGateway>,
    order_id: String,
    success_delay: Duration,
    token: CancellationToken,
    tx: mpsc::Sender<PaymentOutcome>,
) {
    let mut poll_number: u32 = 0;

    loop {
        poll_number = poll_number.saturating_add(1);

        tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!(order_id = %order_id, "Payment polling stopped");
                return;
            }
            _ = tokio::time::sleep(backoff_delay(poll_number)) => {}
        }

        match gateway.payment_detail(&order_id).await {
            Ok(detail) => match detail.status.outcome() {
                Some(PaymentOutcome::Success) => {
                    tracing::info!(order_id = %order_id, poll = poll_number, "Payment confirmed");
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(success_delay) => {}
                    }
                    resolve(&token, &tx, PaymentOutcome::Success);
                    return;
                }
                Some(outcome) => {
                    tracing::info!(order_id = %order_id, ?outcome, "Payment resolved");
                    resolve(&token, &tx, outcome);
                    return;
                }
                None => {
                    tracing::debug!(order_id = %order_id, poll = poll_number, "Payment still pending");
                }
            },
            Err(e) => {
                // Counts as a tick; the schedule keeps advancing
                tracing::warn!(order_id = %order_id, poll = poll_number, "Payment status check failed: {}", e);
            }
        }
    }
}

async fn countdown(
    order_id: String,
    deadline: Instant,
    token: CancellationToken,
    tx: mpsc::Sender<PaymentOutcome>,
    remaining: watch::Sender<Option<u64>>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep_until(deadline) => {
                let _ = remaining.send(Some(0));
                tracing::info!(order_id = %order_id, "Payment window expired");
                resolve(&token, &tx, PaymentOutcome::Expired);
                return;
            }
            _ = ticker.tick() => {
                let _ = remaining.send(Some(seconds_until(deadline)));
            }
        }
    }
}

/// Owner's side of a running poll. Dropping it stops both tasks.
pub struct PollHandle {
    token: CancellationToken,
    outcome_rx: mpsc::Receiver<PaymentOutcome>,
    remaining: watch::Receiver<Option<u64>>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the terminal outcome. `None` once cancelled without one.
    pub async fn outcome(&mut self) -> Option<PaymentOutcome> {
        self.outcome_rx.recv().await
    }

    /// The outcome if it has already arrived
    pub fn try_outcome(&mut self) -> Option<PaymentOutcome> {
        self.outcome_rx.try_recv().ok()
    }

    /// Seconds left in the payment window, if it has one
    pub fn remaining_seconds(&self) -> Option<u64> {
        *self.remaining.borrow()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
