use crate::domain::payment::PaymentStatus;
use crate::domain::ports::BackendBox;
use crate::domain::sale::SaleId;
use crate::error::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Poll fallback cadence while waiting for a payment.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Waits for one sale's payment to reach `PAID`.
///
/// Two detectors race for the same state change: a push subscription keyed
/// by the sale id, and a fixed-interval status poll as fallback. Both share
/// one cancellation token and feed a capacity-1 channel, so the completion
/// fires at most once no matter which side (or both) observes it. Leaving
/// the waiting screen cancels both detectors together; a late notification
/// after teardown cannot produce a transition.
pub struct PaymentWatcher {
    token: CancellationToken,
    rx: mpsc::Receiver<PaymentStatus>,
    tasks: Vec<JoinHandle<()>>,
}

impl PaymentWatcher {
    /// Registers the subscription and starts both detector tasks.
    pub async fn spawn(backend: BackendBox, sale_id: SaleId) -> Result<Self> {
        Self::spawn_with_interval(backend, sale_id, POLL_INTERVAL).await
    }

    pub async fn spawn_with_interval(
        backend: BackendBox,
        sale_id: SaleId,
        poll_interval: Duration,
    ) -> Result<Self> {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);

        let mut feed = backend.subscribe_payment(&sale_id).await?;
        let sub_token = token.clone();
        let sub_tx = tx.clone();
        let sub_sale = sale_id.clone();
        let subscription = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sub_token.cancelled() => break,
                    status = feed.recv() => match status {
                        Some(status) if status.is_paid() => {
                            tracing::debug!(sale_id = %sub_sale, "payment confirmed via subscription");
                            let _ = sub_tx.try_send(status);
                            sub_token.cancel();
                            break;
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
        });

        let poll_token = token.clone();
        let poll = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately; the first real poll happens one
            // period in
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = poll_token.cancelled() => break,
                    _ = ticker.tick() => {
                        match backend.payment_status(&sale_id).await {
                            Ok(status) if status.is_paid() => {
                                tracing::debug!(sale_id = %sale_id, "payment confirmed via poll");
                                let _ = tx.try_send(status);
                                poll_token.cancel();
                                break;
                            }
                            Ok(_) => {}
                            // the poll is an unconditional retry; errors are
                            // logged and the next tick tries again
                            Err(err) => {
                                tracing::warn!(sale_id = %sale_id, error = %err, "payment status poll failed");
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            token,
            rx,
            tasks: vec![subscription, poll],
        })
    }

    /// Resolves with `Paid` once the payment is confirmed, or `None` when
    /// the watcher was shut down first. Resolves at most once.
    pub async fn wait(&mut self) -> Option<PaymentStatus> {
        self.rx.recv().await
    }

    /// Cancels both detectors. Idempotent; safe to call after the payment
    /// already resolved.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// True once both detectors have stopped.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|task| task.is_finished())
    }
}

impl Drop for PaymentWatcher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
