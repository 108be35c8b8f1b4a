//! Per-queue loop: decode, validate, forward, settle.

use std::sync::Arc;

use futures_util::StreamExt;
use mockable::Clock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dispatcher::DispatchSender;
use super::handler::ApplyOutcome;
use crate::domain::ports::{CommandDecoder, DeliveryStream, InboundDelivery, Settlement};
use crate::domain::{QueueBinding, validate};

/// Counts of settled deliveries for one consumer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Deliveries acknowledged after their command was applied or skipped.
    pub acknowledged: usize,
    /// Deliveries dropped because the body did not decode.
    pub rejected_undecodable: usize,
    /// Deliveries dropped because the command broke a business rule.
    pub rejected_invalid: usize,
    /// Deliveries dropped because the store operation failed.
    pub rejected_failed: usize,
    /// Deliveries returned to the queue because the dispatcher had stopped.
    pub requeued: usize,
    /// Settlements the broker did not accept.
    pub settle_errors: usize,
}

impl ConsumerReport {
    /// Total deliveries handled.
    pub fn total(&self) -> usize {
        self.acknowledged
            + self.rejected_undecodable
            + self.rejected_invalid
            + self.rejected_failed
            + self.requeued
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Processed,
    Undecodable,
    Invalid,
    Failed,
    DispatcherGone,
}

impl Disposition {
    fn settlement(self) -> Settlement {
        match self {
            Self::Processed => Settlement::Ack,
            Self::Undecodable | Self::Invalid | Self::Failed => {
                Settlement::Reject { requeue: false }
            }
            Self::DispatcherGone => Settlement::Reject { requeue: true },
        }
    }

    fn record(self, report: &mut ConsumerReport) {
        let counter = match self {
            Self::Processed => &mut report.acknowledged,
            Self::Undecodable => &mut report.rejected_undecodable,
            Self::Invalid => &mut report.rejected_invalid,
            Self::Failed => &mut report.rejected_failed,
            Self::DispatcherGone => &mut report.requeued,
        };
        *counter += 1;
    }
}

/// Consumes one queue and forwards its valid commands to the dispatcher.
pub struct QueueConsumer {
    binding: QueueBinding,
    decoder: Arc<dyn CommandDecoder>,
    clock: Arc<dyn Clock + Send + Sync>,
    sender: DispatchSender,
}

impl QueueConsumer {
    /// Build a consumer for `binding`.
    pub fn new(
        binding: QueueBinding,
        decoder: Arc<dyn CommandDecoder>,
        clock: Arc<dyn Clock + Send + Sync>,
        sender: DispatchSender,
    ) -> Self {
        Self {
            binding,
            decoder,
            clock,
            sender,
        }
    }

    /// Process deliveries one at a time until `shutdown` fires or the stream
    /// ends.
    ///
    /// A delivery already being processed is always settled before the loop
    /// checks for shutdown again. Dropping the consumer on return releases its
    /// dispatch sender.
    pub async fn run(
        self,
        mut deliveries: DeliveryStream,
        shutdown: CancellationToken,
    ) -> ConsumerReport {
        let queue = self.binding.queue;
        let mut report = ConsumerReport::default();
        info!(queue, kind = %self.binding.kind, "consumer started");

        loop {
            let next = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    debug!(queue, "shutdown requested");
                    break;
                }
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(delivery)) => self.process(delivery, &mut report).await,
                Some(Err(err)) => {
                    error!(
                        queue,
                        error_kind = err.label(),
                        error = %err,
                        "delivery stream failed"
                    );
                    break;
                }
                None => {
                    warn!(queue, "delivery stream ended");
                    break;
                }
            }
        }

        info!(
            queue,
            acknowledged = report.acknowledged,
            rejected_undecodable = report.rejected_undecodable,
            rejected_invalid = report.rejected_invalid,
            rejected_failed = report.rejected_failed,
            requeued = report.requeued,
            settle_errors = report.settle_errors,
            "consumer stopped"
        );
        report
    }

    async fn process(&self, delivery: InboundDelivery, report: &mut ConsumerReport) {
        let delivery_tag = delivery.delivery_tag();
        let disposition = self.dispose(delivery.body()).await;
        disposition.record(report);

        if let Err(err) = delivery.settle(disposition.settlement()).await {
            report.settle_errors += 1;
            error!(
                queue = self.binding.queue,
                delivery_tag,
                error_kind = err.label(),
                error = %err,
                "failed to settle delivery"
            );
        }
    }

    async fn dispose(&self, body: &[u8]) -> Disposition {
        let queue = self.binding.queue;
        let command = match self.decoder.decode(self.binding.kind, body) {
            Ok(command) => command,
            Err(err) => {
                warn!(
                    queue,
                    error_kind = err.label(),
                    error = %err,
                    "discarding undecodable delivery"
                );
                return Disposition::Undecodable;
            }
        };

        let validation = validate(&command, self.clock.utc());
        if !validation.is_valid() {
            warn!(
                queue,
                kind = %command.kind(),
                errors = ?validation.messages(),
                "discarding invalid command"
            );
            return Disposition::Invalid;
        }

        match self.sender.submit(queue, command).await {
            Ok(ApplyOutcome::Applied | ApplyOutcome::Skipped) => Disposition::Processed,
            Ok(ApplyOutcome::Failed(_)) => Disposition::Failed,
            Err(err) => {
                warn!(queue, error = %err, "returning delivery to the queue");
                Disposition::DispatcherGone
            }
        }
    }
}
