//! Bounded fan-in from queue consumers to the single command loop.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::handler::{ApplyOutcome, CommandHandler};
use crate::domain::Command;

/// One command forwarded by a consumer, with the channel for its outcome.
#[derive(Debug)]
pub struct DispatchEnvelope {
    /// Queue the command arrived on.
    pub queue: &'static str,
    /// Validated command.
    pub command: Command,
    /// Receives the outcome once the command has been applied.
    pub reply: oneshot::Sender<ApplyOutcome>,
}

/// The dispatcher stopped before the command could be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("command dispatcher is no longer running")]
pub struct DispatchClosed;

/// Producer handle shared by consumers.
#[derive(Debug, Clone)]
pub struct DispatchSender {
    inner: mpsc::Sender<DispatchEnvelope>,
}

impl DispatchSender {
    /// Queue `command`, waiting while the channel is full.
    ///
    /// Returns the receiver for the command's outcome.
    pub async fn enqueue(
        &self,
        queue: &'static str,
        command: Command,
    ) -> Result<oneshot::Receiver<ApplyOutcome>, DispatchClosed> {
        let (reply, outcome) = oneshot::channel();
        self.inner
            .send(DispatchEnvelope {
                queue,
                command,
                reply,
            })
            .await
            .map_err(|_| DispatchClosed)?;
        Ok(outcome)
    }

    /// Queue `command` and wait until it has been applied.
    pub async fn submit(
        &self,
        queue: &'static str,
        command: Command,
    ) -> Result<ApplyOutcome, DispatchClosed> {
        let outcome = self.enqueue(queue, command).await?;
        outcome.await.map_err(|_| DispatchClosed)
    }
}

/// Create the dispatch channel. A zero capacity is raised to one.
pub fn dispatch_channel(capacity: usize) -> (DispatchSender, mpsc::Receiver<DispatchEnvelope>) {
    let (inner, receiver) = mpsc::channel(capacity.max(1));
    (DispatchSender { inner }, receiver)
}

/// Counts of outcomes produced by one dispatcher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Commands written to the store.
    pub applied: usize,
    /// No-op commands.
    pub skipped: usize,
    /// Commands whose store operation failed.
    pub failed: usize,
}

impl DispatchReport {
    fn record(&mut self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied => self.applied += 1,
            ApplyOutcome::Skipped => self.skipped += 1,
            ApplyOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Serial consumer of the dispatch channel.
pub struct Dispatcher {
    receiver: mpsc::Receiver<DispatchEnvelope>,
    handler: CommandHandler,
}

impl Dispatcher {
    /// Pair the channel's receiving end with the handler that applies
    /// commands.
    pub fn new(receiver: mpsc::Receiver<DispatchEnvelope>, handler: CommandHandler) -> Self {
        Self { receiver, handler }
    }

    /// Apply commands in arrival order until every sender has been dropped.
    pub async fn run(mut self) -> DispatchReport {
        let mut report = DispatchReport::default();
        while let Some(envelope) = self.receiver.recv().await {
            let DispatchEnvelope {
                queue,
                command,
                reply,
            } = envelope;
            let outcome = self.handler.apply(&command).await;
            report.record(&outcome);
            if reply.send(outcome).is_err() {
                debug!(queue, "consumer went away before the outcome was delivered");
            }
        }
        info!(
            applied = report.applied,
            skipped = report.skipped,
            failed = report.failed,
            "dispatcher drained"
        );
        report
    }
}
