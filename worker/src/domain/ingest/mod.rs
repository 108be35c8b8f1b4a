//! The ingest pipeline: per-queue consumers feeding one serial command loop.
//!
//! Each [`QueueConsumer`] decodes and validates its own deliveries and hands
//! valid commands to the [`Dispatcher`] through a bounded channel. The
//! dispatcher applies them one at a time through a [`CommandHandler`] and
//! reports each [`ApplyOutcome`] back so the consumer can settle the
//! delivery.

mod consumer;
mod dispatcher;
mod handler;

pub use consumer::{ConsumerReport, QueueConsumer};
pub use dispatcher::{
    DispatchClosed, DispatchEnvelope, DispatchReport, DispatchSender, Dispatcher,
    dispatch_channel,
};
pub use handler::{ApplyOutcome, CommandHandler};
