//! Worker assembly: connect, declare, consume, drain, close.

use std::sync::Arc;

use lapin::Channel;
use mockable::{Clock, DefaultClock};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::ingest::{
    CommandHandler, ConsumerReport, DispatchReport, Dispatcher, QueueConsumer, dispatch_channel,
};
use crate::domain::ports::CommandDecoder;
use crate::domain::{ROUTING_TABLE, RetryPolicy, RetrySleeper, TokioSleeper, TopologyPlan};
use crate::inbound::amqp::{
    BrokerConfig, BrokerConnection, BrokerError, ProtobufDecoder, declare_topology,
    limit_prefetch, subscribe,
};
use crate::outbound::persistence::{
    DieselCommandStore, StoreConfig, StoreConnectError, connect_store,
};

/// Everything the worker needs to run, validated up front.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// RabbitMQ connection.
    pub broker: BrokerConfig,
    /// PostgreSQL connection.
    pub store: StoreConfig,
    /// Retry schedule for both connections.
    pub retry: RetryPolicy,
    /// Commands buffered between consumers and the dispatcher.
    pub dispatch_capacity: usize,
    /// Unacknowledged deliveries the broker may push to each consumer.
    pub prefetch_count: u16,
}

/// Failures that end a worker run.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Broker connection, declaration, or subscription failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),
    /// Store connection failed.
    #[error(transparent)]
    Store(#[from] StoreConnectError),
    /// A consumer stopped without a shutdown request.
    #[error("consumer for {queue} stopped unexpectedly")]
    ConsumerStopped { queue: &'static str },
    /// A pipeline task panicked or was aborted.
    #[error("{task} task failed: {message}")]
    Task { task: String, message: String },
}

/// Per-queue and dispatcher counts from a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Consumer reports keyed by queue name.
    pub consumers: Vec<(&'static str, ConsumerReport)>,
    /// Dispatcher outcome counts.
    pub dispatch: DispatchReport,
}

/// Run the worker until `shutdown` is cancelled or a consumer stops.
///
/// Startup is ordered: broker connection, channel, topology, prefetch
/// limit, store connection, then one consumer per routing-table queue. On
/// return the channel and connection have been closed, whatever the outcome.
pub async fn run_worker(
    config: WorkerConfig,
    shutdown: CancellationToken,
) -> Result<WorkerSummary, WorkerError> {
    let sleeper = TokioSleeper;
    let connection = BrokerConnection::connect(&config.broker, &config.retry, &sleeper).await?;
    let channel = match connection.open_channel().await {
        Ok(channel) => channel,
        Err(err) => {
            connection.close(None).await;
            return Err(err.into());
        }
    };

    let result = run_pipeline(&config, &channel, &sleeper, shutdown).await;
    connection.close(Some(channel)).await;
    result
}

async fn run_pipeline(
    config: &WorkerConfig,
    channel: &Channel,
    sleeper: &dyn RetrySleeper,
    shutdown: CancellationToken,
) -> Result<WorkerSummary, WorkerError> {
    let plan = TopologyPlan::from_bindings(&ROUTING_TABLE);
    declare_topology(channel, &plan).await?;
    limit_prefetch(channel, config.prefetch_count).await?;

    let conn = connect_store(&config.store, &config.retry, sleeper).await?;
    let handler = CommandHandler::new(Box::new(DieselCommandStore::new(conn)));
    let (sender, receiver) = dispatch_channel(config.dispatch_capacity);
    let dispatcher = tokio::spawn(Dispatcher::new(receiver, handler).run());

    let decoder: Arc<dyn CommandDecoder> = Arc::new(ProtobufDecoder);
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(DefaultClock);
    let stop = shutdown.child_token();
    let mut consumers = JoinSet::new();
    let mut startup_error = None;

    for binding in plan.queues() {
        let stream = match subscribe(channel, binding).await {
            Ok(stream) => stream,
            Err(err) => {
                startup_error = Some(WorkerError::from(err));
                stop.cancel();
                break;
            }
        };
        let consumer = QueueConsumer::new(*binding, decoder.clone(), clock.clone(), sender.clone());
        let token = stop.clone();
        let queue = binding.queue;
        consumers.spawn(async move { (queue, consumer.run(stream, token).await) });
    }
    drop(sender);

    if startup_error.is_none() {
        info!(queues = consumers.len(), "worker running");
    }

    let mut summary = WorkerSummary::default();
    let mut failure = startup_error;
    while let Some(joined) = consumers.join_next().await {
        match joined {
            Ok((queue, report)) => {
                summary.consumers.push((queue, report));
                if !stop.is_cancelled() {
                    warn!(queue, "consumer stopped unexpectedly; stopping worker");
                    stop.cancel();
                    failure.get_or_insert(WorkerError::ConsumerStopped { queue });
                }
            }
            Err(err) => {
                error!(error = %err, "consumer task failed; stopping worker");
                stop.cancel();
                failure.get_or_insert(WorkerError::Task {
                    task: "consumer".to_owned(),
                    message: err.to_string(),
                });
            }
        }
    }

    summary.dispatch = dispatcher.await.map_err(|err| WorkerError::Task {
        task: "dispatcher".to_owned(),
        message: err.to_string(),
    })?;
    summary.consumers.sort_by_key(|(queue, _)| *queue);

    match failure {
        Some(err) => Err(err),
        None => {
            info!(
                applied = summary.dispatch.applied,
                skipped = summary.dispatch.skipped,
                failed = summary.dispatch.failed,
                "worker drained"
            );
            Ok(summary)
        }
    }
}
