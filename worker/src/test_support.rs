//! Shared test doubles for pipeline tests.
//!
//! Compiled for unit tests and, behind the `test-support` feature, for the
//! integration tests under `tests/`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use futures_util::StreamExt;
use futures_util::stream;
use mockable::Clock;

use crate::domain::ports::{
    AckError, CommandStore, CommandStoreError, DeliveryAcker, DeliveryStream, InboundDelivery,
    Settlement,
};
use crate::domain::{CreateKwek, CreateUser, UpdateKwek, UpdateUser};

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("{what} mutex poisoned"),
    }
}

/// Clock whose time only moves when a test moves it.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Start the clock at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward; negative values move it back.
    pub fn advance_seconds(&self, seconds: i64) {
        *lock(&self.0, "clock") += TimeDelta::seconds(seconds);
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0, "clock")
    }
}

/// One call observed by [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `create_kwek` with its payload.
    CreateKwek(CreateKwek),
    /// `update_kwek` with its payload.
    UpdateKwek(UpdateKwek),
    /// `delete_kwek` with the GUID.
    DeleteKwek(String),
    /// `create_user` with its payload.
    CreateUser(CreateUser),
    /// `update_user` with its payload.
    UpdateUser(UpdateUser),
    /// `delete_user` with the provider id.
    DeleteUser(String),
}

/// In-memory [`CommandStore`] recording every call.
///
/// Clones share state, so a test can keep one handle while the pipeline owns
/// another. Errors queued with [`RecordingStore::fail_next`] are returned by
/// the following calls in order; failed calls are still recorded.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    calls: Arc<Mutex<Vec<StoreCall>>>,
    failures: Arc<Mutex<VecDeque<CommandStoreError>>>,
}

impl RecordingStore {
    /// An empty store that accepts every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call that has no earlier queued failure.
    pub fn fail_next(&self, error: CommandStoreError) {
        lock(&self.failures, "failures").push_back(error);
    }

    /// Calls seen so far, in the order they arrived.
    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls, "calls").clone()
    }

    fn record(&self, call: StoreCall) -> Result<(), CommandStoreError> {
        lock(&self.calls, "calls").push(call);
        match lock(&self.failures, "failures").pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CommandStore for RecordingStore {
    async fn create_kwek(&mut self, kwek: &CreateKwek) -> Result<(), CommandStoreError> {
        self.record(StoreCall::CreateKwek(kwek.clone()))
    }

    async fn update_kwek(&mut self, kwek: &UpdateKwek) -> Result<(), CommandStoreError> {
        self.record(StoreCall::UpdateKwek(kwek.clone()))
    }

    async fn delete_kwek(&mut self, kwek_guid: &str) -> Result<(), CommandStoreError> {
        self.record(StoreCall::DeleteKwek(kwek_guid.to_owned()))
    }

    async fn create_user(&mut self, user: &CreateUser) -> Result<(), CommandStoreError> {
        self.record(StoreCall::CreateUser(user.clone()))
    }

    async fn update_user(&mut self, user: &UpdateUser) -> Result<(), CommandStoreError> {
        self.record(StoreCall::UpdateUser(user.clone()))
    }

    async fn delete_user(&mut self, user_id: &str) -> Result<(), CommandStoreError> {
        self.record(StoreCall::DeleteUser(user_id.to_owned()))
    }
}

/// Shared log of settlements made through [`SettlementLog::delivery`].
#[derive(Debug, Clone, Default)]
pub struct SettlementLog {
    entries: Arc<Mutex<Vec<(u64, Settlement)>>>,
}

impl SettlementLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a delivery whose settlement is recorded here under `tag`.
    pub fn delivery(&self, tag: u64, body: impl Into<Vec<u8>>) -> InboundDelivery {
        InboundDelivery::new(
            tag,
            body.into(),
            Box::new(RecordingAcker {
                tag,
                log: self.clone(),
            }),
        )
    }

    /// Settlements in the order they happened.
    pub fn settlements(&self) -> Vec<(u64, Settlement)> {
        lock(&self.entries, "settlements").clone()
    }

    fn push(&self, tag: u64, settlement: Settlement) {
        lock(&self.entries, "settlements").push((tag, settlement));
    }
}

struct RecordingAcker {
    tag: u64,
    log: SettlementLog,
}

#[async_trait]
impl DeliveryAcker for RecordingAcker {
    async fn ack(&self) -> Result<(), AckError> {
        self.log.push(self.tag, Settlement::Ack);
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), AckError> {
        self.log.push(self.tag, Settlement::Reject { requeue });
        Ok(())
    }
}

/// A finite delivery stream that ends after `deliveries`.
pub fn delivery_stream(deliveries: Vec<InboundDelivery>) -> DeliveryStream {
    stream::iter(deliveries.into_iter().map(Ok)).boxed()
}
