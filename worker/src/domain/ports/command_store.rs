//! Driven port applying validated commands to the relational store.

use async_trait::async_trait;

use crate::domain::{CreateKwek, CreateUser, UpdateKwek, UpdateUser};

use super::define_port_error;

define_port_error! {
    /// Errors raised while applying a command to the store.
    pub enum CommandStoreError {
        /// Store connection was lost or could not be used.
        Connection { message: String } =>
            "command store connection failed: {message}",
        /// Statement failed during execution.
        Query { message: String } =>
            "command store query failed: {message}",
    }
}

/// Port for persisting kwek and user changes.
///
/// Methods take `&mut self`: a store owns one connection and applies one
/// statement at a time. Updates and deletes that match no row succeed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandStore: Send {
    /// Insert a kwek owned by the user whose external id is `kwek.user_id`.
    async fn create_kwek(&mut self, kwek: &CreateKwek) -> Result<(), CommandStoreError>;

    /// Replace the text of the kwek with `kwek.kwek_guid`.
    async fn update_kwek(&mut self, kwek: &UpdateKwek) -> Result<(), CommandStoreError>;

    /// Delete the kwek with `kwek_guid`.
    async fn delete_kwek(&mut self, kwek_guid: &str) -> Result<(), CommandStoreError>;

    /// Insert a user row.
    async fn create_user(&mut self, user: &CreateUser) -> Result<(), CommandStoreError>;

    /// Write the fields reported by [`UpdateUser::changes`].
    ///
    /// Callers only invoke this when at least one field is present.
    async fn update_user(&mut self, user: &UpdateUser) -> Result<(), CommandStoreError>;

    /// Delete the user with external id `user_id`.
    async fn delete_user(&mut self, user_id: &str) -> Result<(), CommandStoreError>;
}
