//! Maps each command to exactly one store operation.

use tracing::{debug, error};

use crate::domain::Command;
use crate::domain::ports::{CommandStore, CommandStoreError};

/// Result of applying one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The store operation ran.
    Applied,
    /// Nothing to write; the command was a no-op.
    Skipped,
    /// The store operation failed.
    Failed(CommandStoreError),
}

impl ApplyOutcome {
    /// True for [`ApplyOutcome::Applied`] and [`ApplyOutcome::Skipped`].
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Owns the store and applies commands to it serially.
pub struct CommandHandler {
    store: Box<dyn CommandStore>,
}

impl CommandHandler {
    /// Wrap a store.
    pub fn new(store: Box<dyn CommandStore>) -> Self {
        Self { store }
    }

    /// Apply `command`, logging the outcome.
    pub async fn apply(&mut self, command: &Command) -> ApplyOutcome {
        let kind = command.kind();
        let result = match command {
            Command::CreateKwek(kwek) => self.store.create_kwek(kwek).await,
            Command::UpdateKwek(kwek) => self.store.update_kwek(kwek).await,
            Command::DeleteKwek(kwek) => self.store.delete_kwek(&kwek.kwek_guid).await,
            Command::CreateUser(user) => self.store.create_user(user).await,
            Command::UpdateUser(user) => {
                if user.changes().is_empty() {
                    debug!(kind = %kind, user_id = %user.user_id, "no user fields to update");
                    return ApplyOutcome::Skipped;
                }
                self.store.update_user(user).await
            }
            Command::DeleteUser(user) => self.store.delete_user(&user.user_id).await,
        };

        match result {
            Ok(()) => {
                debug!(kind = %kind, "command applied");
                ApplyOutcome::Applied
            }
            Err(err) => {
                error!(
                    kind = %kind,
                    error_kind = err.label(),
                    error = %err,
                    "failed to apply command"
                );
                ApplyOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;
    use rstest::rstest;

    use super::*;
    use crate::domain::ports::MockCommandStore;
    use crate::domain::{CreateKwek, DeleteKwek, DeleteUser, UpdateUser};

    fn kwek() -> CreateKwek {
        CreateKwek {
            kwek_guid: "f9d30d37-63a8-44a9-b2c3-3a45eb0701bc".to_owned(),
            user_id: "provider|7".to_owned(),
            text: "hello".to_owned(),
            posted_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single(),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn create_kwek_inserts_once() {
        let mut store = MockCommandStore::new();
        store
            .expect_create_kwek()
            .with(eq(kwek()))
            .times(1)
            .returning(|_| Ok(()));
        let mut handler = CommandHandler::new(Box::new(store));

        let outcome = handler.apply(&Command::CreateKwek(kwek())).await;

        assert_eq!(outcome, ApplyOutcome::Applied);
    }

    #[rstest]
    #[tokio::test]
    async fn deletes_pass_external_identifiers() {
        let mut store = MockCommandStore::new();
        store
            .expect_delete_kwek()
            .withf(|guid| guid == "f9d30d37-63a8-44a9-b2c3-3a45eb0701bc")
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_delete_user()
            .withf(|user_id| user_id == "provider|7")
            .times(1)
            .returning(|_| Ok(()));
        let mut handler = CommandHandler::new(Box::new(store));

        let first = handler
            .apply(&Command::DeleteKwek(DeleteKwek {
                kwek_guid: "f9d30d37-63a8-44a9-b2c3-3a45eb0701bc".to_owned(),
            }))
            .await;
        let second = handler
            .apply(&Command::DeleteUser(DeleteUser {
                user_id: "provider|7".to_owned(),
            }))
            .await;

        assert_eq!((first, second), (ApplyOutcome::Applied, ApplyOutcome::Applied));
    }

    #[rstest]
    #[tokio::test]
    async fn update_user_without_fields_skips_store() {
        let mut store = MockCommandStore::new();
        store.expect_update_user().never();
        let mut handler = CommandHandler::new(Box::new(store));

        let outcome = handler
            .apply(&Command::UpdateUser(UpdateUser {
                user_id: "provider|7".to_owned(),
                email: Some(String::new()),
                updated_at: Some(Utc::now()),
                ..UpdateUser::default()
            }))
            .await;

        assert_eq!(outcome, ApplyOutcome::Skipped);
        assert!(outcome.is_success());
    }

    #[rstest]
    #[tokio::test]
    async fn update_user_with_fields_reaches_store() {
        let mut store = MockCommandStore::new();
        store
            .expect_update_user()
            .withf(|user| user.changes().display_name == Some("Ada"))
            .times(1)
            .returning(|_| Ok(()));
        let mut handler = CommandHandler::new(Box::new(store));

        let outcome = handler
            .apply(&Command::UpdateUser(UpdateUser {
                user_id: "provider|7".to_owned(),
                display_name: Some("Ada".to_owned()),
                updated_at: Some(Utc::now()),
                ..UpdateUser::default()
            }))
            .await;

        assert_eq!(outcome, ApplyOutcome::Applied);
    }

    #[rstest]
    #[tokio::test]
    async fn store_errors_become_failed_outcomes() {
        let mut store = MockCommandStore::new();
        store
            .expect_create_kwek()
            .returning(|_| Err(CommandStoreError::query("duplicate key")));
        let mut handler = CommandHandler::new(Box::new(store));

        let outcome = handler.apply(&Command::CreateKwek(kwek())).await;

        assert_eq!(
            outcome,
            ApplyOutcome::Failed(CommandStoreError::query("duplicate key"))
        );
        assert!(!outcome.is_success());
    }
}
