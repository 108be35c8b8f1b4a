//! PostgreSQL-backed `CommandStore` implementation using Diesel.
//!
//! Every value reaches the database as a bound parameter. Updates and deletes
//! that match no row succeed without effect.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::{Text, Timestamptz};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{CommandStore, CommandStoreError};
use crate::domain::{CreateKwek, CreateUser, UpdateKwek, UpdateUser};

use super::models::{NewUserRow, UserChangeset};
use super::schema::{kweks, users};

/// Resolves the owner by provider id inside the insert so a kwek is written
/// in one round trip.
const INSERT_KWEK_SQL: &str = r#"INSERT INTO "Kweks" ("Guid", "UserId", "Text", "PostedAt")
VALUES ($1, (SELECT "Id" FROM "Users" WHERE "ProviderId" = $2), $3, $4)"#;

/// Diesel-backed implementation of the `CommandStore` port.
pub struct DieselCommandStore {
    conn: AsyncPgConnection,
}

impl DieselCommandStore {
    /// Wrap an established connection.
    pub fn new(conn: AsyncPgConnection) -> Self {
        Self { conn }
    }
}

/// Map Diesel errors to domain command store errors.
fn map_diesel_error(error: diesel::result::Error) -> CommandStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(error = %error, "diesel operation failed"),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            CommandStoreError::connection(info.message())
        }
        DieselError::DatabaseError(kind, info) => {
            CommandStoreError::query(format!("{kind:?}: {}", info.message()))
        }
        DieselError::NotFound => CommandStoreError::query("record not found"),
        other => CommandStoreError::query(other.to_string()),
    }
}

fn log_affected(operation: &'static str, rows: usize) {
    if rows == 0 {
        debug!(operation, "statement matched no rows");
    } else {
        debug!(operation, rows, "statement applied");
    }
}

#[async_trait]
impl CommandStore for DieselCommandStore {
    async fn create_kwek(&mut self, kwek: &CreateKwek) -> Result<(), CommandStoreError> {
        let posted_at = kwek
            .posted_at
            .ok_or_else(|| CommandStoreError::query("kwek is missing its post time"))?;
        let rows = diesel::sql_query(INSERT_KWEK_SQL)
            .bind::<Text, _>(kwek.kwek_guid.as_str())
            .bind::<Text, _>(kwek.user_id.as_str())
            .bind::<Text, _>(kwek.text.as_str())
            .bind::<Timestamptz, _>(posted_at)
            .execute(&mut self.conn)
            .await
            .map_err(map_diesel_error)?;
        log_affected("create_kwek", rows);
        Ok(())
    }

    async fn update_kwek(&mut self, kwek: &UpdateKwek) -> Result<(), CommandStoreError> {
        let rows = diesel::update(kweks::table.filter(kweks::guid.eq(&kwek.kwek_guid)))
            .set(kweks::text.eq(&kwek.text))
            .execute(&mut self.conn)
            .await
            .map_err(map_diesel_error)?;
        log_affected("update_kwek", rows);
        Ok(())
    }

    async fn delete_kwek(&mut self, kwek_guid: &str) -> Result<(), CommandStoreError> {
        let rows = diesel::delete(kweks::table.filter(kweks::guid.eq(kwek_guid)))
            .execute(&mut self.conn)
            .await
            .map_err(map_diesel_error)?;
        log_affected("delete_kwek", rows);
        Ok(())
    }

    async fn create_user(&mut self, user: &CreateUser) -> Result<(), CommandStoreError> {
        let rows = diesel::insert_into(users::table)
            .values(NewUserRow::from(user))
            .execute(&mut self.conn)
            .await
            .map_err(map_diesel_error)?;
        log_affected("create_user", rows);
        Ok(())
    }

    async fn update_user(&mut self, user: &UpdateUser) -> Result<(), CommandStoreError> {
        let changes = user.changes();
        if changes.is_empty() {
            return Ok(());
        }
        let rows = diesel::update(users::table.filter(users::provider_id.eq(&user.user_id)))
            .set(UserChangeset::from(changes))
            .execute(&mut self.conn)
            .await
            .map_err(map_diesel_error)?;
        log_affected("update_user", rows);
        Ok(())
    }

    async fn delete_user(&mut self, user_id: &str) -> Result<(), CommandStoreError> {
        let rows = diesel::delete(users::table.filter(users::provider_id.eq(user_id)))
            .execute(&mut self.conn)
            .await
            .map_err(map_diesel_error)?;
        log_affected("delete_user", rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use diesel::debug_query;
    use diesel::pg::Pg;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn kwek_insert_resolves_owner_by_provider_id() {
        assert!(INSERT_KWEK_SQL.contains(r#"(SELECT "Id" FROM "Users" WHERE "ProviderId" = $2)"#));
        assert_eq!(INSERT_KWEK_SQL.matches('$').count(), 4);
    }

    #[rstest]
    fn kwek_update_targets_guid() {
        let query = diesel::update(kweks::table.filter(kweks::guid.eq("g")))
            .set(kweks::text.eq("replacement"));

        let sql = debug_query::<Pg, _>(&query).to_string();

        assert!(sql.starts_with(r#"UPDATE "Kweks" SET "Text" = $1"#), "{sql}");
        assert!(sql.contains(r#""Guid" = $2"#), "{sql}");
    }

    #[rstest]
    fn closed_connection_maps_to_connection_error() {
        let error = diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::ClosedConnection,
            Box::new("server closed the connection".to_owned()),
        );

        assert_eq!(
            map_diesel_error(error),
            CommandStoreError::connection("server closed the connection")
        );
    }

    #[rstest]
    fn constraint_violations_map_to_query_errors() {
        let error = diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::NotNullViolation,
            Box::new("null value in column \"UserId\"".to_owned()),
        );

        match map_diesel_error(error) {
            CommandStoreError::Query { message } => {
                assert!(message.starts_with("NotNullViolation"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    fn other_diesel_errors_keep_their_description() {
        let expected = diesel::result::Error::AlreadyInTransaction.to_string();

        assert_eq!(
            map_diesel_error(diesel::result::Error::AlreadyInTransaction),
            CommandStoreError::query(expected)
        );
    }
}
