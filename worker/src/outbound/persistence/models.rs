//! Internal Diesel row structs for mutations.
//!
//! These types borrow from domain commands and never leave the persistence
//! layer.

use diesel::prelude::*;

use crate::domain::{CreateUser, UserChanges};

use super::schema::users;

/// Insertable struct for new user rows.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub provider_id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub display_name: &'a str,
    pub avatar_url: &'a str,
}

impl<'a> From<&'a CreateUser> for NewUserRow<'a> {
    fn from(user: &'a CreateUser) -> Self {
        Self {
            provider_id: &user.user_id,
            username: &user.username,
            email: &user.email,
            display_name: &user.display_name,
            avatar_url: &user.avatar_url,
        }
    }
}

/// Changeset for partial user updates; `None` columns are left out of the
/// generated `SET` clause.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
pub(crate) struct UserChangeset<'a> {
    pub username: Option<&'a str>,
    pub email: Option<&'a str>,
    pub display_name: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
}

impl<'a> From<UserChanges<'a>> for UserChangeset<'a> {
    fn from(changes: UserChanges<'a>) -> Self {
        Self {
            username: changes.username,
            email: changes.email,
            display_name: changes.display_name,
            avatar_url: changes.avatar_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use diesel::debug_query;
    use diesel::pg::Pg;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn changeset_sets_only_present_columns() {
        let changes = UserChanges {
            email: Some("ada@example.com"),
            avatar_url: Some("https://cdn.example.com/ada.png"),
            ..UserChanges::default()
        };
        let query = diesel::update(users::table.filter(users::provider_id.eq("provider|7")))
            .set(UserChangeset::from(changes));

        let sql = debug_query::<Pg, _>(&query).to_string();

        assert!(
            sql.starts_with(r#"UPDATE "Users" SET "Email" = $1, "AvatarUrl" = $2"#),
            "{sql}"
        );
        assert!(sql.contains(r#""ProviderId" = $3"#), "{sql}");
        assert!(!sql.contains("Username"), "{sql}");
    }

    #[rstest]
    fn new_user_row_borrows_command_fields() {
        let user = CreateUser {
            user_id: "provider|7".to_owned(),
            username: "ada".to_owned(),
            email: "ada@example.com".to_owned(),
            display_name: "Ada".to_owned(),
            avatar_url: "https://cdn.example.com/ada.png".to_owned(),
            created_at: None,
        };
        let query = diesel::insert_into(users::table).values(NewUserRow::from(&user));

        let sql = debug_query::<Pg, _>(&query).to_string();

        assert!(
            sql.starts_with(
                r#"INSERT INTO "Users" ("ProviderId", "Username", "Email", "DisplayName", "AvatarUrl") VALUES ($1, $2, $3, $4, $5)"#
            ),
            "{sql}"
        );
    }
}
