//! Diesel table definitions for the tables the worker writes.
//!
//! Table and column names are PascalCase in the database and quoted in every
//! statement, so each one carries an explicit `sql_name`.

diesel::table! {
    /// Registered users, keyed externally by the identity provider's id.
    #[sql_name = "Users"]
    users (id) {
        /// Surrogate primary key.
        #[sql_name = "Id"]
        id -> Int4,
        /// Identity-provider user id; the worker's only handle on a user.
        #[sql_name = "ProviderId"]
        provider_id -> Text,
        #[sql_name = "Username"]
        username -> Text,
        #[sql_name = "Email"]
        email -> Text,
        #[sql_name = "DisplayName"]
        display_name -> Text,
        #[sql_name = "AvatarUrl"]
        avatar_url -> Text,
    }
}

diesel::table! {
    /// Short posts, keyed externally by GUID.
    #[sql_name = "Kweks"]
    kweks (id) {
        /// Surrogate primary key.
        #[sql_name = "Id"]
        id -> Int4,
        /// External 36-character identifier.
        #[sql_name = "Guid"]
        guid -> Text,
        /// Owning user's surrogate key.
        #[sql_name = "UserId"]
        user_id -> Int4,
        #[sql_name = "Text"]
        text -> Text,
        #[sql_name = "PostedAt"]
        posted_at -> Timestamptz,
    }
}

diesel::joinable!(kweks -> users (user_id));
diesel::allow_tables_to_appear_in_same_query!(kweks, users);
