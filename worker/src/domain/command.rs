//! Command model for kwek and user changes.
//!
//! A [`Command`] is the typed form of one decoded delivery. Identifiers are
//! opaque external values (kwek GUIDs, identity-provider user ids); the store
//! resolves them to its own keys. Timestamps are optional because the wire
//! schema allows them to be absent; validation rejects commands missing them.

use std::fmt;

use chrono::{DateTime, Utc};

/// Create a new kwek owned by an existing user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateKwek {
    /// External kwek identifier (36-character GUID).
    pub kwek_guid: String,
    /// External identifier of the owning user.
    pub user_id: String,
    /// Kwek body.
    pub text: String,
    /// Time the kwek was posted.
    pub posted_at: Option<DateTime<Utc>>,
}

/// Replace the text of an existing kwek.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateKwek {
    /// External kwek identifier (36-character GUID).
    pub kwek_guid: String,
    /// Replacement kwek body.
    pub text: String,
    /// Time the edit was made.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Remove a kwek.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteKwek {
    /// External kwek identifier (36-character GUID).
    pub kwek_guid: String,
}

/// Register a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUser {
    /// Identity-provider user identifier.
    pub user_id: String,
    /// Unique handle.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Human readable name.
    pub display_name: String,
    /// `https://` URL of the avatar image.
    pub avatar_url: String,
    /// Time the account was created.
    pub created_at: Option<DateTime<Utc>>,
}

/// Change some profile fields of a user.
///
/// Absent fields (and fields carrying an empty string) are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateUser {
    /// Identity-provider user identifier.
    pub user_id: String,
    /// Replacement handle.
    pub username: Option<String>,
    /// Replacement contact address.
    pub email: Option<String>,
    /// Replacement human readable name.
    pub display_name: Option<String>,
    /// Replacement avatar URL.
    pub avatar_url: Option<String>,
    /// Time the edit was made.
    pub updated_at: Option<DateTime<Utc>>,
}

impl UpdateUser {
    /// Return the profile fields this update actually carries.
    ///
    /// # Examples
    /// ```
    /// use kwekker_worker::domain::UpdateUser;
    ///
    /// let update = UpdateUser {
    ///     user_id: "provider|42".to_owned(),
    ///     username: Some(String::new()),
    ///     email: Some("ada@example.com".to_owned()),
    ///     ..UpdateUser::default()
    /// };
    /// let changes = update.changes();
    /// assert_eq!(changes.username, None);
    /// assert_eq!(changes.email, Some("ada@example.com"));
    /// ```
    pub fn changes(&self) -> UserChanges<'_> {
        UserChanges {
            username: present(self.username.as_deref()),
            email: present(self.email.as_deref()),
            display_name: present(self.display_name.as_deref()),
            avatar_url: present(self.avatar_url.as_deref()),
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|inner| !inner.is_empty())
}

/// Profile fields present on an [`UpdateUser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserChanges<'a> {
    /// Replacement handle.
    pub username: Option<&'a str>,
    /// Replacement contact address.
    pub email: Option<&'a str>,
    /// Replacement human readable name.
    pub display_name: Option<&'a str>,
    /// Replacement avatar URL.
    pub avatar_url: Option<&'a str>,
}

impl UserChanges<'_> {
    /// True when no field would be written.
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.display_name.is_none()
            && self.avatar_url.is_none()
    }
}

/// Remove a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteUser {
    /// Identity-provider user identifier.
    pub user_id: String,
}

/// One decoded change command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// See [`CreateKwek`].
    CreateKwek(CreateKwek),
    /// See [`UpdateKwek`].
    UpdateKwek(UpdateKwek),
    /// See [`DeleteKwek`].
    DeleteKwek(DeleteKwek),
    /// See [`CreateUser`].
    CreateUser(CreateUser),
    /// See [`UpdateUser`].
    UpdateUser(UpdateUser),
    /// See [`DeleteUser`].
    DeleteUser(DeleteUser),
}

impl Command {
    /// The kind tag of this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::CreateKwek(_) => CommandKind::CreateKwek,
            Self::UpdateKwek(_) => CommandKind::UpdateKwek,
            Self::DeleteKwek(_) => CommandKind::DeleteKwek,
            Self::CreateUser(_) => CommandKind::CreateUser,
            Self::UpdateUser(_) => CommandKind::UpdateUser,
            Self::DeleteUser(_) => CommandKind::DeleteUser,
        }
    }
}

/// Fieldless tag naming a [`Command`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandKind {
    /// Tag for [`Command::CreateKwek`].
    CreateKwek,
    /// Tag for [`Command::UpdateKwek`].
    UpdateKwek,
    /// Tag for [`Command::DeleteKwek`].
    DeleteKwek,
    /// Tag for [`Command::CreateUser`].
    CreateUser,
    /// Tag for [`Command::UpdateUser`].
    UpdateUser,
    /// Tag for [`Command::DeleteUser`].
    DeleteUser,
}

impl CommandKind {
    /// Stable name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateKwek => "CreateKwek",
            Self::UpdateKwek => "UpdateKwek",
            Self::DeleteKwek => "DeleteKwek",
            Self::CreateUser => "CreateUser",
            Self::UpdateUser => "UpdateUser",
            Self::DeleteUser => "DeleteUser",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn update_without_fields_has_no_changes() {
        let update = UpdateUser {
            user_id: "provider|1".to_owned(),
            ..UpdateUser::default()
        };

        assert!(update.changes().is_empty());
    }

    #[rstest]
    fn empty_strings_count_as_absent() {
        let update = UpdateUser {
            user_id: "provider|1".to_owned(),
            username: Some(String::new()),
            display_name: Some(String::new()),
            ..UpdateUser::default()
        };

        assert!(update.changes().is_empty());
    }

    #[rstest]
    #[case(Command::DeleteKwek(DeleteKwek { kwek_guid: "g".to_owned() }), CommandKind::DeleteKwek)]
    #[case(Command::DeleteUser(DeleteUser { user_id: "u".to_owned() }), CommandKind::DeleteUser)]
    #[case(Command::UpdateUser(UpdateUser::default()), CommandKind::UpdateUser)]
    fn command_reports_its_kind(#[case] command: Command, #[case] expected: CommandKind) {
        assert_eq!(command.kind(), expected);
        assert_eq!(command.kind().to_string(), expected.as_str());
    }
}
