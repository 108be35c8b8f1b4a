//! Business-rule validation for decoded commands.
//!
//! Validation is pure: it reads a [`Command`] and the current time and
//! returns every violated rule in field order. A field that is empty only
//! reports `"<Field> is required"`; the format and length checks that depend
//! on it are skipped.

mod kwek;
mod rules;
mod user;

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::Command;

/// Maximum kwek text length in characters.
pub const KWEK_TEXT_MAX: usize = 256;
/// Required GUID length in characters.
pub const GUID_LENGTH: usize = 36;
/// Minimum username length in characters.
pub const USERNAME_MIN: usize = 3;
/// Maximum username length in characters.
pub const USERNAME_MAX: usize = 15;
/// Maximum display name length in characters.
pub const DISPLAY_NAME_MAX: usize = 30;
/// Maximum avatar URL length in characters.
pub const AVATAR_URL_MAX: usize = 256;
/// Required avatar URL scheme prefix.
pub const AVATAR_URL_PREFIX: &str = "https://";
/// Oldest accepted timestamp, in days before now.
pub const MAX_AGE_DAYS: i64 = 30;

/// Command field named in validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Kwek GUID.
    KwekGuid,
    /// Kwek body.
    Text,
    /// External user identifier.
    UserId,
    /// Kwek post time.
    PostedAt,
    /// Edit time.
    UpdatedAt,
    /// Account creation time.
    CreatedAt,
    /// User handle.
    Username,
    /// Contact address.
    Email,
    /// Human readable name.
    DisplayName,
    /// Avatar image URL.
    AvatarUrl,
}

impl Field {
    /// Name used in messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KwekGuid => "KwekGuid",
            Self::Text => "Text",
            Self::UserId => "UserId",
            Self::PostedAt => "PostedAt",
            Self::UpdatedAt => "UpdatedAt",
            Self::CreatedAt => "CreatedAt",
            Self::Username => "Username",
            Self::Email => "Email",
            Self::DisplayName => "DisplayName",
            Self::AvatarUrl => "AvatarUrl",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Field is empty or absent.
    #[error("{field} is required")]
    Required { field: Field },
    /// Field is not a 36-character GUID.
    #[error("{field} must be a valid GUID")]
    InvalidGuid { field: Field },
    /// Field is shorter than allowed.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: Field, min: usize },
    /// Field is longer than allowed.
    #[error("{field} must be less than {max} characters")]
    TooLong { field: Field, max: usize },
    /// Field does not parse as an email address.
    #[error("{field} is not valid")]
    InvalidEmail { field: Field },
    /// Field does not start with the required prefix.
    #[error("{field} must start with {prefix}")]
    MissingPrefix { field: Field, prefix: &'static str },
    /// Timestamp lies after now.
    #[error("{field} cannot be in the future")]
    InFuture { field: Field },
    /// Timestamp lies too far before now.
    #[error("{field} cannot be more than {days} days ago")]
    TooOld { field: Field, days: i64 },
}

impl ValidationError {
    /// The field this error refers to.
    pub fn field(&self) -> Field {
        match self {
            Self::Required { field }
            | Self::InvalidGuid { field }
            | Self::TooShort { field, .. }
            | Self::TooLong { field, .. }
            | Self::InvalidEmail { field }
            | Self::MissingPrefix { field, .. }
            | Self::InFuture { field }
            | Self::TooOld { field, .. } => *field,
        }
    }
}

/// Outcome of validating one command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// True when no rule was violated.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Violated rules in the order they were checked.
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Violated rules rendered as messages.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub(crate) fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }
}

/// Validate `command` against the business rules as of `now`.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use kwekker_worker::domain::{Command, DeleteKwek, validate};
///
/// let command = Command::DeleteKwek(DeleteKwek { kwek_guid: String::new() });
/// let result = validate(&command, Utc::now());
/// assert!(!result.is_valid());
/// assert_eq!(result.messages(), ["KwekGuid is required"]);
/// ```
pub fn validate(command: &Command, now: DateTime<Utc>) -> ValidationResult {
    match command {
        Command::CreateKwek(kwek) => kwek::validate_create(kwek, now),
        Command::UpdateKwek(kwek) => kwek::validate_update(kwek, now),
        Command::DeleteKwek(kwek) => kwek::validate_delete(kwek),
        Command::CreateUser(user) => user::validate_create(user, now),
        Command::UpdateUser(user) => user::validate_update(user, now),
        Command::DeleteUser(user) => user::validate_delete(user),
    }
}
