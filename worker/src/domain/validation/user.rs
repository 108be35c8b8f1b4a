//! Rules for user commands.
//!
//! Updates only check the optional profile fields they carry; an absent or
//! empty field is skipped rather than reported.

use chrono::{DateTime, Utc};

use super::rules;
use super::{DISPLAY_NAME_MAX, Field, USERNAME_MAX, USERNAME_MIN, ValidationResult};
use crate::domain::{CreateUser, DeleteUser, UpdateUser};

pub(super) fn validate_create(user: &CreateUser, now: DateTime<Utc>) -> ValidationResult {
    let mut result = ValidationResult::default();
    rules::require(&user.user_id, Field::UserId, &mut result);
    username(&user.username, &mut result);
    rules::email(&user.email, Field::Email, &mut result);
    display_name(&user.display_name, &mut result);
    rules::avatar_url(&user.avatar_url, Field::AvatarUrl, &mut result);
    rules::timestamp(user.created_at, now, Field::CreatedAt, &mut result);
    result
}

pub(super) fn validate_update(user: &UpdateUser, now: DateTime<Utc>) -> ValidationResult {
    let mut result = ValidationResult::default();
    rules::require(&user.user_id, Field::UserId, &mut result);
    rules::timestamp(user.updated_at, now, Field::UpdatedAt, &mut result);

    let changes = user.changes();
    if let Some(value) = changes.username {
        username(value, &mut result);
    }
    if let Some(value) = changes.email {
        rules::email(value, Field::Email, &mut result);
    }
    if let Some(value) = changes.display_name {
        display_name(value, &mut result);
    }
    if let Some(value) = changes.avatar_url {
        rules::avatar_url(value, Field::AvatarUrl, &mut result);
    }
    result
}

pub(super) fn validate_delete(user: &DeleteUser) -> ValidationResult {
    let mut result = ValidationResult::default();
    rules::require(&user.user_id, Field::UserId, &mut result);
    result
}

fn username(value: &str, result: &mut ValidationResult) {
    rules::length_between(value, USERNAME_MIN, USERNAME_MAX, Field::Username, result);
}

fn display_name(value: &str, result: &mut ValidationResult) {
    rules::max_length(value, DISPLAY_NAME_MAX, Field::DisplayName, result);
}
