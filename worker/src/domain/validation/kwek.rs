//! Rules for kwek commands.

use chrono::{DateTime, Utc};

use super::rules;
use super::{Field, KWEK_TEXT_MAX, ValidationResult};
use crate::domain::{CreateKwek, DeleteKwek, UpdateKwek};

pub(super) fn validate_create(kwek: &CreateKwek, now: DateTime<Utc>) -> ValidationResult {
    let mut result = ValidationResult::default();
    rules::guid(&kwek.kwek_guid, Field::KwekGuid, &mut result);
    rules::max_length(&kwek.text, KWEK_TEXT_MAX, Field::Text, &mut result);
    rules::require(&kwek.user_id, Field::UserId, &mut result);
    rules::timestamp(kwek.posted_at, now, Field::PostedAt, &mut result);
    result
}

pub(super) fn validate_update(kwek: &UpdateKwek, now: DateTime<Utc>) -> ValidationResult {
    let mut result = ValidationResult::default();
    rules::guid(&kwek.kwek_guid, Field::KwekGuid, &mut result);
    rules::max_length(&kwek.text, KWEK_TEXT_MAX, Field::Text, &mut result);
    rules::timestamp(kwek.updated_at, now, Field::UpdatedAt, &mut result);
    result
}

pub(super) fn validate_delete(kwek: &DeleteKwek) -> ValidationResult {
    let mut result = ValidationResult::default();
    rules::guid(&kwek.kwek_guid, Field::KwekGuid, &mut result);
    result
}
