//! Field rules shared by the kwek and user validators.

use std::sync::OnceLock;

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;

use super::{
    AVATAR_URL_MAX, AVATAR_URL_PREFIX, Field, GUID_LENGTH, MAX_AGE_DAYS, ValidationError,
    ValidationResult,
};

/// Record `Required` when `value` is empty; returns whether it was present.
pub(super) fn require(value: &str, field: Field, result: &mut ValidationResult) -> bool {
    if value.is_empty() {
        result.push(ValidationError::Required { field });
        return false;
    }
    true
}

pub(super) fn guid(value: &str, field: Field, result: &mut ValidationResult) {
    if !require(value, field, result) {
        return;
    }
    if value.chars().count() != GUID_LENGTH {
        result.push(ValidationError::InvalidGuid { field });
    }
}

pub(super) fn max_length(value: &str, max: usize, field: Field, result: &mut ValidationResult) {
    if !require(value, field, result) {
        return;
    }
    if value.chars().count() > max {
        result.push(ValidationError::TooLong { field, max });
    }
}

pub(super) fn length_between(
    value: &str,
    min: usize,
    max: usize,
    field: Field,
    result: &mut ValidationResult,
) {
    if !require(value, field, result) {
        return;
    }
    let length = value.chars().count();
    if length < min {
        result.push(ValidationError::TooShort { field, min });
    } else if length > max {
        result.push(ValidationError::TooLong { field, max });
    }
}

/// A timestamp must exist, must not be after `now`, and must be newer than
/// `now - MAX_AGE_DAYS`.
pub(super) fn timestamp(
    value: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    field: Field,
    result: &mut ValidationResult,
) {
    let Some(value) = value else {
        result.push(ValidationError::Required { field });
        return;
    };

    if value > now {
        result.push(ValidationError::InFuture { field });
    } else if value <= now - TimeDelta::days(MAX_AGE_DAYS) {
        result.push(ValidationError::TooOld {
            field,
            days: MAX_AGE_DAYS,
        });
    }
}

pub(super) fn email(value: &str, field: Field, result: &mut ValidationResult) {
    if !require(value, field, result) {
        return;
    }
    if !is_email_address(value) {
        result.push(ValidationError::InvalidEmail { field });
    }
}

pub(super) fn avatar_url(value: &str, field: Field, result: &mut ValidationResult) {
    if !require(value, field, result) {
        return;
    }
    if value.chars().count() > AVATAR_URL_MAX {
        result.push(ValidationError::TooLong {
            field,
            max: AVATAR_URL_MAX,
        });
    }
    if !value.starts_with(AVATAR_URL_PREFIX) {
        result.push(ValidationError::MissingPrefix {
            field,
            prefix: AVATAR_URL_PREFIX,
        });
    }
}

static ADDRESS_RE: OnceLock<Regex> = OnceLock::new();

fn address_regex() -> &'static Regex {
    ADDRESS_RE.get_or_init(|| {
        // Either a bare addr-spec or `Display Name <addr-spec>`. The local
        // part is a dot-atom or a quoted string; the domain is a dot-atom.
        // Atoms admit any non-ASCII character alongside RFC 5322 atext.
        let atom = r"(?:[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]|[^\x00-\x7F])+";
        let quoted = r#""(?:[^"\\\r\n]|\\[^\r\n])+""#;
        let addr_spec = format!(r"(?:{atom}(?:\.{atom})*|{quoted})@{atom}(?:\.{atom})*");
        let pattern = format!(r#"^(?:{addr_spec}|(?:[^<>@"]*|"[^"]*")\s*<{addr_spec}>)$"#);
        Regex::new(&pattern)
            .unwrap_or_else(|error| panic!("email address regex failed to compile: {error}"))
    })
}

/// Structural email check covering `local@domain` and `Name <local@domain>`.
pub(super) fn is_email_address(value: &str) -> bool {
    address_regex().is_match(value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ada@example.com", true)]
    #[case("ada.lovelace+kwek@mail.example.co.uk", true)]
    #[case("Ada Lovelace <ada@example.com>", true)]
    #[case("ada@localhost", true)]
    #[case("ada", false)]
    #[case("ada@", false)]
    #[case("@example.com", false)]
    #[case("ada..lovelace@example.com", false)]
    #[case("ada@exa mple.com", false)]
    #[case("Ada <ada@example.com", false)]
    #[case("josé@example.com", true)]
    #[case("ada@exämple.com", true)]
    #[case("\"ada lovelace\"@example.com", true)]
    #[case("ada@foo_bar.com", true)]
    #[case("Ada <\"ada lovelace\"@example.com>", true)]
    #[case("\"ada@example.com", false)]
    #[case("ada@example.com.", false)]
    fn recognises_email_addresses(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(is_email_address(value), expected, "value: {value}");
    }

    #[rstest]
    fn dependent_checks_are_skipped_for_empty_values() {
        let mut result = ValidationResult::default();
        guid("", Field::KwekGuid, &mut result);
        avatar_url("", Field::AvatarUrl, &mut result);

        assert_eq!(
            result.errors(),
            [
                ValidationError::Required {
                    field: Field::KwekGuid
                },
                ValidationError::Required {
                    field: Field::AvatarUrl
                },
            ]
        );
    }
}
