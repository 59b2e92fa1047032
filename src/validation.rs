//! Name validation for namespaces, modules and providers.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

const MAX_NAME_LEN: usize = 128;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Za-z][0-9A-Za-z_-]*$").expect("name regex is valid")
});

/// Error raised when a name fails validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("{kind} name '{value}' is invalid")]
    Invalid { kind: &'static str, value: String },
    #[error("{kind} name exceeds {MAX_NAME_LEN} characters")]
    TooLong { kind: &'static str },
}

fn validate(kind: &'static str, value: &str) -> Result<(), NameError> {
    if value.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong { kind });
    }
    if !NAME_RE.is_match(value) {
        return Err(NameError::Invalid {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

pub fn validate_namespace_name(value: &str) -> Result<(), NameError> {
    validate("namespace", value)
}

pub fn validate_module_name(value: &str) -> Result<(), NameError> {
    validate("module", value)
}

pub fn validate_provider_name(value: &str) -> Result<(), NameError> {
    validate("provider", value)
}

pub fn validate_user_group_name(value: &str) -> Result<(), NameError> {
    validate("user group", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_names() {
        for name in ["acme", "AWS", "my-modules", "team_a", "0day"] {
            assert!(validate_namespace_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_bad_names() {
        for name in ["", "-leading", "_leading", "has space", "dot.dot", "ünïcode"] {
            assert!(validate_namespace_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn rejects_overlong_names() {
        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert_eq!(
            validate_module_name(&long),
            Err(NameError::TooLong { kind: "module" })
        );
        let max = "a".repeat(MAX_NAME_LEN);
        assert!(validate_module_name(&max).is_ok());
    }
}
