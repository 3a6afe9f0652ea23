//! Form validation helpers: field-level and form-level errors collected while
//! checking user input, plus the individual checks themselves.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

// Pattern recommended by the WHATWG HTML spec for input[type=email].
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email regex is valid")
});

#[derive(Debug, Default, Clone)]
pub struct Validator {
    field_errors: BTreeMap<&'static str, String>,
    non_field_errors: Vec<String>,
}

impl Validator {
    pub fn valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    /// Records `message` against `field` when `ok` is false. Only the first
    /// error per field is kept.
    pub fn check_field(&mut self, ok: bool, field: &'static str, message: &str) {
        if !ok {
            self.add_field_error(field, message);
        }
    }

    pub fn add_field_error(&mut self, field: &'static str, message: &str) {
        self.field_errors
            .entry(field)
            .or_insert_with(|| message.to_string());
    }

    pub fn add_non_field_error(&mut self, message: &str) {
        self.non_field_errors.push(message.to_string());
    }

    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors.get(field).map(|s| s.as_str())
    }

    pub fn non_field_errors(&self) -> &[String] {
        &self.non_field_errors
    }
}

pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn max_chars(value: &str, n: usize) -> bool {
    value.chars().count() <= n
}

pub fn min_chars(value: &str, n: usize) -> bool {
    value.chars().count() >= n
}

pub fn permitted<T: PartialEq>(value: T, permitted: &[T]) -> bool {
    permitted.contains(&value)
}

pub fn is_email(value: &str) -> bool {
    value.len() <= 254 && EMAIL_RE.is_match(value)
}
