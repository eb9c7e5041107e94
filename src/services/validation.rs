use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.-]+@([\w-]+\.)+[\w-]{2,4}$").unwrap()
});

/// Optional leading '+', digits with spaces, dashes, dots, slashes or parentheses.
static RE_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+]?[(]?[-1-9]{1,4}[)]?[-\s./0-9]*$").unwrap()
});

pub const MIN_PASSWORD_LEN: usize = 8;

/// Collects every failed rule so a request reports all its problems at once.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&mut self, ok: bool, message: impl FnOnce() -> String) -> &mut Self {
        if !ok {
            self.errors.push(message());
        }
        self
    }

    pub fn not_blank(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), || format!("{} must not be blank", field))
    }

    pub fn min_len(&mut self, field: &str, value: &str, min: usize) -> &mut Self {
        self.check(value.chars().count() >= min, || {
            format!("{} must be at least {} characters", field, min)
        })
    }

    pub fn non_negative_decimal(&mut self, field: &str, value: Decimal) -> &mut Self {
        self.check(!value.is_sign_negative(), || format!("{} must not be negative", field))
    }

    pub fn non_negative(&mut self, field: &str, value: i32) -> &mut Self {
        self.check(value >= 0, || format!("{} must not be negative", field))
    }

    pub fn positive_id(&mut self, field: &str, value: i64) -> &mut Self {
        self.check(value > 0, || format!("{} must be a positive id", field))
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(RE_EMAIL.is_match(value), || format!("{} is not a valid email", field))
    }

    pub fn phone(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(RE_PHONE.is_match(value), || {
            format!("{} is not a valid phone number", field)
        })
    }

    pub fn finish(&mut self) -> AppResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}
