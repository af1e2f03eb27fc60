//! Input validation for data-entry states.

use intake_config::ValidationConfig;
use regex_lite::Regex;

use crate::error::TableError;
use crate::session::{Captured, Field};

/// Per-field validation rules, compiled once from config.
#[derive(Debug, Clone)]
pub struct Validator {
    phone_min_len: usize,
    country_code: String,
    phone_pattern: Regex,
    name_min_len: usize,
    new_client_name_min_len: usize,
    details_min_len: usize,
    details_max_len: usize,
}

impl Validator {
    pub fn new(config: &ValidationConfig) -> Result<Self, TableError> {
        let cc = config.country_code.trim();
        let max = config.phone_max_digits;
        let pattern = if cc.is_empty() {
            format!(r"^\+[1-9]\d{{9,{}}}$", max.saturating_sub(1).max(9))
        } else {
            let lo = 10usize.saturating_sub(cc.len()).max(1);
            let hi = max.saturating_sub(cc.len()).max(lo);
            format!(r"^\+{cc}\d{{{lo},{hi}}}$")
        };
        let phone_pattern =
            Regex::new(&pattern).map_err(|e| TableError::InvalidPattern(e.to_string()))?;

        Ok(Self {
            phone_min_len: config.phone_min_len,
            country_code: cc.to_string(),
            phone_pattern,
            name_min_len: config.name_min_len,
            new_client_name_min_len: config.new_client_name_min_len,
            details_min_len: config.details_min_len,
            details_max_len: config.details_max_len,
        })
    }

    /// Validate raw input for `field`. The error is the annotation shown to
    /// the staff member.
    pub fn check(&self, field: Field, raw: &str) -> Result<Captured, String> {
        let value = raw.trim();
        match field {
            Field::Phone | Field::NewClientPhone => self.phone(value).map(Captured::Text),
            Field::Name => name(value, self.name_min_len).map(Captured::Text),
            Field::NewClientName => name(value, self.new_client_name_min_len).map(Captured::Text),
            Field::ClientId => client_id(value).map(Captured::Id),
            Field::Details => self.details(value).map(Captured::Text),
        }
    }

    /// Normalize and check a phone number, returning it as `+<digits>`.
    pub fn phone(&self, value: &str) -> Result<String, String> {
        if value.is_empty() {
            return Err("Phone number is required.".into());
        }
        if value.chars().count() < self.phone_min_len {
            return Err(format!(
                "Phone number is too short (at least {} characters).",
                self.phone_min_len
            ));
        }

        let mut normalized: String = value
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
            .collect();

        if !normalized.starts_with('+') && !self.country_code.is_empty() {
            if normalized.starts_with(&self.country_code) {
                normalized.insert(0, '+');
            } else if normalized.chars().all(|c| c.is_ascii_digit()) {
                normalized = format!("+{}{normalized}", self.country_code);
            }
        }

        if self.phone_pattern.is_match(&normalized) {
            Ok(normalized)
        } else if self.country_code.is_empty() {
            Err("Enter the number in international format, e.g. +14155550123.".into())
        } else {
            Err(format!(
                "Enter the number in the format +{}XXXXXXXXX.",
                self.country_code
            ))
        }
    }

    fn details(&self, value: &str) -> Result<String, String> {
        let len = value.chars().count();
        if len < self.details_min_len {
            Err(format!(
                "Details are too short (at least {} characters).",
                self.details_min_len
            ))
        } else if len > self.details_max_len {
            Err(format!(
                "Details are too long (at most {} characters).",
                self.details_max_len
            ))
        } else {
            Ok(value.to_string())
        }
    }
}

fn name(value: &str, min_len: usize) -> Result<String, String> {
    if value.chars().count() < min_len {
        return Err(format!("Name is too short (at least {min_len} characters)."));
    }
    if value.chars().all(|c| c.is_ascii_digit() || c.is_whitespace()) {
        return Err("Name must contain letters.".into());
    }
    Ok(value.to_string())
}

fn client_id(value: &str) -> Result<i64, String> {
    match value.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        Ok(_) => Err("Client ID must be a positive number.".into()),
        Err(_) => Err("Client ID must be a number.".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Validator {
        Validator::new(&ValidationConfig::default()).unwrap()
    }

    #[test]
    fn phone_accepts_formatted_national_numbers() {
        let v = validator();
        assert_eq!(v.phone("+998901234567").unwrap(), "+998901234567");
        assert_eq!(v.phone("+998 (90) 123-45-67").unwrap(), "+998901234567");
        assert_eq!(v.phone("998901234567").unwrap(), "+998901234567");
        assert_eq!(v.phone("90 123 45 67").unwrap(), "+998901234567");
    }

    #[test]
    fn phone_rejections() {
        let v = validator();
        assert!(v.phone("").unwrap_err().contains("required"));
        assert!(v.phone("+99890").unwrap_err().contains("too short"));
        assert!(v.phone("+7 912 345 67 89").unwrap_err().contains("+998"));
        assert!(v.phone("call me maybe").is_err());
    }

    #[test]
    fn empty_country_code_accepts_any_international_number() {
        let config = ValidationConfig {
            country_code: String::new(),
            ..Default::default()
        };
        let v = Validator::new(&config).unwrap();
        assert_eq!(v.phone("+1 415 555 0123").unwrap(), "+14155550123");
        assert!(v.phone("4155550123").is_err());
    }

    #[test]
    fn names_have_per_field_minimums() {
        let v = validator();
        assert!(v.check(Field::Name, "A").is_err());
        assert_eq!(v.check(Field::Name, " Al ").unwrap(), Captured::Text("Al".into()));
        assert!(v.check(Field::NewClientName, "Al").is_err());
        assert!(v.check(Field::NewClientName, "Ali").is_ok());
        assert!(v.check(Field::Name, "12345").is_err());
    }

    #[test]
    fn client_id_must_be_positive_integer() {
        let v = validator();
        assert_eq!(v.check(Field::ClientId, "17").unwrap(), Captured::Id(17));
        assert!(v.check(Field::ClientId, "0").is_err());
        assert!(v.check(Field::ClientId, "abc").is_err());
    }

    #[test]
    fn details_length_bounds() {
        let v = validator();
        assert!(v.check(Field::Details, "fix").is_err());
        assert!(v.check(Field::Details, "Boiler leaks").is_ok());
        assert!(v.check(Field::Details, &"x".repeat(1001)).is_err());
    }
}
