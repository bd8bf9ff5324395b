use std::sync::LazyLock;

use arena_core::is_valid_code;
use arena_types::FieldError;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

// E.164: plus sign, no leading zero, 7 to 15 digits total
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{6,14}$").expect("valid phone pattern"));

fn field_error(field: &str, message: impl Into<String>) -> FieldError {
    FieldError {
        field: field.to_string(),
        message: message.into(),
    }
}

pub fn validate_email(value: &str) -> Result<(), FieldError> {
    if EMAIL_RE.is_match(value.trim()) {
        Ok(())
    } else {
        Err(field_error("email", "Please enter a valid email address"))
    }
}

pub fn validate_password(value: &str) -> Result<(), FieldError> {
    if value.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(field_error(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ))
    }
}

pub fn validate_phone(value: &str) -> Result<(), FieldError> {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if PHONE_RE.is_match(&compact) {
        Ok(())
    } else {
        Err(field_error(
            "phone",
            "Phone number must include the country code, e.g. +15551234567",
        ))
    }
}

/// Returns the trimmed name
pub fn validate_display_name(value: &str) -> Result<String, FieldError> {
    let name = value.trim();
    let length = name.chars().count();

    if length == 0 {
        return Err(field_error("display_name", "Please enter your name"));
    }
    if length > MAX_DISPLAY_NAME_LEN {
        return Err(field_error(
            "display_name",
            format!("Name must be at most {} characters", MAX_DISPLAY_NAME_LEN),
        ));
    }
    if name.chars().any(char::is_control) {
        return Err(field_error("display_name", "Name contains invalid characters"));
    }
    Ok(name.to_string())
}

/// Returns the code uppercased
pub fn validate_code(value: &str) -> Result<String, FieldError> {
    let code = value.trim().to_ascii_uppercase();
    if is_valid_code(&code) {
        Ok(code)
    } else {
        Err(field_error("code", "Match codes are 6 letters or digits"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidationRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

/// Check every field present in the request
pub fn validate_request(request: &ValidationRequest) -> ValidationReport {
    let checks = [
        request.email.as_deref().map(validate_email),
        request.password.as_deref().map(validate_password),
        request.phone.as_deref().map(validate_phone),
        request
            .display_name
            .as_deref()
            .map(|name| validate_display_name(name).map(|_| ())),
        request
            .code
            .as_deref()
            .map(|code| validate_code(code).map(|_| ())),
    ];

    let errors: Vec<FieldError> = checks
        .into_iter()
        .flatten()
        .filter_map(Result::err)
        .collect();

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(validate_email("ruth@moab.org").is_ok());
        assert!(validate_email("  ruth@moab.org ").is_ok());
        assert!(validate_email("ruth@moab").is_err());
        assert!(validate_email("ruth moab@x.org").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_phone() {
        assert!(validate_phone("+15551234567").is_ok());
        assert!(validate_phone("+1 555-123-4567").is_ok());
        assert!(validate_phone("15551234567").is_err());
        assert!(validate_phone("+05551234567").is_err());
        assert!(validate_phone("+12345").is_err());
        assert!(validate_phone("+1234567890123456").is_err());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(validate_display_name("  Esther ").unwrap(), "Esther");
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(33)).is_err());
        assert!(validate_display_name(&"x".repeat(32)).is_ok());
        assert!(validate_display_name("bad\u{7}name").is_err());
    }

    #[test]
    fn test_code_is_normalized() {
        assert_eq!(validate_code(" ab12cd ").unwrap(), "AB12CD");
        assert!(validate_code("AB12C").is_err());
        assert!(validate_code("AB-2CD").is_err());
    }

    #[test]
    fn test_request_reports_each_bad_field() {
        let request = ValidationRequest {
            email: Some("nope".to_string()),
            password: Some("secret".to_string()),
            phone: Some("555".to_string()),
            ..Default::default()
        };
        let report = validate_request(&request);

        assert!(!report.valid);
        let fields: Vec<&str> = report.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "phone"]);
    }

    #[test]
    fn test_empty_request_is_valid() {
        let report = validate_request(&ValidationRequest::default());
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }
}
