//! Field checks shared by the auth and message handlers. Each returns the
//! cleaned value or a 400.

use crate::error::ApiError;

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_EMAIL_CHARS: usize = 255;
pub const MIN_PASSWORD_CHARS: usize = 6;
pub const MAX_PASSWORD_CHARS: usize = 128;
pub const MAX_SUBJECT_CHARS: usize = 200;
pub const MAX_CONTENT_CHARS: usize = 5000;

fn bad(message: impl Into<String>) -> ApiError {
    ApiError::BadRequest(message.into())
}

/// Trimmed and lower-cased; emails are unique case-insensitively.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(bad("Name is required"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(bad(format!("Name must be at most {MAX_NAME_CHARS} characters")));
    }
    Ok(name.to_string())
}

pub fn email(raw: &str) -> Result<String, ApiError> {
    let email = normalize_email(raw);
    if email.is_empty() {
        return Err(bad("Email is required"));
    }
    if email.len() > MAX_EMAIL_CHARS || !looks_like_email(&email) {
        return Err(bad("A valid email address is required"));
    }
    Ok(email)
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

pub fn password(raw: &str) -> Result<(), ApiError> {
    let len = raw.chars().count();
    if len < MIN_PASSWORD_CHARS {
        return Err(bad(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    if len > MAX_PASSWORD_CHARS {
        return Err(bad(format!(
            "Password must be at most {MAX_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn subject(raw: &str) -> Result<String, ApiError> {
    let subject = raw.trim();
    if subject.is_empty() {
        return Err(bad("Subject is required"));
    }
    if subject.chars().count() > MAX_SUBJECT_CHARS {
        return Err(bad(format!(
            "Subject must be at most {MAX_SUBJECT_CHARS} characters"
        )));
    }
    Ok(subject.to_string())
}

/// Content keeps its inner formatting; only surrounding whitespace is dropped.
pub fn content(raw: &str) -> Result<String, ApiError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(bad("Content is required"));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(bad(format!(
            "Content must be at most {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(name("  Ada Lovelace ").unwrap(), "Ada Lovelace");
        assert!(name("   ").is_err());
        assert!(name(&"x".repeat(MAX_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(email(" Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad_email in ["", "ada", "ada@", "@example.com", "ada@example", "a b@example.com", "a@b@c.io"] {
            assert!(email(bad_email).is_err(), "{bad_email} should be rejected");
        }
    }

    #[test]
    fn password_length_bounds() {
        assert!(password("12345").is_err());
        assert!(password("123456").is_ok());
        assert!(password(&"p".repeat(MAX_PASSWORD_CHARS + 1)).is_err());
    }

    #[test]
    fn subject_and_content_limits_count_characters() {
        assert!(subject(&"é".repeat(MAX_SUBJECT_CHARS)).is_ok());
        assert!(subject(&"é".repeat(MAX_SUBJECT_CHARS + 1)).is_err());
        assert!(content("").is_err());
        assert_eq!(content("\n line one\nline two \n").unwrap(), "line one\nline two");
        assert!(content(&"c".repeat(MAX_CONTENT_CHARS + 1)).is_err());
    }
}
