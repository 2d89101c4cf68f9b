//! Reader comments and the field rules a submission must satisfy.

use url::Url;

use crate::domain::error::DomainError;

pub const NAME_MAX_CHARS: usize = 64;
pub const EMAIL_MAX_CHARS: usize = 254;
pub const TEXT_MAX_CHARS: usize = 2000;

/// A comment as submitted by a reader, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewComment {
    pub name: String,
    pub email: String,
    pub url: Option<String>,
    pub text: String,
}

/// A comment whose fields have been trimmed and checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidComment {
    pub name: String,
    pub email: String,
    pub url: Option<String>,
    pub text: String,
}

impl NewComment {
    pub fn validate(self) -> Result<ValidComment, DomainError> {
        let name = bounded("name", &self.name, NAME_MAX_CHARS)?;
        let email = validate_email(&self.email)?;
        let url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(validate_url)
            .transpose()?;
        let text = bounded("text", &self.text, TEXT_MAX_CHARS)?;

        Ok(ValidComment {
            name,
            email,
            url,
            text,
        })
    }
}

fn bounded(field: &'static str, value: &str, max: usize) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    if trimmed.chars().count() > max {
        return Err(DomainError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_email(value: &str) -> Result<String, DomainError> {
    let email = bounded("email", value, EMAIL_MAX_CHARS)?;
    let mut parts = email.split('@');
    let well_formed = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty()
    );
    if !well_formed || email.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("email", "must be a valid address"));
    }
    Ok(email)
}

fn validate_url(value: &str) -> Result<String, DomainError> {
    let parsed =
        Url::parse(value).map_err(|err| DomainError::validation("url", err.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(DomainError::validation(
            "url",
            format!("unsupported scheme `{other}`"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment() -> NewComment {
        NewComment {
            name: "  Reader ".to_string(),
            email: "reader@example.com".to_string(),
            url: None,
            text: " Nice post! ".to_string(),
        }
    }

    #[test]
    fn valid_comment_is_trimmed() {
        let valid = comment().validate().expect("valid comment");
        assert_eq!(valid.name, "Reader");
        assert_eq!(valid.text, "Nice post!");
        assert_eq!(valid.url, None);
    }

    #[test]
    fn blank_url_is_treated_as_absent() {
        let valid = NewComment {
            url: Some("   ".to_string()),
            ..comment()
        }
        .validate()
        .expect("valid comment");
        assert_eq!(valid.url, None);
    }

    #[test]
    fn http_urls_are_normalized() {
        let valid = NewComment {
            url: Some("https://example.com".to_string()),
            ..comment()
        }
        .validate()
        .expect("valid comment");
        assert_eq!(valid.url.as_deref(), Some("https://example.com/"));
    }

    #[test]
    fn rejects_non_http_urls() {
        let err = NewComment {
            url: Some("javascript:alert(1)".to_string()),
            ..comment()
        }
        .validate()
        .expect_err("scheme rejected");
        assert!(matches!(err, DomainError::Validation { field: "url", .. }));
    }

    #[test]
    fn rejects_blank_text() {
        let err = NewComment {
            text: "\n\t ".to_string(),
            ..comment()
        }
        .validate()
        .expect_err("blank text rejected");
        assert!(matches!(err, DomainError::Validation { field: "text", .. }));
    }

    #[test]
    fn rejects_malformed_email() {
        for email in ["no-at-sign", "@example.com", "a@b@c", "a b@example.com"] {
            let err = NewComment {
                email: email.to_string(),
                ..comment()
            }
            .validate()
            .expect_err("email rejected");
            assert!(matches!(err, DomainError::Validation { field: "email", .. }));
        }
    }

    #[test]
    fn rejects_overlong_name() {
        let err = NewComment {
            name: "x".repeat(NAME_MAX_CHARS + 1),
            ..comment()
        }
        .validate()
        .expect_err("name too long");
        assert!(matches!(err, DomainError::Validation { field: "name", .. }));
    }
}
