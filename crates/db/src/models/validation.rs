use thiserror::Error;

/// A request payload failed validation. `message` is safe to show to the client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub(crate) fn required_text(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::new(field, format!("{field} is required")));
    }
    if value.chars().count() > max_chars {
        return Err(ValidationError::new(
            field,
            format!("{field} must be at most {max_chars} characters"),
        ));
    }
    Ok(value.to_string())
}

/// Trims the value; blank strings become `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn optional_url(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, ValidationError> {
    match optional_text(value) {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(Some(url)),
        Some(_) => Err(ValidationError::new(
            field,
            format!("{field} must be an http(s) URL"),
        )),
        None => Ok(None),
    }
}

pub fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}
