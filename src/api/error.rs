use serde_json::Value;

use crate::api::transport::TransportError;
use crate::store::StoreError;

/// One backend complaint about a submitted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub messages: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Credentials rejected, or a request still unauthorized after refresh.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The refresh token is missing or was rejected. The session is gone.
    #[error("session expired")]
    SessionExpired,

    #[error("request failed ({status}): {message}")]
    Request { status: u16, message: String },

    #[error("validation failed: {message}")]
    Validation { message: String, fields: Vec<FieldError> },

    #[error("network error: {0}")]
    Network(#[from] TransportError),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// The caller must drop to the login view.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }

    /// Text suitable for showing next to whatever triggered the call.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Auth(_) => "Invalid username or password".to_string(),
            ApiError::SessionExpired => "Session expired. Please login again.".to_string(),
            ApiError::Request { message, .. } => message.clone(),
            ApiError::Validation { message, .. } => message.clone(),
            ApiError::Network(_) => "Network error, please retry".to_string(),
            ApiError::Decode(_) | ApiError::Store(_) => "Something went wrong, please retry".to_string(),
        }
    }

    pub(crate) fn request(status: u16, body: &str, generic: &str) -> Self {
        let message = BackendError::parse(body)
            .message
            .unwrap_or_else(|| generic.to_string());
        ApiError::Request { status, message }
    }

    pub(crate) fn unauthorized(body: &str) -> Self {
        ApiError::Auth(
            BackendError::parse(body)
                .message
                .unwrap_or_else(|| "unauthorized after token refresh".to_string()),
        )
    }

    pub(crate) fn validation(body: &str, generic: &str) -> Self {
        let parsed = BackendError::parse(body);
        let message = parsed
            .message
            .or_else(|| {
                let joined: Vec<String> = parsed
                    .fields
                    .iter()
                    .map(|f| format!("{}: {}", f.field, f.messages.join(" ")))
                    .collect();
                (!joined.is_empty()).then(|| joined.join("; "))
            })
            .unwrap_or_else(|| generic.to_string());
        ApiError::Validation {
            message,
            fields: parsed.fields,
        }
    }
}

/// What could be salvaged from a non-2xx body.
#[derive(Debug, Default)]
struct BackendError {
    message: Option<String>,
    fields: Vec<FieldError>,
}

impl BackendError {
    fn parse(body: &str) -> Self {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
            return Self::default();
        };
        let mut out = Self::default();
        for (key, value) in map {
            match (key.as_str(), value) {
                ("error" | "detail" | "message", Value::String(s)) if out.message.is_none() => {
                    out.message = Some(s);
                }
                ("non_field_errors", Value::Array(items)) if out.message.is_none() => {
                    out.message = Some(strings(&items).join(" "));
                }
                (_, Value::Array(items)) => {
                    let messages = strings(&items);
                    if !messages.is_empty() {
                        out.fields.push(FieldError { field: key.clone(), messages });
                    }
                }
                (_, Value::String(s)) if !matches!(key.as_str(), "error" | "detail" | "message" | "code") => {
                    out.fields.push(FieldError { field: key.clone(), messages: vec![s] });
                }
                _ => {}
            }
        }
        out
    }
}

fn strings(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_prefers_backend_message() {
        let err = ApiError::request(403, r#"{"error":"Admin access required"}"#, "Failed to fetch");
        assert!(matches!(err, ApiError::Request { status: 403, ref message } if message == "Admin access required"));

        let err = ApiError::request(401, r#"{"detail":"Token is invalid or expired","code":"token_not_valid"}"#, "x");
        assert_eq!(err.user_message(), "Token is invalid or expired");
    }

    #[test]
    fn request_falls_back_to_generic() {
        let err = ApiError::request(500, "<html>Server Error</html>", "Failed to fetch vessel data");
        assert_eq!(err.user_message(), "Failed to fetch vessel data");
    }

    #[test]
    fn validation_collects_field_errors() {
        let body = r#"{"hire_rate":["Ensure this value is greater than or equal to 0."]}"#;
        match ApiError::validation(body, "Failed to add vessel data") {
            ApiError::Validation { message, fields } => {
                assert_eq!(message, "hire_rate: Ensure this value is greater than or equal to 0.");
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "hire_rate");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn validation_keeps_top_level_message() {
        match ApiError::validation(r#"{"error":"All fields are required"}"#, "generic") {
            ApiError::Validation { message, fields } => {
                assert_eq!(message, "All fields are required");
                assert!(fields.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn user_messages_per_kind() {
        use crate::api::transport::TransportErrorKind;

        let network = ApiError::Network(TransportError::new(TransportErrorKind::Timeout, "timed out"));
        assert_eq!(network.user_message(), "Network error, please retry");
        assert_eq!(ApiError::SessionExpired.user_message(), "Session expired. Please login again.");
    }

    #[test]
    fn only_session_expiry_forces_login() {
        assert!(ApiError::SessionExpired.requires_login());
        assert!(!ApiError::Auth("bad".into()).requires_login());
    }
}
