use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with a non-success status.
    #[error("{operation}: status {status}, {code}: {message}")]
    Api {
        operation: String,
        status: u16,
        code: String,
        message: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset, ...).
    #[error("{operation}: {message}")]
    Transport { operation: String, message: String },

    /// A success response was missing a field we rely on.
    #[error("{operation}: unexpected response: {message}")]
    Decode { operation: String, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Service error code, e.g. `PrincipalNotFound` or `Request_ResourceNotFound`.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub(crate) fn transport(operation: &str, err: reqwest::Error) -> Self {
        ClientError::Transport {
            operation: operation.to_string(),
            message: err.to_string(),
        }
    }
}

/// Extract `(code, message)` from an ARM error envelope:
/// `{"error": {"code": "...", "message": "..."}}`.
pub(crate) fn parse_arm_error(body: &Value) -> (String, String) {
    let err = body
        .get("error")
        .or_else(|| body.get("Error"))
        .unwrap_or(body);
    let code    = err["code"].as_str().unwrap_or("Unknown");
    let message = err["message"].as_str().unwrap_or("unknown error");
    (code.to_string(), message.to_string())
}

/// Extract `(code, message)` from an AD Graph OData error envelope:
/// `{"odata.error": {"code": "...", "message": {"lang": "en", "value": "..."}}}`.
pub(crate) fn parse_graph_error(body: &Value) -> (String, String) {
    let err = &body["odata.error"];
    let code = err["code"].as_str().unwrap_or("Unknown");
    let message = err["message"]["value"]
        .as_str()
        .or_else(|| err["message"].as_str())
        .unwrap_or("unknown error");
    (code.to_string(), message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_arm_error_standard() {
        let body = json!({
            "error": { "code": "PrincipalNotFound", "message": "Principal abc does not exist" }
        });
        let (code, message) = parse_arm_error(&body);
        assert_eq!(code, "PrincipalNotFound");
        assert!(message.contains("does not exist"), "got: {}", message);
    }

    #[test]
    fn parse_arm_error_missing_fields_gives_fallback() {
        let (code, message) = parse_arm_error(&json!({ "error": {} }));
        assert_eq!(format!("{}: {}", code, message), "Unknown: unknown error");
    }

    #[test]
    fn parse_graph_error_odata() {
        let body = json!({
            "odata.error": {
                "code": "Request_ResourceNotFound",
                "message": { "lang": "en", "value": "Resource 'x' does not exist" }
            }
        });
        let (code, message) = parse_graph_error(&body);
        assert_eq!(code, "Request_ResourceNotFound");
        assert_eq!(message, "Resource 'x' does not exist");
    }

    #[test]
    fn status_and_code_accessors() {
        let err = ClientError::Api {
            operation: "create role assignment".into(),
            status: 400,
            code: "PrincipalNotFound".into(),
            message: "not yet".into(),
        };
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.code(), Some("PrincipalNotFound"));
        assert_eq!(ClientError::Auth("x".into()).status(), None);
    }
}
