//! Error types for Dataverse Web API operations

use thiserror::Error;

/// Result type alias for Dataverse operations
pub type DataverseResult<T> = Result<T, DataverseError>;

/// Errors that can occur while talking to a Dataverse environment
#[derive(Error, Debug)]
pub enum DataverseError {
    /// Token acquisition or authorization failed
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Network-level failure (connect, reset, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status from the service
    #[error("Dataverse service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl DataverseError {
    /// Map an HTTP status and body returned by the service
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = service_message(body).unwrap_or_else(|| body.trim().to_string());
        match status {
            401 | 403 => DataverseError::Authentication(format!("HTTP {}: {}", status, message)),
            _ => DataverseError::Service { status, message },
        }
    }

    /// Whether this error means the caller is not (or no longer) authorized
    pub fn is_auth(&self) -> bool {
        matches!(self, DataverseError::Authentication(_))
    }
}

/// Pull `error.message` out of an OData error payload
fn service_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("message").or_else(|| e.get("error_description")))
        .or_else(|| value.get("error_description"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

impl From<reqwest::Error> for DataverseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DataverseError::Timeout(err.to_string())
        } else if err.is_decode() {
            DataverseError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            DataverseError::from_status(status.as_u16(), &err.to_string())
        } else {
            DataverseError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DataverseError {
    fn from(err: serde_json::Error) -> Self {
        DataverseError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_maps_to_auth() {
        let err = DataverseError::from_status(401, "");
        assert!(err.is_auth());
        let err = DataverseError::from_status(403, "forbidden");
        assert!(err.is_auth());
    }

    #[test]
    fn test_odata_error_message_extracted() {
        let body = r#"{"error":{"code":"0x80040217","message":"workflow With Id = 1 Does Not Exist"}}"#;
        let err = DataverseError::from_status(404, body);
        assert_eq!(
            err.to_string(),
            "Dataverse service error (404): workflow With Id = 1 Does Not Exist"
        );
    }

    #[test]
    fn test_token_endpoint_error_description() {
        let body = r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret"}"#;
        let err = DataverseError::from_status(401, body);
        assert_eq!(
            err.to_string(),
            "Authentication error: HTTP 401: AADSTS7000215: Invalid client secret"
        );
    }

    #[test]
    fn test_plain_body_kept() {
        let err = DataverseError::from_status(502, "  Bad Gateway \n");
        assert_eq!(err.to_string(), "Dataverse service error (502): Bad Gateway");
        assert!(!err.is_auth());
    }

    #[test]
    fn test_error_display_formats() {
        assert_eq!(
            DataverseError::Network("connection lost".to_string()).to_string(),
            "Network error: connection lost"
        );
        assert_eq!(
            DataverseError::Timeout("120s elapsed".to_string()).to_string(),
            "Operation timed out: 120s elapsed"
        );
        assert_eq!(
            DataverseError::Decode("missing value".to_string()).to_string(),
            "Unexpected response: missing value"
        );
    }
}
