use slotwatch_core::{PrepareError, RemoteError};
use thiserror::Error;

/// Errors returned by the booking API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered 401 or 403: the session cookie is no longer valid.
    #[error("session rejected by {url}")]
    AuthExpired { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response envelope carried `"Success": false`.
    #[error("booking API error: {0}")]
    Api(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Base URL or header values could not be used to build requests.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl From<ClientError> for RemoteError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::AuthExpired { .. } => RemoteError::AuthExpired,
            other => RemoteError::Transient(other.to_string()),
        }
    }
}

impl From<ClientError> for PrepareError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api(message) => PrepareError::Rejected(message),
            other => PrepareError::Remote(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_expired_maps_to_remote_auth_expired() {
        let err = ClientError::AuthExpired {
            url: "https://example.test/UserGetInfo".to_owned(),
        };
        assert_eq!(RemoteError::from(err), RemoteError::AuthExpired);
    }

    #[test]
    fn other_errors_map_to_transient() {
        let err = ClientError::UnexpectedStatus {
            status: 502,
            url: "https://example.test/x".to_owned(),
        };
        assert!(matches!(RemoteError::from(err), RemoteError::Transient(ref m) if m.contains("502")));
    }

    #[test]
    fn api_error_during_preparation_is_a_rejection() {
        let err = PrepareError::from(ClientError::Api("visit limit reached".to_owned()));
        assert!(matches!(err, PrepareError::Rejected(ref m) if m == "visit limit reached"));
    }

    #[test]
    fn auth_error_during_preparation_stays_auth_expired() {
        let err = PrepareError::from(ClientError::AuthExpired {
            url: "u".to_owned(),
        });
        assert!(matches!(err, PrepareError::Remote(RemoteError::AuthExpired)));
    }
}
