use reqwest::StatusCode;
use serde::Deserialize;

/// Errors returned by the deployment client.
///
/// Failures come in three disjoint layers: transport (the exchange itself
/// could not complete), HTTP (the server answered outside the success set)
/// and API (the server answered 2xx but the envelope carries a nonzero
/// error code). Nothing is retried internally; every failure is handed back
/// to the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to execute HTTP request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to encode request payload: {0}")]
    Encode(serde_json::Error),
    #[error("failed to decode response payload: {0}")]
    Decode(serde_json::Error),
    #[error("failed to build request URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to parse {field} time value {value:?}: {source}")]
    Timestamp {
        field: &'static str,
        value: String,
        source: chrono::ParseError,
    },
    #[error("response envelope is missing field {0:?}")]
    MissingField(&'static str),
    #[error("request canceled by caller")]
    Canceled,
    #[error("unexpected HTTP status code: {0}")]
    UnexpectedStatus(String),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    /// The exchange itself failed: the request could not be built, sent,
    /// read or decoded, or the caller canceled it.
    pub fn is_transport(&self) -> bool {
        !self.is_http() && !self.is_api()
    }

    /// The server answered with a status code outside the success set.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http(_) | Self::UnexpectedStatus(_))
    }

    /// The HTTP exchange succeeded but the envelope reported a logical
    /// failure.
    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api(_))
    }
}

/// Error received through the API: the request went through but the
/// response envelope carries an inner error.
///
/// A code of 0 on the wire means "no error"; an [`ApiError`] is only ever
/// built from a nonzero code.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: i64,
    pub message: String,
}

/// Error reported on the HTTP level with a structured body.
///
/// The code is taken from the status line, not from the payload.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct HttpError {
    pub code: StatusCode,
    pub message: String,
}

/// Body shape of a structured HTTP error response. Decoded leniently, the
/// service does not document extra fields here.
#[derive(Debug, Deserialize)]
pub(crate) struct HttpErrorBody {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let error = ApiError {
            code: 12,
            message: "deployment is paused".into(),
        };
        assert_eq!(error.to_string(), "12: deployment is paused");
    }

    #[test]
    fn http_error_display_includes_status_text() {
        let error = HttpError {
            code: StatusCode::FORBIDDEN,
            message: "invalid token".into(),
        };
        assert_eq!(error.to_string(), "403 Forbidden: invalid token");
    }

    #[test]
    fn error_kinds_are_disjoint() {
        let api = Error::from(ApiError {
            code: 7,
            message: "nope".into(),
        });
        assert!(api.is_api());
        assert!(!api.is_http());
        assert!(!api.is_transport());

        let http = Error::from(HttpError {
            code: StatusCode::FORBIDDEN,
            message: "nope".into(),
        });
        assert!(http.is_http());
        assert!(!http.is_api());
        assert!(!http.is_transport());

        let generic = Error::UnexpectedStatus("502 Bad Gateway".into());
        assert!(generic.is_http());

        let canceled = Error::Canceled;
        assert!(canceled.is_transport());
        assert!(!canceled.is_http());

        let missing = Error::MissingField("status");
        assert!(missing.is_transport());
    }
}
