use serde_json::Value;

/// Failure talking to the reservation backend.
///
/// `Clone` because one failed fetch is handed to every caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound,
    /// 422, or a 400 carrying field errors. Holds the raw details.
    Validation(String),
    Server(u16),
    Status(u16, String),
    /// No response at all (DNS, refused, timeout).
    Connection(String),
    Decode(String),
    /// The fetch task died before producing a result.
    Aborted(String),
}

impl ApiError {
    /// Map a non-success HTTP response to an error, using the `detail` or
    /// `message` field of a JSON body when there is one.
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let detail = field("detail").or_else(|| field("message"));

        match status {
            400 => ApiError::BadRequest(detail.unwrap_or_else(|| "invalid data".into())),
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound,
            422 => {
                let details = parsed
                    .as_ref()
                    .map(|v| v.get("errors").unwrap_or(v).to_string())
                    .unwrap_or_else(|| body.to_string());
                ApiError::Validation(details)
            }
            500..=599 => ApiError::Server(status),
            _ => ApiError::Status(status, detail.unwrap_or_else(|| "an error occurred".into())),
        }
    }

    /// Worth retrying later without user action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::Server(_) | ApiError::Connection(_) | ApiError::Aborted(_)
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ApiError::from_status(status.as_u16(), "")
        } else {
            ApiError::Connection(e.to_string())
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            ApiError::Unauthorized => write!(f, "session expired, please log in again"),
            ApiError::Forbidden => write!(f, "access denied"),
            ApiError::NotFound => write!(f, "resource not found"),
            ApiError::Validation(details) => write!(f, "validation error: {details}"),
            ApiError::Server(status) => {
                write!(f, "server error ({status}), please try again later")
            }
            ApiError::Status(status, msg) => write!(f, "HTTP {status}: {msg}"),
            ApiError::Connection(e) => write!(f, "cannot reach server: {e}"),
            ApiError::Decode(e) => write!(f, "unexpected response: {e}"),
            ApiError::Aborted(e) => write!(f, "request aborted: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}
