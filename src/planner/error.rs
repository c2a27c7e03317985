use crate::api::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    Api(ApiError),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for PlannerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlannerError::Api(e) => write!(f, "backend error: {e}"),
            PlannerError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlannerError::Api(e) => Some(e),
            PlannerError::LimitExceeded(_) => None,
        }
    }
}

impl From<ApiError> for PlannerError {
    fn from(e: ApiError) -> Self {
        PlannerError::Api(e)
    }
}
