use std::sync::Arc;

use cecbridge::CecError;
use hyper::StatusCode;
use thiserror::Error;

#[derive(Clone, Debug, serde::Serialize, Error)]
#[serde(tag = "type", content = "detail")]
pub enum Error {
    #[error("couldn't parse parameter named {name}: {error}")]
    ParameterError { name: String, error: String },

    #[error("the request could not be parsed: {0}")]
    ParseError(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("no report received from the bus: {0}")]
    Timeout(String),

    #[error("the bus adapter failed: {0}")]
    BusError(String),

    #[error("the operation was cancelled")]
    Cancelled,

    #[error(transparent)]
    #[serde(serialize_with = "ser_to_string")]
    InternalError(#[from] Arc<anyhow::Error>),
}

fn ser_to_string<S, T>(t: &T, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: ToString,
{
    s.serialize_str(t.to_string().as_str())
}

impl Error {
    pub fn parameter_error<E: ToString>(name: &str, error: E) -> Self {
        Error::ParameterError {
            name: name.to_string(),
            error: error.to_string(),
        }
    }

    pub fn parameter_missing(name: &str) -> Self {
        Error::ParameterError {
            name: name.to_string(),
            error: "parameter is missing".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::ParameterError { .. } | Error::ParseError(_) | Error::InvalidTarget(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::BusError(_) => StatusCode::BAD_GATEWAY,
            Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Error::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Self::from(Arc::new(e))
    }
}

impl From<hyper::http::Error> for Error {
    fn from(e: hyper::http::Error) -> Self {
        Self::from(anyhow::Error::from(e))
    }
}

impl From<CecError> for Error {
    fn from(e: CecError) -> Self {
        match e {
            CecError::InvalidTarget(msg) => Error::InvalidTarget(msg),
            CecError::ParseError(_) => Error::InvalidTarget(e.to_string()),
            CecError::Timeout { .. } => Error::Timeout(e.to_string()),
            CecError::TransportFailure(_) | CecError::TransportClosed | CecError::IOError(_) => {
                Error::BusError(e.to_string())
            }
            CecError::Cancelled => Error::Cancelled,
            CecError::InternalError(e) => Error::from(e),
        }
    }
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct FormattedError {
    message: String,
    error: Error,
}

impl FormattedError {
    pub fn status(&self) -> StatusCode {
        self.error.status()
    }
}

impl std::fmt::Display for FormattedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Error as std::fmt::Display>::fmt(&self.error, f)
    }
}

impl std::error::Error for FormattedError {}

impl From<Error> for FormattedError {
    fn from(error: Error) -> Self {
        Self {
            message: error.to_string(),
            error,
        }
    }
}

impl From<FormattedError> for Error {
    fn from(e: FormattedError) -> Self {
        e.error
    }
}
