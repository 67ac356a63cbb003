use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jam_collab::CollabError;
use jam_core::{ProviderError, QueueError};
use log::error;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServerError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("No active device, pick a device first")]
    DeviceNotActive,
    #[error("Streaming provider failed: {0}")]
    Provider(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::DeviceNotActive => StatusCode::PRECONDITION_REQUIRED,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<CollabError> for ServerError {
    fn from(value: CollabError) -> Self {
        let message = value.to_string();

        match value {
            CollabError::NotFound(_) | CollabError::SessionClosed(_) => Self::NotFound(message),
            CollabError::AlreadyMember(_) => Self::Conflict(message),
            CollabError::NotAMember(_)
            | CollabError::ReservedIdentity(_)
            | CollabError::PermissionDenied => Self::Forbidden(message),
            CollabError::Queue(e) => e.into(),
            CollabError::Provider(e) => e.into(),
            CollabError::LabelExhaustion { .. } => {
                error!("{}", message);
                Self::Unknown(message)
            }
        }
    }
}

impl From<QueueError> for ServerError {
    fn from(value: QueueError) -> Self {
        let message = value.to_string();

        match value {
            QueueError::NotFound(_) => Self::NotFound(message),
            QueueError::Empty => Self::Conflict(message),
            QueueError::MalformedPayload(_) => Self::BadRequest(message),
        }
    }
}

impl From<ProviderError> for ServerError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::DeviceNotActive => Self::DeviceNotActive,
            ProviderError::NotFound { .. } => Self::NotFound(value.to_string()),
            e => Self::Provider(e.to_string()),
        }
    }
}
