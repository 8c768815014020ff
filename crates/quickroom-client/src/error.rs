use thiserror::Error;

use crate::media::screen::ScreenShareError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Could not obtain a join token: {0}")]
    Token(String),

    #[error("Could not connect to room: {0}")]
    Connect(#[source] TransportError),

    #[error("A room session is already active")]
    AlreadyJoined,

    #[error("Not joined to a room")]
    NotJoined,

    #[error("Could not get stream: {0}")]
    ScreenShare(#[from] ScreenShareError),

    #[error("Failed to stop screen share: {0}")]
    ScreenShareTeardown(#[source] TransportError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
