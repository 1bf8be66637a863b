// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use gneiss_hal::errors::{ChannelError, SwitchError};
use thiserror::Error;

/// Errors crossing the telemetry core boundary.
#[derive(Error, Debug)]
pub enum TelemetryError {
    // Caller-supplied inputs
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Internal failures: stream writes, missing internals, spawn failures
    #[error("internal error: {0}")]
    Internal(String),

    // Normal teardown of the event channel
    #[error("cancelled")]
    Cancelled,

    // Never expected under infinite-timeout reads
    #[error("entry not found: {0}")]
    NotFound(String),

    // Auth policy rejection
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    // Backend failures surface as-is
    #[error(transparent)]
    Switch(#[from] SwitchError),
}

impl From<ChannelError> for TelemetryError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Cancelled => TelemetryError::Cancelled,
            ChannelError::Closed => {
                TelemetryError::Internal("channel is closed".to_string())
            }
        }
    }
}

impl From<TelemetryError> for tonic::Status {
    fn from(err: TelemetryError) -> Self {
        match err {
            TelemetryError::InvalidArgument(msg) => {
                tonic::Status::invalid_argument(msg)
            }
            TelemetryError::Internal(msg) => tonic::Status::internal(msg),
            TelemetryError::Cancelled => tonic::Status::cancelled("cancelled"),
            TelemetryError::NotFound(msg) => tonic::Status::not_found(msg),
            TelemetryError::PermissionDenied(msg) => {
                tonic::Status::permission_denied(msg)
            }
            TelemetryError::Switch(err) => tonic::Status::internal(err.to_string()),
        }
    }
}
