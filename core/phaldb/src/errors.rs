// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhalDbError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<PhalDbError> for tonic::Status {
    fn from(err: PhalDbError) -> Self {
        match err {
            PhalDbError::InvalidArgument(msg) => tonic::Status::invalid_argument(msg),
            PhalDbError::Internal(msg) => tonic::Status::internal(msg),
            PhalDbError::Database(msg) => tonic::Status::internal(msg),
        }
    }
}
