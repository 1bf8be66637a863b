// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwitchError {
    // Data retrieval
    #[error("unsupported data request: {0}")]
    UnsupportedRequest(String),
    #[error("backend internal error: {0}")]
    Internal(String),

    // Event writer lifecycle
    #[error("event writer already registered")]
    WriterAlreadyRegistered,
    #[error("no event writer registered")]
    WriterNotRegistered,

    // Channel
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,
    #[error("read cancelled: channel closed")]
    Cancelled,
}
