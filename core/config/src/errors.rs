// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),

    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("tls configuration error: {0}")]
    Tls(String),
}
