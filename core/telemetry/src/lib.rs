// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod auth;
pub mod errors;
pub mod node;
pub mod paths;
pub mod publisher;
pub mod registry;
pub mod schema;
pub mod service;
pub mod subscription;
pub mod timer;
pub mod tree;
pub mod values;

pub use tonic::Status;
