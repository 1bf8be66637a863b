// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod adapter;
pub mod errors;
pub mod memory;
pub mod service;
