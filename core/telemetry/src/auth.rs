// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Per-RPC authorization seam. The checker sees the method name and the peer
// identity; rejection surfaces to the client as PermissionDenied.

use std::collections::HashSet;

use crate::errors::TelemetryError;

pub trait AuthPolicyChecker: Send + Sync {
    fn authorize(&self, rpc: &str, peer: Option<&str>) -> Result<(), TelemetryError>;
}

/// The default policy: every caller is admitted.
#[derive(Debug, Default)]
pub struct AllowAllPolicy;

impl AuthPolicyChecker for AllowAllPolicy {
    fn authorize(&self, _rpc: &str, _peer: Option<&str>) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Rejects a fixed set of method names regardless of peer.
#[derive(Debug, Default)]
pub struct StaticDenyPolicy {
    denied: HashSet<String>,
}

impl StaticDenyPolicy {
    pub fn new(denied: impl IntoIterator<Item = String>) -> Self {
        Self {
            denied: denied.into_iter().collect(),
        }
    }
}

impl AuthPolicyChecker for StaticDenyPolicy {
    fn authorize(&self, rpc: &str, peer: Option<&str>) -> Result<(), TelemetryError> {
        if self.denied.contains(rpc) {
            return Err(TelemetryError::PermissionDenied(format!(
                "rpc {} denied for peer {}",
                rpc,
                peer.unwrap_or("unknown")
            )));
        }
        Ok(())
    }
}
