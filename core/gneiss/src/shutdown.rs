// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Coordinated teardown for the daemon. Both gRPC endpoints share one drain
// pair: each server task holds a watch clone and a cancellation token. A
// single drain call stops the listeners, releases this side's watch, and
// bounds the wait for in-flight streams.

use std::time::Duration;

use anyhow::bail;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct ShutdownCoordinator {
    signal: drain::Signal,
    watch: drain::Watch,
    server_tokens: Vec<CancellationToken>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (signal, watch) = drain::channel();
        Self {
            signal,
            watch,
            server_tokens: Vec::new(),
        }
    }

    /// Watch handed to a server task; the drain completes only after every
    /// clone has been released.
    pub fn watch(&self) -> drain::Watch {
        self.watch.clone()
    }

    /// Track a server's cancellation token so `drain` can stop it.
    pub fn register_server(&mut self, token: CancellationToken) {
        self.server_tokens.push(token);
    }

    /// Stop every registered server and wait for them to finish, up to
    /// `timeout`.
    pub async fn drain(self, timeout: Duration) -> anyhow::Result<()> {
        let ShutdownCoordinator {
            signal,
            watch,
            server_tokens,
        } = self;

        for token in &server_tokens {
            token.cancel();
        }
        drop(watch);

        match tokio::time::timeout(timeout, signal.drain()).await {
            Ok(()) => {
                info!("all servers drained");
                Ok(())
            }
            Err(_) => bail!("server shutdown timed out after {:?}", timeout),
        }
    }
}

/// Block until the process is asked to stop. SIGTERM comes from the process
/// supervisor; SIGINT covers interactive runs.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut interrupt =
        signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = terminate.recv() => info!("received SIGTERM, shutting down"),
        _ = interrupt.recv() => info!("received SIGINT, shutting down"),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl-C handler");
    info!("received Ctrl-C, shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_completes_with_no_outstanding_watches() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.drain(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_times_out_while_a_watch_is_held() {
        let coordinator = ShutdownCoordinator::new();
        let held = coordinator.watch();

        let err = coordinator.drain(Duration::from_millis(50)).await;
        assert!(err.is_err());
        drop(held);
    }

    #[tokio::test]
    async fn test_drain_cancels_registered_servers() {
        let mut coordinator = ShutdownCoordinator::new();
        let token = CancellationToken::new();
        coordinator.register_server(token.clone());

        // A server task: runs until its token fires, then releases its watch.
        let watch = coordinator.watch();
        tokio::spawn(async move {
            token.cancelled().await;
            drop(watch);
        });

        coordinator.drain(Duration::from_secs(5)).await.unwrap();
    }
}
