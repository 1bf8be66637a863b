// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::time::Duration;

use duration_str::deserialize_duration;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tonic::codegen::http;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tracing::{error, info};

use crate::errors::ConfigError;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct KeepaliveServerParameters {
    /// Frequency of the HTTP/2 keepalive ping.
    #[serde(default = "default_time", deserialize_with = "deserialize_duration")]
    pub time: Duration,

    /// How long the server waits for a keepalive ping ack.
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl Default for KeepaliveServerParameters {
    fn default() -> Self {
        Self {
            time: default_time(),
            timeout: default_timeout(),
        }
    }
}

fn default_time() -> Duration {
    Duration::from_secs(2 * 60)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

/// Certificate/key pair for a TLS endpoint. Endpoints without one are
/// served in the clear (the local PhalDB endpoint, tests).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TlsServerConfig {
    pub cert_file: String,
    pub key_file: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ServerConfig {
    /// Endpoint is the address to listen on.
    pub endpoint: String,

    /// Configures the endpoint to use TLS.
    #[serde(default)]
    pub tls: Option<TlsServerConfig>,

    /// MaxConcurrentStreams sets the limit on the number of concurrent
    /// streams per connection.
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: Option<u32>,

    /// Maximum HTTP/2 frame size in bytes.
    #[serde(default)]
    pub max_frame_size: Option<u32>,

    /// Maximum size (in MiB) of messages accepted by the services on this
    /// endpoint. Applied at the service wrappers.
    #[serde(default)]
    pub max_recv_msg_size: Option<u32>,

    /// Maximum size (in MiB) of messages sent by the services on this
    /// endpoint. Applied at the service wrappers.
    #[serde(default)]
    pub max_send_msg_size: Option<u32>,

    /// Keepalive anchor for all the settings related to keepalive.
    #[serde(default)]
    pub keepalive: KeepaliveServerParameters,
}

fn default_max_concurrent_streams() -> Option<u32> {
    Some(100)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            tls: None,
            max_concurrent_streams: default_max_concurrent_streams(),
            max_frame_size: None,
            max_recv_msg_size: None,
            max_send_msg_size: None,
            keepalive: KeepaliveServerParameters::default(),
        }
    }
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ServerConfig {{ endpoint: {}, tls: {}, max_concurrent_streams: {:?}, keepalive: {:?} }}",
            self.endpoint,
            self.tls.is_some(),
            self.max_concurrent_streams,
            self.keepalive,
        )
    }
}

impl ServerConfig {
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    /// Serve `svc` on this endpoint until the returned token is cancelled
    /// or the drain watch fires. The listening task holds the watch, so a
    /// drain completes only after the server has shut down.
    pub async fn run_server<S>(
        &self,
        svc: S,
        watch: drain::Watch,
    ) -> Result<CancellationToken, ConfigError>
    where
        S: tonic::codegen::Service<
                http::Request<tonic::body::Body>,
                Response = http::Response<tonic::body::Body>,
                Error = std::convert::Infallible,
            > + tonic::server::NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let addr: SocketAddr = self
            .endpoint
            .parse()
            .map_err(|_| ConfigError::InvalidEndpoint(self.endpoint.clone()))?;

        let mut builder = Server::builder()
            .max_concurrent_streams(self.max_concurrent_streams)
            .max_frame_size(self.max_frame_size)
            .http2_keepalive_interval(Some(self.keepalive.time))
            .http2_keepalive_timeout(Some(self.keepalive.timeout))
            .tcp_nodelay(true);

        if let Some(tls) = &self.tls {
            let cert = tokio::fs::read(&tls.cert_file).await?;
            let key = tokio::fs::read(&tls.key_file).await?;
            builder = builder
                .tls_config(
                    ServerTlsConfig::new().identity(Identity::from_pem(cert, key)),
                )
                .map_err(|err| ConfigError::Tls(err.to_string()))?;
        }

        let token = CancellationToken::new();
        let shutdown_token = token.clone();
        let endpoint = self.endpoint.clone();
        let router = builder.add_service(svc);

        tokio::spawn(async move {
            let shutdown = async {
                tokio::select! {
                    _ = shutdown_token.cancelled() => {}
                    _ = watch.signaled() => {}
                }
            };
            info!(%endpoint, "grpc server listening");
            if let Err(err) = router.serve_with_shutdown(addr, shutdown).await {
                error!(%endpoint, %err, "grpc server terminated with error");
            }
            info!(%endpoint, "grpc server stopped");
        });

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::with_endpoint("127.0.0.1:9339");
        assert_eq!(config.endpoint, "127.0.0.1:9339");
        assert_eq!(config.max_concurrent_streams, Some(100));
        assert!(config.tls.is_none());
        assert_eq!(config.keepalive.time, Duration::from_secs(120));
        assert_eq!(config.keepalive.timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_yaml_round_trip() {
        let yaml = r#"
endpoint: "0.0.0.0:9339"
max_recv_msg_size: 4
keepalive:
  time: 30s
  timeout: 5s
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.endpoint, "0.0.0.0:9339");
        assert_eq!(config.max_recv_msg_size, Some(4));
        assert_eq!(config.keepalive.time, Duration::from_secs(30));
        assert_eq!(config.keepalive.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_display_does_not_leak_tls_paths() {
        let mut config = ServerConfig::with_endpoint("0.0.0.0:9339");
        config.tls = Some(TlsServerConfig {
            cert_file: "/etc/gneiss/tls.crt".to_string(),
            key_file: "/etc/gneiss/tls.key".to_string(),
        });
        let rendered = format!("{}", config);
        assert!(rendered.contains("tls: true"));
        assert!(!rendered.contains("tls.key"));
    }
}
