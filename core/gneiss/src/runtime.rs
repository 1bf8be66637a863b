// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use duration_str::deserialize_duration;
use serde::{Deserialize, Serialize};
use std::time;
use tokio::runtime::{Builder, Runtime};
use tracing::warn;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RuntimeConfig {
    /// the number of cores to use for this runtime; 0 means all available
    #[serde(default = "default_n_cores")]
    n_cores: usize,

    /// the thread name for the runtime
    #[serde(default = "default_thread_name")]
    thread_name: String,

    /// the timeout for draining the servers on shutdown
    #[serde(
        default = "default_drain_timeout",
        deserialize_with = "deserialize_duration"
    )]
    drain_timeout: time::Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            n_cores: default_n_cores(),
            thread_name: default_thread_name(),
            drain_timeout: default_drain_timeout(),
        }
    }
}

fn default_n_cores() -> usize {
    0
}

fn default_thread_name() -> String {
    "gneiss".to_string()
}

fn default_drain_timeout() -> time::Duration {
    time::Duration::from_secs(10)
}

impl RuntimeConfig {
    pub fn n_cores(&self) -> usize {
        self.n_cores
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn drain_timeout(&self) -> time::Duration {
        self.drain_timeout
    }
}

pub struct GneissRuntime {
    pub config: RuntimeConfig,
    pub runtime: Runtime,
}

pub fn build(config: &RuntimeConfig) -> anyhow::Result<GneissRuntime> {
    let n_cpu = num_cpus::get();

    let cores = if config.n_cores > n_cpu {
        warn!(
            requested = config.n_cores,
            available = n_cpu,
            "requested more cores than available, using all"
        );
        n_cpu
    } else if config.n_cores == 0 {
        n_cpu
    } else {
        config.n_cores
    };

    let runtime = match cores {
        1 => Builder::new_current_thread()
            .enable_all()
            .thread_name(config.thread_name.as_str())
            .build()?,
        _ => Builder::new_multi_thread()
            .enable_all()
            .thread_name(config.thread_name.as_str())
            .worker_threads(cores)
            .build()?,
    };

    Ok(GneissRuntime {
        config: config.clone(),
        runtime,
    })
}
