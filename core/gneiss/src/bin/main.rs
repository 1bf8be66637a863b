// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use gneiss::args;
use gneiss::config::{self, GneissConfig};
use gneiss::runtime;
use gneiss::shutdown::{self, ShutdownCoordinator};
use gneiss_hal::mock::MockSwitch;
use gneiss_hal::switch::SwitchInterface;
use gneiss_phaldb::memory::MemoryAttributeDatabase;
use gneiss_phaldb::service::PhalDbService;
use gneiss_proto::api::gnmi::gnmi_server::GnmiServer;
use gneiss_proto::api::phaldb::phal_db_server::PhalDbServer;
use gneiss_telemetry::publisher::GnmiPublisher;
use gneiss_telemetry::service::GnmiService;
use gneiss_telemetry::timer::TimerDaemon;

fn main() -> Result<()> {
    let args = args::Args::parse();

    if args.version() {
        println!("gneiss {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = match args.config() {
        Some(path) => config::load_config(path)?,
        None => GneissConfig::default(),
    };

    let runtime = runtime::build(&config.runtime).context("failed to build runtime")?;
    let drain_timeout = config.runtime.drain_timeout();

    runtime.runtime.block_on(async move {
        config.logging.init();
        info!(version = env!("CARGO_PKG_VERSION"), "starting gneiss");
        if args.warmboot() {
            // The telemetry core is stateless; warm boot only matters to the
            // backend, which reattaches on its own.
            info!("warm-boot initialization requested");
        }

        let mut coordinator = ShutdownCoordinator::new();

        // Until a vendor SDK backend is linked in, the daemon serves the
        // scripted backend: the full management surface with empty data.
        let switch: Arc<dyn SwitchInterface> = Arc::new(MockSwitch::new());
        let timer_daemon = Arc::new(TimerDaemon::new());
        let publisher = GnmiPublisher::new(switch, timer_daemon);
        publisher
            .register_event_writer()
            .await
            .context("failed to register event writer")?;

        // External gNMI endpoint.
        let mut gnmi_service = GnmiServer::new(GnmiService::new(publisher.clone()));
        if let Some(mib) = config.gnmi.max_recv_msg_size {
            gnmi_service =
                gnmi_service.max_decoding_message_size(mib as usize * 1024 * 1024);
        }
        if let Some(mib) = config.gnmi.max_send_msg_size {
            gnmi_service =
                gnmi_service.max_encoding_message_size(mib as usize * 1024 * 1024);
        }
        let gnmi_token = config
            .gnmi
            .run_server(gnmi_service, coordinator.watch())
            .await
            .context("failed to start gnmi server")?;
        coordinator.register_server(gnmi_token);

        // Local PhalDB endpoint.
        let db = Arc::new(MemoryAttributeDatabase::new());
        let phaldb = Arc::new(PhalDbService::new(db));
        let phaldb_token = config
            .phaldb
            .run_server(PhalDbServer::from_arc(phaldb.clone()), coordinator.watch())
            .await
            .context("failed to start phaldb server")?;
        coordinator.register_server(phaldb_token);

        shutdown::wait_for_signal().await;

        publisher
            .unregister_event_writer()
            .await
            .context("failed to unregister event writer")?;
        phaldb.teardown();
        coordinator.drain(drain_timeout).await
    })
}
