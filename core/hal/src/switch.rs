// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::channel::ChannelWriter;
use crate::data::{DataRequest, DataResponse};
use crate::errors::SwitchError;
use crate::event::GnmiEvent;

/// Sink for values produced by `retrieve_value`. The backend invokes the
/// writer synchronously before returning; a `false` return tells the backend
/// the consumer is gone.
pub trait ValueWriter: Send {
    fn write(&mut self, resp: DataResponse) -> bool;
}

/// The switch backend consumed by the management plane. Implementations are
/// internally thread-safe for their own method set.
#[async_trait]
pub trait SwitchInterface: Send + Sync {
    /// Retrieve the current value selected by `request` on `node_id`,
    /// delivering it through `writer`.
    async fn retrieve_value(
        &self,
        node_id: u64,
        request: DataRequest,
        writer: &mut dyn ValueWriter,
    ) -> Result<(), SwitchError>;

    /// Hand the backend the writer end of the event notification channel.
    async fn register_event_notify_writer(
        &self,
        writer: ChannelWriter<GnmiEvent>,
    ) -> Result<(), SwitchError>;

    /// Detach the previously registered event writer.
    async fn unregister_event_notify_writer(&self) -> Result<(), SwitchError>;
}

/// A `ValueWriter` that keeps the last response, for one-shot retrievals.
#[derive(Default)]
pub struct CaptureWriter {
    resp: Option<DataResponse>,
}

impl CaptureWriter {
    pub fn into_inner(self) -> Option<DataResponse> {
        self.resp
    }
}

impl ValueWriter for CaptureWriter {
    fn write(&mut self, resp: DataResponse) -> bool {
        self.resp = Some(resp);
        true
    }
}
