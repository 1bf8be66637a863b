// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Per-subscription primitives: the clonable write handle over a client
// stream, the handler record owned by the publisher, and the periodic
// frequency descriptor.

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tonic::Status;

use gneiss_hal::event::GnmiEvent;
use gneiss_proto::api::gnmi::SubscribeResponse;

use crate::errors::TelemetryError;
use crate::timer::TimerToken;

/// First fire after `delay_ms`, then every `period_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    pub delay_ms: u64,
    pub period_ms: u64,
}

/// Write handle over one client's response stream. Clones share the same
/// underlying channel; the receiving half feeds the gRPC response stream.
#[derive(Clone)]
pub struct GnmiSubscribeStream {
    tx: mpsc::Sender<Result<SubscribeResponse, Status>>,
}

impl GnmiSubscribeStream {
    pub fn new(tx: mpsc::Sender<Result<SubscribeResponse, Status>>) -> Self {
        Self { tx }
    }

    /// Create a stream together with its receiving half. The service layer
    /// turns the receiver into the gRPC response stream; tests drain it
    /// directly.
    pub fn channel(
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Result<SubscribeResponse, Status>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// A stream whose receiver is already gone. Used for process-owned
    /// handler records that never write.
    pub fn sink() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self::new(tx)
    }

    pub async fn write(&self, resp: SubscribeResponse) -> Result<(), TelemetryError> {
        self.tx.send(Ok(resp)).await.map_err(|_| {
            TelemetryError::Internal("writing to client stream failed".to_string())
        })
    }

    /// Forward a terminal status to the client.
    pub async fn write_error(&self, status: Status) -> Result<(), TelemetryError> {
        self.tx.send(Err(status)).await.map_err(|_| {
            TelemetryError::Internal("writing to client stream failed".to_string())
        })
    }
}

/// A handler bound to one (event, stream) pair. Handlers filter events they
/// are not responsible for and return Ok without writing.
pub type GnmiHandler = Arc<
    dyn Fn(GnmiEvent, GnmiSubscribeStream) -> BoxFuture<'static, Result<(), TelemetryError>>
        + Send
        + Sync,
>;

/// One live subscription: the bound handler, the client stream it writes to,
/// and the periodic timer token when sampling. The publisher owns the strong
/// reference; registries hold weak ones, so dropping the record is enough to
/// retire the subscription.
pub struct EventHandlerRecord {
    handler: GnmiHandler,
    stream: GnmiSubscribeStream,
    timer: Mutex<Option<TimerToken>>,
}

impl std::fmt::Debug for EventHandlerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlerRecord").finish_non_exhaustive()
    }
}

impl EventHandlerRecord {
    pub fn new(handler: GnmiHandler, stream: GnmiSubscribeStream) -> Self {
        Self {
            handler,
            stream,
            timer: Mutex::new(None),
        }
    }

    pub async fn handle(&self, event: &GnmiEvent) -> Result<(), TelemetryError> {
        (self.handler)(event.clone(), self.stream.clone()).await
    }

    pub fn set_timer(&self, token: TimerToken) {
        *self.timer.lock() = Some(token);
    }

    /// Cancel and drop the periodic timer, if any.
    pub fn cancel_timer(&self) {
        if let Some(token) = self.timer.lock().take() {
            token.cancel();
        }
    }
}

impl Drop for EventHandlerRecord {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

pub type SubscriptionHandle = Arc<EventHandlerRecord>;
