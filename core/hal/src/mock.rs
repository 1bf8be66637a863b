// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Scripted backend used by the test suites and, until a vendor SDK backend
// is linked in, by the daemon as a stand-in. Responses are queued ahead of
// time and handed out one per retrieval, with every request recorded.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::channel::ChannelWriter;
use crate::data::{DataRequest, DataResponse};
use crate::errors::SwitchError;
use crate::event::GnmiEvent;
use crate::switch::{SwitchInterface, ValueWriter};

#[derive(Default)]
pub struct MockSwitch {
    responses: Mutex<VecDeque<DataResponse>>,
    requests: Mutex<Vec<(u64, DataRequest)>>,
    event_writer: Mutex<Option<ChannelWriter<GnmiEvent>>>,
}

impl MockSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response handed out by the next `retrieve_value` call.
    pub fn push_response(&self, resp: DataResponse) {
        self.responses.lock().push_back(resp);
    }

    /// All `(node_id, request)` pairs seen so far, in call order.
    pub fn requests(&self) -> Vec<(u64, DataRequest)> {
        self.requests.lock().clone()
    }

    pub fn has_event_writer(&self) -> bool {
        self.event_writer.lock().is_some()
    }

    /// Emit an event on the registered notification channel, as the real
    /// backend would.
    pub fn send_event(&self, event: GnmiEvent) -> Result<(), SwitchError> {
        let guard = self.event_writer.lock();
        let writer = guard.as_ref().ok_or(SwitchError::WriterNotRegistered)?;
        writer.write(event).map_err(SwitchError::from)
    }
}

#[async_trait]
impl SwitchInterface for MockSwitch {
    async fn retrieve_value(
        &self,
        node_id: u64,
        request: DataRequest,
        writer: &mut dyn ValueWriter,
    ) -> Result<(), SwitchError> {
        self.requests.lock().push((node_id, request));
        if let Some(resp) = self.responses.lock().pop_front() {
            writer.write(resp);
        }
        Ok(())
    }

    async fn register_event_notify_writer(
        &self,
        writer: ChannelWriter<GnmiEvent>,
    ) -> Result<(), SwitchError> {
        *self.event_writer.lock() = Some(writer);
        Ok(())
    }

    async fn unregister_event_notify_writer(&self) -> Result<(), SwitchError> {
        self.event_writer
            .lock()
            .take()
            .map(|_| ())
            .ok_or(SwitchError::WriterNotRegistered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PortState;
    use crate::switch::CaptureWriter;

    #[tokio::test]
    async fn test_scripted_responses_and_recorded_requests() {
        let switch = MockSwitch::new();
        switch.push_response(DataResponse::OperStatus(PortState::Up));

        let mut writer = CaptureWriter::default();
        let req = DataRequest::OperStatus {
            node_id: 1,
            port_id: 2,
        };
        switch.retrieve_value(1, req.clone(), &mut writer).await.unwrap();

        assert_eq!(
            writer.into_inner(),
            Some(DataResponse::OperStatus(PortState::Up))
        );
        assert_eq!(switch.requests(), vec![(1, req)]);

        // Queue exhausted: next retrieval writes nothing.
        let mut writer = CaptureWriter::default();
        switch
            .retrieve_value(
                1,
                DataRequest::PortCounters {
                    node_id: 1,
                    port_id: 2,
                },
                &mut writer,
            )
            .await
            .unwrap();
        assert!(writer.into_inner().is_none());
    }

    #[tokio::test]
    async fn test_event_writer_lifecycle() {
        let switch = MockSwitch::new();
        assert!(matches!(
            switch.send_event(GnmiEvent::Timer),
            Err(SwitchError::WriterNotRegistered)
        ));

        let channel = crate::channel::Channel::new(4);
        switch
            .register_event_notify_writer(channel.writer())
            .await
            .unwrap();
        assert!(switch.has_event_writer());

        switch.send_event(GnmiEvent::Timer).unwrap();
        assert_eq!(channel.len(), 1);

        switch.unregister_event_notify_writer().await.unwrap();
        assert!(!switch.has_event_writer());
        assert!(matches!(
            switch.unregister_event_notify_writer().await,
            Err(SwitchError::WriterNotRegistered)
        ));
    }
}
