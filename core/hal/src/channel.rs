// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Bounded in-process channel used between the switch backend and the
// telemetry event reader, and between the attribute database and the
// per-client subscribe bridge. When the queue is full the oldest entry is
// dropped: telemetry is lossy by design, and a stalled reader must never
// back-pressure the data path.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use crate::errors::ChannelError;

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    capacity: usize,
}

pub struct Channel<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Channel<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "channel capacity must be non-zero");
        Channel {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue: VecDeque::with_capacity(capacity),
                    closed: false,
                }),
                notify: Notify::new(),
                capacity,
            }),
        }
    }

    pub fn writer(&self) -> ChannelWriter<T> {
        ChannelWriter {
            inner: self.inner.clone(),
        }
    }

    pub fn reader(&self) -> ChannelReader<T> {
        ChannelReader {
            inner: self.inner.clone(),
        }
    }

    /// Close the channel. Pending entries stay readable; once drained,
    /// readers observe `Cancelled` and writers observe `Closed`.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        drop(state);
        self.inner.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ChannelWriter<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ChannelWriter<T> {
    fn clone(&self) -> Self {
        ChannelWriter {
            inner: self.inner.clone(),
        }
    }
}

impl<T> ChannelWriter<T> {
    pub fn write(&self, item: T) -> Result<(), ChannelError> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(ChannelError::Closed);
        }
        if state.queue.len() == self.inner.capacity {
            state.queue.pop_front();
            warn!(
                capacity = self.inner.capacity,
                "channel full, dropping oldest entry"
            );
        }
        state.queue.push_back(item);
        drop(state);
        self.inner.notify.notify_one();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }
}

pub struct ChannelReader<T> {
    inner: Arc<Inner<T>>,
}

impl<T> ChannelReader<T> {
    /// Block until an entry is available. Returns `Cancelled` once the
    /// channel is closed and drained.
    pub async fn read(&self) -> Result<T, ChannelError> {
        loop {
            {
                let mut state = self.inner.state.lock();
                if let Some(item) = state.queue.pop_front() {
                    return Ok(item);
                }
                if state.closed {
                    return Err(ChannelError::Cancelled);
                }
            }
            self.inner.notify.notified().await;
        }
    }
}
