//! Deferred work queue.
//!
//! Event handlers only enqueue; everything that changes service state or emits a
//! value runs when the queue is drained, one task at a time, in enqueue order.

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, TrySendError};

use crate::ble::transport::TimerId;
use crate::uds::control_point::Procedure;
use crate::uds::error::ResultCode;

pub const QUEUE_DEPTH: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Task {
    /// A measurement timer fired at `now_ms`
    Measure { timer: TimerId, now_ms: u64 },
    /// Run a User Control Point procedure
    Procedure(Procedure),
    /// Answer a malformed request for a known op code
    Reject { opcode: u8, result: ResultCode },
}

pub struct TaskQueue {
    channel: Channel<NoopRawMutex, Task, QUEUE_DEPTH>,
}

impl TaskQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue `task`; hands it back when the queue is full.
    pub fn schedule(&self, task: Task) -> Result<(), Task> {
        self.channel.try_send(task).map_err(|TrySendError::Full(task)| task)
    }

    pub fn try_next(&self) -> Option<Task> {
        self.channel.try_receive().ok()
    }

    /// Wait for the next task.
    pub async fn next(&self) -> Task {
        self.channel.receive().await
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
