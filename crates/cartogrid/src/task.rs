//! Running a computation on a worker thread.

use crate::options::CartogramOptions;
use crate::pipeline::{CartogramOutput, CartogramRequest, compute_cartogram};
use crate::{Error, Result};
use cartogrid_core::{Cancellation, StatusSink};
use crossbeam_channel::{Receiver, Sender};
use std::thread::{self, JoinHandle};

/// Status notifications forwarded from the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Progress {
        progress: u16,
        phase: String,
        detail: String,
    },
    Error {
        title: String,
        message: String,
        detail: String,
    },
}

/// A [`StatusSink`] that forwards every notification over an unbounded channel.
///
/// Sending never blocks; notifications are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    sender: Sender<StatusEvent>,
    cancellation: Cancellation,
}

impl ChannelStatus {
    pub fn new(sender: Sender<StatusEvent>, cancellation: Cancellation) -> Self {
        Self {
            sender,
            cancellation,
        }
    }
}

impl StatusSink for ChannelStatus {
    fn on_progress(&self, progress: u16, phase: &str, detail: &str) {
        let _ = self.sender.send(StatusEvent::Progress {
            progress,
            phase: phase.to_string(),
            detail: detail.to_string(),
        });
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    fn on_error(&self, title: &str, message: &str, detail: &str) {
        let _ = self.sender.send(StatusEvent::Error {
            title: title.to_string(),
            message: message.to_string(),
            detail: detail.to_string(),
        });
    }
}

/// A cartogram computation running on its own thread.
pub struct CartogramTask {
    handle: JoinHandle<Result<CartogramOutput>>,
    events: Receiver<StatusEvent>,
    cancellation: Cancellation,
}

impl CartogramTask {
    pub fn spawn(request: CartogramRequest, options: CartogramOptions) -> Result<Self> {
        let (sender, events) = crossbeam_channel::unbounded();
        let cancellation = Cancellation::new();
        let status = ChannelStatus::new(sender, cancellation.clone());
        let handle = thread::Builder::new()
            .name("cartogram".to_string())
            .spawn(move || compute_cartogram(&request, &options, &status))
            .map_err(Error::Spawn)?;
        Ok(Self {
            handle,
            events,
            cancellation,
        })
    }

    /// Asks the worker to stop at its next poll point.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn events(&self) -> &Receiver<StatusEvent> {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker and returns its result.
    pub fn join(self) -> Result<CartogramOutput> {
        self.handle.join().map_err(|_| Error::WorkerPanicked)?
    }
}
