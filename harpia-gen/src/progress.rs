//! Progress channel between the generation worker and the foreground loop
//!
//! One producer (the worker), one consumer (the polling loop). Messages keep
//! their order, the producer never blocks, and the consumer drains whatever
//! has arrived without waiting.

use harpia_common::Observation;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::debug;

/// Message sent from the worker to the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// Narration of one step (attempt result, phase change)
    Status(String),
    /// Terminal: the run failed and produced nothing
    Error(String),
    /// Terminal: accepted candidates as `GeneratedCandidate` observations,
    /// best score first (may be empty)
    Done(Vec<Observation>),
}

impl GenerationEvent {
    /// `Error` and `Done` end a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationEvent::Error(_) | GenerationEvent::Done(_))
    }
}

/// Create a connected sender/receiver pair
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, ProgressReceiver { rx, closed: false })
}

/// Producer half, owned by the worker
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<GenerationEvent>,
}

impl ProgressSender {
    /// Enqueue an event
    ///
    /// Returns false if the consumer has gone away; the run keeps going
    /// since its result is also returned to the caller.
    pub fn send(&self, event: GenerationEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(e) => {
                debug!("Progress consumer dropped, event discarded: {:?}", e.0);
                false
            }
        }
    }

    pub fn status(&self, text: impl Into<String>) -> bool {
        self.send(GenerationEvent::Status(text.into()))
    }
}

/// Consumer half, polled by the foreground loop
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<GenerationEvent>,
    closed: bool,
}

impl ProgressReceiver {
    /// Take every event that is available right now, never waiting
    pub fn drain(&mut self) -> Vec<GenerationEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        events
    }

    /// Every sender is gone and the queue has been drained
    ///
    /// A consumer that sees this without having received a terminal event
    /// must treat the run as failed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait until the terminal event, returning everything received
    ///
    /// Stops early if the channel closes first.
    pub async fn collect_until_terminal(&mut self) -> Vec<GenerationEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                return events;
            }
        }
        self.closed = true;
        events
    }
}
