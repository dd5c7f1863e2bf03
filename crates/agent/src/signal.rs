//! Signals from a running turn to the event translator.
//!
//! The loop reports model deltas, tool frames and its terminal state over a
//! single unbounded channel, so the translator sees them in the order they
//! happened.

use librarian_core::progress::{FrameSink, ToolFrame};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum LoopSignal {
    /// A text delta from the model response in progress.
    LlmDelta(String),
    /// The model response in progress is complete.
    LlmFinished,
    /// A frame from the executing tool.
    Tool(ToolFrame),
    /// The loop reached `End`.
    End,
    /// The loop reached `Fatal`.
    Fatal(String),
}

/// Sending half of the signal channel. Also the tools' frame sink.
#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: mpsc::UnboundedSender<LoopSignal>,
}

impl SignalSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LoopSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false once the translator has gone away.
    pub fn send(&self, signal: LoopSignal) -> bool {
        self.tx.send(signal).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the translator has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

impl FrameSink for SignalSink {
    fn deliver(&self, frame: ToolFrame) {
        // A closed channel means the consumer left; the loop notices on its own.
        let _ = self.tx.send(LoopSignal::Tool(frame));
    }
}
