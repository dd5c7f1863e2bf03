//! Event translator.
//!
//! Turns the ordered [`LoopSignal`]s of one turn into the `stream.*` event
//! sequence. Phase rules:
//!
//! ```text
//! stream.start
//!   (llm_tokens.start llm_tokens.delta+ llm_tokens.completed
//!    | tool_call.start tool_call.delta* tool_call.completed)*
//! stream.completed | stream.error
//! ```
//!
//! A tool frame arriving while a text phase is open closes that phase first.
//! After a terminal event every further signal is ignored.

use librarian_core::message::ThreadId;
use librarian_core::model::ModelConfig;
use librarian_core::progress::{FrameKind, ToolFrame};

use crate::signal::LoopSignal;
use crate::stream_event::{StreamEvent, StreamEventKind};

pub struct EventTranslator {
    thread_id: ThreadId,
    llm_config: ModelConfig,
    started: bool,
    /// Text of the open LLM phase, `None` when no phase is open.
    llm_buffer: Option<String>,
    terminated: bool,
}

impl EventTranslator {
    pub fn new(thread_id: ThreadId, llm_config: ModelConfig) -> Self {
        Self {
            thread_id,
            llm_config,
            started: false,
            llm_buffer: None,
            terminated: false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Translate one signal into zero or more events.
    pub fn translate(&mut self, signal: LoopSignal) -> Vec<StreamEvent> {
        if self.terminated {
            return Vec::new();
        }

        let mut kinds = Vec::new();
        match signal {
            LoopSignal::LlmDelta(delta) => {
                self.ensure_started(&mut kinds);
                let buffer = self.llm_buffer.get_or_insert_with(|| {
                    kinds.push(StreamEventKind::LlmTokensStart);
                    String::new()
                });
                buffer.push_str(&delta);
                kinds.push(StreamEventKind::LlmTokensDelta { llm_tokens: delta });
            }
            LoopSignal::LlmFinished => {
                self.ensure_started(&mut kinds);
                self.close_llm_phase(&mut kinds);
            }
            LoopSignal::Tool(frame) => {
                self.ensure_started(&mut kinds);
                self.close_llm_phase(&mut kinds);
                kinds.push(tool_event(frame));
            }
            LoopSignal::End => {
                self.close_llm_phase(&mut kinds);
                if self.started {
                    kinds.push(StreamEventKind::Completed);
                }
                self.terminated = true;
            }
            LoopSignal::Fatal(error) => {
                // The open text phase is abandoned, not flushed.
                self.llm_buffer = None;
                kinds.push(StreamEventKind::Error { error });
                self.terminated = true;
            }
        }

        kinds
            .into_iter()
            .map(|kind| StreamEvent::new(kind, self.thread_id.clone(), self.llm_config.clone()))
            .collect()
    }

    fn ensure_started(&mut self, kinds: &mut Vec<StreamEventKind>) {
        if !self.started {
            self.started = true;
            kinds.push(StreamEventKind::Start);
        }
    }

    fn close_llm_phase(&mut self, kinds: &mut Vec<StreamEventKind>) {
        if let Some(llm_tokens) = self.llm_buffer.take() {
            kinds.push(StreamEventKind::LlmTokensCompleted { llm_tokens });
        }
    }
}

fn tool_event(frame: ToolFrame) -> StreamEventKind {
    let ToolFrame {
        kind,
        tool_name,
        call_id,
        tool_tokens,
        metadata,
    } = frame;
    match kind {
        FrameKind::Start => StreamEventKind::ToolCallStart {
            tool_name,
            call_id,
            metadata,
        },
        FrameKind::Delta => StreamEventKind::ToolCallDelta {
            tool_name,
            call_id,
            tool_tokens: tool_tokens.unwrap_or_default(),
            metadata,
        },
        FrameKind::Completed => StreamEventKind::ToolCallCompleted {
            tool_name,
            call_id,
            output: tool_tokens,
            metadata,
        },
    }
}
