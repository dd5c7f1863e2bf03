//! The agent loop state machine.
//!
//! ```text
//! ResetTools ─► InvokeModel ─► Route ─┬─► End
//!                   ▲                 │
//!                   └── CollectToolResults ◄── Tools
//! ```
//!
//! Any failure moves the turn to `Fatal`. The conversation state is saved
//! once the turn reaches `End` or `Fatal`; a cancelled streaming turn is not
//! saved.

use std::sync::Arc;

use librarian_core::checkpoint::{CheckpointStore, ConversationState};
use librarian_core::error::{Error, ProviderError, Result};
use librarian_core::message::{ChatMessage, Message, ThreadId, UsedTool};
use librarian_core::model::{ModelConfig, ModelGateway};
use librarian_core::progress::ToolProgress;
use librarian_core::provider::ToolDefinition;
use librarian_core::tool::ToolRegistry;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::signal::{LoopSignal, SignalSink};
use crate::stream_event::StreamEvent;
use crate::thread_lock::ThreadLocks;
use crate::translator::EventTranslator;

pub const DEFAULT_MAX_STEPS: usize = 20;

/// Input of one turn: `{thread_id?, messages, llm_config?, max_steps?}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Missing means a new thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,

    /// New messages only; the thread's history is loaded from the checkpoint.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_config: Option<ModelConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,
}

impl TurnRequest {
    /// A request carrying a single user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: librarian_core::message::Role::User,
                content: content.into(),
            }],
            ..Default::default()
        }
    }

    pub fn with_thread(mut self, thread_id: ThreadId) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    pub fn with_config(mut self, llm_config: ModelConfig) -> Self {
        self.llm_config = Some(llm_config);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }
}

/// Output of a successful turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub thread_id: ThreadId,
    pub llm_config: ModelConfig,
    /// The assistant message that ended the turn.
    pub message: Message,
    pub used_tools: Vec<UsedTool>,
}

/// Blocking-mode response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    pub thread_id: ThreadId,
    pub llm_config: ModelConfig,
    pub messages: Vec<ChatMessage>,
    pub used_tools: Vec<UsedTool>,
}

impl TurnResult {
    pub fn answer(&self) -> &str {
        self.message.content()
    }

    pub fn into_response(self) -> TurnResponse {
        TurnResponse {
            messages: vec![ChatMessage::assistant(self.message.content())],
            thread_id: self.thread_id,
            llm_config: self.llm_config,
            used_tools: self.used_tools,
        }
    }
}

/// A request with its defaults resolved.
struct Turn {
    thread_id: ThreadId,
    llm_config: ModelConfig,
    max_steps: usize,
    messages: Vec<ChatMessage>,
}

/// Runs turns against a model gateway, a tool registry and a checkpoint store.
pub struct AgentLoop {
    gateway: Arc<dyn ModelGateway>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn CheckpointStore>,
    locks: ThreadLocks,

    /// Used when a request carries no `llm_config`
    default_config: ModelConfig,

    /// Model invocations allowed per turn unless the request overrides it
    max_steps: usize,
}

impl AgentLoop {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            gateway,
            tools,
            store,
            locks: ThreadLocks::new(),
            default_config: ModelConfig::default(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_default_config(mut self, config: ModelConfig) -> Self {
        self.default_config = config;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn gateway(&self) -> &dyn ModelGateway {
        self.gateway.as_ref()
    }

    pub fn default_config(&self) -> &ModelConfig {
        &self.default_config
    }

    fn prepare(&self, request: TurnRequest) -> Turn {
        Turn {
            thread_id: request.thread_id.unwrap_or_default(),
            llm_config: request
                .llm_config
                .unwrap_or_else(|| self.default_config.clone()),
            max_steps: request.max_steps.unwrap_or(self.max_steps),
            messages: request.messages,
        }
    }

    /// Run one turn to completion and return the final answer.
    ///
    /// Tool progress frames are discarded.
    pub async fn run(&self, request: TurnRequest) -> Result<TurnResult> {
        let turn = self.prepare(request);
        self.execute(turn, None).await
    }

    /// Run one turn, streaming its events.
    ///
    /// The stream always ends with `stream.completed` or `stream.error`
    /// unless the consumer drops it first, which cancels the turn.
    pub fn stream(self: Arc<Self>, request: TurnRequest) -> ReceiverStream<StreamEvent> {
        let turn = self.prepare(request);
        let (events_tx, events_rx) = mpsc::channel(128);
        let (sink, mut signals) = SignalSink::channel();
        let mut translator = EventTranslator::new(turn.thread_id.clone(), turn.llm_config.clone());

        tokio::spawn(async move {
            loop {
                let signal = tokio::select! {
                    signal = signals.recv() => signal,
                    _ = events_tx.closed() => None,
                };
                let Some(signal) = signal else {
                    debug!("Event stream closed");
                    return;
                };
                for event in translator.translate(signal) {
                    if events_tx.send(event).await.is_err() {
                        debug!("Stream consumer disconnected");
                        return;
                    }
                }
                if translator.is_terminated() {
                    return;
                }
            }
        });

        tokio::spawn(async move {
            match self.execute(turn, Some(&sink)).await {
                Ok(_) => {
                    sink.send(LoopSignal::End);
                }
                Err(Error::Cancelled) => {}
                Err(e) => {
                    sink.send(LoopSignal::Fatal(e.to_string()));
                }
            }
        });

        ReceiverStream::new(events_rx)
    }

    async fn execute(&self, turn: Turn, signals: Option<&SignalSink>) -> Result<TurnResult> {
        let Turn {
            thread_id,
            llm_config,
            max_steps,
            messages,
        } = turn;

        info!(
            thread_id = %thread_id,
            model = %llm_config.model,
            messages = messages.len(),
            streaming = signals.is_some(),
            "Starting turn"
        );

        if max_steps == 0 {
            return Err(Error::InvalidRequest("max_steps must be positive".into()));
        }
        let messages = messages
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>>>()?;

        let _guard = self.locks.acquire(&thread_id).await;

        let mut state = match self.store.load(&thread_id).await? {
            Some(state) => state,
            None => ConversationState::new(thread_id.clone(), llm_config.clone()),
        };
        state.llm_config = llm_config.clone();
        for message in messages {
            state.push(message)?;
        }

        let outcome = match signals {
            Some(sink) => tokio::select! {
                outcome = self.drive(&mut state, max_steps, Some(sink)) => outcome,
                _ = sink.closed() => Err(Error::Cancelled),
            },
            None => self.drive(&mut state, max_steps, None).await,
        };

        match outcome {
            Ok(message) => {
                self.store.save(&thread_id, &state).await?;
                info!(
                    thread_id = %thread_id,
                    used_tools = state.used_tools.len(),
                    "Turn completed"
                );
                Ok(TurnResult {
                    thread_id,
                    llm_config,
                    message,
                    used_tools: state.used_tools,
                })
            }
            Err(Error::Cancelled) => {
                info!(thread_id = %thread_id, "Turn cancelled by consumer, state not saved");
                Err(Error::Cancelled)
            }
            Err(e) => {
                warn!(thread_id = %thread_id, error = %e, "Turn failed");
                if let Err(save_err) = self.store.save(&thread_id, &state).await {
                    warn!(thread_id = %thread_id, error = %save_err, "Failed to save state of failed turn");
                }
                Err(e)
            }
        }
    }

    /// ResetTools, then alternate InvokeModel and Tools until Route picks End.
    async fn drive(
        &self,
        state: &mut ConversationState,
        max_steps: usize,
        signals: Option<&SignalSink>,
    ) -> Result<Message> {
        state.reset_used_tools();
        let definitions = self.tools.definitions();
        let mut steps = 0;

        loop {
            if steps == max_steps {
                return Err(Error::StepLimitExceeded { max_steps });
            }
            steps += 1;

            debug!(thread_id = %state.thread_id, step = steps, "Invoking model");
            let message = match signals {
                Some(sink) => self.stream_model(sink, state, &definitions).await?,
                None => {
                    self.gateway
                        .invoke(&state.llm_config, &state.messages, &definitions)
                        .await?
                }
            };
            state.push(message.clone())?;

            let calls = match &message {
                Message::Assistant { tool_calls, .. } => tool_calls.clone(),
                other => {
                    return Err(Error::RoutingInvariant {
                        found: other.role().to_string(),
                    });
                }
            };
            if calls.is_empty() {
                return Ok(message);
            }

            debug!(thread_id = %state.thread_id, count = calls.len(), "Executing tool calls");
            for call in &calls {
                let progress = Arc::new(match signals {
                    Some(sink) => ToolProgress::new(&call.name, &call.id, Arc::new(sink.clone())),
                    None => ToolProgress::detached(&call.name, &call.id),
                });
                let output = self.tools.execute(call, progress).await.map_err(|e| {
                    warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool execution failed");
                    Error::from(e)
                })?;
                state.push(Message::tool_result(&call.id, &call.name, &output))?;
                state.used_tools.push(UsedTool::new(&call.name, output));
            }
        }
    }

    /// Stream one model response, forwarding its text deltas.
    async fn stream_model(
        &self,
        sink: &SignalSink,
        state: &ConversationState,
        definitions: &[ToolDefinition],
    ) -> Result<Message> {
        let mut chunks = self
            .gateway
            .stream(&state.llm_config, &state.messages, definitions)
            .await?;
        let mut content = String::new();

        while let Some(chunk) = chunks.recv().await {
            let chunk = chunk?;
            if let Some(delta) = chunk.content.filter(|c| !c.is_empty()) {
                content.push_str(&delta);
                sink.send(LoopSignal::LlmDelta(delta));
            }
            if chunk.done {
                sink.send(LoopSignal::LlmFinished);
                return Ok(if chunk.tool_calls.is_empty() {
                    Message::assistant(content)
                } else {
                    Message::assistant_with_tools(content, chunk.tool_calls)
                });
            }
        }

        Err(ProviderError::StreamInterrupted("model stream ended without a final chunk".into()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_event::StreamEventKind;
    use crate::test_helpers::*;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    async fn collect(agent: Arc<AgentLoop>, request: TurnRequest) -> Vec<StreamEvent> {
        agent.stream(request).collect().await
    }

    fn names(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.event_name()).collect()
    }

    // ── Blocking mode ──

    #[tokio::test]
    async fn plain_answer() {
        let h = harness(vec![answer("4")]);
        let result = h.agent.run(TurnRequest::user("What is 2+2?")).await.unwrap();

        assert_eq!(result.answer(), "4");
        assert!(result.used_tools.is_empty());
        assert!(result.thread_id.as_str().starts_with("thread-"));

        let response = result.into_response();
        assert_eq!(response.messages, vec![ChatMessage::assistant("4")]);
        assert!(response.used_tools.is_empty());
    }

    #[tokio::test]
    async fn tool_round_trip() {
        let h = harness(vec![
            tool_request(vec![call("call_1", "get_weather", serde_json::json!({"location": "Tokyo"}))]),
            answer("It is sunny in Tokyo, 25C."),
        ]);
        let result = h.agent.run(TurnRequest::user("Weather in Tokyo?")).await.unwrap();

        assert_eq!(result.used_tools, vec![UsedTool::new("get_weather", "Sunny, 25C")]);
        assert_eq!(result.answer(), "It is sunny in Tokyo, 25C.");
        assert_eq!(h.gateway.call_count(), 2);

        let second_call = h.gateway.seen(1);
        assert_eq!(
            second_call.last(),
            Some(&Message::tool_result("call_1", "get_weather", "Sunny, 25C"))
        );
    }

    #[tokio::test]
    async fn tools_run_in_issue_order() {
        let h = harness(vec![
            tool_request(vec![
                call("call_1", "get_weather", serde_json::json!({"location": "Oslo"})),
                call("call_2", "get_weather", serde_json::json!({"location": "Lima"})),
            ]),
            answer("done"),
        ]);
        h.agent.run(TurnRequest::user("Two cities")).await.unwrap();

        let ids: Vec<_> = h
            .gateway
            .seen(1)
            .iter()
            .filter_map(|m| match m {
                Message::ToolResult { call_id, .. } => Some(call_id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["call_1", "call_2"]);
    }

    #[tokio::test]
    async fn history_is_loaded_for_known_thread() {
        let h = harness(vec![answer("Hi Ada"), answer("Your name is Ada")]);
        let first = h.agent.run(TurnRequest::user("I am Ada")).await.unwrap();
        let second = h
            .agent
            .run(TurnRequest::user("What is my name?").with_thread(first.thread_id.clone()))
            .await
            .unwrap();

        assert_eq!(second.thread_id, first.thread_id);
        assert_eq!(h.gateway.seen(1).len(), 3);
        let saved = h.store.load(&first.thread_id).await.unwrap().unwrap();
        assert_eq!(saved.messages.len(), 4);
    }

    #[tokio::test]
    async fn used_tools_reset_each_turn() {
        let h = harness(vec![
            tool_request(vec![call("call_1", "get_weather", serde_json::json!({"location": "Rome"}))]),
            answer("Sunny"),
            answer("You're welcome"),
        ]);
        let first = h.agent.run(TurnRequest::user("Weather in Rome?")).await.unwrap();
        assert_eq!(first.used_tools.len(), 1);

        let second = h
            .agent
            .run(TurnRequest::user("Thanks").with_thread(first.thread_id.clone()))
            .await
            .unwrap();
        assert!(second.used_tools.is_empty());
    }

    #[tokio::test]
    async fn request_config_overrides_default() {
        let h = harness(vec![answer("ok")]);
        let config = ModelConfig::new("groq:llama-3.1-8b-instant").with_temperature(0.2);
        let result = h
            .agent
            .run(TurnRequest::user("hi").with_config(config.clone()))
            .await
            .unwrap();
        assert_eq!(result.llm_config, config);

        let saved = h.store.load(&result.thread_id).await.unwrap().unwrap();
        assert_eq!(saved.llm_config, config);
    }

    #[tokio::test]
    async fn tool_failure_aborts_turn_and_keeps_prior_results() {
        let h = harness(vec![tool_request(vec![
            call("call_1", "get_weather", serde_json::json!({"location": "Paris"})),
            call("call_2", "broken", serde_json::json!({})),
        ])]);
        let thread = ThreadId::from("thread-broken");
        let err = h
            .agent
            .run(TurnRequest::user("Go").with_thread(thread.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolExecution(_)));
        assert_eq!(h.gateway.call_count(), 1);

        let saved = h.store.load(&thread).await.unwrap().unwrap();
        assert_eq!(
            saved.last_message(),
            Some(&Message::tool_result("call_1", "get_weather", "Sunny, 25C"))
        );
        assert_eq!(saved.used_tools, vec![UsedTool::new("get_weather", "Sunny, 25C")]);
    }

    #[tokio::test]
    async fn unknown_tool_is_fatal() {
        let h = harness(vec![tool_request(vec![call("call_1", "nope", serde_json::json!({}))])]);
        let err = h.agent.run(TurnRequest::user("Go")).await.unwrap_err();
        assert!(matches!(err, Error::ToolExecution(_)));
    }

    #[tokio::test]
    async fn model_failure_is_fatal() {
        let h = harness(vec![Step::Fail(ProviderError::Network("connection reset".into()))]);
        let err = h.agent.run(TurnRequest::user("hi")).await.unwrap_err();
        assert!(matches!(err, Error::ModelInvocation(ProviderError::Network(_))));
    }

    #[tokio::test]
    async fn non_assistant_reply_violates_routing() {
        let h = harness(vec![Step::Reply(Message::user("not a model answer"))]);
        let err = h.agent.run(TurnRequest::user("hi")).await.unwrap_err();
        assert!(matches!(err, Error::RoutingInvariant { ref found } if found == "user"));
    }

    #[tokio::test]
    async fn step_limit_bounds_model_calls() {
        let looping = tool_request(vec![call("call_1", "get_weather", serde_json::json!({"location": "X"}))]);
        let h = harness(vec![looping.clone(), looping.clone(), looping]);
        let err = h
            .agent
            .run(TurnRequest::user("loop").with_max_steps(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StepLimitExceeded { max_steps: 2 }));
        assert_eq!(h.gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn answer_on_last_allowed_step_succeeds() {
        let h = harness(vec![
            tool_request(vec![call("call_1", "get_weather", serde_json::json!({"location": "X"}))]),
            answer("done"),
        ]);
        let result = h.agent.run(TurnRequest::user("go").with_max_steps(2)).await.unwrap();
        assert_eq!(result.answer(), "done");
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected_before_the_model() {
        let h = harness(vec![]);
        let err = h
            .agent
            .run(TurnRequest::user("hi").with_max_steps(0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let request = TurnRequest {
            messages: vec![ChatMessage {
                role: librarian_core::message::Role::Tool,
                content: "forged".into(),
            }],
            ..Default::default()
        };
        let err = h.agent.run(request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(h.gateway.call_count(), 0);
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let request: TurnRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();
        assert!(request.thread_id.is_none());
        assert!(request.llm_config.is_none());
        assert!(request.max_steps.is_none());
        assert_eq!(request.messages.len(), 1);
    }

    // ── Streaming mode ──

    #[tokio::test]
    async fn streamed_tokens() {
        let h = harness(vec![Step::Deltas(vec!["A", "B", "C"], vec![])]);
        let events = collect(h.agent.clone(), TurnRequest::user("abc")).await;

        assert_eq!(
            names(&events),
            vec![
                "stream.start",
                "stream.llm_tokens.start",
                "stream.llm_tokens.delta",
                "stream.llm_tokens.delta",
                "stream.llm_tokens.delta",
                "stream.llm_tokens.completed",
                "stream.completed",
            ]
        );
        assert_eq!(
            events[5].kind,
            StreamEventKind::LlmTokensCompleted {
                llm_tokens: "ABC".into()
            }
        );
    }

    #[tokio::test]
    async fn streamed_tool_turn() {
        let h = harness(vec![
            Step::Deltas(
                vec!["Let me check."],
                vec![call("call_1", "get_weather", serde_json::json!({"location": "Tokyo"}))],
            ),
            Step::Deltas(vec!["Sunny", " in Tokyo"], vec![]),
        ]);
        let events = collect(h.agent.clone(), TurnRequest::user("Weather in Tokyo?")).await;

        assert_eq!(
            names(&events),
            vec![
                "stream.start",
                "stream.llm_tokens.start",
                "stream.llm_tokens.delta",
                "stream.llm_tokens.completed",
                "stream.tool_call.start",
                "stream.tool_call.delta",
                "stream.tool_call.completed",
                "stream.llm_tokens.start",
                "stream.llm_tokens.delta",
                "stream.llm_tokens.delta",
                "stream.llm_tokens.completed",
                "stream.completed",
            ]
        );
        match &events[5].kind {
            StreamEventKind::ToolCallDelta { tool_tokens, .. } => assert_eq!(tool_tokens, "Checking Tokyo"),
            other => panic!("unexpected event {other:?}"),
        }
        for event in &events {
            assert_eq!(event.llm_config, ModelConfig::default());
        }
    }

    #[tokio::test]
    async fn streamed_tool_failure_ends_with_single_error() {
        let h = harness(vec![tool_request(vec![call("call_1", "broken", serde_json::json!({}))])]);
        let events = collect(h.agent.clone(), TurnRequest::user("Go")).await;

        let last = events.last().unwrap();
        assert!(matches!(&last.kind, StreamEventKind::Error { error } if error.contains("backend unreachable")));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(!names(&events).contains(&"stream.tool_call.completed"));
    }

    #[tokio::test]
    async fn streamed_model_failure_before_any_event() {
        let h = harness(vec![Step::Fail(ProviderError::AuthenticationFailed("bad key".into()))]);
        let events = collect(h.agent.clone(), TurnRequest::user("hi")).await;
        assert_eq!(names(&events), vec!["stream.error"]);
    }

    #[tokio::test]
    async fn streamed_events_carry_thread_id() {
        let h = harness(vec![answer("hi")]);
        let thread = ThreadId::from("thread-stream");
        let events = collect(h.agent.clone(), TurnRequest::user("hi").with_thread(thread.clone())).await;
        assert!(events.iter().all(|e| e.thread_id == thread));
        assert!(h.store.load(&thread).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn streamed_and_blocking_used_tools_agree() {
        let script = || {
            vec![
                tool_request(vec![
                    call("call_1", "get_weather", serde_json::json!({"location": "Oslo"})),
                    call("call_2", "get_weather", serde_json::json!({"location": "Lima"})),
                ]),
                answer("done"),
            ]
        };

        let blocking = harness(script()).agent.run(TurnRequest::user("go")).await.unwrap();
        let events = collect(harness(script()).agent, TurnRequest::user("go")).await;

        let completed: Vec<_> = events
            .iter()
            .filter_map(|e| match &e.kind {
                StreamEventKind::ToolCallCompleted { tool_name, .. } => Some(tool_name.clone()),
                _ => None,
            })
            .collect();
        let used: Vec<_> = blocking.used_tools.iter().map(|t| t.name.clone()).collect();
        assert_eq!(completed, used);
    }

    #[tokio::test]
    async fn consumer_disconnect_cancels_turn() {
        let h = harness(vec![Step::Stall(vec!["A", "B"]), answer("later")]);
        let thread = ThreadId::from("thread-cancel");
        let mut stream = h
            .agent
            .clone()
            .stream(TurnRequest::user("abc").with_thread(thread.clone()));

        let mut seen = Vec::new();
        while seen.len() < 4 {
            seen.push(stream.next().await.unwrap().event_name());
        }
        assert_eq!(
            seen,
            vec![
                "stream.start",
                "stream.llm_tokens.start",
                "stream.llm_tokens.delta",
                "stream.llm_tokens.delta",
            ]
        );
        drop(stream);

        // The lock is released and nothing was saved for the cancelled turn.
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            h.agent.run(TurnRequest::user("again").with_thread(thread.clone())),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(result.answer(), "later");
        let saved = h.store.load(&thread).await.unwrap().unwrap();
        assert_eq!(saved.messages.len(), 2);
    }

    #[tokio::test]
    async fn disconnect_during_tool_releases_thread() {
        let h = harness(vec![
            tool_request(vec![call("call_1", "stuck", serde_json::json!({}))]),
            answer("later"),
        ]);
        let thread = ThreadId::from("thread-stuck-tool");
        let mut stream = h
            .agent
            .clone()
            .stream(TurnRequest::user("find a book").with_thread(thread.clone()));

        let mut seen = Vec::new();
        while seen.len() < 3 {
            seen.push(stream.next().await.unwrap().event_name());
        }
        assert_eq!(
            seen,
            vec![
                "stream.start",
                "stream.tool_call.start",
                "stream.tool_call.delta",
            ]
        );
        drop(stream);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.store.load(&thread).await.unwrap().is_none());
        assert!(ToolProgress::current().is_err());

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            h.agent.run(TurnRequest::user("again").with_thread(thread.clone())),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(result.answer(), "later");
        assert!(result.used_tools.is_empty());

        let saved = h.store.load(&thread).await.unwrap().unwrap();
        assert_eq!(saved.messages.len(), 2);
        assert_eq!(saved.messages[0].content(), "again");
    }

    #[tokio::test]
    async fn same_thread_turns_are_serialized() {
        let h = harness(vec![answer("one"), answer("two")]);
        let thread = ThreadId::from("thread-shared");
        let a = h.agent.run(TurnRequest::user("first").with_thread(thread.clone()));
        let b = h.agent.run(TurnRequest::user("second").with_thread(thread.clone()));
        let (a, b) = tokio::join!(a, b);
        a.unwrap();
        b.unwrap();

        let saved = h.store.load(&thread).await.unwrap().unwrap();
        assert_eq!(saved.messages.len(), 4);
    }
}
