//! Streaming chat client
//!
//! [`ChatStreamClient`] drives one conversation: it records turns in a
//! bounded [`ConversationHistory`], asks the active [`ProtocolAdapter`] for a
//! request, streams the response through a [`FrameParser`] and reports text
//! to a [`StreamObserver`] as it arrives.
//!
//! Each call runs on its own tokio task and is tracked by a [`ChatSession`].
//! Only that task writes the response accumulator and the assistant turn.
//! Cancelling a session aborts the task and suppresses every later callback,
//! including `on_complete`.

use crate::config::{BackendConfig, ChatConfig, ConfigValidator};
use crate::error::{ChatError, ChatResult};
use crate::history::{ConversationHistory, DEFAULT_HISTORY_CAPACITY};
use crate::http::{HttpTransport, RequestOptions, Transport};
use crate::protocol::{Channel, ConversationTurn, RequestSpec, Role, StreamEvent};
use crate::providers::{create_adapter, ProtocolAdapter};
use crate::streaming::{FrameParser, DEFAULT_MAX_LINE_BYTES};
use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Receives the output of one streaming call.
///
/// Callbacks run on the call's task. `on_complete` is invoked at most once
/// and never after the call was cancelled.
pub trait StreamObserver: Send + 'static {
    /// Answer-channel text as it arrives
    fn on_receive(&mut self, text: &str);

    /// Thinking-channel text as it arrives
    fn on_thinking(&mut self, _text: &str) {}

    /// The full answer on success, the cause on failure
    fn on_complete(&mut self, result: Result<String, ChatError>);
}

type TextCallback = Box<dyn FnMut(&str) + Send>;
type CompleteCallback = Box<dyn FnOnce(Result<String, ChatError>) + Send>;

/// [`StreamObserver`] assembled from closures
pub struct FnObserver {
    on_receive: TextCallback,
    on_thinking: Option<TextCallback>,
    on_complete: Option<CompleteCallback>,
}

impl FnObserver {
    pub fn new<R, C>(on_receive: R, on_complete: C) -> Self
    where
        R: FnMut(&str) + Send + 'static,
        C: FnOnce(Result<String, ChatError>) + Send + 'static,
    {
        Self {
            on_receive: Box::new(on_receive),
            on_thinking: None,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    /// Also observe thinking-channel text
    pub fn with_thinking<T>(mut self, on_thinking: T) -> Self
    where
        T: FnMut(&str) + Send + 'static,
    {
        self.on_thinking = Some(Box::new(on_thinking));
        self
    }
}

impl StreamObserver for FnObserver {
    fn on_receive(&mut self, text: &str) {
        (self.on_receive)(text);
    }

    fn on_thinking(&mut self, text: &str) {
        if let Some(callback) = self.on_thinking.as_mut() {
            callback(text);
        }
    }

    fn on_complete(&mut self, result: Result<String, ChatError>) {
        if let Some(callback) = self.on_complete.take() {
            callback(result);
        }
    }
}

/// Lifecycle of one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    RequestBuilt,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl CallState {
    /// Whether no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallState::Completed | CallState::Failed | CallState::Cancelled
        )
    }
}

struct SessionInner {
    id: Uuid,
    state: watch::Sender<CallState>,
    abort: Mutex<Option<AbortHandle>>,
}

/// Handle to one in-flight call. Clones refer to the same call.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

impl ChatSession {
    fn new(id: Uuid) -> Self {
        let (state, _) = watch::channel(CallState::Idle);
        Self {
            inner: Arc::new(SessionInner {
                id,
                state,
                abort: Mutex::new(None),
            }),
        }
    }

    /// Request ID of the call, as sent in `X-Request-ID`
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn state(&self) -> CallState {
        *self.inner.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == CallState::Cancelled
    }

    /// Cancel the call.
    ///
    /// Has no effect once the call reached a terminal state. Bytes the
    /// backend still sends are discarded, and `on_complete` is never called.
    ///
    /// Called from an observer callback, no further callback follows. Called
    /// from another thread while the call task is dispatching a delta, that
    /// one `on_receive` or `on_thinking` may still run after `cancel`
    /// returns. Callbacks never run concurrently with each other.
    pub fn cancel(&self) {
        if !self.advance(CallState::Cancelled) {
            return;
        }
        if let Some(handle) = lock(&self.inner.abort).take() {
            handle.abort();
        }
        info!("Cancelled chat call [request_id: {}]", self.inner.id);
    }

    /// Wait until the call reaches a terminal state
    pub async fn finished(&self) -> CallState {
        let mut receiver = self.inner.state.subscribe();
        let state = match receiver.wait_for(CallState::is_terminal).await {
            Ok(state) => *state,
            // The sender lives in `self`, so the channel cannot close here
            Err(_) => self.state(),
        };
        state
    }

    /// Move to `next` unless already terminal. Returns whether it moved.
    fn advance(&self, next: CallState) -> bool {
        self.inner.state.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = next;
                true
            }
        })
    }

    fn set_abort_handle(&self, handle: AbortHandle) {
        // A cancel that won the race before the task was registered
        if self.is_cancelled() {
            handle.abort();
            return;
        }
        *lock(&self.inner.abort) = Some(handle);
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a call ended, from the task's point of view
enum CallOutcome {
    Completed(String),
    Failed(ChatError),
    Cancelled,
}

/// Everything a call task needs, detached from the client
struct CallContext {
    adapter: Arc<dyn ProtocolAdapter>,
    transport: Arc<dyn Transport>,
    history: Arc<Mutex<ConversationHistory>>,
    max_line_bytes: usize,
    split_think_tags: bool,
}

/// Streaming chat client for a single conversation
pub struct ChatStreamClient {
    adapter: Arc<dyn ProtocolAdapter>,
    transport: Arc<dyn Transport>,
    history: Arc<Mutex<ConversationHistory>>,
    system_prompt: String,
    max_line_bytes: usize,
    split_think_tags: bool,
    request_timeout: Option<Duration>,
    active: Mutex<Option<ChatSession>>,
}

impl ChatStreamClient {
    /// Create a client with default settings and an empty system prompt
    pub fn new(adapter: Arc<dyn ProtocolAdapter>, transport: Arc<dyn Transport>) -> Self {
        Self {
            adapter,
            transport,
            history: Arc::new(Mutex::new(ConversationHistory::new(
                DEFAULT_HISTORY_CAPACITY,
            ))),
            system_prompt: String::new(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            split_think_tags: false,
            request_timeout: None,
            active: Mutex::new(None),
        }
    }

    /// Build a client, its adapter and an HTTP transport from configuration
    pub fn from_config(config: &ChatConfig) -> ChatResult<Self> {
        ConfigValidator::new()
            .validate(config)
            .map_err(|e| ChatError::Configuration(e.to_string()))?;

        let transport = HttpTransport::with_config(&config.connection)?;
        let adapter = create_adapter(&config.backend);
        info!(
            "Creating chat client for {} backend at {}",
            adapter.name(),
            config.backend.endpoint()
        );
        if let BackendConfig::AgentMessage(agent) = &config.backend {
            debug!("Using API key {}", agent.api_key.partial_redact());
        }

        let mut client = Self::new(adapter, Arc::new(transport))
            .with_system_prompt(config.system_prompt.clone())
            .with_history_capacity(config.history.capacity)
            .with_max_line_bytes(config.stream.max_line_bytes)
            .with_think_tags(config.stream.split_think_tags);
        client.request_timeout = config
            .connection
            .request_timeout_ms
            .map(Duration::from_millis);

        Ok(client)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Replace the history with an empty one of the given capacity
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history = Arc::new(Mutex::new(ConversationHistory::new(capacity)));
        self
    }

    pub fn with_max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit;
        self
    }

    pub fn with_think_tags(mut self, enabled: bool) -> Self {
        self.split_think_tags = enabled;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn adapter(&self) -> &dyn ProtocolAdapter {
        self.adapter.as_ref()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Send `text` and stream the reply to `observer`.
    ///
    /// The user turn is recorded immediately. If the request cannot be built
    /// (for example a malformed endpoint) `on_complete` runs before this
    /// returns and the session is already `Failed`. Otherwise the call runs
    /// on a new tokio task, so this must be called within a runtime.
    pub fn send_message_stream<O: StreamObserver>(
        &self,
        text: &str,
        mut observer: O,
    ) -> ChatSession {
        let session = ChatSession::new(Uuid::new_v4());
        let request_id = session.id();

        let snapshot: Vec<ConversationTurn> = {
            let mut history = lock(&self.history);
            history.append(Role::User, text);
            history.snapshot().to_vec()
        };

        let request = match self
            .adapter
            .build_request(&self.system_prompt, &snapshot, text)
        {
            Ok(request) => request,
            Err(e) => {
                error!(
                    "Failed to build {} request [request_id: {}]: {}",
                    self.adapter.name(),
                    request_id,
                    e
                );
                session.advance(CallState::Failed);
                observer.on_complete(Err(e));
                return session;
            }
        };
        session.advance(CallState::RequestBuilt);
        debug!(
            "Built {} request with {} history turns [request_id: {}]",
            self.adapter.name(),
            snapshot.len(),
            request_id
        );

        let mut options = RequestOptions {
            request_id,
            ..RequestOptions::default()
        };
        if let Some(timeout) = self.request_timeout {
            options = options.with_timeout(timeout);
        }

        let context = CallContext {
            adapter: self.adapter.clone(),
            transport: self.transport.clone(),
            history: self.history.clone(),
            max_line_bytes: self.max_line_bytes,
            split_think_tags: self.split_think_tags,
        };

        let task = tokio::spawn(run_call(
            context,
            session.clone(),
            request,
            options,
            observer,
        ));
        session.set_abort_handle(task.abort_handle());

        *lock(&self.active) = Some(session.clone());
        session
    }

    /// Cancel the most recently started call, if any
    pub fn cancel_active(&self) {
        if let Some(session) = lock(&self.active).take() {
            session.cancel();
        }
    }

    /// The most recently started call
    pub fn active_session(&self) -> Option<ChatSession> {
        lock(&self.active).clone()
    }

    /// Forget every turn. An in-flight call keeps running and still records
    /// its assistant turn when it completes.
    pub fn clear_history(&self) {
        lock(&self.history).clear();
        debug!("Cleared conversation history");
    }

    /// Copy of the current turns, oldest first
    pub fn history_snapshot(&self) -> Vec<ConversationTurn> {
        lock(&self.history).snapshot().to_vec()
    }
}

impl std::fmt::Debug for ChatStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStreamClient")
            .field("adapter", &self.adapter.name())
            .field("history_len", &lock(&self.history).len())
            .field("max_line_bytes", &self.max_line_bytes)
            .field("split_think_tags", &self.split_think_tags)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

async fn run_call<O: StreamObserver>(
    context: CallContext,
    session: ChatSession,
    request: RequestSpec,
    options: RequestOptions,
    mut observer: O,
) {
    let request_id = options.request_id;
    let outcome = stream_response(&context, &session, request, options, &mut observer).await;

    match outcome {
        CallOutcome::Completed(full) => {
            // Hold the history lock across the transition so waiters on
            // `finished()` observe the assistant turn
            let mut history = lock(&context.history);
            if !session.advance(CallState::Completed) {
                return;
            }
            history.append(Role::Assistant, full.clone());
            drop(history);

            info!(
                "Chat call completed with {} bytes [request_id: {}]",
                full.len(),
                request_id
            );
            observer.on_complete(Ok(full));
        }
        CallOutcome::Failed(e) => {
            if !session.advance(CallState::Failed) {
                return;
            }
            warn!("Chat call failed [request_id: {}]: {}", request_id, e);
            observer.on_complete(Err(e));
        }
        CallOutcome::Cancelled => {
            debug!("Dropping output of cancelled call [request_id: {}]", request_id);
        }
    }
}

async fn stream_response<O: StreamObserver>(
    context: &CallContext,
    session: &ChatSession,
    request: RequestSpec,
    options: RequestOptions,
    observer: &mut O,
) -> CallOutcome {
    let mut stream = match context.transport.open(request, options).await {
        Ok(stream) => stream,
        Err(e) => return CallOutcome::Failed(e),
    };
    if !session.advance(CallState::Streaming) {
        return CallOutcome::Cancelled;
    }

    let mut parser = FrameParser::new(context.adapter.clone())
        .with_max_line_bytes(context.max_line_bytes)
        .with_think_tags(context.split_think_tags);

    while let Some(chunk) = stream.next().await {
        if session.is_cancelled() {
            return CallOutcome::Cancelled;
        }
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return CallOutcome::Failed(e),
        };
        if let Some(outcome) = deliver(parser.push(&chunk), session, observer) {
            return outcome;
        }
    }

    if let Some(outcome) = deliver(parser.finish(), session, observer) {
        return outcome;
    }
    if session.is_cancelled() {
        return CallOutcome::Cancelled;
    }

    CallOutcome::Completed(parser.into_full_response())
}

/// Hand parsed events to the observer. Returns an outcome when the call
/// must stop.
fn deliver<O: StreamObserver>(
    events: Vec<StreamEvent>,
    session: &ChatSession,
    observer: &mut O,
) -> Option<CallOutcome> {
    for event in events {
        if session.is_cancelled() {
            return Some(CallOutcome::Cancelled);
        }
        match event {
            StreamEvent::Delta(delta) => match delta.channel {
                Channel::Answer => observer.on_receive(&delta.text),
                Channel::Thinking => observer.on_thinking(&delta.text),
            },
            StreamEvent::Done => {
                debug!("Backend reported end of answer [request_id: {}]", session.id());
            }
            StreamEvent::Error(e) => return Some(CallOutcome::Failed(e)),
        }
    }
    None
}
