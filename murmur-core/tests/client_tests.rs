//! Call lifecycle tests against an in-memory transport

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use murmur_core::config::{AgentMessageConfig, GenerateConfig, SecretString};
use murmur_core::http::{ByteStream, RequestOptions, Transport};
use murmur_core::protocol::{ConversationTurn, RequestSpec, Role};
use murmur_core::providers::{AgentMessageAdapter, GenerateAdapter};
use murmur_core::{CallState, ChatError, ChatStreamClient, FnObserver, ProtocolAdapter};
use std::sync::{Arc, Mutex};

type Chunk = Result<Bytes, ChatError>;

/// Transport that hands out pre-registered response streams in order and
/// records every request it was asked to open
#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<Vec<mpsc::UnboundedReceiver<Chunk>>>,
    requests: Mutex<Vec<RequestSpec>>,
}

impl ScriptedTransport {
    fn push_response(&self) -> mpsc::UnboundedSender<Chunk> {
        let (sender, receiver) = mpsc::unbounded();
        self.responses.lock().unwrap().push(receiver);
        sender
    }

    fn requests(&self) -> Vec<RequestSpec> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, request: RequestSpec, _options: RequestOptions) -> Result<ByteStream, ChatError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(ChatError::Configuration("no scripted response".to_string()));
        }
        Ok(Box::pin(responses.remove(0)))
    }
}

fn generate_adapter(endpoint: &str) -> Arc<dyn ProtocolAdapter> {
    Arc::new(GenerateAdapter::new(GenerateConfig {
        endpoint: endpoint.to_string(),
        model: "deepseek-r1:32b".to_string(),
        temperature: 0.7,
    }))
}

fn client_with(adapter: Arc<dyn ProtocolAdapter>) -> (ChatStreamClient, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::default());
    let client = ChatStreamClient::new(adapter, transport.clone());
    (client, transport)
}

#[derive(Default)]
struct Log {
    answer: Vec<String>,
    thinking: Vec<String>,
    completions: Vec<Result<String, ChatError>>,
}

fn logging_observer() -> (FnObserver, Arc<Mutex<Log>>) {
    let log = Arc::new(Mutex::new(Log::default()));
    let (a, t, c) = (log.clone(), log.clone(), log.clone());
    let observer = FnObserver::new(
        move |text: &str| a.lock().unwrap().answer.push(text.to_string()),
        move |result| c.lock().unwrap().completions.push(result),
    )
    .with_thinking(move |text: &str| t.lock().unwrap().thinking.push(text.to_string()));
    (observer, log)
}

fn line(text: &str) -> Chunk {
    Ok(Bytes::from(format!("{{\"response\":\"{}\"}}\n", text)))
}

#[tokio::test]
async fn test_byte_at_a_time_delivery() {
    let (client, transport) = client_with(generate_adapter("http://localhost:11434/api/generate"));
    let sender = transport.push_response();
    let (observer, log) = logging_observer();

    let session = client.send_message_stream("hi", observer);
    let body = "{\"response\":\"番茄\"}\n{\"response\":\"炒蛋\"}\n";
    for byte in body.as_bytes() {
        sender.unbounded_send(Ok(Bytes::copy_from_slice(&[*byte]))).unwrap();
    }
    drop(sender);

    assert_eq!(session.finished().await, CallState::Completed);
    let log = log.lock().unwrap();
    assert_eq!(log.answer, vec!["番茄", "炒蛋"]);
    assert_eq!(log.completions.len(), 1);
    assert_eq!(log.completions[0].as_ref().unwrap(), "番茄炒蛋");
}

#[tokio::test]
async fn test_malformed_lines_do_not_fail_call() {
    let (client, transport) = client_with(generate_adapter("http://localhost:11434/api/generate"));
    let sender = transport.push_response();
    let (observer, log) = logging_observer();

    let session = client.send_message_stream("hi", observer);
    sender.unbounded_send(line("a")).unwrap();
    sender.unbounded_send(Ok(Bytes::from_static(b"{broken\n"))).unwrap();
    sender.unbounded_send(line("b")).unwrap();
    drop(sender);

    assert_eq!(session.finished().await, CallState::Completed);
    assert_eq!(log.lock().unwrap().completions[0].as_ref().unwrap(), "ab");
}

#[tokio::test]
async fn test_unterminated_final_line_is_flushed() {
    let (client, transport) = client_with(generate_adapter("http://localhost:11434/api/generate"));
    let sender = transport.push_response();
    let (observer, log) = logging_observer();

    let session = client.send_message_stream("hi", observer);
    sender.unbounded_send(line("a")).unwrap();
    sender
        .unbounded_send(Ok(Bytes::from_static(b"{\"response\":\"z\"}")))
        .unwrap();
    drop(sender);

    assert_eq!(session.finished().await, CallState::Completed);
    assert_eq!(log.lock().unwrap().answer, vec!["a", "z"]);
}

#[tokio::test]
async fn test_cancel_mid_stream_discards_later_chunks() {
    let (client, transport) = client_with(generate_adapter("http://localhost:11434/api/generate"));
    let sender = transport.push_response();
    let (observer, log) = logging_observer();

    let session = client.send_message_stream("hi", observer);
    sender.unbounded_send(line("first")).unwrap();

    // Wait for the first delta to be delivered
    while log.lock().unwrap().answer.is_empty() {
        tokio::task::yield_now().await;
    }

    session.cancel();
    sender.unbounded_send(line("second")).ok();
    drop(sender);

    assert_eq!(session.finished().await, CallState::Cancelled);
    tokio::task::yield_now().await;

    let log = log.lock().unwrap();
    assert_eq!(log.answer, vec!["first"]);
    assert!(log.completions.is_empty());
    assert_eq!(client.history_snapshot(), vec![ConversationTurn::user("hi")]);
}

#[tokio::test]
async fn test_cancel_after_completion_is_noop() {
    let (client, transport) = client_with(generate_adapter("http://localhost:11434/api/generate"));
    let sender = transport.push_response();
    let (observer, log) = logging_observer();

    let session = client.send_message_stream("hi", observer);
    sender.unbounded_send(line("done")).unwrap();
    drop(sender);
    assert_eq!(session.finished().await, CallState::Completed);

    client.cancel_active();
    assert_eq!(session.state(), CallState::Completed);
    assert_eq!(log.lock().unwrap().completions.len(), 1);
}

#[tokio::test]
async fn test_clear_history_mid_stream_keeps_call_running() {
    let (client, transport) = client_with(generate_adapter("http://localhost:11434/api/generate"));
    let sender = transport.push_response();
    let (observer, log) = logging_observer();

    let session = client.send_message_stream("hi", observer);
    sender.unbounded_send(line("par")).unwrap();
    client.clear_history();
    assert!(client.history_snapshot().is_empty());

    sender.unbounded_send(line("tial")).unwrap();
    drop(sender);

    assert_eq!(session.finished().await, CallState::Completed);
    assert_eq!(log.lock().unwrap().completions[0].as_ref().unwrap(), "partial");
    assert_eq!(
        client.history_snapshot(),
        vec![ConversationTurn::assistant("partial")]
    );
}

#[tokio::test]
async fn test_history_window_in_requests() {
    let (client, transport) = client_with(generate_adapter("http://localhost:11434/api/generate"));
    let client = client.with_history_capacity(3).with_system_prompt("Be brief.");

    for (question, answer) in [("q1", "a1"), ("q2", "a2")] {
        let sender = transport.push_response();
        let (observer, _log) = logging_observer();
        let session = client.send_message_stream(question, observer);
        sender.unbounded_send(line(answer)).unwrap();
        drop(sender);
        session.finished().await;
    }

    let roles: Vec<Role> = client.history_snapshot().iter().map(|t| t.role()).collect();
    assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);

    let requests = transport.requests();
    let prompt = requests[1].body_json().unwrap()["prompt"]
        .as_str()
        .unwrap()
        .to_string();
    // q1 is evicted only when the second answer is recorded
    assert_eq!(prompt, "System: Be brief.\nHuman: q1\nAssistant: a1\nHuman: q2");
}

#[tokio::test]
async fn test_open_failure_reports_error() {
    let (client, _transport) = client_with(generate_adapter("http://localhost:11434/api/generate"));
    let (observer, log) = logging_observer();

    // No scripted response registered, so opening fails
    let session = client.send_message_stream("hi", observer);
    assert_eq!(session.finished().await, CallState::Failed);

    let log = log.lock().unwrap();
    assert!(matches!(
        log.completions.as_slice(),
        [Err(ChatError::Configuration(_))]
    ));
    assert_eq!(client.history_snapshot(), vec![ConversationTurn::user("hi")]);
}

#[tokio::test]
async fn test_agent_adapter_thinking_and_answer() {
    let adapter = Arc::new(AgentMessageAdapter::new(AgentMessageConfig {
        endpoint: "https://api.dify.ai/v1/chat-messages".to_string(),
        api_key: SecretString::new("app-test"),
        user: "murmur".to_string(),
        conversation_id: String::new(),
        inputs: Default::default(),
    }));
    let (client, transport) = client_with(adapter);
    let sender = transport.push_response();
    let (observer, log) = logging_observer();

    let session = client.send_message_stream("hi", observer);
    let body = concat!(
        "data: {\"event\":\"agent_thought\",\"thought\":\"menu\"}\n\n",
        "data: {\"event\":\"agent_mess",
        "age\",\"answer\":\"Tofu\"}\n\n",
        "data: {\"event\":\"message_end\"}\n\n",
        "data: [DONE]\n",
    );
    sender.unbounded_send(Ok(Bytes::from_static(body.as_bytes()))).unwrap();
    drop(sender);

    assert_eq!(session.finished().await, CallState::Completed);
    let log = log.lock().unwrap();
    assert_eq!(log.thinking, vec!["menu"]);
    assert_eq!(log.answer, vec!["Tofu"]);

    let request = &transport.requests()[0];
    assert_eq!(request.body_json().unwrap()["query"], "hi");
}

#[tokio::test]
async fn test_oversized_line_fails_call() {
    let (client, transport) = client_with(generate_adapter("http://localhost:11434/api/generate"));
    let client = client.with_max_line_bytes(16);
    let sender = transport.push_response();
    let (observer, log) = logging_observer();

    let session = client.send_message_stream("hi", observer);
    sender
        .unbounded_send(Ok(Bytes::from(vec![b'x'; 64])))
        .unwrap();

    assert_eq!(session.finished().await, CallState::Failed);
    assert!(matches!(
        log.lock().unwrap().completions.as_slice(),
        [Err(ChatError::FrameTooLarge { limit: 16 })]
    ));
}
