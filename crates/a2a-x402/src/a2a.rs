//! The A2A transport surface the payment middleware is built against.
//!
//! The A2A protocol itself - transport, task manager, agent-card discovery -
//! is an external collaborator. This module carries only the vocabulary the
//! x402 extension needs to do its job: tasks with a status and a metadata
//! bag, messages correlated to tasks, an event queue the middleware emits
//! into, and the executor trait that business agents implement.
//!
//! All types are wire compatible with the A2A JSON data model (camelCase
//! fields, kebab-case task states).

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::exception::PaymentRequiredException;

/// Lifecycle states of an A2A task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Canceled,
    Failed,
    Rejected,
    #[serde(other)]
    Unknown,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// A single content part of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
}

impl Part {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Part::Text { text: text.into() }
    }
}

/// A message exchanged between the two agents of a task.
///
/// `task_id` correlates the message with a prior task; payment submission
/// messages must set it to the task that requested payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Message {
    /// A user-authored text message with a fresh id.
    pub fn user_text<S: Into<String>>(text: S) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            task_id: None,
            context_id: None,
            role: Role::User,
            parts: vec![Part::text(text)],
            metadata: Map::new(),
        }
    }

    /// An agent-authored text message with a fresh id.
    pub fn agent_text<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::Agent,
            ..Self::user_text(text)
        }
    }

    pub fn with_task_id<S: Into<String>>(mut self, task_id: S) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}

/// Status of a task: its lifecycle state and the message that carried it
/// there, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

impl TaskStatus {
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
        }
    }
}

/// An A2A unit of work.
///
/// Opaque to the payment engine except for its `metadata` bag and the
/// metadata bag of its current status message, which carry the reserved
/// `x402.payment.*` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub context_id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Task {
    /// A fresh task in the `submitted` state.
    pub fn new<I: Into<String>, C: Into<String>>(id: I, context_id: C) -> Self {
        Self {
            id: id.into(),
            context_id: context_id.into(),
            status: TaskStatus::new(TaskState::Submitted),
            metadata: Map::new(),
        }
    }
}

/// A protocol extension advertised in an agent card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentExtension {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// Capabilities section of an agent card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    #[serde(default)]
    pub extensions: Vec<AgentExtension>,
}

/// A minimal agent card: identity plus declared capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: AgentCapabilities,
}

/// An event emitted by an executor: either an updated task or a new message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Event {
    Task(Task),
    Message(Message),
}

impl From<Task> for Event {
    fn from(task: Task) -> Self {
        Event::Task(task)
    }
}

impl From<Message> for Event {
    fn from(message: Message) -> Self {
        Event::Message(message)
    }
}

/// Error returned when enqueueing onto a closed event queue.
#[derive(Debug, thiserror::Error)]
#[error("event queue closed")]
pub struct EventQueueClosed;

/// Outbound channel for task and message events.
///
/// Events enqueued for a single task are delivered in the order they were
/// sent; the queue is the sole output of an executor invocation.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventQueue {
    /// Create a queue together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue_event<E: Into<Event>>(&self, event: E) -> Result<(), EventQueueClosed> {
        self.tx.send(event.into()).map_err(|_| EventQueueClosed)
    }
}

/// Everything an executor gets to see about one incoming request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Id of the task this request belongs to. Derived from the incoming
    /// message's correlation, the current task, or freshly generated.
    pub task_id: String,
    pub context_id: String,
    /// The incoming message.
    pub message: Message,
    /// The task as the transport last saw it, if one exists.
    pub current_task: Option<Task>,
    /// Transport request headers (extension activation travels here).
    pub headers: HeaderMap,
}

impl RequestContext {
    pub fn new(message: Message, current_task: Option<Task>) -> Self {
        let task_id = message
            .task_id
            .clone()
            .or_else(|| current_task.as_ref().map(|task| task.id.clone()))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let context_id = message
            .context_id
            .clone()
            .or_else(|| current_task.as_ref().map(|task| task.context_id.clone()))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            task_id,
            context_id,
            message,
            current_task,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Errors surfaced by an agent executor.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Business logic demands payment before it will proceed. Not a failure:
    /// the server middleware catches this and drives the payment flow.
    #[error(transparent)]
    PaymentRequired(#[from] PaymentRequiredException),
    #[error(transparent)]
    QueueClosed(#[from] EventQueueClosed),
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl AgentError {
    pub fn other<E: Into<Box<dyn std::error::Error + Send + Sync>>>(error: E) -> Self {
        AgentError::Other(error.into())
    }
}

impl From<a2a_x402_types::X402Error> for AgentError {
    fn from(error: a2a_x402_types::X402Error) -> Self {
        AgentError::Other(Box::new(error))
    }
}

/// The executor interface business agents implement and middleware wraps.
///
/// An executor reads the request context and communicates exclusively by
/// enqueueing events.
#[async_trait::async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(
        &self,
        context: &RequestContext,
        event_queue: &EventQueue,
    ) -> Result<(), AgentError>;
}
