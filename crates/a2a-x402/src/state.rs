//! Payment state machine and metadata codec.
//!
//! [`X402Utils`] is the sole writer of the reserved `x402.payment.*` metadata
//! keys. Readers tolerate missing or malformed metadata by returning nothing;
//! writers enforce the payment state machine and fail with a state error on
//! any transition that is not one of its edges.

use serde_json::{Map, Value};
use tracing::warn;

use a2a_x402_types::{
    ErrorCode, PaymentPayload, PaymentRequiredResponse, SettleResponse, X402Error,
};

use crate::a2a::{Message, Task, TaskState};

/// Protocol-defined payment states carried under `x402.payment.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// Payment requested by the merchant.
    Required,
    /// Payment signed and submitted by the client.
    Submitted,
    /// Payment requirements rejected by the client.
    Rejected,
    /// Payment verified, service being rendered before settlement.
    Pending,
    /// Payment settled successfully. Terminal.
    Completed,
    /// Payment processing failed. Terminal.
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Required => "payment-required",
            PaymentStatus::Submitted => "payment-submitted",
            PaymentStatus::Rejected => "payment-rejected",
            PaymentStatus::Pending => "payment-pending",
            PaymentStatus::Completed => "payment-completed",
            PaymentStatus::Failed => "payment-failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "payment-required" => Some(PaymentStatus::Required),
            "payment-submitted" => Some(PaymentStatus::Submitted),
            "payment-rejected" => Some(PaymentStatus::Rejected),
            "payment-pending" => Some(PaymentStatus::Pending),
            "payment-completed" => Some(PaymentStatus::Completed),
            "payment-failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reserved metadata key constants.
pub struct X402Metadata;

impl X402Metadata {
    pub const STATUS_KEY: &'static str = "x402.payment.status";
    /// Contains a serialized [`PaymentRequiredResponse`].
    pub const REQUIRED_KEY: &'static str = "x402.payment.required";
    /// Contains a serialized [`PaymentPayload`].
    pub const PAYLOAD_KEY: &'static str = "x402.payment.payload";
    /// Contains an array of serialized [`SettleResponse`] objects.
    pub const RECEIPTS_KEY: &'static str = "x402.payment.receipts";
    /// Singular receipt key written by early deployments; read, never written.
    pub const LEGACY_RECEIPT_KEY: &'static str = "x402.payment.receipt";
    /// Error code string, set when the payment failed.
    pub const ERROR_KEY: &'static str = "x402.payment.error";
}

/// Per-invocation marker the server middleware sets so the delegate can tell
/// it is entering paid execution.
pub const PAYMENT_VERIFIED_KEY: &str = "x402_payment_verified";

/// Core utilities for x402 payment state management on tasks and messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct X402Utils;

fn status_in(metadata: &Map<String, Value>) -> Option<PaymentStatus> {
    metadata
        .get(X402Metadata::STATUS_KEY)
        .and_then(Value::as_str)
        .and_then(PaymentStatus::parse)
}

impl X402Utils {
    pub fn new() -> Self {
        Self
    }

    /// Read the payment status of a task: task metadata first, then the
    /// metadata of its current status message.
    pub fn get_payment_status(&self, task: &Task) -> Option<PaymentStatus> {
        status_in(&task.metadata).or_else(|| {
            task.status
                .message
                .as_ref()
                .and_then(|message| status_in(&message.metadata))
        })
    }

    pub fn get_payment_status_from_message(&self, message: &Message) -> Option<PaymentStatus> {
        status_in(&message.metadata)
    }

    fn read_key<'a>(&self, task: &'a Task, key: &str) -> Option<&'a Value> {
        task.metadata.get(key).or_else(|| {
            task.status
                .message
                .as_ref()
                .and_then(|message| message.metadata.get(key))
        })
    }

    /// Deserialize the payment-required response stored on a task, if any.
    /// Missing or malformed metadata reads as absent.
    pub fn get_payment_requirements(&self, task: &Task) -> Option<PaymentRequiredResponse> {
        let value = self.read_key(task, X402Metadata::REQUIRED_KEY)?;
        match serde_json::from_value(value.clone()) {
            Ok(required) => Some(required),
            Err(error) => {
                warn!(task_id = %task.id, %error, "Malformed payment requirements in metadata");
                None
            }
        }
    }

    /// Raw payload value as stored on the task, before typed deserialization.
    pub fn get_payment_payload_value<'a>(&self, task: &'a Task) -> Option<&'a Value> {
        self.read_key(task, X402Metadata::PAYLOAD_KEY)
    }

    pub fn get_payment_payload_value_from_message<'a>(
        &self,
        message: &'a Message,
    ) -> Option<&'a Value> {
        message.metadata.get(X402Metadata::PAYLOAD_KEY)
    }

    /// Deserialize the payment payload stored on a task, if any.
    pub fn get_payment_payload(&self, task: &Task) -> Option<PaymentPayload> {
        let value = self.get_payment_payload_value(task)?;
        match serde_json::from_value(value.clone()) {
            Ok(payload) => Some(payload),
            Err(error) => {
                warn!(task_id = %task.id, %error, "Malformed payment payload in metadata");
                None
            }
        }
    }

    pub fn get_payment_payload_from_message(&self, message: &Message) -> Option<PaymentPayload> {
        let value = self.get_payment_payload_value_from_message(message)?;
        match serde_json::from_value(value.clone()) {
            Ok(payload) => Some(payload),
            Err(error) => {
                warn!(message_id = %message.message_id, %error, "Malformed payment payload in message metadata");
                None
            }
        }
    }

    /// The receipt trail of a task: every settlement attempt, in order.
    ///
    /// Reads the array form, falling back to the singular key written by
    /// early deployments.
    pub fn get_payment_receipts(&self, task: &Task) -> Vec<SettleResponse> {
        let values: Vec<Value> = match self.read_key(task, X402Metadata::RECEIPTS_KEY) {
            Some(Value::Array(entries)) => entries.clone(),
            Some(_) | None => match self.read_key(task, X402Metadata::LEGACY_RECEIPT_KEY) {
                Some(entry) => vec![entry.clone()],
                None => Vec::new(),
            },
        };
        values
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect()
    }

    /// Transition the task to *payment-required*: A2A state `input-required`,
    /// with the payment demand carried on the status message metadata.
    pub fn create_payment_required_task(
        &self,
        task: &mut Task,
        payment_required: &PaymentRequiredResponse,
    ) -> Result<(), X402Error> {
        if let Some(status) = self.get_payment_status(task) {
            if status.is_terminal() {
                return Err(X402Error::state(format!(
                    "cannot request payment on a task already in {status}"
                )));
            }
        }

        let required =
            serde_json::to_value(payment_required).map_err(|e| X402Error::message(e.to_string()))?;

        task.status.state = TaskState::InputRequired;
        let message = task.status.message.get_or_insert_with(|| {
            Message::agent_text("Payment required").with_task_id(task.id.clone())
        });
        message.metadata.insert(
            X402Metadata::STATUS_KEY.into(),
            PaymentStatus::Required.as_str().into(),
        );
        message.metadata.insert(X402Metadata::REQUIRED_KEY.into(), required);
        Ok(())
    }

    /// Record a submitted payment payload on the task. Legal only from
    /// *payment-required*; clears the stored requirements so that the
    /// `required` and `payload` keys never coexist.
    pub fn record_payment_submission(
        &self,
        task: &mut Task,
        payload: &PaymentPayload,
    ) -> Result<(), X402Error> {
        match self.get_payment_status(task) {
            Some(PaymentStatus::Required) => {}
            other => {
                return Err(X402Error::state(format!(
                    "payment submission requires payment-required status, found {}",
                    status_name(other)
                )));
            }
        }

        let value =
            serde_json::to_value(payload).map_err(|e| X402Error::message(e.to_string()))?;
        self.set_status(task, PaymentStatus::Submitted);
        task.metadata.insert(X402Metadata::PAYLOAD_KEY.into(), value);
        self.remove_key(task, X402Metadata::REQUIRED_KEY);
        Ok(())
    }

    /// Record successful verification: the payment is now pending settlement.
    pub fn record_payment_verified(&self, task: &mut Task) -> Result<(), X402Error> {
        match self.get_payment_status(task) {
            Some(PaymentStatus::Submitted) => {}
            other => {
                return Err(X402Error::state(format!(
                    "payment verification requires payment-submitted status, found {}",
                    status_name(other)
                )));
            }
        }
        self.set_status(task, PaymentStatus::Pending);
        Ok(())
    }

    /// Record a successful settlement. Legal only from *payment-pending*;
    /// appends the receipt and clears the intermediate keys.
    pub fn record_payment_success(
        &self,
        task: &mut Task,
        settle_response: &SettleResponse,
    ) -> Result<(), X402Error> {
        match self.get_payment_status(task) {
            Some(PaymentStatus::Pending) => {}
            other => {
                return Err(X402Error::state(format!(
                    "payment success requires payment-pending status, found {}",
                    status_name(other)
                )));
            }
        }
        self.set_status(task, PaymentStatus::Completed);
        self.append_receipt(task, settle_response)?;
        self.remove_key(task, X402Metadata::PAYLOAD_KEY);
        self.remove_key(task, X402Metadata::REQUIRED_KEY);
        Ok(())
    }

    /// Record a payment failure from any non-terminal payment state: appends
    /// the receipt, stores the error code, and fails the task.
    pub fn record_payment_failure(
        &self,
        task: &mut Task,
        error_code: ErrorCode,
        settle_response: &SettleResponse,
    ) -> Result<(), X402Error> {
        if let Some(status) = self.get_payment_status(task) {
            if status.is_terminal() {
                return Err(X402Error::state(format!(
                    "cannot fail a payment already in {status}"
                )));
            }
        }
        self.set_status(task, PaymentStatus::Failed);
        task.metadata
            .insert(X402Metadata::ERROR_KEY.into(), error_code.as_str().into());
        self.append_receipt(task, settle_response)?;
        self.remove_key(task, X402Metadata::PAYLOAD_KEY);
        self.remove_key(task, X402Metadata::REQUIRED_KEY);
        task.status.state = TaskState::Failed;
        Ok(())
    }

    /// Record that the client explicitly declined the payment demand. Legal
    /// only from *payment-required*.
    pub fn record_payment_rejected(&self, task: &mut Task) -> Result<(), X402Error> {
        match self.get_payment_status(task) {
            Some(PaymentStatus::Required) => {}
            other => {
                return Err(X402Error::state(format!(
                    "payment rejection requires payment-required status, found {}",
                    status_name(other)
                )));
            }
        }
        self.set_status(task, PaymentStatus::Rejected);
        self.remove_key(task, X402Metadata::REQUIRED_KEY);
        Ok(())
    }

    /// Build the correlated payment submission message a client sends back to
    /// the merchant.
    pub fn create_payment_submission_message(
        &self,
        task_id: &str,
        payload: &PaymentPayload,
    ) -> Result<Message, X402Error> {
        let value =
            serde_json::to_value(payload).map_err(|e| X402Error::message(e.to_string()))?;
        let mut message =
            Message::user_text("Payment authorization provided").with_task_id(task_id);
        message.metadata.insert(
            X402Metadata::STATUS_KEY.into(),
            PaymentStatus::Submitted.as_str().into(),
        );
        message.metadata.insert(X402Metadata::PAYLOAD_KEY.into(), value);
        Ok(message)
    }

    fn set_status(&self, task: &mut Task, status: PaymentStatus) {
        task.metadata
            .insert(X402Metadata::STATUS_KEY.into(), status.as_str().into());
        // Keep the status-message copy coherent when one was written earlier.
        if let Some(message) = task.status.message.as_mut() {
            if message.metadata.contains_key(X402Metadata::STATUS_KEY) {
                message
                    .metadata
                    .insert(X402Metadata::STATUS_KEY.into(), status.as_str().into());
            }
        }
    }

    fn remove_key(&self, task: &mut Task, key: &str) {
        task.metadata.remove(key);
        if let Some(message) = task.status.message.as_mut() {
            message.metadata.remove(key);
        }
    }

    fn append_receipt(
        &self,
        task: &mut Task,
        settle_response: &SettleResponse,
    ) -> Result<(), X402Error> {
        let receipt =
            serde_json::to_value(settle_response).map_err(|e| X402Error::message(e.to_string()))?;
        let mut receipts = match task.metadata.remove(X402Metadata::RECEIPTS_KEY) {
            Some(Value::Array(entries)) => entries,
            // Migrate the singular legacy key into the array form.
            _ => match task.metadata.remove(X402Metadata::LEGACY_RECEIPT_KEY) {
                Some(entry) => vec![entry],
                None => Vec::new(),
            },
        };
        receipts.push(receipt);
        task.metadata
            .insert(X402Metadata::RECEIPTS_KEY.into(), Value::Array(receipts));
        Ok(())
    }
}

/// Extract the task id a message correlates to, if any.
pub fn extract_task_correlation(message: &Message) -> Option<&str> {
    message.task_id.as_deref()
}

fn status_name(status: Option<PaymentStatus>) -> &'static str {
    status.map(|s| s.as_str()).unwrap_or("none")
}
