//! Server-side payment middleware for merchant agents.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use a2a_x402_types::{
    ErrorCode, Network, PaymentPayload, PaymentRequiredResponse, PaymentRequirements,
    SettleResponse, VerifyRequest, X402Version,
};

use crate::a2a::{AgentError, AgentExecutor, EventQueue, RequestContext, Task, TaskState};
use crate::config::X402ExtensionConfig;
use crate::exception::PaymentRequiredException;
use crate::extension::check_extension_activation;
use crate::protocol::{
    DEFAULT_VERIFY_TIMEOUT, Facilitator, settle_payment, verify_payment_with_timeout,
};
use crate::state::{PAYMENT_VERIFIED_KEY, PaymentStatus, X402Utils};

/// Custom requirement-matching hook: given the stored alternatives and the
/// submitted payload, return the index of the matching requirement.
pub type RequirementMatcher =
    Arc<dyn Fn(&[PaymentRequirements], &PaymentPayload) -> Option<usize> + Send + Sync>;

/// Wraps a merchant's business executor with the x402 payment protocol.
///
/// The delegate requests payment by returning
/// [`AgentError::PaymentRequired`]; the middleware stores the demanded
/// requirements keyed by task id, parks the task in *payment-required*, and
/// on the client's resubmission runs verify → delegate → settle, recording
/// the outcome in task metadata. Failures never propagate out of the
/// middleware: every paid request ends in a terminal task event.
///
/// One instance serves many concurrent tasks; the requirements store is a
/// concurrent map, and per-task message order is guaranteed by the transport.
pub struct X402ServerExecutor<D, F> {
    delegate: D,
    facilitator: F,
    config: X402ExtensionConfig,
    utils: X402Utils,
    requirements_store: DashMap<String, Vec<PaymentRequirements>>,
    matcher: Option<RequirementMatcher>,
    verify_timeout: Duration,
}

impl<D, F> X402ServerExecutor<D, F>
where
    D: AgentExecutor,
    F: Facilitator + Send + Sync,
{
    pub fn new(delegate: D, facilitator: F, config: X402ExtensionConfig) -> Self {
        Self {
            delegate,
            facilitator,
            config,
            utils: X402Utils::new(),
            requirements_store: DashMap::new(),
            matcher: None,
            verify_timeout: DEFAULT_VERIFY_TIMEOUT,
        }
    }

    /// Override the default `(scheme, network)` equality match between the
    /// submitted payload and the stored requirement alternatives.
    pub fn with_matcher(mut self, matcher: RequirementMatcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn with_verify_timeout(mut self, timeout: Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    /// Number of tasks currently awaiting payment submission.
    pub fn pending_payments(&self) -> usize {
        self.requirements_store.len()
    }

    fn is_active(&self, context: &RequestContext) -> bool {
        check_extension_activation(&context.headers) || self.config.required
    }

    /// Match the submitted payload against the stored alternatives. The
    /// default matches on `(scheme, network)` equality, ties broken by list
    /// order.
    fn find_matching_payment_requirement<'a>(
        &self,
        accepts: &'a [PaymentRequirements],
        payload: &PaymentPayload,
    ) -> Option<&'a PaymentRequirements> {
        if let Some(matcher) = &self.matcher {
            return matcher(accepts, payload).and_then(|index| accepts.get(index));
        }
        accepts.iter().find(|requirements| {
            requirements.scheme == payload.scheme && requirements.network == payload.network
        })
    }

    /// Park the task in *payment-required*, remembering the demanded
    /// requirements for the submission turn.
    async fn handle_payment_required(
        &self,
        exception: PaymentRequiredException,
        mut task: Task,
        event_queue: &EventQueue,
    ) -> Result<(), AgentError> {
        info!(task_id = %task.id, "Business logic requested payment");
        let accepts = exception.accepts().to_vec();
        self.requirements_store.insert(task.id.clone(), accepts.clone());

        let payment_required =
            PaymentRequiredResponse::new(accepts, Some(exception.message().to_string()));
        self.utils
            .create_payment_required_task(&mut task, &payment_required)?;
        event_queue.enqueue_event(task)?;
        Ok(())
    }

    /// Terminal failure path: record the failure, drop the store entry, and
    /// emit the failed task.
    async fn fail_payment(
        &self,
        mut task: Task,
        error_code: ErrorCode,
        reason: &str,
        network: Option<Network>,
        event_queue: &EventQueue,
    ) -> Result<(), AgentError> {
        warn!(task_id = %task.id, code = %error_code, reason, "Payment failed");
        let receipt =
            SettleResponse::failure(network.unwrap_or(Network::Base), reason.to_string());
        if let Err(error) = self
            .utils
            .record_payment_failure(&mut task, error_code, &receipt)
        {
            warn!(task_id = %task.id, %error, "Could not record payment failure");
        }
        self.requirements_store.remove(&task.id);
        event_queue.enqueue_event(task)?;
        Ok(())
    }

    /// The paid-request pipeline: verify → delegate → settle.
    async fn process_paid_request(
        &self,
        mut task: Task,
        context: &RequestContext,
        event_queue: &EventQueue,
    ) -> Result<(), AgentError> {
        info!(task_id = %task.id, "Payment submitted, beginning verification");

        let raw_payload: Option<Value> = self
            .utils
            .get_payment_payload_value(&task)
            .or_else(|| {
                self.utils
                    .get_payment_payload_value_from_message(&context.message)
            })
            .cloned();
        let Some(raw_payload) = raw_payload else {
            return self
                .fail_payment(
                    task,
                    ErrorCode::InvalidSignature,
                    "Missing payment data",
                    None,
                    event_queue,
                )
                .await;
        };

        // Unknown protocol versions are rejected before any facilitator call.
        if let Some(version) = raw_payload.get("x402Version").and_then(Value::as_u64) {
            if version != X402Version::VALUE as u64 {
                return self
                    .fail_payment(
                        task,
                        ErrorCode::InvalidAmount,
                        &format!("Unsupported x402 version: {version}"),
                        None,
                        event_queue,
                    )
                    .await;
            }
        }

        let payload: PaymentPayload = match serde_json::from_value(raw_payload) {
            Ok(payload) => payload,
            Err(error) => {
                return self
                    .fail_payment(
                        task,
                        ErrorCode::InvalidSignature,
                        &format!("Malformed payment payload: {error}"),
                        None,
                        event_queue,
                    )
                    .await;
            }
        };
        let network = payload.network;

        let Some(accepts) = self
            .requirements_store
            .get(&task.id)
            .map(|entry| entry.value().clone())
        else {
            return self
                .fail_payment(
                    task,
                    ErrorCode::InvalidSignature,
                    "Missing payment requirements",
                    Some(network),
                    event_queue,
                )
                .await;
        };

        let Some(requirements) = self.find_matching_payment_requirement(&accepts, &payload) else {
            return self
                .fail_payment(
                    task,
                    ErrorCode::InvalidAmount,
                    "No matching payment requirements",
                    Some(network),
                    event_queue,
                )
                .await;
        };
        let requirements = requirements.clone();

        // The submission usually arrives on the message; pull it onto the
        // task so the recorded state walks required → submitted → pending.
        if self.utils.get_payment_status(&task) == Some(PaymentStatus::Required) {
            if let Err(error) = self.utils.record_payment_submission(&mut task, &payload) {
                return self
                    .fail_payment(
                        task,
                        ErrorCode::SettlementFailed,
                        &format!("Could not record submission: {error}"),
                        Some(network),
                        event_queue,
                    )
                    .await;
            }
        }

        let request = VerifyRequest::new(payload, requirements);
        match verify_payment_with_timeout(&request, &self.facilitator, self.verify_timeout).await {
            Ok(response) if response.is_valid => {
                info!(task_id = %task.id, payer = ?response.payer, "Payment verified");
            }
            Ok(response) => {
                let reason = response
                    .invalid_reason
                    .unwrap_or_else(|| "Invalid payment".to_string());
                return self
                    .fail_payment(
                        task,
                        ErrorCode::InvalidSignature,
                        &reason,
                        Some(network),
                        event_queue,
                    )
                    .await;
            }
            Err(error) => {
                return self
                    .fail_payment(
                        task,
                        ErrorCode::SettlementFailed,
                        &error.to_string(),
                        Some(network),
                        event_queue,
                    )
                    .await;
            }
        }

        if let Err(error) = self.utils.record_payment_verified(&mut task) {
            return self
                .fail_payment(
                    task,
                    ErrorCode::SettlementFailed,
                    &format!("Could not record verification: {error}"),
                    Some(network),
                    event_queue,
                )
                .await;
        }
        event_queue.enqueue_event(task.clone())?;

        // Flag paid execution for the delegate.
        task.metadata.insert(PAYMENT_VERIFIED_KEY.into(), Value::Bool(true));
        let mut delegate_context = context.clone();
        delegate_context.current_task = Some(task.clone());

        if let Err(error) = self.delegate.execute(&delegate_context, event_queue).await {
            return self
                .fail_payment(
                    task,
                    ErrorCode::SettlementFailed,
                    &format!("Service failed: {error}"),
                    Some(network),
                    event_queue,
                )
                .await;
        }

        info!(task_id = %task.id, "Delegate execution complete, settling payment");
        let settle_response = settle_payment(&request, &self.facilitator).await;
        if settle_response.success {
            if let Err(error) = self.utils.record_payment_success(&mut task, &settle_response) {
                return self
                    .fail_payment(
                        task,
                        ErrorCode::SettlementFailed,
                        &format!("Could not record settlement: {error}"),
                        Some(network),
                        event_queue,
                    )
                    .await;
            }
            task.status.state = TaskState::Completed;
            info!(task_id = %task.id, transaction = ?settle_response.transaction, "Payment completed");
        } else {
            let reason = settle_response
                .error_reason
                .clone()
                .unwrap_or_else(|| "Settlement failed".to_string());
            let error_code = if reason.to_lowercase().contains("insufficient") {
                ErrorCode::InsufficientFunds
            } else {
                ErrorCode::SettlementFailed
            };
            warn!(task_id = %task.id, code = %error_code, reason, "Settlement failed");
            if let Err(error) =
                self.utils
                    .record_payment_failure(&mut task, error_code, &settle_response)
            {
                warn!(task_id = %task.id, %error, "Could not record settlement failure");
            }
        }
        self.requirements_store.remove(&task.id);
        event_queue.enqueue_event(task)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<D, F> AgentExecutor for X402ServerExecutor<D, F>
where
    D: AgentExecutor,
    F: Facilitator + Send + Sync,
{
    async fn execute(
        &self,
        context: &RequestContext,
        event_queue: &EventQueue,
    ) -> Result<(), AgentError> {
        if !self.is_active(context) {
            return self.delegate.execute(context, event_queue).await;
        }

        // The middleware owns the A2A-level lifecycle: the task must exist
        // and be working before the delegate runs.
        let mut task = context
            .current_task
            .clone()
            .unwrap_or_else(|| Task::new(context.task_id.clone(), context.context_id.clone()));
        if context.current_task.is_none() {
            event_queue.enqueue_event(task.clone())?;
        }
        task.status.state = TaskState::Working;
        event_queue.enqueue_event(task.clone())?;

        let submitted = self.utils.get_payment_status(&task) == Some(PaymentStatus::Submitted)
            || self.utils.get_payment_status_from_message(&context.message)
                == Some(PaymentStatus::Submitted);
        if submitted {
            return self.process_paid_request(task, context, event_queue).await;
        }

        match self.delegate.execute(context, event_queue).await {
            Ok(()) => Ok(()),
            Err(AgentError::PaymentRequired(exception)) => {
                self.handle_payment_required(exception, task, event_queue)
                    .await
            }
            Err(other) => Err(other),
        }
    }
}
