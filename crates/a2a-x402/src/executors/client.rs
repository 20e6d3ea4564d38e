//! Client-side payment middleware for consumer agents.

use alloy_signer::Signer;
use std::sync::Arc;
use tracing::{info, warn};

use a2a_x402_types::{ErrorCode, Network, SettleResponse, TokenAmount};

use crate::a2a::{AgentError, AgentExecutor, EventQueue, RequestContext, Task};
use crate::config::X402ExtensionConfig;
use crate::extension::check_extension_activation;
use crate::state::{PaymentStatus, X402Utils};
use crate::wallet::process_payment_required;

/// Wraps a consumer's executor with automatic payment handling.
///
/// The delegate runs first to send the outbound request. If the resulting
/// task demands payment and `auto_pay` is on, the middleware selects a
/// requirement within `max_value`, signs it, and enqueues the correlated
/// submission message. Signing or selection failures yield a
/// *payment-failed* task rather than an error - the event queue is the only
/// output channel.
///
/// With `auto_pay` off, the payment-required task passes through untouched so
/// the surrounding application can prompt its user.
pub struct X402ClientExecutor<D> {
    delegate: D,
    config: X402ExtensionConfig,
    signer: Arc<dyn Signer + Send + Sync>,
    max_value: Option<TokenAmount>,
    auto_pay: bool,
    utils: X402Utils,
}

impl<D> X402ClientExecutor<D>
where
    D: AgentExecutor,
{
    pub fn new(
        delegate: D,
        config: X402ExtensionConfig,
        signer: Arc<dyn Signer + Send + Sync>,
    ) -> Self {
        Self {
            delegate,
            config,
            signer,
            max_value: None,
            auto_pay: true,
            utils: X402Utils::new(),
        }
    }

    /// Cap the amount this client will authorize, in atomic units.
    pub fn with_max_value(mut self, max_value: TokenAmount) -> Self {
        self.max_value = Some(max_value);
        self
    }

    /// Disable automatic payment; payment-required tasks pass through.
    pub fn with_auto_pay(mut self, auto_pay: bool) -> Self {
        self.auto_pay = auto_pay;
        self
    }

    fn is_active(&self, context: &RequestContext) -> bool {
        check_extension_activation(&context.headers) || self.config.required
    }

    async fn auto_pay_task(&self, mut task: Task, event_queue: &EventQueue) -> Result<(), AgentError> {
        let Some(payment_required) = self.utils.get_payment_requirements(&task) else {
            warn!(task_id = %task.id, "Payment required but no requirements found in metadata");
            return Ok(());
        };

        match process_payment_required(&payment_required, self.signer.as_ref(), self.max_value)
            .await
        {
            Ok(payload) => {
                info!(task_id = %task.id, network = %payload.network, "Signed payment, submitting");
                let submission = self
                    .utils
                    .create_payment_submission_message(&task.id, &payload)?;
                event_queue.enqueue_event(submission)?;
            }
            Err(error) => {
                warn!(task_id = %task.id, %error, "Payment signing failed");
                let network = payment_required
                    .accepts
                    .first()
                    .map(|requirements| requirements.network)
                    .unwrap_or(Network::Base);
                let receipt =
                    SettleResponse::failure(network, format!("Payment failed: {error}"));
                if let Err(record_error) = self.utils.record_payment_failure(
                    &mut task,
                    ErrorCode::InvalidSignature,
                    &receipt,
                ) {
                    warn!(task_id = %task.id, %record_error, "Could not record payment failure");
                }
                event_queue.enqueue_event(task)?;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<D> AgentExecutor for X402ClientExecutor<D>
where
    D: AgentExecutor,
{
    async fn execute(
        &self,
        context: &RequestContext,
        event_queue: &EventQueue,
    ) -> Result<(), AgentError> {
        if !self.is_active(context) {
            return self.delegate.execute(context, event_queue).await;
        }

        // The delegate sends the outbound request first.
        self.delegate.execute(context, event_queue).await?;

        let Some(task) = context.current_task.clone() else {
            return Ok(());
        };

        if self.utils.get_payment_status(&task) == Some(PaymentStatus::Required) && self.auto_pay {
            return self.auto_pay_task(task, event_queue).await;
        }
        Ok(())
    }
}
