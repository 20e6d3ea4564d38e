//! End-to-end payment flows over the server and client middleware, driven by
//! a scripted facilitator and counting delegates.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_signer_local::PrivateKeySigner;

use a2a_x402::a2a::{
    AgentError, AgentExecutor, Event, EventQueue, Message, RequestContext, Task, TaskState,
};
use a2a_x402::exception::PaymentRequiredException;
use a2a_x402::protocol::Facilitator;
use a2a_x402::state::{PaymentStatus, X402Metadata, X402Utils};
use a2a_x402::types::{
    Network, PaymentRequiredResponse, Price, SettleRequest, SettleResponse, TokenAmount,
    VerifyRequest, VerifyResponse,
};
use a2a_x402::{X402ClientExecutor, X402ExtensionConfig, X402ServerExecutor};

const MERCHANT: &str = "0x2222222222222222222222222222222222222222";

/// Facilitator with scripted responses and call counters.
#[derive(Clone)]
struct ScriptedFacilitator {
    verify_response: VerifyResponse,
    settle_response: SettleResponse,
    verify_calls: Arc<AtomicUsize>,
    settle_calls: Arc<AtomicUsize>,
}

impl ScriptedFacilitator {
    fn new(verify_response: VerifyResponse, settle_response: SettleResponse) -> Self {
        Self {
            verify_response,
            settle_response,
            verify_calls: Arc::new(AtomicUsize::new(0)),
            settle_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn happy() -> Self {
        Self::new(
            VerifyResponse::valid("0xBuyer"),
            SettleResponse {
                success: true,
                error_reason: None,
                transaction: Some("0xTX".into()),
                network: Network::Base,
                payer: Some("0xBuyer".into()),
            },
        )
    }
}

impl Facilitator for ScriptedFacilitator {
    type Error = String;

    async fn verify(&self, _request: &VerifyRequest) -> Result<VerifyResponse, String> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verify_response.clone())
    }

    async fn settle(&self, _request: &SettleRequest) -> Result<SettleResponse, String> {
        self.settle_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.settle_response.clone())
    }
}

/// Merchant business logic: demands $1.50 before doing any work, completes
/// the task once the middleware has flagged the payment as verified.
struct MerchantAgent {
    calls: Arc<AtomicUsize>,
}

impl MerchantAgent {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait::async_trait]
impl AgentExecutor for MerchantAgent {
    async fn execute(
        &self,
        context: &RequestContext,
        event_queue: &EventQueue,
    ) -> Result<(), AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let paid = context
            .current_task
            .as_ref()
            .map(|task| {
                task.metadata
                    .get("x402_payment_verified")
                    .and_then(|value| value.as_bool())
                    .unwrap_or(false)
            })
            .unwrap_or(false);
        if !paid {
            return Err(PaymentRequiredException::for_service(
                Price::try_from("$1.50").unwrap(),
                MERCHANT,
                "/svc",
                Network::Base,
                None,
                None,
            )
            .unwrap()
            .into());
        }

        let mut task = context.current_task.clone().expect("paid task exists");
        task.status.state = TaskState::Completed;
        event_queue.enqueue_event(task)?;
        Ok(())
    }
}

/// Consumer delegate that just sends its request; nothing to do locally.
struct NoopAgent;

#[async_trait::async_trait]
impl AgentExecutor for NoopAgent {
    async fn execute(
        &self,
        _context: &RequestContext,
        _event_queue: &EventQueue,
    ) -> Result<(), AgentError> {
        Ok(())
    }
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn last_task(events: &[Event]) -> Task {
    events
        .iter()
        .rev()
        .find_map(|event| match event {
            Event::Task(task) => Some(task.clone()),
            Event::Message(_) => None,
        })
        .expect("at least one task event")
}

fn last_message(events: &[Event]) -> Option<Message> {
    events.iter().rev().find_map(|event| match event {
        Event::Message(message) => Some(message.clone()),
        Event::Task(_) => None,
    })
}

/// Drive the server through the initial request, returning the
/// payment-required task.
async fn request_payment<F>(server: &X402ServerExecutor<MerchantAgent, F>) -> Task
where
    F: Facilitator + Send + Sync,
{
    let (queue, mut rx) = EventQueue::channel();
    let context = RequestContext::new(Message::user_text("buy the service"), None);
    server.execute(&context, &queue).await.unwrap();
    let events = drain(&mut rx);
    let task = last_task(&events);
    assert_eq!(task.status.state, TaskState::InputRequired);
    task
}

/// Sign the demanded payment and resubmit it, returning the terminal task.
async fn submit_payment<F>(
    server: &X402ServerExecutor<MerchantAgent, F>,
    required_task: &Task,
) -> Vec<Event>
where
    F: Facilitator + Send + Sync,
{
    let utils = X402Utils::new();
    let required = utils
        .get_payment_requirements(required_task)
        .expect("payment requirements on task");
    let signer = PrivateKeySigner::random();
    let payload = a2a_x402::process_payment_required(&required, &signer, None)
        .await
        .expect("signing succeeds");
    let submission = utils
        .create_payment_submission_message(&required_task.id, &payload)
        .unwrap();

    let (queue, mut rx) = EventQueue::channel();
    let context = RequestContext::new(submission, Some(required_task.clone()));
    server.execute(&context, &queue).await.unwrap();
    drain(&mut rx)
}

#[tokio::test]
async fn happy_path_completes_payment_with_receipt() {
    let facilitator = ScriptedFacilitator::happy();
    let (merchant, merchant_calls) = MerchantAgent::new();
    let server = X402ServerExecutor::new(
        merchant,
        facilitator.clone(),
        X402ExtensionConfig::default(),
    );
    let utils = X402Utils::new();

    let required_task = request_payment(&server).await;
    assert_eq!(merchant_calls.load(Ordering::SeqCst), 1);
    assert_eq!(server.pending_payments(), 1);
    let required = utils.get_payment_requirements(&required_task).unwrap();
    assert_eq!(
        required.accepts[0].max_amount_required,
        TokenAmount(1_500_000)
    );

    let events = submit_payment(&server, &required_task).await;
    let final_task = last_task(&events);

    assert_eq!(
        utils.get_payment_status(&final_task),
        Some(PaymentStatus::Completed)
    );
    let receipts = utils.get_payment_receipts(&final_task);
    assert_eq!(receipts.len(), 1);
    assert!(receipts[0].success);
    assert_eq!(receipts[0].transaction.as_deref(), Some("0xTX"));
    assert!(!final_task.metadata.contains_key(X402Metadata::PAYLOAD_KEY));
    assert!(!final_task.metadata.contains_key(X402Metadata::REQUIRED_KEY));

    assert_eq!(merchant_calls.load(Ordering::SeqCst), 2);
    assert_eq!(facilitator.verify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 1);
    assert_eq!(server.pending_payments(), 0);
}

#[tokio::test]
async fn insufficient_funds_maps_to_stable_code() {
    let facilitator = ScriptedFacilitator::new(
        VerifyResponse::valid("0xBuyer"),
        SettleResponse::failure(Network::Base, "insufficient balance"),
    );
    let (merchant, _) = MerchantAgent::new();
    let server = X402ServerExecutor::new(
        merchant,
        facilitator.clone(),
        X402ExtensionConfig::default(),
    );
    let utils = X402Utils::new();

    let required_task = request_payment(&server).await;
    let events = submit_payment(&server, &required_task).await;
    let final_task = last_task(&events);

    assert_eq!(
        utils.get_payment_status(&final_task),
        Some(PaymentStatus::Failed)
    );
    assert_eq!(
        final_task.metadata.get(X402Metadata::ERROR_KEY).unwrap(),
        "INSUFFICIENT_FUNDS"
    );
    let receipts = utils.get_payment_receipts(&final_task);
    assert_eq!(receipts.len(), 1);
    assert!(!receipts[0].success);
    assert_eq!(server.pending_payments(), 0);
}

#[tokio::test]
async fn verification_failure_skips_delegate_and_settlement() {
    let facilitator = ScriptedFacilitator::new(
        VerifyResponse::invalid("bad sig"),
        SettleResponse::failure(Network::Base, "unused"),
    );
    let (merchant, merchant_calls) = MerchantAgent::new();
    let server = X402ServerExecutor::new(
        merchant,
        facilitator.clone(),
        X402ExtensionConfig::default(),
    );
    let utils = X402Utils::new();

    let required_task = request_payment(&server).await;
    let events = submit_payment(&server, &required_task).await;
    let final_task = last_task(&events);

    assert_eq!(
        utils.get_payment_status(&final_task),
        Some(PaymentStatus::Failed)
    );
    assert_eq!(
        final_task.metadata.get(X402Metadata::ERROR_KEY).unwrap(),
        "INVALID_SIGNATURE"
    );
    let receipts = utils.get_payment_receipts(&final_task);
    assert!(receipts[0]
        .error_reason
        .as_deref()
        .unwrap()
        .contains("bad sig"));

    // Only the initial pre-payment invocation reached the delegate.
    assert_eq!(merchant_calls.load(Ordering::SeqCst), 1);
    assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 0);
    assert_eq!(server.pending_payments(), 0);
}

#[tokio::test]
async fn submission_without_stored_requirements_fails() {
    let facilitator = ScriptedFacilitator::happy();
    let (merchant, _) = MerchantAgent::new();
    let server = X402ServerExecutor::new(
        merchant,
        facilitator.clone(),
        X402ExtensionConfig::default(),
    );
    let utils = X402Utils::new();

    // A submission arrives for a task this server never parked: the store
    // has no entry (e.g., the process restarted), so the payment fails.
    let required_task = request_payment(&server).await;
    let stale = {
        let (other_merchant, _) = MerchantAgent::new();
        let other_server = X402ServerExecutor::new(
            other_merchant,
            facilitator.clone(),
            X402ExtensionConfig::default(),
        );
        submit_payment(&other_server, &required_task).await
    };
    let final_task = last_task(&stale);
    assert_eq!(
        utils.get_payment_status(&final_task),
        Some(PaymentStatus::Failed)
    );
    assert_eq!(
        final_task.metadata.get(X402Metadata::ERROR_KEY).unwrap(),
        "INVALID_SIGNATURE"
    );
    assert_eq!(facilitator.verify_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn client_budget_breach_fails_without_submitting() {
    let utils = X402Utils::new();

    // A merchant advertising $10; the client caps at $5.
    let requirements = a2a_x402::create_payment_requirements(
        Price::try_from("$10").unwrap(),
        MERCHANT,
        "/svc",
        Network::Base,
    )
    .unwrap();
    let mut task = Task::new("task-d", "ctx-d");
    utils
        .create_payment_required_task(
            &mut task,
            &PaymentRequiredResponse::new(vec![requirements], None),
        )
        .unwrap();

    let signer = PrivateKeySigner::random();
    let client = X402ClientExecutor::new(
        NoopAgent,
        X402ExtensionConfig::default(),
        Arc::new(signer),
    )
    .with_max_value(TokenAmount(5_000_000));

    let (queue, mut rx) = EventQueue::channel();
    let context = RequestContext::new(Message::user_text("buy"), Some(task));
    client.execute(&context, &queue).await.unwrap();
    let events = drain(&mut rx);

    assert!(last_message(&events).is_none(), "no submission was sent");
    let final_task = last_task(&events);
    assert_eq!(
        utils.get_payment_status(&final_task),
        Some(PaymentStatus::Failed)
    );
    assert_eq!(
        final_task.metadata.get(X402Metadata::ERROR_KEY).unwrap(),
        "INVALID_SIGNATURE"
    );
}

#[tokio::test]
async fn client_auto_pays_within_budget() {
    let utils = X402Utils::new();
    let requirements = a2a_x402::create_payment_requirements(
        Price::try_from("$1.50").unwrap(),
        MERCHANT,
        "/svc",
        Network::Base,
    )
    .unwrap();
    let mut task = Task::new("task-pay", "ctx-pay");
    utils
        .create_payment_required_task(
            &mut task,
            &PaymentRequiredResponse::new(vec![requirements], None),
        )
        .unwrap();

    let client = X402ClientExecutor::new(
        NoopAgent,
        X402ExtensionConfig::default(),
        Arc::new(PrivateKeySigner::random()),
    )
    .with_max_value(TokenAmount(5_000_000));

    let (queue, mut rx) = EventQueue::channel();
    let context = RequestContext::new(Message::user_text("buy"), Some(task));
    client.execute(&context, &queue).await.unwrap();
    let events = drain(&mut rx);

    let submission = last_message(&events).expect("submission message");
    assert_eq!(submission.task_id.as_deref(), Some("task-pay"));
    assert_eq!(
        utils.get_payment_status_from_message(&submission),
        Some(PaymentStatus::Submitted)
    );
    let payload = utils
        .get_payment_payload_from_message(&submission)
        .expect("payload rides on the message");
    assert_eq!(payload.network, Network::Base);
}

#[tokio::test]
async fn inactive_extension_bypasses_payment_logic() {
    let facilitator = ScriptedFacilitator::happy();
    let calls = Arc::new(AtomicUsize::new(0));

    struct PlainAgent {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl AgentExecutor for PlainAgent {
        async fn execute(
            &self,
            _context: &RequestContext,
            _event_queue: &EventQueue,
        ) -> Result<(), AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let server = X402ServerExecutor::new(
        PlainAgent {
            calls: calls.clone(),
        },
        facilitator,
        X402ExtensionConfig::optional(),
    );

    let (queue, mut rx) = EventQueue::channel();
    let context = RequestContext::new(Message::user_text("hello"), None);
    server.execute(&context, &queue).await.unwrap();

    // Delegate invoked exactly once, with no payment or lifecycle events.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(drain(&mut rx).is_empty());
}
