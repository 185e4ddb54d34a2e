//! Hand-written fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;

use crate::clients::{ClientError, PartCatalog, PaymentGateway, PricedPart};
use crate::domain::order::{Order, OrderCommandHandler, OrderPaidEvent, OrderStatus, PaymentMethod};
use crate::messaging::{EventProducer, EventPublisher, MessagingError};
use crate::metrics::Metrics;
use crate::services::{NotificationSink, NotifyError};
use crate::store::{InMemoryOrderRepository, OrderRepository, StoreError};

pub const ORDER_PAID_TOPIC: &str = "order.paid";

// ============================================================================
// Strategies
// ============================================================================

pub fn any_status() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(vec![
        OrderStatus::PendingPayment,
        OrderStatus::Paid,
        OrderStatus::Assembled,
        OrderStatus::Cancelled,
    ])
}

pub fn any_payment_method() -> impl Strategy<Value = PaymentMethod> {
    prop::sample::select(vec![
        PaymentMethod::Card,
        PaymentMethod::Sbp,
        PaymentMethod::CreditCard,
        PaymentMethod::InvestorMoney,
    ])
}

// ============================================================================
// Catalog
// ============================================================================

pub struct StaticCatalog {
    prices: HashMap<String, f64>,
    failing: bool,
    calls: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: prices.iter().map(|(id, p)| (id.to_string(), *p)).collect(),
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PartCatalog for StaticCatalog {
    async fn list_parts(&self, part_ids: &[String]) -> Result<Vec<PricedPart>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ClientError::Unavailable {
                service: "inventory",
                message: "connection refused".to_string(),
            });
        }

        Ok(part_ids
            .iter()
            .filter_map(|id| {
                self.prices.get(id).map(|price| PricedPart {
                    id: id.clone(),
                    price: *price,
                })
            })
            .collect())
    }
}

// ============================================================================
// Payment gateway
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GatewayMode {
    Approve,
    Fail,
    Hang,
}

pub struct StubPaymentGateway {
    mode: GatewayMode,
    calls: AtomicUsize,
}

impl StubPaymentGateway {
    fn new(mode: GatewayMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    /// Approves every charge with "tx-1".
    pub fn approving() -> Self {
        Self::new(GatewayMode::Approve)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubPaymentGateway {
    async fn pay(
        &self,
        _order_id: &str,
        _user_id: &str,
        _payment_method: PaymentMethod,
    ) -> Result<String, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            GatewayMode::Approve => Ok("tx-1".to_string()),
            GatewayMode::Fail => Err(ClientError::Status {
                service: "payment",
                code: tonic::Code::Internal,
                message: "card declined".to_string(),
            }),
            GatewayMode::Hang => std::future::pending().await,
        }
    }
}

// ============================================================================
// Producer
// ============================================================================

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
pub struct RecordingProducer {
    sent: Mutex<Vec<SentMessage>>,
    failing: bool,
}

impl RecordingProducer {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventProducer for RecordingProducer {
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), MessagingError> {
        if self.failing {
            return Err(MessagingError::Transport("broker unreachable".to_string()));
        }
        self.sent.lock().unwrap().push(SentMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
        });
        Ok(())
    }
}

// ============================================================================
// Notification sink
// ============================================================================

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    /// (user_id, text) pairs in delivery order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, user_id: &str, text: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((user_id.to_string(), text.to_string()));
        Ok(())
    }
}

// ============================================================================
// Store that serves a stale snapshot, to stage read-then-write races
// ============================================================================

pub struct StaleReadStore {
    inner: Arc<InMemoryOrderRepository>,
    frozen: tokio::sync::Mutex<HashMap<String, Order>>,
}

impl StaleReadStore {
    pub fn new(inner: Arc<InMemoryOrderRepository>) -> Self {
        Self {
            inner,
            frozen: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Every later `get` of `order_id` returns the order as it is now.
    pub async fn freeze(&self, order_id: &str) {
        if let Ok(order) = self.inner.get(order_id).await {
            self.frozen.lock().await.insert(order_id.to_string(), order);
        }
    }
}

#[async_trait]
impl OrderRepository for StaleReadStore {
    async fn create(&self, order: &Order) -> Result<(), StoreError> {
        self.inner.create(order).await
    }

    async fn get(&self, order_id: &str) -> Result<Order, StoreError> {
        if let Some(order) = self.frozen.lock().await.get(order_id) {
            return Ok(order.clone());
        }
        self.inner.get(order_id).await
    }

    async fn update(&self, order: &Order, expected: OrderStatus) -> Result<(), StoreError> {
        self.inner.update(order, expected).await
    }
}

// ============================================================================
// Order harness
// ============================================================================

pub struct OrderHarness {
    pub handler: Arc<OrderCommandHandler>,
    pub store: Arc<dyn OrderRepository>,
    pub catalog: Arc<StaticCatalog>,
    pub payments: Arc<StubPaymentGateway>,
    pub producer: Arc<RecordingProducer>,
    pub metrics: Arc<Metrics>,
}

impl OrderHarness {
    /// Catalog p1=100.0, p2=50.0; gateway approves with "tx-1".
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> OrderHarnessBuilder {
        OrderHarnessBuilder {
            failing_catalog: false,
            prices: None,
            gateway: GatewayMode::Approve,
            failing_producer: false,
            call_timeout: Duration::from_secs(5),
            store: None,
        }
    }
}

pub struct OrderHarnessBuilder {
    failing_catalog: bool,
    prices: Option<HashMap<String, f64>>,
    gateway: GatewayMode,
    failing_producer: bool,
    call_timeout: Duration,
    store: Option<Arc<dyn OrderRepository>>,
}

impl OrderHarnessBuilder {
    pub fn failing_catalog(mut self) -> Self {
        self.failing_catalog = true;
        self
    }

    /// Replace the default p1/p2 catalog.
    pub fn prices(mut self, prices: HashMap<String, f64>) -> Self {
        self.prices = Some(prices);
        self
    }

    pub fn failing_payments(mut self) -> Self {
        self.gateway = GatewayMode::Fail;
        self
    }

    pub fn hanging_payments(mut self) -> Self {
        self.gateway = GatewayMode::Hang;
        self
    }

    pub fn failing_producer(mut self) -> Self {
        self.failing_producer = true;
        self
    }

    pub fn call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn store(mut self, store: Arc<dyn OrderRepository>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> OrderHarness {
        let mut catalog = StaticCatalog::new(&[("p1", 100.0), ("p2", 50.0)]);
        if let Some(prices) = self.prices {
            catalog.prices = prices;
        }
        catalog.failing = self.failing_catalog;
        let catalog = Arc::new(catalog);

        let payments = Arc::new(StubPaymentGateway::new(self.gateway));
        let producer = Arc::new(RecordingProducer {
            failing: self.failing_producer,
            ..Default::default()
        });
        let metrics = Arc::new(Metrics::new().unwrap());
        let store: Arc<dyn OrderRepository> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryOrderRepository::new()),
        };

        let publisher: EventPublisher<OrderPaidEvent> =
            EventPublisher::new(producer.clone(), ORDER_PAID_TOPIC, metrics.clone());

        let handler = Arc::new(OrderCommandHandler::new(
            store.clone(),
            catalog.clone(),
            payments.clone(),
            publisher,
            metrics.clone(),
            self.call_timeout,
        ));

        OrderHarness {
            handler,
            store,
            catalog,
            payments,
            producer,
            metrics,
        }
    }
}
