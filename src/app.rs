use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::actors::{HealthHandle, HealthMonitorActor};
use crate::clients::{InventoryClient, PartCatalog, PaymentClient, PaymentGateway};
use crate::config::{BrokerBackend, Config, StoreBackend};
use crate::domain::order::{OrderCommandHandler, OrderPaidEvent, ShipAssembledEvent};
use crate::lifecycle::Lifecycle;
use crate::messaging::dedup::{InMemoryProcessedOrders, ProcessedOrders, RedisProcessedOrders};
use crate::messaging::{
    EventConsumer, EventProducer, EventPublisher, InMemoryBroker, MessageHandler, MessagingError,
    RedpandaConsumer, RedpandaProducer,
};
use crate::metrics::Metrics;
use crate::services::{
    spawn_consumer, AssemblySimulator, BuildDuration, CompletionConsumer, LoggingSink,
    NotificationSink, Notifier, RandomBuildDuration,
};
use crate::store::{InMemoryOrderRepository, OrderRepository, ScyllaOrderRepository};
use crate::utils::{connect_with_retry, CircuitBreaker, RetryPolicy};

// ============================================================================
// Composition Root
// ============================================================================
//
// Leaf components first (store, broker, RPC clients, dedup), then the roles
// that depend on them. Every resource that needs closing registers a cleanup
// with the lifecycle as soon as it exists.
//
// ============================================================================

/// Broker backend with a way to open consumers.
#[derive(Clone)]
pub enum Broker {
    Memory(Arc<InMemoryBroker>),
    Redpanda {
        producer: Arc<RedpandaProducer>,
        brokers: String,
    },
}

impl Broker {
    pub fn producer(&self) -> Arc<dyn EventProducer> {
        match self {
            Broker::Memory(broker) => broker.clone(),
            Broker::Redpanda { producer, .. } => producer.clone(),
        }
    }

    pub fn consumer(&self, topic: &str, group: &str) -> Result<Box<dyn EventConsumer>, MessagingError> {
        match self {
            Broker::Memory(broker) => Ok(Box::new(broker.consumer(topic, group))),
            Broker::Redpanda { brokers, .. } => Ok(Box::new(RedpandaConsumer::new(brokers, group, topic)?)),
        }
    }
}

/// Everything the roles are built from.
pub struct Components {
    pub store: Arc<dyn OrderRepository>,
    pub broker: Broker,
    pub catalog: Arc<dyn PartCatalog>,
    pub payments: Arc<dyn PaymentGateway>,
    pub processed: Arc<dyn ProcessedOrders>,
    pub durations: Arc<dyn BuildDuration>,
    pub sink: Arc<dyn NotificationSink>,
    pub metrics: Arc<Metrics>,
    pub health: HealthHandle,
}

/// Connect every external dependency named by `config`.
pub async fn connect(config: &Config, lifecycle: &Lifecycle) -> anyhow::Result<Components> {
    let metrics = Arc::new(Metrics::new().context("failed to create metrics registry")?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    let startup = RetryPolicy::fixed(config.startup_attempts, config.startup_backoff);
    let mut breakers: Vec<CircuitBreaker> = Vec::new();

    // === 1. Order Store ===
    let store: Arc<dyn OrderRepository> = match config.store_backend {
        StoreBackend::Memory => Arc::new(InMemoryOrderRepository::new()),
        StoreBackend::Scylla => {
            let repo = connect_with_retry("scylla", &startup, |_| {
                ScyllaOrderRepository::connect(&config.scylla.nodes, &config.scylla.keyspace)
            })
            .await?;
            Arc::new(repo)
        }
    };

    // === 2. Broker ===
    let broker = match config.broker.backend {
        BrokerBackend::Memory => Broker::Memory(InMemoryBroker::new()),
        BrokerBackend::Redpanda => {
            let producer = connect_with_retry("redpanda", &startup, |_| async {
                let producer = RedpandaProducer::new(&config.broker.brokers)?;
                producer.ping(config.call_timeout)?;
                Ok::<_, MessagingError>(producer)
            })
            .await?;
            let producer = Arc::new(producer);
            breakers.push(producer.circuit_breaker().clone());

            let flush = producer.clone();
            let timeout = config.call_timeout;
            lifecycle
                .register("redpanda-producer", move || async move {
                    flush.flush(timeout).map_err(|e| e.to_string())
                })
                .await;

            Broker::Redpanda {
                producer,
                brokers: config.broker.brokers.clone(),
            }
        }
    };

    // === 3. RPC collaborators (lazy channels) ===
    let inventory = InventoryClient::new(&config.inventory_addr, config.call_timeout)
        .context("invalid INVENTORY_GRPC_ADDR")?;
    let payment = PaymentClient::new(&config.payment_addr, config.call_timeout)
        .context("invalid PAYMENT_GRPC_ADDR")?;
    breakers.push(inventory.circuit_breaker().clone());
    breakers.push(payment.circuit_breaker().clone());

    // === 4. Processed-order set ===
    let processed: Arc<dyn ProcessedOrders> = match &config.assembly.redis_url {
        Some(url) => {
            let ttl = config.assembly.dedup_ttl_seconds;
            let redis = connect_with_retry("redis", &startup, |_| RedisProcessedOrders::connect(url, ttl)).await?;
            Arc::new(redis)
        }
        None => Arc::new(InMemoryProcessedOrders::new(Duration::from_secs(
            config.assembly.dedup_ttl_seconds,
        ))),
    };

    // === 5. Health monitor ===
    let mut monitor = HealthMonitorActor::new(metrics.clone(), lifecycle.shutdown_signal());
    for breaker in breakers {
        monitor = monitor.watch_breaker(breaker);
    }

    Ok(Components {
        store,
        broker,
        catalog: Arc::new(inventory),
        payments: Arc::new(payment),
        processed,
        durations: Arc::new(RandomBuildDuration::new(
            config.assembly.min_build_seconds,
            config.assembly.max_build_seconds,
        )),
        sink: Arc::new(LoggingSink),
        metrics,
        health: HealthHandle::spawn(monitor),
    })
}

/// Spawn the consumer loops for every enabled role. Returns the order
/// orchestrator when the order role is hosted here.
pub async fn start_roles(
    config: &Config,
    components: &Components,
    lifecycle: &Lifecycle,
) -> Result<Option<Arc<OrderCommandHandler>>, MessagingError> {
    let topics = &config.broker;
    let producer = components.broker.producer();
    let metrics = components.metrics.clone();

    let mut consumers: Vec<(Box<dyn EventConsumer>, Arc<dyn MessageHandler>)> = Vec::new();
    let mut orders = None;

    if config.roles.order {
        let publisher: EventPublisher<OrderPaidEvent> =
            EventPublisher::new(producer.clone(), topics.order_paid_topic.clone(), metrics.clone());

        orders = Some(Arc::new(OrderCommandHandler::new(
            components.store.clone(),
            components.catalog.clone(),
            components.payments.clone(),
            publisher,
            metrics.clone(),
            config.call_timeout,
        )));

        consumers.push((
            components
                .broker
                .consumer(&topics.ship_assembled_topic, &topics.completion_group)?,
            Arc::new(CompletionConsumer::new(components.store.clone(), metrics.clone())),
        ));
    }

    if config.roles.assembly {
        let publisher: EventPublisher<ShipAssembledEvent> =
            EventPublisher::new(producer.clone(), topics.ship_assembled_topic.clone(), metrics.clone());

        consumers.push((
            components
                .broker
                .consumer(&topics.order_paid_topic, &topics.assembly_group)?,
            Arc::new(AssemblySimulator::new(
                publisher,
                components.durations.clone(),
                components.processed.clone(),
                metrics.clone(),
                lifecycle.shutdown_signal(),
            )),
        ));
    }

    if config.roles.notification {
        consumers.push((
            components
                .broker
                .consumer(&topics.order_paid_topic, &topics.notification_paid_group)?,
            Arc::new(Notifier::<OrderPaidEvent>::new(components.sink.clone())),
        ));
        consumers.push((
            components
                .broker
                .consumer(&topics.ship_assembled_topic, &topics.notification_assembled_group)?,
            Arc::new(Notifier::<ShipAssembledEvent>::new(components.sink.clone())),
        ));
    }

    for (consumer, handler) in consumers {
        tracing::info!(topic = %consumer.topic(), group = %consumer.group(), "Starting consumer");
        spawn_consumer(
            lifecycle,
            consumer,
            handler,
            metrics.clone(),
            components.health.clone(),
        )
        .await;
    }

    Ok(orders)
}

// ============================================================================
// End-to-end Tests (in-memory stack)
// ============================================================================
