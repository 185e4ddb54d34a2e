use std::sync::Arc;

use crate::actors::{HealthHandle, HealthStatus};
use crate::lifecycle::Lifecycle;
use crate::messaging::{EventConsumer, InstrumentedHandler, MessageHandler};
use crate::metrics::Metrics;

// ============================================================================
// Services - Event-driven roles
// ============================================================================
//
// - assembly   - OrderPaid → build delay → ShipAssembled
// - completion - ShipAssembled → order ASSEMBLED
// - notifier   - both events → user notifications
//
// Each role runs as one consumer loop per consumer group, spawned through
// `spawn_consumer` so it reports health and stops with the lifecycle.
//
// ============================================================================

pub mod assembly;
pub mod completion;
pub mod notifier;

pub use assembly::{AssemblyError, AssemblySimulator, BuildDuration, FixedBuildDuration, RandomBuildDuration};
pub use completion::CompletionConsumer;
pub use notifier::{LoggingSink, NotificationSink, Notifier, NotifyError};

/// Run `consumer` with `handler` until shutdown, tracked by `lifecycle`.
pub async fn spawn_consumer(
    lifecycle: &Lifecycle,
    consumer: Box<dyn EventConsumer>,
    handler: Arc<dyn MessageHandler>,
    metrics: Arc<Metrics>,
    health: HealthHandle,
) {
    let component = format!("consumer:{}", consumer.group());
    let handler: Arc<dyn MessageHandler> =
        Arc::new(InstrumentedHandler::new(handler, consumer.group(), metrics));
    let shutdown = lifecycle.shutdown_signal();

    let task_component = component.clone();
    let handle = tokio::spawn(async move {
        health.report(&task_component, HealthStatus::Healthy).await;

        let status = match consumer.consume(handler, shutdown).await {
            Ok(()) => HealthStatus::Unhealthy("stopped".to_string()),
            Err(e) => {
                tracing::error!(
                    topic = %consumer.topic(),
                    group = %consumer.group(),
                    error = %e,
                    "❌ Consumer loop failed"
                );
                HealthStatus::Unhealthy(e.to_string())
            }
        };

        health.report(&task_component, status).await;
    });

    lifecycle.track(component, handle).await;
}
