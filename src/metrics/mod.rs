use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

use crate::domain::order::{ErrorKind, OrderStatus};
use crate::utils::CircuitState;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order creation and status transitions
// - Operation errors by kind
// - Event publishing and per-group message handling
// - Assembly build durations
// - Circuit breaker state per dependency
//
// All metrics are registered with one registry and scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub orders_created: IntCounter,
    pub order_transitions: IntCounterVec,
    pub operation_errors: IntCounterVec,

    // Messaging Metrics
    pub events_published: IntCounterVec,
    pub publish_failures: IntCounterVec,
    pub messages_handled: IntCounterVec,
    pub handler_failures: IntCounterVec,

    // Assembly Metrics
    pub assembly_build_seconds: Histogram,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Order Metrics
        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Order status transitions"),
            &["from_status", "to_status"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let operation_errors = IntCounterVec::new(
            Opts::new("order_operation_errors_total", "Failed order operations by error kind"),
            &["operation", "kind"],
        )?;
        registry.register(Box::new(operation_errors.clone()))?;

        // Messaging Metrics
        let events_published = IntCounterVec::new(
            Opts::new("events_published_total", "Events published to the broker"),
            &["topic"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let publish_failures = IntCounterVec::new(
            Opts::new("event_publish_failures_total", "Events that failed to publish"),
            &["topic"],
        )?;
        registry.register(Box::new(publish_failures.clone()))?;

        let messages_handled = IntCounterVec::new(
            Opts::new("messages_handled_total", "Messages handled successfully"),
            &["topic", "group"],
        )?;
        registry.register(Box::new(messages_handled.clone()))?;

        let handler_failures = IntCounterVec::new(
            Opts::new("message_handler_failures_total", "Handler attempts that failed"),
            &["topic", "group"],
        )?;
        registry.register(Box::new(handler_failures.clone()))?;

        // Assembly Metrics
        let assembly_build_seconds = Histogram::with_opts(
            HistogramOpts::new("assembly_build_seconds", "Simulated assembly build duration")
                .buckets(vec![0.0, 1.0, 2.0, 3.0, 5.0, 8.0, 10.0, 15.0]),
        )?;
        registry.register(Box::new(assembly_build_seconds.clone()))?;

        // Circuit Breaker Metrics
        let circuit_breaker_state = IntGaugeVec::new(
            Opts::new(
                "circuit_breaker_state",
                "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
            ),
            &["breaker"],
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_transitions,
            operation_errors,
            events_published,
            publish_failures,
            messages_handled,
            handler_failures,
            assembly_build_seconds,
            circuit_breaker_state,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn record_order_created(&self) {
        self.orders_created.inc();
    }

    pub fn record_transition(&self, from: OrderStatus, to: OrderStatus) {
        self.order_transitions
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
    }

    pub fn record_operation_error(&self, operation: &str, kind: ErrorKind) {
        self.operation_errors
            .with_label_values(&[operation, kind.as_str()])
            .inc();
    }

    pub fn record_event_published(&self, topic: &str) {
        self.events_published.with_label_values(&[topic]).inc();
    }

    pub fn record_publish_failure(&self, topic: &str) {
        self.publish_failures.with_label_values(&[topic]).inc();
    }

    /// Helper to record one handler attempt for a consumer group
    pub fn record_message_handled(&self, topic: &str, group: &str, success: bool) {
        if success {
            self.messages_handled.with_label_values(&[topic, group]).inc();
        } else {
            self.handler_failures.with_label_values(&[topic, group]).inc();
        }
    }

    pub fn observe_build_seconds(&self, seconds: f64) {
        self.assembly_build_seconds.observe(seconds);
    }

    /// Helper to update circuit breaker state
    pub fn update_circuit_breaker_state(&self, breaker: &str, state: CircuitState) {
        self.circuit_breaker_state
            .with_label_values(&[breaker])
            .set(state.as_gauge());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_created();
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_record_transition() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition(OrderStatus::PendingPayment, OrderStatus::Paid);
        metrics.record_transition(OrderStatus::PendingPayment, OrderStatus::Paid);
        metrics.record_transition(OrderStatus::Paid, OrderStatus::Assembled);

        let gathered = metrics.registry.gather();
        let transitions = gathered
            .iter()
            .find(|m| m.name() == "order_status_transitions_total")
            .unwrap();
        assert_eq!(transitions.metric.len(), 2); // Two distinct edges
    }

    #[test]
    fn test_record_message_handled() {
        let metrics = Metrics::new().unwrap();
        metrics.record_message_handled("order.paid", "assembly", true);
        metrics.record_message_handled("order.paid", "assembly", false);
        metrics.record_message_handled("order.paid", "assembly", false);

        let gathered = metrics.registry.gather();
        let failures = gathered
            .iter()
            .find(|m| m.name() == "message_handler_failures_total")
            .unwrap();
        assert_eq!(failures.metric[0].counter.value, Some(2.0));
    }

    #[test]
    fn test_circuit_breaker_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.update_circuit_breaker_state("redpanda", CircuitState::Closed);
        metrics.update_circuit_breaker_state("redpanda", CircuitState::Open);

        let gathered = metrics.registry.gather();
        let state = gathered.iter().find(|m| m.name() == "circuit_breaker_state").unwrap();
        assert_eq!(state.metric[0].gauge.value, Some(1.0));
    }

    #[test]
    fn test_render_text_exposition() {
        let metrics = Metrics::new().unwrap();
        metrics.record_event_published("order.paid");

        let text = metrics.render().unwrap();
        assert!(text.contains("events_published_total{topic=\"order.paid\"} 1"));
    }
}
