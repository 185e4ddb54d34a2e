use kameo::Actor;
use kameo::message::{Context, Message};
use kameo::actor::ActorRef;
use kameo::error::Infallible;
use kameo::reply::{Reply, ReplyError};
use std::sync::Arc;
use std::collections::HashMap;
use std::time::Duration;
use chrono::Utc;
use crate::lifecycle::ShutdownSignal;
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitState};
use crate::actors::core::{overall_status, ComponentHealth, HealthStatus};

// ============================================================================
// Health Monitor Actor - Monitors system health
// ============================================================================
//
// Responsibilities:
// - Track health status reported by consumer loops
// - Poll circuit breakers and export their state as gauges
// - Aggregate system-wide health for /health
//
// ============================================================================

// ============================================================================
// Messages
// ============================================================================

pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
}

pub struct GetSystemHealth;

#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub check_time: chrono::DateTime<Utc>,
}

// Implement Reply for SystemHealth to use it as a message reply type
impl Reply for SystemHealth {
    type Ok = Self;
    type Error = Infallible;
    type Value = Self;

    fn to_result(self) -> Result<Self, Infallible> {
        Ok(self)
    }

    fn into_any_err(self) -> Option<Box<dyn ReplyError>> {
        None
    }

    fn into_value(self) -> Self::Value {
        self
    }
}

fn breaker_status(state: CircuitState) -> HealthStatus {
    match state {
        CircuitState::Closed => HealthStatus::Healthy,
        CircuitState::HalfOpen => HealthStatus::Degraded("Circuit breaker half-open".to_string()),
        CircuitState::Open => HealthStatus::Unhealthy("Circuit breaker open".to_string()),
    }
}

// ============================================================================
// Health Monitor Actor
// ============================================================================

pub struct HealthMonitorActor {
    components: HashMap<String, ComponentHealth>,
    breakers: Vec<CircuitBreaker>,
    metrics: Arc<Metrics>,
    poll_interval: Duration,
    shutdown: ShutdownSignal,
}

impl HealthMonitorActor {
    pub fn new(metrics: Arc<Metrics>, shutdown: ShutdownSignal) -> Self {
        Self {
            components: HashMap::new(),
            breakers: Vec::new(),
            metrics,
            poll_interval: Duration::from_secs(10),
            shutdown,
        }
    }

    /// Poll `breaker` periodically and report it as `breaker:<name>`.
    pub fn watch_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breakers.push(breaker);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl Actor for HealthMonitorActor {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(
        state: Self::Args,
        actor_ref: ActorRef<Self>
    ) -> Result<Self, Self::Error> {
        tracing::info!(breakers = state.breakers.len(), "HealthMonitorActor started");

        if state.breakers.is_empty() {
            return Ok(state);
        }

        // Clone what we need for the periodic task
        let breakers = state.breakers.clone();
        let metrics = state.metrics.clone();
        let shutdown = state.shutdown.clone();
        let poll_interval = state.poll_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = interval.tick() => {}
                }

                for breaker in &breakers {
                    let state = breaker.state().await;
                    metrics.update_circuit_breaker_state(breaker.name(), state);

                    let update = UpdateHealth {
                        component: format!("breaker:{}", breaker.name()),
                        status: breaker_status(state),
                    };
                    if actor_ref.tell(update).send().await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(state)
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<UpdateHealth> for HealthMonitorActor {
    type Reply = ();

    async fn handle(&mut self, msg: UpdateHealth, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let changed = self
            .components
            .get(&msg.component)
            .map_or(true, |current| current.status != msg.status);

        if changed && !msg.status.is_healthy() {
            tracing::warn!(component = %msg.component, status = ?msg.status, "⚠️ Component health changed");
        } else {
            tracing::debug!(component = %msg.component, status = ?msg.status, "Updated component health");
        }

        self.components
            .insert(msg.component.clone(), ComponentHealth::new(msg.component, msg.status));
    }
}

impl Message<GetSystemHealth> for HealthMonitorActor {
    type Reply = SystemHealth;

    async fn handle(&mut self, _msg: GetSystemHealth, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        SystemHealth {
            overall_status: overall_status(self.components.values()),
            components: self.components.clone(),
            check_time: Utc::now(),
        }
    }
}

// ============================================================================
// Health Handle
// ============================================================================

/// Cloneable handle that components use to report into the monitor.
#[derive(Clone)]
pub struct HealthHandle {
    actor: ActorRef<HealthMonitorActor>,
}

impl HealthHandle {
    pub fn spawn(monitor: HealthMonitorActor) -> Self {
        Self {
            actor: HealthMonitorActor::spawn(monitor),
        }
    }

    pub async fn report(&self, component: impl Into<String>, status: HealthStatus) {
        let component = component.into();
        if let Err(e) = self.actor.tell(UpdateHealth { component: component.clone(), status }).send().await {
            tracing::warn!(component = %component, error = %e, "Health monitor unreachable");
        }
    }

    /// Current aggregate; unhealthy if the monitor itself is gone.
    pub async fn snapshot(&self) -> SystemHealth {
        match self.actor.ask(GetSystemHealth).send().await {
            Ok(health) => health,
            Err(e) => SystemHealth {
                overall_status: HealthStatus::Unhealthy(format!("health monitor unavailable: {}", e)),
                components: HashMap::new(),
                check_time: Utc::now(),
            },
        }
    }
}
