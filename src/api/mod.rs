use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::Server;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use serde::{Deserialize, Serialize};

use crate::actors::HealthHandle;
use crate::domain::order::{
    CancelOrder, CreateOrder, Order, OrderCommandHandler, OrderCreated, OrderPaid, PayOrder,
};
use crate::lifecycle::ShutdownSignal;
use crate::metrics::Metrics;

mod error;

pub use error::{ApiError, ErrorBody};

// ============================================================================
// HTTP API - Order endpoints, health and metrics
// ============================================================================
//
// POST /api/v1/orders              create
// GET  /api/v1/orders/{id}         get
// POST /api/v1/orders/{id}/pay     pay
// POST /api/v1/orders/{id}/cancel  cancel
// GET  /health                     aggregate health (503 when unhealthy)
// GET  /metrics                    Prometheus text exposition
//
// Order routes are mounted only when this process hosts the order role.
//
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub orders: Option<Arc<OrderCommandHandler>>,
    pub metrics: Arc<Metrics>,
    pub health: HealthHandle,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PayRequest {
    pub payment_method: String,
}

#[derive(Debug, Serialize)]
struct ComponentView {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    last_check: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
struct HealthView {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    components: BTreeMap<String, ComponentView>,
    check_time: chrono::DateTime<chrono::Utc>,
}

pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(web::Data::new(state.clone()))
        .app_data(
            web::JsonConfig::default()
                .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
        )
        .route("/health", web::get().to(health_handler))
        .route("/metrics", web::get().to(metrics_handler));

    if let Some(orders) = &state.orders {
        cfg.app_data(web::Data::from(orders.clone())).service(
            web::scope("/api/v1/orders")
                .route("", web::post().to(create_order))
                .route("/{order_id}", web::get().to(get_order))
                .route("/{order_id}/pay", web::post().to(pay_order))
                .route("/{order_id}/cancel", web::post().to(cancel_order)),
        );
    }
}

/// Bind the API on `addr`; it stops gracefully once `shutdown` fires.
pub fn serve(
    state: AppState,
    addr: &str,
    shutdown: ShutdownSignal,
    shutdown_timeout: Duration,
) -> std::io::Result<Server> {
    tracing::info!("🌐 Starting HTTP API on http://{}", addr);

    let server = HttpServer::new(move || {
        let state = state.clone();
        App::new().configure(move |cfg| configure(cfg, &state))
    })
    .disable_signals()
    .shutdown_timeout(shutdown_timeout.as_secs())
    .bind(addr)?
    .run();

    let handle = server.handle();
    actix_web::rt::spawn(async move {
        shutdown.wait().await;
        handle.stop(true).await;
    });

    Ok(server)
}

// ============================================================================
// Order Handlers
// ============================================================================

async fn create_order(
    orders: web::Data<OrderCommandHandler>,
    body: web::Json<CreateOrder>,
) -> Result<HttpResponse, ApiError> {
    let order = orders.create(body.into_inner()).await?;

    Ok(HttpResponse::Created().json(OrderCreated {
        order_id: order.order_id,
        total_price: order.total_price,
    }))
}

async fn get_order(
    orders: web::Data<OrderCommandHandler>,
    path: web::Path<String>,
) -> Result<web::Json<Order>, ApiError> {
    let order = orders.get(&path.into_inner()).await?;
    Ok(web::Json(order))
}

async fn pay_order(
    orders: web::Data<OrderCommandHandler>,
    path: web::Path<String>,
    body: web::Json<PayRequest>,
) -> Result<web::Json<OrderPaid>, ApiError> {
    let paid = orders
        .pay(PayOrder {
            order_id: path.into_inner(),
            payment_method: body.into_inner().payment_method,
        })
        .await?;

    // Always set on a PAID snapshot
    let transaction_id = paid.transaction_id.unwrap_or_default();
    Ok(web::Json(OrderPaid { transaction_id }))
}

async fn cancel_order(
    orders: web::Data<OrderCommandHandler>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    orders
        .cancel(CancelOrder {
            order_id: path.into_inner(),
        })
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

// ============================================================================
// Health and Metrics
// ============================================================================

async fn health_handler(state: web::Data<AppState>) -> impl Responder {
    let snapshot = state.health.snapshot().await;

    let view = HealthView {
        status: snapshot.overall_status.as_str(),
        reason: snapshot.overall_status.reason().map(str::to_string),
        components: snapshot
            .components
            .into_iter()
            .map(|(name, c)| {
                let view = ComponentView {
                    status: c.status.as_str(),
                    reason: c.status.reason().map(str::to_string),
                    last_check: c.last_check,
                };
                (name, view)
            })
            .collect(),
        check_time: snapshot.check_time,
    };

    if snapshot.overall_status.is_unhealthy() {
        HttpResponse::ServiceUnavailable().json(view)
    } else {
        HttpResponse::Ok().json(view)
    }
}

async fn metrics_handler(state: web::Data<AppState>) -> impl Responder {
    match state.metrics.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}
