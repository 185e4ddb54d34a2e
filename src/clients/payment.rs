use std::time::Duration;

use async_trait::async_trait;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

use super::proto::{self, PayOrderRequest, PayOrderResponse};
use super::{lazy_channel, ClientError, PaymentGateway};
use crate::domain::order::PaymentMethod;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig};

const SERVICE: &str = "payment";
const PAY_ORDER: &str = "/payment.v1.PaymentService/PayOrder";

/// gRPC client for the payment service.
#[derive(Clone)]
pub struct PaymentClient {
    channel: Channel,
    circuit_breaker: CircuitBreaker,
}

impl PaymentClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            channel: lazy_channel(endpoint, timeout)?,
            circuit_breaker: CircuitBreaker::new(SERVICE, CircuitBreakerConfig::default()),
        })
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    async fn call(&self, request: PayOrderRequest) -> Result<PayOrderResponse, ClientError> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready().await.map_err(|e| ClientError::Unavailable {
            service: SERVICE,
            message: e.to_string(),
        })?;

        let response = grpc
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(PAY_ORDER),
                tonic_prost::ProstCodec::default(),
            )
            .await
            .map_err(|status| ClientError::from_status(SERVICE, status))?;

        Ok(response.into_inner())
    }
}

#[async_trait]
impl PaymentGateway for PaymentClient {
    async fn pay(
        &self,
        order_id: &str,
        user_id: &str,
        payment_method: PaymentMethod,
    ) -> Result<String, ClientError> {
        let request = PayOrderRequest {
            order_uuid: order_id.to_string(),
            user_uuid: user_id.to_string(),
            payment_method: proto::PaymentMethod::from(payment_method) as i32,
        };

        let response = self
            .circuit_breaker
            .call(self.call(request))
            .await
            .map_err(|e| ClientError::from_breaker(SERVICE, e))?;

        if response.transaction_uuid.is_empty() {
            return Err(ClientError::InvalidResponse {
                service: SERVICE,
                message: "empty transaction id".to_string(),
            });
        }

        tracing::info!(order_id, transaction_id = %response.transaction_uuid, "Payment accepted");
        Ok(response.transaction_uuid)
    }
}
