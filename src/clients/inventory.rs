use std::time::Duration;

use async_trait::async_trait;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

use super::proto::{ListPartsRequest, ListPartsResponse, PartsFilter};
use super::{lazy_channel, ClientError, PartCatalog, PricedPart};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig};

const SERVICE: &str = "inventory";
const LIST_PARTS: &str = "/inventory.v1.InventoryService/ListParts";

/// gRPC client for the inventory catalog.
#[derive(Clone)]
pub struct InventoryClient {
    channel: Channel,
    circuit_breaker: CircuitBreaker,
}

impl InventoryClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            channel: lazy_channel(endpoint, timeout)?,
            circuit_breaker: CircuitBreaker::new(SERVICE, CircuitBreakerConfig::default()),
        })
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    async fn call(&self, request: ListPartsRequest) -> Result<ListPartsResponse, ClientError> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready().await.map_err(|e| ClientError::Unavailable {
            service: SERVICE,
            message: e.to_string(),
        })?;

        let response = grpc
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(LIST_PARTS),
                tonic_prost::ProstCodec::default(),
            )
            .await
            .map_err(|status| ClientError::from_status(SERVICE, status))?;

        Ok(response.into_inner())
    }
}

#[async_trait]
impl PartCatalog for InventoryClient {
    async fn list_parts(&self, part_ids: &[String]) -> Result<Vec<PricedPart>, ClientError> {
        let request = ListPartsRequest {
            filter: Some(PartsFilter {
                uuids: part_ids.to_vec(),
            }),
        };

        let response = self
            .circuit_breaker
            .call(self.call(request))
            .await
            .map_err(|e| ClientError::from_breaker(SERVICE, e))?;

        tracing::debug!(
            requested = part_ids.len(),
            resolved = response.parts.len(),
            "Parts resolved by inventory"
        );

        Ok(response
            .parts
            .into_iter()
            .map(|part| PricedPart {
                id: part.uuid,
                price: part.price,
            })
            .collect())
    }
}
