use prost::Message as _;

use crate::domain::order::{InvalidPaymentMethod, OrderPaidEvent, ShipAssembledEvent};

// ============================================================================
// Wire Codec - protobuf records carrying an explicit schema version
// ============================================================================

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid protobuf payload: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("unsupported schema version {found}, expected {}", SCHEMA_VERSION)]
    UnsupportedVersion { found: u32 },

    #[error(transparent)]
    PaymentMethod(#[from] InvalidPaymentMethod),
}

/// A domain event with a stable binary form and a routing key.
pub trait WireEvent: Sized + Send + Sync {
    const NAME: &'static str;

    /// Partition key; all events for one order share it.
    fn key(&self) -> &str;

    fn to_bytes(&self) -> Vec<u8>;

    fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError>;
}

pub fn encode<E: WireEvent>(event: &E) -> Vec<u8> {
    event.to_bytes()
}

pub fn decode<E: WireEvent>(bytes: &[u8]) -> Result<E, DecodeError> {
    E::from_bytes(bytes)
}

fn check_version(found: u32) -> Result<(), DecodeError> {
    if found == SCHEMA_VERSION {
        Ok(())
    } else {
        Err(DecodeError::UnsupportedVersion { found })
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Clone, PartialEq, prost::Message)]
pub struct OrderPaidRecord {
    #[prost(uint32, tag = "1")]
    pub schema_version: u32,
    #[prost(string, tag = "2")]
    pub event_id: String,
    #[prost(string, tag = "3")]
    pub order_id: String,
    #[prost(string, tag = "4")]
    pub user_id: String,
    #[prost(string, tag = "5")]
    pub payment_method: String,
    #[prost(string, tag = "6")]
    pub transaction_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ShipAssembledRecord {
    #[prost(uint32, tag = "1")]
    pub schema_version: u32,
    #[prost(string, tag = "2")]
    pub event_id: String,
    #[prost(string, tag = "3")]
    pub order_id: String,
    #[prost(string, tag = "4")]
    pub user_id: String,
    #[prost(uint64, tag = "5")]
    pub build_time_seconds: u64,
}

impl WireEvent for OrderPaidEvent {
    const NAME: &'static str = "OrderPaid";

    fn key(&self) -> &str {
        &self.order_id
    }

    fn to_bytes(&self) -> Vec<u8> {
        OrderPaidRecord {
            schema_version: SCHEMA_VERSION,
            event_id: self.event_id.clone(),
            order_id: self.order_id.clone(),
            user_id: self.user_id.clone(),
            payment_method: self.payment_method.as_str().to_string(),
            transaction_id: self.transaction_id.clone(),
        }
        .encode_to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let record = OrderPaidRecord::decode(bytes)?;
        check_version(record.schema_version)?;

        Ok(Self {
            event_id: record.event_id,
            order_id: record.order_id,
            user_id: record.user_id,
            payment_method: record.payment_method.parse()?,
            transaction_id: record.transaction_id,
        })
    }
}

impl WireEvent for ShipAssembledEvent {
    const NAME: &'static str = "ShipAssembled";

    fn key(&self) -> &str {
        &self.order_id
    }

    fn to_bytes(&self) -> Vec<u8> {
        ShipAssembledRecord {
            schema_version: SCHEMA_VERSION,
            event_id: self.event_id.clone(),
            order_id: self.order_id.clone(),
            user_id: self.user_id.clone(),
            build_time_seconds: self.build_time_seconds,
        }
        .encode_to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let record = ShipAssembledRecord::decode(bytes)?;
        check_version(record.schema_version)?;

        Ok(Self {
            event_id: record.event_id,
            order_id: record.order_id,
            user_id: record.user_id,
            build_time_seconds: record.build_time_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::PaymentMethod;
    use crate::testing::any_payment_method;
    use prost::Message as _;
    use proptest::prelude::*;

    #[test]
    fn test_order_paid_round_trip() {
        let event = OrderPaidEvent::new("o-1", "u-1", PaymentMethod::InvestorMoney, "tx-1");
        let decoded: OrderPaidEvent = decode(&encode(&event)).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_ship_assembled_round_trip() {
        let event = ShipAssembledEvent::new("o-1", "u-1", 7);
        let decoded: ShipAssembledEvent = decode(&encode(&event)).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_unversioned_payload_is_rejected() {
        let bytes = ShipAssembledRecord {
            schema_version: 0,
            event_id: "e".to_string(),
            order_id: "o".to_string(),
            user_id: "u".to_string(),
            build_time_seconds: 1,
        }
        .encode_to_vec();

        assert!(matches!(
            decode::<ShipAssembledEvent>(&bytes),
            Err(DecodeError::UnsupportedVersion { found: 0 })
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            decode::<OrderPaidEvent>(&[0xff, 0xff, 0xff]),
            Err(DecodeError::Protobuf(_))
        ));
    }

    #[test]
    fn test_unknown_payment_method_is_rejected() {
        let bytes = OrderPaidRecord {
            schema_version: SCHEMA_VERSION,
            event_id: "e".to_string(),
            order_id: "o".to_string(),
            user_id: "u".to_string(),
            payment_method: "UNKNOWN".to_string(),
            transaction_id: "tx".to_string(),
        }
        .encode_to_vec();

        assert!(matches!(
            decode::<OrderPaidEvent>(&bytes),
            Err(DecodeError::PaymentMethod(_))
        ));
    }

    #[test]
    fn test_key_is_order_id() {
        let event = ShipAssembledEvent::new("o-42", "u", 1);
        assert_eq!(event.key(), "o-42");
    }

    proptest! {
        #[test]
        fn test_order_paid_round_trips_any_fields(
            order_id in any::<String>(),
            user_id in any::<String>(),
            method in any_payment_method(),
            transaction_id in any::<String>(),
        ) {
            let event = OrderPaidEvent::new(order_id, user_id, method, transaction_id);
            let decoded: OrderPaidEvent = decode(&encode(&event)).unwrap();
            prop_assert_eq!(decoded, event);
        }

        #[test]
        fn test_ship_assembled_round_trips_any_fields(
            order_id in any::<String>(),
            user_id in any::<String>(),
            build_time_seconds in any::<u64>(),
        ) {
            let event = ShipAssembledEvent::new(order_id, user_id, build_time_seconds);
            let decoded: ShipAssembledEvent = decode(&encode(&event)).unwrap();
            prop_assert_eq!(decoded, event);
        }
    }
}
