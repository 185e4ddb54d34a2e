// ============================================================================
// Wire messages for the inventory and payment services (prost, no codegen)
// ============================================================================

#[derive(Clone, PartialEq, prost::Message)]
pub struct PartsFilter {
    #[prost(string, repeated, tag = "1")]
    pub uuids: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListPartsRequest {
    #[prost(message, optional, tag = "1")]
    pub filter: Option<PartsFilter>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Part {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub description: String,
    #[prost(double, tag = "4")]
    pub price: f64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListPartsResponse {
    #[prost(message, repeated, tag = "1")]
    pub parts: Vec<Part>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum PaymentMethod {
    Unspecified = 0,
    Card = 1,
    Sbp = 2,
    CreditCard = 3,
    InvestorMoney = 4,
}

impl From<crate::domain::order::PaymentMethod> for PaymentMethod {
    fn from(method: crate::domain::order::PaymentMethod) -> Self {
        use crate::domain::order::PaymentMethod as Domain;
        match method {
            Domain::Card => PaymentMethod::Card,
            Domain::Sbp => PaymentMethod::Sbp,
            Domain::CreditCard => PaymentMethod::CreditCard,
            Domain::InvestorMoney => PaymentMethod::InvestorMoney,
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PayOrderRequest {
    #[prost(string, tag = "1")]
    pub order_uuid: String,
    #[prost(string, tag = "2")]
    pub user_uuid: String,
    #[prost(enumeration = "PaymentMethod", tag = "3")]
    pub payment_method: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PayOrderResponse {
    #[prost(string, tag = "1")]
    pub transaction_uuid: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_pay_request_carries_enum_number() {
        let request = PayOrderRequest {
            order_uuid: "o-1".to_string(),
            user_uuid: "u-1".to_string(),
            payment_method: PaymentMethod::from(crate::domain::order::PaymentMethod::CreditCard) as i32,
        };

        let decoded = PayOrderRequest::decode(request.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.payment_method, 3);
        assert_eq!(decoded.payment_method(), PaymentMethod::CreditCard);
    }
}
