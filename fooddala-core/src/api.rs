use crate::identity::{AddressLabel, Role, User};
use crate::payment::VerificationRequest;
use crate::CoreResult;
use async_trait::async_trait;
use fooddala_shared::{Masked, Money};
use serde::{Deserialize, Serialize};

// ============================================================================
// Wire types
// ============================================================================

/// `{ success, data, message }` wrapper every backend response comes in.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub menu_item: String,
    pub name: String,
    pub quantity: u32,
    pub price: Money,
    pub customizations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressPayload {
    pub label: AddressLabel,
    pub street: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
    pub restaurant: String,
    pub items: Vec<OrderLineRequest>,
    pub delivery_address: AddressPayload,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

/// Payee details the backend hands out for online payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentParams {
    pub upi_id: String,
    pub merchant_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub order_number: Option<String>,
    pub status: String,
    #[serde(default)]
    pub total: Option<Money>,
    #[serde(default)]
    pub payment_params: Option<PaymentParams>,
}

#[derive(Debug, Deserialize)]
pub struct OrderData {
    pub order: PlacedOrder,
}

#[derive(Debug, Deserialize)]
pub struct OrdersData {
    #[serde(default)]
    pub orders: Vec<PlacedOrder>,
}

#[derive(Debug, Deserialize)]
pub struct VerificationData {
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub user: User,
    pub access_token: Masked<String>,
    #[serde(default)]
    pub refresh_token: Option<Masked<String>>,
}

#[derive(Debug, Deserialize)]
pub struct MeData {
    pub user: User,
}

/// Whose orders a listing is for. Each role has its own backend listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    Mine,
    Restaurant,
    Driver,
    DriverAvailable,
}

impl OrderScope {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Customer | Role::Admin => OrderScope::Mine,
            Role::Restaurant => OrderScope::Restaurant,
            Role::Driver => OrderScope::Driver,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            OrderScope::Mine => "/orders",
            OrderScope::Restaurant => "/orders/restaurant/orders",
            OrderScope::Driver => "/orders/driver/orders",
            OrderScope::DriverAvailable => "/orders/driver/available",
        }
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

#[async_trait]
pub trait OrderApi: Send + Sync {
    async fn create_order(&self, request: &NewOrderRequest) -> CoreResult<PlacedOrder>;

    async fn update_status(&self, order_id: &str, status: &str) -> CoreResult<PlacedOrder>;

    /// Returns whether the backend considers the payment settled
    async fn verify_payment(&self, request: &VerificationRequest) -> CoreResult<bool>;

    /// `status_filter` is a comma-joined list of status values
    async fn list_orders(&self, scope: OrderScope, status_filter: Option<&str>) -> CoreResult<Vec<PlacedOrder>>;

    async fn cancel_order(&self, order_id: &str, reason: &str) -> CoreResult<PlacedOrder>;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> CoreResult<LoginData>;

    async fn me(&self) -> CoreResult<User>;

    async fn logout(&self) -> CoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_paths() {
        assert_eq!(OrderScope::for_role(Role::Customer).path(), "/orders");
        assert_eq!(OrderScope::for_role(Role::Restaurant).path(), "/orders/restaurant/orders");
        assert_eq!(OrderScope::for_role(Role::Driver).path(), "/orders/driver/orders");
    }

    #[test]
    fn test_new_order_wire_shape() {
        let request = NewOrderRequest {
            restaurant: "r1".to_string(),
            items: vec![OrderLineRequest {
                menu_item: "m1".to_string(),
                name: "Masala Dosa".to_string(),
                quantity: 2,
                price: Money::from_rupees(90),
                customizations: vec!["extra chutney".to_string()],
            }],
            delivery_address: AddressPayload {
                label: AddressLabel::Work,
                street: "4th Cross".to_string(),
                city: "Bengaluru".to_string(),
                state: "Karnataka".to_string(),
                pincode: "560034".to_string(),
                phone: String::new(),
            },
            payment_method: "cod".to_string(),
            coupon_code: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["items"][0]["menuItem"], "m1");
        assert_eq!(json["items"][0]["price"], 90);
        assert_eq!(json["deliveryAddress"]["label"], "work");
        assert_eq!(json["paymentMethod"], "cod");
        assert!(json.get("couponCode").is_none());
    }

    #[test]
    fn test_placed_order_from_backend() {
        let envelope: ApiEnvelope<OrderData> = serde_json::from_value(serde_json::json!({
            "success": true,
            "data": { "order": { "_id": "66a1", "orderNumber": "FD-2024-001", "status": "pending" } }
        }))
        .unwrap();
        let order = envelope.data.unwrap().order;
        assert_eq!(order.id, "66a1");
        assert_eq!(order.order_number.as_deref(), Some("FD-2024-001"));
        assert!(order.payment_params.is_none());
    }

    #[test]
    fn test_placed_order_total_in_rupees() {
        let order: PlacedOrder = serde_json::from_value(serde_json::json!({
            "_id": "66a2",
            "status": "pending",
            "total": 775
        }))
        .unwrap();
        assert_eq!(order.total, Some(Money::from_rupees(775)));
        assert_eq!(order.total.unwrap().to_string(), "775.00");
    }
}
