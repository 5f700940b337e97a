use chrono::{DateTime, Utc};
use fooddala_catalog::{Bill, RestaurantRef};
use fooddala_core::api::{AddressPayload, NewOrderRequest, OrderLineRequest, PlacedOrder};
use fooddala_core::identity::DeliveryAddress;
use fooddala_shared::Money;
use fooddala_store::CartItem;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status in the delivery lifecycle.
///
/// Statuses arrive as strings from the backend; anything unrecognised is kept
/// as `Unknown` rather than rejected so the view can still render.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    PickedUp,
    OnTheWay,
    Delivered,
    Cancelled,
    Unknown(String),
}

impl OrderStatus {
    /// The non-cancelled lifecycle, in order.
    pub const LIFECYCLE: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::PickedUp,
        OrderStatus::OnTheWay,
        OrderStatus::Delivered,
    ];

    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "pending" => OrderStatus::Pending,
            "confirmed" => OrderStatus::Confirmed,
            "preparing" => OrderStatus::Preparing,
            "ready" => OrderStatus::Ready,
            "picked_up" => OrderStatus::PickedUp,
            "on_the_way" => OrderStatus::OnTheWay,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            other => OrderStatus::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::OnTheWay => "on_the_way",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Unknown(raw) => raw,
        }
    }

    /// Badge text.
    pub fn label(&self) -> &str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Preparing => "Preparing",
            OrderStatus::Ready => "Ready",
            OrderStatus::PickedUp => "Picked Up",
            OrderStatus::OnTheWay => "On the Way",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Unknown(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    fn rank(&self) -> Option<usize> {
        Self::LIFECYCLE.iter().position(|s| s == self)
    }

    /// Forward moves along the lifecycle, or cancellation of a live order.
    pub fn can_advance_to(&self, next: &OrderStatus) -> bool {
        if *next == OrderStatus::Cancelled {
            return !self.is_terminal() && !matches!(self, OrderStatus::Unknown(_));
        }
        match (self.rank(), next.rank()) {
            (Some(current), Some(next)) => next > current,
            _ => false,
        }
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        OrderStatus::parse(&raw)
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cod,
    Online,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Online => "online",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub menu_item_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub customizations: Vec<String>,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            menu_item_id: item.menu_item_id.clone(),
            name: item.name.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            customizations: item.customizations.clone(),
        }
    }
}

/// Everything captured at the moment the user places the order.
///
/// Later cart edits never reach a draft; it is what the backend is asked to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub restaurant: RestaurantRef,
    pub items: Vec<OrderLine>,
    pub delivery_address: DeliveryAddress,
    /// Falls back to the account phone when the address has none
    pub contact_phone: String,
    pub payment_method: PaymentMethod,
    pub bill: Bill,
}

impl OrderDraft {
    pub fn to_request(&self) -> NewOrderRequest {
        let address = &self.delivery_address;
        NewOrderRequest {
            restaurant: self.restaurant.id.clone(),
            items: self
                .items
                .iter()
                .map(|line| OrderLineRequest {
                    menu_item: line.menu_item_id.clone(),
                    name: line.name.clone(),
                    quantity: line.quantity,
                    price: line.unit_price,
                    customizations: line.customizations.clone(),
                })
                .collect(),
            delivery_address: AddressPayload {
                label: address.label,
                street: address.street.clone(),
                city: address.city.clone(),
                state: address.state.clone(),
                pincode: address.pincode.clone(),
                phone: self.contact_phone.clone(),
            },
            payment_method: self.payment_method.as_str().to_string(),
            coupon_code: self.bill.coupon_code.clone(),
        }
    }
}

/// An order the backend has accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub order_number: Option<String>,
    pub restaurant: RestaurantRef,
    pub items: Vec<OrderLine>,
    pub delivery_address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    pub bill: Bill,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn from_placed(draft: OrderDraft, placed: PlacedOrder) -> Self {
        let now = Utc::now();
        Self {
            id: placed.id,
            order_number: placed.order_number,
            restaurant: draft.restaurant,
            items: draft.items,
            delivery_address: draft.delivery_address,
            payment_method: draft.payment_method,
            bill: draft.bill,
            status: OrderStatus::parse(&placed.status),
            created_at: now,
            updated_at: now,
        }
    }

    /// What the customer sees: the order number when the backend assigned one, else the id.
    pub fn reference(&self) -> &str {
        self.order_number.as_deref().unwrap_or(&self.id)
    }

    pub fn amount_due(&self) -> Money {
        self.bill.total
    }

    pub fn update_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
