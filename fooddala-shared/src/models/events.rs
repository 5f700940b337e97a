use crate::money::Money;
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct OrderPlacedEvent {
    pub event_id: Uuid,
    pub order_id: String,
    pub restaurant_id: String,
    pub payment_method: String,
    pub amount_due: Money,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct PaymentSucceededEvent {
    pub event_id: Uuid,
    pub order_reference: String,
    pub amount: Money,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct PaymentTimedOutEvent {
    pub event_id: Uuid,
    pub order_reference: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct OrderStatusChangedEvent {
    pub event_id: Uuid,
    pub order_id: String,
    pub from: String,
    pub to: String,
    pub timestamp: i64,
}

/// Everything published on the in-process event bus.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderPlaced(OrderPlacedEvent),
    PaymentSucceeded(PaymentSucceededEvent),
    PaymentTimedOut(PaymentTimedOutEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::OrderPlaced(_) => "order.placed",
            DomainEvent::PaymentSucceeded(_) => "payment.succeeded",
            DomainEvent::PaymentTimedOut(_) => "payment.timed_out",
            DomainEvent::OrderStatusChanged(_) => "order.status_changed",
        }
    }

    pub fn order_placed(order_id: &str, restaurant_id: &str, payment_method: &str, amount_due: Money) -> Self {
        DomainEvent::OrderPlaced(OrderPlacedEvent {
            event_id: Uuid::new_v4(),
            order_id: order_id.to_string(),
            restaurant_id: restaurant_id.to_string(),
            payment_method: payment_method.to_string(),
            amount_due,
            timestamp: chrono::Utc::now().timestamp(),
        })
    }

    pub fn payment_succeeded(order_reference: &str, amount: Money) -> Self {
        DomainEvent::PaymentSucceeded(PaymentSucceededEvent {
            event_id: Uuid::new_v4(),
            order_reference: order_reference.to_string(),
            amount,
            timestamp: chrono::Utc::now().timestamp(),
        })
    }

    pub fn payment_timed_out(order_reference: &str) -> Self {
        DomainEvent::PaymentTimedOut(PaymentTimedOutEvent {
            event_id: Uuid::new_v4(),
            order_reference: order_reference.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        })
    }

    pub fn status_changed(order_id: &str, from: &str, to: &str) -> Self {
        DomainEvent::OrderStatusChanged(OrderStatusChangedEvent {
            event_id: Uuid::new_v4(),
            order_id: order_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        })
    }
}
