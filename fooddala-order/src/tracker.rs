use crate::models::{Order, OrderStatus};
use crate::status::{StatusFilter, StatusView};
use fooddala_core::api::{OrderApi, OrderScope, PlacedOrder};
use fooddala_core::CoreError;
use fooddala_shared::models::events::DomainEvent;
use fooddala_store::EventBus;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Keeps the orders this client knows about and moves them along the lifecycle
pub struct OrderTracker {
    orders: HashMap<String, Order>,
    events: Option<EventBus>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self {
            orders: HashMap::new(),
            events: None,
        }
    }

    pub fn with_events(events: EventBus) -> Self {
        Self {
            orders: HashMap::new(),
            events: Some(events),
        }
    }

    pub fn track(&mut self, order: Order) -> StatusView {
        let view = StatusView::of(&order.status);
        debug!("Tracking order {} at {}", order.id, order.status);
        self.orders.insert(order.id.clone(), order);
        view
    }

    pub fn get(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn view(&self, order_id: &str) -> Option<StatusView> {
        self.orders.get(order_id).map(|o| StatusView::of(&o.status))
    }

    /// Tracked orders whose status falls in `filter`, newest first.
    pub fn filtered(&self, filter: &StatusFilter) -> Vec<&Order> {
        let mut orders: Vec<_> = self.orders.values().filter(|o| filter.matches(&o.status)).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// Apply a status update pushed or polled from the backend.
    ///
    /// Repeating the current status is a no-op; anything that is not a forward
    /// move (see [`OrderStatus::can_advance_to`]) is rejected so a late update
    /// can never rewind the order.
    pub fn apply_status(&mut self, order_id: &str, status: OrderStatus) -> Result<StatusView, TrackerError> {
        self.transition(order_id, &status)?;
        Ok(StatusView::of(&status))
    }

    /// Returns whether the tracked status actually moved.
    fn transition(&mut self, order_id: &str, status: &OrderStatus) -> Result<bool, TrackerError> {
        let order = self.get_order_mut(order_id)?;

        if order.status == *status {
            return Ok(false);
        }

        if !order.status.can_advance_to(status) {
            return Err(TrackerError::InvalidTransition {
                from: order.status.to_string(),
                to: status.to_string(),
            });
        }

        let from = order.status.clone();
        order.update_status(status.clone());
        info!("Order {} moved {} -> {}", order_id, from, status);

        if let Some(events) = &self.events {
            events.publish(DomainEvent::status_changed(order_id, from.as_str(), status.as_str()));
        }
        Ok(true)
    }

    /// Fold a fetched order list into the tracked set.
    ///
    /// Returns how many tracked orders changed status. Unknown orders are skipped:
    /// the list response carries no line items to build a snapshot from.
    pub fn sync(&mut self, placed: &[PlacedOrder]) -> usize {
        let mut changed = 0;
        for p in placed {
            if !self.orders.contains_key(&p.id) {
                continue;
            }
            match self.transition(&p.id, &OrderStatus::parse(&p.status)) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => debug!("Ignoring listed status for {}: {}", p.id, e),
            }
        }
        changed
    }

    pub async fn refresh(&mut self, api: &dyn OrderApi, scope: OrderScope, filter: Option<&StatusFilter>) -> Result<usize, TrackerError> {
        let query = filter.map(StatusFilter::query_value);
        let placed = api.list_orders(scope, query.as_deref()).await?;
        Ok(self.sync(&placed))
    }

    /// Ask the backend to move an order (restaurant or driver action), then apply the result locally.
    pub async fn advance(&mut self, api: &dyn OrderApi, order_id: &str, target: OrderStatus) -> Result<StatusView, TrackerError> {
        let current = self.get_order_mut(order_id)?.status.clone();
        if !current.can_advance_to(&target) {
            return Err(TrackerError::InvalidTransition {
                from: current.to_string(),
                to: target.to_string(),
            });
        }

        let updated = api.update_status(order_id, target.as_str()).await?;
        self.apply_status(order_id, OrderStatus::parse(&updated.status))
    }

    pub async fn cancel(&mut self, api: &dyn OrderApi, order_id: &str, reason: &str) -> Result<StatusView, TrackerError> {
        let current = self.get_order_mut(order_id)?.status.clone();
        if !current.can_advance_to(&OrderStatus::Cancelled) {
            return Err(TrackerError::InvalidTransition {
                from: current.to_string(),
                to: OrderStatus::Cancelled.to_string(),
            });
        }

        let updated = api.cancel_order(order_id, reason).await?;
        let status = OrderStatus::parse(&updated.status);
        if status != OrderStatus::Cancelled {
            warn!("Cancel of {} came back as {}", order_id, status);
        }
        self.apply_status(order_id, status)
    }

    fn get_order_mut(&mut self, order_id: &str) -> Result<&mut Order, TrackerError> {
        self.orders
            .get_mut(order_id)
            .ok_or_else(|| TrackerError::NotFound(order_id.to_string()))
    }
}

impl Default for OrderTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Backend(#[from] CoreError),
}
