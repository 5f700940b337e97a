use crate::models::OrderStatus;
use serde::Serialize;

/// The nodes drawn on the tracking screen. `ready` and `picked_up` have no node of their own.
pub const TRACKED_STEPS: [(OrderStatus, &str); 5] = [
    (OrderStatus::Pending, "Order Placed"),
    (OrderStatus::Confirmed, "Confirmed"),
    (OrderStatus::Preparing, "Preparing"),
    (OrderStatus::OnTheWay, "On the Way"),
    (OrderStatus::Delivered, "Delivered"),
];

pub fn progress_percent(status: &OrderStatus) -> u8 {
    match status {
        OrderStatus::Confirmed => 25,
        OrderStatus::Preparing => 50,
        OrderStatus::OnTheWay => 75,
        OrderStatus::Delivered => 100,
        _ => 0,
    }
}

pub fn step_index(status: &OrderStatus) -> Option<usize> {
    TRACKED_STEPS.iter().position(|(s, _)| s == status)
}

/// Where a tracker node sits relative to the order's status.
///
/// `Current` is the node the order is at and counts as reached, so it is
/// also complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Complete,
    Current,
    Upcoming,
}

impl StepState {
    /// True for every node at or before the current one.
    pub fn is_complete(self) -> bool {
        matches!(self, StepState::Complete | StepState::Current)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub label: &'static str,
    pub state: StepState,
}

/// Everything the tracking screen renders for one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub status: OrderStatus,
    pub label: String,
    pub progress: u8,
    /// `None` for cancelled orders, which show no tracker.
    pub steps: Option<Vec<StepView>>,
}

impl StatusView {
    pub fn of(status: &OrderStatus) -> Self {
        let steps = (*status != OrderStatus::Cancelled).then(|| {
            let current = step_index(status);
            TRACKED_STEPS
                .iter()
                .enumerate()
                .map(|(i, (_, label))| {
                    let state = match current {
                        Some(c) if i == c => StepState::Current,
                        Some(c) if i < c => StepState::Complete,
                        _ => StepState::Upcoming,
                    };
                    StepView { label: *label, state }
                })
                .collect()
        });

        Self {
            status: status.clone(),
            label: status.label().to_string(),
            progress: progress_percent(status),
            steps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestaurantAction {
    Accept,
    Reject,
    Prepare,
    MarkReady,
}

impl RestaurantAction {
    pub fn from_status(self) -> OrderStatus {
        match self {
            RestaurantAction::Accept | RestaurantAction::Reject => OrderStatus::Pending,
            RestaurantAction::Prepare => OrderStatus::Confirmed,
            RestaurantAction::MarkReady => OrderStatus::Preparing,
        }
    }

    pub fn target(self) -> OrderStatus {
        match self {
            RestaurantAction::Accept => OrderStatus::Confirmed,
            RestaurantAction::Reject => OrderStatus::Cancelled,
            RestaurantAction::Prepare => OrderStatus::Preparing,
            RestaurantAction::MarkReady => OrderStatus::Ready,
        }
    }

    /// Buttons offered on a restaurant order card.
    pub fn available(status: &OrderStatus) -> Vec<Self> {
        [Self::Accept, Self::Reject, Self::Prepare, Self::MarkReady]
            .into_iter()
            .filter(|a| a.from_status() == *status)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverAction {
    PickUp,
    StartDelivery,
    Deliver,
}

impl DriverAction {
    pub fn from_status(self) -> OrderStatus {
        match self {
            DriverAction::PickUp => OrderStatus::Ready,
            DriverAction::StartDelivery => OrderStatus::PickedUp,
            DriverAction::Deliver => OrderStatus::OnTheWay,
        }
    }

    pub fn target(self) -> OrderStatus {
        match self {
            DriverAction::PickUp => OrderStatus::PickedUp,
            DriverAction::StartDelivery => OrderStatus::OnTheWay,
            DriverAction::Deliver => OrderStatus::Delivered,
        }
    }

    pub fn next_for(status: &OrderStatus) -> Option<Self> {
        [Self::PickUp, Self::StartDelivery, Self::Deliver]
            .into_iter()
            .find(|a| a.from_status() == *status)
    }
}

/// Named status sets used when listing orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    CustomerActive,
    RestaurantNew,
    RestaurantPreparing,
    RestaurantReady,
    RestaurantCompleted,
    DriverActive,
    Only(OrderStatus),
}

impl StatusFilter {
    pub fn statuses(&self) -> Vec<OrderStatus> {
        use OrderStatus::*;
        match self {
            StatusFilter::CustomerActive => vec![Pending, Confirmed, Preparing, Ready, PickedUp, OnTheWay],
            StatusFilter::RestaurantNew => vec![Pending],
            StatusFilter::RestaurantPreparing => vec![Confirmed, Preparing],
            StatusFilter::RestaurantReady => vec![Ready],
            StatusFilter::RestaurantCompleted => vec![PickedUp, OnTheWay, Delivered],
            StatusFilter::DriverActive => vec![Ready, PickedUp, OnTheWay],
            StatusFilter::Only(status) => vec![status.clone()],
        }
    }

    /// The `status` query parameter value.
    pub fn query_value(&self) -> String {
        self.statuses()
            .iter()
            .map(OrderStatus::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn matches(&self, status: &OrderStatus) -> bool {
        self.statuses().contains(status)
    }
}
