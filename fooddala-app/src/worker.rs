use fooddala_core::api::{OrderApi, OrderScope};
use fooddala_order::{OrderTracker, StatusFilter};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

/// Re-fetch an order listing on a fixed period and fold it into the tracker.
///
/// The tracker is only locked while the fetched list is applied, never across
/// the request. Runs until the returned handle is aborted.
pub fn spawn_order_poller(
    api: Arc<dyn OrderApi>,
    tracker: Arc<Mutex<OrderTracker>>,
    scope: OrderScope,
    filter: Option<StatusFilter>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Order poller started for {:?} every {:?}", scope, every);
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let query = filter.as_ref().map(StatusFilter::query_value);

        loop {
            ticker.tick().await;
            let placed = match api.list_orders(scope, query.as_deref()).await {
                Ok(placed) => placed,
                Err(e) => {
                    error!("Order refresh failed: {}", e);
                    continue;
                }
            };

            match tracker.lock().await.sync(&placed) {
                0 => debug!("No order changes"),
                changed => info!("{} tracked orders updated", changed),
            }
        }
    })
}
