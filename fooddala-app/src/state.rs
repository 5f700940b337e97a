use anyhow::Context;
use fooddala_catalog::BillingEngine;
use fooddala_core::api::OrderApi;
use fooddala_core::payment::{BackendVerifier, PaymentVerifier, SimulatedVerifier};
use fooddala_core::{BackendClient, NominatimResolver};
use fooddala_order::{CheckoutService, PayeeConfig};
use fooddala_store::app_config::{Config, VerificationMode};
use fooddala_store::{AuthSession, CartStore, EventBus, FileStorage, LocalStorage, LocationStore, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Process-wide stores and clients, built once at startup and handed to every screen.
#[derive(Clone)]
pub struct AppContext {
    pub config: Config,
    pub storage: Arc<dyn LocalStorage>,
    pub cart: Arc<CartStore>,
    pub location: Arc<LocationStore>,
    pub session: Arc<SessionStore>,
    pub client: Arc<BackendClient>,
    pub resolver: Arc<NominatimResolver>,
    pub billing: Arc<BillingEngine>,
    pub events: EventBus,
    pub checkout: CheckoutService,
}

impl AppContext {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let storage = FileStorage::open(&config.storage.path)
            .with_context(|| format!("Failed to open local storage at {}", config.storage.path.display()))?;
        Self::with_storage(config, Arc::new(storage)).await
    }

    pub async fn with_storage(config: Config, storage: Arc<dyn LocalStorage>) -> anyhow::Result<Self> {
        let cart = Arc::new(CartStore::hydrate(storage.clone()));
        let location = Arc::new(LocationStore::hydrate(storage.clone(), config.geo.timeout()));
        let session = Arc::new(SessionStore::hydrate(
            storage.clone(),
            chrono::Duration::days(config.session.ttl_days),
        ));

        let client = Arc::new(BackendClient::new(&config.api.url, config.api.timeout())?);
        client.set_token(session.current().map(|s| s.access_token)).await;
        let resolver = Arc::new(NominatimResolver::new(&config.geo.nominatim_url, config.geo.timeout())?);

        let verifier: Arc<dyn PaymentVerifier> = match config.payment.verification {
            VerificationMode::Simulated => Arc::new(SimulatedVerifier::new(Duration::from_millis(
                config.payment.simulated_delay_ms,
            ))),
            VerificationMode::Backend => Arc::new(BackendVerifier::new(client.clone())),
        };
        info!("Payment verification: {:?}", config.payment.verification);

        let billing = Arc::new(BillingEngine::new(config.billing.clone()));
        let events = EventBus::default();
        let checkout = CheckoutService::new(
            cart.clone(),
            session.clone(),
            client.clone(),
            verifier,
            billing.clone(),
            events.clone(),
            PayeeConfig {
                upi_id: config.payment.upi_id.clone(),
                merchant_name: config.payment.merchant_name.clone(),
                validity: Duration::from_secs(u64::from(config.payment.qr_validity_seconds)),
            },
        );

        info!(
            "Context ready: {} cart items, signed in: {}",
            cart.count(),
            session.is_authenticated()
        );

        Ok(Self {
            config,
            storage,
            cart,
            location,
            session,
            client,
            resolver,
            billing,
            events,
            checkout,
        })
    }

    pub fn orders(&self) -> Arc<dyn OrderApi> {
        self.client.clone()
    }

    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<AuthSession> {
        let session = self.session.login(&*self.client, email, password).await?;
        Ok(session)
    }

    pub async fn logout(&self) {
        self.session.logout(&*self.client).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fooddala_catalog::RestaurantRef;
    use fooddala_shared::Money;
    use fooddala_store::{CartItem, MemoryStorage};

    #[tokio::test]
    async fn test_context_hydrates_from_storage() {
        let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
        let first = AppContext::with_storage(Config::default(), storage.clone()).await.unwrap();
        first.cart.add_item(
            CartItem::new("biryani-2", "Chicken Biryani", Money::from_rupees(320), 2),
            &RestaurantRef::new("r-meghana", "Meghana Foods"),
        );

        let second = AppContext::with_storage(Config::default(), storage).await.unwrap();
        assert_eq!(second.cart.count(), 2);
        assert_eq!(second.cart.total(), Money::from_rupees(640));
        assert!(!second.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_checkout_uses_configured_billing() {
        let mut config = Config::default();
        config.billing.tax_percent = 18;
        let ctx = AppContext::with_storage(config, Arc::new(MemoryStorage::new())).await.unwrap();
        ctx.cart.add_item(
            CartItem::new("thali-1", "Veg Thali", Money::from_rupees(200), 1),
            &RestaurantRef::new("r-1", "Annapoorna").with_delivery_fee(Money::ZERO),
        );

        let bill = ctx.checkout.start().bill();
        assert_eq!(bill.tax, Money::from_rupees(36));
        assert_eq!(bill.delivery_fee, Money::ZERO);
        assert_eq!(bill.total, Money::from_rupees(236));
    }
}
