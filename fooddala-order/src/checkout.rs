use crate::models::{Order, OrderDraft, OrderLine, PaymentMethod};
use crate::payment_qr::{PaymentCallbacks, PaymentQrFlow, PaymentRequest, PaymentView};
use fooddala_catalog::{validate_menu_item_id, Bill, BillingEngine, Coupon};
use fooddala_core::api::{OrderApi, PaymentParams};
use fooddala_core::identity::DeliveryAddress;
use fooddala_core::payment::PaymentVerifier;
use fooddala_core::CoreError;
use fooddala_shared::models::events::DomainEvent;
use fooddala_store::{CartStore, EventBus, SessionStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Please sign in to place an order")]
    NotAuthenticated,

    #[error("Please select a delivery address")]
    MissingAddress,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Invalid menu item: {0}")]
    InvalidMenuItem(String),

    #[error("Invalid coupon code: {0}")]
    InvalidCoupon(String),

    #[error("An order is already being placed")]
    SubmissionInFlight,

    /// The backend refused the order; the message is shown as-is.
    #[error("{0}")]
    Rejected(String),

    #[error("Could not reach the restaurant service: {0}")]
    Unavailable(String),

    #[error("Checkout was cancelled")]
    Cancelled,
}

impl CheckoutError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::Unavailable(_))
    }
}

impl From<CoreError> for CheckoutError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Rejected { message, .. } => CheckoutError::Rejected(message),
            CoreError::ValidationError(message) => CheckoutError::Rejected(message),
            CoreError::Unauthorized => CheckoutError::NotAuthenticated,
            CoreError::Transport(message) => CheckoutError::Unavailable(message),
        }
    }
}

/// Where online payments go when the backend does not say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayeeConfig {
    pub upi_id: String,
    pub merchant_name: String,
    pub validity: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutPhase {
    Editing,
    Submitting,
    AwaitingPayment(Order),
    Placed(Order),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Cash on delivery: done.
    Placed(Order),
    /// Online: the backend has the order and the QR flow is open.
    AwaitingPayment(Order),
}

/// Collaborators every checkout session needs. Cheap to clone.
#[derive(Clone)]
pub struct CheckoutService {
    cart: Arc<CartStore>,
    session: Arc<SessionStore>,
    api: Arc<dyn OrderApi>,
    verifier: Arc<dyn PaymentVerifier>,
    billing: Arc<BillingEngine>,
    events: EventBus,
    payee: PayeeConfig,
}

impl CheckoutService {
    pub fn new(
        cart: Arc<CartStore>,
        session: Arc<SessionStore>,
        api: Arc<dyn OrderApi>,
        verifier: Arc<dyn PaymentVerifier>,
        billing: Arc<BillingEngine>,
        events: EventBus,
        payee: PayeeConfig,
    ) -> Self {
        Self { cart, session, api, verifier, billing, events, payee }
    }

    /// Begin a checkout, preselecting the user's default address.
    pub fn start(&self) -> CheckoutSession {
        let address_id = self
            .session
            .user()
            .and_then(|u| u.default_address().map(|a| a.id.clone()));
        let (phase, _) = watch::channel(CheckoutPhase::Editing);

        let session = CheckoutSession {
            id: Uuid::new_v4(),
            service: self.clone(),
            selection: Mutex::new(Selection {
                address_id,
                payment_method: PaymentMethod::default(),
                coupon: None,
            }),
            phase: Arc::new(phase),
            in_flight: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            submission: Mutex::new(None),
            payment: Mutex::new(None),
        };
        debug!("Checkout {} started", session.id);
        session
    }
}

#[derive(Debug, Clone)]
struct Selection {
    address_id: Option<String>,
    payment_method: PaymentMethod,
    coupon: Option<Coupon>,
}

/// One visit to the checkout screen.
///
/// Methods take `&self` so the session can be shared between the handlers of
/// one screen; at most one submission runs at a time.
pub struct CheckoutSession {
    id: Uuid,
    service: CheckoutService,
    selection: Mutex<Selection>,
    phase: Arc<watch::Sender<CheckoutPhase>>,
    in_flight: AtomicBool,
    disposed: AtomicBool,
    submission: Mutex<Option<AbortHandle>>,
    payment: Mutex<Option<PaymentQrFlow>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the in-flight slot however `submit` returns.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CheckoutSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> CheckoutPhase {
        self.phase.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CheckoutPhase> {
        self.phase.subscribe()
    }

    pub fn select_address(&self, address_id: &str) -> Result<(), CheckoutError> {
        let user = self.service.session.user().ok_or(CheckoutError::NotAuthenticated)?;
        if user.address(address_id).is_none() {
            return Err(CheckoutError::MissingAddress);
        }
        lock(&self.selection).address_id = Some(address_id.to_string());
        Ok(())
    }

    pub fn selected_address(&self) -> Option<DeliveryAddress> {
        let address_id = lock(&self.selection).address_id.clone()?;
        self.service.session.user()?.address(&address_id).cloned()
    }

    pub fn payment_method(&self) -> PaymentMethod {
        lock(&self.selection).payment_method
    }

    pub fn set_payment_method(&self, method: PaymentMethod) {
        lock(&self.selection).payment_method = method;
    }

    pub fn coupon(&self) -> Option<Coupon> {
        lock(&self.selection).coupon.clone()
    }

    /// Apply a coupon code. An unknown code leaves the current coupon in place.
    pub fn apply_coupon(&self, code: &str) -> Result<Bill, CheckoutError> {
        let coupon = self
            .service
            .billing
            .lookup_coupon(code)
            .map_err(|_| CheckoutError::InvalidCoupon(code.trim().to_string()))?;
        info!("Coupon {} applied", coupon.code);
        lock(&self.selection).coupon = Some(coupon);
        Ok(self.bill())
    }

    pub fn remove_coupon(&self) -> Bill {
        lock(&self.selection).coupon = None;
        self.bill()
    }

    /// The bill for the cart as it is right now.
    pub fn bill(&self) -> Bill {
        let cart = self.service.cart.snapshot();
        let coupon = self.coupon();
        self.service
            .billing
            .bill(cart.total(), cart.restaurant.as_ref(), coupon.as_ref())
    }

    /// Validate the checkout and freeze it into an order draft.
    pub fn draft(&self) -> Result<OrderDraft, CheckoutError> {
        let user = self.service.session.user().ok_or(CheckoutError::NotAuthenticated)?;
        let selection = lock(&self.selection).clone();

        let address = selection
            .address_id
            .as_deref()
            .and_then(|id| user.address(id))
            .cloned()
            .ok_or(CheckoutError::MissingAddress)?;

        let cart = self.service.cart.snapshot();
        let restaurant = match &cart.restaurant {
            Some(restaurant) if !cart.is_empty() => restaurant.clone(),
            _ => return Err(CheckoutError::EmptyCart),
        };

        for item in &cart.items {
            validate_menu_item_id(&item.menu_item_id)
                .map_err(|_| CheckoutError::InvalidMenuItem(item.menu_item_id.clone()))?;
        }

        let bill = self
            .service
            .billing
            .bill(cart.total(), Some(&restaurant), selection.coupon.as_ref());
        let contact_phone = address
            .phone
            .as_ref()
            .or(user.phone.as_ref())
            .map(|p| p.expose().to_string())
            .unwrap_or_default();

        Ok(OrderDraft {
            restaurant,
            items: cart.items.iter().map(OrderLine::from).collect(),
            delivery_address: address,
            contact_phone,
            payment_method: selection.payment_method,
            bill,
        })
    }

    /// Place the order.
    ///
    /// Cash orders finish here. Online orders are created with the backend and
    /// the payment flow is opened; the cart is only cleared once payment succeeds.
    /// A submit while an online order awaits payment reopens that order's QR code.
    pub async fn submit(&self) -> Result<SubmitOutcome, CheckoutError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(CheckoutError::Cancelled);
        }

        let awaiting = match &*self.phase.borrow() {
            CheckoutPhase::AwaitingPayment(order) => Some(order.clone()),
            _ => None,
        };
        if let Some(order) = awaiting {
            self.reopen_payment();
            return Ok(SubmitOutcome::AwaitingPayment(order));
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Checkout {}: submission already in flight", self.id);
            return Err(CheckoutError::SubmissionInFlight);
        }
        let _in_flight = InFlight(&self.in_flight);

        let draft = self.draft()?;
        self.phase.send_replace(CheckoutPhase::Submitting);
        info!(
            "Checkout {}: placing {} order at {} for {}",
            self.id,
            draft.payment_method.as_str(),
            draft.restaurant.id,
            draft.bill.total
        );

        let api = self.service.api.clone();
        let request = draft.to_request();
        let task = tokio::spawn(async move { api.create_order(&request).await });
        *lock(&self.submission) = Some(task.abort_handle());
        let joined = task.await;
        lock(&self.submission).take();

        let placed = match joined {
            Ok(Ok(placed)) => placed,
            Ok(Err(e)) => {
                warn!("Checkout {}: order failed: {}", self.id, e);
                self.phase.send_replace(CheckoutPhase::Editing);
                return Err(e.into());
            }
            Err(e) => {
                debug!("Checkout {}: submission task ended: {}", self.id, e);
                return Err(CheckoutError::Cancelled);
            }
        };

        let params = placed.payment_params.clone();
        if let Some(total) = placed.total.filter(|t| *t != draft.bill.total) {
            warn!("Backend total {} differs from local bill {}", total, draft.bill.total);
        }
        let order = Order::from_placed(draft, placed);

        match order.payment_method {
            PaymentMethod::Cod => {
                finish_order(&self.service, &self.phase, &order);
                Ok(SubmitOutcome::Placed(order))
            }
            PaymentMethod::Online => {
                if self.disposed.load(Ordering::SeqCst) {
                    warn!("Checkout {}: order {} created after checkout was left", self.id, order.id);
                    return Err(CheckoutError::Cancelled);
                }
                self.start_payment(&order, params);
                self.phase.send_replace(CheckoutPhase::AwaitingPayment(order.clone()));
                Ok(SubmitOutcome::AwaitingPayment(order))
            }
        }
    }

    fn start_payment(&self, order: &Order, params: Option<PaymentParams>) {
        let payee = &self.service.payee;
        let (payee_id, payee_name) = match params {
            Some(p) => (p.upi_id, p.merchant_name),
            None => (payee.upi_id.clone(), payee.merchant_name.clone()),
        };
        let request = PaymentRequest {
            payee_id,
            payee_name,
            amount: order.amount_due(),
            order_id: order.id.clone(),
            order_number: order.order_number.clone(),
        };

        let callbacks = {
            let service = self.service.clone();
            let phase = self.phase.clone();
            let paid = order.clone();
            let events = self.service.events.clone();
            let reference = order.reference().to_string();
            PaymentCallbacks::new()
                .on_success(move || {
                    service
                        .events
                        .publish(DomainEvent::payment_succeeded(paid.reference(), paid.amount_due()));
                    finish_order(&service, &phase, &paid);
                })
                .on_timeout(move || events.publish(DomainEvent::payment_timed_out(&reference)))
        };

        let mut flow = PaymentQrFlow::new(request, self.service.verifier.clone(), callbacks)
            .with_validity(payee.validity);
        flow.open();
        *lock(&self.payment) = Some(flow);
    }

    pub fn payment_view(&self) -> Option<PaymentView> {
        lock(&self.payment).as_ref().map(PaymentQrFlow::view)
    }

    pub fn payment_uri(&self) -> Option<String> {
        lock(&self.payment).as_ref().map(PaymentQrFlow::uri)
    }

    pub fn subscribe_payment(&self) -> Option<watch::Receiver<PaymentView>> {
        lock(&self.payment).as_ref().map(PaymentQrFlow::subscribe)
    }

    pub fn confirm_payment(&self) -> bool {
        lock(&self.payment).as_mut().is_some_and(PaymentQrFlow::confirm_payment)
    }

    pub fn retry_payment(&self) -> bool {
        lock(&self.payment).as_mut().is_some_and(PaymentQrFlow::retry)
    }

    pub fn close_payment(&self) {
        if let Some(flow) = lock(&self.payment).as_mut() {
            flow.close();
        }
    }

    pub fn reopen_payment(&self) -> bool {
        if !matches!(*self.phase.borrow(), CheckoutPhase::AwaitingPayment(_)) {
            return false;
        }
        match lock(&self.payment).as_mut() {
            Some(flow) if !flow.is_open() => {
                flow.open();
                true
            }
            _ => false,
        }
    }

    /// The user left the checkout screen: stop whatever is still running.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = lock(&self.submission).take() {
            info!("Checkout {}: cancelling in-flight submission", self.id);
            task.abort();
        }
        self.close_payment();
    }
}

impl Drop for CheckoutSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn finish_order(service: &CheckoutService, phase: &watch::Sender<CheckoutPhase>, order: &Order) {
    service.cart.clear();
    service.events.publish(DomainEvent::order_placed(
        &order.id,
        &order.restaurant.id,
        order.payment_method.as_str(),
        order.amount_due(),
    ));
    info!("Order {} placed", order.reference());
    phase.send_replace(CheckoutPhase::Placed(order.clone()));
}
