use fooddala_core::payment::{PaymentStatus, PaymentVerifier, VerificationRequest};
use fooddala_shared::Money;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How long a generated QR code stays payable.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(300);

const TICK: Duration = Duration::from_secs(1);

/// Characters left alone by a browser's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// What the customer is asked to pay, and to whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub payee_id: String,
    pub payee_name: String,
    pub amount: Money,
    pub order_id: String,
    pub order_number: Option<String>,
}

impl PaymentRequest {
    pub fn order_reference(&self) -> &str {
        self.order_number.as_deref().unwrap_or(&self.order_id)
    }

    /// The UPI deep link encoded into the QR code.
    pub fn uri(&self) -> String {
        let note = format!("Order{}", self.order_reference());
        format!(
            "upi://pay?pa={}&pn={}&am={}&cu=INR&tn={}",
            self.payee_id,
            utf8_percent_encode(&self.payee_name, URI_COMPONENT),
            self.amount,
            utf8_percent_encode(&note, URI_COMPONENT),
        )
    }

    fn verification(&self) -> VerificationRequest {
        VerificationRequest {
            order_id: self.order_id.clone(),
            order_reference: self.order_reference().to_string(),
            amount: self.amount,
            transaction_ref: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Checking,
    Success,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentView {
    pub state: PaymentState,
    pub remaining_secs: u32,
    pub open: bool,
    /// Bumped on every open, retry and close; tasks from an older value are stale.
    generation: u64,
}

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Hooks fired from the flow's background tasks, each at most once per countdown.
#[derive(Clone, Default)]
pub struct PaymentCallbacks {
    on_success: Option<Callback>,
    on_timeout: Option<Callback>,
}

impl PaymentCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_timeout(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_timeout = Some(Arc::new(f));
        self
    }
}

enum Tick {
    Running,
    Expired,
    Finished,
}

struct Shared {
    view: watch::Sender<PaymentView>,
    callbacks: PaymentCallbacks,
}

impl Shared {
    fn tick(&self, generation: u64) -> Tick {
        let mut outcome = Tick::Finished;
        self.view.send_if_modified(|view| {
            if view.generation != generation || !view.open {
                return false;
            }
            match view.state {
                PaymentState::Pending => {
                    view.remaining_secs = view.remaining_secs.saturating_sub(1);
                    if view.remaining_secs == 0 {
                        view.state = PaymentState::Timeout;
                        outcome = Tick::Expired;
                    } else {
                        outcome = Tick::Running;
                    }
                    true
                }
                // Paused while the verifier runs
                PaymentState::Checking => {
                    outcome = Tick::Running;
                    false
                }
                PaymentState::Success | PaymentState::Timeout => false,
            }
        });
        outcome
    }

    /// Land a verifier result. Returns false when the flow moved on in the meantime.
    fn settle(&self, generation: u64, verified: bool) -> bool {
        self.view.send_if_modified(|view| {
            if view.generation != generation || !view.open || view.state != PaymentState::Checking {
                return false;
            }
            view.state = if verified { PaymentState::Success } else { PaymentState::Pending };
            true
        })
    }
}

async fn run_countdown(shared: Arc<Shared>, generation: u64) {
    let mut ticker = interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match shared.tick(generation) {
            Tick::Running => {}
            Tick::Expired => {
                info!("Payment window expired");
                if let Some(f) = &shared.callbacks.on_timeout {
                    f();
                }
                return;
            }
            Tick::Finished => return,
        }
    }
}

async fn run_verification(shared: Arc<Shared>, verifier: Arc<dyn PaymentVerifier>, request: VerificationRequest, generation: u64) {
    let verified = match verifier.verify(&request).await {
        Ok(PaymentStatus::Succeeded) => true,
        Ok(status) => {
            warn!("Payment for {} not confirmed: {:?}", request.order_reference, status);
            false
        }
        Err(e) => {
            warn!("Payment verification for {} failed: {}", request.order_reference, e);
            false
        }
    };

    if shared.settle(generation, verified) && verified {
        info!("Payment for {} confirmed", request.order_reference);
        if let Some(f) = &shared.callbacks.on_success {
            f();
        }
    }
}

/// A QR payment session: countdown, verification and the URI to render.
///
/// The countdown and verification run as tokio tasks owned by the flow, so
/// `open`, `retry` and `confirm_payment` must be called inside a runtime.
/// Closing or dropping the flow aborts both.
pub struct PaymentQrFlow {
    request: PaymentRequest,
    validity_secs: u32,
    verifier: Arc<dyn PaymentVerifier>,
    shared: Arc<Shared>,
    countdown: Option<JoinHandle<()>>,
    verification: Option<JoinHandle<()>>,
}

impl PaymentQrFlow {
    pub fn new(request: PaymentRequest, verifier: Arc<dyn PaymentVerifier>, callbacks: PaymentCallbacks) -> Self {
        let validity_secs = DEFAULT_VALIDITY.as_secs() as u32;
        let (view, _) = watch::channel(PaymentView {
            state: PaymentState::Pending,
            remaining_secs: validity_secs,
            open: false,
            generation: 0,
        });
        Self {
            request,
            validity_secs,
            verifier,
            shared: Arc::new(Shared { view, callbacks }),
            countdown: None,
            verification: None,
        }
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity_secs = validity.as_secs().clamp(1, u32::MAX as u64) as u32;
        self.shared.view.send_modify(|view| {
            if !view.open {
                view.remaining_secs = self.validity_secs;
            }
        });
        self
    }

    pub fn request(&self) -> &PaymentRequest {
        &self.request
    }

    /// Swap in a new amount or order reference. The URI follows on the next read.
    pub fn set_request(&mut self, request: PaymentRequest) {
        debug!("Payment request now {} for {}", request.amount, request.order_reference());
        self.request = request;
    }

    pub fn uri(&self) -> String {
        self.request.uri()
    }

    pub fn view(&self) -> PaymentView {
        self.shared.view.borrow().clone()
    }

    pub fn state(&self) -> PaymentState {
        self.shared.view.borrow().state
    }

    pub fn is_open(&self) -> bool {
        self.shared.view.borrow().open
    }

    pub fn subscribe(&self) -> watch::Receiver<PaymentView> {
        self.shared.view.subscribe()
    }

    pub fn format_remaining(&self) -> String {
        format_remaining(self.shared.view.borrow().remaining_secs)
    }

    /// Share of the window still left, for the progress bar.
    pub fn remaining_fraction(&self) -> f64 {
        f64::from(self.shared.view.borrow().remaining_secs) / f64::from(self.validity_secs)
    }

    /// Show the QR code and start a fresh countdown.
    pub fn open(&mut self) {
        info!("Opening payment for {} ({})", self.request.order_reference(), self.request.amount);
        self.restart();
    }

    /// Hide the QR code. The order itself is left as it is.
    pub fn close(&mut self) {
        self.abort_tasks();
        self.shared.view.send_modify(|view| {
            view.open = false;
            view.generation += 1;
        });
        debug!("Closed payment for {}", self.request.order_reference());
    }

    /// The customer says they paid. Only acts while pending; returns whether verification started.
    pub fn confirm_payment(&mut self) -> bool {
        let mut generation = 0;
        let started = self.shared.view.send_if_modified(|view| {
            if !view.open || view.state != PaymentState::Pending {
                return false;
            }
            view.state = PaymentState::Checking;
            generation = view.generation;
            true
        });
        if !started {
            debug!("Ignoring payment confirmation in state {:?}", self.state());
            return false;
        }

        if let Some(previous) = self.verification.take() {
            previous.abort();
        }
        self.verification = Some(tokio::spawn(run_verification(
            self.shared.clone(),
            self.verifier.clone(),
            self.request.verification(),
            generation,
        )));
        true
    }

    /// Start a new window after a timeout.
    pub fn retry(&mut self) -> bool {
        let view = self.view();
        if !view.open || view.state != PaymentState::Timeout {
            return false;
        }
        info!("Retrying payment for {}", self.request.order_reference());
        self.restart();
        true
    }

    fn restart(&mut self) {
        self.abort_tasks();
        let validity_secs = self.validity_secs;
        let mut generation = 0;
        self.shared.view.send_modify(|view| {
            view.generation += 1;
            view.state = PaymentState::Pending;
            view.remaining_secs = validity_secs;
            view.open = true;
            generation = view.generation;
        });
        self.countdown = Some(tokio::spawn(run_countdown(self.shared.clone(), generation)));
    }

    fn abort_tasks(&mut self) {
        if let Some(task) = self.countdown.take() {
            task.abort();
        }
        if let Some(task) = self.verification.take() {
            task.abort();
        }
    }
}

impl Drop for PaymentQrFlow {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// `MM:SS`
pub fn format_remaining(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fooddala_core::payment::SimulatedVerifier;
    use fooddala_core::CoreResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn request() -> PaymentRequest {
        PaymentRequest {
            payee_id: "7760554350@axl".to_string(),
            payee_name: "Fooddala Foods".to_string(),
            amount: Money::from_paise(54000),
            order_id: "665f1c".to_string(),
            order_number: Some("FD1024".to_string()),
        }
    }

    struct Counters {
        success: Arc<AtomicUsize>,
        timeout: Arc<AtomicUsize>,
    }

    impl Counters {
        fn new() -> Self {
            Self {
                success: Arc::new(AtomicUsize::new(0)),
                timeout: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn callbacks(&self) -> PaymentCallbacks {
            let success = self.success.clone();
            let timeout = self.timeout.clone();
            PaymentCallbacks::new()
                .on_success(move || {
                    success.fetch_add(1, Ordering::SeqCst);
                })
                .on_timeout(move || {
                    timeout.fetch_add(1, Ordering::SeqCst);
                })
        }
    }

    struct DecliningVerifier;

    #[async_trait]
    impl PaymentVerifier for DecliningVerifier {
        async fn verify(&self, _request: &VerificationRequest) -> CoreResult<PaymentStatus> {
            sleep(Duration::from_secs(1)).await;
            Ok(PaymentStatus::Failed)
        }
    }

    fn flow(counters: &Counters) -> PaymentQrFlow {
        PaymentQrFlow::new(request(), Arc::new(SimulatedVerifier::default()), counters.callbacks())
    }

    #[test]
    fn test_uri_shape() {
        assert_eq!(
            request().uri(),
            "upi://pay?pa=7760554350@axl&pn=Fooddala%20Foods&am=540.00&cu=INR&tn=OrderFD1024"
        );

        let mut without_number = request();
        without_number.order_number = None;
        without_number.amount = Money::from_rupees(99);
        assert!(without_number.uri().ends_with("&am=99.00&cu=INR&tn=Order665f1c"));
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(300), "05:00");
        assert_eq!(format_remaining(61), "01:01");
        assert_eq!(format_remaining(0), "00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_times_out_once() {
        let counters = Counters::new();
        let mut flow = flow(&counters);
        flow.open();
        assert_eq!(flow.format_remaining(), "05:00");

        sleep(Duration::from_millis(150_500)).await;
        assert_eq!(flow.view().remaining_secs, 150);
        assert!((flow.remaining_fraction() - 0.5).abs() < f64::EPSILON);

        sleep(Duration::from_secs(150)).await;
        assert_eq!(flow.state(), PaymentState::Timeout);
        assert_eq!(counters.timeout.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(counters.timeout.load(Ordering::SeqCst), 1);
        assert!(!flow.confirm_payment());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_succeeds_once() {
        let counters = Counters::new();
        let mut flow = flow(&counters);
        flow.open();

        assert!(flow.confirm_payment());
        assert_eq!(flow.state(), PaymentState::Checking);
        assert!(!flow.confirm_payment());

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(flow.state(), PaymentState::Success);
        assert_eq!(counters.success.load(Ordering::SeqCst), 1);

        assert!(!flow.confirm_payment());
        sleep(Duration::from_secs(400)).await;
        assert_eq!(counters.success.load(Ordering::SeqCst), 1);
        assert_eq!(counters.timeout.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_before_verification_never_succeeds() {
        let counters = Counters::new();
        let mut flow = flow(&counters);
        flow.open();
        flow.confirm_payment();

        sleep(Duration::from_secs(1)).await;
        flow.close();
        sleep(Duration::from_secs(5)).await;

        assert_eq!(counters.success.load(Ordering::SeqCst), 0);
        assert!(!flow.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_timeout_resets_window() {
        let counters = Counters::new();
        let mut flow = flow(&counters).with_validity(Duration::from_secs(30));
        assert!(!flow.retry());

        flow.open();
        sleep(Duration::from_millis(30_500)).await;
        assert_eq!(flow.state(), PaymentState::Timeout);

        assert!(flow.retry());
        assert_eq!(flow.view().remaining_secs, 30);
        sleep(Duration::from_secs(10)).await;
        assert_eq!(flow.state(), PaymentState::Pending);
        assert_eq!(flow.view().remaining_secs, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_declined_verification_returns_to_pending() {
        let counters = Counters::new();
        let mut flow = PaymentQrFlow::new(request(), Arc::new(DecliningVerifier), counters.callbacks());
        flow.open();

        sleep(Duration::from_millis(10_500)).await;
        assert_eq!(flow.view().remaining_secs, 290);
        flow.confirm_payment();

        // Verifier answers at 11.5s; the tick at 11s is skipped while checking
        sleep(Duration::from_millis(2_200)).await;
        assert_eq!(flow.state(), PaymentState::Pending);
        assert_eq!(flow.view().remaining_secs, 289);
        assert_eq!(counters.success.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_starts_fresh() {
        let counters = Counters::new();
        let mut flow = flow(&counters);
        flow.open();
        sleep(Duration::from_millis(42_500)).await;
        flow.close();

        flow.open();
        assert_eq!(flow.state(), PaymentState::Pending);
        assert_eq!(flow.view().remaining_secs, 300);
    }
}
