pub mod models;
pub mod status;
pub mod tracker;
pub mod payment_qr;
pub mod checkout;

pub use models::{Order, OrderDraft, OrderLine, OrderStatus, PaymentMethod};
pub use status::{StatusFilter, StatusView, StepState};
pub use tracker::{OrderTracker, TrackerError};
pub use payment_qr::{PaymentCallbacks, PaymentQrFlow, PaymentRequest, PaymentState, PaymentView};
pub use checkout::{CheckoutError, CheckoutPhase, CheckoutService, CheckoutSession, PayeeConfig, SubmitOutcome};
