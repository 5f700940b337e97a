pub mod app_config;
pub mod cart;
pub mod events;
pub mod local_storage;
pub mod location;
pub mod session;

pub use cart::{AddOutcome, Cart, CartItem, CartStore};
pub use events::EventBus;
pub use local_storage::{FileStorage, LocalStorage, MemoryStorage, StorageError};
pub use location::{DeliveryLocation, LocationError, LocationStore};
pub use session::{AuthSession, SessionStore};
