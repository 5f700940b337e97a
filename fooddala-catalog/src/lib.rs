pub mod menu;
pub mod billing;

pub use menu::{validate_menu_item_id, CatalogError, MenuItem, RestaurantRef};
pub use billing::{Bill, BillingConfig, BillingEngine, BillingError, Coupon, CouponKind};
