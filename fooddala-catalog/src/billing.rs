use crate::menu::RestaurantRef;
use fooddala_shared::Money;
use serde::{Deserialize, Serialize};

/// How a coupon takes money off the subtotal. A coupon is exactly one of these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CouponKind {
    /// Percentage of the subtotal
    Percent(u32),
    /// Fixed amount regardless of subtotal
    Flat(Money),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coupon {
    pub code: String,
    pub kind: CouponKind,
}

impl Coupon {
    pub fn percent(code: &str, percent: u32) -> Self {
        Self { code: code.to_string(), kind: CouponKind::Percent(percent) }
    }

    pub fn flat(code: &str, amount: Money) -> Self {
        Self { code: code.to_string(), kind: CouponKind::Flat(amount) }
    }

    /// Discount this coupon grants on `subtotal`. Never more than the subtotal itself.
    pub fn discount_on(&self, subtotal: Money) -> Money {
        let raw = match self.kind {
            CouponKind::Percent(percent) => subtotal.percent(percent),
            CouponKind::Flat(amount) => amount,
        };
        raw.min(subtotal).max(Money::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Tax charged on the subtotal, in percent
    #[serde(default = "default_tax_percent")]
    pub tax_percent: u32,

    /// Used when the bound restaurant does not set its own delivery fee
    #[serde(default = "default_delivery_fee")]
    pub default_delivery_fee: Money,

    /// Codes accepted at checkout; matched case-insensitively
    #[serde(default = "default_coupons")]
    pub coupons: Vec<Coupon>,
}

fn default_tax_percent() -> u32 {
    5
}

fn default_delivery_fee() -> Money {
    Money::from_rupees(40)
}

fn default_coupons() -> Vec<Coupon> {
    vec![
        Coupon::percent("WELCOME10", 10),
        Coupon::flat("FLAT50", Money::from_rupees(50)),
    ]
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            tax_percent: default_tax_percent(),
            default_delivery_fee: default_delivery_fee(),
            coupons: default_coupons(),
        }
    }
}

/// Itemised charges for a cart: `subtotal + delivery_fee + tax - discount`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
    pub coupon_code: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BillingError {
    #[error("Invalid coupon code: {0}")]
    InvalidCoupon(String),
}

pub struct BillingEngine {
    config: BillingConfig,
}

impl BillingEngine {
    pub fn new(config: BillingConfig) -> Self {
        Self { config }
    }

    /// Look up a coupon by the code the user typed.
    pub fn lookup_coupon(&self, code: &str) -> Result<Coupon, BillingError> {
        let wanted = code.trim();
        self.config
            .coupons
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| BillingError::InvalidCoupon(wanted.to_string()))
    }

    pub fn delivery_fee(&self, restaurant: Option<&RestaurantRef>) -> Money {
        restaurant
            .and_then(|r| r.delivery_fee)
            .unwrap_or(self.config.default_delivery_fee)
    }

    pub fn tax(&self, subtotal: Money) -> Money {
        subtotal.percent(self.config.tax_percent)
    }

    pub fn bill(&self, subtotal: Money, restaurant: Option<&RestaurantRef>, coupon: Option<&Coupon>) -> Bill {
        let delivery_fee = self.delivery_fee(restaurant);
        let tax = self.tax(subtotal);
        let discount = coupon.map(|c| c.discount_on(subtotal)).unwrap_or(Money::ZERO);

        Bill {
            subtotal,
            delivery_fee,
            tax,
            discount,
            total: subtotal + delivery_fee + tax - discount,
            coupon_code: coupon.map(|c| c.code.clone()),
        }
    }
}

impl Default for BillingEngine {
    fn default() -> Self {
        Self::new(BillingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome10_takes_ten_percent() {
        let engine = BillingEngine::default();
        let coupon = engine.lookup_coupon("WELCOME10").unwrap();
        assert_eq!(coupon.discount_on(Money::from_rupees(1000)), Money::from_rupees(100));
    }

    #[test]
    fn test_flat50_ignores_subtotal() {
        let engine = BillingEngine::default();
        let coupon = engine.lookup_coupon("flat50").unwrap();
        assert_eq!(coupon.discount_on(Money::from_rupees(1000)), Money::from_rupees(50));
        assert_eq!(coupon.discount_on(Money::from_rupees(300)), Money::from_rupees(50));
    }

    #[test]
    fn test_flat_discount_capped_at_subtotal() {
        let coupon = Coupon::flat("FLAT50", Money::from_rupees(50));
        assert_eq!(coupon.discount_on(Money::from_rupees(30)), Money::from_rupees(30));
    }

    #[test]
    fn test_unknown_coupon_rejected() {
        let engine = BillingEngine::default();
        assert_eq!(
            engine.lookup_coupon(" FREEFOOD "),
            Err(BillingError::InvalidCoupon("FREEFOOD".to_string()))
        );
    }

    #[test]
    fn test_bill_components() {
        let engine = BillingEngine::default();
        let restaurant = RestaurantRef::new("r1", "Meghana Foods").with_delivery_fee(Money::from_rupees(30));
        let coupon = engine.lookup_coupon("welcome10").unwrap();

        let bill = engine.bill(Money::from_rupees(1000), Some(&restaurant), Some(&coupon));
        assert_eq!(bill.delivery_fee, Money::from_rupees(30));
        assert_eq!(bill.tax, Money::from_rupees(50));
        assert_eq!(bill.discount, Money::from_rupees(100));
        assert_eq!(bill.total, Money::from_rupees(980));
        assert_eq!(bill.coupon_code.as_deref(), Some("WELCOME10"));
    }

    #[test]
    fn test_default_delivery_fee_without_restaurant_fee() {
        let engine = BillingEngine::default();
        let restaurant = RestaurantRef::new("r1", "Vidyarthi Bhavan");
        let bill = engine.bill(Money::from_rupees(200), Some(&restaurant), None);
        assert_eq!(bill.delivery_fee, Money::from_rupees(40));
        assert_eq!(bill.total, Money::from_rupees(250));
    }

    #[test]
    fn test_coupon_kind_wire_shape() {
        let json = serde_json::to_value(Coupon::percent("WELCOME10", 10)).unwrap();
        assert_eq!(json["kind"]["type"], "percent");
        assert_eq!(json["kind"]["value"], 10);
    }
}
