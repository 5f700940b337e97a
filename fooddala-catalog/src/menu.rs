use fooddala_shared::Money;
use serde::{Deserialize, Serialize};

const MAX_ID_LEN: usize = 64;

/// The restaurant a cart is bound to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// Falls back to the configured default when the restaurant does not set one
    #[serde(default)]
    pub delivery_fee: Option<Money>,
}

impl RestaurantRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            delivery_fee: None,
        }
    }

    pub fn with_delivery_fee(mut self, fee: Money) -> Self {
        self.delivery_fee = Some(fee);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpiceLevel {
    #[default]
    Mild,
    Medium,
    Hot,
}

/// A dish as listed on a restaurant menu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub discount_price: Option<Money>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_veg: bool,
    #[serde(default = "default_available")]
    pub is_available: bool,
    #[serde(default)]
    pub spice_level: SpiceLevel,
}

fn default_available() -> bool {
    true
}

impl MenuItem {
    /// Price charged per unit: the discounted price when one is set.
    pub fn effective_price(&self) -> Money {
        self.discount_price.unwrap_or(self.price)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CatalogError {
    #[error("Invalid menu item id: {0:?}")]
    InvalidMenuItemId(String),

    #[error("Menu item not available: {0}")]
    NotAvailable(String),
}

/// Format check for menu item ids before they are sent to the backend.
///
/// Accepts 1 to 64 ASCII alphanumerics, `-` or `_`. Covers backend object ids
/// as well as the short ids used by seeded menus.
pub fn validate_menu_item_id(id: &str) -> Result<(), CatalogError> {
    let well_formed = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

    if well_formed {
        Ok(())
    } else {
        Err(CatalogError::InvalidMenuItemId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_price_prefers_discount() {
        let mut item: MenuItem = serde_json::from_value(serde_json::json!({
            "_id": "4",
            "name": "Butter Chicken",
            "price": 320,
            "category": "Main Course",
            "spiceLevel": "medium"
        }))
        .unwrap();
        assert!(item.is_available);
        assert_eq!(item.effective_price(), Money::from_rupees(320));

        item.discount_price = Some(Money::from_rupees(280));
        assert_eq!(item.effective_price(), Money::from_rupees(280));
    }

    #[test]
    fn test_menu_item_id_format() {
        assert!(validate_menu_item_id("1").is_ok());
        assert!(validate_menu_item_id("65f1a0c2e4b0a1b2c3d4e5f6").is_ok());
        assert!(validate_menu_item_id("dal_makhani-2").is_ok());

        assert!(validate_menu_item_id("").is_err());
        assert!(validate_menu_item_id("undefined item").is_err());
        assert!(validate_menu_item_id("../orders").is_err());
        assert!(validate_menu_item_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_backend_amounts_are_rupees() {
        let item: MenuItem = serde_json::from_value(serde_json::json!({
            "_id": "7",
            "name": "Filter Coffee",
            "price": 49.5
        }))
        .unwrap();
        assert_eq!(item.effective_price(), Money::from_paise(4950));

        let restaurant: RestaurantRef = serde_json::from_value(serde_json::json!({
            "_id": "r1",
            "name": "Meghana Foods",
            "deliveryFee": 40
        }))
        .unwrap();
        assert_eq!(restaurant.delivery_fee, Some(Money::from_rupees(40)));
    }
}
