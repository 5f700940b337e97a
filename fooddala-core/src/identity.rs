use crate::geo::GeoPoint;
use fooddala_shared::Masked;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Restaurant,
    Driver,
    Admin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressLabel {
    #[default]
    Home,
    Work,
    Other,
}

/// A saved delivery address on the user's profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub label: AddressLabel,
    pub street: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(default)]
    pub landmark: Option<String>,
    #[serde(default)]
    pub phone: Option<Masked<String>>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
}

impl DeliveryAddress {
    /// All of street, city, state and pincode are required before an address can be saved.
    pub fn is_complete(&self) -> bool {
        [&self.street, &self.city, &self.state, &self.pincode]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    /// Single-line form used on order summaries.
    pub fn one_line(&self) -> String {
        format!("{}, {}, {} {}", self.street, self.city, self.state, self.pincode)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<Masked<String>>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub addresses: Vec<DeliveryAddress>,
}

impl User {
    /// The address checkout preselects: the one flagged default, else the first saved one.
    pub fn default_address(&self) -> Option<&DeliveryAddress> {
        self.addresses
            .iter()
            .find(|a| a.is_default)
            .or_else(|| self.addresses.first())
    }

    pub fn address(&self, address_id: &str) -> Option<&DeliveryAddress> {
        self.addresses.iter().find(|a| a.id == address_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(id: &str, is_default: bool) -> DeliveryAddress {
        DeliveryAddress {
            id: id.to_string(),
            label: AddressLabel::Home,
            street: "12 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560001".to_string(),
            landmark: None,
            phone: None,
            is_default,
            coordinates: None,
        }
    }

    #[test]
    fn test_default_address_prefers_flagged() {
        let mut user = User {
            id: "u1".to_string(),
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: None,
            role: Role::Customer,
            addresses: vec![address("a1", false), address("a2", true)],
        };
        assert_eq!(user.default_address().unwrap().id, "a2");

        user.addresses[1].is_default = false;
        assert_eq!(user.default_address().unwrap().id, "a1");
    }

    #[test]
    fn test_incomplete_address() {
        let mut addr = address("a1", false);
        assert!(addr.is_complete());
        addr.pincode = "  ".to_string();
        assert!(!addr.is_complete());
    }

    #[test]
    fn test_user_deserializes_backend_shape() {
        let user: User = serde_json::from_value(serde_json::json!({
            "_id": "65f0c2",
            "name": "Ravi",
            "email": "ravi@example.com",
            "role": "driver"
        }))
        .unwrap();
        assert_eq!(user.role, Role::Driver);
        assert!(user.addresses.is_empty());
    }
}
