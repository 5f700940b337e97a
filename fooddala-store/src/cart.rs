use crate::local_storage::{load_json, save_json, LocalStorage};
use fooddala_catalog::{MenuItem, RestaurantRef};
use fooddala_shared::Money;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// One cart line: a menu item with a particular set of customizations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub menu_item_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    /// Selection tags in the order they were chosen
    #[serde(default)]
    pub customizations: Vec<String>,
}

impl CartItem {
    pub fn new(menu_item_id: impl Into<String>, name: impl Into<String>, unit_price: Money, quantity: u32) -> Self {
        Self {
            menu_item_id: menu_item_id.into(),
            name: name.into(),
            unit_price,
            quantity,
            customizations: Vec::new(),
        }
    }

    pub fn from_menu_item(item: &MenuItem, quantity: u32, customizations: Vec<String>) -> Self {
        Self {
            menu_item_id: item.id.clone(),
            name: item.name.clone(),
            unit_price: item.effective_price(),
            quantity,
            customizations,
        }
    }

    pub fn with_customizations(mut self, customizations: Vec<String>) -> Self {
        self.customizations = customizations;
        self
    }

    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }

    /// Two lines merge when they are the same dish with identical customizations.
    pub fn same_line(&self, other: &CartItem) -> bool {
        self.menu_item_id == other.menu_item_id && self.customizations == other.customizations
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    /// Set exactly when the cart has items
    pub restaurant: Option<RestaurantRef>,
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn restaurant_id(&self) -> Option<&str> {
        self.restaurant.as_ref().map(|r| r.id.as_str())
    }

    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Repairs a cart read back from storage so it satisfies the cart invariants.
    fn sanitized(mut self) -> Self {
        self.items.retain(|i| i.quantity >= 1);
        if self.items.is_empty() {
            self.restaurant = None;
        } else if self.restaurant.is_none() {
            warn!("Stored cart has items but no restaurant; discarding it");
            return Cart::default();
        }
        self
    }

    fn insert(&mut self, item: CartItem, restaurant: &RestaurantRef) -> AddOutcome {
        self.restaurant = Some(restaurant.clone());
        match self.items.iter_mut().position(|line| line.same_line(&item)) {
            Some(index) => {
                let line = &mut self.items[index];
                line.quantity = line.quantity.saturating_add(item.quantity);
                AddOutcome::Merged { line: index }
            }
            None => {
                self.items.push(item);
                AddOutcome::Added { line: self.items.len() - 1 }
            }
        }
    }
}

/// Result of offering an item to the cart.
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added { line: usize },
    Merged { line: usize },
    /// The cart holds items from another restaurant. Nothing changed; call
    /// [`CartStore::confirm_discard_and_add`] to replace the cart.
    Conflict { current: RestaurantRef },
    /// Quantity below one; nothing changed
    InvalidQuantity,
}

impl AddOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, AddOutcome::Added { .. } | AddOutcome::Merged { .. })
    }
}

/// The process-wide cart. Only this type mutates the cart; everyone else reads
/// through [`CartStore::snapshot`] or [`CartStore::subscribe`].
///
/// Every mutation is written to local storage before the mutating call returns,
/// while the cart is still locked, so persisted snapshots follow call order.
pub struct CartStore {
    cart: watch::Sender<Cart>,
    storage: Arc<dyn LocalStorage>,
}

impl CartStore {
    pub const STORAGE_KEY: &'static str = "fooddala_cart";

    /// Load the persisted cart, or start empty if there is none or it cannot be read.
    pub fn hydrate(storage: Arc<dyn LocalStorage>) -> Self {
        let cart = load_json::<Cart>(&*storage, Self::STORAGE_KEY)
            .map(Cart::sanitized)
            .unwrap_or_default();
        debug!("Hydrated cart with {} lines", cart.items.len());
        let (tx, _) = watch::channel(cart);
        Self { cart: tx, storage }
    }

    pub fn snapshot(&self) -> Cart {
        self.cart.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.cart.subscribe()
    }

    pub fn total(&self) -> Money {
        self.cart.borrow().total()
    }

    pub fn count(&self) -> u32 {
        self.cart.borrow().count()
    }

    pub fn add_item(&self, item: CartItem, restaurant: &RestaurantRef) -> AddOutcome {
        if item.quantity < 1 {
            return AddOutcome::InvalidQuantity;
        }

        let mut outcome = AddOutcome::InvalidQuantity;
        self.mutate(|cart| {
            if let Some(current) = cart.restaurant.as_ref().filter(|r| !cart.items.is_empty() && r.id != restaurant.id) {
                debug!("Cart bound to {}, refusing item from {}", current.id, restaurant.id);
                outcome = AddOutcome::Conflict { current: current.clone() };
                return false;
            }
            outcome = cart.insert(item, restaurant);
            true
        });
        outcome
    }

    /// Second step after [`AddOutcome::Conflict`]: drop the current cart and start one for `restaurant`.
    pub fn confirm_discard_and_add(&self, item: CartItem, restaurant: &RestaurantRef) -> AddOutcome {
        if item.quantity < 1 {
            return AddOutcome::InvalidQuantity;
        }

        let mut outcome = AddOutcome::InvalidQuantity;
        self.mutate(|cart| {
            if cart.restaurant_id().is_some_and(|id| id != restaurant.id) {
                info!("Discarding cart from {:?} for {}", cart.restaurant_id(), restaurant.id);
                *cart = Cart::default();
            }
            outcome = cart.insert(item, restaurant);
            true
        });
        outcome
    }

    /// Set a line's quantity. Anything below one removes the line.
    /// Returns false when `line` does not exist.
    pub fn update_quantity(&self, line: usize, quantity: i64) -> bool {
        if quantity < 1 {
            return self.remove_item(line);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        let mut updated = false;
        self.mutate(|cart| match cart.items.get_mut(line) {
            Some(item) => {
                item.quantity = quantity;
                updated = true;
                true
            }
            None => false,
        });
        updated
    }

    pub fn remove_item(&self, line: usize) -> bool {
        let mut removed = false;
        self.mutate(|cart| {
            if line >= cart.items.len() {
                return false;
            }
            cart.items.remove(line);
            if cart.items.is_empty() {
                cart.restaurant = None;
            }
            removed = true;
            true
        });
        removed
    }

    pub fn clear(&self) {
        self.mutate(|cart| {
            *cart = Cart::default();
            true
        });
    }

    /// Apply `f` under the cart lock; when it reports a change, persist and notify subscribers.
    fn mutate(&self, f: impl FnOnce(&mut Cart) -> bool) {
        let storage = &*self.storage;
        self.cart.send_if_modified(|cart| {
            let changed = f(cart);
            if changed {
                save_json(storage, Self::STORAGE_KEY, cart);
            }
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_storage::MemoryStorage;
    use proptest::prelude::*;

    fn meghana() -> RestaurantRef {
        RestaurantRef::new("r-meghana", "Meghana Foods")
    }

    fn truffles() -> RestaurantRef {
        RestaurantRef::new("r-truffles", "Truffles")
    }

    fn biryani(quantity: u32) -> CartItem {
        CartItem::new("m-biryani", "Chicken Biryani", Money::from_rupees(350), quantity)
    }

    fn store() -> (CartStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (CartStore::hydrate(storage.clone()), storage)
    }

    #[test]
    fn test_identical_lines_merge() {
        let (cart, _) = store();
        assert_eq!(cart.add_item(biryani(1), &meghana()), AddOutcome::Added { line: 0 });
        assert_eq!(cart.add_item(biryani(2), &meghana()), AddOutcome::Merged { line: 0 });

        let snapshot = cart.snapshot();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].quantity, 3);
        assert_eq!(cart.total(), Money::from_rupees(1050));
        assert_eq!(cart.count(), 3);
    }

    #[test]
    fn test_different_customizations_are_separate_lines() {
        let (cart, _) = store();
        cart.add_item(biryani(1).with_customizations(vec!["raita".into(), "extra spicy".into()]), &meghana());
        cart.add_item(biryani(1).with_customizations(vec!["extra spicy".into(), "raita".into()]), &meghana());
        cart.add_item(biryani(1), &meghana());

        assert_eq!(cart.snapshot().items.len(), 3);
    }

    #[test]
    fn test_conflict_leaves_cart_untouched() {
        let (cart, storage) = store();
        cart.add_item(biryani(2), &meghana());
        let before = cart.snapshot();
        let persisted_before = storage.get(CartStore::STORAGE_KEY).unwrap();

        let outcome = cart.add_item(CartItem::new("m-cake", "Chocolate Cake", Money::from_rupees(180), 1), &truffles());
        assert_eq!(outcome, AddOutcome::Conflict { current: meghana() });
        assert!(!outcome.applied());
        assert_eq!(cart.snapshot(), before);
        assert_eq!(storage.get(CartStore::STORAGE_KEY).unwrap(), persisted_before);
    }

    #[test]
    fn test_confirm_discard_replaces_cart() {
        let (cart, _) = store();
        cart.add_item(biryani(2), &meghana());

        let cake = CartItem::new("m-cake", "Chocolate Cake", Money::from_rupees(180), 1);
        assert!(cart.confirm_discard_and_add(cake, &truffles()).applied());

        let snapshot = cart.snapshot();
        assert_eq!(snapshot.restaurant_id(), Some("r-truffles"));
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].menu_item_id, "m-cake");
    }

    #[test]
    fn test_zero_quantity_on_last_line_empties_cart() {
        let (cart, _) = store();
        cart.add_item(biryani(1), &meghana());

        assert!(cart.update_quantity(0, 0));
        let snapshot = cart.snapshot();
        assert!(snapshot.is_empty());
        assert!(snapshot.restaurant.is_none());
    }

    #[test]
    fn test_update_quantity_sets_in_place() {
        let (cart, _) = store();
        cart.add_item(biryani(1), &meghana());
        cart.add_item(CartItem::new("m-lassi", "Mango Lassi", Money::from_rupees(80), 1), &meghana());

        assert!(cart.update_quantity(1, 4));
        assert_eq!(cart.snapshot().items[1].quantity, 4);
        assert!(!cart.update_quantity(7, 2));
        assert!(cart.update_quantity(0, -3));
        assert_eq!(cart.snapshot().items.len(), 1);
        assert_eq!(cart.snapshot().restaurant_id(), Some("r-meghana"));
    }

    #[test]
    fn test_zero_quantity_add_is_rejected() {
        let (cart, _) = store();
        assert_eq!(cart.add_item(biryani(0), &meghana()), AddOutcome::InvalidQuantity);
        assert!(cart.snapshot().restaurant.is_none());
    }

    #[test]
    fn test_persist_and_rehydrate_round_trip() {
        let (cart, storage) = store();
        cart.add_item(biryani(2).with_customizations(vec!["raita".into()]), &meghana().with_delivery_fee(Money::from_rupees(25)));
        cart.add_item(CartItem::new("m-lassi", "Mango Lassi", Money::from_rupees(80), 1), &meghana());
        let before = cart.snapshot();

        let reloaded = CartStore::hydrate(storage);
        assert_eq!(reloaded.snapshot(), before);
    }

    #[test]
    fn test_corrupt_storage_hydrates_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(CartStore::STORAGE_KEY, "{\"items\": 12").unwrap();
        let cart = CartStore::hydrate(storage);
        assert_eq!(cart.snapshot(), Cart::default());
    }

    #[test]
    fn test_clear_persists_empty_cart() {
        let (cart, storage) = store();
        cart.add_item(biryani(1), &meghana());
        cart.clear();
        assert_eq!(CartStore::hydrate(storage).snapshot(), Cart::default());
    }

    #[tokio::test]
    async fn test_subscribers_see_mutations() {
        let (cart, _) = store();
        let mut rx = cart.subscribe();

        cart.add_item(biryani(1), &meghana());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().count(), 1);

        // Refused adds do not wake readers
        cart.add_item(CartItem::new("m-cake", "Cake", Money::from_rupees(180), 1), &truffles());
        assert!(!rx.has_changed().unwrap());
    }

    proptest! {
        #[test]
        fn prop_same_restaurant_adds_merge_and_sum(
            adds in prop::collection::vec((0usize..4, 0usize..3, 1u32..5), 1..40)
        ) {
            let (cart, _) = store();
            let tags = [vec![], vec!["raita".to_string()], vec!["no onion".to_string(), "raita".to_string()]];

            for (dish, tag, quantity) in &adds {
                let item = CartItem::new(format!("m-{}", dish), format!("Dish {}", dish), Money::from_rupees(50 * (*dish as i64 + 1)), *quantity)
                    .with_customizations(tags[*tag].clone());
                prop_assert!(cart.add_item(item, &meghana()).applied());
            }

            let snapshot = cart.snapshot();
            for (i, a) in snapshot.items.iter().enumerate() {
                for b in &snapshot.items[i + 1..] {
                    prop_assert!(!a.same_line(b));
                }
            }

            let expected: Money = adds
                .iter()
                .map(|(dish, _, quantity)| Money::from_rupees(50 * (*dish as i64 + 1)) * *quantity)
                .sum();
            prop_assert_eq!(cart.total(), expected);
            prop_assert_eq!(cart.count(), adds.iter().map(|(_, _, q)| *q).sum::<u32>());
        }
    }
}
