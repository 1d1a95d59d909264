//! Keyed inventory store: `item_id -> Item`, mutated only through the
//! narrow API below (spec §4.6 "store owns its state"). Mutations go
//! through one internal `parking_lot::Mutex`, which under the kernel's
//! single-threaded cooperative scheduler (spec §5) trivially satisfies
//! "readers see either pre- or post-state, never torn" — the lock exists
//! so the contract still holds for a multi-threaded realization.

use std::collections::HashMap;

use common::time::SimTime;
use eventbus::{Bus, Event};
use grid::{Coordinate, PACKOUT};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// Fixed category enumeration (spec §3: "drawn from a fixed enumeration").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Electronics,
    Apparel,
    Grocery,
    HomeGoods,
    Toys,
}

const CATEGORIES: [Category; 5] = [
    Category::Electronics,
    Category::Apparel,
    Category::Grocery,
    Category::HomeGoods,
    Category::Toys,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub location: Coordinate,
    pub quantity: f64,
    pub category: Category,
    pub created_at: SimTime,
    pub updated_at: SimTime,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("item {0} not found")]
    NotFound(String),
}

/// Letters used in the `ITEM_{letter}{index}` id scheme. 25 letters,
/// A through Y (Z is skipped so the scheme lines up 1:1 with the 25
/// aisles, though the id itself carries no positional meaning — an
/// item's location is assigned independently, at random).
const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXY";

/// Default items generated per letter; 25 letters * 20 = 500 (spec §4.6).
pub const DEFAULT_PER_LETTER_CAP: u32 = 20;

/// Generates the startup inventory: `per_letter_cap` items per letter in
/// [`LETTERS`], each placed at a uniformly random non-packout coordinate.
/// Deterministic given `seed`, per spec §4.6 ("determinism given a seed").
pub fn generate_items(seed: u64, created_at: SimTime, per_letter_cap: u32) -> HashMap<String, Item> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut items = HashMap::new();

    for letter in LETTERS.chars() {
        for index in 1..=per_letter_cap {
            let id = format!("ITEM_{letter}{index}");
            let location = random_non_packout_coordinate(&mut rng);
            let category = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
            items.insert(
                id.clone(),
                Item {
                    id,
                    location,
                    quantity: 1.0,
                    category,
                    created_at,
                    updated_at: created_at,
                },
            );
        }
    }

    items
}

fn random_non_packout_coordinate(rng: &mut ChaCha8Rng) -> Coordinate {
    loop {
        let aisle = rng.gen_range(grid::MIN_AISLE..=grid::MAX_AISLE);
        let rack = rng.gen_range(grid::MIN_RACK..=grid::MAX_RACK);
        let candidate = Coordinate::new(aisle, rack).expect("range is in-bounds by construction");
        if candidate != PACKOUT {
            return candidate;
        }
    }
}

/// A read-only view handed to callers that only need to inspect state
/// (analytics exports, debug dumps) without holding the store's lock.
pub type Snapshot = HashMap<String, Item>;

pub struct Inventory {
    items: Mutex<HashMap<String, Item>>,
}

impl Inventory {
    pub fn new(items: HashMap<String, Item>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    /// Constant-time lookup, cloned out from behind the lock.
    pub fn get(&self, id: &str) -> Option<Item> {
        self.items.lock().get(id).cloned()
    }

    /// Atomic replacement of an item's quantity. Emits `INVENTORY_UPDATED`.
    pub fn update_quantity(
        &self,
        id: &str,
        new_quantity: f64,
        bus: &Bus,
        now: SimTime,
    ) -> Result<(), InventoryError> {
        let mut guard = self.items.lock();
        let item = guard.get_mut(id).ok_or_else(|| InventoryError::NotFound(id.to_string()))?;
        item.quantity = new_quantity.max(0.0);
        item.updated_at = now;
        let quantity = item.quantity;
        drop(guard);

        bus.publish(
            Event::InventoryUpdated {
                item_id: id.to_string(),
                quantity,
            },
            now,
        );
        Ok(())
    }

    /// Validates that every item in `item_ids` exists. Unlimited-stock
    /// semantics: this never reserves/locks quantity, it only checks
    /// presence (spec §4.6).
    pub fn reserve_for_order(&self, item_ids: &[String]) -> bool {
        let guard = self.items.lock();
        item_ids.iter().all(|id| guard.contains_key(id))
    }

    /// Decrements one unit on pick. Resolves Open Question (a): decrements
    /// saturate at zero rather than going negative, chosen for
    /// determinism (see DESIGN.md). Emits `INVENTORY_UPDATED`.
    pub fn apply_collection(
        &self,
        item_id: &str,
        bus: &Bus,
        now: SimTime,
    ) -> Result<(), InventoryError> {
        let mut guard = self.items.lock();
        let item = guard
            .get_mut(item_id)
            .ok_or_else(|| InventoryError::NotFound(item_id.to_string()))?;
        item.quantity = (item.quantity - 1.0).max(0.0);
        item.updated_at = now;
        let quantity = item.quantity;
        drop(guard);

        bus.publish(
            Event::InventoryUpdated {
                item_id: item_id.to_string(),
                quantity,
            },
            now,
        );
        Ok(())
    }

    /// A read-only clone of the full store. O(n); intended for exporters
    /// and debug dumps, not the hot tick path.
    pub fn snapshot(&self) -> Snapshot {
        self.items.lock().clone()
    }

    pub fn location_of(&self, id: &str) -> Option<Coordinate> {
        self.items.lock().get(id).map(|i| i.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic_given_a_seed() {
        let a = generate_items(42, 0.0, DEFAULT_PER_LETTER_CAP);
        let b = generate_items(42, 0.0, DEFAULT_PER_LETTER_CAP);
        assert_eq!(a.len(), 500);
        for (id, item) in &a {
            assert_eq!(b[id].location, item.location);
        }
    }

    #[test]
    fn no_item_is_placed_at_packout() {
        let items = generate_items(7, 0.0, DEFAULT_PER_LETTER_CAP);
        assert!(items.values().all(|i| i.location != PACKOUT));
    }

    #[test]
    fn get_returns_none_for_missing_item() {
        let store = Inventory::new(HashMap::new());
        assert!(store.get("ITEM_A1").is_none());
    }

    #[test]
    fn update_quantity_emits_event_and_clamps_at_zero() {
        let mut items = HashMap::new();
        items.insert(
            "ITEM_A1".to_string(),
            Item {
                id: "ITEM_A1".into(),
                location: Coordinate::new(5, 10).unwrap(),
                quantity: 1.0,
                category: Category::Electronics,
                created_at: 0.0,
                updated_at: 0.0,
            },
        );
        let store = Inventory::new(items);
        let bus = Bus::new();
        store.update_quantity("ITEM_A1", -5.0, &bus, 1.0).unwrap();
        assert_eq!(store.get("ITEM_A1").unwrap().quantity, 0.0);

        let stats = {
            bus.drain(1.0);
            bus.stats()
        };
        assert_eq!(stats.get("INVENTORY_UPDATED").unwrap().count, 1);
    }

    #[test]
    fn apply_collection_decrements_by_one_and_saturates() {
        let mut items = HashMap::new();
        items.insert(
            "ITEM_A1".to_string(),
            Item {
                id: "ITEM_A1".into(),
                location: Coordinate::new(5, 10).unwrap(),
                quantity: 0.5,
                category: Category::Toys,
                created_at: 0.0,
                updated_at: 0.0,
            },
        );
        let store = Inventory::new(items);
        let bus = Bus::new();
        store.apply_collection("ITEM_A1", &bus, 1.0).unwrap();
        assert_eq!(store.get("ITEM_A1").unwrap().quantity, 0.0);
    }

    #[test]
    fn apply_collection_unknown_item_errors() {
        let store = Inventory::new(HashMap::new());
        let bus = Bus::new();
        let err = store.apply_collection("ITEM_ZZ", &bus, 0.0).unwrap_err();
        assert_eq!(err, InventoryError::NotFound("ITEM_ZZ".to_string()));
    }

    #[test]
    fn reserve_for_order_checks_existence_only() {
        let items = generate_items(1, 0.0, DEFAULT_PER_LETTER_CAP);
        let any_id = items.keys().next().unwrap().clone();
        let store = Inventory::new(items);
        assert!(store.reserve_for_order(&[any_id]));
        assert!(!store.reserve_for_order(&["ITEM_DOES_NOT_EXIST".to_string()]));
    }
}
