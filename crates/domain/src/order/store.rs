//! Lock-guarded in-memory order table.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use common::OrderId;

use super::Order;

struct Slot {
    position: u64,
    order: Arc<Order>,
}

/// Orders keyed by ID, plus an index recording insertion order.
#[derive(Default)]
struct OrderTable {
    orders: HashMap<OrderId, Slot>,
    positions: BTreeMap<u64, OrderId>,
    next_position: u64,
}

impl OrderTable {
    fn get(&self, id: &OrderId) -> Option<Arc<Order>> {
        self.orders.get(id).map(|slot| Arc::clone(&slot.order))
    }

    /// Inserts or replaces; a replaced order keeps its insertion position.
    fn upsert(&mut self, order: Order) -> Option<Arc<Order>> {
        let order = Arc::new(order);
        if let Some(slot) = self.orders.get_mut(&order.id) {
            return Some(std::mem::replace(&mut slot.order, order));
        }
        let position = self.next_position;
        self.next_position += 1;
        self.positions.insert(position, order.id.clone());
        self.orders.insert(order.id.clone(), Slot { position, order });
        None
    }

    fn remove(&mut self, id: &OrderId) -> Option<Arc<Order>> {
        let slot = self.orders.remove(id)?;
        self.positions.remove(&slot.position);
        Some(slot.order)
    }

    fn ordered(&self) -> Vec<Arc<Order>> {
        self.positions
            .values()
            .filter_map(|id| self.orders.get(id))
            .map(|slot| Arc::clone(&slot.order))
            .collect()
    }
}

/// The single source of truth for current order state.
///
/// Every operation takes one exclusive lock for a short critical section and
/// never performs I/O while holding it. Orders are stored behind `Arc` and
/// replaced wholesale on mutation, so readers always receive an independent
/// value copy that later mutations cannot change.
#[derive(Clone, Default)]
pub struct OrderStore {
    table: Arc<Mutex<OrderTable>>,
}

impl OrderStore {
    /// Creates an empty order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the given orders, in iteration order.
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let store = Self::new();
        {
            let mut table = store.lock();
            for order in orders {
                table.upsert(order);
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, OrderTable> {
        // Table mutations cannot leave it half-updated, so a poisoned lock is safe to reuse.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the order with the given ID.
    pub fn get(&self, id: &OrderId) -> Option<Order> {
        let order = self.lock().get(id)?;
        Some(Order::clone(&order))
    }

    /// Returns a snapshot of all orders in insertion order.
    ///
    /// The lock is held only while collecting shared handles; the values are
    /// copied after it is released.
    pub fn list(&self) -> Vec<Order> {
        let handles = self.lock().ordered();
        handles.iter().map(|order| Order::clone(order)).collect()
    }

    /// Inserts or replaces an order, returning the previous value.
    pub fn put(&self, order: Order) -> Option<Order> {
        let previous = self.lock().upsert(order)?;
        Some(Order::clone(&previous))
    }

    /// Inserts an order only if its ID is not present.
    ///
    /// On conflict the existing order is returned as the error value.
    pub fn insert_new(&self, order: Order) -> Result<(), Order> {
        let mut table = self.lock();
        if let Some(existing) = table.get(&order.id) {
            return Err(Order::clone(&existing));
        }
        table.upsert(order);
        Ok(())
    }

    /// Replaces an order only if its ID is present, returning the previous value.
    pub fn replace_existing(&self, order: Order) -> Option<Order> {
        let mut table = self.lock();
        table.get(&order.id)?;
        let previous = table.upsert(order)?;
        Some(Order::clone(&previous))
    }

    /// Removes an order, returning it if it existed.
    pub fn delete(&self, id: &OrderId) -> Option<Order> {
        let removed = self.lock().remove(id)?;
        Some(Order::clone(&removed))
    }

    /// Adds `delta` to an order's amount, clamping the result at zero.
    pub fn adjust_amount(&self, id: &OrderId, delta: i64) -> Option<Order> {
        let mut table = self.lock();
        let adjusted = table.get(id)?.with_adjusted_amount(delta);
        table.upsert(adjusted.clone());
        Some(adjusted)
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.lock().orders.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
