//! The storage collaborator interface.
//!
//! [`Store`] is the request/response contract the core consumes. Every
//! call is synchronous and self-contained: a store guarantees that a
//! single call is applied entirely or not at all, but offers no
//! atomicity across calls. Cross-call consistency is the caller's job
//! (the core holds its global lock around every multi-call mutation).

use std::collections::BTreeMap;

use dispatch_types::{
    Courier, CourierId, Delivery, DeliveryId, DispatchConfig, Order, OrderId,
};

use crate::error::StoreError;

/// Delivery history per courier. A courier whose rows fail to decode maps
/// to that error; other couriers are unaffected.
pub type CourierHistories = BTreeMap<CourierId, Result<Vec<Delivery>, StoreError>>;

/// Create/read/update/delete access to orders, deliveries, couriers and
/// the business configuration.
pub trait Store: Send + Sync {
    // --- Orders ---

    /// Insert a new order. Fails with `AlreadyExists` on a duplicate id.
    fn create_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Read one order.
    fn read_order(&self, id: OrderId) -> Result<Order, StoreError>;

    /// Read every order matching `filter`, in id order.
    fn read_orders(&self, filter: &dyn Fn(&Order) -> bool) -> Result<Vec<Order>, StoreError>;

    /// Replace an existing order.
    fn update_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Remove an order.
    fn delete_order(&self, id: OrderId) -> Result<(), StoreError>;

    // --- Deliveries ---

    /// Insert a new delivery.
    fn create_delivery(&self, delivery: &Delivery) -> Result<(), StoreError>;

    /// Read one delivery.
    fn read_delivery(&self, id: DeliveryId) -> Result<Delivery, StoreError>;

    /// Read every delivery matching `filter`, in id order.
    fn read_deliveries(
        &self,
        filter: &dyn Fn(&Delivery) -> bool,
    ) -> Result<Vec<Delivery>, StoreError>;

    /// Replace an existing delivery.
    fn update_delivery(&self, delivery: &Delivery) -> Result<(), StoreError>;

    /// Remove a delivery.
    fn delete_delivery(&self, id: DeliveryId) -> Result<(), StoreError>;

    // --- Couriers ---

    /// Insert a new courier.
    fn create_courier(&self, courier: &Courier) -> Result<(), StoreError>;

    /// Read one courier.
    fn read_courier(&self, id: CourierId) -> Result<Courier, StoreError>;

    /// Read every courier matching `filter`, in id order.
    fn read_couriers(&self, filter: &dyn Fn(&Courier) -> bool)
    -> Result<Vec<Courier>, StoreError>;

    /// Replace an existing courier.
    fn update_courier(&self, courier: &Courier) -> Result<(), StoreError>;

    /// Remove a courier.
    fn delete_courier(&self, id: CourierId) -> Result<(), StoreError>;

    // --- Configuration ---

    /// Current business configuration.
    fn config(&self) -> Result<DispatchConfig, StoreError>;

    /// Replace the business configuration.
    fn set_config(&self, config: &DispatchConfig) -> Result<(), StoreError>;

    /// Restore the configuration the store was created with.
    fn reset_config(&self) -> Result<(), StoreError>;

    /// Clear all three entity sets and reset the configuration.
    fn reset_database(&self) -> Result<(), StoreError>;

    // --- Convenience queries ---

    /// Every delivery of one order, in id order.
    fn deliveries_of_order(&self, order_id: OrderId) -> Result<Vec<Delivery>, StoreError> {
        self.read_deliveries(&|d| d.order_id == order_id)
    }

    /// Every delivery of one courier, in id order.
    fn deliveries_of_courier(&self, courier_id: CourierId) -> Result<Vec<Delivery>, StoreError> {
        self.read_deliveries(&|d| d.courier_id == courier_id)
    }

    /// Open deliveries of one courier. At most one under normal operation.
    fn open_deliveries_of_courier(
        &self,
        courier_id: CourierId,
    ) -> Result<Vec<Delivery>, StoreError> {
        self.read_deliveries(&|d| d.courier_id == courier_id && d.is_open())
    }

    /// Ids of every active courier, in id order.
    fn active_courier_ids(&self) -> Result<Vec<CourierId>, StoreError> {
        Ok(self
            .read_couriers(&|c| c.active)?
            .into_iter()
            .map(|c| c.id)
            .collect())
    }

    /// Every delivery, grouped by owning courier. Couriers without
    /// deliveries are absent.
    fn deliveries_by_courier(&self) -> Result<CourierHistories, StoreError> {
        let mut histories = CourierHistories::new();
        for delivery in self.read_deliveries(&|_| true)? {
            if let Ok(list) = histories
                .entry(delivery.courier_id)
                .or_insert_with(|| Ok(Vec::new()))
            {
                list.push(delivery);
            }
        }
        Ok(histories)
    }
}
