//! In-memory [`Store`] implementation.
//!
//! Tables are ordered maps of stored rows behind a single
//! [`parking_lot::RwLock`]. The lock only protects the maps themselves;
//! it is not a transaction boundary.

use std::collections::BTreeMap;

use dispatch_types::{
    Courier, CourierId, Delivery, DeliveryId, DispatchConfig, Order, OrderId,
};
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::rows::{CourierRow, DeliveryRow, OrderRow};
use crate::store::{CourierHistories, Store};

#[derive(Debug, Default)]
struct Tables {
    orders: BTreeMap<OrderId, OrderRow>,
    deliveries: BTreeMap<DeliveryId, DeliveryRow>,
    couriers: BTreeMap<CourierId, CourierRow>,
    config: DispatchConfig,
}

/// A process-local store holding every table in memory.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    /// Configuration restored by `reset_config` and `reset_database`.
    initial_config: DispatchConfig,
}

impl MemoryStore {
    /// Create an empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    /// Create an empty store whose configuration resets to `config`.
    pub fn with_config(config: DispatchConfig) -> Self {
        Self {
            tables: RwLock::new(Tables {
                config: config.clone(),
                ..Tables::default()
            }),
            initial_config: config,
        }
    }

    /// Insert a raw courier row, bypassing entity conversion.
    ///
    /// Used when importing rows produced by another store. A row whose
    /// codes do not translate is accepted here and fails on read.
    pub fn insert_courier_row(&self, row: CourierRow) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.couriers.contains_key(&row.id) {
            return Err(StoreError::already_exists("courier", row.id));
        }
        tables.couriers.insert(row.id, row);
        Ok(())
    }

    /// Insert a raw delivery row, bypassing entity conversion.
    ///
    /// Same contract as [`MemoryStore::insert_courier_row`].
    pub fn insert_delivery_row(&self, row: DeliveryRow) -> Result<(), StoreError> {
        insert(&mut self.tables.write().deliveries, "delivery", row.id, row)
    }

    /// Number of rows in each table: `(orders, deliveries, couriers)`.
    pub fn counts(&self) -> (usize, usize, usize) {
        let tables = self.tables.read();
        (
            tables.orders.len(),
            tables.deliveries.len(),
            tables.couriers.len(),
        )
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert `row` under `id`, refusing duplicates.
fn insert<K: Ord + Copy + ToString, R>(
    table: &mut BTreeMap<K, R>,
    entity: &'static str,
    id: K,
    row: R,
) -> Result<(), StoreError> {
    if table.contains_key(&id) {
        return Err(StoreError::already_exists(entity, id));
    }
    table.insert(id, row);
    Ok(())
}

/// Replace the row under `id`, refusing unknown ids.
fn replace<K: Ord + Copy + ToString, R>(
    table: &mut BTreeMap<K, R>,
    entity: &'static str,
    id: K,
    row: R,
) -> Result<(), StoreError> {
    match table.get_mut(&id) {
        Some(slot) => {
            *slot = row;
            Ok(())
        }
        None => Err(StoreError::not_found(entity, id)),
    }
}

/// Remove the row under `id`, refusing unknown ids.
fn remove<K: Ord + Copy + ToString, R>(
    table: &mut BTreeMap<K, R>,
    entity: &'static str,
    id: K,
) -> Result<(), StoreError> {
    table
        .remove(&id)
        .map(|_row| ())
        .ok_or_else(|| StoreError::not_found(entity, id))
}

/// Convert only the rows matching `keep`, so an undecodable row elsewhere
/// in the table does not fail the read.
fn select_rows<'a, R: 'a, T>(
    rows: impl Iterator<Item = &'a R>,
    keep: impl Fn(&R) -> bool,
) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<&'a R, Error = StoreError>,
{
    rows.filter(|row| keep(row)).map(T::try_from).collect()
}

/// Convert every row and keep the entities matching `filter`.
fn select<'a, R: 'a, T>(
    rows: impl Iterator<Item = &'a R>,
    filter: &dyn Fn(&T) -> bool,
) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<&'a R, Error = StoreError>,
{
    let mut out = Vec::new();
    for row in rows {
        let entity = T::try_from(row)?;
        if filter(&entity) {
            out.push(entity);
        }
    }
    Ok(out)
}

impl Store for MemoryStore {
    fn create_order(&self, order: &Order) -> Result<(), StoreError> {
        insert(&mut self.tables.write().orders, "order", order.id, OrderRow::from(order))
    }

    fn read_order(&self, id: OrderId) -> Result<Order, StoreError> {
        let tables = self.tables.read();
        let row = tables
            .orders
            .get(&id)
            .ok_or_else(|| StoreError::not_found("order", id))?;
        Order::try_from(row)
    }

    fn read_orders(&self, filter: &dyn Fn(&Order) -> bool) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.read();
        select(tables.orders.values(), filter)
    }

    fn update_order(&self, order: &Order) -> Result<(), StoreError> {
        replace(&mut self.tables.write().orders, "order", order.id, OrderRow::from(order))
    }

    fn delete_order(&self, id: OrderId) -> Result<(), StoreError> {
        remove(&mut self.tables.write().orders, "order", id)
    }

    fn create_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        insert(
            &mut self.tables.write().deliveries,
            "delivery",
            delivery.id,
            DeliveryRow::from(delivery),
        )
    }

    fn read_delivery(&self, id: DeliveryId) -> Result<Delivery, StoreError> {
        let tables = self.tables.read();
        let row = tables
            .deliveries
            .get(&id)
            .ok_or_else(|| StoreError::not_found("delivery", id))?;
        Delivery::try_from(row)
    }

    fn read_deliveries(
        &self,
        filter: &dyn Fn(&Delivery) -> bool,
    ) -> Result<Vec<Delivery>, StoreError> {
        let tables = self.tables.read();
        select(tables.deliveries.values(), filter)
    }

    fn update_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        replace(
            &mut self.tables.write().deliveries,
            "delivery",
            delivery.id,
            DeliveryRow::from(delivery),
        )
    }

    fn delete_delivery(&self, id: DeliveryId) -> Result<(), StoreError> {
        remove(&mut self.tables.write().deliveries, "delivery", id)
    }

    fn create_courier(&self, courier: &Courier) -> Result<(), StoreError> {
        insert(
            &mut self.tables.write().couriers,
            "courier",
            courier.id,
            CourierRow::from(courier),
        )
    }

    fn read_courier(&self, id: CourierId) -> Result<Courier, StoreError> {
        let tables = self.tables.read();
        let row = tables
            .couriers
            .get(&id)
            .ok_or_else(|| StoreError::not_found("courier", id))?;
        Courier::try_from(row)
    }

    fn read_couriers(
        &self,
        filter: &dyn Fn(&Courier) -> bool,
    ) -> Result<Vec<Courier>, StoreError> {
        let tables = self.tables.read();
        select(tables.couriers.values(), filter)
    }

    fn update_courier(&self, courier: &Courier) -> Result<(), StoreError> {
        replace(
            &mut self.tables.write().couriers,
            "courier",
            courier.id,
            CourierRow::from(courier),
        )
    }

    fn delete_courier(&self, id: CourierId) -> Result<(), StoreError> {
        remove(&mut self.tables.write().couriers, "courier", id)
    }

    fn config(&self) -> Result<DispatchConfig, StoreError> {
        Ok(self.tables.read().config.clone())
    }

    fn set_config(&self, config: &DispatchConfig) -> Result<(), StoreError> {
        self.tables.write().config = config.clone();
        Ok(())
    }

    fn reset_config(&self) -> Result<(), StoreError> {
        self.tables.write().config = self.initial_config.clone();
        Ok(())
    }

    fn deliveries_of_order(&self, order_id: OrderId) -> Result<Vec<Delivery>, StoreError> {
        let tables = self.tables.read();
        select_rows(tables.deliveries.values(), |row| row.order_id == order_id)
    }

    fn deliveries_of_courier(&self, courier_id: CourierId) -> Result<Vec<Delivery>, StoreError> {
        let tables = self.tables.read();
        select_rows(tables.deliveries.values(), |row| row.courier_id == courier_id)
    }

    fn open_deliveries_of_courier(
        &self,
        courier_id: CourierId,
    ) -> Result<Vec<Delivery>, StoreError> {
        let tables = self.tables.read();
        select_rows(tables.deliveries.values(), |row| {
            row.courier_id == courier_id && row.end_time.is_none()
        })
    }

    fn active_courier_ids(&self) -> Result<Vec<CourierId>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .couriers
            .values()
            .filter(|row| row.active)
            .map(|row| row.id)
            .collect())
    }

    fn deliveries_by_courier(&self) -> Result<CourierHistories, StoreError> {
        let tables = self.tables.read();
        let mut histories = CourierHistories::new();
        for row in tables.deliveries.values() {
            let decoded = Delivery::try_from(row);
            let slot = histories
                .entry(row.courier_id)
                .or_insert_with(|| Ok(Vec::new()));
            match decoded {
                Ok(delivery) => {
                    if let Ok(list) = slot {
                        list.push(delivery);
                    }
                }
                Err(err) => *slot = Err(err),
            }
        }
        Ok(histories)
    }

    fn reset_database(&self) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        tables.orders.clear();
        tables.deliveries.clear();
        tables.couriers.clear();
        tables.config = self.initial_config.clone();
        tracing::debug!("Memory store reset");
        Ok(())
    }
}
