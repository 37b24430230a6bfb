//! Shared fixtures for the coordinator integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use dispatch_core::geo::OfflineRoutes;
use dispatch_core::workflow::{CourierDraft, OrderDraft};
use dispatch_core::{Coordinator, Observer, VirtualClock, observer};
use dispatch_db::{CourierHistories, MemoryStore, Store, StoreError};
use dispatch_types::{
    Courier, CourierId, Delivery, DeliveryId, DispatchConfig, GeoPoint, Order, OrderId, OrderType,
    VehicleKind,
};
use parking_lot::Mutex;

/// Virtual start time of every test coordinator.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
}

/// Coordinator over `store` with the sample address table.
pub fn coordinator_with(store: Arc<dyn Store>) -> Arc<Coordinator> {
    Arc::new(Coordinator::new(
        store,
        Arc::new(OfflineRoutes::with_sample_addresses()),
        VirtualClock::new(start()),
    ))
}

/// Coordinator over a fresh memory store.
pub fn coordinator() -> Arc<Coordinator> {
    coordinator_with(Arc::new(MemoryStore::new()))
}

pub fn courier_draft(name: &str) -> CourierDraft {
    CourierDraft {
        name: name.to_owned(),
        phone: "050-1231234".to_owned(),
        email: format!("{}@example.com", name.to_lowercase()),
        vehicle: VehicleKind::Motorcycle,
        max_distance_km: None,
    }
}

/// An order draft with known coordinates, so no geocoding is needed.
pub fn order_draft(customer: &str) -> OrderDraft {
    OrderDraft {
        order_type: OrderType::Food,
        customer_name: customer.to_owned(),
        customer_phone: "02-6543210".to_owned(),
        address: "King George St 10, Jerusalem".to_owned(),
        location: Some(GeoPoint::new(31.7800, 35.2170)),
        notes: None,
        volume_liters: None,
        is_fragile: false,
    }
}

/// An observer that counts its invocations.
pub fn counter() -> (Arc<AtomicUsize>, Observer) {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&count);
    let callback = observer(move || {
        inner.fetch_add(1, Ordering::SeqCst);
    });
    (count, callback)
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// A memory store that refuses courier updates for selected couriers.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failing_couriers: Mutex<BTreeSet<CourierId>>,
}

impl FlakyStore {
    pub fn fail_updates_for(&self, id: CourierId) {
        self.failing_couriers.lock().insert(id);
    }
}

impl Store for FlakyStore {
    fn create_order(&self, order: &Order) -> Result<(), StoreError> {
        self.inner.create_order(order)
    }

    fn read_order(&self, id: OrderId) -> Result<Order, StoreError> {
        self.inner.read_order(id)
    }

    fn read_orders(&self, filter: &dyn Fn(&Order) -> bool) -> Result<Vec<Order>, StoreError> {
        self.inner.read_orders(filter)
    }

    fn update_order(&self, order: &Order) -> Result<(), StoreError> {
        self.inner.update_order(order)
    }

    fn delete_order(&self, id: OrderId) -> Result<(), StoreError> {
        self.inner.delete_order(id)
    }

    fn create_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        self.inner.create_delivery(delivery)
    }

    fn read_delivery(&self, id: DeliveryId) -> Result<Delivery, StoreError> {
        self.inner.read_delivery(id)
    }

    fn read_deliveries(
        &self,
        filter: &dyn Fn(&Delivery) -> bool,
    ) -> Result<Vec<Delivery>, StoreError> {
        self.inner.read_deliveries(filter)
    }

    fn update_delivery(&self, delivery: &Delivery) -> Result<(), StoreError> {
        self.inner.update_delivery(delivery)
    }

    fn delete_delivery(&self, id: DeliveryId) -> Result<(), StoreError> {
        self.inner.delete_delivery(id)
    }

    fn create_courier(&self, courier: &Courier) -> Result<(), StoreError> {
        self.inner.create_courier(courier)
    }

    fn read_courier(&self, id: CourierId) -> Result<Courier, StoreError> {
        self.inner.read_courier(id)
    }

    fn read_couriers(
        &self,
        filter: &dyn Fn(&Courier) -> bool,
    ) -> Result<Vec<Courier>, StoreError> {
        self.inner.read_couriers(filter)
    }

    fn update_courier(&self, courier: &Courier) -> Result<(), StoreError> {
        if self.failing_couriers.lock().contains(&courier.id) {
            return Err(StoreError::Unavailable(format!(
                "courier {} is locked by another writer",
                courier.id
            )));
        }
        self.inner.update_courier(courier)
    }

    fn delete_courier(&self, id: CourierId) -> Result<(), StoreError> {
        self.inner.delete_courier(id)
    }

    fn config(&self) -> Result<DispatchConfig, StoreError> {
        self.inner.config()
    }

    fn set_config(&self, config: &DispatchConfig) -> Result<(), StoreError> {
        self.inner.set_config(config)
    }

    fn reset_config(&self) -> Result<(), StoreError> {
        self.inner.reset_config()
    }

    fn reset_database(&self) -> Result<(), StoreError> {
        self.inner.reset_database()
    }

    fn deliveries_of_order(&self, order_id: OrderId) -> Result<Vec<Delivery>, StoreError> {
        self.inner.deliveries_of_order(order_id)
    }

    fn deliveries_of_courier(&self, courier_id: CourierId) -> Result<Vec<Delivery>, StoreError> {
        self.inner.deliveries_of_courier(courier_id)
    }

    fn open_deliveries_of_courier(
        &self,
        courier_id: CourierId,
    ) -> Result<Vec<Delivery>, StoreError> {
        self.inner.open_deliveries_of_courier(courier_id)
    }

    fn active_courier_ids(&self) -> Result<Vec<CourierId>, StoreError> {
        self.inner.active_courier_ids()
    }

    fn deliveries_by_courier(&self) -> Result<CourierHistories, StoreError> {
        self.inner.deliveries_by_courier()
    }
}
