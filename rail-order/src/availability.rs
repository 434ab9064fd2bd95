use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::future::try_join_all;
use serde::Serialize;

use rail_core::repository::{CatalogReader, OrderStore};
use rail_core::{CoreError, CoreResult};

/// Answers whether seat slots are free. Always asks the store; nothing is cached.
pub struct SeatAvailability {
    catalog: Arc<dyn CatalogReader>,
    orders: Arc<dyn OrderStore>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMap {
    pub route_id: i64,
    pub departure_date: NaiveDate,
    pub carriages: Vec<CarriageSeats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarriageSeats {
    pub carriage_id: i64,
    pub number: i32,
    #[serde(rename = "type")]
    pub carriage_type: String,
    pub seats: Vec<SeatState>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatState {
    pub seat_id: i64,
    pub number: i32,
    pub available: bool,
}

impl SeatAvailability {
    pub fn new(catalog: Arc<dyn CatalogReader>, orders: Arc<dyn OrderStore>) -> Self {
        Self { catalog, orders }
    }

    pub async fn is_available(&self, seat_id: i64, departure_date: NaiveDate) -> CoreResult<bool> {
        self.orders.is_available(seat_id, departure_date).await
    }

    /// Per-date snapshot of every seat on the route's train. Advisory only:
    /// the slot is claimed for real when the reservation commits.
    pub async fn seat_map(&self, route_id: i64, departure_date: NaiveDate) -> CoreResult<SeatMap> {
        let route = self
            .catalog
            .get_route(route_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("route {}", route_id)))?;

        let carriages = self.catalog.get_carriages_by_train(route.train_id).await?;
        let seats = try_join_all(
            carriages
                .iter()
                .map(|c| self.catalog.get_seats_by_carriage(c.id)),
        )
        .await?;

        let seat_ids: Vec<i64> = seats.iter().flatten().map(|s| s.id).collect();
        let taken: HashSet<i64> = self
            .orders
            .taken_seats(&seat_ids, departure_date)
            .await?
            .into_iter()
            .collect();

        let carriages = carriages
            .into_iter()
            .zip(seats)
            .map(|(carriage, seats)| CarriageSeats {
                carriage_id: carriage.id,
                number: carriage.number,
                carriage_type: carriage.carriage_type,
                seats: seats
                    .into_iter()
                    .map(|seat| SeatState {
                        seat_id: seat.id,
                        number: seat.number,
                        available: !taken.contains(&seat.id),
                    })
                    .collect(),
            })
            .collect();

        Ok(SeatMap { route_id, departure_date, carriages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rail_catalog::bootstrap_catalog;
    use rail_shared::{NewOrder, NewTicket};
    use rail_store::MemoryStore;

    fn free_seats(map: &SeatMap) -> usize {
        map.carriages.iter().flat_map(|c| &c.seats).filter(|s| s.available).count()
    }

    #[tokio::test]
    async fn test_seat_map_marks_held_seats() {
        let store = Arc::new(MemoryStore::with_seed(&bootstrap_catalog()).await.unwrap());
        let availability = SeatAvailability::new(store.clone(), store.clone());
        let date = NaiveDate::from_ymd_opt(2030, 5, 20).unwrap();

        store
            .create_reserved_order(NewOrder {
                user_id: 1,
                route_id: Some(1),
                created_at: Utc::now(),
                tickets: vec![NewTicket { seat_id: 2, passenger_id: None, departure_date: date, price_minor: 2800 }],
            })
            .await
            .unwrap();

        let map = availability.seat_map(1, date).await.unwrap();
        assert_eq!(map.carriages.len(), 3);
        assert_eq!(map.carriages[0].number, 1);
        assert_eq!(map.carriages[0].seats.len(), 54);
        assert_eq!(free_seats(&map), 108 - 1);
        assert!(!map.carriages[0].seats[1].available);

        // Another date is unaffected.
        let next_day = availability.seat_map(1, date.succ_opt().unwrap()).await.unwrap();
        assert_eq!(free_seats(&next_day), 108);

        assert!(!availability.is_available(2, date).await.unwrap());
        assert!(availability.is_available(3, date).await.unwrap());
    }

    #[tokio::test]
    async fn test_seat_map_for_unknown_route() {
        let store = Arc::new(MemoryStore::new());
        let availability = SeatAvailability::new(store.clone(), store);
        let date = NaiveDate::from_ymd_opt(2030, 5, 20).unwrap();
        assert!(matches!(availability.seat_map(7, date).await, Err(CoreError::NotFound(_))));
    }
}
