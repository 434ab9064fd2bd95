use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::future::try_join_all;
use futures_util::try_join;
use serde::Serialize;
use tracing::debug;

use rail_core::repository::CatalogReader;
use rail_core::search::{RouteSearch, RouteSummary};
use rail_core::{CoreError, CoreResult};
use rail_shared::{Route, RouteStop, Station, Train};

/// Finds routes between two cities and resolves their schedule for a date.
pub struct RouteSearchEngine {
    catalog: Arc<dyn CatalogReader>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDetails {
    pub id: i64,
    pub name: String,
    pub price_minor: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train: Option<Train>,
    pub stops: Vec<StopDetails>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDetails {
    pub stop_order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<Station>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<NaiveTime>,
}

impl RouteSearchEngine {
    pub fn new(catalog: Arc<dyn CatalogReader>) -> Self {
        Self { catalog }
    }

    /// Always returns a list; no match is an empty list, not an error.
    pub async fn search(&self, search: &RouteSearch) -> CoreResult<Vec<RouteSummary>> {
        let routes = self
            .catalog
            .find_connecting_routes(&search.from_city, &search.to_city)
            .await?;

        debug!(
            from = %search.from_city,
            to = %search.to_city,
            date = %search.date,
            matches = routes.len(),
            "route search"
        );

        let mut summaries =
            try_join_all(routes.iter().map(|route| self.summarize(route, search.date))).await?;

        summaries.sort_by(|a, b| {
            a.departure_time
                .cmp(&b.departure_time)
                .then(a.route_id.cmp(&b.route_id))
        });
        Ok(summaries)
    }

    async fn summarize(&self, route: &Route, date: NaiveDate) -> CoreResult<RouteSummary> {
        let (train, stops, seats) = try_join!(
            self.catalog.get_train(route.train_id),
            self.catalog.get_route_stops(route.id),
            self.catalog.count_seats_by_train(route.train_id),
        )?;

        let (departure_time, arrival_time) = schedule_on(&stops, date);

        Ok(RouteSummary {
            route_id: route.id,
            route_name: route.name.clone(),
            train_number: train.map(|t| t.number),
            departure_time,
            arrival_time,
            price_minor: route.price_minor,
            available_seats: seats,
        })
    }

    pub async fn route_details(&self, route_id: i64) -> CoreResult<RouteDetails> {
        let route = self
            .catalog
            .get_route(route_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("route {}", route_id)))?;

        let (train, stops) = try_join!(
            self.catalog.get_train(route.train_id),
            self.catalog.get_route_stops(route.id),
        )?;

        let stations =
            try_join_all(stops.iter().map(|stop| self.catalog.get_station(stop.station_id))).await?;

        let stops = stops
            .into_iter()
            .zip(stations)
            .map(|(stop, station)| StopDetails {
                stop_order: stop.stop_order,
                station,
                arrival_time: stop.arrival_time,
                departure_time: stop.departure_time,
            })
            .collect();

        Ok(RouteDetails {
            id: route.id,
            name: route.name,
            price_minor: route.price_minor,
            train,
            stops,
        })
    }
}

/// Combines the first stop's departure and the last stop's arrival with a
/// travel date. An arrival earlier in the day than the departure rolls over
/// to the next date.
pub fn schedule_on(
    stops: &[RouteStop],
    date: NaiveDate,
) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    let departure = stops
        .first()
        .and_then(|s| s.departure_time)
        .map(|t| date.and_time(t));

    let arrival = match stops {
        [_, .., last] => last.arrival_time.and_then(|t| {
            let same_day = date.and_time(t);
            match departure {
                Some(dep) if same_day < dep => date.checked_add_days(Days::new(1)).map(|d| d.and_time(t)),
                _ => Some(same_day),
            }
        }),
        _ => None,
    };

    (departure, arrival)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::bootstrap_catalog;
    use rail_core::repository::CatalogSeeder;
    use rail_core::search::RouteQuery;
    use rail_shared::{CatalogSeed, RouteSeed, StationSeed, StopSeed, TrainSeed, CarriageSeed};
    use rail_store::MemoryStore;

    fn t(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    fn stop(order: i32, arrival: Option<NaiveTime>, departure: Option<NaiveTime>) -> RouteStop {
        RouteStop { route_id: 1, station_id: order as i64, stop_order: order, arrival_time: arrival, departure_time: departure }
    }

    async fn engine_with(seed: CatalogSeed) -> RouteSearchEngine {
        let store = Arc::new(MemoryStore::new());
        store.apply_seed(&seed).await.unwrap();
        RouteSearchEngine::new(store)
    }

    fn search(from: &str, to: &str, date: &str) -> RouteSearch {
        RouteQuery {
            from_city: Some(from.to_string()),
            to_city: Some(to.to_string()),
            date: Some(date.to_string()),
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn test_schedule_on_combines_date_and_times() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let stops = vec![stop(1, None, t(8, 0)), stop(2, t(12, 30), None)];
        let (dep, arr) = schedule_on(&stops, date);
        assert_eq!(dep, Some(date.and_time(t(8, 0).unwrap())));
        assert_eq!(arr, Some(date.and_time(t(12, 30).unwrap())));
    }

    #[test]
    fn test_schedule_on_overnight_arrival_rolls_over() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let stops = vec![stop(1, None, t(22, 15)), stop(2, None, None), stop(3, t(6, 40), None)];
        let (_, arr) = schedule_on(&stops, date);
        assert_eq!(arr, Some(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap().and_time(t(6, 40).unwrap())));
    }

    #[test]
    fn test_schedule_on_single_stop_has_no_arrival() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let (dep, arr) = schedule_on(&[stop(1, t(7, 0), t(8, 0))], date);
        assert!(dep.is_some());
        assert!(arr.is_none());
        assert_eq!(schedule_on(&[], date), (None, None));
    }

    #[tokio::test]
    async fn test_minsk_to_brest_returns_scheduled_timestamps() {
        let engine = engine_with(bootstrap_catalog()).await;
        let results = engine.search(&search("Минск", "Брест", "2025-06-01")).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let express = results
            .iter()
            .find(|r| r.train_number.as_deref() == Some("703Б"))
            .expect("703Б should be found");
        assert_eq!(express.departure_time, Some(date.and_time(t(8, 0).unwrap())));
        assert_eq!(express.arrival_time, Some(date.and_time(t(12, 30).unwrap())));
        assert_eq!(express.price_minor, 2800);
        assert_eq!(express.available_seats, 54 + 36 + 18);

        // Both Minsk-Brest services, earliest first.
        assert_eq!(results.len(), 2);
        assert!(results[0].departure_time < results[1].departure_time);
    }

    #[tokio::test]
    async fn test_search_is_case_and_whitespace_insensitive() {
        let engine = engine_with(bootstrap_catalog()).await;
        let results = engine.search(&search(" минск", "ГОМЕЛЬ ", "2025-06-01")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].train_number.as_deref(), Some("105Б"));
    }

    #[tokio::test]
    async fn test_unconnected_cities_return_empty_list() {
        let engine = engine_with(bootstrap_catalog()).await;
        let results = engine.search(&search("Гродно", "Могилев", "2025-06-01")).await.unwrap();
        assert!(results.is_empty());

        let reverse = engine.search(&search("Брест", "Минск", "2025-06-01")).await.unwrap();
        assert!(reverse.is_empty());
    }

    #[tokio::test]
    async fn test_stop_order_is_respected() {
        // Route runs C (1) -> B (2) -> A (3): searching A -> B must not match.
        let seed = CatalogSeed {
            trains: vec![TrainSeed {
                number: "001".into(),
                train_type: "Региональный".into(),
                carriages: vec![CarriageSeed { number: 1, carriage_type: "Купе".into(), seat_count: 4 }],
            }],
            stations: vec![
                StationSeed { name: "A-1".into(), city: "A".into() },
                StationSeed { name: "B-1".into(), city: "B".into() },
                StationSeed { name: "C-1".into(), city: "C".into() },
            ],
            routes: vec![RouteSeed {
                name: "C - A".into(),
                train_number: "001".into(),
                price_minor: 1000,
                stops: vec![
                    StopSeed { station_name: "C-1".into(), stop_order: 1, arrival_time: None, departure_time: t(6, 0) },
                    StopSeed { station_name: "B-1".into(), stop_order: 2, arrival_time: t(7, 0), departure_time: t(7, 5) },
                    StopSeed { station_name: "A-1".into(), stop_order: 3, arrival_time: t(8, 0), departure_time: None },
                ],
            }],
            passengers: vec![],
        };
        let engine = engine_with(seed).await;

        assert!(engine.search(&search("A", "B", "2025-06-01")).await.unwrap().is_empty());

        // Intermediate stops still match in travel direction.
        let forward = engine.search(&search("B", "A", "2025-06-01")).await.unwrap();
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].available_seats, 4);
    }

    #[tokio::test]
    async fn test_route_details_lists_stations_in_order() {
        let store = Arc::new(MemoryStore::new());
        store.apply_seed(&bootstrap_catalog()).await.unwrap();
        let engine = RouteSearchEngine::new(store.clone());

        let found = engine.search(&search("Минск", "Витебск", "2025-06-01")).await.unwrap();
        let details = engine.route_details(found[0].route_id).await.unwrap();

        assert_eq!(details.train.as_ref().map(|t| t.number.as_str()), Some("107Б"));
        let cities: Vec<_> = details
            .stops
            .iter()
            .filter_map(|s| s.station.as_ref().map(|st| st.city.as_str()))
            .collect();
        assert_eq!(cities, vec!["Минск", "Витебск"]);

        assert!(matches!(engine.route_details(9999).await, Err(CoreError::NotFound(_))));
    }
}
