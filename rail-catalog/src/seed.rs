use std::collections::HashSet;

use chrono::NaiveTime;
use tracing::info;

use rail_core::repository::CatalogSeeder;
use rail_core::{CoreError, CoreResult};
use rail_shared::{
    CarriageSeed, CatalogSeed, PassengerSeed, RouteSeed, SeedReport, StationSeed, StopSeed,
    TrainSeed,
};

/// Standard carriage layout used by every bootstrap train.
fn standard_carriages() -> Vec<CarriageSeed> {
    vec![
        CarriageSeed { number: 1, carriage_type: "Плацкарт".to_string(), seat_count: 54 },
        CarriageSeed { number: 2, carriage_type: "Купе".to_string(), seat_count: 36 },
        CarriageSeed { number: 3, carriage_type: "СВ".to_string(), seat_count: 18 },
    ]
}

fn at(hour: u32, minute: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn two_stop_route(
    name: &str,
    train_number: &str,
    price_minor: i64,
    from: &str,
    departs: Option<NaiveTime>,
    to: &str,
    arrives: Option<NaiveTime>,
) -> RouteSeed {
    RouteSeed {
        name: name.to_string(),
        train_number: train_number.to_string(),
        price_minor,
        stops: vec![
            StopSeed { station_name: from.to_string(), stop_order: 1, arrival_time: None, departure_time: departs },
            StopSeed { station_name: to.to_string(), stop_order: 2, arrival_time: arrives, departure_time: None },
        ],
    }
}

/// The catalog the service starts with.
pub fn bootstrap_catalog() -> CatalogSeed {
    let trains = [
        ("703Б", "Скоростной"),
        ("701Б", "Скоростной"),
        ("105Б", "Региональный"),
        ("107Б", "Региональный"),
    ]
    .into_iter()
    .map(|(number, train_type)| TrainSeed {
        number: number.to_string(),
        train_type: train_type.to_string(),
        carriages: standard_carriages(),
    })
    .collect();

    let stations = [
        ("Минск-Пассажирский", "Минск"),
        ("Брест-Центральный", "Брест"),
        ("Гомель", "Гомель"),
        ("Витебск", "Витебск"),
        ("Гродно", "Гродно"),
        ("Могилев", "Могилев"),
    ]
    .into_iter()
    .map(|(name, city)| StationSeed { name: name.to_string(), city: city.to_string() })
    .collect();

    let minsk = "Минск-Пассажирский";
    let routes = vec![
        two_stop_route("Минск - Брест", "703Б", 2800, minsk, at(8, 0), "Брест-Центральный", at(12, 30)),
        two_stop_route("Минск - Брест", "701Б", 2800, minsk, at(14, 0), "Брест-Центральный", at(18, 45)),
        two_stop_route("Минск - Гомель", "105Б", 2300, minsk, at(9, 30), "Гомель", at(14, 15)),
        two_stop_route("Минск - Витебск", "107Б", 2500, minsk, at(10, 0), "Витебск", at(15, 30)),
    ];

    let passengers = vec![PassengerSeed {
        user_id: 1,
        first_name: "Иван".to_string(),
        last_name: "Петров".to_string(),
        passport_data: Some("MP1234567".to_string()),
    }];

    CatalogSeed { trains, stations, routes, passengers }
}

/// Checks references and route-stop invariants before anything is written.
pub fn validate_seed(seed: &CatalogSeed) -> CoreResult<()> {
    let mut trains = HashSet::new();
    for train in &seed.trains {
        if !trains.insert(train.number.as_str()) {
            return Err(invalid(format!("duplicate train {}", train.number)));
        }
        let mut numbers = HashSet::new();
        for carriage in &train.carriages {
            if !numbers.insert(carriage.number) || carriage.seat_count < 0 {
                return Err(invalid(format!(
                    "train {} has an invalid carriage {}",
                    train.number, carriage.number
                )));
            }
        }
    }

    let mut stations = HashSet::new();
    for station in &seed.stations {
        if !stations.insert(station.name.as_str()) {
            return Err(invalid(format!("duplicate station {}", station.name)));
        }
    }

    for route in &seed.routes {
        if !trains.contains(route.train_number.as_str()) {
            return Err(invalid(format!("route {} references unknown train {}", route.name, route.train_number)));
        }
        if route.price_minor < 0 {
            return Err(invalid(format!("route {} has a negative price", route.name)));
        }
        validate_stops(route, &stations)?;
    }

    Ok(())
}

fn validate_stops(route: &RouteSeed, stations: &HashSet<&str>) -> CoreResult<()> {
    let (Some(first), Some(last)) = (route.stops.first(), route.stops.last()) else {
        return Err(invalid(format!("route {} has no stops", route.name)));
    };
    if route.stops.len() < 2 {
        return Err(invalid(format!("route {} needs at least two stops", route.name)));
    }

    let mut seen = HashSet::new();
    for stop in &route.stops {
        if !stations.contains(stop.station_name.as_str()) {
            return Err(invalid(format!("route {} references unknown station {}", route.name, stop.station_name)));
        }
        if !seen.insert(stop.station_name.as_str()) {
            return Err(invalid(format!("route {} visits {} twice", route.name, stop.station_name)));
        }
    }

    if route.stops.windows(2).any(|w| w[0].stop_order >= w[1].stop_order) || first.stop_order < 1 {
        return Err(invalid(format!("route {} stop orders must be strictly increasing from 1", route.name)));
    }
    if first.departure_time.is_none() {
        return Err(invalid(format!("route {} first stop has no departure time", route.name)));
    }
    if last.arrival_time.is_none() {
        return Err(invalid(format!("route {} last stop has no arrival time", route.name)));
    }
    Ok(())
}

fn invalid(msg: String) -> CoreError {
    CoreError::ValidationError(format!("seed: {}", msg))
}

/// Validates and applies a seed. Meant to run once at startup.
pub async fn bootstrap(seeder: &dyn CatalogSeeder, seed: &CatalogSeed) -> CoreResult<SeedReport> {
    validate_seed(seed)?;
    let report = seeder.apply_seed(seed).await?;

    if report.is_empty() {
        info!("Catalog already seeded, nothing to insert");
    } else {
        info!(
            trains = report.trains,
            carriages = report.carriages,
            seats = report.seats,
            stations = report.stations,
            routes = report.routes,
            stops = report.stops,
            passengers = report.passengers,
            "Catalog seeded"
        );
    }
    Ok(report)
}
