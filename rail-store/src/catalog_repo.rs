use async_trait::async_trait;
use chrono::NaiveTime;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use rail_core::repository::{CatalogReader, CatalogSeeder, PassengerDirectory};
use rail_core::{CoreError, CoreResult};
use rail_shared::{
    Carriage, CatalogSeed, Masked, Passenger, Route, RouteStop, Seat, SeedReport, Station, Train,
};

use crate::database::storage;

pub struct PostgresCatalogRepository {
    pool: PgPool,
}

impl PostgresCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct TrainRow {
    id: i64,
    number: String,
    train_type: String,
}

impl From<TrainRow> for Train {
    fn from(row: TrainRow) -> Self {
        Train { id: row.id, number: row.number, train_type: row.train_type }
    }
}

#[derive(sqlx::FromRow)]
struct CarriageRow {
    id: i64,
    train_id: i64,
    number: i32,
    carriage_type: String,
}

impl From<CarriageRow> for Carriage {
    fn from(row: CarriageRow) -> Self {
        Carriage {
            id: row.id,
            train_id: row.train_id,
            number: row.number,
            carriage_type: row.carriage_type,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i64,
    carriage_id: i64,
    number: i32,
}

impl From<SeatRow> for Seat {
    fn from(row: SeatRow) -> Self {
        Seat { id: row.id, carriage_id: row.carriage_id, number: row.number }
    }
}

#[derive(sqlx::FromRow)]
struct StationRow {
    id: i64,
    name: String,
    city: String,
}

impl From<StationRow> for Station {
    fn from(row: StationRow) -> Self {
        Station { id: row.id, name: row.name, city: row.city }
    }
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: i64,
    name: String,
    train_id: i64,
    price_minor: i64,
}

impl From<RouteRow> for Route {
    fn from(row: RouteRow) -> Self {
        Route { id: row.id, name: row.name, train_id: row.train_id, price_minor: row.price_minor }
    }
}

#[derive(sqlx::FromRow)]
struct RouteStopRow {
    route_id: i64,
    station_id: i64,
    stop_order: i32,
    arrival_time: Option<NaiveTime>,
    departure_time: Option<NaiveTime>,
}

impl From<RouteStopRow> for RouteStop {
    fn from(row: RouteStopRow) -> Self {
        RouteStop {
            route_id: row.route_id,
            station_id: row.station_id,
            stop_order: row.stop_order,
            arrival_time: row.arrival_time,
            departure_time: row.departure_time,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PassengerRow {
    id: i64,
    user_id: i64,
    first_name: String,
    last_name: String,
    passport_data: Option<String>,
}

impl From<PassengerRow> for Passenger {
    fn from(row: PassengerRow) -> Self {
        Passenger {
            id: row.id,
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            passport_data: row.passport_data.map(Masked::new),
        }
    }
}

#[async_trait]
impl CatalogReader for PostgresCatalogRepository {
    async fn get_train(&self, id: i64) -> CoreResult<Option<Train>> {
        let row = sqlx::query_as::<_, TrainRow>("SELECT id, number, train_type FROM trains WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.map(Train::from))
    }

    async fn get_carriage(&self, id: i64) -> CoreResult<Option<Carriage>> {
        let row = sqlx::query_as::<_, CarriageRow>(
            "SELECT id, train_id, number, carriage_type FROM carriages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(Carriage::from))
    }

    async fn get_carriages_by_train(&self, train_id: i64) -> CoreResult<Vec<Carriage>> {
        let rows = sqlx::query_as::<_, CarriageRow>(
            "SELECT id, train_id, number, carriage_type FROM carriages WHERE train_id = $1 ORDER BY number",
        )
        .bind(train_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(Carriage::from).collect())
    }

    async fn get_seat(&self, id: i64) -> CoreResult<Option<Seat>> {
        let row = sqlx::query_as::<_, SeatRow>("SELECT id, carriage_id, number FROM seats WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.map(Seat::from))
    }

    async fn get_seats_by_carriage(&self, carriage_id: i64) -> CoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(
            "SELECT id, carriage_id, number FROM seats WHERE carriage_id = $1 ORDER BY number",
        )
        .bind(carriage_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(Seat::from).collect())
    }

    async fn get_station(&self, id: i64) -> CoreResult<Option<Station>> {
        let row = sqlx::query_as::<_, StationRow>("SELECT id, name, city FROM stations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.map(Station::from))
    }

    async fn get_route(&self, id: i64) -> CoreResult<Option<Route>> {
        let row = sqlx::query_as::<_, RouteRow>(
            "SELECT id, name, train_id, price_minor FROM routes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(Route::from))
    }

    async fn get_route_stops(&self, route_id: i64) -> CoreResult<Vec<RouteStop>> {
        let rows = sqlx::query_as::<_, RouteStopRow>(
            r#"
            SELECT route_id, station_id, stop_order, arrival_time, departure_time
            FROM route_stops
            WHERE route_id = $1
            ORDER BY stop_order
            "#,
        )
        .bind(route_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(RouteStop::from).collect())
    }

    async fn find_connecting_routes(&self, from_city: &str, to_city: &str) -> CoreResult<Vec<Route>> {
        let rows = sqlx::query_as::<_, RouteRow>(
            r#"
            SELECT DISTINCT r.id, r.name, r.train_id, r.price_minor
            FROM routes r
            JOIN route_stops rs1 ON rs1.route_id = r.id
            JOIN stations s1 ON s1.id = rs1.station_id
            JOIN route_stops rs2 ON rs2.route_id = r.id
            JOIN stations s2 ON s2.id = rs2.station_id
            WHERE lower(btrim(s1.city)) = $1
              AND lower(btrim(s2.city)) = $2
              AND rs1.stop_order < rs2.stop_order
            ORDER BY r.id
            "#,
        )
        .bind(from_city)
        .bind(to_city)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(Route::from).collect())
    }

    async fn count_seats_by_train(&self, train_id: i64) -> CoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM seats s
            JOIN carriages c ON c.id = s.carriage_id
            WHERE c.train_id = $1
            "#,
        )
        .bind(train_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok(count)
    }
}

#[async_trait]
impl PassengerDirectory for PostgresCatalogRepository {
    async fn get_passenger(&self, id: i64) -> CoreResult<Option<Passenger>> {
        let row = sqlx::query_as::<_, PassengerRow>(
            "SELECT id, user_id, first_name, last_name, passport_data FROM passengers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(Passenger::from))
    }

    async fn get_passenger_by_user(&self, user_id: i64) -> CoreResult<Option<Passenger>> {
        let row = sqlx::query_as::<_, PassengerRow>(
            r#"
            SELECT id, user_id, first_name, last_name, passport_data
            FROM passengers
            WHERE user_id = $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(Passenger::from))
    }
}

#[async_trait]
impl CatalogSeeder for PostgresCatalogRepository {
    async fn apply_seed(&self, seed: &CatalogSeed) -> CoreResult<SeedReport> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let mut report = SeedReport::default();

        for train in &seed.trains {
            let train_id = upsert_train(&mut tx, &train.number, &train.train_type, &mut report).await?;

            for carriage in &train.carriages {
                let inserted: Option<i64> = sqlx::query_scalar(
                    r#"
                    INSERT INTO carriages (train_id, number, carriage_type)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (train_id, number) DO NOTHING
                    RETURNING id
                    "#,
                )
                .bind(train_id)
                .bind(carriage.number)
                .bind(&carriage.carriage_type)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage)?;

                // Seats are only generated together with a new carriage.
                if let Some(carriage_id) = inserted {
                    report.carriages += 1;
                    let seats = sqlx::query(
                        r#"
                        INSERT INTO seats (carriage_id, number)
                        SELECT $1, n FROM generate_series(1, $2) AS n
                        ON CONFLICT DO NOTHING
                        "#,
                    )
                    .bind(carriage_id)
                    .bind(carriage.seat_count)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage)?;
                    report.seats += seats.rows_affected();
                }
            }
        }

        for station in &seed.stations {
            let inserted = sqlx::query(
                "INSERT INTO stations (name, city) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
            )
            .bind(&station.name)
            .bind(&station.city)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
            report.stations += inserted.rows_affected();
        }

        for route in &seed.routes {
            let train_id: i64 = sqlx::query_scalar("SELECT id FROM trains WHERE number = $1")
                .bind(&route.train_number)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage)?
                .ok_or_else(|| CoreError::ValidationError(format!("unknown train {}", route.train_number)))?;

            // xmax = 0 only for rows created by this statement
            let (route_id, created): (i64, bool) = sqlx::query_as(
                r#"
                INSERT INTO routes (name, train_id, price_minor)
                VALUES ($1, $2, $3)
                ON CONFLICT (name, train_id) DO UPDATE SET price_minor = EXCLUDED.price_minor
                RETURNING id, (xmax = 0)
                "#,
            )
            .bind(&route.name)
            .bind(train_id)
            .bind(route.price_minor)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage)?;
            if created {
                report.routes += 1;
            }

            for stop in &route.stops {
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO route_stops (route_id, station_id, stop_order, arrival_time, departure_time)
                    SELECT $1, s.id, $3, $4, $5 FROM stations s WHERE s.name = $2
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(route_id)
                .bind(&stop.station_name)
                .bind(stop.stop_order)
                .bind(stop.arrival_time)
                .bind(stop.departure_time)
                .execute(&mut *tx)
                .await
                .map_err(storage)?;
                report.stops += inserted.rows_affected();
            }
        }

        for passenger in &seed.passengers {
            let inserted = sqlx::query(
                r#"
                INSERT INTO passengers (user_id, first_name, last_name, passport_data)
                SELECT $1, $2, $3, $4
                WHERE NOT EXISTS (
                    SELECT 1 FROM passengers WHERE user_id = $1 AND first_name = $2 AND last_name = $3
                )
                "#,
            )
            .bind(passenger.user_id)
            .bind(&passenger.first_name)
            .bind(&passenger.last_name)
            .bind(passenger.passport_data.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
            report.passengers += inserted.rows_affected();
        }

        tx.commit().await.map_err(storage)?;
        debug!(?report, "seed applied");
        Ok(report)
    }
}

async fn upsert_train(
    tx: &mut Transaction<'_, Postgres>,
    number: &str,
    train_type: &str,
    report: &mut SeedReport,
) -> CoreResult<i64> {
    let inserted: Option<i64> = sqlx::query_scalar(
        "INSERT INTO trains (number, train_type) VALUES ($1, $2) ON CONFLICT (number) DO NOTHING RETURNING id",
    )
    .bind(number)
    .bind(train_type)
    .fetch_optional(&mut **tx)
    .await
    .map_err(storage)?;

    if let Some(id) = inserted {
        report.trains += 1;
        return Ok(id);
    }

    sqlx::query_scalar("SELECT id FROM trains WHERE number = $1")
        .bind(number)
        .fetch_one(&mut **tx)
        .await
        .map_err(storage)
}
