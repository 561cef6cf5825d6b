use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use tracing::{info, warn};

use super::EventRepository;
use crate::error::RepositoryError;
use crate::models::{City, Event};
use crate::query::{EventQuery, SearchText};
use crate::utils;

pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    pub fn open_default() -> Result<Self, RepositoryError> {
        Self::open(&utils::database_path())
    }

    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        utils::ensure_parent(path)
            .map_err(|err| RepositoryError::Store(format!("{}: {err}", path.display())))?;
        let store = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        store.init_schema()?;
        store.seed_if_empty()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Store("connection mutex poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<(), RepositoryError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS events(
                id TEXT PRIMARY KEY,
                greater_city TEXT NOT NULL,
                location_name TEXT NOT NULL,
                starts_utc TEXT NOT NULL,
                payload TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS events_city_start ON events(greater_city, starts_utc);
            CREATE TABLE IF NOT EXISTS cities(
                greater_city TEXT PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL
            );",
        )?;
        Ok(())
    }

    fn seed_if_empty(&self) -> Result<(), RepositoryError> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }

        for (name, latitude, longitude) in [
            ("Los Angeles", 34.0522, -118.2437),
            ("New York", 40.7128, -74.0060),
        ] {
            self.upsert_city(&City {
                greater_city: name.to_string(),
                latitude,
                longitude,
            })?;
        }

        let now = Utc::now();
        let samples = vec![
            sample_event(
                "Late Night Lineup",
                "The Comedy Store",
                "8433 Sunset Blvd, West Hollywood, CA",
                "Los Angeles",
                now + Duration::hours(3),
            ),
            sample_event(
                "Weekend Showcase",
                "Largo at the Coronet",
                "366 N La Cienega Blvd, Los Angeles, CA",
                "Los Angeles",
                now + Duration::days(3),
            ),
            sample_event(
                "Headliner Special",
                "The Comedy Store",
                "8433 Sunset Blvd, West Hollywood, CA",
                "Los Angeles",
                now + Duration::days(40),
            ),
            sample_event(
                "Cellar Sessions",
                "Comedy Cellar",
                "117 MacDougal St, New York, NY",
                "New York",
                now + Duration::days(1),
            ),
        ];
        for event in &samples {
            self.upsert_event(event)?;
        }
        info!(events = samples.len(), "seeded local store");
        Ok(())
    }

    pub fn upsert_event(&self, event: &Event) -> Result<(), RepositoryError> {
        let payload =
            serde_json::to_string(event).map_err(|err| RepositoryError::Parse(err.to_string()))?;
        self.conn()?.execute(
            "INSERT INTO events (id, greater_city, location_name, starts_utc, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
               greater_city = excluded.greater_city,
               location_name = excluded.location_name,
               starts_utc = excluded.starts_utc,
               payload = excluded.payload",
            params![
                event.id().as_str(),
                event.greater_city,
                event.location_name,
                sortable(event.date),
                payload
            ],
        )?;
        Ok(())
    }

    pub fn upsert_city(&self, city: &City) -> Result<(), RepositoryError> {
        self.conn()?.execute(
            "INSERT INTO cities (greater_city, latitude, longitude) VALUES (?1, ?2, ?3)
             ON CONFLICT(greater_city) DO UPDATE SET
               latitude = excluded.latitude,
               longitude = excluded.longitude",
            params![city.greater_city, city.latitude, city.longitude],
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub fn get_event(&self, id: &str) -> Result<Option<Event>, RepositoryError> {
        use rusqlite::OptionalExtension;

        let payload: Option<String> = self
            .conn()?
            .query_row(
                "SELECT payload FROM events WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        payload.map(|text| decode_event(&text)).transpose()
    }

    fn select_events(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Event>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            let payload = row?;
            match decode_event(&payload) {
                Ok(event) => out.push(event),
                Err(err) => warn!(%err, "skipping undecodable event row"),
            }
        }
        Ok(out)
    }
}

/// Fixed-width RFC 3339 so that text order matches time order.
fn sortable(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_event(payload: &str) -> Result<Event, RepositoryError> {
    serde_json::from_str(payload).map_err(|err| RepositoryError::Parse(err.to_string()))
}

fn sample_event(
    name: &str,
    venue: &str,
    address: &str,
    city: &str,
    date: DateTime<Utc>,
) -> Event {
    Event {
        event_name: name.to_string(),
        date,
        location_name: venue.to_string(),
        thumbnail: "https://images.example.com/event.jpg".to_string(),
        description: format!("{name} at {venue}."),
        url: "https://tickets.example.com".to_string(),
        location: address.to_string(),
        ticket_price: "$25".to_string(),
        greater_city: city.to_string(),
    }
}

impl EventRepository for LocalStore {
    type Session = ();

    async fn authenticate(&self) -> Option<()> {
        Some(())
    }

    async fn list_distinct_cities(&self, _: &()) -> Result<Vec<String>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT greater_city FROM events ORDER BY greater_city")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn list_cities(&self, _: &()) -> Result<Vec<City>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT greater_city, latitude, longitude FROM cities ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(City {
                greater_city: row.get(0)?,
                latitude: row.get(1)?,
                longitude: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    async fn list_events(&self, _: &(), query: &EventQuery) -> Result<Vec<Event>, RepositoryError> {
        let min_date = query.min_date.map(sortable);
        self.select_events(
            "SELECT payload FROM events
             WHERE (?1 IS NULL OR greater_city = ?1)
               AND (?2 IS NULL OR starts_utc >= ?2)
             ORDER BY starts_utc",
            &[&query.city as &dyn rusqlite::ToSql, &min_date],
        )
    }

    async fn search_events(&self, _: &(), text: &SearchText) -> Result<Vec<Event>, RepositoryError> {
        let needle = text.as_str().to_lowercase();
        let events = self.select_events("SELECT payload FROM events ORDER BY starts_utc", &[])?;
        Ok(events
            .into_iter()
            .filter(|event| {
                [&event.event_name, &event.description, &event.location_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .collect())
    }
}
