use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use thiserror::Error;

use crate::utils::{normalize_city_name, validate_coordinates};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Query(#[from] sqlx::Error),
    #[error("City {0} not found")]
    CityNotFound(i64),
    #[error("City '{0}' already exists")]
    DuplicateCity(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Default city list is empty, cannot reset")]
    NoDefaultCities,
}

// temperature and updated_at are written together; the table enforces it too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DefaultCity {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCity {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureUpdate {
    pub city_id: i64,
    pub temperature: f64,
    pub updated_at: DateTime<Utc>,
}

/// Built-in reset list, loaded into `default_cities` on first start.
pub const DEFAULT_CITIES: &[(&str, f64, f64)] = &[
    ("Amsterdam", 52.3676, 4.9041),
    ("Athens", 37.9838, 23.7275),
    ("Berlin", 52.52, 13.405),
    ("Brussels", 50.8503, 4.3517),
    ("Lisbon", 38.7223, -9.1393),
    ("Madrid", 40.4168, -3.7038),
    ("Paris", 48.8566, 2.3522),
    ("Prague", 50.0755, 14.4378),
    ("Rome", 41.9028, 12.4964),
    ("Stockholm", 59.3293, 18.0686),
    ("Vienna", 48.2082, 16.3738),
    ("Warsaw", 52.2297, 21.0122),
];

/// Persistence operations the refresh cycle and the HTTP layer rely on.
#[async_trait]
pub trait CityStore: Send + Sync {
    async fn list_cities(&self) -> Result<Vec<City>, DatabaseError>;

    async fn list_default_cities(&self) -> Result<Vec<DefaultCity>, DatabaseError>;

    /// Applies every update or none of them.
    async fn apply_temperature_batch(&self, updates: &[TemperatureUpdate]) -> Result<(), DatabaseError>;

    async fn add_city(&self, city: NewCity) -> Result<City, DatabaseError>;

    async fn remove_city(&self, id: i64) -> Result<(), DatabaseError>;

    async fn reset_to_defaults(&self) -> Result<Vec<City>, DatabaseError>;
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    // Each connection to `sqlite::memory:` is its own database, so keep one.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, DatabaseError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let database = Self::new(pool);
        database.init_tables().await?;
        Ok(database)
    }

    pub async fn init_tables(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                latitude REAL NOT NULL CHECK (latitude >= -90 AND latitude <= 90),
                longitude REAL NOT NULL CHECK (longitude >= -180 AND longitude <= 180),
                temperature REAL,
                updated_at TEXT,
                CHECK ((temperature IS NULL) = (updated_at IS NULL))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS default_cities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fills `default_cities` from [`DEFAULT_CITIES`] unless it already has rows.
    pub async fn seed_default_cities(&self) -> Result<usize, DatabaseError> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM default_cities")
            .fetch_one(&self.pool)
            .await?;
        if existing > 0 {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for &(name, latitude, longitude) in DEFAULT_CITIES {
            sqlx::query("INSERT INTO default_cities (name, latitude, longitude) VALUES ($1, $2, $3)")
                .bind(name)
                .bind(latitude)
                .bind(longitude)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(DEFAULT_CITIES.len())
    }

    /// Startup sequence: schema, default list, and a populated city list.
    pub async fn bootstrap(&self) -> Result<(), DatabaseError> {
        self.init_tables().await?;

        let seeded = self.seed_default_cities().await?;
        if seeded > 0 {
            tracing::info!("Seeded {} default cities", seeded);
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cities")
            .fetch_one(&self.pool)
            .await?;
        if count == 0 {
            let cities = self.reset_to_defaults().await?;
            tracing::info!("City list was empty, restored {} default cities", cities.len());
        }

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CityStore for Database {
    async fn list_cities(&self) -> Result<Vec<City>, DatabaseError> {
        let cities = sqlx::query_as::<_, City>(
            "SELECT * FROM cities ORDER BY temperature IS NULL, temperature DESC, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(cities)
    }

    async fn list_default_cities(&self) -> Result<Vec<DefaultCity>, DatabaseError> {
        let cities = sqlx::query_as::<_, DefaultCity>("SELECT * FROM default_cities ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(cities)
    }

    async fn apply_temperature_batch(&self, updates: &[TemperatureUpdate]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        for update in updates {
            let result = sqlx::query("UPDATE cities SET temperature = $1, updated_at = $2 WHERE id = $3")
                .bind(update.temperature)
                .bind(update.updated_at)
                .bind(update.city_id)
                .execute(&mut *tx)
                .await?;

            // Dropping the transaction rolls back the rows already touched.
            if result.rows_affected() == 0 {
                return Err(DatabaseError::CityNotFound(update.city_id));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn add_city(&self, city: NewCity) -> Result<City, DatabaseError> {
        let name = normalize_city_name(&city.name).map_err(DatabaseError::InvalidData)?;
        validate_coordinates(city.latitude, city.longitude).map_err(DatabaseError::InvalidData)?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM cities WHERE name = $1")
            .bind(&name)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(DatabaseError::DuplicateCity(name));
        }

        let result = sqlx::query_as::<_, City>(
            r#"
            INSERT INTO cities (name, latitude, longitude, temperature, updated_at)
            VALUES ($1, $2, $3, NULL, NULL)
            RETURNING *
            "#,
        )
        .bind(&name)
        .bind(city.latitude)
        .bind(city.longitude)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => DatabaseError::DuplicateCity(name.clone()),
            _ => DatabaseError::Query(e),
        })?;

        Ok(result)
    }

    async fn remove_city(&self, id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM cities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::CityNotFound(id));
        }
        Ok(())
    }

    async fn reset_to_defaults(&self) -> Result<Vec<City>, DatabaseError> {
        let defaults = self.list_default_cities().await?;
        if defaults.is_empty() {
            return Err(DatabaseError::NoDefaultCities);
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cities").execute(&mut *tx).await?;
        for city in &defaults {
            sqlx::query(
                "INSERT INTO cities (name, latitude, longitude, temperature, updated_at) VALUES ($1, $2, $3, NULL, NULL)",
            )
            .bind(&city.name)
            .bind(city.latitude)
            .bind(city.longitude)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.list_cities().await
    }
}
