//! Booking repository
//!
//! Database operations for session bookings submitted through the wizard.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Booking, BookingStatus, CreateBookingInput};

const BOOKING_COLUMNS: &str = "id, customer_name, email, phone, service, message, booking_date, \
     booking_time, status, created_at, updated_at";

/// Booking repository trait
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Store a new booking with status `pending`
    async fn create(&self, input: &CreateBookingInput) -> Result<Booking>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Booking>>;

    /// All bookings, latest appointment first
    async fn list(&self) -> Result<Vec<Booking>>;

    /// Returns the updated booking, or `None` when it does not exist
    async fn update_status(&self, id: i64, status: BookingStatus) -> Result<Option<Booking>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Number of bookings in each status; statuses with no rows are absent
    async fn count_by_status(&self) -> Result<HashMap<BookingStatus, i64>>;
}

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: i64,
    customer_name: String,
    email: String,
    phone: String,
    service: String,
    message: Option<String>,
    booking_date: NaiveDate,
    booking_time: NaiveTime,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = anyhow::Error;

    fn try_from(row: BookingRow) -> Result<Self> {
        Ok(Booking {
            id: row.id,
            customer_name: row.customer_name,
            email: row.email,
            phone: row.phone,
            service: row.service,
            message: row.message,
            date: row.booking_date,
            time: row.booking_time,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// SQLx-based booking repository for SQLite and MySQL
pub struct SqlxBookingRepository {
    pool: DynDatabasePool,
}

impl SqlxBookingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BookingRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_BOOKING: &str = r#"
    INSERT INTO bookings (customer_name, email, phone, service, message, booking_date,
                          booking_time, status, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

#[async_trait]
impl BookingRepository for SqlxBookingRepository {
    async fn create(&self, input: &CreateBookingInput) -> Result<Booking> {
        let now = Utc::now();
        let status = BookingStatus::Pending;

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_BOOKING)
                .bind(&input.customer_name)
                .bind(&input.email)
                .bind(&input.phone)
                .bind(&input.service)
                .bind(&input.message)
                .bind(input.date)
                .bind(input.time)
                .bind(status.as_str())
                .bind(now)
                .bind(now)
                .execute(crate::db::sqlite(&self.pool)?)
                .await
                .context("Failed to create booking")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_BOOKING)
                .bind(&input.customer_name)
                .bind(&input.email)
                .bind(&input.phone)
                .bind(&input.service)
                .bind(&input.message)
                .bind(input.date)
                .bind(input.time)
                .bind(status.as_str())
                .bind(now)
                .bind(now)
                .execute(crate::db::mysql(&self.pool)?)
                .await
                .context("Failed to create booking")?
                .last_insert_id() as i64,
        };

        Ok(Booking {
            id,
            customer_name: input.customer_name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            service: input.service.clone(),
            message: input.message.clone(),
            date: input.date,
            time: input.time,
            status,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = ?", BOOKING_COLUMNS);
        let row: Option<BookingRow> = with_pool!(self.pool, p => {
            sqlx::query_as(&sql).bind(id).fetch_optional(p).await
        })
        .context("Failed to get booking by ID")?;
        row.map(Booking::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings ORDER BY booking_date DESC, booking_time DESC, id DESC",
            BOOKING_COLUMNS
        );
        let rows: Vec<BookingRow> = with_pool!(self.pool, p => {
            sqlx::query_as(&sql).fetch_all(p).await
        })
        .context("Failed to list bookings")?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn update_status(&self, id: i64, status: BookingStatus) -> Result<Option<Booking>> {
        let affected = with_pool!(self.pool, p => {
            sqlx::query("UPDATE bookings SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to update booking status")?;

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, p => {
            sqlx::query("DELETE FROM bookings WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to delete booking")?;
        Ok(affected > 0)
    }

    async fn count_by_status(&self) -> Result<HashMap<BookingStatus, i64>> {
        let sql = "SELECT status, COUNT(*) FROM bookings GROUP BY status";
        let rows: Vec<(String, i64)> = with_pool!(self.pool, p => {
            sqlx::query_as(sql).fetch_all(p).await
        })
        .context("Failed to count bookings")?;

        rows.into_iter()
            .map(|(status, count)| Ok((status.parse()?, count)))
            .collect()
    }
}
