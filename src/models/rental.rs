use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rental_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    Active,
    Completed,
    Cancelled,
}

/// A billable session linking one user to one unit of a station.
/// At most one rental with status = active may exist per user; a partial
/// unique index in the schema backs the application-level check.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rental {
    pub id: Uuid,
    pub user_id: Uuid,
    pub station_id: Uuid,
    pub status: RentalStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub price_cents: Option<i64>, // computed by the return operation
}

impl Rental {
    /// Finds the user's active rental, if any
    pub async fn find_active_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let rental = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM rentals WHERE user_id = $1 AND status = 'active'
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(rental)
    }
}
