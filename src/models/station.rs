use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A physical charging station holding a fixed number of rentable
/// power-bank units. `available_units` is mutated only by the atomic
/// reserve operation and its counterpart return operation; the
/// `0 <= available_units <= total_units` invariant is also enforced by
/// a CHECK constraint in the schema.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Station {
    pub id: Uuid,
    pub short_code: Option<String>, // 4-char alphanumeric, stored uppercase
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub is_active: bool,
    pub total_units: i32,
    pub available_units: i32,
    pub rate_cents_per_hour: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Station {
    /// Finds a station by its durable id, active or not. The reserve
    /// path uses this so a deactivated station fails with its own
    /// message instead of reading as missing.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let station = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM stations WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(station)
    }

    /// Finds an active station by its durable id
    pub async fn find_active_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let station = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM stations WHERE id = $1 AND is_active = TRUE
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(station)
    }

    /// Finds an active station by its 4-character short code,
    /// case-insensitively. An ambiguous match is reported the same as
    /// no match.
    pub async fn find_active_by_short_code(
        pool: &PgPool,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let stations = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM stations
            WHERE UPPER(short_code) = UPPER($1) AND is_active = TRUE
            "#,
        )
        .bind(code)
        .fetch_all(pool)
        .await?;

        if stations.len() == 1 {
            Ok(stations.into_iter().next())
        } else {
            Ok(None)
        }
    }
}

/// True when `code` has the shape of a station short code:
/// exactly 4 ASCII-alphanumeric characters.
pub fn is_short_code(code: &str) -> bool {
    code.len() == 4 && code.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::is_short_code;

    #[test]
    fn short_code_shape() {
        assert!(is_short_code("A7K2"));
        assert!(is_short_code("a7k2"));
        assert!(!is_short_code("A7K"));
        assert!(!is_short_code("A7K22"));
        assert!(!is_short_code("A-K2"));
        assert!(!is_short_code(""));
    }
}
