use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Rental, Station, Wallet};
use crate::services::balance_gate::MIN_BALANCE_CENTS;
use crate::services::geofence::{distance_meters, Position, GEOFENCE_RADIUS_METERS};

use super::{ReservationStore, ReserveError, StoreError};

/// Postgres-backed reservation store. The reserve operation runs as one
/// serializable transaction holding a row lock on the station, so no
/// interleaving request can observe a partially-applied state.
#[derive(Clone)]
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn find_station(&self, id: Uuid) -> Result<Option<Station>, StoreError> {
        Ok(Station::find_by_id(&self.pool, id).await?)
    }

    async fn find_active_station(&self, id: Uuid) -> Result<Option<Station>, StoreError> {
        Ok(Station::find_active_by_id(&self.pool, id).await?)
    }

    async fn find_active_station_by_code(
        &self,
        code: &str,
    ) -> Result<Option<Station>, StoreError> {
        Ok(Station::find_active_by_short_code(&self.pool, code).await?)
    }

    async fn wallet_balance(&self, user_id: Uuid) -> Result<Option<i64>, StoreError> {
        let wallet = Wallet::find_by_user(&self.pool, user_id).await?;
        Ok(wallet.map(|w| w.balance_cents))
    }

    async fn active_rental(&self, user_id: Uuid) -> Result<Option<Rental>, StoreError> {
        Ok(Rental::find_active_for_user(&self.pool, user_id).await?)
    }

    async fn reserve(
        &self,
        user_id: Uuid,
        station_id: Uuid,
        user_lat: f64,
        user_lng: f64,
    ) -> Result<Uuid, ReserveError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        // 1. Lock the station row for the duration of the transaction
        let station = sqlx::query_as::<_, Station>(
            r#"
            SELECT * FROM stations WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(station_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ReserveError::StationNotFound)?;

        if !station.is_active {
            return Err(ReserveError::StationInactive);
        }

        // 2. Server-side geofence; client-reported compliance is never trusted
        let distance = distance_meters(
            Position {
                lat: user_lat,
                lng: user_lng,
            },
            Position {
                lat: station.lat,
                lng: station.lng,
            },
        );
        if distance > GEOFENCE_RADIUS_METERS {
            return Err(ReserveError::OutOfRange);
        }

        // 3. At most one active rental per user
        let has_active = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM rentals WHERE user_id = $1 AND status = 'active')
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if has_active {
            return Err(ReserveError::HasActiveRental);
        }

        // 4. Balance re-check inside the transaction
        let balance = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT balance_cents FROM wallets WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if balance.unwrap_or(0) < MIN_BALANCE_CENTS {
            return Err(ReserveError::MinBalance);
        }

        // 5. Inventory
        if station.available_units <= 0 {
            return Err(ReserveError::NoUnitsAvailable);
        }

        // 6. Commit the state transition as one unit
        sqlx::query(
            r#"
            UPDATE stations
            SET available_units = available_units - 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(station_id)
        .execute(&mut *tx)
        .await?;

        let rental_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO rentals (user_id, station_id, status, started_at)
            VALUES ($1, $2, 'active', NOW())
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(station_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            rental_id = %rental_id,
            station_id = %station_id,
            distance_meters = distance,
            "Rental created"
        );

        Ok(rental_id)
    }
}
