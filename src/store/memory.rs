use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Rental, RentalStatus, Station};
use crate::services::balance_gate::MIN_BALANCE_CENTS;
use crate::services::geofence::{distance_meters, Position, GEOFENCE_RADIUS_METERS};

use super::{ReservationStore, ReserveError, StoreError};

/// In-memory reservation store: the whole dataset lives behind a single
/// mutex, so the reserve operation is trivially atomic (one writer at a
/// time). Used by tests and local demos; the contract matches the
/// Postgres store exactly.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    stations: HashMap<Uuid, Station>,
    wallets: HashMap<Uuid, i64>,
    rentals: Vec<Rental>,
}

/// Seed data for a station; defaults describe an active one-unit station
/// at the origin.
#[derive(Debug, Clone)]
pub struct StationSeed {
    pub short_code: Option<String>,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub is_active: bool,
    pub total_units: i32,
    pub available_units: i32,
    pub rate_cents_per_hour: i64,
}

impl Default for StationSeed {
    fn default() -> Self {
        Self {
            short_code: None,
            name: "Test Station".to_string(),
            lat: 0.0,
            lng: 0.0,
            is_active: true,
            total_units: 1,
            available_units: 1,
            rate_cents_per_hour: 200,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_station(&self, seed: StationSeed) -> Station {
        let now = Utc::now();
        let station = Station {
            id: Uuid::new_v4(),
            short_code: seed.short_code.map(|c| c.to_ascii_uppercase()),
            name: seed.name,
            lat: seed.lat,
            lng: seed.lng,
            is_active: seed.is_active,
            total_units: seed.total_units,
            available_units: seed.available_units,
            rate_cents_per_hour: seed.rate_cents_per_hour,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .await
            .stations
            .insert(station.id, station.clone());
        station
    }

    pub async fn set_wallet(&self, user_id: Uuid, balance_cents: i64) {
        self.inner.lock().await.wallets.insert(user_id, balance_cents);
    }

    pub async fn station(&self, id: Uuid) -> Option<Station> {
        self.inner.lock().await.stations.get(&id).cloned()
    }

    pub async fn rentals_for_user(&self, user_id: Uuid) -> Vec<Rental> {
        self.inner
            .lock()
            .await
            .rentals
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn find_station(&self, id: Uuid) -> Result<Option<Station>, StoreError> {
        Ok(self.inner.lock().await.stations.get(&id).cloned())
    }

    async fn find_active_station(&self, id: Uuid) -> Result<Option<Station>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.stations.get(&id).filter(|s| s.is_active).cloned())
    }

    async fn find_active_station_by_code(
        &self,
        code: &str,
    ) -> Result<Option<Station>, StoreError> {
        let inner = self.inner.lock().await;
        let matches: Vec<&Station> = inner
            .stations
            .values()
            .filter(|s| {
                s.is_active
                    && s.short_code
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(code))
            })
            .collect();

        if matches.len() == 1 {
            Ok(matches.into_iter().next().cloned())
        } else {
            Ok(None)
        }
    }

    async fn wallet_balance(&self, user_id: Uuid) -> Result<Option<i64>, StoreError> {
        Ok(self.inner.lock().await.wallets.get(&user_id).copied())
    }

    async fn active_rental(&self, user_id: Uuid) -> Result<Option<Rental>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rentals
            .iter()
            .find(|r| r.user_id == user_id && r.status == RentalStatus::Active)
            .cloned())
    }

    async fn reserve(
        &self,
        user_id: Uuid,
        station_id: Uuid,
        user_lat: f64,
        user_lng: f64,
    ) -> Result<Uuid, ReserveError> {
        // Single writer: the mutex spans every check and the mutation
        let mut inner = self.inner.lock().await;

        let station = inner
            .stations
            .get(&station_id)
            .ok_or(ReserveError::StationNotFound)?;

        if !station.is_active {
            return Err(ReserveError::StationInactive);
        }

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

        if inner
            .rentals
            .iter()
            .any(|r| r.user_id == user_id && r.status == RentalStatus::Active)
        {
            return Err(ReserveError::HasActiveRental);
        }

        if inner.wallets.get(&user_id).copied().unwrap_or(0) < MIN_BALANCE_CENTS {
            return Err(ReserveError::MinBalance);
        }

        let station = inner
            .stations
            .get_mut(&station_id)
            .ok_or(ReserveError::StationNotFound)?;

        if station.available_units <= 0 {
            return Err(ReserveError::NoUnitsAvailable);
        }

        station.available_units -= 1;
        station.updated_at = Utc::now();

        let rental = Rental {
            id: Uuid::new_v4(),
            user_id,
            station_id,
            status: RentalStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
            price_cents: None,
        };
        let rental_id = rental.id;
        inner.rentals.push(rental);

        Ok(rental_id)
    }
}
