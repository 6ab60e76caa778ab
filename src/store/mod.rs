// Reservation store - the transactional boundary that owns stations,
// wallets and rentals. The atomic `reserve` operation is the sole
// authority on whether a rental gets created; everything the services
// layer checks beforehand is an optimistic pre-filter.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Rental, Station};

pub use memory::MemoryStore;
pub use postgres::PgReservationStore;

/// Transport or storage fault while talking to the store
#[derive(Debug, Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError(e.to_string())
    }
}

/// Closed failure taxonomy of the atomic reserve operation. The
/// `Display` form of each classified variant is the literal wire token;
/// anything else a caller receives is treated as unclassified.
#[derive(Debug, Error)]
pub enum ReserveError {
    #[error("STATION_NOT_FOUND")]
    StationNotFound,

    #[error("STATION_INACTIVE")]
    StationInactive,

    #[error("OUT_OF_RANGE")]
    OutOfRange,

    #[error("HAS_ACTIVE_RENTAL")]
    HasActiveRental,

    #[error("MIN_BALANCE")]
    MinBalance,

    #[error("NO_UNITS_AVAILABLE")]
    NoUnitsAvailable,

    /// Unclassified failure (database fault, connection loss, ...)
    #[error("store failure: {0}")]
    Store(String),
}

impl ReserveError {
    /// The literal token carried on the wire, or `None` for
    /// unclassified failures.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            ReserveError::StationNotFound => Some("STATION_NOT_FOUND"),
            ReserveError::StationInactive => Some("STATION_INACTIVE"),
            ReserveError::OutOfRange => Some("OUT_OF_RANGE"),
            ReserveError::HasActiveRental => Some("HAS_ACTIVE_RENTAL"),
            ReserveError::MinBalance => Some("MIN_BALANCE"),
            ReserveError::NoUnitsAvailable => Some("NO_UNITS_AVAILABLE"),
            ReserveError::Store(_) => None,
        }
    }
}

impl From<sqlx::Error> for ReserveError {
    fn from(e: sqlx::Error) -> Self {
        ReserveError::Store(e.to_string())
    }
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Station lookup by durable id, active or not; lets the reserve
    /// path distinguish a deactivated station from a missing one
    async fn find_station(&self, id: Uuid) -> Result<Option<Station>, StoreError>;

    /// Active-station lookup by durable id
    async fn find_active_station(&self, id: Uuid) -> Result<Option<Station>, StoreError>;

    /// Active-station lookup by 4-character short code, case-insensitive;
    /// ambiguous matches report as not found
    async fn find_active_station_by_code(&self, code: &str)
        -> Result<Option<Station>, StoreError>;

    /// Current wallet balance in cents, or `None` if the user has no wallet
    async fn wallet_balance(&self, user_id: Uuid) -> Result<Option<i64>, StoreError>;

    /// The user's rental with status = active, if any
    async fn active_rental(&self, user_id: Uuid) -> Result<Option<Rental>, StoreError>;

    /// Atomically create a rental and decrement station inventory.
    ///
    /// All checks and the mutation happen inside one atomic region, in
    /// this order: station exists, station active, caller within 100 m
    /// (recomputed here from the provided coordinates), no active rental
    /// for the user, balance at least the minimum, at least one unit
    /// available. Two concurrent calls for a station's last unit resolve
    /// so that exactly one succeeds.
    ///
    /// Not idempotent: every call that passes all checks creates a new
    /// rental. The active-rental check is what suppresses duplicates, so
    /// callers must never blindly retry.
    async fn reserve(
        &self,
        user_id: Uuid,
        station_id: Uuid,
        user_lat: f64,
        user_lng: f64,
    ) -> Result<Uuid, ReserveError>;
}
