// Reservation protocol properties, exercised at the store boundary and
// through the full orchestration with the in-memory store.

use std::sync::Arc;

use uuid::Uuid;

use voltpass::models::RentalStatus;
use voltpass::services::geofence::{Position, ReportedPosition};
use voltpass::services::notifier::{TAG_RENTAL_ERROR, TAG_RENTAL_SUCCESS};
use voltpass::services::reservation::reserve_unit;
use voltpass::store::memory::StationSeed;
use voltpass::store::{MemoryStore, ReservationStore, ReserveError};
use voltpass::worker::{WorkerHandle, WorkerMessage};

// Harbor-side station in Helsinki
const STATION_LAT: f64 = 60.1699;
const STATION_LNG: f64 = 24.9384;

// ~50 m north of the station
const NEARBY_LAT: f64 = STATION_LAT + 0.00045;

// ~1 km north of the station
const FAR_LAT: f64 = STATION_LAT + 0.009;

fn seed(available_units: i32) -> StationSeed {
    StationSeed {
        name: "Harbor Mall".to_string(),
        lat: STATION_LAT,
        lng: STATION_LNG,
        total_units: 4,
        available_units,
        ..StationSeed::default()
    }
}

async fn funded_user(store: &MemoryStore) -> Uuid {
    let user_id = Uuid::new_v4();
    store.set_wallet(user_id, 1_000).await;
    user_id
}

#[tokio::test]
async fn last_unit_has_exactly_one_winner() {
    let store = Arc::new(MemoryStore::new());
    let station = store.add_station(seed(1)).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let user_id = funded_user(&store).await;
        let station_id = station.id;
        tasks.push(tokio::spawn(async move {
            store
                .reserve(user_id, station_id, NEARBY_LAT, STATION_LNG)
                .await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert!(
                matches!(e, ReserveError::NoUnitsAvailable),
                "unexpected failure: {e}"
            ),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.station(station.id).await.unwrap().available_units, 0);
}

#[tokio::test]
async fn second_reservation_for_same_user_is_rejected() {
    let store = MemoryStore::new();
    let first = store.add_station(seed(2)).await;
    let second = store
        .add_station(StationSeed {
            name: "North Plaza".to_string(),
            ..seed(2)
        })
        .await;
    let user_id = funded_user(&store).await;

    store
        .reserve(user_id, first.id, NEARBY_LAT, STATION_LNG)
        .await
        .unwrap();

    let err = store
        .reserve(user_id, second.id, NEARBY_LAT, STATION_LNG)
        .await
        .unwrap_err();
    assert!(matches!(err, ReserveError::HasActiveRental));

    let active: Vec<_> = store
        .rentals_for_user(user_id)
        .await
        .into_iter()
        .filter(|r| r.status == RentalStatus::Active)
        .collect();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn geofence_is_enforced_at_the_store_boundary() {
    // Calls the atomic boundary directly, bypassing the client pre-check
    let store = MemoryStore::new();
    let station = store.add_station(seed(1)).await;
    let user_id = funded_user(&store).await;

    let err = store
        .reserve(user_id, station.id, FAR_LAT, STATION_LNG)
        .await
        .unwrap_err();
    assert!(matches!(err, ReserveError::OutOfRange));
    assert_eq!(store.station(station.id).await.unwrap().available_units, 1);
}

#[tokio::test]
async fn balance_is_rechecked_inside_the_atomic_call() {
    let store = MemoryStore::new();
    let station = store.add_station(seed(1)).await;

    let broke_user = Uuid::new_v4();
    store.set_wallet(broke_user, 499).await;
    let err = store
        .reserve(broke_user, station.id, NEARBY_LAT, STATION_LNG)
        .await
        .unwrap_err();
    assert!(matches!(err, ReserveError::MinBalance));

    // No wallet at all reads as zero balance
    let walletless = Uuid::new_v4();
    let err = store
        .reserve(walletless, station.id, NEARBY_LAT, STATION_LNG)
        .await
        .unwrap_err();
    assert!(matches!(err, ReserveError::MinBalance));
}

#[tokio::test]
async fn inactive_and_unknown_stations_are_distinguished() {
    let store = MemoryStore::new();
    let station = store
        .add_station(StationSeed {
            is_active: false,
            ..seed(1)
        })
        .await;
    let user_id = funded_user(&store).await;

    let err = store
        .reserve(user_id, station.id, NEARBY_LAT, STATION_LNG)
        .await
        .unwrap_err();
    assert!(matches!(err, ReserveError::StationInactive));

    let err = store
        .reserve(user_id, Uuid::new_v4(), NEARBY_LAT, STATION_LNG)
        .await
        .unwrap_err();
    assert!(matches!(err, ReserveError::StationNotFound));
}

#[tokio::test]
async fn inactive_station_fails_the_flow_with_its_own_message() {
    // Through the orchestration, not just the store boundary: the
    // pre-filter must surface the out-of-service message, not "not found"
    let store = MemoryStore::new();
    let station = store
        .add_station(StationSeed {
            is_active: false,
            ..seed(1)
        })
        .await;
    let user_id = funded_user(&store).await;
    let (worker, mut inbox) = WorkerHandle::channel();

    let location = ReportedPosition(Position {
        lat: NEARBY_LAT,
        lng: STATION_LNG,
    });

    let failure = reserve_unit(&store, &location, &worker, user_id, station.id)
        .await
        .unwrap_err();
    assert_eq!(failure.code, "STATION_INACTIVE");
    assert_eq!(failure.message, "This station is out of service.");

    let Some(WorkerMessage::ShowNotification { notification }) = inbox.recv().await else {
        panic!("expected a notification intent");
    };
    assert_eq!(notification.tag.as_deref(), Some(TAG_RENTAL_ERROR));
}

#[tokio::test]
async fn station_lookup_by_short_code_is_case_insensitive() {
    let store = MemoryStore::new();
    let station = store
        .add_station(StationSeed {
            short_code: Some("A7K2".to_string()),
            ..seed(1)
        })
        .await;

    let found = store.find_active_station_by_code("a7k2").await.unwrap();
    assert_eq!(found.map(|s| s.id), Some(station.id));

    assert!(store
        .find_active_station_by_code("ZZZZ")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn successful_flow_produces_success_notification() {
    // End to end: balance 10.00, ~50 m away, one unit available
    let store = MemoryStore::new();
    let station = store.add_station(seed(1)).await;
    let user_id = funded_user(&store).await;
    let (worker, mut inbox) = WorkerHandle::channel();

    let location = ReportedPosition(Position {
        lat: NEARBY_LAT,
        lng: STATION_LNG,
    });

    let success = reserve_unit(&store, &location, &worker, user_id, station.id)
        .await
        .unwrap();

    assert_eq!(store.station(station.id).await.unwrap().available_units, 0);
    let rentals = store.rentals_for_user(user_id).await;
    assert_eq!(rentals.len(), 1);
    assert_eq!(rentals[0].id, success.rental_id);
    assert_eq!(rentals[0].status, RentalStatus::Active);

    let Some(WorkerMessage::ShowNotification { notification }) = inbox.recv().await else {
        panic!("expected a notification intent");
    };
    assert_eq!(notification.tag.as_deref(), Some(TAG_RENTAL_SUCCESS));
    assert!(notification.body.contains("Harbor Mall"));
    assert!(!notification.require_interaction);
}

#[tokio::test]
async fn failed_flow_produces_persistent_error_notification() {
    let store = MemoryStore::new();
    let station = store.add_station(seed(1)).await;
    let user_id = funded_user(&store).await;
    let (worker, mut inbox) = WorkerHandle::channel();

    let location = ReportedPosition(Position {
        lat: FAR_LAT,
        lng: STATION_LNG,
    });

    let failure = reserve_unit(&store, &location, &worker, user_id, station.id)
        .await
        .unwrap_err();
    assert_eq!(failure.code, "OUT_OF_RANGE");

    let Some(WorkerMessage::ShowNotification { notification }) = inbox.recv().await else {
        panic!("expected a notification intent");
    };
    assert_eq!(notification.tag.as_deref(), Some(TAG_RENTAL_ERROR));
    assert!(notification.require_interaction);
    assert_eq!(notification.body, failure.message);
}
