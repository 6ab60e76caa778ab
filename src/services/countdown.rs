use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Length of the soft hold window while the user authenticates
pub const HOLD_DURATION_SECS: i64 = 600;

const HOLD_KEY: &str = "reservation_hold_deadline";

/// Key-value storage the countdown persists its deadline in; scoped to
/// the browser tab's session by the embedder. Injected rather than
/// ambient so the state machine stays pure.
pub trait HoldStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

#[derive(Debug, Default)]
pub struct InMemoryHoldStore(HashMap<String, String>);

impl HoldStore for InMemoryHoldStore {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Running,
    Expired,
    Dismissed,
}

/// Client-local countdown on a non-binding reservation hold. Purely
/// cosmetic: expiry surfaces messaging but holds no authority over the
/// store and unwinds no server state.
pub struct ReservationCountdown<S: HoldStore> {
    store: S,
    station_id: Uuid,
    deadline: DateTime<Utc>,
    state: CountdownState,
}

impl<S: HoldStore> ReservationCountdown<S> {
    /// Entered on navigation into the login step of a rental flow. A
    /// stored, still-future deadline is reused so a page reload does not
    /// restart the clock; otherwise the deadline becomes now + 10 min
    /// and is persisted.
    pub fn enter(mut store: S, station_id: Uuid, now: DateTime<Utc>) -> Self {
        let stored = store
            .get(HOLD_KEY)
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|d| d.with_timezone(&Utc));

        let deadline = match stored {
            Some(deadline) if deadline > now => deadline,
            _ => {
                let deadline = now + Duration::seconds(HOLD_DURATION_SECS);
                store.set(HOLD_KEY, &deadline.to_rfc3339());
                deadline
            }
        };

        Self {
            store,
            station_id,
            deadline,
            state: CountdownState::Running,
        }
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn station_id(&self) -> Uuid {
        self.station_id
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Once-per-second tick: recomputes remaining whole seconds and
    /// transitions to `Expired` when none remain.
    pub fn tick(&mut self, now: DateTime<Utc>) -> i64 {
        if self.state == CountdownState::Dismissed {
            return 0;
        }

        let remaining = (self.deadline - now).num_seconds().max(0);
        if remaining <= 0 && self.state == CountdownState::Running {
            self.state = CountdownState::Expired;
        }
        remaining
    }

    /// Cleared on successful authentication or explicit cancel
    pub fn dismiss(&mut self) {
        self.store.remove(HOLD_KEY);
        self.state = CountdownState::Dismissed;
    }

    /// Hands the backing store back, e.g. to simulate a page reload
    pub fn into_store(self) -> S {
        self.store
    }
}
