// Services module - Business logic

pub mod balance_gate;
pub mod countdown;
pub mod geofence;
pub mod notifier;
pub mod reservation;
