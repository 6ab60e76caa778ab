// Models module - Database entity representations

pub mod rental;
pub mod station;
pub mod wallet;

pub use rental::{Rental, RentalStatus};
pub use station::Station;
pub use wallet::Wallet;
