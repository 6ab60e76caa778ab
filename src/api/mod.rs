// API module - HTTP endpoints

pub mod auth;
pub mod middleware;
pub mod rentals;
pub mod stations;
pub mod worker;
