pub mod auth;
pub mod availability;
pub mod barber;
pub mod booking;
pub mod service;
pub mod tenant;
pub mod user;
