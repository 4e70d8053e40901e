pub mod audit;
pub mod auth;
pub mod availability;
pub mod barbers;
pub mod bookings;
pub mod catalog;
pub mod email;
pub mod metrics;
pub mod notifications;
pub mod reminder_scheduler;
pub mod retention;
pub mod tenants;
