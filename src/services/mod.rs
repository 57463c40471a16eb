// src/services/mod.rs
pub mod admin_service;
pub mod booking_service;
pub mod driver_service;
pub mod event_dispatcher;
pub mod messaging_service;
pub mod order_service;
pub mod place_service;
pub mod pricing;
pub mod realtime_service;
pub mod search_service;
pub mod store_service;
pub mod subscription_service;
pub mod user_service;
pub mod webhook_service;
pub mod zone_service;

pub use booking_service::{BookingOperations, BookingService};
pub use driver_service::{DriverOperations, DriverService};
pub use user_service::{UserOperations, UserService};
