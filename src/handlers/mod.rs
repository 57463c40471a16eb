// src/handlers/mod.rs
pub mod admin_handler;
pub mod auth_handler;
pub mod booking_handler;
pub mod driver_handler;
pub mod health_handler;
pub mod order_handler;
pub mod place_handler;
pub mod realtime_handler;
pub mod search_handler;
pub mod subscription_handler;
pub mod user_handler;
pub mod webhook_handler;
pub mod zone_handler;
