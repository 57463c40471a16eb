// src/router.rs
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{
        admin_handler, auth_handler, booking_handler, driver_handler, health_handler, order_handler, place_handler,
        realtime_handler, search_handler, subscription_handler, user_handler, webhook_handler, zone_handler,
    },
    state::SharedState,
};

pub fn create_router(state: SharedState) -> Router {
    let account_routes = Router::new()
        .route("/auth/register", post(auth_handler::register))
        .route("/auth/logout", post(auth_handler::logout))
        .route("/users/me", get(user_handler::get_me).patch(user_handler::update_me))
        .route("/users/me/device-tokens", post(user_handler::add_device_token));

    let driver_routes = Router::new()
        .route(
            "/drivers/me",
            post(driver_handler::register_profile).get(driver_handler::get_me),
        )
        .route("/drivers/me/availability", put(driver_handler::set_availability))
        .route("/drivers/me/location", put(driver_handler::update_location))
        .route("/drivers/nearby", get(driver_handler::nearby))
        .route("/drivers/me/bookings/available", get(driver_handler::available_bookings))
        .route("/drivers/me/bookings", get(driver_handler::my_bookings));

    let booking_routes = Router::new()
        .route("/bookings/quote", post(booking_handler::quote))
        .route(
            "/bookings",
            post(booking_handler::create_booking).get(booking_handler::list_bookings),
        )
        .route("/bookings/:id", get(booking_handler::get_booking))
        .route("/bookings/:id/accept", post(booking_handler::accept))
        .route("/bookings/:id/release", post(booking_handler::release))
        .route("/bookings/:id/arrive", post(booking_handler::arrive))
        .route("/bookings/:id/start", post(booking_handler::start))
        .route("/bookings/:id/complete", post(booking_handler::complete))
        .route("/bookings/:id/cancel", post(booking_handler::cancel))
        .route("/bookings/:id/rate", post(booking_handler::rate));

    let marketplace_routes = Router::new()
        .route("/zones", get(zone_handler::list_zones))
        .route("/zones/detect", get(zone_handler::detect))
        .route("/zones/:id", get(zone_handler::get_zone))
        .route(
            "/places",
            post(place_handler::create_place).get(place_handler::list_places),
        )
        .route("/places/mine", get(place_handler::my_places))
        .route(
            "/places/:id",
            get(place_handler::get_place).patch(place_handler::update_place),
        )
        .route("/places/:id/open", put(place_handler::set_open))
        .route("/places/:id/items", post(place_handler::add_item))
        .route(
            "/places/:id/items/:item_id",
            patch(place_handler::update_item).delete(place_handler::remove_item),
        )
        .route(
            "/orders",
            post(order_handler::place_order).get(order_handler::list_orders),
        )
        .route("/orders/:id", get(order_handler::get_order))
        .route("/orders/:id/accept", post(order_handler::accept))
        .route("/orders/:id/reject", post(order_handler::reject))
        .route("/orders/:id/prepare", post(order_handler::prepare))
        .route("/orders/:id/ready", post(order_handler::ready))
        .route("/orders/:id/dispatch", post(order_handler::dispatch))
        .route("/orders/:id/cancel", post(order_handler::cancel))
        .route("/search", get(search_handler::search));

    let subscription_routes = Router::new()
        .route("/subscriptions/plans", get(subscription_handler::list_plans))
        .route("/subscriptions", post(subscription_handler::subscribe))
        .route("/subscriptions/me", get(subscription_handler::current))
        .route("/subscriptions/me/cancel", post(subscription_handler::cancel))
        .route(
            "/webhooks",
            post(webhook_handler::register).get(webhook_handler::list),
        )
        .route("/webhooks/:id", delete(webhook_handler::delete));

    let admin_routes = Router::new()
        .route("/admin/dashboard", get(admin_handler::dashboard))
        .route("/admin/users", get(admin_handler::list_users))
        .route("/admin/users/:id/status", put(admin_handler::set_user_status))
        .route("/admin/users/:id/tokens", post(admin_handler::issue_token))
        .route("/admin/drivers", get(admin_handler::list_drivers))
        .route("/admin/drivers/:id/verify", post(admin_handler::verify_driver))
        .route("/admin/bookings", get(admin_handler::list_bookings))
        .route("/admin/bookings/:id/cancel", post(admin_handler::cancel_booking))
        .route("/admin/zones", post(zone_handler::create_zone))
        .route(
            "/admin/zones/:id",
            patch(zone_handler::update_zone).delete(zone_handler::delete_zone),
        )
        .route("/admin/plans", post(subscription_handler::create_plan))
        .route("/admin/plans/:id/deactivate", post(subscription_handler::deactivate_plan));

    Router::new()
        .merge(account_routes)
        .merge(driver_routes)
        .merge(booking_routes)
        .merge(marketplace_routes)
        .merge(subscription_routes)
        .merge(admin_routes)
        .route("/ws", get(realtime_handler::ws_handler))
        .route("/health", get(health_handler::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
