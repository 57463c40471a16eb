// src/handlers/realtime_handler.rs
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::{
    errors::HaulwayResult,
    models::{driver::DriverKind, user::User},
    services::{
        booking_service::BookingOperations,
        realtime_service::{Channels, RealtimeEvent},
        user_service::UserOperations,
    },
    state::SharedState,
};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientCommand {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Ping,
}

pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> HaulwayResult<Response> {
    let user = state.user_service.resolve_token(&query.token).await?;
    let channels = initial_channels(&state, &user).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user, channels)))
}

async fn initial_channels(state: &SharedState, user: &User) -> HaulwayResult<HashSet<String>> {
    let mut channels = HashSet::from([Channels::user(&user.id)]);
    if let Some(driver) = state.driver_service.find_by_user(&user.id).await? {
        channels.insert(Channels::driver(&driver.id));
        if let Some(zone_id) = &driver.zone_id {
            channels.insert(Channels::zone(zone_id));
        }
        if driver.kind == DriverKind::EmergencyResponder {
            channels.insert(Channels::emergency());
        }
    }
    Ok(channels)
}

/// Booking channels are for participants. A zone channel is for drivers
/// currently in that zone, and `zone:emergency` for responders.
async fn may_join(state: &SharedState, user: &User, channel: &str) -> bool {
    if let Some(booking_id) = channel.strip_prefix("booking:") {
        return state.booking_service.get_for(user, booking_id).await.is_ok();
    }
    if !channel.starts_with("zone:") {
        return false;
    }

    let Ok(Some(driver)) = state.driver_service.find_by_user(&user.id).await else {
        return false;
    };
    if channel == Channels::emergency() {
        return driver.kind == DriverKind::EmergencyResponder;
    }
    driver.zone_id.as_deref().map(Channels::zone).as_deref() == Some(channel)
}

/// Swap the zone channel when this socket's driver crosses into another zone.
fn follow_zone(channels: &mut HashSet<String>, event: &RealtimeEvent) {
    if event.event != "driver.zone" || !channels.contains(&event.channel) {
        return;
    }
    if let Some(previous) = event.payload["previous_zone_id"].as_str() {
        channels.remove(&Channels::zone(previous));
    }
    if let Some(zone_id) = event.payload["zone_id"].as_str() {
        channels.insert(Channels::zone(zone_id));
    }
}

async fn handle_socket(socket: WebSocket, state: SharedState, user: User, mut channels: HashSet<String>) {
    let connection_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.realtime.subscribe();

    tracing::info!("Socket {} opened for user {}", connection_id, user.id);

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!("Socket {} read error: {}", connection_id, e);
                        break;
                    }
                };

                let reply = match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(ClientCommand::Subscribe { channel }) => {
                        if channels.contains(&channel) || may_join(&state, &user, &channel).await {
                            channels.insert(channel.clone());
                            json!({ "type": "subscribed", "channel": channel })
                        } else {
                            json!({ "type": "error", "message": format!("Cannot subscribe to {}", channel) })
                        }
                    }
                    Ok(ClientCommand::Unsubscribe { channel }) => {
                        channels.remove(&channel);
                        json!({ "type": "unsubscribed", "channel": channel })
                    }
                    Ok(ClientCommand::Ping) => json!({ "type": "pong" }),
                    Err(_) => json!({ "type": "error", "message": "Unknown command" }),
                };

                if sender.send(Message::Text(reply.to_string())).await.is_err() {
                    break;
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) if channels.contains(&event.channel) => {
                        follow_zone(&mut channels, &event);
                        let frame = match serde_json::to_string(&event) {
                            Ok(frame) => frame,
                            Err(e) => {
                                tracing::error!("Failed to serialize realtime event: {}", e);
                                continue;
                            }
                        };
                        if sender.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Socket {} lagged, skipped {} event(s)", connection_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::info!("Socket {} closed for user {}", connection_id, user.id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        models::{
            booking::{BookingDetails, BookingRequest, Stop},
            driver::{DriverProfile, DriverRegistration, LocationUpdate, Vehicle, VehicleType},
            user::{UserRole, UserStatus},
            zone::{ZoneBoundary, ZoneCreate},
        },
        services::{driver_service::DriverOperations, store_service::StoreService},
        state::AppState,
        utils::{
            GeoPoint,
            id_generator::{IdGenerator, IdType},
        },
    };
    use chrono::Utc;
    use std::sync::Arc;

    const ACCRA: (f64, f64) = (5.6037, -0.1870);
    const KUMASI: (f64, f64) = (6.6885, -1.6244);

    fn state() -> SharedState {
        Arc::new(AppState::with_store(AppConfig::default(), Arc::new(StoreService::memory())).unwrap())
    }

    fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: IdGenerator::generate(IdType::User),
            role,
            status: UserStatus::Active,
            email: "ws@example.com".into(),
            phone_number: "+233207777777".into(),
            first_name: "Kojo".into(),
            last_name: "Owusu".into(),
            device_tokens: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    async fn accra_zone(state: &SharedState) -> String {
        state
            .zone_service
            .create(ZoneCreate {
                name: "Accra".into(),
                boundary: ZoneBoundary::Circle {
                    center: GeoPoint::new(ACCRA.0, ACCRA.1),
                    radius_km: 25.0,
                },
                surge_multiplier: None,
                supported_kinds: vec![],
            })
            .await
            .unwrap()
            .id
    }

    async fn driver_at(state: &SharedState, kind: DriverKind, at: (f64, f64)) -> (User, DriverProfile) {
        let account = user(UserRole::Driver);
        let profile = state
            .driver_service
            .register_profile(
                &account,
                DriverRegistration {
                    kind,
                    vehicle: Vehicle {
                        license_plate: "GR-2200-23".into(),
                        vehicle_type: VehicleType::Car,
                        make: "Nissan".into(),
                        model: "Almera".into(),
                        color: "White".into(),
                        capacity_kg: None,
                    },
                },
            )
            .await
            .unwrap();
        state.driver_service.verify(&profile.id).await.unwrap();
        let profile = move_driver(state, &account, at).await;
        (account, profile)
    }

    async fn move_driver(state: &SharedState, account: &User, at: (f64, f64)) -> DriverProfile {
        state
            .driver_service
            .update_location(
                &account.id,
                LocationUpdate {
                    latitude: at.0,
                    longitude: at.1,
                    heading: None,
                    speed_kmh: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initial_channels_by_role() {
        let state = state();
        let zone_id = accra_zone(&state).await;

        let customer = user(UserRole::Customer);
        assert_eq!(
            initial_channels(&state, &customer).await.unwrap(),
            HashSet::from([Channels::user(&customer.id)])
        );

        let (account, responder) = driver_at(&state, DriverKind::EmergencyResponder, ACCRA).await;
        assert_eq!(
            initial_channels(&state, &account).await.unwrap(),
            HashSet::from([
                Channels::user(&account.id),
                Channels::driver(&responder.id),
                Channels::zone(&zone_id),
                Channels::emergency(),
            ])
        );

        let (rider, _) = driver_at(&state, DriverKind::Ride, KUMASI).await;
        let channels = initial_channels(&state, &rider).await.unwrap();
        assert_eq!(channels.len(), 2);
        assert!(!channels.contains(&Channels::emergency()));
    }

    #[tokio::test]
    async fn test_only_participants_join_booking_channels() {
        let state = state();
        accra_zone(&state).await;
        let customer = user(UserRole::Customer);
        let stranger = user(UserRole::Customer);

        let booking = state
            .booking_service
            .create(
                &customer,
                BookingRequest {
                    pickup: Stop {
                        location: GeoPoint::new(ACCRA.0, ACCRA.1),
                        address: "Makola".into(),
                        contact_phone: None,
                        instructions: None,
                    },
                    dropoff: Some(Stop {
                        location: GeoPoint::new(5.65, -0.18),
                        address: "Legon".into(),
                        contact_phone: None,
                        instructions: None,
                    }),
                    details: BookingDetails::Ride { passengers: 2 },
                    notes: None,
                },
            )
            .await
            .unwrap();
        let channel = Channels::booking(&booking.id);

        assert!(may_join(&state, &customer, &channel).await);
        assert!(!may_join(&state, &stranger, &channel).await);
        assert!(!may_join(&state, &stranger, &Channels::user(&customer.id)).await);
        assert!(!may_join(&state, &stranger, "booking:bkg-000000-zzzzz").await);
    }

    #[tokio::test]
    async fn test_zone_channels_follow_the_driver() {
        let state = state();
        let zone_id = accra_zone(&state).await;
        let zone_channel = Channels::zone(&zone_id);

        let (account, driver) = driver_at(&state, DriverKind::Ride, KUMASI).await;
        let mut channels = initial_channels(&state, &account).await.unwrap();
        assert!(!may_join(&state, &account, &zone_channel).await);
        assert!(!may_join(&state, &account, &Channels::emergency()).await);

        let mut events = state.realtime.subscribe();
        let moved = move_driver(&state, &account, ACCRA).await;
        assert_eq!(moved.zone_id.as_deref(), Some(zone_id.as_str()));
        assert!(may_join(&state, &account, &zone_channel).await);

        let event = events.recv().await.unwrap();
        assert_eq!(event.event, "driver.zone");
        assert_eq!(event.channel, Channels::driver(&driver.id));
        follow_zone(&mut channels, &event);
        assert!(channels.contains(&zone_channel));

        move_driver(&state, &account, KUMASI).await;
        let event = events.recv().await.unwrap();
        follow_zone(&mut channels, &event);
        assert!(!channels.contains(&zone_channel));
        assert_eq!(channels.len(), 2);
    }

    #[tokio::test]
    async fn test_responders_may_join_the_emergency_channel() {
        let state = state();
        let (responder, _) = driver_at(&state, DriverKind::EmergencyResponder, KUMASI).await;
        assert!(may_join(&state, &responder, &Channels::emergency()).await);

        let customer = user(UserRole::Customer);
        assert!(!may_join(&state, &customer, &Channels::emergency()).await);
    }

    #[test]
    fn test_zone_events_for_other_drivers_are_ignored() {
        let mut channels = HashSet::from([Channels::driver("drv-1")]);
        let event = RealtimeEvent {
            channel: Channels::driver("drv-2"),
            event: "driver.zone".into(),
            payload: serde_json::json!({ "zone_id": "zon-250101-abcde", "previous_zone_id": null }),
            at: Utc::now(),
        };
        follow_zone(&mut channels, &event);
        assert_eq!(channels.len(), 1);
    }
}
