// src/services/zone_service.rs
use chrono::Utc;
use std::sync::Arc;

use crate::{
    errors::{HaulwayError as AppError, HaulwayResult, Validator},
    models::{
        booking::BookingKind,
        zone::{ServiceZone, ZoneBoundary, ZoneCreate, ZoneUpdate},
    },
    services::store_service::{StoreKeys, StoreService},
    utils::{
        GeoPoint,
        id_generator::{IdGenerator, IdType},
    },
};

pub struct ZoneService {
    store: Arc<StoreService>,
}

fn validate_boundary(validator: &mut Validator, boundary: &ZoneBoundary) {
    match boundary {
        ZoneBoundary::Circle { center, radius_km } => {
            validator
                .check(center.validate("boundary.center").is_ok(), "boundary.center", "invalid coordinates")
                .check(*radius_km > 0.0, "boundary.radius_km", "must be positive");
        }
        ZoneBoundary::Polygon { vertices } => {
            validator
                .check(vertices.len() >= 3, "boundary.vertices", "a polygon needs at least 3 vertices")
                .check(
                    vertices.iter().all(|v| v.validate("boundary.vertices").is_ok()),
                    "boundary.vertices",
                    "invalid coordinates",
                );
        }
    }
}

impl ZoneService {
    pub fn new(store: Arc<StoreService>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: ZoneCreate) -> HaulwayResult<ServiceZone> {
        let surge_multiplier = request.surge_multiplier.unwrap_or(1.0);

        let mut validator = Validator::new();
        validator
            .require_text(&request.name, "name")
            .check(surge_multiplier >= 1.0, "surge_multiplier", "must be at least 1.0");
        validate_boundary(&mut validator, &request.boundary);
        validator.finish()?;

        let now = Utc::now();
        let zone = ServiceZone {
            id: IdGenerator::generate(IdType::Zone),
            name: request.name.trim().to_string(),
            boundary: request.boundary,
            surge_multiplier,
            supported_kinds: request.supported_kinds,
            active: true,
            created_at: now,
            updated_at: now,
        };

        self.store.put(&StoreKeys::zone_by_id(&zone.id), &zone).await?;
        self.store.sadd(&StoreKeys::all_zones(), &zone.id).await?;

        tracing::info!("Service zone created: {} ({})", zone.id, zone.name);
        Ok(zone)
    }

    pub async fn get(&self, zone_id: &str) -> HaulwayResult<ServiceZone> {
        if !IdGenerator::validate_id(zone_id, Some(IdType::Zone)) {
            return Err(AppError::ZoneNotFound(zone_id.to_string()));
        }
        self.store
            .get(&StoreKeys::zone_by_id(zone_id))
            .await?
            .ok_or_else(|| AppError::ZoneNotFound(zone_id.to_string()))
    }

    /// Every zone, oldest first.
    pub async fn list(&self) -> HaulwayResult<Vec<ServiceZone>> {
        let mut zones: Vec<ServiceZone> = self
            .store
            .load_all(&StoreKeys::all_zones(), StoreKeys::zone_by_id)
            .await?;
        zones.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(zones)
    }

    pub async fn update(&self, zone_id: &str, update: ZoneUpdate) -> HaulwayResult<ServiceZone> {
        let mut zone = self.get(zone_id).await?;

        let mut validator = Validator::new();
        if let Some(name) = &update.name {
            validator.require_text(name, "name");
        }
        if let Some(surge) = update.surge_multiplier {
            validator.check(surge >= 1.0, "surge_multiplier", "must be at least 1.0");
        }
        if let Some(boundary) = &update.boundary {
            validate_boundary(&mut validator, boundary);
        }
        validator.finish()?;

        if let Some(name) = update.name {
            zone.name = name.trim().to_string();
        }
        if let Some(boundary) = update.boundary {
            zone.boundary = boundary;
        }
        if let Some(surge) = update.surge_multiplier {
            zone.surge_multiplier = surge;
        }
        if let Some(kinds) = update.supported_kinds {
            zone.supported_kinds = kinds;
        }
        if let Some(active) = update.active {
            zone.active = active;
        }
        zone.updated_at = Utc::now();

        self.store.put(&StoreKeys::zone_by_id(&zone.id), &zone).await?;
        tracing::info!("Service zone updated: {}", zone.id);
        Ok(zone)
    }

    pub async fn delete(&self, zone_id: &str) -> HaulwayResult<()> {
        let zone = self.get(zone_id).await?;
        self.store.delete(&StoreKeys::zone_by_id(&zone.id)).await?;
        self.store.srem(&StoreKeys::all_zones(), &zone.id).await?;
        tracing::info!("Service zone deleted: {}", zone.id);
        Ok(())
    }

    /// First active zone, in creation order, that covers the point for this kind.
    pub async fn detect(&self, point: &GeoPoint, kind: BookingKind) -> HaulwayResult<Option<ServiceZone>> {
        let zone = self
            .list()
            .await?
            .into_iter()
            .find(|zone| zone.covers(point, kind));

        tracing::debug!(
            "Zone detection at {},{} for {:?}: {:?}",
            point.latitude,
            point.longitude,
            kind,
            zone.as_ref().map(|z| &z.id)
        );
        Ok(zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accra_circle(name: &str, radius_km: f64) -> ZoneCreate {
        ZoneCreate {
            name: name.to_string(),
            boundary: ZoneBoundary::Circle {
                center: GeoPoint::new(5.6037, -0.1870),
                radius_km,
            },
            surge_multiplier: None,
            supported_kinds: vec![],
        }
    }

    #[tokio::test]
    async fn test_detect_prefers_oldest_matching_zone() {
        let service = ZoneService::new(Arc::new(StoreService::memory()));
        let first = service.create(accra_circle("Accra Central", 5.0)).await.unwrap();
        let _second = service.create(accra_circle("Greater Accra", 50.0)).await.unwrap();

        let here = GeoPoint::new(5.6050, -0.1860);
        let detected = service.detect(&here, BookingKind::Ride).await.unwrap().unwrap();
        assert_eq!(detected.id, first.id);

        service
            .update(&first.id, ZoneUpdate { active: Some(false), ..Default::default() })
            .await
            .unwrap();
        let detected = service.detect(&here, BookingKind::Ride).await.unwrap().unwrap();
        assert_eq!(detected.name, "Greater Accra");
    }

    #[tokio::test]
    async fn test_detect_respects_supported_kinds_and_polygons() {
        let service = ZoneService::new(Arc::new(StoreService::memory()));
        service
            .create(ZoneCreate {
                name: "Tema Port".into(),
                boundary: ZoneBoundary::Polygon {
                    vertices: vec![
                        GeoPoint::new(5.60, -0.05),
                        GeoPoint::new(5.60, 0.05),
                        GeoPoint::new(5.70, 0.05),
                        GeoPoint::new(5.70, -0.05),
                    ],
                },
                surge_multiplier: Some(1.2),
                supported_kinds: vec![BookingKind::Delivery],
            })
            .await
            .unwrap();

        let inside = GeoPoint::new(5.65, 0.0);
        assert!(service.detect(&inside, BookingKind::Delivery).await.unwrap().is_some());
        assert!(service.detect(&inside, BookingKind::Taxi).await.unwrap().is_none());
        assert!(service
            .detect(&GeoPoint::new(6.0, 0.0), BookingKind::Delivery)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_invalid_zones_are_rejected() {
        let service = ZoneService::new(Arc::new(StoreService::memory()));
        let mut bad = accra_circle("", -1.0);
        bad.surge_multiplier = Some(0.5);

        match service.create(bad).await {
            Err(AppError::ValidationFailed(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation failure, got {:?}", other.map(|z| z.id)),
        }
        assert!(matches!(
            service.get("zon-250101-abcde").await,
            Err(AppError::ZoneNotFound(_))
        ));
    }
}
