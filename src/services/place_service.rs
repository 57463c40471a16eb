// src/services/place_service.rs
use chrono::Utc;
use std::sync::Arc;

use crate::{
    errors::{HaulwayError as AppError, HaulwayResult, Validator},
    models::{
        booking::BookingKind,
        place::{CatalogItem, ItemCreate, ItemUpdate, Place, PlaceCreate, PlaceUpdate},
        user::{User, UserRole},
    },
    services::{
        store_service::{StoreKeys, StoreService},
        zone_service::ZoneService,
    },
    utils::id_generator::{IdGenerator, IdType},
};

pub struct PlaceService {
    store: Arc<StoreService>,
    zones: Arc<ZoneService>,
}

impl PlaceService {
    pub fn new(store: Arc<StoreService>, zones: Arc<ZoneService>) -> Self {
        Self { store, zones }
    }

    async fn save(&self, place: &Place) -> HaulwayResult<()> {
        self.store.put(&StoreKeys::place_by_id(&place.id), place).await
    }

    fn ensure_manager(caller: &User, place: &Place) -> HaulwayResult<()> {
        if caller.is_admin() || place.owner_id == caller.id {
            Ok(())
        } else {
            Err(AppError::forbidden("Only the owner can manage this place"))
        }
    }

    pub async fn create(&self, owner: &User, request: PlaceCreate) -> HaulwayResult<Place> {
        if !matches!(owner.role, UserRole::Merchant | UserRole::Admin) {
            return Err(AppError::InsufficientPermissions);
        }

        Validator::new()
            .require_text(&request.name, "name")
            .require_text(&request.category, "category")
            .require_text(&request.address, "address")
            .check(request.location.validate("location").is_ok(), "location", "invalid coordinates")
            .finish()?;

        let zone_id = self
            .zones
            .detect(&request.location, BookingKind::Delivery)
            .await?
            .map(|z| z.id);

        let now = Utc::now();
        let place = Place {
            id: IdGenerator::generate(IdType::Place),
            owner_id: owner.id.clone(),
            name: request.name.trim().to_string(),
            category: request.category.trim().to_lowercase(),
            description: request.description,
            location: request.location,
            address: request.address.trim().to_string(),
            zone_id,
            is_open: true,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.save(&place).await?;
        self.store.sadd(&StoreKeys::all_places(), &place.id).await?;
        self.store.sadd(&StoreKeys::places_by_owner(&owner.id), &place.id).await?;

        tracing::info!("Place created: {} ({}) by {}", place.id, place.name, owner.id);
        Ok(place)
    }

    pub async fn get(&self, place_id: &str) -> HaulwayResult<Place> {
        if !IdGenerator::validate_id(place_id, Some(IdType::Place)) {
            return Err(AppError::PlaceNotFound(place_id.to_string()));
        }
        self.store
            .get(&StoreKeys::place_by_id(place_id))
            .await?
            .ok_or_else(|| AppError::PlaceNotFound(place_id.to_string()))
    }

    pub async fn update(&self, caller: &User, place_id: &str, update: PlaceUpdate) -> HaulwayResult<Place> {
        let mut place = self.get(place_id).await?;
        Self::ensure_manager(caller, &place)?;

        let mut v = Validator::new();
        if let Some(name) = &update.name {
            v.require_text(name, "name");
        }
        if let Some(category) = &update.category {
            v.require_text(category, "category");
        }
        if let Some(address) = &update.address {
            v.require_text(address, "address");
        }
        if let Some(location) = &update.location {
            v.check(location.validate("location").is_ok(), "location", "invalid coordinates");
        }
        v.finish()?;

        if let Some(name) = update.name {
            place.name = name.trim().to_string();
        }
        if let Some(category) = update.category {
            place.category = category.trim().to_lowercase();
        }
        if let Some(description) = update.description {
            place.description = Some(description);
        }
        if let Some(address) = update.address {
            place.address = address.trim().to_string();
        }
        if let Some(location) = update.location {
            place.location = location;
            place.zone_id = self
                .zones
                .detect(&location, BookingKind::Delivery)
                .await?
                .map(|z| z.id);
        }
        place.updated_at = Utc::now();

        self.save(&place).await?;
        tracing::info!("Place updated: {}", place.id);
        Ok(place)
    }

    pub async fn set_open(&self, caller: &User, place_id: &str, is_open: bool) -> HaulwayResult<Place> {
        let mut place = self.get(place_id).await?;
        Self::ensure_manager(caller, &place)?;

        place.is_open = is_open;
        place.updated_at = Utc::now();
        self.save(&place).await?;

        tracing::info!("Place {} is now {}", place.id, if is_open { "open" } else { "closed" });
        Ok(place)
    }

    pub async fn add_item(&self, caller: &User, place_id: &str, request: ItemCreate) -> HaulwayResult<Place> {
        let mut place = self.get(place_id).await?;
        Self::ensure_manager(caller, &place)?;

        Validator::new()
            .require_text(&request.name, "name")
            .check(request.price.is_finite() && request.price >= 0.0, "price", "must not be negative")
            .finish()?;

        place.items.push(CatalogItem {
            id: IdGenerator::generate(IdType::CatalogItem),
            name: request.name.trim().to_string(),
            description: request.description,
            price: request.price,
            available: true,
        });
        place.updated_at = Utc::now();
        self.save(&place).await?;

        tracing::debug!("Item added to place {}", place.id);
        Ok(place)
    }

    pub async fn update_item(
        &self,
        caller: &User,
        place_id: &str,
        item_id: &str,
        update: ItemUpdate,
    ) -> HaulwayResult<Place> {
        let mut place = self.get(place_id).await?;
        Self::ensure_manager(caller, &place)?;

        let mut v = Validator::new();
        if let Some(name) = &update.name {
            v.require_text(name, "name");
        }
        if let Some(price) = update.price {
            v.check(price.is_finite() && price >= 0.0, "price", "must not be negative");
        }
        v.finish()?;

        let item = place
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| AppError::not_found(format!("Item {}", item_id)))?;

        if let Some(name) = update.name {
            item.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            item.description = Some(description);
        }
        if let Some(price) = update.price {
            item.price = price;
        }
        if let Some(available) = update.available {
            item.available = available;
        }
        place.updated_at = Utc::now();

        self.save(&place).await?;
        Ok(place)
    }

    pub async fn remove_item(&self, caller: &User, place_id: &str, item_id: &str) -> HaulwayResult<Place> {
        let mut place = self.get(place_id).await?;
        Self::ensure_manager(caller, &place)?;

        let before = place.items.len();
        place.items.retain(|item| item.id != item_id);
        if place.items.len() == before {
            return Err(AppError::not_found(format!("Item {}", item_id)));
        }
        place.updated_at = Utc::now();

        self.save(&place).await?;
        tracing::debug!("Item {} removed from place {}", item_id, place.id);
        Ok(place)
    }

    pub async fn list_for_owner(&self, owner_id: &str) -> HaulwayResult<Vec<Place>> {
        let mut places: Vec<Place> = self
            .store
            .load_all(&StoreKeys::places_by_owner(owner_id), StoreKeys::place_by_id)
            .await?;
        places.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(places)
    }

    pub async fn list_all(&self) -> HaulwayResult<Vec<Place>> {
        let mut places: Vec<Place> = self
            .store
            .load_all(&StoreKeys::all_places(), StoreKeys::place_by_id)
            .await?;
        places.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(places)
    }
}
