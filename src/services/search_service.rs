// src/services/search_service.rs
use std::sync::Arc;

use crate::{
    errors::{HaulwayError as AppError, HaulwayResult},
    models::place::{CatalogItem, Place, SearchHit, SearchQuery},
    services::place_service::PlaceService,
    utils::{GeoPoint, geo::round_money},
};

pub const MAX_HITS: usize = 50;

pub struct SearchService {
    places: Arc<PlaceService>,
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn item_matches(item: &CatalogItem, needle: &str) -> bool {
    contains(&item.name, needle) || item.description.as_deref().is_some_and(|d| contains(d, needle))
}

fn place_matches(place: &Place, needle: &str) -> bool {
    contains(&place.name, needle)
        || contains(&place.category, needle)
        || place.description.as_deref().is_some_and(|d| contains(d, needle))
        || place.items.iter().any(|item| item_matches(item, needle))
}

impl SearchService {
    pub fn new(places: Arc<PlaceService>) -> Self {
        Self { places }
    }

    pub async fn search(&self, query: SearchQuery) -> HaulwayResult<Vec<SearchHit>> {
        let near = match (query.latitude, query.longitude) {
            (Some(lat), Some(lng)) => {
                let point = GeoPoint::new(lat, lng);
                point.validate("near")?;
                Some(point)
            }
            (None, None) => None,
            _ => {
                return Err(AppError::validation_error(
                    "near",
                    "latitude and longitude must be given together",
                ));
            }
        };
        if let Some(radius) = query.radius_km {
            if near.is_none() {
                return Err(AppError::validation_error("radius_km", "requires latitude and longitude"));
            }
            if !(radius > 0.0) {
                return Err(AppError::validation_error("radius_km", "must be positive"));
            }
        }

        let needle = query
            .q
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        let category = query
            .category
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());

        let mut hits: Vec<SearchHit> = self
            .places
            .list_all()
            .await?
            .into_iter()
            .filter(|place| category.as_deref().is_none_or(|c| place.category == c))
            .filter(|place| needle.as_deref().is_none_or(|n| place_matches(place, n)))
            .filter_map(|place| {
                let distance_km = near.map(|p| round_money(p.distance_km(&place.location)));
                if let (Some(d), Some(radius)) = (distance_km, query.radius_km) {
                    if d > radius {
                        return None;
                    }
                }

                let matching_items = match needle.as_deref() {
                    Some(n) => place.items.iter().filter(|i| item_matches(i, n)).cloned().collect(),
                    None => Vec::new(),
                };

                Some(SearchHit {
                    place_id: place.id,
                    name: place.name,
                    category: place.category,
                    address: place.address,
                    is_open: place.is_open,
                    distance_km,
                    matching_items,
                })
            })
            .collect();

        if near.is_some() {
            hits.sort_by(|a, b| {
                a.distance_km
                    .unwrap_or(f64::MAX)
                    .total_cmp(&b.distance_km.unwrap_or(f64::MAX))
                    .then_with(|| a.name.cmp(&b.name))
            });
        } else {
            hits.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        }
        hits.truncate(MAX_HITS);

        tracing::debug!("Search returned {} hit(s)", hits.len());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        place::{ItemCreate, PlaceCreate},
        user::{User, UserRole, UserStatus},
    };
    use crate::services::{store_service::StoreService, zone_service::ZoneService};
    use crate::utils::id_generator::{IdGenerator, IdType};
    use chrono::Utc;

    fn merchant() -> User {
        let now = Utc::now();
        User {
            id: IdGenerator::generate(IdType::User),
            role: UserRole::Merchant,
            status: UserStatus::Active,
            email: "shop@example.com".into(),
            phone_number: "+233209999999".into(),
            first_name: "Kofi".into(),
            last_name: "Asante".into(),
            device_tokens: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    async fn seeded() -> SearchService {
        let store = Arc::new(StoreService::memory());
        let places = Arc::new(PlaceService::new(Arc::clone(&store), Arc::new(ZoneService::new(store))));
        let owner = merchant();

        let seeds = [
            ("Zaina Pharmacy", "pharmacy", (5.60, -0.19), "Paracetamol"),
            ("Buka", "restaurant", (5.70, -0.20), "Jollof rice"),
            ("Auntie Muni", "restaurant", (5.61, -0.19), "Waakye"),
        ];
        for (name, category, (lat, lng), item) in seeds {
            let place = places
                .create(
                    &owner,
                    PlaceCreate {
                        name: name.into(),
                        category: category.into(),
                        description: None,
                        location: GeoPoint::new(lat, lng),
                        address: "Accra".into(),
                    },
                )
                .await
                .unwrap();
            places
                .add_item(
                    &owner,
                    &place.id,
                    ItemCreate {
                        name: item.into(),
                        description: None,
                        price: 10.0,
                    },
                )
                .await
                .unwrap();
        }
        SearchService::new(places)
    }

    #[tokio::test]
    async fn test_text_search_covers_items() {
        let svc = seeded().await;
        let hits = svc
            .search(SearchQuery {
                q: Some("JOLLOF".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Buka");
        assert_eq!(hits[0].matching_items[0].name, "Jollof rice");
    }

    #[tokio::test]
    async fn test_sorting_by_name_then_distance() {
        let svc = seeded().await;
        let by_name = svc.search(SearchQuery::default()).await.unwrap();
        let names: Vec<_> = by_name.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["Auntie Muni", "Buka", "Zaina Pharmacy"]);

        let near = svc
            .search(SearchQuery {
                category: Some("Restaurant".into()),
                latitude: Some(5.60),
                longitude: Some(-0.19),
                radius_km: Some(5.0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].name, "Auntie Muni");
        assert!(near[0].distance_km.is_some());
    }

    #[tokio::test]
    async fn test_results_are_capped() {
        let store = Arc::new(StoreService::memory());
        let places = Arc::new(PlaceService::new(Arc::clone(&store), Arc::new(ZoneService::new(store))));
        let owner = merchant();
        for i in 0..(MAX_HITS + 5) {
            places
                .create(
                    &owner,
                    PlaceCreate {
                        name: format!("Chop Bar {:02}", i),
                        category: "restaurant".into(),
                        description: None,
                        location: GeoPoint::new(5.60 + i as f64 * 0.001, -0.19),
                        address: "Osu".into(),
                    },
                )
                .await
                .unwrap();
        }
        let svc = SearchService::new(places);

        let hits = svc
            .search(SearchQuery {
                q: Some("chop".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), MAX_HITS);
        assert_eq!(hits[0].name, "Chop Bar 00");
        assert_eq!(hits[MAX_HITS - 1].name, "Chop Bar 49");

        let nearest = svc
            .search(SearchQuery {
                latitude: Some(5.70),
                longitude: Some(-0.19),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(nearest.len(), MAX_HITS);
        assert_eq!(nearest[0].name, "Chop Bar 54");
    }

    #[tokio::test]
    async fn test_radius_needs_a_centre() {
        let svc = seeded().await;
        let result = svc
            .search(SearchQuery {
                radius_km: Some(3.0),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(AppError::ValidationFailed(_))));
    }
}
