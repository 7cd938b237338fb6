//! Listing record.
//!
//! A listing can be described by two overlapping layouts: the legacy flat
//! fields (`name`, `regularPrice`, `bedrooms`, ...) and the sectioned layout
//! (`basicInfo`, `location`, `details`, `pricing`, `media`). Both are stored
//! side by side in one row; either may be absent.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

text_enum! {
    PropertyStatus {
        Draft => "draft",
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    ListingType {
        Rent => "rent",
        Sale => "sale",
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::properties)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct Property {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub status: PropertyStatus,
    pub rejection_reason: Option<String>,
    // legacy layout
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub regular_price: Option<i64>,
    pub discount_price: Option<i64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub furnished: Option<bool>,
    pub parking: Option<bool>,
    pub listing_type: Option<ListingType>,
    pub offer: Option<bool>,
    pub image_urls: Vec<String>,
    // sectioned layout
    pub basic_title: Option<String>,
    pub basic_description: Option<String>,
    pub basic_property_type: Option<String>,
    pub basic_listing_type: Option<ListingType>,
    pub location_address: Option<String>,
    pub location_city: Option<String>,
    pub location_area: Option<String>,
    pub location_postal_code: Option<String>,
    pub location_latitude: Option<f64>,
    pub location_longitude: Option<f64>,
    pub details_bedrooms: Option<i32>,
    pub details_bathrooms: Option<i32>,
    pub details_size_sqft: Option<i32>,
    pub details_floor: Option<i32>,
    pub details_furnished: Option<bool>,
    pub details_parking: Option<bool>,
    pub pricing_rent: Option<i64>,
    pub pricing_deposit: Option<i64>,
    pub pricing_negotiable: Option<bool>,
    pub pricing_utilities_included: Option<bool>,
    pub media_images: Vec<String>,
    pub media_video_url: Option<String>,
    pub amenities: Vec<String>,
    // Counters change only through the store's increment methods.
    #[diesel(skip_update)]
    pub performance_views: i64,
    #[diesel(skip_update)]
    pub performance_inquiries: i64,
    #[diesel(skip_update)]
    pub performance_favorites: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicInfo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub property_type: Option<String>,
    pub listing_type: Option<ListingType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub address: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Details {
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub size_sqft: Option<i32>,
    pub floor: Option<i32>,
    pub furnished: Option<bool>,
    pub parking: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub rent: Option<i64>,
    pub deposit: Option<i64>,
    pub negotiable: Option<bool>,
    pub utilities_included: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub images: Option<Vec<String>>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub views: i64,
    pub inquiries: i64,
    pub favorites: i64,
}

/// Create/update payload. Every field is optional; on update only the
/// provided fields change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub regular_price: Option<i64>,
    pub discount_price: Option<i64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub furnished: Option<bool>,
    pub parking: Option<bool>,
    #[serde(rename = "type")]
    pub listing_type: Option<ListingType>,
    pub offer: Option<bool>,
    pub image_urls: Option<Vec<String>>,
    pub basic_info: Option<BasicInfo>,
    pub location: Option<Location>,
    pub details: Option<Details>,
    pub pricing: Option<Pricing>,
    pub media: Option<Media>,
    pub amenities: Option<Vec<String>>,
    pub save_as_draft: Option<bool>,
}

fn set<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Amenities are matched case-insensitively, so they are kept lower-cased.
pub fn normalize_amenity(amenity: &str) -> String {
    amenity.trim().to_lowercase()
}

impl Property {
    pub fn new(owner_id: Uuid, status: PropertyStatus, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            status,
            rejection_reason: None,
            name: None,
            description: None,
            address: None,
            regular_price: None,
            discount_price: None,
            bedrooms: None,
            bathrooms: None,
            furnished: None,
            parking: None,
            listing_type: None,
            offer: None,
            image_urls: Vec::new(),
            basic_title: None,
            basic_description: None,
            basic_property_type: None,
            basic_listing_type: None,
            location_address: None,
            location_city: None,
            location_area: None,
            location_postal_code: None,
            location_latitude: None,
            location_longitude: None,
            details_bedrooms: None,
            details_bathrooms: None,
            details_size_sqft: None,
            details_floor: None,
            details_furnished: None,
            details_parking: None,
            pricing_rent: None,
            pricing_deposit: None,
            pricing_negotiable: None,
            pricing_utilities_included: None,
            media_images: Vec::new(),
            media_video_url: None,
            amenities: Vec::new(),
            performance_views: 0,
            performance_inquiries: 0,
            performance_favorites: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copies every provided field of `input` onto the record.
    pub fn apply(&mut self, input: PropertyInput) {
        set(&mut self.name, trimmed(input.name));
        set(&mut self.description, trimmed(input.description));
        set(&mut self.address, trimmed(input.address));
        set(&mut self.regular_price, input.regular_price);
        set(&mut self.discount_price, input.discount_price);
        set(&mut self.bedrooms, input.bedrooms);
        set(&mut self.bathrooms, input.bathrooms);
        set(&mut self.furnished, input.furnished);
        set(&mut self.parking, input.parking);
        set(&mut self.listing_type, input.listing_type);
        set(&mut self.offer, input.offer);
        if let Some(urls) = input.image_urls {
            self.image_urls = urls;
        }

        if let Some(info) = input.basic_info {
            set(&mut self.basic_title, trimmed(info.title));
            set(&mut self.basic_description, trimmed(info.description));
            set(&mut self.basic_property_type, trimmed(info.property_type));
            set(&mut self.basic_listing_type, info.listing_type);
        }
        if let Some(location) = input.location {
            set(&mut self.location_address, trimmed(location.address));
            set(&mut self.location_city, trimmed(location.city));
            set(&mut self.location_area, trimmed(location.area));
            set(&mut self.location_postal_code, trimmed(location.postal_code));
            set(&mut self.location_latitude, location.latitude);
            set(&mut self.location_longitude, location.longitude);
        }
        if let Some(details) = input.details {
            set(&mut self.details_bedrooms, details.bedrooms);
            set(&mut self.details_bathrooms, details.bathrooms);
            set(&mut self.details_size_sqft, details.size_sqft);
            set(&mut self.details_floor, details.floor);
            set(&mut self.details_furnished, details.furnished);
            set(&mut self.details_parking, details.parking);
        }
        if let Some(pricing) = input.pricing {
            set(&mut self.pricing_rent, pricing.rent);
            set(&mut self.pricing_deposit, pricing.deposit);
            set(&mut self.pricing_negotiable, pricing.negotiable);
            set(&mut self.pricing_utilities_included, pricing.utilities_included);
        }
        if let Some(media) = input.media {
            if let Some(images) = media.images {
                self.media_images = images;
            }
            set(&mut self.media_video_url, trimmed(media.video_url));
        }
        if let Some(amenities) = input.amenities {
            let mut normalized: Vec<String> = amenities
                .iter()
                .map(|a| normalize_amenity(a))
                .filter(|a| !a.is_empty())
                .collect();
            normalized.sort();
            normalized.dedup();
            self.amenities = normalized;
        }
    }

    /// Checks the rules a listing must satisfy before it is stored.
    pub fn validate(&self) -> Result<(), String> {
        if self.title().is_none() {
            return Err("A listing needs a name or basicInfo.title".to_string());
        }
        let priced = [self.regular_price, self.pricing_rent]
            .iter()
            .any(|price| price.is_some_and(|p| p > 0));
        if !priced {
            return Err("A listing needs a positive regularPrice or pricing.rent".to_string());
        }
        for price in [
            self.regular_price,
            self.discount_price,
            self.pricing_rent,
            self.pricing_deposit,
        ]
        .into_iter()
        .flatten()
        {
            if price < 0 {
                return Err("Prices cannot be negative".to_string());
            }
        }
        if self.offer == Some(true) {
            match (self.discount_price, self.regular_price) {
                (Some(discount), Some(regular)) if discount < regular => {}
                _ => {
                    return Err(
                        "discountPrice must be lower than regularPrice for an offer".to_string()
                    )
                }
            }
        }
        for count in [
            self.bedrooms,
            self.bathrooms,
            self.details_bedrooms,
            self.details_bathrooms,
            self.details_size_sqft,
        ]
        .into_iter()
        .flatten()
        {
            if count < 0 {
                return Err("Room counts and sizes cannot be negative".to_string());
            }
        }
        if self.location_latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat))
            || self
                .location_longitude
                .is_some_and(|lng| !(-180.0..=180.0).contains(&lng))
        {
            return Err("Coordinates are out of range".to_string());
        }
        if self.image_urls.len() + self.media_images.len() > 12 {
            return Err("A listing can carry at most 12 images".to_string());
        }
        Ok(())
    }

    pub fn title(&self) -> Option<&str> {
        self.basic_title.as_deref().or(self.name.as_deref())
    }

    pub fn display_title(&self) -> &str {
        self.title().unwrap_or("your listing")
    }

    /// Price used for ordering: the sectioned rent, else the legacy price.
    pub fn sort_price(&self) -> Option<i64> {
        self.pricing_rent.or(self.regular_price)
    }

    pub fn is_public(&self) -> bool {
        self.status == PropertyStatus::Approved
    }

    pub fn basic_info(&self) -> Option<BasicInfo> {
        let info = BasicInfo {
            title: self.basic_title.clone(),
            description: self.basic_description.clone(),
            property_type: self.basic_property_type.clone(),
            listing_type: self.basic_listing_type,
        };
        (info != BasicInfo::default()).then_some(info)
    }

    pub fn location(&self) -> Option<Location> {
        let location = Location {
            address: self.location_address.clone(),
            city: self.location_city.clone(),
            area: self.location_area.clone(),
            postal_code: self.location_postal_code.clone(),
            latitude: self.location_latitude,
            longitude: self.location_longitude,
        };
        (location != Location::default()).then_some(location)
    }

    pub fn details(&self) -> Option<Details> {
        let details = Details {
            bedrooms: self.details_bedrooms,
            bathrooms: self.details_bathrooms,
            size_sqft: self.details_size_sqft,
            floor: self.details_floor,
            furnished: self.details_furnished,
            parking: self.details_parking,
        };
        (details != Details::default()).then_some(details)
    }

    pub fn pricing(&self) -> Option<Pricing> {
        let pricing = Pricing {
            rent: self.pricing_rent,
            deposit: self.pricing_deposit,
            negotiable: self.pricing_negotiable,
            utilities_included: self.pricing_utilities_included,
        };
        (pricing != Pricing::default()).then_some(pricing)
    }

    pub fn to_view(&self) -> PropertyView {
        PropertyView {
            id: self.id,
            owner_id: self.owner_id,
            status: self.status,
            rejection_reason: self.rejection_reason.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            address: self.address.clone(),
            regular_price: self.regular_price,
            discount_price: self.discount_price,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            furnished: self.furnished,
            parking: self.parking,
            listing_type: self.listing_type,
            offer: self.offer,
            image_urls: self.image_urls.clone(),
            basic_info: self.basic_info(),
            location: self.location(),
            details: self.details(),
            pricing: self.pricing(),
            media: Media {
                images: Some(self.media_images.clone()),
                video_url: self.media_video_url.clone(),
            },
            amenities: self.amenities.clone(),
            performance: Performance {
                views: self.performance_views,
                inquiries: self.performance_inquiries,
                favorites: self.performance_favorites,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Listing as returned by the API, with the sectioned layout nested again.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyView {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub status: PropertyStatus,
    pub rejection_reason: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub regular_price: Option<i64>,
    pub discount_price: Option<i64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub furnished: Option<bool>,
    pub parking: Option<bool>,
    #[serde(rename = "type")]
    pub listing_type: Option<ListingType>,
    pub offer: Option<bool>,
    pub image_urls: Vec<String>,
    pub basic_info: Option<BasicInfo>,
    pub location: Option<Location>,
    pub details: Option<Details>,
    pub pricing: Option<Pricing>,
    pub media: Media,
    pub amenities: Vec<String>,
    pub performance: Performance,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn from_json(value: serde_json::Value) -> Property {
        let input: PropertyInput = serde_json::from_value(value).unwrap();
        let mut property = Property::new(Uuid::new_v4(), PropertyStatus::Pending, Utc::now());
        property.apply(input);
        property
    }

    #[test]
    fn legacy_payload_fills_flat_fields() {
        let property = from_json(json!({
            "name": "Cozy flat",
            "address": "House 12, Road 5, Dhanmondi",
            "regularPrice": 18000,
            "bedrooms": 2,
            "type": "rent",
        }));
        assert_eq!(property.title(), Some("Cozy flat"));
        assert_eq!(property.listing_type, Some(ListingType::Rent));
        assert!(property.basic_info().is_none());
        assert!(property.validate().is_ok());
    }

    #[test]
    fn nested_payload_fills_sections() {
        let property = from_json(json!({
            "basicInfo": { "title": "Family home", "propertyType": "apartment", "listingType": "rent" },
            "location": { "city": "Dhaka", "area": "Gulshan" },
            "pricing": { "rent": 45000 },
            "amenities": ["Lift", " generator ", "lift"],
        }));
        assert_eq!(property.title(), Some("Family home"));
        assert_eq!(property.location().unwrap().city.as_deref(), Some("Dhaka"));
        assert_eq!(property.amenities, vec!["generator", "lift"]);
        assert!(property.validate().is_ok());
    }

    #[test]
    fn update_keeps_fields_that_were_not_sent() {
        let mut property = from_json(json!({ "name": "Old", "regularPrice": 1000 }));
        property.apply(serde_json::from_value(json!({ "regularPrice": 1200 })).unwrap());
        assert_eq!(property.name.as_deref(), Some("Old"));
        assert_eq!(property.regular_price, Some(1200));
    }

    #[test]
    fn listing_without_title_or_price_is_rejected() {
        assert!(from_json(json!({ "regularPrice": 1000 })).validate().is_err());
        assert!(from_json(json!({ "name": "No price" })).validate().is_err());
    }

    #[test]
    fn offer_requires_a_lower_discount() {
        let property = from_json(json!({
            "name": "Offer",
            "regularPrice": 1000,
            "discountPrice": 1200,
            "offer": true,
        }));
        assert!(property.validate().is_err());
    }

    #[test]
    fn view_renames_listing_type() {
        let property = from_json(json!({ "name": "A", "regularPrice": 10, "type": "sale" }));
        let value = serde_json::to_value(property.to_view()).unwrap();
        assert_eq!(value["type"], "sale");
        assert_eq!(value["performance"]["views"], 0);
        assert!(value["basicInfo"].is_null());
    }
}
