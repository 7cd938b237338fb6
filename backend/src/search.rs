//! Listing search.
//!
//! Query parameters are parsed into a [`PropertyFilter`]. Every criterion is
//! an OR across the legacy and the sectioned layout of a listing, and a field
//! that is absent never matches. [`PropertyFilter::matches`] is the reference
//! semantics; the Postgres store translates the same filter into SQL.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::Deserialize;
use uuid::Uuid;

use crate::models::property::normalize_amenity;
use crate::models::{ListingType, Property, PropertyStatus};

pub const DEFAULT_LIMIT: i64 = 9;
pub const MAX_LIMIT: i64 = 50;

/// Raw query string of `GET /api/listing/get`. Numbers stay text until
/// [`PropertyFilter::from_params`] so that empty values (`minPrice=`) read as
/// absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub search_term: Option<String>,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
    pub property_type: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub furnished: Option<String>,
    pub parking: Option<String>,
    pub offer: Option<String>,
    pub amenities: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub limit: Option<String>,
    pub start_index: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    CreatedAt,
    Price,
    Views,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    pub text: Option<String>,
    pub listing_type: Option<ListingType>,
    pub property_type: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_bedrooms: Option<i32>,
    pub min_bathrooms: Option<i32>,
    pub furnished: Option<bool>,
    pub parking: Option<bool>,
    pub offer: Option<bool>,
    pub amenities: Vec<String>,
    pub status: Option<PropertyStatus>,
    pub owner_id: Option<Uuid>,
    pub sort: SortKey,
    pub order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

impl Default for PropertyFilter {
    fn default() -> Self {
        Self {
            text: None,
            listing_type: None,
            property_type: None,
            city: None,
            area: None,
            min_price: None,
            max_price: None,
            min_bedrooms: None,
            min_bathrooms: None,
            furnished: None,
            parking: None,
            offer: None,
            amenities: Vec::new(),
            status: None,
            owner_id: None,
            sort: SortKey::default(),
            order: SortOrder::default(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// One page of search results together with the unpaged total.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub listings: Vec<Property>,
    pub total: i64,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `"true"`/`"false"` become a filter; anything else (`"all"`, empty) is
/// ignored.
fn flag(value: &Option<String>) -> Option<bool> {
    match value.as_deref().map(str::trim) {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

/// Parses a numeric parameter; blank means absent.
fn number<T: FromStr>(field: &str, value: &Option<String>) -> Result<Option<T>, String> {
    match non_empty(value) {
        None => Ok(None),
        Some(text) => text
            .parse()
            .map(Some)
            .map_err(|_| format!("{} must be a number", field)),
    }
}

fn contains_ci(haystack: &Option<String>, needle_lower: &str) -> bool {
    haystack
        .as_deref()
        .is_some_and(|h| h.to_lowercase().contains(needle_lower))
}

fn at_least<T: PartialOrd + Copy>(value: Option<T>, min: T) -> bool {
    value.is_some_and(|v| v >= min)
}

impl PropertyFilter {
    /// Builds the public search filter; only approved listings are visible.
    pub fn from_params(params: &SearchParams) -> Result<Self, String> {
        let listing_type = match non_empty(&params.listing_type).as_deref() {
            None | Some("all") => None,
            Some(other) => Some(
                other
                    .parse::<ListingType>()
                    .map_err(|_| format!("Unknown listing type {:?}", other))?,
            ),
        };

        let min_price: Option<i64> = number("minPrice", &params.min_price)?;
        let max_price: Option<i64> = number("maxPrice", &params.max_price)?;
        let bedrooms: Option<i32> = number("bedrooms", &params.bedrooms)?;
        let bathrooms: Option<i32> = number("bathrooms", &params.bathrooms)?;
        let limit: Option<i64> = number("limit", &params.limit)?;
        let start_index: Option<i64> = number("startIndex", &params.start_index)?;

        if let (Some(min), Some(max)) = (min_price, max_price) {
            if min > max {
                return Err("minPrice cannot be greater than maxPrice".to_string());
            }
        }
        if min_price.is_some_and(|p| p < 0) || max_price.is_some_and(|p| p < 0) {
            return Err("Prices cannot be negative".to_string());
        }

        let sort = match params.sort.as_deref() {
            None | Some("createdAt") | Some("created_at") => SortKey::CreatedAt,
            Some("price") | Some("regularPrice") => SortKey::Price,
            Some("views") => SortKey::Views,
            Some(other) => return Err(format!("Unknown sort key {:?}", other)),
        };
        let order = match params.order.as_deref() {
            Some("asc") => SortOrder::Asc,
            None | Some("desc") => SortOrder::Desc,
            Some(other) => return Err(format!("Unknown sort order {:?}", other)),
        };

        let amenities = params
            .amenities
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(normalize_amenity)
            .filter(|a| !a.is_empty())
            .collect();

        Ok(Self {
            text: non_empty(&params.search_term),
            listing_type,
            property_type: non_empty(&params.property_type),
            city: non_empty(&params.city),
            area: non_empty(&params.area),
            min_price,
            max_price,
            min_bedrooms: bedrooms.filter(|b| *b > 0),
            min_bathrooms: bathrooms.filter(|b| *b > 0),
            furnished: flag(&params.furnished),
            parking: flag(&params.parking),
            offer: flag(&params.offer),
            amenities,
            status: Some(PropertyStatus::Approved),
            owner_id: None,
            sort,
            order,
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: start_index.unwrap_or(0).max(0),
        })
    }

    /// Every listing of one owner, newest first, regardless of status.
    pub fn owned_by(owner_id: Uuid) -> Self {
        Self {
            owner_id: Some(owner_id),
            limit: i64::MAX,
            ..Self::default()
        }
    }

    pub fn has_price_range(&self) -> bool {
        self.min_price.is_some() || self.max_price.is_some()
    }

    /// Inclusive price bounds, open ends widened to the full range.
    pub fn price_bounds(&self) -> (i64, i64) {
        (
            self.min_price.unwrap_or(0),
            self.max_price.unwrap_or(i64::MAX),
        )
    }

    pub fn matches(&self, p: &Property) -> bool {
        if let Some(status) = self.status {
            if p.status != status {
                return false;
            }
        }
        if let Some(owner) = self.owner_id {
            if p.owner_id != owner {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let hit = [
                &p.name,
                &p.description,
                &p.address,
                &p.basic_title,
                &p.basic_description,
                &p.location_address,
                &p.location_city,
                &p.location_area,
            ]
            .into_iter()
            .any(|field| contains_ci(field, &needle));
            if !hit {
                return false;
            }
        }
        if let Some(kind) = self.listing_type {
            if p.listing_type != Some(kind) && p.basic_listing_type != Some(kind) {
                return false;
            }
        }
        if let Some(property_type) = &self.property_type {
            let same = p
                .basic_property_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(property_type));
            if !same {
                return false;
            }
        }
        if let Some(city) = &self.city {
            let needle = city.to_lowercase();
            if !contains_ci(&p.location_city, &needle) && !contains_ci(&p.address, &needle) {
                return false;
            }
        }
        if let Some(area) = &self.area {
            let needle = area.to_lowercase();
            if !contains_ci(&p.location_area, &needle) && !contains_ci(&p.address, &needle) {
                return false;
            }
        }
        if self.has_price_range() {
            let (min, max) = self.price_bounds();
            let in_range = |price: Option<i64>| price.is_some_and(|v| v >= min && v <= max);
            if !in_range(p.regular_price) && !in_range(p.pricing_rent) {
                return false;
            }
        }
        if let Some(min) = self.min_bedrooms {
            if !at_least(p.bedrooms, min) && !at_least(p.details_bedrooms, min) {
                return false;
            }
        }
        if let Some(min) = self.min_bathrooms {
            if !at_least(p.bathrooms, min) && !at_least(p.details_bathrooms, min) {
                return false;
            }
        }
        if let Some(furnished) = self.furnished {
            if p.furnished != Some(furnished) && p.details_furnished != Some(furnished) {
                return false;
            }
        }
        if let Some(parking) = self.parking {
            if p.parking != Some(parking) && p.details_parking != Some(parking) {
                return false;
            }
        }
        if let Some(offer) = self.offer {
            if p.offer != Some(offer) {
                return false;
            }
        }
        self.amenities.iter().all(|a| p.amenities.contains(a))
    }

    /// Result ordering. Listings without a price sort last in either
    /// direction; ties fall back to newest first.
    pub fn compare(&self, a: &Property, b: &Property) -> Ordering {
        let primary = match self.sort {
            SortKey::CreatedAt => self.directed(a.created_at.cmp(&b.created_at)),
            SortKey::Views => self.directed(a.performance_views.cmp(&b.performance_views)),
            SortKey::Price => match (a.sort_price(), b.sort_price()) {
                (Some(x), Some(y)) => self.directed(x.cmp(&y)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };
        primary.then_with(|| b.created_at.cmp(&a.created_at))
    }

    fn directed(&self, ordering: Ordering) -> Ordering {
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }

    /// Runs the filter over an in-memory collection.
    pub fn apply<'a, I>(&self, listings: I) -> SearchPage
    where
        I: IntoIterator<Item = &'a Property>,
    {
        let mut hits: Vec<Property> = listings
            .into_iter()
            .filter(|p| self.matches(p))
            .cloned()
            .collect();
        hits.sort_by(|a, b| self.compare(a, b));
        let total = hits.len() as i64;
        let listings = hits
            .into_iter()
            .skip(usize::try_from(self.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(self.limit).unwrap_or(usize::MAX))
            .collect();
        SearchPage { listings, total }
    }
}

/// Escapes `%`, `_` and `\\` so user text is matched literally by `ILIKE`.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Substring pattern for `ILIKE`.
pub fn like_pattern(text: &str) -> String {
    format!("%{}%", escape_like(text))
}
