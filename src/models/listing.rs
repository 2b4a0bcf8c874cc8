//! Structured listing extracted from a post.

use serde::{Deserialize, Serialize};

/// Kind of deal an ad offers or asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealType {
    RentLong,
    RentDaily,
    Sale,
    WantedRent,
    WantedBuy,
}

impl DealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealType::RentLong => "rent_long",
            DealType::RentDaily => "rent_daily",
            DealType::Sale => "sale",
            DealType::WantedRent => "wanted_rent",
            DealType::WantedBuy => "wanted_buy",
        }
    }

    pub fn is_rent(&self) -> bool {
        matches!(
            self,
            DealType::RentLong | DealType::RentDaily | DealType::WantedRent
        )
    }
}

/// Kind of property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Flat,
    Room,
    Studio,
    House,
    Land,
    Commercial,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Flat => "flat",
            ObjectType::Room => "room",
            ObjectType::Studio => "studio",
            ObjectType::House => "house",
            ObjectType::Land => "land",
            ObjectType::Commercial => "commercial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Usd,
    Uzs,
    Eur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePeriod {
    Month,
    Day,
}

/// Who the owner wants to rent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantType {
    Family,
    Girls,
    Guys,
    Single,
}

/// Amenity flags; `None` means the ad does not say.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Amenities {
    pub has_furniture: Option<bool>,
    pub has_appliances: Option<bool>,
    pub has_internet: Option<bool>,
    pub has_parking: Option<bool>,
    pub has_conditioner: Option<bool>,
    pub has_washing_machine: Option<bool>,
    pub has_refrigerator: Option<bool>,
    pub has_tv: Option<bool>,
    pub has_balcony: Option<bool>,
}

/// Structured interpretation of exactly one post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub is_real_estate: bool,

    pub deal_type: Option<DealType>,
    pub object_type: Option<ObjectType>,

    // Object parameters
    pub rooms: Option<u8>,
    pub floor: Option<u8>,
    pub total_floors: Option<u8>,
    pub area_m2: Option<f64>,

    // Price
    pub price: Option<u64>,
    pub currency: Option<Currency>,
    pub price_period: Option<PricePeriod>,
    pub deposit: Option<u64>,
    pub no_deposit: bool,
    pub has_commission: bool,
    pub commission_pct: Option<u8>,

    // Location
    pub district_raw: Option<String>,
    pub metro_raw: Option<String>,
    pub address_raw: Option<String>,
    pub landmark: Option<String>,
    pub district_id: Option<u32>,
    pub metro_id: Option<u32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    // Property
    pub condition: Option<String>,
    pub house_type: Option<String>,
    pub amenities: Amenities,
    pub pets_allowed: Option<bool>,
    pub kids_allowed: Option<bool>,
    pub tenant_types: Vec<TenantType>,

    // Contact
    pub contact_phone: Option<String>,
    pub contact_tg: Option<String>,
    pub is_agent: Option<bool>,

    pub description_clean: Option<String>,

    /// Parse completeness, 0-100
    pub parse_score: u8,
    pub needs_review: bool,

    /// Field-level problems found while extracting (conflicts, unmatched aliases)
    pub review_notes: Vec<String>,
}

impl Listing {
    /// Listing for a post that is not a real-estate ad.
    pub fn not_real_estate() -> Self {
        Self {
            is_real_estate: false,
            ..Self::default()
        }
    }

    /// Whether any numeric or location field carries a value.
    pub fn has_numeric_or_location(&self) -> bool {
        self.rooms.is_some()
            || self.floor.is_some()
            || self.total_floors.is_some()
            || self.area_m2.is_some()
            || self.price.is_some()
            || self.deposit.is_some()
            || self.district_raw.is_some()
            || self.metro_raw.is_some()
            || self.address_raw.is_some()
            || self.district_id.is_some()
            || self.metro_id.is_some()
            || self.latitude.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_serialization() {
        assert_eq!(
            serde_json::to_string(&DealType::RentLong).unwrap(),
            "\"rent_long\""
        );
        assert_eq!(
            serde_json::to_string(&ObjectType::Commercial).unwrap(),
            "\"commercial\""
        );
        assert_eq!(DealType::WantedBuy.as_str(), "wanted_buy");
    }

    #[test]
    fn test_not_real_estate_is_empty() {
        let listing = Listing::not_real_estate();
        assert!(!listing.is_real_estate);
        assert!(!listing.has_numeric_or_location());
        assert_eq!(listing.parse_score, 0);
    }
}
