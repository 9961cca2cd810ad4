pub mod mortgage;

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub use mortgage::{MortgageTerms, Rounding};

/// Listing site a URL belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Provider {
    Realtor,
    Zillow,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Realtor, Provider::Zillow];

    /// Domain substring matched against a page hostname
    pub fn domain(self) -> &'static str {
        match self {
            Provider::Realtor => "realtor.com",
            Provider::Zillow => "zillow.com",
        }
    }

    pub fn from_host(host: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| host.contains(p.domain()))
    }

    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        Self::from_host(parsed.host_str()?)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.domain())
    }
}

/// Annual percentage rates for the three fixed terms, fetched once per run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub rate_30: f64,
    pub rate_20: f64,
    pub rate_15: f64,
}

impl Default for RateSnapshot {
    fn default() -> Self {
        Self {
            rate_30: 6.9,
            rate_20: 6.5,
            rate_15: 6.1,
        }
    }
}

/// One parsed property listing.
///
/// Field order is the CSV column order. `#[serde(default)]` lets records
/// written by an older rule set load back with the missing columns defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Listing {
    pub link: String,
    pub address: String,
    pub property_type: String,
    pub price: f64,
    pub bed: i64,
    pub bath: i64,
    pub hoa: f64,
    pub land_lease: f64,
    pub area: f64,
    pub area_unit: String,
    pub year: i64,
    pub commute: String,
    pub listing_age: i64,
    pub listing_agent: String,
    pub listing_agent_brokerage: String,
    pub monthly_30: f64,
    pub monthly_20: f64,
    pub monthly_15: f64,
    pub total: f64,
    pub per_person: f64,
}

impl Default for Listing {
    fn default() -> Self {
        Self {
            link: String::new(),
            address: String::new(),
            property_type: String::new(),
            price: 0.0,
            bed: 1,
            bath: 1,
            hoa: 0.0,
            land_lease: 0.0,
            area: 0.0,
            area_unit: String::new(),
            year: 0,
            commute: String::new(),
            listing_age: 0,
            listing_agent: String::new(),
            listing_agent_brokerage: String::new(),
            monthly_30: 0.0,
            monthly_20: 0.0,
            monthly_15: 0.0,
            total: 0.0,
            per_person: 0.0,
        }
    }
}

impl Listing {
    /// Column names in declaration order
    pub const FIELD_NAMES: [&'static str; 20] = [
        "link",
        "address",
        "property_type",
        "price",
        "bed",
        "bath",
        "hoa",
        "land_lease",
        "area",
        "area_unit",
        "year",
        "commute",
        "listing_age",
        "listing_agent",
        "listing_agent_brokerage",
        "monthly_30",
        "monthly_20",
        "monthly_15",
        "total",
        "per_person",
    ];
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Listing({:?})[{}bed/{}bath @ ${:.2}]",
            self.address, self.bed, self.bath, self.price
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_matches_hostname_substring() {
        assert_eq!(Provider::from_host("www.realtor.com"), Some(Provider::Realtor));
        assert_eq!(Provider::from_host("zillow.com"), Some(Provider::Zillow));
        assert_eq!(Provider::from_host("www.redfin.com"), None);
        assert_eq!(
            Provider::from_url("https://www.zillow.com/homedetails/1-Main-St/123_zpid/"),
            Some(Provider::Zillow)
        );
        assert_eq!(Provider::from_url("not a url"), None);
    }

    #[test]
    fn field_names_match_serialized_order() {
        let value = serde_json::to_value(Listing::default()).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        let mut expected = Listing::FIELD_NAMES.to_vec();
        // serde_json maps are sorted without the preserve_order feature
        expected.sort_unstable();
        assert_eq!(keys, expected);
    }

    #[test]
    fn older_records_load_with_defaults() {
        let listing: Listing =
            serde_json::from_str(r#"{"link": "https://www.realtor.com/x", "price": 5.0}"#).unwrap();
        assert_eq!(listing.price, 5.0);
        assert_eq!(listing.bed, 1);
        assert!(listing.commute.is_empty());
    }

    #[test]
    fn display_shows_address_and_price() {
        let listing = Listing {
            address: "1 Main St, San Jose, CA 95112".to_string(),
            price: 139990.0,
            ..Listing::default()
        };
        assert_eq!(
            listing.to_string(),
            "Listing(\"1 Main St, San Jose, CA 95112\")[1bed/1bath @ $139990.00]"
        );
    }
}
